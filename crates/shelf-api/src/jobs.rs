//! In-process catalog refresh jobs.
//!
//! One worker task drains the queue, so refresh jobs never overlap. At most
//! one job waits behind the running one: enqueueing while a job is still
//! queued returns that job instead of adding another. Every job gets a
//! [`JobRecord`] in a shared registry that the `/tasks/{task_id}` endpoint
//! reads.

use std::{
  collections::{HashMap, VecDeque},
  sync::{Arc, Mutex},
  time::Duration,
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use shelf_catalog::{BookSource, CatalogRefresher, RefreshOutcome};
use shelf_core::store::ShelfStore;
use tokio::{sync::mpsc, task::JoinHandle, time::MissedTickBehavior};
use uuid::Uuid;

use crate::RefreshConfig;

/// Records beyond this many are evicted oldest first.
const MAX_RETAINED_JOBS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
  Queued,
  Running,
  Completed,
  /// The store failed mid-refresh. Fetch failures do not land here.
  Failed,
}

/// What a completed refresh did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobOutcome {
  Reconciled { fetched: usize, inserted: usize },
  NothingToSeed,
  SourceFailed { reason: String },
  /// Refresh is disabled in the configuration.
  Skipped,
}

impl From<RefreshOutcome> for JobOutcome {
  fn from(outcome: RefreshOutcome) -> Self {
    match outcome {
      RefreshOutcome::Reconciled { fetched, inserted } => Self::Reconciled { fetched, inserted },
      RefreshOutcome::NothingToSeed => Self::NothingToSeed,
      RefreshOutcome::SourceFailed(e) => Self::SourceFailed { reason: e.to_string() },
    }
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
  pub task_id:     Uuid,
  pub status:      JobStatus,
  pub enqueued_at: DateTime<Utc>,
  pub finished_at: Option<DateTime<Utc>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub outcome:     Option<JobOutcome>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error:       Option<String>,
}

/// The queue's worker task has exited.
#[derive(Debug, Error)]
#[error("job worker is not running")]
pub struct WorkerGone;

#[derive(Default)]
struct Registry {
  records: HashMap<Uuid, JobRecord>,
  order:   VecDeque<Uuid>,
  /// The job that is queued but not yet picked up by the worker.
  pending: Option<Uuid>,
}

impl Registry {
  fn insert(&mut self, record: JobRecord) {
    self.order.push_back(record.task_id);
    self.records.insert(record.task_id, record);

    while self.order.len() > MAX_RETAINED_JOBS {
      let Some(oldest) = self.order.pop_front() else { break };
      self.records.remove(&oldest);
    }
  }

  fn update(&mut self, id: Uuid, f: impl FnOnce(&mut JobRecord)) {
    if let Some(record) = self.records.get_mut(&id) {
      f(record);
    }
  }

  /// The worker picked up `id`.
  fn start(&mut self, id: Uuid) {
    if self.pending == Some(id) {
      self.pending = None;
    }
    self.update(id, |j| j.status = JobStatus::Running);
  }
}

/// Handle for enqueueing refresh jobs and reading their records.
///
/// Cheap to clone. Dropping every clone stops the worker.
#[derive(Clone)]
pub struct JobQueue {
  tx:       mpsc::UnboundedSender<Uuid>,
  registry: Arc<Mutex<Registry>>,
}

impl JobQueue {
  /// Queue one refresh and return its record, or the record of the refresh
  /// that is already waiting.
  pub fn enqueue(&self) -> Result<JobRecord, WorkerGone> {
    locked(&self.registry, |r| {
      if let Some(waiting) = r.pending.and_then(|id| r.records.get(&id)) {
        tracing::debug!(task_id = %waiting.task_id, "refresh job already queued");
        return Ok(waiting.clone());
      }

      let record = JobRecord {
        task_id:     Uuid::new_v4(),
        status:      JobStatus::Queued,
        enqueued_at: Utc::now(),
        finished_at: None,
        outcome:     None,
        error:       None,
      };
      // Sent under the lock so the worker cannot start it before `pending`
      // is set.
      if self.tx.send(record.task_id).is_err() {
        return Err(WorkerGone);
      }
      r.insert(record.clone());
      r.pending = Some(record.task_id);
      tracing::debug!(task_id = %record.task_id, "refresh job queued");
      Ok(record)
    })
  }

  pub fn get(&self, task_id: Uuid) -> Option<JobRecord> {
    locked(&self.registry, |r| r.records.get(&task_id).cloned())
  }
}

fn locked<T>(registry: &Mutex<Registry>, f: impl FnOnce(&mut Registry) -> T) -> T {
  // A panic while holding the lock leaves the map itself intact.
  let mut guard = registry.lock().unwrap_or_else(|p| p.into_inner());
  f(&mut guard)
}

/// Start the worker and return the queue that feeds it.
pub fn spawn_worker<S, B>(
  refresher: Arc<CatalogRefresher<S, B>>,
  config: RefreshConfig,
) -> (JobQueue, JoinHandle<()>)
where
  S: ShelfStore + 'static,
  B: BookSource + 'static,
{
  let (tx, mut rx) = mpsc::unbounded_channel::<Uuid>();
  let queue = JobQueue { tx, registry: Arc::new(Mutex::new(Registry::default())) };
  // The worker holds the registry only, so the loop ends once every
  // `JobQueue` is dropped.
  let registry = queue.registry.clone();

  let handle = tokio::spawn(async move {
    while let Some(task_id) = rx.recv().await {
      locked(&registry, |r| r.start(task_id));

      let (status, outcome, error) = if !config.enabled {
        tracing::info!(%task_id, "catalog refresh disabled, skipping job");
        (JobStatus::Completed, Some(JobOutcome::Skipped), None)
      } else {
        match refresher.refresh(&config.query, config.max_results).await {
          Ok(outcome) => (JobStatus::Completed, Some(JobOutcome::from(outcome)), None),
          Err(e) => {
            tracing::error!(%task_id, error = %e, "catalog refresh failed");
            (JobStatus::Failed, None, Some(e.to_string()))
          }
        }
      };

      locked(&registry, |r| {
        r.update(task_id, |j| {
          j.status = status;
          j.outcome = outcome;
          j.error = error;
          j.finished_at = Some(Utc::now());
        })
      });
    }
    tracing::debug!("job worker stopped");
  });

  (queue, handle)
}

/// Enqueue a refresh every `every`, starting one period from now.
///
/// Stops once the worker is gone. `every` must be non-zero.
pub fn spawn_schedule(queue: JobQueue, every: Duration) -> JoinHandle<()> {
  tokio::spawn(async move {
    let mut timer = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
      timer.tick().await;
      match queue.enqueue() {
        Ok(record) => tracing::info!(task_id = %record.task_id, "scheduled catalog refresh"),
        Err(WorkerGone) => {
          tracing::warn!("job worker gone, stopping schedule");
          break;
        }
      }
    }
  })
}
