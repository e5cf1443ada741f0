//! [`CatalogRefresher`]: fetch candidates, then reconcile them into a store.
//!
//! The fetch always completes (or fails) before the store's write transaction
//! opens. Fetch failures are soft: they come back as
//! [`RefreshOutcome::SourceFailed`], never as an `Err`. Only store errors
//! propagate.

use std::{path::PathBuf, sync::Arc, time::Duration};

use serde::Serialize;
use shelf_core::{book::BookCandidate, store::ShelfStore};

use crate::{BookSource, FetchError, seed::read_seed_file};

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// Result of merging an explicit or seed-file candidate list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
  /// Candidates reached the store; `inserted` may be 0 if all were known.
  Reconciled { inserted: usize },
  /// No usable candidates from any source. Nothing was written.
  NothingToSeed,
}

/// Result of one fetch-then-reconcile attempt.
#[derive(Debug)]
pub enum RefreshOutcome {
  Reconciled { fetched: usize, inserted: usize },
  /// The source answered but yielded no usable candidates.
  NothingToSeed,
  /// The fetch failed; the store was not touched.
  SourceFailed(FetchError),
}

impl RefreshOutcome {
  /// The boolean soft-failure view: `true` only when candidates reached the
  /// store.
  pub fn is_success(&self) -> bool { matches!(self, Self::Reconciled { .. }) }

  pub fn inserted(&self) -> usize {
    match self {
      Self::Reconciled { inserted, .. } => *inserted,
      _ => 0,
    }
  }
}

// ─── Refresher ───────────────────────────────────────────────────────────────

/// Merges externally sourced books into a [`ShelfStore`].
pub struct CatalogRefresher<S, B> {
  store:         Arc<S>,
  source:        B,
  seed_file:     Option<PathBuf>,
  fetch_timeout: Duration,
}

impl<S, B> CatalogRefresher<S, B>
where
  S: ShelfStore,
  B: BookSource,
{
  pub fn new(store: Arc<S>, source: B) -> Self {
    Self { store, source, seed_file: None, fetch_timeout: DEFAULT_FETCH_TIMEOUT }
  }

  /// Fallback candidates for [`Self::reconcile`] when the caller supplies none.
  pub fn with_seed_file(mut self, path: impl Into<PathBuf>) -> Self {
    self.seed_file = Some(path.into());
    self
  }

  pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
    self.fetch_timeout = timeout;
    self
  }

  /// Reconcile `candidates`, or the seed file's contents if `candidates` is
  /// empty.
  pub async fn reconcile(
    &self,
    candidates: Vec<BookCandidate>,
  ) -> Result<ReconcileOutcome, S::Error> {
    let candidates = if candidates.is_empty() {
      match &self.seed_file {
        Some(path) => read_seed_file(path).await,
        None => Vec::new(),
      }
    } else {
      candidates
    };

    Ok(match self.store_valid(candidates).await? {
      Some(inserted) => ReconcileOutcome::Reconciled { inserted },
      None => ReconcileOutcome::NothingToSeed,
    })
  }

  /// Fetch up to `limit` books for `query` and reconcile them.
  pub async fn refresh(&self, query: &str, limit: u32) -> Result<RefreshOutcome, S::Error> {
    let fetched = match self.fetch(query, limit).await {
      Ok(fetched) => fetched,
      Err(e) => {
        tracing::warn!(query, error = %e, "catalog fetch failed");
        return Ok(RefreshOutcome::SourceFailed(e));
      }
    };

    let count = fetched.len();
    match self.store_valid(fetched).await? {
      Some(inserted) => {
        tracing::info!(query, fetched = count, inserted, "catalog reconciled");
        Ok(RefreshOutcome::Reconciled { fetched: count, inserted })
      }
      None if count == 0 => {
        tracing::warn!(query, "no books fetched");
        Ok(RefreshOutcome::NothingToSeed)
      }
      None => {
        tracing::warn!(query, fetched = count, "no fetched book passed validation");
        Ok(RefreshOutcome::NothingToSeed)
      }
    }
  }

  async fn fetch(&self, query: &str, limit: u32) -> Result<Vec<BookCandidate>, FetchError> {
    tokio::time::timeout(self.fetch_timeout, self.source.search(query, limit))
      .await
      .map_err(|_| FetchError::Timeout(Some(self.fetch_timeout)))?
  }

  /// Drop candidates that fail validation and hand the rest to the store.
  /// Returns `None` if nothing was left to store.
  async fn store_valid(&self, candidates: Vec<BookCandidate>) -> Result<Option<usize>, S::Error> {
    let valid: Vec<BookCandidate> = candidates
      .into_iter()
      .filter(|c| match c.validate() {
        Ok(()) => true,
        Err(e) => {
          tracing::warn!(title = %c.title, author = %c.author, error = %e, "skipping book candidate");
          false
        }
      })
      .collect();

    if valid.is_empty() {
      return Ok(None);
    }
    self.store.reconcile_books(valid).await.map(Some)
  }
}
