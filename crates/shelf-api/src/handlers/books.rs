//! Handlers for `/books` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/books` | `?search=&limit=1..=100&offset=0..` |
//! | `POST` | `/books/refresh-books` | Queues a catalog refresh, 202 |

use axum::{
  Json,
  extract::{Query, State, rejection::QueryRejection},
  http::StatusCode,
};
use serde::{Deserialize, Serialize};
use shelf_core::{
  book::{BookQuery, RatedBook},
  store::ShelfStore,
};
use uuid::Uuid;

use crate::{
  AppState,
  auth::CurrentUser,
  error::ApiError,
  jobs::JobStatus,
};

pub const DEFAULT_LIMIT: i64 = 50;
pub const MAX_LIMIT: i64 = 100;

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub search: Option<String>,
  pub limit:  Option<i64>,
  pub offset: Option<i64>,
}

impl ListParams {
  fn into_query(self) -> Result<BookQuery, ApiError> {
    let limit = self.limit.unwrap_or(DEFAULT_LIMIT);
    if !(1..=MAX_LIMIT).contains(&limit) {
      return Err(ApiError::Validation(format!(
        "limit must be between 1 and {MAX_LIMIT}, got {limit}"
      )));
    }
    let offset = self.offset.unwrap_or(0);
    let offset = u32::try_from(offset).map_err(|_| {
      ApiError::Validation(format!("offset must be a non-negative 32-bit integer, got {offset}"))
    })?;

    Ok(BookQuery {
      search: self.search,
      // Checked against MAX_LIMIT above.
      limit: limit as u32,
      offset,
    })
  }
}

/// Catalog row as returned to clients. The internal id is not exposed.
#[derive(Debug, Serialize)]
pub struct BookRead {
  pub title:          String,
  pub author:         String,
  pub genre:          String,
  pub average_rating: Option<f64>,
}

impl From<RatedBook> for BookRead {
  fn from(r: RatedBook) -> Self {
    Self {
      title:          r.book.title,
      author:         r.book.author,
      genre:          r.book.genre,
      average_rating: r.average_rating,
    }
  }
}

/// `GET /books[?search=<s>&limit=<n>&offset=<n>]`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  _user: CurrentUser,
  params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<BookRead>>, ApiError>
where
  S: ShelfStore + Clone + 'static,
{
  let Query(params) = params?;
  let books = state
    .store
    .list_books(params.into_query()?)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(books.into_iter().map(BookRead::from).collect()))
}

// ─── Refresh ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct TaskAccepted {
  pub task_id: Uuid,
  pub status:  JobStatus,
}

/// `POST /books/refresh-books`. Returns before the refresh runs. While a
/// refresh is still waiting to start, further requests get its task id.
pub async fn refresh<S>(
  State(state): State<AppState<S>>,
  CurrentUser(username): CurrentUser,
) -> Result<(StatusCode, Json<TaskAccepted>), ApiError>
where
  S: ShelfStore + Clone + 'static,
{
  let record = state
    .jobs
    .enqueue()
    .map_err(|e| ApiError::Unavailable(e.to_string()))?;
  tracing::info!(task_id = %record.task_id, %username, "catalog refresh requested");

  Ok((StatusCode::ACCEPTED, Json(TaskAccepted {
    task_id: record.task_id,
    status:  record.status,
  })))
}
