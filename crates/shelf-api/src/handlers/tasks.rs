//! `GET /tasks/{task_id}`

use axum::{
  Json,
  extract::{Path, State, rejection::PathRejection},
};
use shelf_core::store::ShelfStore;
use uuid::Uuid;

use crate::{AppState, auth::CurrentUser, error::ApiError, jobs::JobRecord};

pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  _user: CurrentUser,
  task_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<JobRecord>, ApiError>
where
  S: ShelfStore + Clone + 'static,
{
  let Path(task_id) = task_id?;
  state
    .jobs
    .get(task_id)
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("task {task_id} not found")))
}
