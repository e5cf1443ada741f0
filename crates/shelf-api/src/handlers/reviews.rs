//! Handlers for `/books/{book_id}/reviews`.
//!
//! The review author is always the token subject.

use axum::{
  Json,
  extract::{
    Path, State,
    rejection::{JsonRejection, PathRejection},
  },
};
use serde::{Deserialize, Serialize};
use shelf_core::{
  review::{Rating, Review, ReviewUpsert},
  store::ShelfStore,
};

use crate::{AppState, auth::CurrentUser, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ReviewBody {
  pub rating:      i64,
  #[serde(default)]
  pub review_text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReviewRead {
  pub id:          i64,
  pub book_id:     i64,
  pub username:    String,
  pub rating:      Rating,
  pub review_text: String,
}

impl From<Review> for ReviewRead {
  fn from(r: Review) -> Self {
    Self {
      id:          r.id,
      book_id:     r.book_id,
      username:    r.username,
      rating:      r.rating,
      review_text: r.review_text,
    }
  }
}

/// `POST /books/{book_id}/reviews`: create or replace the caller's review.
pub async fn upsert<S>(
  State(state): State<AppState<S>>,
  CurrentUser(username): CurrentUser,
  book_id: Result<Path<i64>, PathRejection>,
  body: Result<Json<ReviewBody>, JsonRejection>,
) -> Result<Json<ReviewRead>, ApiError>
where
  S: ShelfStore + Clone + 'static,
{
  let Path(book_id) = book_id?;
  let Json(body) = body?;

  let rating = Rating::new(body.rating)?;
  let input = ReviewUpsert::new(book_id, username, rating, body.review_text.unwrap_or_default())?;

  state
    .store
    .get_book(book_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("book {book_id} not found")))?;

  let review = state
    .store
    .upsert_review(input)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(review.into()))
}

/// `GET /books/{book_id}/reviews`, newest first.
pub async fn list<S>(
  State(state): State<AppState<S>>,
  _user: CurrentUser,
  book_id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Vec<ReviewRead>>, ApiError>
where
  S: ShelfStore + Clone + 'static,
{
  let Path(book_id) = book_id?;
  let reviews = state
    .store
    .reviews_for_book(book_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("book {book_id} not found")))?;
  Ok(Json(reviews.into_iter().map(ReviewRead::from).collect()))
}
