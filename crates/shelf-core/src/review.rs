//! Reviews and the validated rating type.
//!
//! At most one review exists per `(book_id, username)`. Submitting again for
//! the same pair mutates the existing review in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub const MAX_REVIEW_TEXT_LEN: usize = 2048;

// ─── Rating ──────────────────────────────────────────────────────────────────

/// A star rating in `1..=5`. Construction is the only place the bound is
/// checked.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "i64", into = "i64")]
pub struct Rating(u8);

impl Rating {
  pub const MIN: u8 = 1;
  pub const MAX: u8 = 5;

  pub fn new(value: i64) -> Result<Self> {
    match u8::try_from(value) {
      Ok(v) if (Self::MIN..=Self::MAX).contains(&v) => Ok(Self(v)),
      _ => Err(Error::InvalidRating(value)),
    }
  }

  pub fn get(self) -> u8 { self.0 }
}

impl TryFrom<i64> for Rating {
  type Error = Error;

  fn try_from(value: i64) -> Result<Self> { Self::new(value) }
}

impl From<Rating> for i64 {
  fn from(r: Rating) -> Self { i64::from(r.0) }
}

// ─── Review ──────────────────────────────────────────────────────────────────

/// A persisted review. Both timestamps are server-assigned; `updated_at` is
/// refreshed on every write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
  pub id:          i64,
  pub book_id:     i64,
  pub username:    String,
  pub rating:      Rating,
  pub review_text: String,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
}

/// Input to [`crate::store::ShelfStore::upsert_review`].
#[derive(Debug, Clone)]
pub struct ReviewUpsert {
  pub book_id:     i64,
  pub username:    String,
  pub rating:      Rating,
  pub review_text: String,
}

impl ReviewUpsert {
  /// Build an upsert, rejecting review text longer than
  /// [`MAX_REVIEW_TEXT_LEN`] characters.
  pub fn new(
    book_id: i64,
    username: impl Into<String>,
    rating: Rating,
    review_text: impl Into<String>,
  ) -> Result<Self> {
    let review_text = review_text.into();
    if review_text.chars().count() > MAX_REVIEW_TEXT_LEN {
      return Err(Error::TooLong { field: "review_text", max: MAX_REVIEW_TEXT_LEN });
    }
    Ok(Self { book_id, username: username.into(), rating, review_text })
  }
}
