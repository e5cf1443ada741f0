//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with a fixed microsecond width
//! and a `Z` suffix, so lexicographic order in SQL equals chronological order.

use chrono::{DateTime, SecondsFormat, Utc};
use shelf_core::{
  book::{Book, RatedBook},
  review::{Rating, Review},
  user::User,
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Columns read directly from a `reviews` row.
pub struct RawReview {
  pub id:          i64,
  pub book_id:     i64,
  pub username:    String,
  pub rating:      i64,
  pub review_text: String,
  pub created_at:  String,
  pub updated_at:  String,
}

pub const REVIEW_COLUMNS: &str =
  "id, book_id, username, rating, review_text, created_at, updated_at";

impl RawReview {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:          row.get(0)?,
      book_id:     row.get(1)?,
      username:    row.get(2)?,
      rating:      row.get(3)?,
      review_text: row.get(4)?,
      created_at:  row.get(5)?,
      updated_at:  row.get(6)?,
    })
  }

  pub fn into_review(self) -> Result<Review> {
    Ok(Review {
      id:          self.id,
      book_id:     self.book_id,
      username:    self.username,
      rating:      Rating::new(self.rating)?,
      review_text: self.review_text,
      created_at:  decode_dt(&self.created_at)?,
      updated_at:  decode_dt(&self.updated_at)?,
    })
  }
}

pub const BOOK_COLUMNS: &str = "id, title, author, genre";

pub fn book_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Book> {
  Ok(Book {
    id:     row.get(0)?,
    title:  row.get(1)?,
    author: row.get(2)?,
    genre:  row.get(3)?,
  })
}

/// A book row followed by an aggregated `AVG(rating)` column.
pub fn rated_book_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RatedBook> {
  Ok(RatedBook {
    book:           book_from_row(row)?,
    average_rating: row.get(4)?,
  })
}

pub fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
  Ok(User {
    id:            row.get(0)?,
    username:      row.get(1)?,
    password_hash: row.get(2)?,
  })
}

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Whether `e` is a `UNIQUE` constraint failure.
pub fn is_unique_violation(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(err, _)
      if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
  )
}
