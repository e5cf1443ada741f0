//! Error type for `shelf-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid stored value: {0}")]
  Core(#[from] shelf_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A review insert lost a uniqueness race, but the winning row was gone by
  /// the time it was re-read. Only a concurrent delete can cause this.
  #[error("review for book {book_id} by {username:?} vanished during upsert")]
  ReviewVanished { book_id: i64, username: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
