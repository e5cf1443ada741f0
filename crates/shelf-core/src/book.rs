//! Books and the catalog read model.
//!
//! Books enter the store only through catalog reconciliation and are never
//! updated. The `(title, author)` pair identifies a book for deduplication.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub const MAX_TITLE_LEN: usize = 255;
pub const MAX_AUTHOR_LEN: usize = 255;
pub const MAX_GENRE_LEN: usize = 100;

/// A persisted catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
  pub id:     i64,
  pub title:  String,
  pub author: String,
  pub genre:  String,
}

/// A book sourced from outside the store (seed file or book-search API) that
/// has not been reconciled yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookCandidate {
  pub title:  String,
  pub author: String,
  pub genre:  String,
}

impl BookCandidate {
  pub fn new(
    title: impl Into<String>,
    author: impl Into<String>,
    genre: impl Into<String>,
  ) -> Self {
    Self { title: title.into(), author: author.into(), genre: genre.into() }
  }

  /// Check that every field is non-blank and within the column limits.
  pub fn validate(&self) -> Result<()> {
    check_field("title", &self.title, MAX_TITLE_LEN)?;
    check_field("author", &self.author, MAX_AUTHOR_LEN)?;
    check_field("genre", &self.genre, MAX_GENRE_LEN)?;
    Ok(())
  }
}

fn check_field(field: &'static str, value: &str, max: usize) -> Result<()> {
  if value.trim().is_empty() {
    return Err(Error::EmptyField { field });
  }
  if value.chars().count() > max {
    return Err(Error::TooLong { field, max });
  }
  Ok(())
}

/// A book joined with the mean of its review ratings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatedBook {
  pub book:           Book,
  /// `None` when the book has no reviews; never `0.0` as a stand-in.
  pub average_rating: Option<f64>,
}

/// Parameters for [`crate::store::ShelfStore::list_books`].
///
/// `limit` and `offset` are trusted as given; bounds are enforced by the API
/// layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookQuery {
  /// Case-insensitive substring matched against title or author.
  pub search: Option<String>,
  pub limit:  u32,
  pub offset: u32,
}

impl Default for BookQuery {
  fn default() -> Self { Self { search: None, limit: 50, offset: 0 } }
}
