//! Error types for `shelf-core`.

use thiserror::Error;

/// A domain value failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
  #[error("rating must be between 1 and 5, got {0}")]
  InvalidRating(i64),

  #[error("{field} must not be empty")]
  EmptyField { field: &'static str },

  #[error("{field} must be at most {max} characters")]
  TooLong { field: &'static str, max: usize },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
