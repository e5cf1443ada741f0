//! Classified failures of an external catalog fetch.

use std::time::Duration;

use thiserror::Error;

/// Why a fetch from a [`crate::BookSource`] produced no candidates.
///
/// None of these escape [`crate::CatalogRefresher::refresh`]; they are
/// reported through [`crate::RefreshOutcome::SourceFailed`].
#[derive(Debug, Error)]
pub enum FetchError {
  /// `None` when the HTTP client's own timeout fired and the bound is not
  /// known here.
  #[error("fetch timed out{}", after(.0))]
  Timeout(Option<Duration>),

  #[error("transport error: {0}")]
  Transport(String),

  #[error("unexpected HTTP status {0}")]
  Status(u16),

  /// The response parsed but lacked a field every record needs.
  #[error("malformed response: {0}")]
  Malformed(String),
}

impl From<reqwest::Error> for FetchError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_timeout() {
      return Self::Timeout(None);
    }
    match e.status() {
      Some(status) => Self::Status(status.as_u16()),
      None => Self::Transport(e.to_string()),
    }
  }
}

fn after(bound: &Option<Duration>) -> String {
  bound.map(|d| format!(" after {d:?}")).unwrap_or_default()
}

pub type Result<T, E = FetchError> = std::result::Result<T, E>;
