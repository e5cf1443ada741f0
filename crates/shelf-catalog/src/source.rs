//! The `BookSource` trait: anything that can answer a free-text book query.

use std::future::Future;

use shelf_core::book::BookCandidate;

use crate::FetchError;

pub trait BookSource: Send + Sync {
  /// Return up to `max_results` normalised candidates for `query`.
  fn search(
    &self,
    query: &str,
    max_results: u32,
  ) -> impl Future<Output = Result<Vec<BookCandidate>, FetchError>> + Send;
}
