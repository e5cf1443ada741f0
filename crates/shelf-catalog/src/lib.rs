//! Catalog sourcing for Shelf.
//!
//! Fetches book candidates from the Google Books volumes API or a JSON seed
//! file and merges them into any [`shelf_core::store::ShelfStore`] through
//! [`CatalogRefresher`].

pub mod error;
pub mod google;
pub mod refresh;
pub mod seed;
pub mod source;
pub mod volume;

pub use error::FetchError;
pub use google::GoogleBooksClient;
pub use refresh::{CatalogRefresher, ReconcileOutcome, RefreshOutcome};
pub use source::BookSource;
