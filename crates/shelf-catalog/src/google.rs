//! Async HTTP client for the Google Books volumes API.

use std::time::Duration;

use shelf_core::book::BookCandidate;

use crate::{BookSource, FetchError, error::Result, volume::VolumesResponse};

pub const GOOGLE_BOOKS_URL: &str = "https://www.googleapis.com/books/v1/volumes";

/// The API rejects `maxResults` outside `1..=40`.
const MAX_RESULTS_CAP: u32 = 40;

/// Google Books search client.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
/// [`crate::CatalogRefresher`] bounds every fetch whether or not a request
/// timeout is set here.
#[derive(Clone)]
pub struct GoogleBooksClient {
  client:   reqwest::Client,
  base_url: String,
}

impl GoogleBooksClient {
  pub fn new(base_url: impl Into<String>) -> Result<Self> {
    Self::build(base_url, reqwest::Client::builder())
  }

  /// A client whose requests fail with [`FetchError::Timeout`] after
  /// `timeout`.
  pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
    Self::build(base_url, reqwest::Client::builder().timeout(timeout))
  }

  fn build(base_url: impl Into<String>, builder: reqwest::ClientBuilder) -> Result<Self> {
    let client = builder
      .user_agent(concat!("shelf/", env!("CARGO_PKG_VERSION")))
      .build()?;
    Ok(Self { client, base_url: base_url.into() })
  }

  pub fn base_url(&self) -> &str { &self.base_url }
}

impl BookSource for GoogleBooksClient {
  /// `GET {base_url}?q=<query>&maxResults=<n>`
  async fn search(&self, query: &str, max_results: u32) -> Result<Vec<BookCandidate>> {
    let max_results = max_results.clamp(1, MAX_RESULTS_CAP);

    let resp = self
      .client
      .get(&self.base_url)
      .query(&[("q", query.to_owned()), ("maxResults", max_results.to_string())])
      .send()
      .await?;

    let status = resp.status();
    if !status.is_success() {
      return Err(FetchError::Status(status.as_u16()));
    }

    let body = resp.bytes().await?;
    let parsed: VolumesResponse = serde_json::from_slice(&body)
      .map_err(|e| FetchError::Malformed(e.to_string()))?;

    tracing::debug!(query, items = parsed.items.as_ref().map_or(0, Vec::len), "google books response");
    parsed.into_candidates()
  }
}
