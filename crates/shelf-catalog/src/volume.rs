//! Google Books volumes response and its normalisation to [`BookCandidate`].
//!
//! Only the fields Shelf stores are modelled. Absent optional fields fall back
//! to placeholders; shapes that cannot be normalised fail the whole response.

use serde::Deserialize;
use shelf_core::book::BookCandidate;

use crate::{FetchError, error::Result};

pub const UNKNOWN_TITLE: &str = "Unknown";
pub const UNKNOWN_AUTHOR: &str = "Unknown";
pub const DEFAULT_GENRE: &str = "General";

/// Body of `GET /books/v1/volumes`.
#[derive(Debug, Deserialize)]
pub struct VolumesResponse {
  /// Omitted by the API when the query matched nothing.
  pub items: Option<Vec<Volume>>,
}

#[derive(Debug, Deserialize)]
pub struct Volume {
  #[serde(rename = "volumeInfo")]
  pub volume_info: Option<VolumeInfo>,
}

#[derive(Debug, Deserialize)]
pub struct VolumeInfo {
  pub title:      Option<String>,
  pub authors:    Option<Vec<String>>,
  pub categories: Option<Vec<String>>,
}

impl VolumesResponse {
  /// Normalise every item. Fails on the first item that lacks `volumeInfo`
  /// or carries an empty `categories` list.
  pub fn into_candidates(self) -> Result<Vec<BookCandidate>> {
    self
      .items
      .unwrap_or_default()
      .into_iter()
      .enumerate()
      .map(|(index, volume)| {
        volume
          .volume_info
          .ok_or_else(|| FetchError::Malformed(format!("item {index} has no volumeInfo")))?
          .into_candidate()
          .map_err(|reason| FetchError::Malformed(format!("item {index}: {reason}")))
      })
      .collect()
  }
}

impl VolumeInfo {
  fn into_candidate(self) -> std::result::Result<BookCandidate, &'static str> {
    let title = self.title.unwrap_or_else(|| UNKNOWN_TITLE.to_owned());

    let author = match self.authors {
      Some(authors) => authors.join(", "),
      None => UNKNOWN_AUTHOR.to_owned(),
    };

    let genre = match self.categories {
      None => DEFAULT_GENRE.to_owned(),
      Some(categories) => categories
        .into_iter()
        .next()
        .ok_or("categories is present but empty")?,
    };

    Ok(BookCandidate { title, author, genre })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn parse(json: &str) -> Result<Vec<BookCandidate>> {
    serde_json::from_str::<VolumesResponse>(json)
      .unwrap()
      .into_candidates()
  }

  #[test]
  fn full_records_are_normalised() {
    let got = parse(
      r#"{"items":[
        {"volumeInfo":{"title":"Book1","authors":["A1"],"categories":["Tech"]}},
        {"volumeInfo":{"title":"Book2","authors":["A2","B2"],"categories":["Fiction","Drama"]}}
      ]}"#,
    )
    .unwrap();

    assert_eq!(got, vec![
      BookCandidate::new("Book1", "A1", "Tech"),
      BookCandidate::new("Book2", "A2, B2", "Fiction"),
    ]);
  }

  #[test]
  fn absent_fields_use_placeholders() {
    let got = parse(r#"{"items":[{"volumeInfo":{}}]}"#).unwrap();
    assert_eq!(got, vec![BookCandidate::new(
      UNKNOWN_TITLE,
      UNKNOWN_AUTHOR,
      DEFAULT_GENRE
    )]);
  }

  #[test]
  fn missing_items_means_no_results() {
    assert!(parse(r#"{"kind":"books#volumes","totalItems":0}"#).unwrap().is_empty());
  }

  #[test]
  fn empty_categories_is_fatal() {
    let err = parse(
      r#"{"items":[
        {"volumeInfo":{"title":"Ok","categories":["Tech"]}},
        {"volumeInfo":{"title":"Bad","categories":[]}}
      ]}"#,
    )
    .unwrap_err();
    assert!(matches!(err, FetchError::Malformed(ref m) if m.contains("item 1")), "{err}");
  }

  #[test]
  fn missing_volume_info_is_fatal() {
    let err = parse(r#"{"items":[{"id":"x"}]}"#).unwrap_err();
    assert!(matches!(err, FetchError::Malformed(_)));
  }
}
