//! JSON seed files.
//!
//! A seed file is a JSON array of records. Seeding is best-effort: a missing
//! or unreadable file yields no records and a log line, never an error.

use std::path::Path;

use serde::de::DeserializeOwned;

/// Read a JSON array of `T` from `path`. Returns an empty vector if the file
/// is missing, unreadable, or not an array of `T`.
pub async fn read_seed_file<T: DeserializeOwned>(path: &Path) -> Vec<T> {
  let raw = match tokio::fs::read_to_string(path).await {
    Ok(raw) => raw,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
      tracing::info!(path = %path.display(), "seed file does not exist, skipping");
      return Vec::new();
    }
    Err(e) => {
      tracing::error!(path = %path.display(), error = %e, "failed to read seed file");
      return Vec::new();
    }
  };

  match serde_json::from_str::<Vec<T>>(&raw) {
    Ok(rows) => rows,
    Err(e) => {
      tracing::error!(
        path = %path.display(),
        error = %e,
        "seed file must contain a JSON array of records"
      );
      Vec::new()
    }
  }
}
