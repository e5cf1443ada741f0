//! JSON HTTP API for Shelf.
//!
//! Exposes an axum [`Router`] backed by any [`ShelfStore`], with bearer-token
//! auth and an in-process job queue for catalog refreshes.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = shelf_api::router(state);
//! axum::serve(listener, app).await?;
//! ```

pub mod auth;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod seed;

pub use error::ApiError;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post},
};
use serde::Deserialize;
use shelf_catalog::google::GOOGLE_BOOKS_URL;
use shelf_core::store::ShelfStore;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use auth::AuthConfig;
use handlers::{books, reviews, tasks};
use jobs::JobQueue;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `SHELF_*` environment variables. Every field has a default.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:              String,
  pub port:              u16,
  pub store_path:        PathBuf,
  pub jwt_secret:        String,
  pub token_ttl_minutes: i64,
  pub users_seed_file:   PathBuf,
  pub books_seed_file:   PathBuf,
  pub seed:              SeedConfig,
  pub refresh:           RefreshConfig,
}

pub const DEFAULT_JWT_SECRET: &str = "change-me";

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:              "127.0.0.1".to_string(),
      port:              8000,
      store_path:        PathBuf::from("~/.local/share/shelf/shelf.db"),
      jwt_secret:        DEFAULT_JWT_SECRET.to_string(),
      token_ttl_minutes: 30,
      users_seed_file:   PathBuf::from("data/users_seed.json"),
      books_seed_file:   PathBuf::from("data/books_seed.json"),
      seed:              SeedConfig::default(),
      refresh:           RefreshConfig::default(),
    }
  }
}

/// The one-off catalog fetch run at startup.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SeedConfig {
  pub query: String,
  pub limit: u32,
}

impl Default for SeedConfig {
  fn default() -> Self { Self { query: "python development".to_string(), limit: 10 } }
}

/// The scheduled and on-demand catalog refresh.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RefreshConfig {
  pub enabled:        bool,
  pub base_url:       String,
  pub query:          String,
  pub max_results:    u32,
  pub interval_hours: u64,
  pub timeout_secs:   u64,
}

impl Default for RefreshConfig {
  fn default() -> Self {
    Self {
      enabled:        true,
      base_url:       GOOGLE_BOOKS_URL.to_string(),
      query:          "python programming".to_string(),
      max_results:    20,
      interval_hours: 12,
      timeout_secs:   10,
    }
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: ShelfStore> {
  pub store: Arc<S>,
  pub auth:  Arc<AuthConfig>,
  pub jobs:  JobQueue,
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full API router, mounted under `/api/v1`.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: ShelfStore + Clone + 'static,
{
  let api = Router::new()
    .route("/health", get(handlers::health))
    .route("/auth/login", post(handlers::auth::login::<S>))
    // Books
    .route("/books", get(books::list::<S>))
    .route("/books/refresh-books", post(books::refresh::<S>))
    // Reviews
    .route(
      "/books/{book_id}/reviews",
      get(reviews::list::<S>).post(reviews::upsert::<S>),
    )
    // Jobs
    .route("/tasks/{task_id}", get(tasks::get_one::<S>));

  Router::new()
    .nest("/api/v1", api)
    .layer(TraceLayer::new_for_http())
    .layer(CorsLayer::permissive())
    .with_state(state)
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests;
