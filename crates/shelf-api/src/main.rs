//! Shelf API server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) overlaid with
//! `SHELF_*` environment variables, seeds users and books, then serves the
//! JSON API over HTTP.
//!
//! # Password hash generation
//!
//! ```sh
//! cargo run -p shelf-api --bin server -- --hash-password
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use clap::Parser;
use shelf_api::{AppState, DEFAULT_JWT_SECRET, ServerConfig, auth::AuthConfig, jobs, seed};
use shelf_catalog::{CatalogRefresher, GoogleBooksClient, ReconcileOutcome};
use shelf_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Shelf book catalog server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  if cli.hash_password {
    let password = read_password()?;
    let hash = shelf_api::auth::hash_password(&password)?;
    println!("{hash}");
    return Ok(());
  }

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("SHELF")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true),
    )
    .build()
    .context("failed to read config file")?;

  let cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  if cfg.jwt_secret == DEFAULT_JWT_SECRET {
    tracing::warn!("jwt_secret is the built-in default; set SHELF_JWT_SECRET");
  }
  anyhow::ensure!(
    !cfg.refresh.enabled || cfg.refresh.interval_hours > 0,
    "refresh.interval_hours must be positive"
  );

  // Open SQLite store.
  let store_path = expand_tilde(&cfg.store_path);
  if let Some(parent) = store_path.parent().filter(|p| !p.as_os_str().is_empty()) {
    tokio::fs::create_dir_all(parent)
      .await
      .with_context(|| format!("failed to create {parent:?}"))?;
  }
  let store = Arc::new(
    SqliteStore::open(&store_path)
      .await
      .with_context(|| format!("failed to open store at {store_path:?}"))?,
  );

  // Seed users, then books.
  seed::seed_users(store.as_ref(), &expand_tilde(&cfg.users_seed_file))
    .await
    .context("failed to seed users")?;

  let fetch_timeout = Duration::from_secs(cfg.refresh.timeout_secs);
  let source = GoogleBooksClient::with_timeout(cfg.refresh.base_url.clone(), fetch_timeout)
    .context("failed to build Google Books client")?;
  let refresher = Arc::new(
    CatalogRefresher::new(store.clone(), source)
      .with_seed_file(expand_tilde(&cfg.books_seed_file))
      .with_fetch_timeout(fetch_timeout),
  );

  let seeded = refresher
    .refresh(&cfg.seed.query, cfg.seed.limit)
    .await
    .context("failed to seed books")?;
  if !seeded.is_success() {
    match refresher.reconcile(Vec::new()).await.context("failed to seed books from file")? {
      ReconcileOutcome::Reconciled { inserted } => {
        tracing::info!(inserted, "seeded books from seed file");
      }
      ReconcileOutcome::NothingToSeed => tracing::warn!("no books to seed"),
    }
  }

  // Background refresh.
  let (job_queue, _worker) = jobs::spawn_worker(refresher, cfg.refresh.clone());
  if cfg.refresh.enabled {
    let every = Duration::from_secs(cfg.refresh.interval_hours * 3600);
    jobs::spawn_schedule(job_queue.clone(), every);
    tracing::info!(interval_hours = cfg.refresh.interval_hours, "catalog refresh scheduled");
  }

  let auth = AuthConfig::new(&cfg.jwt_secret, chrono::Duration::minutes(cfg.token_ttl_minutes))
    .context("failed to build auth config")?;
  let state = AppState { store, auth: Arc::new(auth), jobs: job_queue };

  let app = shelf_api::router(state);
  let address = format!("{}:{}", cfg.host, cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Read a password from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
