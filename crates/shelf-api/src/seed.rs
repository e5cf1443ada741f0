//! Startup user seeding.

use std::path::Path;

use shelf_catalog::seed::read_seed_file;
use shelf_core::{
  store::ShelfStore,
  user::{NewUser, UserSeed},
};

use crate::auth::hash_password;

/// Hash and insert every user in the seed file whose username is free.
///
/// Rows with a blank username or password are skipped. A missing or invalid
/// file seeds nothing. Existing accounts are never touched. Returns the number
/// of accounts created.
pub async fn seed_users<S: ShelfStore>(store: &S, path: &Path) -> Result<usize, S::Error> {
  let rows: Vec<UserSeed> = read_seed_file(path).await;

  let users: Vec<NewUser> = rows
    .into_iter()
    .filter_map(|row| {
      let username = row.username.trim();
      if username.is_empty() || row.password.is_empty() {
        tracing::warn!(username = %row.username, "skipping user seed row with blank field");
        return None;
      }
      match hash_password(&row.password) {
        Ok(password_hash) => Some(NewUser { username: username.to_owned(), password_hash }),
        Err(e) => {
          tracing::warn!(username, error = %e, "skipping user seed row");
          None
        }
      }
    })
    .collect();

  if users.is_empty() {
    return Ok(0);
  }

  let inserted = store.insert_missing_users(users).await?;
  tracing::info!(inserted, "seeded users");
  Ok(inserted)
}
