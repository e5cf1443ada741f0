//! User accounts.
//!
//! Users are only ever created by bulk seeding; the store never updates or
//! deletes them.

use serde::Deserialize;

/// A persisted account. `password_hash` is an argon2 PHC string.
#[derive(Debug, Clone)]
pub struct User {
  pub id:            i64,
  pub username:      String,
  pub password_hash: String,
}

/// Input to [`crate::store::ShelfStore::insert_missing_users`]. The password
/// must already be hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
  pub username:      String,
  pub password_hash: String,
}

/// One row of the users seed file. Carries a plaintext password that is
/// hashed before it reaches the store.
#[derive(Debug, Clone, Deserialize)]
pub struct UserSeed {
  pub username: String,
  pub password: String,
}
