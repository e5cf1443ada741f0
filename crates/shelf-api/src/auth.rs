//! Password hashing, bearer tokens, and the [`CurrentUser`] extractor.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use shelf_core::store::ShelfStore;

use crate::{AppState, error::ApiError};

/// Signing material for access tokens.
#[derive(Clone)]
pub struct AuthConfig {
  encoding:      EncodingKey,
  decoding:      DecodingKey,
  /// Verified against when the username is unknown, so both login failures
  /// pay for one argon2 run.
  dummy_hash:    String,
  pub token_ttl: Duration,
}

impl AuthConfig {
  pub fn new(secret: &str, token_ttl: Duration) -> Result<Self, ApiError> {
    Ok(Self {
      encoding: EncodingKey::from_secret(secret.as_bytes()),
      decoding: DecodingKey::from_secret(secret.as_bytes()),
      dummy_hash: hash_password("shelf-unknown-user")?,
      token_ttl,
    })
  }

  /// Check `password` against the stored hash, or against a throwaway hash
  /// when there is no user. Always runs argon2 exactly once.
  pub fn verify_login(&self, password: &str, stored_hash: Option<&str>) -> bool {
    match stored_hash {
      Some(hash) => verify_password(password, hash),
      None => {
        let _ = verify_password(password, &self.dummy_hash);
        false
      }
    }
  }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
  pub sub: String,
  pub iat: i64,
  pub exp: i64,
}

/// Sign an HS256 access token for `username`, valid for `config.token_ttl`.
pub fn issue_token(config: &AuthConfig, username: &str) -> Result<String, ApiError> {
  let now = Utc::now();
  let claims = Claims {
    sub: username.to_owned(),
    iat: now.timestamp(),
    exp: (now + config.token_ttl).timestamp(),
  };
  jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &config.encoding)
    .map_err(|e| ApiError::Internal(format!("token signing failed: {e}")))
}

/// Check signature and expiry and return the subject.
pub fn verify_token(config: &AuthConfig, token: &str) -> Result<String, ApiError> {
  let data = jsonwebtoken::decode::<Claims>(
    token,
    &config.decoding,
    &Validation::new(Algorithm::HS256),
  )
  .map_err(|_| ApiError::Unauthorized)?;

  if data.claims.sub.is_empty() {
    return Err(ApiError::Unauthorized);
  }
  Ok(data.claims.sub)
}

/// Argon2 PHC string for `password` with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|h| h.to_string())
    .map_err(|e| ApiError::Internal(format!("argon2 error: {e}")))
}

/// `false` for a wrong password and for an unparseable stored hash alike.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
  PasswordHash::new(password_hash)
    .map(|parsed| {
      Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
    })
    .unwrap_or(false)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
  let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
  let (scheme, token) = value.split_once(' ')?;
  scheme.eq_ignore_ascii_case("bearer").then_some(token.trim())
}

/// The username carried by a valid bearer token.
pub struct CurrentUser(pub String);

impl<S> FromRequestParts<AppState<S>> for CurrentUser
where
  S: ShelfStore + Clone + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let token = bearer_token(&parts.headers).ok_or(ApiError::Unauthorized)?;
    verify_token(&state.auth, token).map(CurrentUser)
  }
}
