//! `POST /auth/login`

use axum::{Json, extract::{State, rejection::JsonRejection}};
use serde::{Deserialize, Serialize};
use shelf_core::store::ShelfStore;

use crate::{
  AppState,
  auth::issue_token,
  error::ApiError,
};

#[derive(Debug, Deserialize)]
pub struct LoginBody {
  pub username: String,
  pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
  pub access_token: String,
  pub token_type:   &'static str,
}

/// Exchange credentials for a bearer token. An unknown user and a wrong
/// password both yield the same 401 after the same argon2 work.
pub async fn login<S>(
  State(state): State<AppState<S>>,
  body: Result<Json<LoginBody>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError>
where
  S: ShelfStore + Clone + 'static,
{
  let Json(body) = body?;

  let user = state
    .store
    .get_user(body.username.clone())
    .await
    .map_err(ApiError::store)?;

  let authenticated = state
    .auth
    .verify_login(&body.password, user.as_ref().map(|u| u.password_hash.as_str()));
  if !authenticated {
    tracing::debug!(username = %body.username, "login rejected");
    return Err(ApiError::Unauthorized);
  }

  let access_token = issue_token(&state.auth, &body.username)?;
  Ok(Json(TokenResponse { access_token, token_type: "bearer" }))
}
