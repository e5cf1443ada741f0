use std::{sync::Arc, time::Duration};

use axum::{
  body::Body,
  http::{Request, StatusCode, header},
  response::Response,
};
use serde_json::{Value, json};
use shelf_catalog::{BookSource, CatalogRefresher, FetchError};
use shelf_core::{
  book::BookCandidate,
  store::ShelfStore as _,
  user::NewUser,
};
use shelf_store_sqlite::SqliteStore;
use tower::ServiceExt as _;

use super::*;
use crate::auth::{hash_password, issue_token};

// ─── Fixtures ────────────────────────────────────────────────────────────────

struct FixedSource(Vec<BookCandidate>);

impl BookSource for FixedSource {
  async fn search(&self, _query: &str, _max: u32) -> Result<Vec<BookCandidate>, FetchError> {
    Ok(self.0.clone())
  }
}

struct Harness {
  state: AppState<SqliteStore>,
  token: String,
}

async fn harness_with(refresh: RefreshConfig, source: Vec<BookCandidate>) -> Harness {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  store
    .insert_missing_users(vec![NewUser {
      username:      "alice".to_string(),
      password_hash: hash_password("secret").unwrap(),
    }])
    .await
    .unwrap();
  store
    .reconcile_books(vec![
      BookCandidate::new("The Go Programming Language", "Donovan & Kernighan", "Tech"),
      BookCandidate::new("Rust in Action", "Tim McNamara", "Tech"),
      BookCandidate::new("Dune", "Frank Herbert", "Fiction"),
    ])
    .await
    .unwrap();

  let refresher = Arc::new(CatalogRefresher::new(store.clone(), FixedSource(source)));
  let (jobs, _worker) = jobs::spawn_worker(refresher, refresh);

  let auth = Arc::new(AuthConfig::new("test-secret", chrono::Duration::minutes(30)).unwrap());
  let token = issue_token(&auth, "alice").unwrap();

  Harness { state: AppState { store, auth, jobs }, token }
}

async fn harness() -> Harness { harness_with(RefreshConfig::default(), vec![]).await }

async fn send(
  state: &AppState<SqliteStore>,
  method: &str,
  uri: &str,
  token: Option<&str>,
  body: Option<Value>,
) -> Response {
  let mut builder = Request::builder().method(method).uri(uri);
  if let Some(token) = token {
    builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
  }
  let body = match body {
    Some(v) => {
      builder = builder.header(header::CONTENT_TYPE, "application/json");
      Body::from(v.to_string())
    }
    None => Body::empty(),
  };
  router(state.clone()).oneshot(builder.body(body).unwrap()).await.unwrap()
}

async fn json_body(resp: Response) -> Value {
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  serde_json::from_slice(&bytes).unwrap()
}

async fn book_id(h: &Harness, title: &str) -> i64 {
  let books = h
    .state
    .store
    .list_books(shelf_core::book::BookQuery { search: Some(title.into()), ..Default::default() })
    .await
    .unwrap();
  books[0].book.id
}

// ─── Health & auth ───────────────────────────────────────────────────────────

#[tokio::test]
async fn health_is_public() {
  let h = harness().await;
  let resp = send(&h.state, "GET", "/api/v1/health", None, None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(json_body(resp).await, json!({ "status": "ok" }));
}

#[tokio::test]
async fn login_issues_bearer_token() {
  let h = harness().await;
  let resp = send(
    &h.state,
    "POST",
    "/api/v1/auth/login",
    None,
    Some(json!({ "username": "alice", "password": "secret" })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);

  let body = json_body(resp).await;
  assert_eq!(body["token_type"], "bearer");
  let token = body["access_token"].as_str().unwrap();

  let resp = send(&h.state, "GET", "/api/v1/books", Some(token), None).await;
  assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn login_does_not_reveal_which_part_was_wrong() {
  let h = harness().await;
  let wrong_password = send(
    &h.state,
    "POST",
    "/api/v1/auth/login",
    None,
    Some(json!({ "username": "alice", "password": "nope" })),
  )
  .await;
  let unknown_user = send(
    &h.state,
    "POST",
    "/api/v1/auth/login",
    None,
    Some(json!({ "username": "mallory", "password": "secret" })),
  )
  .await;

  assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
  assert_eq!(unknown_user.status(), StatusCode::UNAUTHORIZED);
  assert_eq!(json_body(wrong_password).await, json_body(unknown_user).await);
}

#[tokio::test]
async fn unknown_user_login_takes_as_long_as_wrong_password() {
  let h = harness().await;

  async fn timed(state: &AppState<SqliteStore>, username: &str) -> Duration {
    let mut total = Duration::ZERO;
    for _ in 0..3 {
      let start = std::time::Instant::now();
      let resp = send(
        state,
        "POST",
        "/api/v1/auth/login",
        None,
        Some(json!({ "username": username, "password": "nope" })),
      )
      .await;
      total += start.elapsed();
      assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
    total
  }

  let wrong_password = timed(&h.state, "alice").await;
  let unknown_user = timed(&h.state, "mallory").await;

  // Both paths are dominated by one argon2 verification.
  assert!(
    unknown_user * 4 >= wrong_password,
    "unknown user {unknown_user:?} vs wrong password {wrong_password:?}"
  );
}

#[tokio::test]
async fn login_with_malformed_body_is_422() {
  let h = harness().await;
  let resp = send(&h.state, "POST", "/api/v1/auth/login", None, Some(json!({ "username": "alice" })))
    .await;
  assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
  assert!(json_body(resp).await["error"].is_string());
}

#[tokio::test]
async fn protected_routes_require_bearer_token() {
  let h = harness().await;
  let resp = send(&h.state, "GET", "/api/v1/books", None, None).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  assert_eq!(resp.headers().get(header::WWW_AUTHENTICATE).unwrap(), "Bearer");

  let resp = send(&h.state, "GET", "/api/v1/books", Some("garbage"), None).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

  let resp = send(&h.state, "POST", "/api/v1/books/refresh-books", None, None).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_token_is_unauthorized() {
  let h = harness().await;
  let expired = AuthConfig::new("test-secret", chrono::Duration::minutes(-10)).unwrap();
  let token = issue_token(&expired, "alice").unwrap();

  let resp = send(&h.state, "GET", "/api/v1/books", Some(&token), None).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// ─── Books ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn list_books_hides_ids_and_reports_null_average() {
  let h = harness().await;
  let resp = send(&h.state, "GET", "/api/v1/books", Some(&h.token), None).await;
  assert_eq!(resp.status(), StatusCode::OK);

  let body = json_body(resp).await;
  let books = body.as_array().unwrap();
  assert_eq!(books.len(), 3);
  assert_eq!(books[0], json!({
    "title": "Dune",
    "author": "Frank Herbert",
    "genre": "Fiction",
    "average_rating": null,
  }));
}

#[tokio::test]
async fn list_books_search_is_case_insensitive() {
  let h = harness().await;
  for needle in ["go", "GO"] {
    let resp = send(&h.state, "GET", &format!("/api/v1/books?search={needle}"), Some(&h.token), None)
      .await;
    let body = json_body(resp).await;
    let titles: Vec<&str> = body
      .as_array()
      .unwrap()
      .iter()
      .map(|b| b["title"].as_str().unwrap())
      .collect();
    assert_eq!(titles, vec!["The Go Programming Language"], "search={needle}");
  }
}

#[tokio::test]
async fn list_books_paginates() {
  let h = harness().await;
  let resp = send(&h.state, "GET", "/api/v1/books?limit=1&offset=1", Some(&h.token), None).await;
  let body = json_body(resp).await;
  assert_eq!(body.as_array().unwrap().len(), 1);
  assert_eq!(body[0]["title"], "Rust in Action");
}

#[tokio::test]
async fn list_books_rejects_out_of_range_paging() {
  let h = harness().await;
  for query in ["limit=0", "limit=101", "offset=-1", "limit=abc"] {
    let resp = send(&h.state, "GET", &format!("/api/v1/books?{query}"), Some(&h.token), None).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY, "{query}");
  }
}

// ─── Reviews ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn review_upsert_creates_then_updates_in_place() {
  let h = harness().await;
  let id = book_id(&h, "Dune").await;
  let uri = format!("/api/v1/books/{id}/reviews");

  let first = send(&h.state, "POST", &uri, Some(&h.token), Some(json!({ "rating": 4, "review_text": "good" })))
    .await;
  assert_eq!(first.status(), StatusCode::OK);
  let first = json_body(first).await;
  assert_eq!(first["username"], "alice");
  assert_eq!(first["book_id"], id);
  assert_eq!(first["rating"], 4);

  let second = send(&h.state, "POST", &uri, Some(&h.token), Some(json!({ "rating": 2, "review_text": "meh" })))
    .await;
  let second = json_body(second).await;
  assert_eq!(second["id"], first["id"]);
  assert_eq!(second["rating"], 2);
  assert_eq!(second["review_text"], "meh");

  let listed = json_body(send(&h.state, "GET", &uri, Some(&h.token), None).await).await;
  assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn review_author_comes_from_token() {
  let h = harness().await;
  let id = book_id(&h, "Dune").await;
  let resp = send(
    &h.state,
    "POST",
    &format!("/api/v1/books/{id}/reviews"),
    Some(&h.token),
    Some(json!({ "rating": 5, "review_text": "x", "username": "mallory" })),
  )
  .await;
  assert_eq!(json_body(resp).await["username"], "alice");
}

#[tokio::test]
async fn review_text_defaults_to_empty() {
  let h = harness().await;
  let id = book_id(&h, "Dune").await;
  let resp = send(&h.state, "POST", &format!("/api/v1/books/{id}/reviews"), Some(&h.token), Some(json!({ "rating": 3 })))
    .await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(json_body(resp).await["review_text"], "");
}

#[tokio::test]
async fn review_for_missing_book_is_404() {
  let h = harness().await;
  let resp = send(&h.state, "POST", "/api/v1/books/999/reviews", Some(&h.token), Some(json!({ "rating": 3, "review_text": "x" })))
    .await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);

  let resp = send(&h.state, "GET", "/api/v1/books/999/reviews", Some(&h.token), None).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_review_is_422_and_not_stored() {
  let h = harness().await;
  let id = book_id(&h, "Dune").await;
  let uri = format!("/api/v1/books/{id}/reviews");

  for body in [
    json!({ "rating": 0, "review_text": "x" }),
    json!({ "rating": 6, "review_text": "x" }),
    json!({ "rating": "five", "review_text": "x" }),
    json!({ "rating": 3, "review_text": "a".repeat(2049) }),
  ] {
    let resp = send(&h.state, "POST", &uri, Some(&h.token), Some(body.clone())).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY, "{body}");
  }

  let resp = send(&h.state, "POST", "/api/v1/books/abc/reviews", Some(&h.token), Some(json!({ "rating": 3 })))
    .await;
  assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

  let listed = json_body(send(&h.state, "GET", &uri, Some(&h.token), None).await).await;
  assert!(listed.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn average_rating_reflects_reviews() {
  let h = harness().await;
  let id = book_id(&h, "Dune").await;

  let bob = issue_token(&h.state.auth, "bob").unwrap();
  for (token, rating) in [(h.token.as_str(), 5), (bob.as_str(), 3)] {
    send(&h.state, "POST", &format!("/api/v1/books/{id}/reviews"), Some(token), Some(json!({ "rating": rating, "review_text": "" })))
      .await;
  }

  let body = json_body(send(&h.state, "GET", "/api/v1/books?search=dune", Some(&h.token), None).await).await;
  assert_eq!(body[0]["average_rating"], 4.0);
}

// ─── Refresh jobs ────────────────────────────────────────────────────────────

async fn wait_for_task(h: &Harness, task_id: &str) -> Value {
  for _ in 0..100 {
    let resp = send(&h.state, "GET", &format!("/api/v1/tasks/{task_id}"), Some(&h.token), None).await;
    let record = json_body(resp).await;
    if record["status"] == "completed" || record["status"] == "failed" {
      return record;
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
  }
  panic!("task {task_id} did not finish");
}

#[tokio::test]
async fn refresh_is_queued_and_reconciles() {
  let h = harness_with(RefreshConfig::default(), vec![
    BookCandidate::new("Fluent Python", "Luciano Ramalho", "Tech"),
    BookCandidate::new("Dune", "Frank Herbert", "Fiction"),
  ])
  .await;

  let resp = send(&h.state, "POST", "/api/v1/books/refresh-books", Some(&h.token), None).await;
  assert_eq!(resp.status(), StatusCode::ACCEPTED);
  let accepted = json_body(resp).await;
  assert_eq!(accepted["status"], "queued");

  let record = wait_for_task(&h, accepted["task_id"].as_str().unwrap()).await;
  assert_eq!(record["status"], "completed");
  assert_eq!(record["outcome"], json!({ "kind": "reconciled", "fetched": 2, "inserted": 1 }));

  let books = json_body(send(&h.state, "GET", "/api/v1/books", Some(&h.token), None).await).await;
  assert_eq!(books.as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn disabled_refresh_completes_as_skipped() {
  let refresh = RefreshConfig { enabled: false, ..RefreshConfig::default() };
  let h = harness_with(refresh, vec![BookCandidate::new("Fluent Python", "Luciano Ramalho", "Tech")])
    .await;

  let accepted = json_body(send(&h.state, "POST", "/api/v1/books/refresh-books", Some(&h.token), None).await)
    .await;
  let record = wait_for_task(&h, accepted["task_id"].as_str().unwrap()).await;
  assert_eq!(record["outcome"], json!({ "kind": "skipped" }));

  let books = json_body(send(&h.state, "GET", "/api/v1/books", Some(&h.token), None).await).await;
  assert_eq!(books.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn empty_fetch_completes_as_nothing_to_seed() {
  let h = harness().await;
  let accepted = json_body(send(&h.state, "POST", "/api/v1/books/refresh-books", Some(&h.token), None).await)
    .await;
  let record = wait_for_task(&h, accepted["task_id"].as_str().unwrap()).await;
  assert_eq!(record["status"], "completed");
  assert_eq!(record["outcome"], json!({ "kind": "nothing_to_seed" }));
}

#[tokio::test]
async fn unknown_task_is_404() {
  let h = harness().await;
  let resp = send(
    &h.state,
    "GET",
    &format!("/api/v1/tasks/{}", uuid::Uuid::new_v4()),
    Some(&h.token),
    None,
  )
  .await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);

  let resp = send(&h.state, "GET", "/api/v1/tasks/not-a-uuid", Some(&h.token), None).await;
  assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// ─── Seeding ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn seed_users_hashes_and_never_overwrites() {
  let h = harness().await;
  let path = std::env::temp_dir().join(format!("shelf-api-users-{}.json", std::process::id()));
  tokio::fs::write(
    &path,
    r#"[
      {"username":"alice","password":"changed"},
      {"username":"bob","password":"hunter2"},
      {"username":"  ","password":"x"}
    ]"#,
  )
  .await
  .unwrap();

  let inserted = seed::seed_users(h.state.store.as_ref(), &path).await.unwrap();
  assert_eq!(inserted, 1);
  tokio::fs::remove_file(&path).await.ok();

  let bob = h.state.store.get_user("bob".into()).await.unwrap().unwrap();
  assert_ne!(bob.password_hash, "hunter2");
  assert!(auth::verify_password("hunter2", &bob.password_hash));

  let alice = h.state.store.get_user("alice".into()).await.unwrap().unwrap();
  assert!(auth::verify_password("secret", &alice.password_hash));
}

#[tokio::test]
async fn seed_users_with_missing_file_seeds_nothing() {
  let h = harness().await;
  let inserted = seed::seed_users(h.state.store.as_ref(), std::path::Path::new("/nonexistent/users.json"))
    .await
    .unwrap();
  assert_eq!(inserted, 0);
}
