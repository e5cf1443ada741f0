//! The `ShelfStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `shelf-store-sqlite`).
//! Higher layers (`shelf-catalog`, `shelf-api`) depend on this abstraction,
//! not on any concrete backend.

use std::future::Future;

use crate::{
  book::{Book, BookCandidate, BookQuery, RatedBook},
  review::{Review, ReviewUpsert},
  user::{NewUser, User},
};

/// Abstraction over a Shelf store backend.
///
/// Every method is one logical operation; implementations hold no state
/// between calls beyond the connection itself.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait ShelfStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Books ─────────────────────────────────────────────────────────────

  /// Retrieve a book by id. Returns `None` if not found.
  fn get_book(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Book>, Self::Error>> + Send + '_;

  /// Insert every candidate whose `(title, author)` pair is not already
  /// present, in a single transaction. Returns the number of rows inserted.
  ///
  /// Duplicates within `candidates` are inserted once.
  fn reconcile_books(
    &self,
    candidates: Vec<BookCandidate>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Books joined with their average rating, filtered by `query.search`,
  /// ordered by title and paginated.
  fn list_books(
    &self,
    query: BookQuery,
  ) -> impl Future<Output = Result<Vec<RatedBook>, Self::Error>> + Send + '_;

  // ── Reviews ───────────────────────────────────────────────────────────

  /// Create or update the single review for `(input.book_id,
  /// input.username)`. Safe against a concurrent upsert of the same pair;
  /// the last write wins.
  ///
  /// The caller must have checked that the book exists.
  fn upsert_review(
    &self,
    input: ReviewUpsert,
  ) -> impl Future<Output = Result<Review, Self::Error>> + Send + '_;

  /// All reviews for a book, newest first. Returns `None` if the book does
  /// not exist.
  fn reviews_for_book(
    &self,
    book_id: i64,
  ) -> impl Future<Output = Result<Option<Vec<Review>>, Self::Error>> + Send + '_;

  // ── Users ─────────────────────────────────────────────────────────────

  /// Retrieve a user by username. Returns `None` if not found.
  fn get_user(
    &self,
    username: String,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// Insert the users whose username is not taken yet; existing accounts are
  /// never overwritten. Returns the number of rows inserted.
  fn insert_missing_users(
    &self,
    users: Vec<NewUser>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;
}
