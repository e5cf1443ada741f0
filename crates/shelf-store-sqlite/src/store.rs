//! The SQLite implementation of [`ShelfStore`].

use std::{collections::HashSet, path::Path};

use chrono::Utc;
use rusqlite::{OptionalExtension as _, TransactionBehavior, functions::FunctionFlags};

use shelf_core::{
  book::{Book, BookCandidate, BookQuery, RatedBook},
  review::{Review, ReviewUpsert},
  store::ShelfStore,
  user::{NewUser, User},
};

use crate::{
  encode::{
    BOOK_COLUMNS, REVIEW_COLUMNS, RawReview, book_from_row, encode_dt,
    is_unique_violation, rated_book_from_row, user_from_row,
  },
  schema::SCHEMA,
  Error, Result,
};

/// Usernames looked up per `IN (...)` query while bulk-seeding.
const USERNAME_LOOKUP_CHUNK: usize = 500;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Shelf store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

/// Result of a single insert attempt for a review.
#[derive(Debug)]
pub(crate) enum InsertOutcome {
  Inserted(Review),
  /// Another writer committed a review for the same pair first. The attempt
  /// was rolled back.
  Conflict,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        // Unicode lowercase; SQLite's own lower() folds ASCII only.
        conn.create_scalar_function(
          "shelf_fold",
          1,
          FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
          |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|t| t.to_lowercase()))
          },
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Review upsert steps ─────────────────────────────────────────────────
  //
  // Each step is its own round trip to the connection thread, so two upserts
  // of the same pair can interleave between the lookup and the insert. The
  // `UNIQUE (book_id, username)` constraint turns the loser's insert into an
  // `InsertOutcome::Conflict`, which `upsert_review` resolves by updating.

  pub(crate) async fn find_review(
    &self,
    book_id: i64,
    username: String,
  ) -> Result<Option<Review>> {
    let raw: Option<RawReview> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {REVIEW_COLUMNS} FROM reviews WHERE book_id = ?1 AND username = ?2"
            ),
            rusqlite::params![book_id, username],
            RawReview::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawReview::into_review).transpose()
  }

  pub(crate) async fn insert_review(&self, input: &ReviewUpsert) -> Result<InsertOutcome> {
    let now         = Utc::now();
    let now_str     = encode_dt(now);
    let book_id     = input.book_id;
    let username    = input.username.clone();
    let rating      = i64::from(input.rating);
    let review_text = input.review_text.clone();

    let id: Option<i64> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let result = tx.execute(
          "INSERT INTO reviews (book_id, username, rating, review_text, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
          rusqlite::params![book_id, username, rating, review_text, now_str],
        );
        match result {
          Ok(_) => {}
          // Dropping `tx` rolls the attempt back.
          Err(e) if is_unique_violation(&e) => return Ok(None),
          Err(e) => return Err(e.into()),
        }
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(Some(id))
      })
      .await?;

    Ok(match id {
      Some(id) => InsertOutcome::Inserted(Review {
        id,
        book_id:     input.book_id,
        username:    input.username.clone(),
        rating:      input.rating,
        review_text: input.review_text.clone(),
        created_at:  now,
        updated_at:  now,
      }),
      None => InsertOutcome::Conflict,
    })
  }

  /// Overwrite rating and text of the existing review for the pair and
  /// return the refreshed row. Returns `None` if no such review exists.
  pub(crate) async fn update_review(&self, input: &ReviewUpsert) -> Result<Option<Review>> {
    let now_str     = encode_dt(Utc::now());
    let book_id     = input.book_id;
    let username    = input.username.clone();
    let rating      = i64::from(input.rating);
    let review_text = input.review_text.clone();

    let raw: Option<RawReview> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let changed = tx.execute(
          "UPDATE reviews SET rating = ?3, review_text = ?4, updated_at = ?5
           WHERE book_id = ?1 AND username = ?2",
          rusqlite::params![book_id, username, rating, review_text, now_str],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        let raw = tx.query_row(
          &format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE book_id = ?1 AND username = ?2"
          ),
          rusqlite::params![book_id, username],
          RawReview::from_row,
        )?;
        tx.commit()?;
        Ok(Some(raw))
      })
      .await?;

    raw.map(RawReview::into_review).transpose()
  }

  /// Update the pair's review, which must exist. After a lost insert race the
  /// winner's row is visible by now, so this write lands on top of it.
  pub(crate) async fn apply_update(&self, input: &ReviewUpsert) -> Result<Review> {
    self
      .update_review(input)
      .await?
      .ok_or_else(|| Error::ReviewVanished {
        book_id:  input.book_id,
        username: input.username.clone(),
      })
  }
}

// ─── ShelfStore impl ─────────────────────────────────────────────────────────

impl ShelfStore for SqliteStore {
  type Error = Error;

  // ── Books ─────────────────────────────────────────────────────────────────

  async fn get_book(&self, id: i64) -> Result<Option<Book>> {
    let book = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = ?1"),
            rusqlite::params![id],
            book_from_row,
          )
          .optional()?)
      })
      .await?;
    Ok(book)
  }

  async fn reconcile_books(&self, candidates: Vec<BookCandidate>) -> Result<usize> {
    if candidates.is_empty() {
      return Ok(0);
    }

    let inserted = self
      .conn
      .call(move |conn| {
        // IMMEDIATE takes the write lock up front, so the existence checks
        // and inserts below are not interleaved with another writer.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut inserted = 0usize;
        {
          let mut exists =
            tx.prepare("SELECT 1 FROM books WHERE title = ?1 AND author = ?2")?;
          let mut insert =
            tx.prepare("INSERT INTO books (title, author, genre) VALUES (?1, ?2, ?3)")?;

          for candidate in &candidates {
            if exists.exists(rusqlite::params![candidate.title, candidate.author])? {
              continue;
            }
            insert.execute(rusqlite::params![
              candidate.title,
              candidate.author,
              candidate.genre,
            ])?;
            inserted += 1;
          }
        }
        tx.commit()?;
        Ok(inserted)
      })
      .await?;

    Ok(inserted)
  }

  async fn list_books(&self, query: BookQuery) -> Result<Vec<RatedBook>> {
    // Folded the same way `shelf_fold` folds the columns.
    let needle = query
      .search
      .filter(|s| !s.is_empty())
      .map(|s| s.to_lowercase());
    let limit  = i64::from(query.limit);
    let offset = i64::from(query.offset);

    let rows = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT b.id, b.title, b.author, b.genre, AVG(r.rating) AS average_rating
           FROM books b
           LEFT JOIN reviews r ON r.book_id = b.id
           WHERE ?1 IS NULL
              OR instr(shelf_fold(b.title),  ?1) > 0
              OR instr(shelf_fold(b.author), ?1) > 0
           GROUP BY b.id
           ORDER BY b.title ASC, b.id ASC
           LIMIT ?2 OFFSET ?3",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![needle, limit, offset], rated_book_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(rows)
  }

  // ── Reviews ───────────────────────────────────────────────────────────────

  async fn upsert_review(&self, input: ReviewUpsert) -> Result<Review> {
    if self
      .find_review(input.book_id, input.username.clone())
      .await?
      .is_some()
    {
      return self.apply_update(&input).await;
    }

    match self.insert_review(&input).await? {
      InsertOutcome::Inserted(review) => Ok(review),
      InsertOutcome::Conflict => self.apply_update(&input).await,
    }
  }

  async fn reviews_for_book(&self, book_id: i64) -> Result<Option<Vec<Review>>> {
    let raws: Option<Vec<RawReview>> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let exists = tx
          .prepare("SELECT 1 FROM books WHERE id = ?1")?
          .exists(rusqlite::params![book_id])?;
        if !exists {
          return Ok(None);
        }

        let rows = {
          let mut stmt = tx.prepare(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews
             WHERE book_id = ?1
             ORDER BY created_at DESC, id DESC"
          ))?;
          stmt
            .query_map(rusqlite::params![book_id], RawReview::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        tx.commit()?;
        Ok(Some(rows))
      })
      .await?;

    raws
      .map(|rows| rows.into_iter().map(RawReview::into_review).collect())
      .transpose()
  }

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn get_user(&self, username: String) -> Result<Option<User>> {
    let user = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT id, username, password_hash FROM users WHERE username = ?1",
            rusqlite::params![username],
            user_from_row,
          )
          .optional()?)
      })
      .await?;
    Ok(user)
  }

  async fn insert_missing_users(&self, users: Vec<NewUser>) -> Result<usize> {
    // First occurrence wins for usernames repeated within the batch.
    let mut seen = HashSet::new();
    let batch: Vec<NewUser> = users
      .into_iter()
      .filter(|u| seen.insert(u.username.clone()))
      .collect();

    if batch.is_empty() {
      return Ok(0);
    }

    let inserted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        // Chunked to stay under SQLite's bound-parameter limit.
        let mut existing = HashSet::new();
        for chunk in batch.chunks(USERNAME_LOOKUP_CHUNK) {
          let placeholders = vec!["?"; chunk.len()].join(", ");
          let mut stmt = tx.prepare(&format!(
            "SELECT username FROM users WHERE username IN ({placeholders})"
          ))?;
          let rows = stmt.query_map(
            rusqlite::params_from_iter(chunk.iter().map(|u| u.username.as_str())),
            |row| row.get::<_, String>(0),
          )?;
          for username in rows {
            existing.insert(username?);
          }
        }

        let mut inserted = 0usize;
        {
          let mut insert =
            tx.prepare("INSERT INTO users (username, password_hash) VALUES (?1, ?2)")?;
          for user in batch.iter().filter(|u| !existing.contains(&u.username)) {
            insert.execute(rusqlite::params![user.username, user.password_hash])?;
            inserted += 1;
          }
        }

        if inserted > 0 {
          tx.commit()?;
        }
        Ok(inserted)
      })
      .await?;

    Ok(inserted)
  }
}
