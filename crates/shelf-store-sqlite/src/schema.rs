//! SQL schema for the Shelf SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// Both uniqueness invariants live here: `(title, author)` on books and
/// `(book_id, username)` on reviews. The review upsert relies on the latter
/// to detect a lost insert race.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Books are inserted by catalog reconciliation only and never updated.
CREATE TABLE IF NOT EXISTS books (
    id      INTEGER PRIMARY KEY AUTOINCREMENT,
    title   TEXT NOT NULL CHECK (length(trim(title))  > 0),
    author  TEXT NOT NULL CHECK (length(trim(author)) > 0),
    genre   TEXT NOT NULL CHECK (length(trim(genre))  > 0),
    UNIQUE (title, author)
);

CREATE TABLE IF NOT EXISTS reviews (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    book_id     INTEGER NOT NULL REFERENCES books(id) ON DELETE CASCADE,
    username    TEXT    NOT NULL,
    rating      INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
    review_text TEXT    NOT NULL DEFAULT '',
    created_at  TEXT    NOT NULL,   -- RFC 3339 UTC, fixed microsecond width
    updated_at  TEXT    NOT NULL,
    UNIQUE (book_id, username)
);

CREATE TABLE IF NOT EXISTS users (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    username      TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL     -- argon2 PHC string
);

CREATE INDEX IF NOT EXISTS books_title_idx          ON books(title);
CREATE INDEX IF NOT EXISTS reviews_book_created_idx ON reviews(book_id, created_at);

PRAGMA user_version = 1;
";
