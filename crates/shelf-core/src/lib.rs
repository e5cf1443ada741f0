//! Core types and trait definitions for the Shelf book catalog.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

pub mod book;
pub mod error;
pub mod review;
pub mod store;
pub mod user;

pub use error::{Error, Result};
