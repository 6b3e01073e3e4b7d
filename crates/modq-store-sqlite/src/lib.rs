//! SQLite backend for the moderation queue.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Several [`SqliteStore`]s, in one
//! process or many, may share a database file; all coordination between them
//! goes through SQLite transactions.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::{SqliteStore, StoreOptions};

#[cfg(test)]
mod tests;
