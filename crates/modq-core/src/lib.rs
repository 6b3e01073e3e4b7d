//! Core types and trait definitions for the moderation queue.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! The store backend and the API layer both depend on it.

pub mod audit;
pub mod error;
pub mod item;
pub mod store;

pub use error::{Error, Result};
