//! SQLite backend for the Parkade inventory store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Capacity plans are applied inside a
//! single `IMMEDIATE` transaction, so a failed sync never leaves a lot
//! half-resized.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
