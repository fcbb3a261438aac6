//! SQLite backend for the rollcall attendance store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime.

mod encode;
mod schema;
mod store;

pub mod error;
pub mod fixture;

pub use error::{Error, Result};
pub use fixture::Fixture;
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
