//! Core types and algorithms for attendance reconciliation.
//!
//! This crate is deliberately free of HTTP and database dependencies. It
//! defines the domain model, the [`store::AttendanceStore`] persistence trait,
//! the [`backend::MarkingBackend`] trait the marking flow talks to, and the
//! pure pieces in between: merging stored records onto a roster, editing the
//! resulting buffer, committing it, and rebuilding timelines and threshold
//! reports from committed records.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod aggregate;
pub mod attendance;
pub mod backend;
pub mod buffer;
pub mod commit;
pub mod error;
pub mod flow;
pub mod merge;
pub mod resolve;
pub mod store;
pub mod timeline;
pub mod venue;

#[cfg(test)]
mod testing;

pub use error::{Error, ErrorKind, Result};
