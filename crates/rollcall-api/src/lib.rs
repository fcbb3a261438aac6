//! JSON REST API for rollcall.
//!
//! Exposes an axum [`Router`] backed by a [`StoreBackend`] over any
//! [`AttendanceStore`]. Auth, TLS, and transport concerns are the caller's
//! responsibility; requests are assumed to be authorized upstream.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", rollcall_api::api_router(backend.clone()))
//! ```

pub mod error;
pub mod extract;
pub mod reports;
pub mod sessions;
pub mod slots;
pub mod students;
pub mod venues;

use std::{str::FromStr as _, sync::Arc};

use axum::{
  Router,
  routing::{get, post},
};
use rollcall_core::{
  attendance::AttendanceStatus, backend::StoreBackend, store::AttendanceStore,
};

pub use error::ApiError;

/// Build a fully-materialised API router for `backend`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(backend: Arc<StoreBackend<S>>) -> Router<()>
where
  S: AttendanceStore + 'static,
{
  Router::new()
    // Venues
    .route("/venues", get(venues::list::<S>))
    .route("/venues/{id}/roster", get(venues::roster::<S>))
    .route("/slots", get(slots::list::<S>))
    // Marking
    .route("/sessions/resolve", post(sessions::resolve::<S>))
    .route("/sessions/{id}/records", get(sessions::records::<S>))
    .route("/sessions/{id}/commit", post(sessions::commit::<S>))
    // Reports
    .route("/students/{id}/records", get(students::records::<S>))
    .route("/students/{id}/timeline", get(students::timeline::<S>))
    .route("/reports/threshold", get(reports::threshold::<S>))
    .with_state(backend)
}

/// Parse an optional wire status; a bad value is a validation error naming
/// the allowed set.
pub(crate) fn parse_status(s: Option<&str>) -> Result<Option<AttendanceStatus>, ApiError> {
  Ok(s.map(AttendanceStatus::from_str).transpose()?)
}
