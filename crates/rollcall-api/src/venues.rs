//! Handlers for `/venues` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/venues` | Optional `?faculty_id=`; without it the requester is an administrator |
//! | `GET`  | `/venues/{id}/roster` | 404 if the venue does not exist |

use std::sync::Arc;

use axum::{
  Json,
  extract::State,
};
use rollcall_core::{
  attendance::RosterEntry,
  backend::{MarkingBackend, StoreBackend},
  store::AttendanceStore,
  venue::{Requester, Venue},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  error::{ApiError, store_err},
  extract::{ApiPath, ApiQuery},
};

#[derive(Debug, Deserialize)]
pub struct ListParams {
  /// The faculty member asking. Faculty see only their own venues.
  pub faculty_id: Option<Uuid>,
}

impl ListParams {
  fn requester(&self) -> Requester {
    self.faculty_id.map_or(Requester::Admin, Requester::Faculty)
  }
}

/// `GET /venues[?faculty_id=<id>]`
pub async fn list<S: AttendanceStore + 'static>(
  State(backend): State<Arc<StoreBackend<S>>>,
  ApiQuery(params): ApiQuery<ListParams>,
) -> Result<Json<Vec<Venue>>, ApiError> {
  let venues = backend
    .store()
    .list_venues(params.requester().faculty_scope())
    .await
    .map_err(store_err)?;
  Ok(Json(venues))
}

/// `GET /venues/{id}/roster`
pub async fn roster<S: AttendanceStore + 'static>(
  State(backend): State<Arc<StoreBackend<S>>>,
  ApiPath(venue_id): ApiPath<Uuid>,
) -> Result<Json<Vec<RosterEntry>>, ApiError> {
  Ok(Json(backend.roster(venue_id).await?))
}
