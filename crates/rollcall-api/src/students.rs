//! Handlers for `/students/{id}` read endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/students/{id}/records` | Optional `?year=`, `?from=`, `?to=` (inclusive) |
//! | `GET`  | `/students/{id}/timeline` | Same range params plus `?status=` and `?text=` filters |
//!
//! Both return 404 for an unknown student.

use std::sync::Arc;

use axum::{
  Json,
  extract::State,
};
use chrono::NaiveDate;
use rollcall_core::{
  attendance::{RecordQuery, SessionRecord},
  backend::StoreBackend,
  store::AttendanceStore,
  timeline::{self, DayTimeline, TimelineFilter, TimelineSummary},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  error::{ApiError, store_err},
  extract::{ApiPath, ApiQuery},
  parse_status,
};

#[derive(Debug, Default, Deserialize)]
pub struct RangeParams {
  pub year: Option<i32>,
  pub from: Option<NaiveDate>,
  pub to:   Option<NaiveDate>,
}

impl RangeParams {
  fn query(&self, student_id: Uuid) -> RecordQuery {
    RecordQuery {
      year: self.year,
      from: self.from,
      to: self.to,
      ..RecordQuery::for_student(student_id)
    }
  }
}

/// `GET /students/{id}/records[?year=][&from=][&to=]`
pub async fn records<S: AttendanceStore + 'static>(
  State(backend): State<Arc<StoreBackend<S>>>,
  ApiPath(student_id): ApiPath<Uuid>,
  ApiQuery(params): ApiQuery<RangeParams>,
) -> Result<Json<Vec<SessionRecord>>, ApiError> {
  Ok(Json(student_records(&backend, params.query(student_id)).await?))
}

/// A known student's records, in date and slot catalogue order.
async fn student_records<S: AttendanceStore>(
  backend: &StoreBackend<S>,
  query: RecordQuery,
) -> Result<Vec<SessionRecord>, ApiError> {
  if let Some(student_id) = query.student_id {
    backend.student(student_id).await?;
  }
  let mut records = backend.store().list_records(query).await.map_err(store_err)?;
  timeline::order_by_catalogue(&mut records, backend.catalogue());
  Ok(records)
}

// ─── Timeline ────────────────────────────────────────────────────────────────

// Not `#[serde(flatten)]`ing `RangeParams`: flattened numeric fields do not
// survive URL-encoded deserialization.
#[derive(Debug, Default, Deserialize)]
pub struct TimelineParams {
  pub year:   Option<i32>,
  pub from:   Option<NaiveDate>,
  pub to:     Option<NaiveDate>,
  pub status: Option<String>,
  pub text:   Option<String>,
}

impl TimelineParams {
  fn range(&self) -> RangeParams {
    RangeParams { year: self.year, from: self.from, to: self.to }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineView {
  pub slots_per_day: usize,
  /// Days after filtering; a day with no matching block is left out.
  pub days:          Vec<DayTimeline>,
  /// Totals over the unfiltered timeline.
  pub summary:       TimelineSummary,
}

/// `GET /students/{id}/timeline`
///
/// The timeline has one block per configured slot on every day the student
/// has a record.
pub async fn timeline<S: AttendanceStore + 'static>(
  State(backend): State<Arc<StoreBackend<S>>>,
  ApiPath(student_id): ApiPath<Uuid>,
  ApiQuery(params): ApiQuery<TimelineParams>,
) -> Result<Json<TimelineView>, ApiError> {
  let query = params.range().query(student_id);
  let filter = TimelineFilter {
    status: parse_status(params.status.as_deref())?,
    text:   params.text,
  };
  let records = student_records(&backend, query).await?;

  let slots_per_day = backend.catalogue().len();
  let blocks = timeline::reconstruct(&records, slots_per_day);
  let summary = timeline::summarize(&blocks);
  let days = timeline::group_by_date(&timeline::filter_blocks(&blocks, &filter));

  Ok(Json(TimelineView { slots_per_day, days, summary }))
}
