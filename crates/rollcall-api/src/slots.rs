//! Handler for `GET /slots`: the configured slot catalogue.

use std::sync::Arc;

use axum::{
  Json,
  extract::State,
};
use chrono::{Local, NaiveDate, NaiveTime};
use rollcall_core::{
  backend::StoreBackend,
  store::AttendanceStore,
  venue::{SlotPhase, TimeSlot},
};
use serde::{Deserialize, Serialize};

use crate::extract::ApiQuery;

#[derive(Debug, Deserialize)]
pub struct SlotParams {
  /// When given, each slot carries its phase on that date relative to the
  /// server's local clock.
  pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotView {
  pub label: String,
  pub start: NaiveTime,
  pub end:   NaiveTime,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub phase: Option<SlotPhase>,
}

impl SlotView {
  fn new(slot: &TimeSlot, phase: Option<SlotPhase>) -> Self {
    Self { label: slot.label.clone(), start: slot.start, end: slot.end, phase }
  }
}

/// `GET /slots[?date=YYYY-MM-DD]`
pub async fn list<S: AttendanceStore + 'static>(
  State(backend): State<Arc<StoreBackend<S>>>,
  ApiQuery(params): ApiQuery<SlotParams>,
) -> Json<Vec<SlotView>> {
  let now = Local::now().naive_local();
  let views = backend
    .catalogue()
    .slots()
    .iter()
    .map(|slot| SlotView::new(slot, params.date.map(|d| slot.phase(d, now))))
    .collect();
  Json(views)
}
