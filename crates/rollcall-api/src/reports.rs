//! Handler for `GET /reports/threshold`.

use std::sync::Arc;

use axum::{
  Json,
  extract::State,
};
use rollcall_core::{
  aggregate::{AggregateRow, ThresholdQuery, aggregate},
  attendance::{AttendanceStatus, RecordQuery},
  backend::StoreBackend,
  store::AttendanceStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  error::{ApiError, store_err},
  extract::ApiQuery,
  parse_status,
};

#[derive(Debug, Deserialize)]
pub struct ThresholdParams {
  /// Wire status string; defaults to `late`.
  pub status:     Option<String>,
  pub min_count:  usize,
  pub faculty_id: Option<Uuid>,
}

/// `GET /reports/threshold?min_count=<n>[&status=<s>][&faculty_id=<id>]`
pub async fn threshold<S: AttendanceStore + 'static>(
  State(backend): State<Arc<StoreBackend<S>>>,
  ApiQuery(params): ApiQuery<ThresholdParams>,
) -> Result<Json<Vec<AggregateRow>>, ApiError> {
  let query = ThresholdQuery {
    status:     parse_status(params.status.as_deref())?.unwrap_or(AttendanceStatus::Late),
    min_count:  params.min_count,
    faculty_id: params.faculty_id,
  };
  // The faculty restriction is pushed down to the store; `aggregate` applies
  // it again, which is a no-op on already-scoped records.
  let records = backend
    .store()
    .list_records(RecordQuery { faculty_id: query.faculty_id, ..RecordQuery::default() })
    .await
    .map_err(store_err)?;
  Ok(Json(aggregate(&records, &query)))
}
