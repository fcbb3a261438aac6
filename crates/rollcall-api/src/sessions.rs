//! Handlers for `/sessions` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/sessions/resolve` | Body: `{"venue_id","date","slot"}`; 201 when created, 200 when it existed |
//! | `GET`  | `/sessions/{id}/records` | `?venue_id=` required; map of student id to stored mark |
//! | `POST` | `/sessions/{id}/commit` | Body: [`CommitBody`]; returns `{"written_count"}` |

use std::{collections::BTreeMap, str::FromStr as _, sync::Arc};

use axum::{
  Json,
  extract::State,
  http::StatusCode,
};
use chrono::NaiveDate;
use rollcall_core::{
  attendance::{AttendanceStatus, RecordedMark},
  backend::{CommitRequest, MarkingBackend, StoreBackend},
  buffer::BufferRow,
  commit::{CommitOutcome, UnmarkedPolicy},
  store::AttendanceStore,
  venue::{Resolution, SessionKey},
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::{
  error::ApiError,
  extract::{ApiJson, ApiPath, ApiQuery},
};

// ─── Resolve ─────────────────────────────────────────────────────────────────

/// `POST /sessions/resolve`
pub async fn resolve<S: AttendanceStore + 'static>(
  State(backend): State<Arc<StoreBackend<S>>>,
  ApiJson(key): ApiJson<SessionKey>,
) -> Result<(StatusCode, Json<Resolution>), ApiError> {
  let resolution = backend.resolve_session(key).await?;
  let status = if resolution.existing { StatusCode::OK } else { StatusCode::CREATED };
  Ok((status, Json(resolution)))
}

// ─── Records ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RecordsParams {
  pub venue_id: Uuid,
}

/// `GET /sessions/{id}/records?venue_id=<id>`
pub async fn records<S: AttendanceStore + 'static>(
  State(backend): State<Arc<StoreBackend<S>>>,
  ApiPath(session_id): ApiPath<Uuid>,
  ApiQuery(params): ApiQuery<RecordsParams>,
) -> Result<Json<BTreeMap<Uuid, RecordedMark>>, ApiError> {
  let records = backend.session_records(session_id, params.venue_id).await?;
  Ok(Json(
    records
      .into_iter()
      .map(|r| (r.student_id, RecordedMark::from(r)))
      .collect(),
  ))
}

// ─── Commit ──────────────────────────────────────────────────────────────────

/// One row of a commit. Extra fields (name, department) are ignored, so a
/// serialized buffer row is accepted as is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowBody {
  pub student_id: Uuid,
  /// Wire status string, e.g. `"late"`; absent or `null` when unmarked.
  #[serde(default)]
  pub status:     Option<String>,
  #[serde(default)]
  pub remarks:    Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitBody {
  /// Optional echo of the path id; must match it when present.
  #[serde(default)]
  pub session_id: Option<Uuid>,
  pub venue_id:   Uuid,
  pub date:       NaiveDate,
  pub slot:       String,
  pub unmarked:   UnmarkedPolicy,
  pub rows:       Vec<RowBody>,
}

impl CommitBody {
  fn into_request(self, session_id: Uuid) -> Result<CommitRequest, ApiError> {
    if let Some(named) = self.session_id
      && named != session_id
    {
      return Err(ApiError::BadRequest(format!(
        "body names session {named}, path names {session_id}"
      )));
    }
    let rows = self
      .rows
      .into_iter()
      .map(|row| -> rollcall_core::Result<BufferRow> {
        let status = row
          .status
          .as_deref()
          .map(AttendanceStatus::from_str)
          .transpose()?;
        Ok(BufferRow {
          student_id: row.student_id,
          name: String::new(),
          department: None,
          status,
          remarks: row.remarks.unwrap_or_default(),
        })
      })
      .collect::<rollcall_core::Result<Vec<_>>>()?;
    Ok(CommitRequest {
      session_id,
      key: SessionKey::new(self.venue_id, self.date, self.slot),
      unmarked: self.unmarked,
      rows,
    })
  }
}

/// `POST /sessions/{id}/commit`
pub async fn commit<S: AttendanceStore + 'static>(
  State(backend): State<Arc<StoreBackend<S>>>,
  ApiPath(session_id): ApiPath<Uuid>,
  ApiJson(body): ApiJson<CommitBody>,
) -> Result<Json<CommitOutcome>, ApiError> {
  let request = body.into_request(session_id)?;
  debug!(%session_id, rows = request.rows.len(), "commit requested");
  Ok(Json(backend.commit(request).await?))
}
