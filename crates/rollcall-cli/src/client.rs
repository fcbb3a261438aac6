//! Async HTTP client wrapping the rollcall JSON API.

use std::{collections::BTreeMap, time::Duration};

use anyhow::Context as _;
use chrono::NaiveDate;
use reqwest::{Client, RequestBuilder};
use rollcall_api::{slots::SlotView, students::TimelineView};
use rollcall_core::{
  Error, ErrorKind, Result,
  aggregate::AggregateRow,
  attendance::{AttendanceRecord, AttendanceStatus, RecordedMark, RosterEntry, SessionRecord},
  backend::{CommitRequest, MarkingBackend},
  commit::CommitOutcome,
  venue::{Resolution, SessionKey, Venue},
};
use serde::{Deserialize, de::DeserializeOwned};
use tracing::debug;
use uuid::Uuid;

/// Connection settings for the rollcall API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
}

/// Async HTTP client for the rollcall JSON REST API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

/// Date range and filters shared by the student read endpoints.
#[derive(Debug, Clone, Default)]
pub struct RangeArgs {
  pub year: Option<i32>,
  pub from: Option<NaiveDate>,
  pub to:   Option<NaiveDate>,
}

impl RangeArgs {
  fn pairs(&self) -> Vec<(&'static str, String)> {
    let mut q = Vec::new();
    if let Some(y) = self.year {
      q.push(("year", y.to_string()));
    }
    if let Some(d) = self.from {
      q.push(("from", d.to_string()));
    }
    if let Some(d) = self.to {
      q.push(("to", d.to_string()));
    }
    q
  }
}

/// Error body returned by the API on any non-2xx response.
#[derive(Debug, Deserialize)]
struct ErrorBody {
  error: String,
  #[serde(default)]
  kind:  Option<ErrorKind>,
}

impl ErrorBody {
  /// Rebuild the core error the server reported. The server's message
  /// already carries the variant's display prefix, which is dropped so it is
  /// not printed twice.
  fn into_error(self) -> Error {
    let ErrorBody { error: message, kind } = self;
    match kind {
      Some(ErrorKind::NotFound) => Error::NotFound(strip(&message, "not found: ")),
      Some(ErrorKind::Validation) => Error::Validation(strip(&message, "invalid input: ")),
      Some(ErrorKind::EmptySubmission) => Error::EmptySubmission,
      Some(ErrorKind::SessionNotResolved) => Error::SessionNotResolved,
      Some(ErrorKind::Conflict | ErrorKind::CommitInFlight) => Error::Conflict(message),
      Some(ErrorKind::Store) | None => Error::Store(message.into()),
    }
  }
}

fn strip(message: &str, prefix: &str) -> String {
  message.strip_prefix(prefix).unwrap_or(message).to_owned()
}

fn transport(e: reqwest::Error) -> Error { Error::Store(Box::new(e)) }

impl ApiClient {
  pub fn new(config: ApiConfig) -> anyhow::Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!(
      "{}/api{}",
      self.config.base_url.trim_end_matches('/'),
      path
    )
  }

  async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
    let resp = req.send().await.map_err(transport)?;
    let status = resp.status();
    debug!(%status, url = %resp.url(), "response");
    if !status.is_success() {
      let fallback = format!("server returned {status}");
      let body = resp
        .json::<ErrorBody>()
        .await
        .unwrap_or(ErrorBody { error: fallback, kind: None });
      return Err(body.into_error());
    }
    resp.json().await.map_err(transport)
  }

  // ── Venues and slots ──────────────────────────────────────────────────────

  /// `GET /api/venues[?faculty_id=<id>]`
  pub async fn venues(&self, faculty_id: Option<Uuid>) -> Result<Vec<Venue>> {
    let mut req = self.client.get(self.url("/venues"));
    if let Some(id) = faculty_id {
      req = req.query(&[("faculty_id", id.to_string())]);
    }
    self.send(req).await
  }

  /// `GET /api/slots[?date=<date>]`
  pub async fn slots(&self, date: Option<NaiveDate>) -> Result<Vec<SlotView>> {
    let mut req = self.client.get(self.url("/slots"));
    if let Some(d) = date {
      req = req.query(&[("date", d.to_string())]);
    }
    self.send(req).await
  }

  // ── Reports ───────────────────────────────────────────────────────────────

  /// `GET /api/students/<id>/records`
  pub async fn student_records(
    &self,
    student_id: Uuid,
    range: &RangeArgs,
  ) -> Result<Vec<SessionRecord>> {
    let req = self
      .client
      .get(self.url(&format!("/students/{student_id}/records")))
      .query(&range.pairs());
    self.send(req).await
  }

  /// `GET /api/students/<id>/timeline`
  pub async fn timeline(
    &self,
    student_id: Uuid,
    range: &RangeArgs,
    status: Option<AttendanceStatus>,
    text: Option<&str>,
  ) -> Result<TimelineView> {
    let mut q = range.pairs();
    if let Some(s) = status {
      q.push(("status", s.as_str().to_owned()));
    }
    if let Some(t) = text {
      q.push(("text", t.to_owned()));
    }
    let req = self
      .client
      .get(self.url(&format!("/students/{student_id}/timeline")))
      .query(&q);
    self.send(req).await
  }

  /// `GET /api/reports/threshold?status=&min_count=[&faculty_id=]`
  pub async fn threshold(
    &self,
    status: AttendanceStatus,
    min_count: usize,
    faculty_id: Option<Uuid>,
  ) -> Result<Vec<AggregateRow>> {
    let mut q = vec![
      ("status", status.as_str().to_owned()),
      ("min_count", min_count.to_string()),
    ];
    if let Some(id) = faculty_id {
      q.push(("faculty_id", id.to_string()));
    }
    self.send(self.client.get(self.url("/reports/threshold")).query(&q)).await
  }
}

// ─── MarkingBackend ───────────────────────────────────────────────────────────

impl MarkingBackend for ApiClient {
  async fn resolve_session(&self, key: SessionKey) -> Result<Resolution> {
    self
      .send(self.client.post(self.url("/sessions/resolve")).json(&key))
      .await
  }

  async fn roster(&self, venue_id: Uuid) -> Result<Vec<RosterEntry>> {
    self
      .send(self.client.get(self.url(&format!("/venues/{venue_id}/roster"))))
      .await
  }

  async fn session_records(
    &self,
    session_id: Uuid,
    venue_id: Uuid,
  ) -> Result<Vec<AttendanceRecord>> {
    let req = self
      .client
      .get(self.url(&format!("/sessions/{session_id}/records")))
      .query(&[("venue_id", venue_id.to_string())]);
    let marks: BTreeMap<Uuid, RecordedMark> = self.send(req).await?;
    Ok(
      marks
        .into_iter()
        .map(|(student_id, mark)| mark.into_record(session_id, student_id))
        .collect(),
    )
  }

  async fn commit(&self, request: CommitRequest) -> Result<CommitOutcome> {
    let url = self.url(&format!("/sessions/{}/commit", request.session_id));
    self.send(self.client.post(url).json(&request)).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn body(error: &str, kind: Option<ErrorKind>) -> ErrorBody {
    ErrorBody { error: error.to_owned(), kind }
  }

  #[test]
  fn error_bodies_map_back_to_core_errors() {
    let e = body("invalid input: slot \"x\" is not in the catalogue", Some(ErrorKind::Validation))
      .into_error();
    assert!(matches!(&e, Error::Validation(m) if m == "slot \"x\" is not in the catalogue"));

    let e = body("not found: venue 1", Some(ErrorKind::NotFound)).into_error();
    assert!(matches!(&e, Error::NotFound(m) if m == "venue 1"));
    assert!(e.is_retryable());

    let e = body("nothing to submit", Some(ErrorKind::EmptySubmission)).into_error();
    assert!(matches!(e, Error::EmptySubmission));
    assert!(!e.is_retryable());

    let e = body("server returned 502 Bad Gateway", None).into_error();
    assert_eq!(e.kind(), ErrorKind::Store);
  }

  #[test]
  fn api_paths_are_rooted_under_api() {
    let client = ApiClient::new(ApiConfig { base_url: "http://host:8080/".into() }).unwrap();
    assert_eq!(client.url("/slots"), "http://host:8080/api/slots");
  }

  #[test]
  fn range_only_sends_given_bounds() {
    let range = RangeArgs {
      year: Some(2024),
      to: NaiveDate::from_ymd_opt(2024, 6, 30),
      ..RangeArgs::default()
    };
    assert_eq!(range.pairs(), vec![
      ("year", "2024".to_owned()),
      ("to", "2024-06-30".to_owned()),
    ]);
  }
}
