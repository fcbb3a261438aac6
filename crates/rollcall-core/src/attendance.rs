//! Attendance statuses, persisted records, and roster entries.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, venue::SessionKey};

// ─── Status ──────────────────────────────────────────────────────────────────

/// The fixed enumeration of attendance outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
  Present,
  Absent,
  Late,
  /// Excused absence agreed in advance.
  PermittedSkip,
}

impl AttendanceStatus {
  pub const ALL: [Self; 4] =
    [Self::Present, Self::Absent, Self::Late, Self::PermittedSkip];

  /// The string stored in the database and accepted on the wire.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Present => "present",
      Self::Absent => "absent",
      Self::Late => "late",
      Self::PermittedSkip => "permitted_skip",
    }
  }

  /// Whether this status counts towards attendance in summaries.
  pub fn is_attended(self) -> bool { !matches!(self, Self::Absent) }
}

impl fmt::Display for AttendanceStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for AttendanceStatus {
  type Err = Error;

  /// Case-insensitive; `permitted-skip` is accepted as a spelling of
  /// `permitted_skip`.
  fn from_str(s: &str) -> Result<Self> {
    let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
    Self::ALL
      .into_iter()
      .find(|status| status.as_str() == normalized)
      .ok_or_else(|| {
        Error::Validation(format!(
          "invalid attendance status {s:?}; expected one of present, absent, \
           late, permitted_skip"
        ))
      })
  }
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// One student's mark for one session. At most one exists per
/// `(session_id, student_id)`; a later write replaces the earlier one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
  pub session_id:  Uuid,
  pub student_id:  Uuid,
  pub status:      AttendanceStatus,
  pub remarks:     Option<String>,
  /// Server-assigned time of the last write.
  pub recorded_at: DateTime<Utc>,
}

/// The write-side shape of a record: what the committer hands to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mark {
  pub student_id: Uuid,
  pub status:     AttendanceStatus,
  pub remarks:    Option<String>,
}

/// The per-student payload of a session's stored marks, keyed by student in
/// the session-records response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedMark {
  pub status:      AttendanceStatus,
  pub remarks:     Option<String>,
  pub recorded_at: DateTime<Utc>,
}

impl RecordedMark {
  pub fn into_record(self, session_id: Uuid, student_id: Uuid) -> AttendanceRecord {
    AttendanceRecord {
      session_id,
      student_id,
      status: self.status,
      remarks: self.remarks,
      recorded_at: self.recorded_at,
    }
  }
}

impl From<AttendanceRecord> for RecordedMark {
  fn from(r: AttendanceRecord) -> Self {
    Self { status: r.status, remarks: r.remarks, recorded_at: r.recorded_at }
  }
}

/// A record joined with the session and venue context the read paths need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
  #[serde(flatten)]
  pub record:       AttendanceRecord,
  pub key:          SessionKey,
  pub venue_name:   String,
  /// Faculty assigned to the session's venue.
  pub faculty_id:   Option<Uuid>,
  pub student_name: String,
}

impl SessionRecord {
  pub fn date(&self) -> NaiveDate { self.key.date }
}

// ─── Roster ──────────────────────────────────────────────────────────────────

/// A student enrolled at a venue. Attendance state is not part of the
/// roster; it starts unset in the edit buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
  pub student_id: Uuid,
  pub name:       String,
  pub department: Option<String>,
}

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`crate::store::AttendanceStore::list_records`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordQuery {
  pub student_id: Option<Uuid>,
  /// Restrict to sessions at venues assigned to this faculty member.
  pub faculty_id: Option<Uuid>,
  /// Restrict to one calendar year; combined with `from`/`to` by
  /// intersection.
  pub year:       Option<i32>,
  /// Inclusive lower bound on the session date.
  pub from:       Option<NaiveDate>,
  /// Inclusive upper bound on the session date.
  pub to:         Option<NaiveDate>,
}

impl RecordQuery {
  pub fn for_student(student_id: Uuid) -> Self {
    Self { student_id: Some(student_id), ..Self::default() }
  }

  /// The effective inclusive date range after folding `year` into
  /// `from`/`to`.
  pub fn date_bounds(&self) -> Result<(Option<NaiveDate>, Option<NaiveDate>)> {
    let (mut from, mut to) = (self.from, self.to);
    if let Some(year) = self.year {
      let start = NaiveDate::from_ymd_opt(year, 1, 1)
        .ok_or_else(|| Error::Validation(format!("year {year} is out of range")))?;
      let end = NaiveDate::from_ymd_opt(year, 12, 31)
        .ok_or_else(|| Error::Validation(format!("year {year} is out of range")))?;
      from = Some(from.map_or(start, |f| f.max(start)));
      to = Some(to.map_or(end, |t| t.min(end)));
    }
    if let (Some(f), Some(t)) = (self.from, self.to)
      && f > t
    {
      return Err(Error::Validation(format!(
        "date range is inverted: {f} is after {t}"
      )));
    }
    Ok((from, to))
  }

  /// In-memory equivalent of the store-side filter.
  pub fn matches(&self, record: &SessionRecord) -> bool {
    let date = record.date();
    self.student_id.is_none_or(|id| id == record.record.student_id)
      && self.faculty_id.is_none_or(|id| record.faculty_id == Some(id))
      && self.year.is_none_or(|y| date.year() == y)
      && self.from.is_none_or(|f| date >= f)
      && self.to.is_none_or(|t| date <= t)
  }
}
