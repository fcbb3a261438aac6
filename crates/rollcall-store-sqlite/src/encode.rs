//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with fixed microsecond precision
//! so that they sort lexically. Dates are `YYYY-MM-DD`. UUIDs are stored as
//! hyphenated lowercase strings.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rollcall_core::{
  attendance::{AttendanceRecord, AttendanceStatus, RosterEntry, SessionRecord},
  venue::{Session, SessionKey, Venue},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

/// Statuses are stored as their wire strings; the schema's CHECK constraint
/// keeps the column in that set.
pub fn decode_status(s: &str) -> Result<AttendanceStatus> {
  Ok(s.parse::<AttendanceStatus>()?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub struct RawVenue {
  pub venue_id:       String,
  pub name:           String,
  pub faculty_id:     Option<String>,
  pub enrolled_count: u32,
}

impl RawVenue {
  pub fn into_venue(self) -> Result<Venue> {
    Ok(Venue {
      venue_id:       decode_uuid(&self.venue_id)?,
      name:           self.name,
      faculty_id:     decode_opt_uuid(self.faculty_id)?,
      enrolled_count: self.enrolled_count,
    })
  }
}

pub struct RawStudent {
  pub student_id: String,
  pub name:       String,
  pub department: Option<String>,
}

impl RawStudent {
  pub fn into_entry(self) -> Result<RosterEntry> {
    Ok(RosterEntry {
      student_id: decode_uuid(&self.student_id)?,
      name:       self.name,
      department: self.department,
    })
  }
}

pub struct RawSession {
  pub session_id:   String,
  pub venue_id:     String,
  pub session_date: String,
  pub slot_label:   String,
  pub created_at:   String,
}

impl RawSession {
  pub fn into_session(self) -> Result<Session> {
    Ok(Session {
      session_id: decode_uuid(&self.session_id)?,
      key:        SessionKey {
        venue_id: decode_uuid(&self.venue_id)?,
        date:     decode_date(&self.session_date)?,
        slot:     self.slot_label,
      },
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read from an `attendance` row.
pub struct RawRecord {
  pub session_id:  String,
  pub student_id:  String,
  pub status:      String,
  pub remarks:     Option<String>,
  pub recorded_at: String,
}

impl RawRecord {
  pub fn into_record(self) -> Result<AttendanceRecord> {
    Ok(AttendanceRecord {
      session_id:  decode_uuid(&self.session_id)?,
      student_id:  decode_uuid(&self.student_id)?,
      status:      decode_status(&self.status)?,
      remarks:     self.remarks,
      recorded_at: decode_dt(&self.recorded_at)?,
    })
  }
}

/// An `attendance` row joined with its session, venue and student.
pub struct RawSessionRecord {
  pub record:       RawRecord,
  pub venue_id:     String,
  pub session_date: String,
  pub slot_label:   String,
  pub venue_name:   String,
  pub faculty_id:   Option<String>,
  pub student_name: String,
}

impl RawSessionRecord {
  pub fn into_session_record(self) -> Result<SessionRecord> {
    Ok(SessionRecord {
      record:       self.record.into_record()?,
      key:          SessionKey {
        venue_id: decode_uuid(&self.venue_id)?,
        date:     decode_date(&self.session_date)?,
        slot:     self.slot_label,
      },
      venue_name:   self.venue_name,
      faculty_id:   decode_opt_uuid(self.faculty_id)?,
      student_name: self.student_name,
    })
  }
}
