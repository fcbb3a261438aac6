//! Venues, the time-slot catalogue, and session keys.
//!
//! A session is the unit attendance is marked against. It is identified in
//! business terms by a [`SessionKey`] (venue, calendar date, slot label) and
//! in storage terms by a UUID assigned the first time the key is resolved.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Venue ───────────────────────────────────────────────────────────────────

/// A place where a roster of students meets. Read-only to this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Venue {
  pub venue_id:       Uuid,
  pub name:           String,
  /// The faculty member assigned to teach here, if any.
  pub faculty_id:     Option<Uuid>,
  pub enrolled_count: u32,
}

/// Who is asking for a venue listing. Identity is assumed to be verified
/// upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requester {
  /// Sees only the venues assigned to them.
  Faculty(Uuid),
  /// Sees every venue.
  Admin,
}

impl Requester {
  /// The faculty scope to apply to a venue query, if any.
  pub fn faculty_scope(self) -> Option<Uuid> {
    match self {
      Self::Faculty(id) => Some(id),
      Self::Admin => None,
    }
  }
}

// ─── Time slots ──────────────────────────────────────────────────────────────

/// Where a slot sits relative to "now" on its calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotPhase {
  Upcoming,
  Ongoing,
  Completed,
}

/// A labelled time-of-day window. Labels are unique within a catalogue and
/// are what session keys refer to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
  pub label: String,
  pub start: NaiveTime,
  pub end:   NaiveTime,
}

impl TimeSlot {
  /// Build a slot from `HH:MM` or `HH:MM:SS` strings.
  pub fn parse(label: impl Into<String>, start: &str, end: &str) -> Result<Self> {
    let label = label.into();
    let start = parse_time_of_day(start)?;
    let end = parse_time_of_day(end)?;
    if end <= start {
      return Err(Error::Validation(format!(
        "slot {label:?} must end after it starts"
      )));
    }
    Ok(Self { label, start, end })
  }

  /// Temporal status of this slot on `date`, relative to `now`.
  pub fn phase(&self, date: NaiveDate, now: NaiveDateTime) -> SlotPhase {
    if now < date.and_time(self.start) {
      SlotPhase::Upcoming
    } else if now < date.and_time(self.end) {
      SlotPhase::Ongoing
    } else {
      SlotPhase::Completed
    }
  }
}

fn parse_time_of_day(s: &str) -> Result<NaiveTime> {
  NaiveTime::parse_from_str(s, "%H:%M")
    .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
    .map_err(|_| Error::Validation(format!("invalid time of day: {s:?}")))
}

/// The fixed set of slots a day is divided into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotCatalogue {
  slots: Vec<TimeSlot>,
}

impl SlotCatalogue {
  /// Build a catalogue. Slots are ordered by start time; labels must be
  /// unique and the catalogue must not be empty.
  pub fn new(mut slots: Vec<TimeSlot>) -> Result<Self> {
    if slots.is_empty() {
      return Err(Error::Validation("slot catalogue is empty".into()));
    }
    slots.sort_by_key(|s| s.start);
    for (i, slot) in slots.iter().enumerate() {
      if slots[..i].iter().any(|other| other.label == slot.label) {
        return Err(Error::Validation(format!(
          "duplicate slot label {:?}",
          slot.label
        )));
      }
    }
    Ok(Self { slots })
  }

  pub fn slots(&self) -> &[TimeSlot] { &self.slots }

  pub fn len(&self) -> usize { self.slots.len() }

  pub fn is_empty(&self) -> bool { self.slots.is_empty() }

  pub fn get(&self, label: &str) -> Option<&TimeSlot> {
    self.slots.iter().find(|s| s.label == label)
  }

  /// Look up `label`, failing with a validation error that lists the
  /// accepted labels.
  pub fn require(&self, label: &str) -> Result<&TimeSlot> {
    self.get(label).ok_or_else(|| {
      let known: Vec<&str> = self.slots.iter().map(|s| s.label.as_str()).collect();
      Error::Validation(format!(
        "unknown time slot {label:?}; expected one of {known:?}"
      ))
    })
  }
}

impl Default for SlotCatalogue {
  /// Four slots per day.
  fn default() -> Self {
    let slot = |label: &str, start: (u32, u32), end: (u32, u32)| TimeSlot {
      label: label.to_owned(),
      start: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap_or_default(),
      end:   NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap_or_default(),
    };
    Self {
      slots: vec![
        slot("09:00-10:30", (9, 0), (10, 30)),
        slot("10:45-12:15", (10, 45), (12, 15)),
        slot("13:00-14:30", (13, 0), (14, 30)),
        slot("14:45-16:15", (14, 45), (16, 15)),
      ],
    }
  }
}

// ─── Sessions ────────────────────────────────────────────────────────────────

/// The business key of a session. At most one [`Session`] exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionKey {
  pub venue_id: Uuid,
  pub date:     NaiveDate,
  pub slot:     String,
}

impl SessionKey {
  pub fn new(venue_id: Uuid, date: NaiveDate, slot: impl Into<String>) -> Self {
    Self { venue_id, date, slot: slot.into() }
  }
}

impl fmt::Display for SessionKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "venue {} on {} at {}", self.venue_id, self.date, self.slot)
  }
}

/// A persisted attendance occasion. Created lazily, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
  pub session_id: Uuid,
  #[serde(flatten)]
  pub key:        SessionKey,
  pub created_at: DateTime<Utc>,
}

/// Outcome of resolving a [`SessionKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
  pub session_id: Uuid,
  /// `false` only when this resolution created the session.
  pub existing:   bool,
}
