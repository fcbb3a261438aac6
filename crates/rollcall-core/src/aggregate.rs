//! Threshold reports: which students reached N occurrences of a status.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::attendance::{AttendanceStatus, SessionRecord};

fn default_status() -> AttendanceStatus { AttendanceStatus::Late }

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdQuery {
  #[serde(default = "default_status")]
  pub status:     AttendanceStatus,
  /// Inclusive lower bound on the per-student count. Students with no
  /// matches are never reported, so `0` behaves like `1`.
  pub min_count:  usize,
  /// Only count sessions at venues assigned to this faculty member.
  #[serde(default)]
  pub faculty_id: Option<Uuid>,
}

impl ThresholdQuery {
  pub fn new(min_count: usize) -> Self {
    Self { status: default_status(), min_count, faculty_id: None }
  }
}

/// One matching record, for drill-down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchDescription {
  pub session_id: Uuid,
  pub date:       NaiveDate,
  pub slot:       String,
  pub venue_name: String,
  pub remarks:    Option<String>,
}

impl From<&SessionRecord> for MatchDescription {
  fn from(r: &SessionRecord) -> Self {
    Self {
      session_id: r.record.session_id,
      date:       r.key.date,
      slot:       r.key.slot.clone(),
      venue_name: r.venue_name.clone(),
      remarks:    r.record.remarks.clone(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateRow {
  pub student_id:   Uuid,
  pub student_name: String,
  pub count:        usize,
  pub matches:      Vec<MatchDescription>,
}

/// Count `query.status` per student and keep those at or above the threshold.
///
/// Rows are ordered by count descending, then student name, then student id.
/// Matches within a row keep the order of `records`.
pub fn aggregate(records: &[SessionRecord], query: &ThresholdQuery) -> Vec<AggregateRow> {
  let mut by_student: HashMap<Uuid, AggregateRow> = HashMap::new();
  for r in records
    .iter()
    .filter(|r| query.faculty_id.is_none_or(|f| r.faculty_id == Some(f)))
    .filter(|r| r.record.status == query.status)
  {
    let row = by_student
      .entry(r.record.student_id)
      .or_insert_with(|| AggregateRow {
        student_id:   r.record.student_id,
        student_name: r.student_name.clone(),
        count:        0,
        matches:      Vec::new(),
      });
    row.count += 1;
    row.matches.push(r.into());
  }

  let min = query.min_count.max(1);
  let mut rows: Vec<AggregateRow> =
    by_student.into_values().filter(|row| row.count >= min).collect();
  rows.sort_by(|a, b| {
    b.count
      .cmp(&a.count)
      .then_with(|| a.student_name.cmp(&b.student_name))
      .then_with(|| a.student_id.cmp(&b.student_id))
  });
  rows
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;
  use crate::{attendance::AttendanceRecord, venue::SessionKey};

  fn rec(
    student: (Uuid, &str),
    day: u32,
    status: AttendanceStatus,
    faculty_id: Option<Uuid>,
  ) -> SessionRecord {
    SessionRecord {
      record: AttendanceRecord {
        session_id: Uuid::new_v4(),
        student_id: student.0,
        status,
        remarks: None,
        recorded_at: Utc::now(),
      },
      key: SessionKey::new(
        Uuid::nil(),
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
        "09:00-10:30",
      ),
      venue_name: "Lab".into(),
      faculty_id,
      student_name: student.1.into(),
    }
  }

  fn lates(student: (Uuid, &str), n: u32) -> Vec<SessionRecord> {
    (1..=n).map(|d| rec(student, d, AttendanceStatus::Late, None)).collect()
  }

  #[test]
  fn threshold_is_inclusive() {
    let four = (Uuid::new_v4(), "Four");
    let five = (Uuid::new_v4(), "Five");
    let mut records = lates(four, 4);
    records.extend(lates(five, 5));

    let rows = aggregate(&records, &ThresholdQuery::new(5));
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].student_id, five.0);
    assert_eq!(rows[0].count, 5);
    assert_eq!(rows[0].matches.len(), 5);
  }

  #[test]
  fn only_the_requested_status_is_counted() {
    let s = (Uuid::new_v4(), "S");
    let records = vec![
      rec(s, 1, AttendanceStatus::Late, None),
      rec(s, 2, AttendanceStatus::Absent, None),
      rec(s, 3, AttendanceStatus::Absent, None),
    ];
    let mut query = ThresholdQuery::new(1);
    assert_eq!(aggregate(&records, &query)[0].count, 1);
    query.status = AttendanceStatus::Absent;
    assert_eq!(aggregate(&records, &query)[0].count, 2);
  }

  #[test]
  fn zero_counts_are_never_reported() {
    let s = (Uuid::new_v4(), "S");
    let records = vec![rec(s, 1, AttendanceStatus::Present, None)];
    assert!(aggregate(&records, &ThresholdQuery::new(0)).is_empty());
  }

  #[test]
  fn faculty_scope_is_applied_before_counting() {
    let s = (Uuid::new_v4(), "S");
    let mine = Uuid::new_v4();
    let records = vec![
      rec(s, 1, AttendanceStatus::Late, Some(mine)),
      rec(s, 2, AttendanceStatus::Late, Some(Uuid::new_v4())),
      rec(s, 3, AttendanceStatus::Late, None),
    ];
    let query = ThresholdQuery { faculty_id: Some(mine), ..ThresholdQuery::new(2) };
    assert!(aggregate(&records, &query).is_empty());
    let query = ThresholdQuery { faculty_id: Some(mine), ..ThresholdQuery::new(1) };
    assert_eq!(aggregate(&records, &query)[0].count, 1);
  }

  #[test]
  fn rows_sort_by_count_then_name() {
    let bea = (Uuid::new_v4(), "Bea");
    let abe = (Uuid::new_v4(), "Abe");
    let cy = (Uuid::new_v4(), "Cy");
    let mut records = lates(bea, 2);
    records.extend(lates(abe, 2));
    records.extend(lates(cy, 3));

    let names: Vec<_> = aggregate(&records, &ThresholdQuery::new(1))
      .into_iter()
      .map(|r| r.student_name)
      .collect();
    assert_eq!(names, vec!["Cy", "Abe", "Bea"]);
  }

  #[test]
  fn status_defaults_to_late_when_deserialized() {
    let q: ThresholdQuery = serde_json::from_str(r#"{"min_count":3}"#).unwrap();
    assert_eq!(q, ThresholdQuery::new(3));
  }
}
