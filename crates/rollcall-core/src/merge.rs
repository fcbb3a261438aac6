//! Overlay of stored records onto a roster snapshot.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
  attendance::{AttendanceRecord, RosterEntry},
  buffer::{BufferRow, EditBuffer},
};

/// Build the editable working set for a session.
///
/// The roster decides membership and order: every roster student gets exactly
/// one row, and a stored record for that student fills in status and remarks.
/// Records for students no longer on the roster are dropped. If the roster
/// lists a student twice, the first occurrence wins; if two records exist for
/// one student, the most recently written wins.
pub fn merge(roster: &[RosterEntry], records: &[AttendanceRecord]) -> EditBuffer {
  let mut by_student: HashMap<Uuid, &AttendanceRecord> = HashMap::new();
  for record in records {
    by_student
      .entry(record.student_id)
      .and_modify(|existing| {
        if record.recorded_at >= existing.recorded_at {
          *existing = record;
        }
      })
      .or_insert(record);
  }

  let mut seen: HashSet<Uuid> = HashSet::with_capacity(roster.len());
  let rows: Vec<BufferRow> = roster
    .iter()
    .filter(|entry| seen.insert(entry.student_id))
    .map(|entry| {
      let stored = by_student.get(&entry.student_id);
      BufferRow {
        student_id: entry.student_id,
        name:       entry.name.clone(),
        department: entry.department.clone(),
        status:     stored.map(|r| r.status),
        remarks:    stored
          .and_then(|r| r.remarks.clone())
          .unwrap_or_default(),
      }
    })
    .collect();

  let orphaned = by_student.keys().filter(|id| !seen.contains(id)).count();
  if orphaned > 0 {
    warn!(orphaned, "dropping records for students not on the roster");
  }
  debug!(rows = rows.len(), records = records.len(), "merged roster with stored records");

  EditBuffer::from_rows(rows)
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, Utc};

  use super::*;
  use crate::attendance::AttendanceStatus;

  fn entry(name: &str) -> RosterEntry {
    RosterEntry {
      student_id: Uuid::new_v4(),
      name:       name.into(),
      department: Some("CS".into()),
    }
  }

  fn record(student_id: Uuid, status: AttendanceStatus) -> AttendanceRecord {
    AttendanceRecord {
      session_id: Uuid::nil(),
      student_id,
      status,
      remarks: None,
      recorded_at: Utc::now(),
    }
  }

  #[test]
  fn stored_records_take_precedence_over_unset_defaults() {
    let roster = vec![entry("S1"), entry("S2"), entry("S3")];
    let records = vec![
      record(roster[0].student_id, AttendanceStatus::Late),
      record(roster[1].student_id, AttendanceStatus::Present),
    ];

    let buffer = merge(&roster, &records);
    let statuses: Vec<_> = buffer.rows().iter().map(|r| r.status).collect();
    assert_eq!(
      statuses,
      vec![Some(AttendanceStatus::Late), Some(AttendanceStatus::Present), None]
    );
  }

  #[test]
  fn remarks_come_from_the_record() {
    let roster = vec![entry("S1")];
    let mut r = record(roster[0].student_id, AttendanceStatus::Absent);
    r.remarks = Some("sick note".into());
    let buffer = merge(&roster, &[r]);
    assert_eq!(buffer.rows()[0].remarks, "sick note");
  }

  #[test]
  fn roster_is_authoritative_for_membership() {
    let roster = vec![entry("S1")];
    let records = vec![
      record(roster[0].student_id, AttendanceStatus::Present),
      record(Uuid::new_v4(), AttendanceStatus::Late),
    ];
    let buffer = merge(&roster, &records);
    assert_eq!(buffer.len(), 1);
    assert_eq!(buffer.rows()[0].student_id, roster[0].student_id);
  }

  #[test]
  fn duplicate_roster_entries_collapse_to_one_row() {
    let s = entry("S1");
    let roster = vec![s.clone(), entry("S2"), s];
    assert_eq!(merge(&roster, &[]).len(), 2);
  }

  #[test]
  fn latest_record_wins_for_a_student() {
    let roster = vec![entry("S1")];
    let id = roster[0].student_id;
    let mut older = record(id, AttendanceStatus::Absent);
    older.recorded_at = Utc::now() - Duration::minutes(5);
    let newer = record(id, AttendanceStatus::Late);

    let buffer = merge(&roster, &[newer.clone(), older.clone()]);
    assert_eq!(buffer.rows()[0].status, Some(AttendanceStatus::Late));
    let buffer = merge(&roster, &[older, newer]);
    assert_eq!(buffer.rows()[0].status, Some(AttendanceStatus::Late));
  }

  #[test]
  fn merge_is_deterministic() {
    let roster = vec![entry("S1"), entry("S2")];
    let records = vec![record(roster[1].student_id, AttendanceStatus::Late)];
    assert_eq!(merge(&roster, &records), merge(&roster, &records));
  }
}
