//! The edit buffer: the marking screen's working copy of a session.
//!
//! Every operation is a pure transformation returning a new buffer, so a
//! caller can keep the previous value around (e.g. for undo) or discard it.
//! Rows are in roster order and unique per student.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, attendance::AttendanceStatus};

/// One student's editable mark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferRow {
  pub student_id: Uuid,
  pub name:       String,
  pub department: Option<String>,
  /// `None` until someone marks the student.
  pub status:     Option<AttendanceStatus>,
  pub remarks:    String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditBuffer {
  rows: Vec<BufferRow>,
}

impl EditBuffer {
  /// Wrap rows that are already unique per student. Use
  /// [`crate::merge::merge`] to build a buffer from a roster.
  pub(crate) fn from_rows(rows: Vec<BufferRow>) -> Self { Self { rows } }

  pub fn rows(&self) -> &[BufferRow] { &self.rows }

  pub fn len(&self) -> usize { self.rows.len() }

  pub fn is_empty(&self) -> bool { self.rows.is_empty() }

  pub fn get(&self, student_id: Uuid) -> Option<&BufferRow> {
    self.rows.iter().find(|r| r.student_id == student_id)
  }

  /// Number of rows that carry a status.
  pub fn marked_count(&self) -> usize {
    self.rows.iter().filter(|r| r.status.is_some()).count()
  }

  /// Set the status of one row. Remarks are left as they are.
  pub fn set_status(&self, student_id: Uuid, status: AttendanceStatus) -> Result<Self> {
    self.update_row(student_id, |row| row.status = Some(status))
  }

  /// Set the remarks of one row. The status is left as it is.
  pub fn set_remark(&self, student_id: Uuid, text: impl Into<String>) -> Result<Self> {
    let text = text.into();
    self.update_row(student_id, move |row| row.remarks = text)
  }

  /// Give every row the same status and clear all remarks.
  pub fn set_all(&self, status: AttendanceStatus) -> Self {
    self.map_rows(|row| {
      row.status = Some(status);
      row.remarks.clear();
    })
  }

  /// Reset every row to unset with empty remarks.
  pub fn clear_all(&self) -> Self {
    self.map_rows(|row| {
      row.status = None;
      row.remarks.clear();
    })
  }

  fn update_row(
    &self,
    student_id: Uuid,
    f: impl FnOnce(&mut BufferRow),
  ) -> Result<Self> {
    let mut next = self.clone();
    let row = next
      .rows
      .iter_mut()
      .find(|r| r.student_id == student_id)
      .ok_or_else(|| Error::NotFound(format!("student {student_id} is not on this roster")))?;
    f(row);
    Ok(next)
  }

  fn map_rows(&self, mut f: impl FnMut(&mut BufferRow)) -> Self {
    let mut next = self.clone();
    next.rows.iter_mut().for_each(&mut f);
    next
  }
}
