//! Validation and atomic submission of an edit buffer.

use std::{
  collections::HashSet,
  sync::{Arc, Mutex, PoisonError},
};

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{
  Error, Result,
  attendance::{AttendanceStatus, Mark, RosterEntry},
  buffer::BufferRow,
  error::from_store,
  store::AttendanceStore,
};

/// What to do with rows nobody marked. Every call site picks one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmarkedPolicy {
  /// Leave unmarked students out of the write (faculty marking).
  Omit,
  /// Write unmarked students as absent (administrative marking).
  DefaultAbsent,
}

/// Result of a successful commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitOutcome {
  pub written_count: usize,
}

/// Turn buffer rows into the marks to persist.
///
/// At least one row must carry a status regardless of `policy`; a student may
/// appear at most once. Empty remarks are stored as no remarks.
pub fn write_set(rows: &[BufferRow], policy: UnmarkedPolicy) -> Result<Vec<Mark>> {
  if !rows.iter().any(|r| r.status.is_some()) {
    return Err(Error::EmptySubmission);
  }

  let mut seen = HashSet::with_capacity(rows.len());
  if let Some(dup) = rows.iter().find(|r| !seen.insert(r.student_id)) {
    return Err(Error::Validation(format!(
      "student {} appears more than once in the submission",
      dup.student_id
    )));
  }

  Ok(
    rows
      .iter()
      .filter_map(|row| {
        let status = match (row.status, policy) {
          (Some(status), _) => status,
          (None, UnmarkedPolicy::Omit) => return None,
          (None, UnmarkedPolicy::DefaultAbsent) => AttendanceStatus::Absent,
        };
        let remarks = row.remarks.trim();
        Some(Mark {
          student_id: row.student_id,
          status,
          remarks: (!remarks.is_empty()).then(|| remarks.to_owned()),
        })
      })
      .collect(),
  )
}

/// Check submitted rows against the venue's roster.
///
/// Every row must name an enrolled student. Under `DefaultAbsent`, roster
/// students missing from `rows` are added unmarked so they are written as
/// absent; under `Omit` the rows are returned as given.
pub fn fit_to_roster(
  rows: &[BufferRow],
  roster: &[RosterEntry],
  policy: UnmarkedPolicy,
) -> Result<Vec<BufferRow>> {
  let enrolled: HashSet<Uuid> = roster.iter().map(|e| e.student_id).collect();
  if let Some(stranger) = rows.iter().find(|r| !enrolled.contains(&r.student_id)) {
    return Err(Error::Validation(format!(
      "student {} is not enrolled at this venue",
      stranger.student_id
    )));
  }

  let mut fitted = rows.to_vec();
  if policy == UnmarkedPolicy::DefaultAbsent {
    let mut covered: HashSet<Uuid> = rows.iter().map(|r| r.student_id).collect();
    fitted.extend(
      roster
        .iter()
        .filter(|e| covered.insert(e.student_id))
        .map(|e| BufferRow {
          student_id: e.student_id,
          name:       e.name.clone(),
          department: e.department.clone(),
          status:     None,
          remarks:    String::new(),
        }),
    );
  }
  Ok(fitted)
}

// ─── Committer ───────────────────────────────────────────────────────────────

/// Submits buffers to the store, one in-flight commit per session.
pub struct BatchCommitter<S> {
  store:     Arc<S>,
  in_flight: Mutex<HashSet<Uuid>>,
}

impl<S: AttendanceStore> BatchCommitter<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self { store, in_flight: Mutex::new(HashSet::new()) }
  }

  /// Validate `rows` and write them as one atomic batch.
  ///
  /// A second commit for a session whose previous commit has not finished is
  /// rejected with `CommitInFlight` and never reaches the store.
  pub async fn commit(
    &self,
    session_id: Option<Uuid>,
    rows: &[BufferRow],
    policy: UnmarkedPolicy,
  ) -> Result<CommitOutcome> {
    let session_id = session_id.ok_or(Error::SessionNotResolved)?;
    let marks = write_set(rows, policy)?;

    let _claim = InFlightClaim::acquire(&self.in_flight, session_id)?;
    let written_count = self
      .store
      .write_marks(session_id, marks)
      .await
      .map_err(from_store)?;

    info!(%session_id, written_count, ?policy, "committed attendance batch");
    Ok(CommitOutcome { written_count })
  }
}

/// Membership of a session id in the in-flight set, released on drop.
struct InFlightClaim<'a> {
  set:        &'a Mutex<HashSet<Uuid>>,
  session_id: Uuid,
}

impl<'a> InFlightClaim<'a> {
  fn acquire(set: &'a Mutex<HashSet<Uuid>>, session_id: Uuid) -> Result<Self> {
    let inserted = set
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(session_id);
    if !inserted {
      return Err(Error::CommitInFlight(session_id));
    }
    Ok(Self { set, session_id })
  }
}

impl Drop for InFlightClaim<'_> {
  fn drop(&mut self) {
    self
      .set
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .remove(&self.session_id);
  }
}
