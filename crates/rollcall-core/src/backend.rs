//! The `MarkingBackend` trait: everything the marking flow needs from the
//! outside world, independent of transport.
//!
//! [`StoreBackend`] implements it in-process on top of an [`AttendanceStore`];
//! the API server exposes a `StoreBackend` over HTTP and the CLI implements the
//! trait again as an HTTP client.

use std::{future::Future, sync::Arc};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  attendance::{AttendanceRecord, RosterEntry},
  buffer::BufferRow,
  commit::{BatchCommitter, CommitOutcome, UnmarkedPolicy, fit_to_roster},
  error::from_store,
  resolve::get_or_create,
  store::AttendanceStore,
  venue::{Resolution, SessionKey, SlotCatalogue},
};

/// A commit as it travels from the marking flow to a backend.
///
/// The key is carried alongside the session id so the receiving side can
/// check that the buffer was built for the session it is about to overwrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRequest {
  pub session_id: Uuid,
  #[serde(flatten)]
  pub key:        SessionKey,
  pub unmarked:   UnmarkedPolicy,
  pub rows:       Vec<BufferRow>,
}

pub trait MarkingBackend: Send + Sync {
  /// Get-or-create the session for `key`.
  fn resolve_session(
    &self,
    key: SessionKey,
  ) -> impl Future<Output = Result<Resolution>> + Send + '_;

  /// Students enrolled at `venue_id`.
  fn roster(
    &self,
    venue_id: Uuid,
  ) -> impl Future<Output = Result<Vec<RosterEntry>>> + Send + '_;

  /// Records already stored for a session held at `venue_id`.
  fn session_records(
    &self,
    session_id: Uuid,
    venue_id: Uuid,
  ) -> impl Future<Output = Result<Vec<AttendanceRecord>>> + Send + '_;

  /// Persist a buffer atomically.
  fn commit(
    &self,
    request: CommitRequest,
  ) -> impl Future<Output = Result<CommitOutcome>> + Send + '_;
}

// ─── In-process implementation ───────────────────────────────────────────────

/// [`MarkingBackend`] backed directly by a store.
pub struct StoreBackend<S> {
  store:     Arc<S>,
  catalogue: SlotCatalogue,
  committer: BatchCommitter<S>,
}

impl<S: AttendanceStore> StoreBackend<S> {
  pub fn new(store: Arc<S>, catalogue: SlotCatalogue) -> Self {
    let committer = BatchCommitter::new(store.clone());
    Self { store, catalogue, committer }
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn catalogue(&self) -> &SlotCatalogue { &self.catalogue }

  /// Look up a student, failing with `NotFound` when there is none.
  pub async fn student(&self, student_id: Uuid) -> Result<RosterEntry> {
    self
      .store
      .get_student(student_id)
      .await
      .map_err(from_store)?
      .ok_or_else(|| Error::NotFound(format!("student {student_id}")))
  }

  /// Fetch a session and check it belongs to `venue_id`.
  async fn session_at(&self, session_id: Uuid, venue_id: Uuid) -> Result<crate::venue::Session> {
    let session = self
      .store
      .get_session(session_id)
      .await
      .map_err(from_store)?
      .ok_or_else(|| Error::NotFound(format!("session {session_id}")))?;
    if session.key.venue_id != venue_id {
      return Err(Error::Validation(format!(
        "session {session_id} is not held at venue {venue_id}"
      )));
    }
    Ok(session)
  }
}

impl<S: AttendanceStore> MarkingBackend for StoreBackend<S> {
  async fn resolve_session(&self, key: SessionKey) -> Result<Resolution> {
    get_or_create(self.store.as_ref(), &self.catalogue, key).await
  }

  async fn roster(&self, venue_id: Uuid) -> Result<Vec<RosterEntry>> {
    if self.store.get_venue(venue_id).await.map_err(from_store)?.is_none() {
      return Err(Error::NotFound(format!("venue {venue_id}")));
    }
    self.store.list_roster(venue_id).await.map_err(from_store)
  }

  async fn session_records(
    &self,
    session_id: Uuid,
    venue_id: Uuid,
  ) -> Result<Vec<AttendanceRecord>> {
    self.session_at(session_id, venue_id).await?;
    self.store.session_records(session_id).await.map_err(from_store)
  }

  async fn commit(&self, request: CommitRequest) -> Result<CommitOutcome> {
    let session = self.session_at(request.session_id, request.key.venue_id).await?;
    if session.key != request.key {
      return Err(Error::Validation(format!(
        "session {} belongs to {}, not {}",
        request.session_id, session.key, request.key
      )));
    }
    let roster = self.store.list_roster(session.key.venue_id).await.map_err(from_store)?;
    let rows = fit_to_roster(&request.rows, &roster, request.unmarked)?;
    self
      .committer
      .commit(Some(request.session_id), &rows, request.unmarked)
      .await
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;
  use crate::{attendance::AttendanceStatus, testing::seeded};

  fn day(d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(2024, 3, d).unwrap() }

  #[tokio::test]
  async fn commit_rejects_a_key_that_does_not_match_the_session() {
    let (store, venue, students) = seeded(1);
    let backend = StoreBackend::new(Arc::new(store), SlotCatalogue::default());
    let key = SessionKey::new(venue, day(4), "09:00-10:30");
    let res = backend.resolve_session(key.clone()).await.unwrap();

    let mut rows = vec![BufferRow {
      student_id: students[0],
      name:       "x".into(),
      department: None,
      status:     Some(AttendanceStatus::Present),
      remarks:    String::new(),
    }];
    let wrong = CommitRequest {
      session_id: res.session_id,
      key:        SessionKey::new(venue, day(5), "09:00-10:30"),
      unmarked:   UnmarkedPolicy::Omit,
      rows:       rows.clone(),
    };
    assert!(matches!(backend.commit(wrong).await, Err(Error::Validation(_))));

    rows[0].remarks = "ok".into();
    let right = CommitRequest {
      session_id: res.session_id,
      key,
      unmarked: UnmarkedPolicy::Omit,
      rows,
    };
    assert_eq!(backend.commit(right).await.unwrap().written_count, 1);
  }

  fn marked(student_id: Uuid, status: Option<AttendanceStatus>) -> BufferRow {
    BufferRow { student_id, name: String::new(), department: None, status, remarks: String::new() }
  }

  #[tokio::test]
  async fn commit_only_accepts_enrolled_students() {
    let (store, venue, students) = seeded(2);
    let elsewhere = store.add_venue("Lab 2", None);
    let stranger = store.add_student("Stranger");
    store.enroll(elsewhere, stranger);
    let backend = StoreBackend::new(Arc::new(store.clone()), SlotCatalogue::default());
    let key = SessionKey::new(venue, day(4), "09:00-10:30");
    let res = backend.resolve_session(key.clone()).await.unwrap();

    let request = CommitRequest {
      session_id: res.session_id,
      key,
      unmarked:   UnmarkedPolicy::Omit,
      rows:       vec![marked(stranger, Some(AttendanceStatus::Late))],
    };
    assert!(matches!(backend.commit(request.clone()).await, Err(Error::Validation(_))));
    assert_eq!(store.write_calls(), 0);

    // A student dropped from the roster after marking keeps the stored
    // record, but cannot be marked again and no longer appears in the buffer.
    let first = CommitRequest {
      rows: vec![marked(students[0], Some(AttendanceStatus::Present))],
      ..request.clone()
    };
    backend.commit(first.clone()).await.unwrap();
    store.unenroll(venue, students[0]);

    assert!(matches!(backend.commit(first).await, Err(Error::Validation(_))));
    let stored = backend.session_records(res.session_id, venue).await.unwrap();
    assert_eq!(stored.len(), 1);
    let roster = backend.roster(venue).await.unwrap();
    let buffer = crate::merge::merge(&roster, &stored);
    assert_eq!(buffer.len(), 1);
    assert!(buffer.get(students[0]).is_none());
  }

  #[tokio::test]
  async fn default_absent_writes_the_whole_roster() {
    let (store, venue, students) = seeded(3);
    let backend = StoreBackend::new(Arc::new(store), SlotCatalogue::default());
    let key = SessionKey::new(venue, day(4), "09:00-10:30");
    let res = backend.resolve_session(key.clone()).await.unwrap();

    let out = backend
      .commit(CommitRequest {
        session_id: res.session_id,
        key,
        unmarked:   UnmarkedPolicy::DefaultAbsent,
        rows:       vec![marked(students[1], Some(AttendanceStatus::Late))],
      })
      .await
      .unwrap();
    assert_eq!(out.written_count, 3);

    let stored = backend.session_records(res.session_id, venue).await.unwrap();
    let absent = stored.iter().filter(|r| r.status == AttendanceStatus::Absent).count();
    assert_eq!(absent, 2);
  }

  #[tokio::test]
  async fn unknown_student_is_not_found() {
    let (store, _, students) = seeded(1);
    let backend = StoreBackend::new(Arc::new(store), SlotCatalogue::default());
    assert_eq!(backend.student(students[0]).await.unwrap().name, "Student 00");
    assert!(matches!(backend.student(Uuid::new_v4()).await, Err(Error::NotFound(_))));
  }

  #[tokio::test]
  async fn session_records_checks_the_venue() {
    let (store, venue, _) = seeded(1);
    let other = store.add_venue("Lab 2", None);
    let backend = StoreBackend::new(Arc::new(store), SlotCatalogue::default());
    let res = backend
      .resolve_session(SessionKey::new(venue, day(4), "09:00-10:30"))
      .await
      .unwrap();

    assert!(backend.session_records(res.session_id, venue).await.unwrap().is_empty());
    assert!(matches!(
      backend.session_records(res.session_id, other).await,
      Err(Error::Validation(_))
    ));
    assert!(matches!(
      backend.session_records(Uuid::new_v4(), venue).await,
      Err(Error::NotFound(_))
    ));
  }

  #[tokio::test]
  async fn roster_of_unknown_venue_is_not_found() {
    let (store, _, _) = seeded(0);
    let backend = StoreBackend::new(Arc::new(store), SlotCatalogue::default());
    assert!(matches!(backend.roster(Uuid::new_v4()).await, Err(Error::NotFound(_))));
  }
}
