//! In-memory [`AttendanceStore`] with fault injection, for unit tests.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::{
  Error, Result,
  attendance::{AttendanceRecord, Mark, RecordQuery, RosterEntry, SessionRecord},
  store::AttendanceStore,
  venue::{Session, SessionKey, Venue},
};

#[derive(Default)]
struct Inner {
  venues:       Vec<Venue>,
  students:     Vec<RosterEntry>,
  enrollments:  Vec<(Uuid, Uuid)>,
  sessions:     Vec<Session>,
  records:      Vec<AttendanceRecord>,
  find_calls:   usize,
  create_calls: usize,
  write_calls:  usize,
  race_create:  bool,
  fail_write:   bool,
  hold_write:   Option<Arc<Notify>>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
  inner: Arc<Mutex<Inner>>,
}

/// A store with one venue and `students` enrolled students.
pub fn seeded(students: usize) -> (MemoryStore, Uuid, Vec<Uuid>) {
  let store = MemoryStore::default();
  let venue = store.add_venue("Lab 1", None);
  let ids = (0..students)
    .map(|i| {
      let id = store.add_student(&format!("Student {i:02}"));
      store.enroll(venue, id);
      id
    })
    .collect();
  (store, venue, ids)
}

impl MemoryStore {
  fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn add_venue(&self, name: &str, faculty_id: Option<Uuid>) -> Uuid {
    let venue_id = Uuid::new_v4();
    self.lock().venues.push(Venue {
      venue_id,
      name: name.into(),
      faculty_id,
      enrolled_count: 0,
    });
    venue_id
  }

  pub fn add_student(&self, name: &str) -> Uuid {
    let student_id = Uuid::new_v4();
    self.lock().students.push(RosterEntry {
      student_id,
      name: name.into(),
      department: None,
    });
    student_id
  }

  pub fn enroll(&self, venue_id: Uuid, student_id: Uuid) {
    let mut inner = self.lock();
    inner.enrollments.push((venue_id, student_id));
    if let Some(v) = inner.venues.iter_mut().find(|v| v.venue_id == venue_id) {
      v.enrolled_count += 1;
    }
  }

  pub fn unenroll(&self, venue_id: Uuid, student_id: Uuid) {
    self
      .lock()
      .enrollments
      .retain(|&(v, s)| (v, s) != (venue_id, student_id));
  }

  pub fn session_count(&self) -> usize { self.lock().sessions.len() }

  pub fn find_calls(&self) -> usize { self.lock().find_calls }

  pub fn create_calls(&self) -> usize { self.lock().create_calls }

  pub fn write_calls(&self) -> usize { self.lock().write_calls }

  /// The next `create_session` behaves as if another writer created the
  /// session first.
  pub fn race_next_create(&self) { self.lock().race_create = true; }

  pub fn fail_next_write(&self) { self.lock().fail_write = true; }

  /// The next `write_marks` blocks until the returned handle is notified.
  pub fn hold_next_write(&self) -> Arc<Notify> {
    let notify = Arc::new(Notify::new());
    self.lock().hold_write = Some(notify.clone());
    notify
  }

  fn new_session(key: SessionKey) -> Session {
    Session { session_id: Uuid::new_v4(), key, created_at: Utc::now() }
  }
}

impl AttendanceStore for MemoryStore {
  type Error = Error;

  async fn list_venues(&self, faculty_id: Option<Uuid>) -> Result<Vec<Venue>> {
    Ok(
      self
        .lock()
        .venues
        .iter()
        .filter(|v| faculty_id.is_none_or(|f| v.faculty_id == Some(f)))
        .cloned()
        .collect(),
    )
  }

  async fn get_venue(&self, venue_id: Uuid) -> Result<Option<Venue>> {
    Ok(self.lock().venues.iter().find(|v| v.venue_id == venue_id).cloned())
  }

  async fn list_roster(&self, venue_id: Uuid) -> Result<Vec<RosterEntry>> {
    let inner = self.lock();
    Ok(
      inner
        .enrollments
        .iter()
        .filter(|(v, _)| *v == venue_id)
        .filter_map(|(_, s)| inner.students.iter().find(|e| e.student_id == *s))
        .cloned()
        .collect(),
    )
  }

  async fn get_student(&self, student_id: Uuid) -> Result<Option<RosterEntry>> {
    Ok(self.lock().students.iter().find(|e| e.student_id == student_id).cloned())
  }

  async fn find_session(&self, key: SessionKey) -> Result<Option<Session>> {
    let mut inner = self.lock();
    inner.find_calls += 1;
    Ok(inner.sessions.iter().find(|s| s.key == key).cloned())
  }

  async fn create_session(&self, key: SessionKey) -> Result<Session> {
    let mut inner = self.lock();
    inner.create_calls += 1;
    if std::mem::take(&mut inner.race_create) {
      inner.sessions.push(Self::new_session(key.clone()));
    }
    if inner.sessions.iter().any(|s| s.key == key) {
      return Err(Error::Conflict(key.to_string()));
    }
    let session = Self::new_session(key);
    inner.sessions.push(session.clone());
    Ok(session)
  }

  async fn get_session(&self, session_id: Uuid) -> Result<Option<Session>> {
    Ok(
      self
        .lock()
        .sessions
        .iter()
        .find(|s| s.session_id == session_id)
        .cloned(),
    )
  }

  async fn session_records(&self, session_id: Uuid) -> Result<Vec<AttendanceRecord>> {
    Ok(
      self
        .lock()
        .records
        .iter()
        .filter(|r| r.session_id == session_id)
        .cloned()
        .collect(),
    )
  }

  async fn write_marks(&self, session_id: Uuid, marks: Vec<Mark>) -> Result<usize> {
    let hold = {
      let mut inner = self.lock();
      inner.write_calls += 1;
      inner.hold_write.take()
    };
    if let Some(notify) = hold {
      notify.notified().await;
    }

    let mut inner = self.lock();
    if std::mem::take(&mut inner.fail_write) {
      return Err(Error::Store("injected write failure".into()));
    }
    if !inner.sessions.iter().any(|s| s.session_id == session_id) {
      return Err(Error::NotFound(format!("session {session_id}")));
    }
    let now = Utc::now();
    let written = marks.len();
    for mark in marks {
      inner
        .records
        .retain(|r| !(r.session_id == session_id && r.student_id == mark.student_id));
      inner.records.push(AttendanceRecord {
        session_id,
        student_id: mark.student_id,
        status: mark.status,
        remarks: mark.remarks,
        recorded_at: now,
      });
    }
    Ok(written)
  }

  async fn list_records(&self, query: RecordQuery) -> Result<Vec<SessionRecord>> {
    let inner = self.lock();
    let mut out: Vec<SessionRecord> = inner
      .records
      .iter()
      .filter_map(|record| {
        let session = inner.sessions.iter().find(|s| s.session_id == record.session_id)?;
        let venue = inner.venues.iter().find(|v| v.venue_id == session.key.venue_id)?;
        let student = inner.students.iter().find(|s| s.student_id == record.student_id)?;
        Some(SessionRecord {
          record:       record.clone(),
          key:          session.key.clone(),
          venue_name:   venue.name.clone(),
          faculty_id:   venue.faculty_id,
          student_name: student.name.clone(),
        })
      })
      .filter(|r| query.matches(r))
      .collect();
    out.sort_by(|a, b| {
      (a.key.date, &a.key.slot, a.record.recorded_at)
        .cmp(&(b.key.date, &b.key.slot, b.record.recorded_at))
    });
    Ok(out)
  }
}
