//! Integration tests for `SqliteStore` against an in-memory database.

use std::sync::Arc;

use chrono::NaiveDate;
use rollcall_core::{
  Error as CoreError,
  attendance::{AttendanceStatus, Mark, RecordQuery},
  backend::{CommitRequest, MarkingBackend, StoreBackend},
  commit::UnmarkedPolicy,
  resolve::get_or_create,
  store::AttendanceStore,
  venue::{SessionKey, SlotCatalogue},
};
use uuid::Uuid;

use crate::{
  Error, SqliteStore,
  fixture::{Fixture, FixtureStudent, FixtureVenue},
};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn day(m: u32, d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(2024, m, d).unwrap() }

/// A venue with `n` enrolled students.
async fn seeded(s: &SqliteStore, n: usize) -> (Uuid, Vec<Uuid>) {
  let venue = s.insert_venue("Lab 1", None).await.unwrap();
  let mut students = Vec::new();
  for i in 0..n {
    let st = s.insert_student(format!("Student {i:02}"), None).await.unwrap();
    s.enroll(venue.venue_id, st.student_id).await.unwrap();
    students.push(st.student_id);
  }
  (venue.venue_id, students)
}

fn mark(student_id: Uuid, status: AttendanceStatus) -> Mark {
  Mark { student_id, status, remarks: None }
}

// ─── Venues and rosters ──────────────────────────────────────────────────────

#[tokio::test]
async fn venues_are_scoped_by_faculty() {
  let s = store().await;
  let faculty = Uuid::new_v4();
  s.insert_venue("Mine", Some(faculty)).await.unwrap();
  s.insert_venue("Theirs", Some(Uuid::new_v4())).await.unwrap();
  s.insert_venue("Unassigned", None).await.unwrap();

  assert_eq!(s.list_venues(None).await.unwrap().len(), 3);
  let mine = s.list_venues(Some(faculty)).await.unwrap();
  assert_eq!(mine.len(), 1);
  assert_eq!(mine[0].name, "Mine");
}

#[tokio::test]
async fn roster_lists_enrolled_students_with_count() {
  let s = store().await;
  let (venue, students) = seeded(&s, 3).await;
  s.enroll(venue, students[0]).await.unwrap();

  let roster = s.list_roster(venue).await.unwrap();
  assert_eq!(
    roster.iter().map(|e| e.student_id).collect::<Vec<_>>(),
    students
  );
  let v = s.get_venue(venue).await.unwrap().unwrap();
  assert_eq!(v.enrolled_count, 3);
}

#[tokio::test]
async fn get_venue_missing_returns_none() {
  let s = store().await;
  assert!(s.get_venue(Uuid::new_v4()).await.unwrap().is_none());
}

// ─── Sessions ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn duplicate_session_key_is_a_conflict() {
  let s = store().await;
  let (venue, _) = seeded(&s, 0).await;
  let key = SessionKey::new(venue, day(3, 4), "09:00-10:30");

  let created = s.create_session(key.clone()).await.unwrap();
  let err = s.create_session(key.clone()).await.unwrap_err();
  assert!(matches!(err, Error::SessionConflict(_)));
  assert!(matches!(CoreError::from(err), CoreError::Conflict(_)));

  let found = s.find_session(key).await.unwrap().unwrap();
  assert_eq!(found.session_id, created.session_id);
  assert_eq!(s.get_session(created.session_id).await.unwrap(), Some(found));
}

#[tokio::test]
async fn resolution_is_idempotent_against_sqlite() {
  let s = store().await;
  let (venue, _) = seeded(&s, 0).await;
  let cat = SlotCatalogue::default();
  let key = SessionKey::new(venue, day(3, 4), "13:00-14:30");

  let a = get_or_create(&s, &cat, key.clone()).await.unwrap();
  let b = get_or_create(&s, &cat, key).await.unwrap();
  assert_eq!(a.session_id, b.session_id);
  assert!(!a.existing && b.existing);
}

#[tokio::test]
async fn concurrent_resolutions_share_one_session() {
  let s = store().await;
  let (venue, _) = seeded(&s, 0).await;
  let backend = Arc::new(StoreBackend::new(Arc::new(s.clone()), SlotCatalogue::default()));
  let key = SessionKey::new(venue, day(3, 4), "10:45-12:15");

  let handles: Vec<_> = (0..8)
    .map(|_| {
      let backend = backend.clone();
      let key = key.clone();
      tokio::spawn(async move { backend.resolve_session(key).await })
    })
    .collect();

  let mut ids = Vec::new();
  for h in handles {
    ids.push(h.await.unwrap().unwrap().session_id);
  }
  ids.dedup();
  assert_eq!(ids.len(), 1);
}

#[tokio::test]
async fn get_student_finds_enrolled_and_unenrolled_students() {
  let s = store().await;
  let (_, students) = seeded(&s, 1).await;
  let loose = s.insert_student("Loose", Some("Maths".into())).await.unwrap();

  assert_eq!(s.get_student(students[0]).await.unwrap().unwrap().name, "Student 00");
  let found = s.get_student(loose.student_id).await.unwrap().unwrap();
  assert_eq!(found.department.as_deref(), Some("Maths"));
  assert!(s.get_student(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn default_absent_commit_covers_the_sqlite_roster() {
  let s = store().await;
  let (venue, students) = seeded(&s, 3).await;
  let outsider = s.insert_student("Outsider", None).await.unwrap();
  let backend = StoreBackend::new(Arc::new(s.clone()), SlotCatalogue::default());
  let key = SessionKey::new(venue, day(3, 4), "09:00-10:30");
  let res = backend.resolve_session(key.clone()).await.unwrap();

  let buffer = rollcall_core::merge::merge(&backend.roster(venue).await.unwrap(), &[])
    .set_status(students[2], AttendanceStatus::Late)
    .unwrap();
  let mut request = CommitRequest {
    session_id: res.session_id,
    key,
    unmarked:   UnmarkedPolicy::DefaultAbsent,
    rows:       vec![buffer.get(students[2]).unwrap().clone()],
  };
  assert_eq!(backend.commit(request.clone()).await.unwrap().written_count, 3);

  let records = s.session_records(res.session_id).await.unwrap();
  assert_eq!(records.len(), 3);
  assert_eq!(
    records.iter().filter(|r| r.status == AttendanceStatus::Absent).count(),
    2
  );

  request.rows[0].student_id = outsider.student_id;
  let err = backend.commit(request).await.unwrap_err();
  assert!(matches!(err, CoreError::Validation(_)));
}

// ─── Records ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn write_marks_upserts_one_row_per_student() {
  let s = store().await;
  let (venue, students) = seeded(&s, 2).await;
  let session = s
    .create_session(SessionKey::new(venue, day(3, 4), "09:00-10:30"))
    .await
    .unwrap();

  let n = s
    .write_marks(session.session_id, vec![
      mark(students[0], AttendanceStatus::Late),
      mark(students[1], AttendanceStatus::Present),
    ])
    .await
    .unwrap();
  assert_eq!(n, 2);

  let mut again = mark(students[0], AttendanceStatus::PermittedSkip);
  again.remarks = Some("doctor".into());
  s.write_marks(session.session_id, vec![again]).await.unwrap();

  let records = s.session_records(session.session_id).await.unwrap();
  assert_eq!(records.len(), 2);
  let first = records.iter().find(|r| r.student_id == students[0]).unwrap();
  assert_eq!(first.status, AttendanceStatus::PermittedSkip);
  assert_eq!(first.remarks.as_deref(), Some("doctor"));
}

#[tokio::test]
async fn unknown_student_rolls_back_the_whole_batch() {
  let s = store().await;
  let (venue, students) = seeded(&s, 1).await;
  let session = s
    .create_session(SessionKey::new(venue, day(3, 4), "09:00-10:30"))
    .await
    .unwrap();

  let ghost = Uuid::new_v4();
  let err = s
    .write_marks(session.session_id, vec![
      mark(students[0], AttendanceStatus::Present),
      mark(ghost, AttendanceStatus::Present),
    ])
    .await
    .unwrap_err();

  assert!(matches!(err, Error::StudentNotFound(id) if id == ghost));
  assert!(s.session_records(session.session_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn write_to_missing_session_is_not_found() {
  let s = store().await;
  let (_, students) = seeded(&s, 1).await;
  let err = s
    .write_marks(Uuid::new_v4(), vec![mark(students[0], AttendanceStatus::Late)])
    .await
    .unwrap_err();
  assert!(matches!(CoreError::from(err), CoreError::NotFound(_)));
}

#[tokio::test]
async fn list_records_filters_by_year_and_range() {
  let s = store().await;
  let (venue, students) = seeded(&s, 1).await;
  for (date, slot) in [
    (NaiveDate::from_ymd_opt(2023, 12, 20).unwrap(), "09:00-10:30"),
    (day(1, 10), "13:00-14:30"),
    (day(1, 10), "09:00-10:30"),
    (day(2, 1), "09:00-10:30"),
  ] {
    let session = s.create_session(SessionKey::new(venue, date, slot)).await.unwrap();
    s.write_marks(session.session_id, vec![mark(students[0], AttendanceStatus::Late)])
      .await
      .unwrap();
  }

  let all = s.list_records(RecordQuery::for_student(students[0])).await.unwrap();
  assert_eq!(all.len(), 4);
  assert_eq!(all[1].key.slot, "09:00-10:30");
  assert_eq!(all[1].student_name, "Student 00");
  assert_eq!(all[1].venue_name, "Lab 1");

  let in_2024 = RecordQuery { year: Some(2024), ..RecordQuery::for_student(students[0]) };
  assert_eq!(s.list_records(in_2024).await.unwrap().len(), 3);

  let january = RecordQuery {
    from: Some(day(1, 1)),
    to: Some(day(1, 31)),
    ..RecordQuery::for_student(students[0])
  };
  assert_eq!(s.list_records(january).await.unwrap().len(), 2);

  let inverted = RecordQuery {
    from: Some(day(2, 1)),
    to: Some(day(1, 1)),
    ..RecordQuery::default()
  };
  let err = s.list_records(inverted).await.unwrap_err();
  assert!(matches!(CoreError::from(err), CoreError::Validation(_)));
}

#[tokio::test]
async fn list_records_filters_by_faculty() {
  let s = store().await;
  let faculty = Uuid::new_v4();
  let mine = s.insert_venue("Mine", Some(faculty)).await.unwrap();
  let other = s.insert_venue("Other", None).await.unwrap();
  let st = s.insert_student("Ada", Some("CS".into())).await.unwrap();

  for venue in [mine.venue_id, other.venue_id] {
    let session = s
      .create_session(SessionKey::new(venue, day(3, 4), "09:00-10:30"))
      .await
      .unwrap();
    s.write_marks(session.session_id, vec![mark(st.student_id, AttendanceStatus::Absent)])
      .await
      .unwrap();
  }

  let q = RecordQuery { faculty_id: Some(faculty), ..RecordQuery::default() };
  let records = s.list_records(q).await.unwrap();
  assert_eq!(records.len(), 1);
  assert_eq!(records[0].faculty_id, Some(faculty));
}

// ─── Fixture ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn fixture_loads_idempotently() {
  let s = store().await;
  let ada = Uuid::new_v4();
  let fixture = Fixture {
    students: vec![FixtureStudent { student_id: ada, name: "Ada".into(), department: None }],
    venues:   vec![FixtureVenue {
      venue_id:   Uuid::new_v4(),
      name:       "Lab 1".into(),
      faculty_id: None,
      roster:     vec![ada],
    }],
  };

  s.load_fixture(&fixture).await.unwrap();
  s.load_fixture(&fixture).await.unwrap();

  let venues = s.list_venues(None).await.unwrap();
  assert_eq!(venues.len(), 1);
  assert_eq!(venues[0].enrolled_count, 1);
  assert_eq!(s.list_roster(venues[0].venue_id).await.unwrap()[0].name, "Ada");
}

#[test]
fn fixture_parses_from_json() {
  let json = r#"{
    "students": [{ "student_id": "7f1c8a52-5b55-4a0e-9d43-1f1b6f5e2a10", "name": "Ada" }],
    "venues": [{ "venue_id": "0b0f5d4e-8a9a-4f8e-9e36-2c3a4b5c6d7e", "name": "Lab 1",
                 "roster": ["7f1c8a52-5b55-4a0e-9d43-1f1b6f5e2a10"] }]
  }"#;
  let fixture = Fixture::from_json(json).unwrap();
  assert_eq!(fixture.venues[0].roster, vec![fixture.students[0].student_id]);
  assert!(Fixture::from_json("{").is_err());
}
