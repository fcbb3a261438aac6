//! [`SqliteStore`]: the SQLite implementation of [`AttendanceStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use tracing::{debug, info};
use uuid::Uuid;

use rollcall_core::{
  attendance::{AttendanceRecord, Mark, RecordQuery, RosterEntry, SessionRecord},
  store::AttendanceStore,
  venue::{Session, SessionKey, Venue},
};

use crate::{
  Error, Result,
  encode::{
    RawRecord, RawSession, RawSessionRecord, RawStudent, RawVenue, encode_date,
    encode_dt, encode_uuid,
  },
  fixture::Fixture,
  schema::SCHEMA,
};

const VENUE_COLUMNS: &str = "
  v.venue_id, v.name, v.faculty_id,
  (SELECT COUNT(*) FROM enrollments e WHERE e.venue_id = v.venue_id)";

const SESSION_COLUMNS: &str =
  "session_id, venue_id, session_date, slot_label, created_at";

fn venue_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawVenue> {
  Ok(RawVenue {
    venue_id:       row.get(0)?,
    name:           row.get(1)?,
    faculty_id:     row.get(2)?,
    enrolled_count: row.get(3)?,
  })
}

fn session_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawSession> {
  Ok(RawSession {
    session_id:   row.get(0)?,
    venue_id:     row.get(1)?,
    session_date: row.get(2)?,
    slot_label:   row.get(3)?,
    created_at:   row.get(4)?,
  })
}

/// Result of the write transaction. Anything but `Written` rolls back.
enum WriteOutcome {
  Written(usize),
  MissingSession,
  MissingStudent(Uuid),
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// An attendance store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Reference data ────────────────────────────────────────────────────────

  pub async fn insert_venue(
    &self,
    name: impl Into<String>,
    faculty_id: Option<Uuid>,
  ) -> Result<Venue> {
    let venue = Venue {
      venue_id: Uuid::new_v4(),
      name: name.into(),
      faculty_id,
      enrolled_count: 0,
    };
    let id_str      = encode_uuid(venue.venue_id);
    let name        = venue.name.clone();
    let faculty_str = faculty_id.map(encode_uuid);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO venues (venue_id, name, faculty_id) VALUES (?1, ?2, ?3)",
          rusqlite::params![id_str, name, faculty_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(venue)
  }

  pub async fn insert_student(
    &self,
    name: impl Into<String>,
    department: Option<String>,
  ) -> Result<RosterEntry> {
    let entry = RosterEntry { student_id: Uuid::new_v4(), name: name.into(), department };
    let id_str     = encode_uuid(entry.student_id);
    let name       = entry.name.clone();
    let department = entry.department.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO students (student_id, name, department) VALUES (?1, ?2, ?3)",
          rusqlite::params![id_str, name, department],
        )?;
        Ok(())
      })
      .await?;
    Ok(entry)
  }

  /// Enroll a student at a venue. Enrolling twice is a no-op.
  pub async fn enroll(&self, venue_id: Uuid, student_id: Uuid) -> Result<()> {
    let venue_str   = encode_uuid(venue_id);
    let student_str = encode_uuid(student_id);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO enrollments (venue_id, student_id) VALUES (?1, ?2)",
          rusqlite::params![venue_str, student_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Upsert every venue, student and enrollment in `fixture` in one
  /// transaction. Loading the same fixture twice leaves the store unchanged.
  pub async fn load_fixture(&self, fixture: &Fixture) -> Result<()> {
    let students: Vec<(String, String, Option<String>)> = fixture
      .students
      .iter()
      .map(|s| (encode_uuid(s.student_id), s.name.clone(), s.department.clone()))
      .collect();
    let venues: Vec<(String, String, Option<String>, Vec<String>)> = fixture
      .venues
      .iter()
      .map(|v| {
        (
          encode_uuid(v.venue_id),
          v.name.clone(),
          v.faculty_id.map(encode_uuid),
          v.roster.iter().copied().map(encode_uuid).collect(),
        )
      })
      .collect();
    let (n_students, n_venues) = (students.len(), venues.len());

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for (id, name, department) in &students {
          tx.execute(
            "INSERT INTO students (student_id, name, department) VALUES (?1, ?2, ?3)
             ON CONFLICT(student_id) DO UPDATE
               SET name = excluded.name, department = excluded.department",
            rusqlite::params![id, name, department],
          )?;
        }
        for (id, name, faculty, roster) in &venues {
          tx.execute(
            "INSERT INTO venues (venue_id, name, faculty_id) VALUES (?1, ?2, ?3)
             ON CONFLICT(venue_id) DO UPDATE
               SET name = excluded.name, faculty_id = excluded.faculty_id",
            rusqlite::params![id, name, faculty],
          )?;
          for student in roster {
            tx.execute(
              "INSERT OR IGNORE INTO enrollments (venue_id, student_id) VALUES (?1, ?2)",
              rusqlite::params![id, student],
            )?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    info!(students = n_students, venues = n_venues, "loaded fixture");
    Ok(())
  }
}

// ─── AttendanceStore impl ────────────────────────────────────────────────────

impl AttendanceStore for SqliteStore {
  type Error = Error;

  // ── Venues and rosters ────────────────────────────────────────────────────

  async fn list_venues(&self, faculty_id: Option<Uuid>) -> Result<Vec<Venue>> {
    let faculty_str = faculty_id.map(encode_uuid);

    let raws: Vec<RawVenue> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {VENUE_COLUMNS} FROM venues v
           WHERE ?1 IS NULL OR v.faculty_id = ?1
           ORDER BY v.name, v.venue_id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![faculty_str], venue_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawVenue::into_venue).collect()
  }

  async fn get_venue(&self, venue_id: Uuid) -> Result<Option<Venue>> {
    let id_str = encode_uuid(venue_id);

    let raw: Option<RawVenue> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {VENUE_COLUMNS} FROM venues v WHERE v.venue_id = ?1"),
            rusqlite::params![id_str],
            venue_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawVenue::into_venue).transpose()
  }

  async fn list_roster(&self, venue_id: Uuid) -> Result<Vec<RosterEntry>> {
    let id_str = encode_uuid(venue_id);

    let raws: Vec<RawStudent> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT s.student_id, s.name, s.department
           FROM enrollments e
           JOIN students s ON s.student_id = e.student_id
           WHERE e.venue_id = ?1
           ORDER BY s.name, s.student_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawStudent {
              student_id: row.get(0)?,
              name:       row.get(1)?,
              department: row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawStudent::into_entry).collect()
  }

  async fn get_student(&self, student_id: Uuid) -> Result<Option<RosterEntry>> {
    let id_str = encode_uuid(student_id);

    let raw: Option<RawStudent> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT student_id, name, department FROM students WHERE student_id = ?1",
            rusqlite::params![id_str],
            |row| {
              Ok(RawStudent {
                student_id: row.get(0)?,
                name:       row.get(1)?,
                department: row.get(2)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawStudent::into_entry).transpose()
  }

  // ── Sessions ──────────────────────────────────────────────────────────────

  async fn find_session(&self, key: SessionKey) -> Result<Option<Session>> {
    let venue_str = encode_uuid(key.venue_id);
    let date_str  = encode_date(key.date);

    let raw: Option<RawSession> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {SESSION_COLUMNS} FROM sessions
               WHERE venue_id = ?1 AND session_date = ?2 AND slot_label = ?3"
            ),
            rusqlite::params![venue_str, date_str, key.slot],
            session_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawSession::into_session).transpose()
  }

  async fn create_session(&self, key: SessionKey) -> Result<Session> {
    let session = Session {
      session_id: Uuid::new_v4(),
      key,
      created_at: Utc::now(),
    };
    let id_str    = encode_uuid(session.session_id);
    let venue_str = encode_uuid(session.key.venue_id);
    let date_str  = encode_date(session.key.date);
    let slot      = session.key.slot.clone();
    let at_str    = encode_dt(session.created_at);

    let inserted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT INTO sessions (session_id, venue_id, session_date, slot_label, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)
           ON CONFLICT(venue_id, session_date, slot_label) DO NOTHING",
          rusqlite::params![id_str, venue_str, date_str, slot, at_str],
        )?)
      })
      .await?;

    if inserted == 0 {
      debug!(key = %session.key, "session insert hit the unique key");
      return Err(Error::SessionConflict(session.key.to_string()));
    }
    Ok(session)
  }

  async fn get_session(&self, session_id: Uuid) -> Result<Option<Session>> {
    let id_str = encode_uuid(session_id);

    let raw: Option<RawSession> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE session_id = ?1"),
            rusqlite::params![id_str],
            session_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawSession::into_session).transpose()
  }

  // ── Records ───────────────────────────────────────────────────────────────

  async fn session_records(&self, session_id: Uuid) -> Result<Vec<AttendanceRecord>> {
    let id_str = encode_uuid(session_id);

    let raws: Vec<RawRecord> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT session_id, student_id, status, remarks, recorded_at
           FROM attendance WHERE session_id = ?1
           ORDER BY recorded_at, student_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawRecord {
              session_id:  row.get(0)?,
              student_id:  row.get(1)?,
              status:      row.get(2)?,
              remarks:     row.get(3)?,
              recorded_at: row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRecord::into_record).collect()
  }

  async fn write_marks(&self, session_id: Uuid, marks: Vec<Mark>) -> Result<usize> {
    let session_str = encode_uuid(session_id);
    let at_str      = encode_dt(Utc::now());
    let rows: Vec<(Uuid, String, &'static str, Option<String>)> = marks
      .into_iter()
      .map(|m| (m.student_id, encode_uuid(m.student_id), m.status.as_str(), m.remarks))
      .collect();

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let session_exists = tx
          .query_row(
            "SELECT 1 FROM sessions WHERE session_id = ?1",
            rusqlite::params![session_str],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if !session_exists {
          return Ok(WriteOutcome::MissingSession);
        }

        let mut written = 0;
        {
          let mut student_exists =
            tx.prepare("SELECT 1 FROM students WHERE student_id = ?1")?;
          let mut upsert = tx.prepare(
            "INSERT INTO attendance (session_id, student_id, status, remarks, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(session_id, student_id) DO UPDATE
               SET status      = excluded.status,
                   remarks     = excluded.remarks,
                   recorded_at = excluded.recorded_at",
          )?;
          for (student_id, student, status, remarks) in &rows {
            if !student_exists.exists(rusqlite::params![student])? {
              return Ok(WriteOutcome::MissingStudent(*student_id));
            }
            written += upsert.execute(rusqlite::params![
              session_str, student, status, remarks, at_str
            ])?;
          }
        }

        tx.commit()?;
        Ok(WriteOutcome::Written(written))
      })
      .await?;

    match outcome {
      WriteOutcome::Written(n) => Ok(n),
      WriteOutcome::MissingSession => Err(Error::SessionNotFound(session_id)),
      WriteOutcome::MissingStudent(id) => Err(Error::StudentNotFound(id)),
    }
  }

  async fn list_records(&self, query: RecordQuery) -> Result<Vec<SessionRecord>> {
    let (from, to)  = query.date_bounds()?;
    let student_str = query.student_id.map(encode_uuid);
    let faculty_str = query.faculty_id.map(encode_uuid);
    let from_str    = from.map(encode_date);
    let to_str      = to.map(encode_date);

    let raws: Vec<RawSessionRecord> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT
             a.session_id, a.student_id, a.status, a.remarks, a.recorded_at,
             se.venue_id, se.session_date, se.slot_label,
             v.name, v.faculty_id, st.name
           FROM attendance a
           JOIN sessions se ON se.session_id = a.session_id
           JOIN venues   v  ON v.venue_id    = se.venue_id
           JOIN students st ON st.student_id = a.student_id
           WHERE (?1 IS NULL OR a.student_id    = ?1)
             AND (?2 IS NULL OR v.faculty_id     = ?2)
             AND (?3 IS NULL OR se.session_date >= ?3)
             AND (?4 IS NULL OR se.session_date <= ?4)
           ORDER BY se.session_date, se.slot_label, a.recorded_at",
        )?;

        let rows = stmt
          .query_map(
            rusqlite::params![student_str, faculty_str, from_str, to_str],
            |row| {
              Ok(RawSessionRecord {
                record:       RawRecord {
                  session_id:  row.get(0)?,
                  student_id:  row.get(1)?,
                  status:      row.get(2)?,
                  remarks:     row.get(3)?,
                  recorded_at: row.get(4)?,
                },
                venue_id:     row.get(5)?,
                session_date: row.get(6)?,
                slot_label:   row.get(7)?,
                venue_name:   row.get(8)?,
                faculty_id:   row.get(9)?,
                student_name: row.get(10)?,
              })
            },
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(RawSessionRecord::into_session_record)
      .collect()
  }
}
