//! SQL schema for the rollcall SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS venues (
    venue_id    TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    faculty_id  TEXT             -- assigned faculty member, if any
);

CREATE TABLE IF NOT EXISTS students (
    student_id  TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    department  TEXT
);

CREATE TABLE IF NOT EXISTS enrollments (
    venue_id    TEXT NOT NULL REFERENCES venues(venue_id),
    student_id  TEXT NOT NULL REFERENCES students(student_id),
    PRIMARY KEY (venue_id, student_id)
);

-- Sessions are created lazily and never deleted.
CREATE TABLE IF NOT EXISTS sessions (
    session_id    TEXT PRIMARY KEY,
    venue_id      TEXT NOT NULL REFERENCES venues(venue_id),
    session_date  TEXT NOT NULL,   -- YYYY-MM-DD
    slot_label    TEXT NOT NULL,
    created_at    TEXT NOT NULL,   -- RFC 3339 UTC
    UNIQUE (venue_id, session_date, slot_label)
);

-- One row per student per session; commits overwrite in place.
CREATE TABLE IF NOT EXISTS attendance (
    session_id   TEXT NOT NULL REFERENCES sessions(session_id),
    student_id   TEXT NOT NULL REFERENCES students(student_id),
    status       TEXT NOT NULL
                 CHECK (status IN ('present', 'absent', 'late', 'permitted_skip')),
    remarks      TEXT,
    recorded_at  TEXT NOT NULL,    -- RFC 3339 UTC, fixed precision
    PRIMARY KEY (session_id, student_id)
);

CREATE INDEX IF NOT EXISTS attendance_student_idx ON attendance(student_id);
CREATE INDEX IF NOT EXISTS sessions_date_idx      ON sessions(session_date);
CREATE INDEX IF NOT EXISTS venues_faculty_idx     ON venues(faculty_id);

PRAGMA user_version = 1;
";
