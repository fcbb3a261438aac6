//! The `AttendanceStore` trait.
//!
//! The trait is implemented by storage backends (e.g.
//! `rollcall-store-sqlite`). The reconciliation logic in this crate depends on
//! this abstraction, never on a concrete backend.

use std::future::Future;

use uuid::Uuid;

use crate::{
  attendance::{AttendanceRecord, Mark, RecordQuery, RosterEntry, SessionRecord},
  venue::{Session, SessionKey, Venue},
};

/// Abstraction over an attendance store backend.
///
/// Backends report storage failures through `Self::Error`, which converts
/// into the core taxonomy. A backend must convert a duplicate session key on
/// [`create_session`](Self::create_session) into
/// [`Error::Conflict`](crate::Error::Conflict) so the resolver can re-resolve.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait AttendanceStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static + Into<crate::Error>;

  // ── Venues and rosters ────────────────────────────────────────────────

  /// List venues, restricted to those assigned to `faculty_id` when given.
  fn list_venues(
    &self,
    faculty_id: Option<Uuid>,
  ) -> impl Future<Output = Result<Vec<Venue>, Self::Error>> + Send + '_;

  /// Retrieve a venue by UUID. Returns `None` if not found.
  fn get_venue(
    &self,
    venue_id: Uuid,
  ) -> impl Future<Output = Result<Option<Venue>, Self::Error>> + Send + '_;

  /// The students enrolled at a venue, ordered by name.
  fn list_roster(
    &self,
    venue_id: Uuid,
  ) -> impl Future<Output = Result<Vec<RosterEntry>, Self::Error>> + Send + '_;

  /// Retrieve a student by UUID. Returns `None` if not found.
  fn get_student(
    &self,
    student_id: Uuid,
  ) -> impl Future<Output = Result<Option<RosterEntry>, Self::Error>> + Send + '_;

  // ── Sessions ──────────────────────────────────────────────────────────

  /// Look up the session for a key. Returns `None` if none exists yet.
  fn find_session(
    &self,
    key: SessionKey,
  ) -> impl Future<Output = Result<Option<Session>, Self::Error>> + Send + '_;

  /// Persist a new session for `key`. Fails with a conflict if one already
  /// exists for the key.
  fn create_session(
    &self,
    key: SessionKey,
  ) -> impl Future<Output = Result<Session, Self::Error>> + Send + '_;

  /// Retrieve a session by UUID. Returns `None` if not found.
  fn get_session(
    &self,
    session_id: Uuid,
  ) -> impl Future<Output = Result<Option<Session>, Self::Error>> + Send + '_;

  // ── Records ───────────────────────────────────────────────────────────

  /// All records stored for one session.
  fn session_records(
    &self,
    session_id: Uuid,
  ) -> impl Future<Output = Result<Vec<AttendanceRecord>, Self::Error>> + Send + '_;

  /// Upsert `marks` for `session_id` atomically: either every mark is
  /// persisted or none is. Returns the number of records written.
  fn write_marks(
    &self,
    session_id: Uuid,
    marks: Vec<Mark>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Records matching `query`, joined with their session context, ordered by
  /// session date, then slot label, then write time. Callers that need the
  /// catalogue's slot order re-sort with
  /// [`order_by_catalogue`](crate::timeline::order_by_catalogue).
  fn list_records(
    &self,
    query: RecordQuery,
  ) -> impl Future<Output = Result<Vec<SessionRecord>, Self::Error>> + Send + '_;
}
