//! Error type for `rollcall-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] rollcall_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// The `(venue, date, slot)` unique constraint rejected a new session.
  #[error("session already exists for {0}")]
  SessionConflict(String),

  #[error("session not found: {0}")]
  SessionNotFound(uuid::Uuid),

  #[error("student not found: {0}")]
  StudentNotFound(uuid::Uuid),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<Error> for rollcall_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Core(core) => core,
      Error::SessionConflict(key) => Self::Conflict(key),
      Error::SessionNotFound(id) => Self::NotFound(format!("session {id}")),
      Error::StudentNotFound(id) => Self::NotFound(format!("student {id}")),
      other => Self::Store(Box::new(other)),
    }
  }
}
