//! Error types for `rollcall-core`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A referenced venue, session or student does not exist.
  #[error("not found: {0}")]
  NotFound(String),

  /// The store reported a duplicate session key while creating a session.
  #[error("session already exists for {0}")]
  Conflict(String),

  #[error("nothing to submit: mark at least one student before saving")]
  EmptySubmission,

  #[error("invalid input: {0}")]
  Validation(String),

  #[error("no session has been resolved for the current selection")]
  SessionNotResolved,

  #[error("a commit is already in flight for session {0}")]
  CommitInFlight(uuid::Uuid),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Stable, machine-readable classification of an [`Error`]. This is what
/// crosses the wire; the display message is for humans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  NotFound,
  Conflict,
  EmptySubmission,
  Validation,
  SessionNotResolved,
  CommitInFlight,
  Store,
}

impl Error {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::NotFound(_) => ErrorKind::NotFound,
      Self::Conflict(_) => ErrorKind::Conflict,
      Self::EmptySubmission => ErrorKind::EmptySubmission,
      Self::Validation(_) => ErrorKind::Validation,
      Self::SessionNotResolved => ErrorKind::SessionNotResolved,
      Self::CommitInFlight(_) => ErrorKind::CommitInFlight,
      Self::Store(_) => ErrorKind::Store,
    }
  }

  /// Whether the caller may reasonably offer a retry. Rule violations
  /// (empty or malformed submissions) never become valid by retrying.
  pub fn is_retryable(&self) -> bool {
    matches!(
      self.kind(),
      ErrorKind::NotFound
        | ErrorKind::Conflict
        | ErrorKind::CommitInFlight
        | ErrorKind::Store
    )
  }
}

/// Convert a backend error into the core taxonomy. Used with `map_err` where
/// inference cannot see through `Into::into`.
pub(crate) fn from_store<E: Into<Error>>(e: E) -> Error { e.into() }
