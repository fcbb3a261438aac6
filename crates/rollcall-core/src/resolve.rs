//! Session resolution.
//!
//! Two layers cooperate:
//!
//! - [`get_or_create`] runs next to the store and turns a [`SessionKey`] into
//!   a session, creating it at most once. A duplicate-key race during creation
//!   triggers exactly one re-lookup, which returns the winner.
//! - [`SessionResolver`] runs next to the marking flow and memoizes the last
//!   resolved key, so re-resolving an unchanged selection costs no backend
//!   call at all.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};

use crate::{
  Error, Result,
  backend::MarkingBackend,
  error::from_store,
  store::AttendanceStore,
  venue::{Resolution, SessionKey, SlotCatalogue},
};

// ─── Store side ──────────────────────────────────────────────────────────────

/// Idempotent get-or-create for the session identified by `key`.
///
/// Fails with `Validation` if the slot is not in `catalogue`, `NotFound` if
/// the venue does not exist, and `Conflict` only if creation collided and the
/// winning session still cannot be found.
pub async fn get_or_create<S: AttendanceStore>(
  store: &S,
  catalogue: &SlotCatalogue,
  key: SessionKey,
) -> Result<Resolution> {
  catalogue.require(&key.slot)?;

  if store.get_venue(key.venue_id).await.map_err(from_store)?.is_none() {
    return Err(Error::NotFound(format!("venue {}", key.venue_id)));
  }

  if let Some(session) = store.find_session(key.clone()).await.map_err(from_store)? {
    debug!(session_id = %session.session_id, %key, "session already exists");
    return Ok(Resolution { session_id: session.session_id, existing: true });
  }

  match store.create_session(key.clone()).await.map_err(from_store) {
    Ok(session) => {
      info!(session_id = %session.session_id, %key, "created session");
      Ok(Resolution { session_id: session.session_id, existing: false })
    }
    Err(Error::Conflict(_)) => {
      debug!(%key, "lost session creation race; re-resolving once");
      store
        .find_session(key.clone())
        .await
        .map_err(from_store)?
        .map(|session| Resolution { session_id: session.session_id, existing: true })
        .ok_or_else(|| Error::Conflict(key.to_string()))
    }
    Err(e) => Err(e),
  }
}

// ─── Flow side ───────────────────────────────────────────────────────────────

#[derive(Default)]
struct ResolverState {
  /// The key the owning flow currently cares about, if it has said so.
  target: Option<SessionKey>,
  last:   Option<(SessionKey, Resolution)>,
}

/// Memoizing front for [`MarkingBackend::resolve_session`].
///
/// Holds a single "last resolved key → session" entry. The entry is dropped
/// as soon as the flow retargets to a different key, and a resolution that
/// completes for a key the flow has since moved away from is returned to its
/// caller but never cached.
pub struct SessionResolver<B> {
  backend: Arc<B>,
  state:   Mutex<ResolverState>,
  /// Serializes backend resolutions so duplicate calls for one key issue a
  /// single request; the second caller finds the cached entry.
  gate:    tokio::sync::Mutex<()>,
}

impl<B: MarkingBackend> SessionResolver<B> {
  pub fn new(backend: Arc<B>) -> Self {
    Self {
      backend,
      state: Mutex::new(ResolverState::default()),
      gate: tokio::sync::Mutex::new(()),
    }
  }

  /// Resolve `key`, hitting the backend only on a cache miss.
  pub async fn resolve(&self, key: &SessionKey) -> Result<Resolution> {
    let _gate = self.gate.lock().await;

    if let Some(hit) = self.cached(key) {
      debug!(%key, "session cache hit");
      return Ok(hit);
    }

    debug!(%key, "session cache miss");
    let resolution = self.backend.resolve_session(key.clone()).await?;

    let mut state = self.lock_state();
    let still_wanted = state.target.as_ref().is_none_or(|t| t == key);
    if still_wanted {
      state.last = Some((key.clone(), resolution));
    } else {
      debug!(%key, "not caching resolution for a superseded key");
    }
    Ok(resolution)
  }

  /// Declare the key the flow now cares about. Any cached entry for a
  /// different key is invalidated.
  pub fn retarget(&self, key: &SessionKey) {
    let mut state = self.lock_state();
    if state.last.as_ref().is_some_and(|(k, _)| k != key) {
      state.last = None;
    }
    state.target = Some(key.clone());
  }

  /// Drop the cached entry unconditionally.
  pub fn invalidate(&self) { self.lock_state().last = None; }

  /// The currently cached key, if any.
  pub fn cached_key(&self) -> Option<SessionKey> {
    self.lock_state().last.as_ref().map(|(k, _)| k.clone())
  }

  fn cached(&self, key: &SessionKey) -> Option<Resolution> {
    self
      .lock_state()
      .last
      .as_ref()
      .filter(|(k, _)| k == key)
      .map(|(_, r)| Resolution { existing: true, ..*r })
  }

  fn lock_state(&self) -> std::sync::MutexGuard<'_, ResolverState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }
}
