//! The marking flow as an explicit state machine.
//!
//! ```text
//! select(key) ──► Loading ──load()──► apply() ──► Ready ──commit()──► Committed
//!      ▲                                 │                                │
//!      └──────────── stale result ◄──────┘                 refresh() ─────┘
//! ```
//!
//! Every selection bumps a generation counter and hands out a [`LoadTicket`].
//! Loads run outside the flow through a cloneable [`SelectionLoader`], so a
//! caller can start a new selection while an old load is still in flight;
//! when the old result comes back, [`MarkingFlow::apply`] sees that its ticket
//! is no longer current and drops it.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::{
  Error, Result,
  attendance::{AttendanceRecord, RosterEntry},
  backend::{CommitRequest, MarkingBackend},
  buffer::EditBuffer,
  commit::{CommitOutcome, UnmarkedPolicy},
  merge::merge,
  resolve::SessionResolver,
  venue::SessionKey,
};

/// Tag identifying one selection. Only the ticket from the most recent
/// [`MarkingFlow::select`] is current.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
  generation: u64,
  key:        SessionKey,
}

impl LoadTicket {
  pub fn key(&self) -> &SessionKey { &self.key }
}

/// Everything fetched for one selection, not yet applied to a flow.
#[derive(Debug, Clone)]
pub struct Loaded {
  ticket:     LoadTicket,
  session_id: Uuid,
  existing:   bool,
  roster:     Vec<RosterEntry>,
  records:    Vec<AttendanceRecord>,
}

impl Loaded {
  pub fn ticket(&self) -> &LoadTicket { &self.ticket }
}

/// A resolved selection and its working buffer.
#[derive(Debug, Clone)]
pub struct Selection {
  pub key:        SessionKey,
  pub session_id: Uuid,
  /// Whether the session existed before this selection resolved it.
  pub existing:   bool,
  roster:         Vec<RosterEntry>,
  records:        Vec<AttendanceRecord>,
  buffer:         EditBuffer,
}

impl Selection {
  pub fn buffer(&self) -> &EditBuffer { &self.buffer }

  pub fn roster(&self) -> &[RosterEntry] { &self.roster }

  /// The stored records the buffer was merged from.
  pub fn records(&self) -> &[AttendanceRecord] { &self.records }
}

#[derive(Debug, Clone)]
pub enum FlowState {
  Idle,
  Loading(SessionKey),
  Ready(Selection),
  /// The buffer was written and discarded.
  Committed {
    key:        SessionKey,
    session_id: Uuid,
    outcome:    CommitOutcome,
  },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
  Current,
  /// The result belonged to a superseded selection and was dropped.
  Stale,
}

// ─── Loader ──────────────────────────────────────────────────────────────────

/// Runs the resolve → roster → records sequence for a ticket.
pub struct SelectionLoader<B> {
  resolver: Arc<SessionResolver<B>>,
  backend:  Arc<B>,
}

impl<B> Clone for SelectionLoader<B> {
  fn clone(&self) -> Self {
    Self { resolver: self.resolver.clone(), backend: self.backend.clone() }
  }
}

impl<B: MarkingBackend> SelectionLoader<B> {
  pub async fn load(&self, ticket: LoadTicket) -> Result<Loaded> {
    let resolution = self.resolver.resolve(&ticket.key).await?;
    let roster = self.backend.roster(ticket.key.venue_id).await?;
    let records = self
      .backend
      .session_records(resolution.session_id, ticket.key.venue_id)
      .await?;
    Ok(Loaded {
      ticket,
      session_id: resolution.session_id,
      existing: resolution.existing,
      roster,
      records,
    })
  }
}

// ─── Flow ────────────────────────────────────────────────────────────────────

pub struct MarkingFlow<B> {
  resolver:   Arc<SessionResolver<B>>,
  backend:    Arc<B>,
  generation: u64,
  state:      FlowState,
}

impl<B: MarkingBackend> MarkingFlow<B> {
  pub fn new(backend: Arc<B>) -> Self {
    Self {
      resolver: Arc::new(SessionResolver::new(backend.clone())),
      backend,
      generation: 0,
      state: FlowState::Idle,
    }
  }

  pub fn state(&self) -> &FlowState { &self.state }

  pub fn selection(&self) -> Option<&Selection> {
    match &self.state {
      FlowState::Ready(selection) => Some(selection),
      _ => None,
    }
  }

  /// Start a new selection. The current buffer is discarded and any load
  /// still running for an earlier ticket becomes stale.
  pub fn select(&mut self, key: SessionKey) -> LoadTicket {
    self.generation += 1;
    self.resolver.retarget(&key);
    debug!(generation = self.generation, %key, "selection changed");
    self.state = FlowState::Loading(key.clone());
    LoadTicket { generation: self.generation, key }
  }

  pub fn loader(&self) -> SelectionLoader<B> {
    SelectionLoader { resolver: self.resolver.clone(), backend: self.backend.clone() }
  }

  pub fn is_current(&self, ticket: &LoadTicket) -> bool {
    ticket.generation == self.generation
  }

  /// Install a finished load if its ticket is still current.
  pub fn apply(&mut self, loaded: Loaded) -> Applied {
    if !self.is_current(&loaded.ticket) {
      debug!(key = %loaded.ticket.key, "discarding stale load");
      return Applied::Stale;
    }
    let buffer = merge(&loaded.roster, &loaded.records);
    self.state = FlowState::Ready(Selection {
      key: loaded.ticket.key,
      session_id: loaded.session_id,
      existing: loaded.existing,
      roster: loaded.roster,
      records: loaded.records,
      buffer,
    });
    Applied::Current
  }

  /// Select `key` and load it in one step.
  pub async fn change_slot(&mut self, key: SessionKey) -> Result<&Selection> {
    let ticket = self.select(key);
    match self.loader().load(ticket.clone()).await {
      Ok(loaded) => {
        self.apply(loaded);
      }
      Err(e) => {
        if self.is_current(&ticket) {
          self.state = FlowState::Idle;
        }
        return Err(e);
      }
    }
    self.selection().ok_or(Error::SessionNotResolved)
  }

  /// Reload the current key from the backend, discarding unsaved edits.
  pub async fn refresh(&mut self) -> Result<&Selection> {
    let key = match &self.state {
      FlowState::Loading(key) | FlowState::Committed { key, .. } => key.clone(),
      FlowState::Ready(selection) => selection.key.clone(),
      FlowState::Idle => return Err(Error::SessionNotResolved),
    };
    self.change_slot(key).await
  }

  /// Replace the buffer with `f(buffer)`.
  pub fn update(
    &mut self,
    f: impl FnOnce(&EditBuffer) -> Result<EditBuffer>,
  ) -> Result<&EditBuffer> {
    let FlowState::Ready(selection) = &mut self.state else {
      return Err(Error::SessionNotResolved);
    };
    selection.buffer = f(&selection.buffer)?;
    Ok(&selection.buffer)
  }

  /// Write the buffer. On success the buffer is discarded and the flow moves
  /// to `Committed`; on failure it stays `Ready` with the buffer intact.
  pub async fn commit(&mut self, policy: UnmarkedPolicy) -> Result<CommitOutcome> {
    let FlowState::Ready(selection) = &self.state else {
      return Err(Error::SessionNotResolved);
    };
    let request = CommitRequest {
      session_id: selection.session_id,
      key:        selection.key.clone(),
      unmarked:   policy,
      rows:       selection.buffer.rows().to_vec(),
    };
    let outcome = self.backend.commit(request.clone()).await?;
    self.state = FlowState::Committed {
      key: request.key,
      session_id: request.session_id,
      outcome,
    };
    Ok(outcome)
  }
}
