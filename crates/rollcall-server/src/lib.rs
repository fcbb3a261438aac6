//! HTTP server for rollcall.
//!
//! Mounts the JSON API from `rollcall-api` under `/api`, wrapped in a
//! request trace layer, over any [`AttendanceStore`].

use std::{path::PathBuf, sync::Arc};

use axum::Router;
use rollcall_core::{
  backend::StoreBackend,
  store::AttendanceStore,
  venue::{SlotCatalogue, TimeSlot},
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// One entry of the slot catalogue as written in config, times as `HH:MM`.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SlotConfig {
  pub label: String,
  pub start: String,
  pub end:   String,
}

/// Runtime server configuration, deserialised from `rollcall.toml` and
/// `ROLLCALL_*` environment variables.
#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:       String,
  #[serde(default = "default_port")]
  pub port:       u16,
  #[serde(default = "default_store_path")]
  pub store_path: PathBuf,
  /// The slot catalogue. Empty means the built-in four-slot day.
  #[serde(default)]
  pub slots:      Vec<SlotConfig>,
  /// JSON file of venues, students and enrollments loaded at startup.
  #[serde(default)]
  pub fixture:    Option<PathBuf>,
}

fn default_host() -> String { "127.0.0.1".to_owned() }

fn default_port() -> u16 { 8080 }

fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/rollcall/rollcall.db") }

impl ServerConfig {
  /// Build the slot catalogue from config.
  pub fn catalogue(&self) -> rollcall_core::Result<SlotCatalogue> {
    if self.slots.is_empty() {
      return Ok(SlotCatalogue::default());
    }
    let slots = self
      .slots
      .iter()
      .map(|s| TimeSlot::parse(s.label.clone(), &s.start, &s.end))
      .collect::<rollcall_core::Result<Vec<_>>>()?;
    SlotCatalogue::new(slots)
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full application router for `backend`.
pub fn router<S>(backend: Arc<StoreBackend<S>>) -> Router
where
  S: AttendanceStore + 'static,
{
  Router::new()
    .nest("/api", rollcall_api::api_router(backend))
    .layer(TraceLayer::new_for_http())
}

// ─── Integration tests ────────────────────────────────────────────────────────
