//! rollcall server binary.
//!
//! Reads `rollcall.toml` (or the path given with `--config`), overlaid with
//! `ROLLCALL_*` environment variables, opens the SQLite store, optionally
//! seeds it from a fixture file, and serves the JSON API under `/api`.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use rollcall_core::backend::StoreBackend;
use rollcall_server::ServerConfig;
use rollcall_store_sqlite::{Fixture, SqliteStore};
use tokio::net::TcpListener;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "rollcall attendance server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "rollcall.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("ROLLCALL"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let catalogue = server_cfg.catalogue().context("invalid slot catalogue")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }

  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  if let Some(path) = &server_cfg.fixture {
    let path = expand_tilde(path);
    let raw = tokio::fs::read_to_string(&path)
      .await
      .with_context(|| format!("failed to read fixture {path:?}"))?;
    let fixture = Fixture::from_json(&raw)
      .with_context(|| format!("failed to parse fixture {path:?}"))?;
    store
      .load_fixture(&fixture)
      .await
      .context("failed to load fixture")?;
    info!(
      venues = fixture.venues.len(),
      students = fixture.students.len(),
      "fixture loaded"
    );
  }

  let backend = Arc::new(StoreBackend::new(Arc::new(store), catalogue));
  let app = rollcall_server::router(backend);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
