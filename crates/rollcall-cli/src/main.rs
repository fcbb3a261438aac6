//! `rollcall`: command-line client for a rollcall server.
//!
//! # Usage
//!
//! ```text
//! rollcall --url http://localhost:8080 venues --faculty <id>
//! rollcall mark --venue <id> --slot 09:00-10:30 --all present --set "Ada=late" --unmarked omit
//! rollcall report --status late --min-count 5
//! ```

mod client;
mod mark;
mod render;

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use client::{ApiClient, ApiConfig, RangeArgs};
use mark::{Edits, MarkArgs};
use rollcall_core::{
  attendance::AttendanceStatus, backend::MarkingBackend as _, commit::UnmarkedPolicy,
  venue::SessionKey,
};
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "rollcall", about = "Attendance marking and reports for a rollcall server")]
struct Args {
  /// Path to a TOML config file (url).
  #[arg(short, long, value_name = "FILE", global = true)]
  config: Option<PathBuf>,

  /// Base URL of the rollcall server (default: http://localhost:8080).
  #[arg(long, env = "ROLLCALL_URL", global = true)]
  url: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List venues, optionally only those assigned to one faculty member.
  Venues {
    #[arg(long)]
    faculty: Option<Uuid>,
  },
  /// List the students enrolled at a venue.
  Roster { venue: Uuid },
  /// Show the slot catalogue, with each slot's phase on `--date`.
  Slots {
    #[arg(long)]
    date: Option<NaiveDate>,
  },
  /// Mark attendance for one venue, date and slot.
  Mark(MarkCmd),
  /// A student's committed records.
  Records {
    student: Uuid,
    #[command(flatten)]
    range:   RangeFlags,
  },
  /// A student's day-by-day timeline.
  Timeline {
    student: Uuid,
    #[command(flatten)]
    range:   RangeFlags,
    /// Only show blocks with this status.
    #[arg(long)]
    status:  Option<AttendanceStatus>,
    /// Only show blocks whose venue or slot contains this text.
    #[arg(long)]
    text:    Option<String>,
  },
  /// Students with at least `--min-count` records of a status.
  Report {
    #[arg(long, default_value = "late")]
    status:    AttendanceStatus,
    #[arg(long)]
    min_count: usize,
    #[arg(long)]
    faculty:   Option<Uuid>,
  },
}

#[derive(ClapArgs, Debug)]
struct RangeFlags {
  #[arg(long)]
  year: Option<i32>,
  /// Inclusive start date.
  #[arg(long)]
  from: Option<NaiveDate>,
  /// Inclusive end date.
  #[arg(long)]
  to:   Option<NaiveDate>,
}

impl From<RangeFlags> for RangeArgs {
  fn from(f: RangeFlags) -> Self { Self { year: f.year, from: f.from, to: f.to } }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Unmarked {
  /// Leave unmarked students out.
  Omit,
  /// Save unmarked students as absent.
  DefaultAbsent,
}

impl From<Unmarked> for UnmarkedPolicy {
  fn from(u: Unmarked) -> Self {
    match u {
      Unmarked::Omit => Self::Omit,
      Unmarked::DefaultAbsent => Self::DefaultAbsent,
    }
  }
}

#[derive(ClapArgs, Debug)]
struct MarkCmd {
  #[arg(long)]
  venue:    Uuid,
  /// Session date (default: today).
  #[arg(long)]
  date:     Option<NaiveDate>,
  /// Slot label from the catalogue.
  #[arg(long)]
  slot:     String,
  /// What to do with students left unmarked.
  #[arg(long, value_enum)]
  unmarked: Unmarked,
  /// Reset every loaded mark before applying edits.
  #[arg(long)]
  clear:    bool,
  /// Mark every student with this status.
  #[arg(long)]
  all:      Option<AttendanceStatus>,
  /// Mark one student, by id or name: `--set "Ada Lovelace=late"`.
  #[arg(long = "set", value_name = "WHO=STATUS", value_parser = mark::parse_mark)]
  marks:    Vec<(String, AttendanceStatus)>,
  /// Attach a remark to one student: `--remark "Ada Lovelace=bus strike"`.
  #[arg(long = "remark", value_name = "WHO=TEXT", value_parser = mark::parse_pair)]
  remarks:  Vec<(String, String)>,
  /// Show the buffer without saving.
  #[arg(long)]
  dry_run:  bool,
}

impl MarkCmd {
  fn into_args(self) -> MarkArgs {
    let date = self.date.unwrap_or_else(|| Local::now().date_naive());
    MarkArgs {
      key:     SessionKey::new(self.venue, date, self.slot),
      edits:   Edits {
        clear:   self.clear,
        all:     self.all,
        marks:   self.marks,
        remarks: self.remarks,
      },
      policy:  self.unmarked.into(),
      dry_run: self.dry_run,
    }
  }
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url: String,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file, which overrides defaults.
  let api_config = ApiConfig {
    base_url: args
      .url
      .or_else(|| (!file_cfg.url.is_empty()).then(|| file_cfg.url.clone()))
      .unwrap_or_else(|| "http://localhost:8080".to_string()),
  };
  let client = ApiClient::new(api_config)?;

  let result = run(client, args.command).await;
  if let Err(e) = &result
    && e
      .downcast_ref::<rollcall_core::Error>()
      .is_some_and(rollcall_core::Error::is_retryable)
  {
    eprintln!("this may succeed if you try again");
  }
  result
}

async fn run(client: ApiClient, command: Command) -> Result<()> {
  match command {
    Command::Venues { faculty } => {
      print!("{}", render::venues(&client.venues(faculty).await?));
    }
    Command::Roster { venue } => {
      print!("{}", render::roster(&client.roster(venue).await?));
    }
    Command::Slots { date } => {
      print!("{}", render::slots(&client.slots(date).await?));
    }
    Command::Mark(cmd) => mark::run(client, cmd.into_args()).await?,
    Command::Records { student, range } => {
      let records = client.student_records(student, &range.into()).await?;
      print!("{}", render::records(&records));
    }
    Command::Timeline { student, range, status, text } => {
      let view = client
        .timeline(student, &range.into(), status, text.as_deref())
        .await?;
      print!("{}", render::timeline(&view));
    }
    Command::Report { status, min_count, faculty } => {
      let rows = client.threshold(status, min_count, faculty).await?;
      print!("{}", render::report(&rows));
    }
  }
  Ok(())
}
