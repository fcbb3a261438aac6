//! The `mark` subcommand: load a session's roster and existing marks, apply
//! the edits given on the command line, and commit them.

use std::sync::Arc;

use anyhow::Context as _;
use rollcall_core::{
  Error, Result,
  attendance::AttendanceStatus,
  backend::MarkingBackend,
  buffer::EditBuffer,
  commit::UnmarkedPolicy,
  flow::MarkingFlow,
  venue::SessionKey,
};
use tracing::info;
use uuid::Uuid;

use crate::render;

/// Edits to apply to a freshly loaded buffer, in this order: `clear`, `all`,
/// per-student marks, per-student remarks.
#[derive(Debug, Clone, Default)]
pub struct Edits {
  pub clear:   bool,
  pub all:     Option<AttendanceStatus>,
  pub marks:   Vec<(String, AttendanceStatus)>,
  pub remarks: Vec<(String, String)>,
}

impl Edits {
  pub fn apply(&self, buffer: &EditBuffer) -> Result<EditBuffer> {
    let mut next = if self.clear { buffer.clear_all() } else { buffer.clone() };
    if let Some(status) = self.all {
      next = next.set_all(status);
    }
    for (who, status) in &self.marks {
      next = next.set_status(find_student(&next, who)?, *status)?;
    }
    for (who, text) in &self.remarks {
      next = next.set_remark(find_student(&next, who)?, text.as_str())?;
    }
    Ok(next)
  }
}

/// Find a buffer row by student id or by case-insensitive full name.
fn find_student(buffer: &EditBuffer, who: &str) -> Result<Uuid> {
  if let Ok(id) = who.parse::<Uuid>() {
    return buffer
      .get(id)
      .map(|row| row.student_id)
      .ok_or_else(|| Error::Validation(format!("student {id} is not on this roster")));
  }
  let mut hits = buffer
    .rows()
    .iter()
    .filter(|row| row.name.eq_ignore_ascii_case(who.trim()));
  match (hits.next(), hits.next()) {
    (Some(row), None) => Ok(row.student_id),
    (None, _) => Err(Error::Validation(format!("no student named {who:?} on this roster"))),
    (Some(_), Some(_)) => Err(Error::Validation(format!(
      "more than one student is named {who:?}; use the student id"
    ))),
  }
}

/// Parse a `WHO=VALUE` command-line pair.
pub fn parse_pair(s: &str) -> Result<(String, String), String> {
  let (who, value) = s
    .split_once('=')
    .ok_or_else(|| format!("expected WHO=VALUE, got {s:?}"))?;
  if who.trim().is_empty() {
    return Err(format!("missing student before '=' in {s:?}"));
  }
  Ok((who.trim().to_owned(), value.to_owned()))
}

/// Parse a `WHO=STATUS` command-line pair.
pub fn parse_mark(s: &str) -> Result<(String, AttendanceStatus), String> {
  let (who, status) = parse_pair(s)?;
  let status = status.parse().map_err(|e: Error| e.to_string())?;
  Ok((who, status))
}

pub struct MarkArgs {
  pub key:     SessionKey,
  pub edits:   Edits,
  pub policy:  UnmarkedPolicy,
  pub dry_run: bool,
}

pub async fn run<B: MarkingBackend>(backend: B, args: MarkArgs) -> anyhow::Result<()> {
  let mut flow = MarkingFlow::new(Arc::new(backend));

  let selection = flow
    .change_slot(args.key)
    .await
    .context("failed to load the session")?;
  info!(
    session_id = %selection.session_id,
    existing = selection.existing,
    recorded = selection.records().len(),
    "session loaded"
  );

  let buffer = flow.update(|b| args.edits.apply(b))?;
  print!("{}", render::buffer(buffer));

  if args.dry_run {
    println!("dry run: nothing saved");
    return Ok(());
  }

  let outcome = flow
    .commit(args.policy)
    .await
    .context("failed to save attendance")?;
  println!("saved {} marks", outcome.written_count);
  Ok(())
}
