//! Plain-text rendering of API results for the terminal.

use std::fmt::Write as _;

use rollcall_api::{slots::SlotView, students::TimelineView};
use rollcall_core::{
  aggregate::AggregateRow,
  attendance::{AttendanceStatus, RosterEntry, SessionRecord},
  buffer::EditBuffer,
  venue::{SlotPhase, Venue},
};

fn status_cell(status: Option<AttendanceStatus>) -> &'static str {
  status.map_or("-", AttendanceStatus::as_str)
}

pub fn venues(venues: &[Venue]) -> String {
  let mut out = String::new();
  for v in venues {
    let _ = writeln!(out, "{}  {:<24} {:>4} enrolled", v.venue_id, v.name, v.enrolled_count);
  }
  out
}

pub fn roster(entries: &[RosterEntry]) -> String {
  let mut out = String::new();
  for e in entries {
    let dept = e.department.as_deref().unwrap_or("");
    let _ = writeln!(out, "{}  {:<24} {dept}", e.student_id, e.name);
  }
  out
}

pub fn slots(slots: &[SlotView]) -> String {
  let mut out = String::new();
  for s in slots {
    let phase = match s.phase {
      Some(SlotPhase::Upcoming) => "upcoming",
      Some(SlotPhase::Ongoing) => "ongoing",
      Some(SlotPhase::Completed) => "completed",
      None => "",
    };
    let line = format!(
      "{:<16} {}-{} {phase}",
      s.label,
      s.start.format("%H:%M"),
      s.end.format("%H:%M")
    );
    let _ = writeln!(out, "{}", line.trim_end());
  }
  out
}

pub fn buffer(buffer: &EditBuffer) -> String {
  let mut out = String::new();
  for row in buffer.rows() {
    let _ = write!(out, "{:<24} {:<15}", row.name, status_cell(row.status));
    if !row.remarks.is_empty() {
      let _ = write!(out, " {}", row.remarks);
    }
    out.push('\n');
  }
  let _ = writeln!(out, "{} of {} marked", buffer.marked_count(), buffer.len());
  out
}

pub fn records(records: &[SessionRecord]) -> String {
  let mut out = String::new();
  for r in records {
    let _ = writeln!(
      out,
      "{}  {:<12} {:<20} {}",
      r.key.date, r.key.slot, r.venue_name, r.record.status
    );
  }
  out
}

pub fn timeline(view: &TimelineView) -> String {
  let mut out = String::new();
  for day in &view.days {
    let _ = writeln!(out, "{}", day.date);
    for block in &day.blocks {
      match &block.record {
        Some(r) => {
          let _ = writeln!(
            out,
            "  {}. {:<12} {:<20} {}",
            block.index, r.key.slot, r.venue_name, block.status
          );
        }
        None => {
          let _ = writeln!(out, "  {}. (no session)", block.index);
        }
      }
    }
  }
  let s = &view.summary;
  let rate = s
    .attendance_rate
    .map_or_else(|| "n/a".to_owned(), |r| format!("{:.1}%", r * 100.0));
  let _ = writeln!(
    out,
    "{} days, {} blocks: {} present, {} late, {} permitted skip, {} absent \
     ({} without a session); attendance {rate}",
    s.days, s.blocks, s.present, s.late, s.permitted_skip, s.absent, s.placeholders
  );
  out
}

pub fn report(rows: &[AggregateRow]) -> String {
  let mut out = String::new();
  for row in rows {
    let _ = writeln!(out, "{:>3}  {}  {}", row.count, row.student_name, row.student_id);
    for m in &row.matches {
      let _ = write!(out, "       {} {:<12} {}", m.date, m.slot, m.venue_name);
      if let Some(remarks) = &m.remarks {
        let _ = write!(out, " ({remarks})");
      }
      out.push('\n');
    }
  }
  out
}
