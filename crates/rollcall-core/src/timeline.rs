//! Per-student daily timelines.
//!
//! A student's history is rebuilt as a fixed number of blocks per observed
//! day: the real records first, then placeholder absences filling the
//! remaining slots. Filters and grouping run on the block list, so filtering
//! for absences finds placeholders as well as recorded absences.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
  attendance::{AttendanceStatus, SessionRecord},
  venue::SlotCatalogue,
};

pub const DEFAULT_SLOTS_PER_DAY: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineBlock {
  pub date:   NaiveDate,
  /// 1-based position within the day.
  pub index:  usize,
  /// The recorded status, or `Absent` for a placeholder.
  pub status: AttendanceStatus,
  /// `None` for a placeholder ("no session / absent").
  pub record: Option<SessionRecord>,
}

impl TimelineBlock {
  pub fn is_placeholder(&self) -> bool { self.record.is_none() }
}

/// Sort records by date, then by the position of their slot in `catalogue`.
/// Labels the catalogue does not know sort after known ones, by label. The
/// sort is stable, so records sharing a slot keep their relative order.
pub fn order_by_catalogue(records: &mut [SessionRecord], catalogue: &SlotCatalogue) {
  let position = |label: &str| {
    catalogue
      .slots()
      .iter()
      .position(|s| s.label == label)
      .unwrap_or(usize::MAX)
  };
  records.sort_by(|a, b| {
    a.date()
      .cmp(&b.date())
      .then_with(|| position(&a.key.slot).cmp(&position(&b.key.slot)))
      .then_with(|| a.key.slot.cmp(&b.key.slot))
  });
}

/// Rebuild the daily blocks for one student's records.
///
/// Only dates that appear in `records` are produced, in ascending order, each
/// with exactly `slots_per_day` blocks. Within a day real blocks keep the
/// order of `records`, so callers put them in slot order first with
/// [`order_by_catalogue`]. A day holding more records than `slots_per_day` is
/// truncated.
pub fn reconstruct(records: &[SessionRecord], slots_per_day: usize) -> Vec<TimelineBlock> {
  let mut by_date: BTreeMap<NaiveDate, Vec<&SessionRecord>> = BTreeMap::new();
  for record in records {
    by_date.entry(record.date()).or_default().push(record);
  }

  let mut blocks = Vec::with_capacity(by_date.len() * slots_per_day);
  for (date, mut day) in by_date {
    if day.len() > slots_per_day {
      warn!(
        %date,
        records = day.len(),
        slots_per_day,
        "more records than slots on one day; truncating timeline"
      );
      day.truncate(slots_per_day);
    }
    let real = day.len();
    blocks.extend(day.into_iter().enumerate().map(|(i, record)| TimelineBlock {
      date,
      index: i + 1,
      status: record.record.status,
      record: Some(record.clone()),
    }));
    blocks.extend((real..slots_per_day).map(|i| TimelineBlock {
      date,
      index: i + 1,
      status: AttendanceStatus::Absent,
      record: None,
    }));
  }
  blocks
}

// ─── Views ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineFilter {
  pub status: Option<AttendanceStatus>,
  /// Case-insensitive substring of the venue name or slot label.
  /// Placeholders have neither and never match.
  pub text:   Option<String>,
}

impl TimelineFilter {
  pub fn matches(&self, block: &TimelineBlock) -> bool {
    if self.status.is_some_and(|s| s != block.status) {
      return false;
    }
    let Some(text) = self.text.as_deref().map(str::trim).filter(|t| !t.is_empty())
    else {
      return true;
    };
    let needle = text.to_lowercase();
    block.record.as_ref().is_some_and(|r| {
      r.venue_name.to_lowercase().contains(&needle)
        || r.key.slot.to_lowercase().contains(&needle)
    })
  }
}

pub fn filter_blocks(blocks: &[TimelineBlock], filter: &TimelineFilter) -> Vec<TimelineBlock> {
  blocks.iter().filter(|b| filter.matches(b)).cloned().collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayTimeline {
  pub date:   NaiveDate,
  pub blocks: Vec<TimelineBlock>,
}

/// Group blocks by date, ascending. Block order within a day is kept.
pub fn group_by_date(blocks: &[TimelineBlock]) -> Vec<DayTimeline> {
  let mut days: BTreeMap<NaiveDate, Vec<TimelineBlock>> = BTreeMap::new();
  for block in blocks {
    days.entry(block.date).or_default().push(block.clone());
  }
  days
    .into_iter()
    .map(|(date, blocks)| DayTimeline { date, blocks })
    .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimelineSummary {
  pub days:            usize,
  pub blocks:          usize,
  pub present:         usize,
  pub absent:          usize,
  pub late:            usize,
  pub permitted_skip:  usize,
  /// Absences that are placeholders rather than recorded marks.
  pub placeholders:    usize,
  /// Share of blocks counted as attended, in `0.0..=1.0`. `None` when there
  /// are no blocks.
  pub attendance_rate: Option<f64>,
}

pub fn summarize(blocks: &[TimelineBlock]) -> TimelineSummary {
  let mut summary = TimelineSummary {
    days: group_by_date(blocks).len(),
    blocks: blocks.len(),
    ..TimelineSummary::default()
  };
  let mut attended = 0usize;
  for block in blocks {
    match block.status {
      AttendanceStatus::Present => summary.present += 1,
      AttendanceStatus::Absent => summary.absent += 1,
      AttendanceStatus::Late => summary.late += 1,
      AttendanceStatus::PermittedSkip => summary.permitted_skip += 1,
    }
    if block.is_placeholder() {
      summary.placeholders += 1;
    }
    if block.status.is_attended() {
      attended += 1;
    }
  }
  summary.attendance_rate =
    (!blocks.is_empty()).then(|| attended as f64 / blocks.len() as f64);
  summary
}
