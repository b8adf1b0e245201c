//! Cross-day streak of completed days.

use color_eyre::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::day;
use crate::store::{KvStore, STREAK_KEY};

/// Consecutive completed local days ending at `last_day`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakRecord {
  pub count: u32,
  #[serde(rename = "lastDay")]
  pub last_day: Option<String>,
}

/// Owner of the persisted `StreakRecord`.
///
/// The streak is only ever raised, and only once per day; a missed day is
/// detected at the next qualifying observation and collapses the count to
/// one (the qualifying day itself counts).
pub struct StreakTracker<S: KvStore> {
  store: Arc<S>,
}

impl<S: KvStore> StreakTracker<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self { store }
  }

  /// Load the stored streak; corruption degrades to the zero record.
  pub fn load(&self) -> Result<StreakRecord> {
    let record = match self.store.get(STREAK_KEY)? {
      Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
        warn!("Discarding unreadable streak record: {}", e);
        StreakRecord::default()
      }),
      None => StreakRecord::default(),
    };
    Ok(record)
  }

  /// Observe the day's completion state and credit the streak if due.
  ///
  /// Invoked after every progress mutation. Returns the record unchanged
  /// when the day is incomplete or already credited.
  pub fn observe(&self, day_complete: bool) -> Result<StreakRecord> {
    self.observe_on(&day::today(), day_complete)
  }

  fn observe_on(&self, today: &str, day_complete: bool) -> Result<StreakRecord> {
    let record = self.load()?;

    if !day_complete {
      return Ok(record);
    }
    if record.last_day.as_deref() == Some(today) {
      return Ok(record);
    }

    let yesterday = day::yesterday_of(today);
    let count = if record.last_day.is_some() && record.last_day == yesterday {
      record.count + 1
    } else {
      1
    };

    let updated = StreakRecord {
      count,
      last_day: Some(today.to_string()),
    };
    self.store.set(STREAK_KEY, &serde_json::to_string(&updated)?)?;
    debug!("Streak credited: {} day(s) ending {}", updated.count, today);
    Ok(updated)
  }
}
