//! Date-scoped repetition counters with self-healing daily rollover.

use color_eyre::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use crate::day;
use crate::store::{KvStore, PROGRESS_KEY};

/// The day's counters, keyed by item id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
  pub date: String,
  #[serde(default)]
  pub counts: HashMap<String, u32>,
}

impl ProgressRecord {
  fn empty_for(date: &str) -> Self {
    Self {
      date: date.to_string(),
      counts: HashMap::new(),
    }
  }
}

/// Owner of the persisted `ProgressRecord`.
///
/// Every read goes through [`ProgressStore::load`], which corrects a stale
/// or unreadable record to a fresh one dated today and persists it
/// immediately, so the daily reset needs no dedicated trigger: the timer
/// and the next load both converge on the same state.
pub struct ProgressStore<S: KvStore> {
  store: Arc<S>,
}

impl<S: KvStore> ProgressStore<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self { store }
  }

  /// Load today's record, healing absence, corruption, or date rollover.
  pub fn load(&self) -> Result<ProgressRecord> {
    self.load_for(&day::today())
  }

  fn load_for(&self, today: &str) -> Result<ProgressRecord> {
    let record = match self.store.get(PROGRESS_KEY)? {
      Some(raw) => match serde_json::from_str::<ProgressRecord>(&raw) {
        Ok(record) if record.date == today => return Ok(record),
        Ok(_) => ProgressRecord::empty_for(today),
        Err(e) => {
          warn!("Discarding unreadable progress record, resetting for today: {}", e);
          ProgressRecord::empty_for(today)
        }
      },
      None => ProgressRecord::empty_for(today),
    };

    self.persist(&record)?;
    Ok(record)
  }

  /// Stored count for an item, or zero.
  pub fn get_count(&self, item_id: &str) -> Result<u32> {
    let record = self.load()?;
    Ok(record.counts.get(item_id).copied().unwrap_or(0))
  }

  /// Set an item's count, clamped to the `u32` range, and flush before
  /// returning.
  ///
  /// The upper clamp to the item's target belongs to the caller, which
  /// knows the corpus; this layer only guarantees a representable count.
  pub fn set_count(&self, item_id: &str, value: i64) -> Result<()> {
    let mut record = self.load()?;
    let clamped = value.clamp(0, u32::MAX as i64) as u32;
    record.counts.insert(item_id.to_string(), clamped);
    self.persist(&record)
  }

  fn persist(&self, record: &ProgressRecord) -> Result<()> {
    let raw = serde_json::to_string(record)?;
    self.store.set(PROGRESS_KEY, &raw)
  }
}
