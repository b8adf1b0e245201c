//! Engine wiring: one mutation path from user action to persisted state.
//!
//! Every increment/undo/reset runs read-compute-persist and then a streak
//! observation, so the streak can never lag behind the counters.

use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;

use crate::completion::CompletionPolicy;
use crate::content::{Corpus, Item};
use crate::progress::ProgressStore;
use crate::store::KvStore;
use crate::streak::{StreakRecord, StreakTracker};

/// Completion status of one category, for display.
#[derive(Debug, Clone)]
pub struct CategoryStatus {
  pub id: String,
  pub title: Option<String>,
  pub progress: u64,
  pub target: u64,
  pub complete: bool,
  pub required: bool,
}

/// Snapshot of the day for display.
#[derive(Debug, Clone)]
pub struct EngineStatus {
  pub categories: Vec<CategoryStatus>,
  pub day_complete: bool,
  pub streak: StreakRecord,
}

pub struct Engine<S: KvStore> {
  corpus: Corpus,
  progress: ProgressStore<S>,
  streak: StreakTracker<S>,
  policy: CompletionPolicy,
}

impl<S: KvStore> Engine<S> {
  pub fn new(corpus: Corpus, store: Arc<S>, policy: CompletionPolicy) -> Self {
    Self {
      corpus,
      progress: ProgressStore::new(store.clone()),
      streak: StreakTracker::new(store),
      policy,
    }
  }

  pub fn corpus(&self) -> &Corpus {
    &self.corpus
  }

  fn item(&self, item_id: &str) -> Result<&Item> {
    self
      .corpus
      .item(item_id)
      .ok_or_else(|| eyre!("Unknown item: {}", item_id))
  }

  /// Count one repetition, clamped to the item's target.
  pub fn increment(&self, item_id: &str) -> Result<u32> {
    let target = self.item(item_id)?.effective_target();
    let next = self.progress.get_count(item_id)?.saturating_add(1).min(target);
    self.progress.set_count(item_id, next as i64)?;
    self.observe()?;
    Ok(next)
  }

  /// Take back one repetition, clamped at zero.
  pub fn undo(&self, item_id: &str) -> Result<u32> {
    self.item(item_id)?;
    let next = self.progress.get_count(item_id)?.saturating_sub(1);
    self.progress.set_count(item_id, next as i64)?;
    self.observe()?;
    Ok(next)
  }

  /// Reset an item's count to zero.
  pub fn reset(&self, item_id: &str) -> Result<u32> {
    self.item(item_id)?;
    self.progress.set_count(item_id, 0)?;
    self.observe()?;
    Ok(0)
  }

  pub fn count(&self, item_id: &str) -> Result<u32> {
    Ok(
      self
        .progress
        .get_count(item_id)?
        .min(self.item(item_id)?.effective_target()),
    )
  }

  pub fn day_complete(&self) -> Result<bool> {
    let record = self.progress.load()?;
    Ok(self.policy.day_complete(&self.corpus, &record))
  }

  fn observe(&self) -> Result<StreakRecord> {
    let complete = self.day_complete()?;
    self.streak.observe(complete)
  }

  /// Reload the day's record, healing a stale date if midnight passed.
  ///
  /// Idempotent with the load-time rollover: whichever runs first wins and
  /// the other observes an already-current record.
  pub fn rollover_check(&self) -> Result<()> {
    self.progress.load().map(|_| ())
  }

  pub fn search(&self, query: &str) -> Vec<&Item> {
    self.corpus.search(query)
  }

  /// Per-category completion plus the current streak.
  pub fn status(&self) -> Result<EngineStatus> {
    let record = self.progress.load()?;
    let categories = self
      .corpus
      .categories()
      .iter()
      .map(|category| {
        let (progress, target) = CompletionPolicy::category_totals(category, &record.counts);
        CategoryStatus {
          id: category.id.clone(),
          title: category.title.clone(),
          progress,
          target,
          complete: self.policy.category_complete(category, &record.counts),
          required: self.policy.required_categories.contains(&category.id),
        }
      })
      .collect();

    Ok(EngineStatus {
      categories,
      day_complete: self.policy.day_complete(&self.corpus, &record),
      streak: self.streak.load()?,
    })
  }
}

/// Default category by local hour: 04:00-11:59 morning, otherwise evening.
pub fn default_category_for_hour(hour: u32) -> &'static str {
  if (4..12).contains(&hour) {
    "morning"
  } else {
    "evening"
  }
}
