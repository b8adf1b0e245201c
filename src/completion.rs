//! Category completion ratios over the day's progress.

use std::collections::HashMap;

use crate::content::{Category, Corpus};
use crate::progress::ProgressRecord;

/// Fraction of a category's summed targets that must be reached.
pub const COMPLETION_THRESHOLD: f64 = 0.70;

/// Categories that must each be complete for the day to count.
pub const REQUIRED_CATEGORIES: &[&str] = &["morning", "evening", "after-prayer"];

/// Tunable completion policy; defaults match the shipped constants.
#[derive(Debug, Clone)]
pub struct CompletionPolicy {
  pub threshold: f64,
  pub required_categories: Vec<String>,
}

impl Default for CompletionPolicy {
  fn default() -> Self {
    Self {
      threshold: COMPLETION_THRESHOLD,
      required_categories: REQUIRED_CATEGORIES.iter().map(|s| s.to_string()).collect(),
    }
  }
}

impl CompletionPolicy {
  /// Summed clamped progress and summed effective targets for a category.
  pub fn category_totals(category: &Category, counts: &HashMap<String, u32>) -> (u64, u64) {
    let mut progress_sum = 0u64;
    let mut target_sum = 0u64;
    for item in &category.items {
      let target = item.effective_target();
      let count = counts.get(&item.id).copied().unwrap_or(0).min(target);
      target_sum += target as u64;
      progress_sum += count as u64;
    }
    (progress_sum, target_sum)
  }

  /// Whether the category's completion ratio meets the threshold.
  ///
  /// A category with no items is never complete.
  pub fn category_complete(&self, category: &Category, counts: &HashMap<String, u32>) -> bool {
    let (progress_sum, target_sum) = Self::category_totals(category, counts);
    if target_sum == 0 {
      return false;
    }
    progress_sum as f64 / target_sum as f64 >= self.threshold
  }

  /// Whether every required category is complete.
  ///
  /// A required category missing from the corpus counts as incomplete.
  pub fn day_complete(&self, corpus: &Corpus, record: &ProgressRecord) -> bool {
    self.required_categories.iter().all(|id| {
      corpus
        .category(id)
        .map(|c| self.category_complete(c, &record.counts))
        .unwrap_or(false)
    })
  }
}
