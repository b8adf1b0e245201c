//! Static adhkar corpus: categories of countable items.
//!
//! The corpus is supplied by a YAML content file and is immutable at
//! runtime. The engine core only reads `id` and `target`; title, text and
//! note are presentation fields that pass through to search.

use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::normalize;

/// One countable recitation unit.
#[derive(Debug, Clone)]
pub struct Item {
  pub id: String,
  pub category_id: String,
  pub target: u32,
  pub title: Option<String>,
  pub text: String,
  pub note: Option<String>,
}

impl Item {
  /// Targets below one are treated as one repetition.
  pub fn effective_target(&self) -> u32 {
    self.target.max(1)
  }

  /// Presentation text blob searched after normalization.
  pub fn search_blob(&self) -> String {
    format!(
      "{} {} {}",
      self.title.as_deref().unwrap_or(""),
      self.text,
      self.note.as_deref().unwrap_or("")
    )
  }
}

/// A named, ordered grouping of items.
#[derive(Debug, Clone)]
pub struct Category {
  pub id: String,
  pub title: Option<String>,
  pub items: Vec<Item>,
}

/// On-disk item shape. Items without an explicit id get `{category}-{n}`.
#[derive(Debug, Clone, Deserialize)]
struct RawItem {
  id: Option<String>,
  title: Option<String>,
  text: String,
  note: Option<String>,
  #[serde(default = "default_target")]
  target: u32,
}

fn default_target() -> u32 {
  1
}

#[derive(Debug, Clone, Deserialize)]
struct RawCategory {
  id: String,
  title: Option<String>,
  items: Vec<RawItem>,
}

/// The full immutable corpus with an item index by id.
#[derive(Debug, Clone)]
pub struct Corpus {
  categories: Vec<Category>,
  item_index: HashMap<String, (usize, usize)>,
}

impl Corpus {
  /// Load the corpus from a YAML content file.
  pub fn load(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read content file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse content file {}: {}", path.display(), e))
  }

  /// Parse corpus YAML.
  pub fn parse(contents: &str) -> Result<Self> {
    let raw: Vec<RawCategory> =
      serde_yaml::from_str(contents).map_err(|e| eyre!("Failed to parse content: {}", e))?;
    Self::from_raw(raw)
  }

  fn from_raw(raw: Vec<RawCategory>) -> Result<Self> {
    let mut categories = Vec::with_capacity(raw.len());
    let mut item_index = HashMap::new();

    for (cat_pos, raw_cat) in raw.into_iter().enumerate() {
      let mut items = Vec::with_capacity(raw_cat.items.len());
      for (item_pos, raw_item) in raw_cat.items.into_iter().enumerate() {
        let id = raw_item
          .id
          .unwrap_or_else(|| format!("{}-{}", raw_cat.id, item_pos + 1));

        if item_index.insert(id.clone(), (cat_pos, item_pos)).is_some() {
          return Err(eyre!("Duplicate item id in content: {}", id));
        }

        items.push(Item {
          id,
          category_id: raw_cat.id.clone(),
          target: raw_item.target,
          title: raw_item.title,
          text: raw_item.text,
          note: raw_item.note,
        });
      }

      categories.push(Category {
        id: raw_cat.id,
        title: raw_cat.title,
        items,
      });
    }

    Ok(Self {
      categories,
      item_index,
    })
  }

  pub fn categories(&self) -> &[Category] {
    &self.categories
  }

  pub fn category(&self, category_id: &str) -> Option<&Category> {
    self.categories.iter().find(|c| c.id == category_id)
  }

  pub fn item(&self, item_id: &str) -> Option<&Item> {
    let (cat, pos) = self.item_index.get(item_id)?;
    self.categories.get(*cat)?.items.get(*pos)
  }

  /// Diacritic-insensitive substring search across all categories.
  pub fn search(&self, query: &str) -> Vec<&Item> {
    if normalize::normalize(query).is_empty() {
      return Vec::new();
    }
    self
      .categories
      .iter()
      .flat_map(|c| c.items.iter())
      .filter(|item| normalize::matches(&item.search_blob(), query))
      .collect()
  }
}
