use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

use crate::completion::{CompletionPolicy, COMPLETION_THRESHOLD, REQUIRED_CATEGORIES};
use crate::gateway::{Environment, WorkerSettings};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  /// Path to the corpus content file (default: adhkar-data.yaml, searched
  /// like the config file itself)
  pub data_path: Option<PathBuf>,
  /// State database path (default: platform data directory)
  pub state_db: Option<PathBuf>,
  /// Asset cache database path (default: platform data directory)
  pub cache_db: Option<PathBuf>,
  #[serde(default)]
  pub completion: CompletionConfig,
  #[serde(default)]
  pub cache: CacheConfig,
}

/// Completion policy knobs; defaults match the shipped constants.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
  pub threshold: f64,
  pub required_categories: Vec<String>,
}

impl Default for CompletionConfig {
  fn default() -> Self {
    Self {
      threshold: COMPLETION_THRESHOLD,
      required_categories: REQUIRED_CATEGORIES.iter().map(|s| s.to_string()).collect(),
    }
  }
}

impl CompletionConfig {
  pub fn policy(&self) -> CompletionPolicy {
    CompletionPolicy {
      threshold: self.threshold,
      required_categories: self.required_categories.clone(),
    }
  }
}

/// Asset cache gateway settings. Relative shell/precache entries are
/// resolved against the scope URL.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Container name; bump it to retire every previous cache generation.
  pub version: String,
  /// Scope the gateway serves; its hostname selects the environment.
  pub scope: String,
  /// Shell document, the navigation fallback of last resort.
  pub shell: String,
  /// Application-shell resources precached at install.
  pub precache: Vec<String>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      version: "adhkar-cache-v2".to_string(),
      scope: "http://localhost:8000/".to_string(),
      shell: "index.html".to_string(),
      precache: vec![
        "./".to_string(),
        "index.html".to_string(),
        "assets/styles.css".to_string(),
        "assets/app.js".to_string(),
        "assets/data.js".to_string(),
      ],
    }
  }
}

impl CacheConfig {
  pub fn environment(&self) -> Environment {
    Environment::from_scope(&self.scope)
  }

  pub fn worker_settings(&self) -> Result<WorkerSettings> {
    let scope = Url::parse(&self.scope)
      .map_err(|e| eyre!("Invalid cache scope {}: {}", self.scope, e))?;

    let resolve = |entry: &str| -> Result<String> {
      scope
        .join(entry)
        .map(|u| u.to_string())
        .map_err(|e| eyre!("Invalid cache entry {}: {}", entry, e))
    };

    Ok(WorkerSettings {
      version: self.version.clone(),
      shell_url: resolve(&self.shell)?,
      precache: self
        .precache
        .iter()
        .map(|entry| resolve(entry))
        .collect::<Result<Vec<_>>>()?,
    })
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./adhkar.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/adhkar/config.yaml
  ///
  /// Every setting has a default, so a missing config file yields the
  /// default configuration rather than an error.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("adhkar.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("adhkar").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// Resolve the corpus content file, searching like the config file.
  pub fn data_path(&self) -> Result<PathBuf> {
    if let Some(p) = &self.data_path {
      return Ok(p.clone());
    }

    let local = PathBuf::from("adhkar-data.yaml");
    if local.exists() {
      return Ok(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("adhkar").join("data.yaml");
      if xdg_path.exists() {
        return Ok(xdg_path);
      }
    }

    Err(eyre!(
      "No content file found. Create adhkar-data.yaml in the current directory\n\
       or data.yaml under the adhkar config directory."
    ))
  }
}
