//! Lifecycle state machine for the asset cache worker.
//!
//! The worker runs apart from the engine and shares nothing with it;
//! coordination happens only through the persistent asset store. Handlers
//! mirror the platform lifecycle: install (precache), activate (purge
//! stale versions), fetch (strategy dispatch per request).

use color_eyre::{eyre::eyre, Result};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

use super::store::AssetStore;
use super::types::{
  AssetRequest, Environment, RequestClass, ResponseSnapshot, ServedFrom, ServedResponse,
};

/// Where the worker is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
  Installing,
  Active,
  Superseded,
}

/// Static configuration of one worker generation.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
  /// Container name; changing it retires every previous generation.
  pub version: String,
  /// Shell document URL, the navigation fallback of last resort.
  pub shell_url: String,
  /// Application-shell resources precached at install.
  pub precache: Vec<String>,
}

/// Navigation fallback behavior after network and exact-match both miss.
enum ShellFallback {
  /// Propagate the failure.
  None,
  /// Serve the cached shell if present, else propagate.
  Cached,
  /// Serve the cached shell, else a synthesized offline response.
  CachedOrOffline,
}

pub struct CacheWorker<S: AssetStore> {
  store: Arc<S>,
  env: Environment,
  settings: WorkerSettings,
  state: WorkerState,
}

impl<S: AssetStore> CacheWorker<S> {
  /// A freshly registered worker, not yet installed.
  pub fn new(store: Arc<S>, env: Environment, settings: WorkerSettings) -> Self {
    Self {
      store,
      env,
      settings,
      state: WorkerState::Installing,
    }
  }

  /// A worker resuming control of an already-installed version.
  pub fn resume(store: Arc<S>, env: Environment, settings: WorkerSettings) -> Self {
    Self {
      store,
      env,
      settings,
      state: WorkerState::Active,
    }
  }

  pub fn state(&self) -> WorkerState {
    self.state
  }

  pub fn version(&self) -> &str {
    &self.settings.version
  }

  /// Install step: precache the shell manifest.
  ///
  /// Development skips precaching entirely. In production any failed or
  /// non-2xx manifest fetch fails the whole install, so a broken shell is
  /// never activated and the previous version stays in place.
  pub async fn install<F, Fut>(&mut self, fetch: F) -> Result<()>
  where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<ResponseSnapshot>>,
  {
    if self.state() != WorkerState::Installing {
      return Err(eyre!("Install is only valid before activation"));
    }

    if self.env == Environment::Development {
      debug!("Development scope: skipping precache");
      return Ok(());
    }

    for url in &self.settings.precache {
      let snapshot = fetch(url.clone())
        .await
        .map_err(|e| eyre!("Precache fetch failed for {}: {}", url, e))?;
      if !snapshot.ok() {
        return Err(eyre!(
          "Precache fetch for {} returned status {}",
          url,
          snapshot.status
        ));
      }
      let request = AssetRequest::new(url);
      self
        .store
        .put(&self.settings.version, &request.identity(), url, &snapshot)?;
    }

    info!(
      "Precached {} shell resource(s) into {}",
      self.settings.precache.len(),
      self.settings.version
    );
    Ok(())
  }

  /// Activation: purge stale containers and take over.
  ///
  /// Development deletes every container; production keeps exactly the
  /// current version and garbage-collects the rest.
  pub fn activate(&mut self) -> Result<()> {
    for version in self.store.versions()? {
      let stale = match self.env {
        Environment::Development => true,
        Environment::Production => version != self.settings.version,
      };
      if stale {
        debug!("Deleting stale cache container {}", version);
        self.store.delete_version(&version)?;
      }
    }

    self.state = WorkerState::Active;
    Ok(())
  }

  /// A newer generation has activated; this worker stops serving.
  #[allow(dead_code)]
  pub fn supersede(&mut self) {
    self.state = WorkerState::Superseded;
  }

  /// Fetch interception: pick a strategy from environment and request
  /// class, run its fallback chain once, and report the outcome.
  pub async fn handle_fetch<F, Fut>(&self, request: &AssetRequest, fetch: F) -> Result<ServedResponse>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<ResponseSnapshot>>,
  {
    if self.state() != WorkerState::Active {
      return Err(eyre!("Fetch before activation"));
    }

    match (self.env, request.class()) {
      // Development always prefers live code; nothing is stored.
      (Environment::Development, class) => {
        let shell = if class == RequestClass::Navigation {
          ShellFallback::Cached
        } else {
          ShellFallback::None
        };
        self.network_first(request, fetch, false, shell).await
      }
      (Environment::Production, RequestClass::Navigation) => {
        self
          .network_first(request, fetch, true, ShellFallback::CachedOrOffline)
          .await
      }
      (Environment::Production, RequestClass::ScriptStyle) => {
        self.network_first(request, fetch, true, ShellFallback::None).await
      }
      (Environment::Production, RequestClass::Asset) => self.cache_first(request, fetch).await,
    }
  }

  /// Network first; on failure fall back to the exact cached match, then
  /// per `shell` policy.
  async fn network_first<F, Fut>(
    &self,
    request: &AssetRequest,
    fetch: F,
    store_success: bool,
    shell: ShellFallback,
  ) -> Result<ServedResponse>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<ResponseSnapshot>>,
  {
    match fetch().await {
      Ok(snapshot) => {
        if store_success && snapshot.ok() {
          // Concurrent requests for the same identity may both store;
          // last writer wins. Entries are idempotent GET re-fetches, so
          // no coordination is needed. Revisit if non-GET traffic ever
          // reaches the gateway.
          self.store_clone(request, &snapshot)?;
        }
        Ok(ServedResponse {
          snapshot,
          source: ServedFrom::Network,
        })
      }
      Err(err) => {
        debug!("Network failed for {}, trying cache: {}", request.url, err);
        if let Some(cached) = self.lookup(&request.identity())? {
          return Ok(ServedResponse {
            snapshot: cached,
            source: ServedFrom::Cache,
          });
        }
        match shell {
          ShellFallback::None => Err(err),
          ShellFallback::Cached => match self.lookup_shell()? {
            Some(snapshot) => Ok(ServedResponse {
              snapshot,
              source: ServedFrom::Shell,
            }),
            None => Err(err),
          },
          ShellFallback::CachedOrOffline => match self.lookup_shell()? {
            Some(snapshot) => Ok(ServedResponse {
              snapshot,
              source: ServedFrom::Shell,
            }),
            None => Ok(ServedResponse {
              snapshot: ResponseSnapshot::offline(),
              source: ServedFrom::Synthesized,
            }),
          },
        }
      }
    }
  }

  /// Cached copy if present; otherwise fetch, store the clone, and serve.
  /// A miss plus network failure propagates with nothing stored.
  async fn cache_first<F, Fut>(&self, request: &AssetRequest, fetch: F) -> Result<ServedResponse>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<ResponseSnapshot>>,
  {
    if let Some(cached) = self.lookup(&request.identity())? {
      return Ok(ServedResponse {
        snapshot: cached,
        source: ServedFrom::Cache,
      });
    }

    let snapshot = fetch().await?;
    if snapshot.ok() {
      self.store_clone(request, &snapshot)?;
    }
    Ok(ServedResponse {
      snapshot,
      source: ServedFrom::Network,
    })
  }

  fn store_clone(&self, request: &AssetRequest, snapshot: &ResponseSnapshot) -> Result<()> {
    self.store.put(
      &self.settings.version,
      &request.identity(),
      &request.url,
      snapshot,
    )
  }

  fn lookup(&self, identity: &str) -> Result<Option<ResponseSnapshot>> {
    self.store.get(&self.settings.version, identity)
  }

  fn lookup_shell(&self) -> Result<Option<ResponseSnapshot>> {
    let shell = AssetRequest::new(&self.settings.shell_url);
    self.lookup(&shell.identity())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::gateway::store::MemoryAssetStore;
  use crate::gateway::types::Destination;

  const VERSION: &str = "adhkar-cache-v3";
  const SHELL: &str = "https://example.com/index.html";

  fn settings() -> WorkerSettings {
    WorkerSettings {
      version: VERSION.to_string(),
      shell_url: SHELL.to_string(),
      precache: vec![
        SHELL.to_string(),
        "https://example.com/assets/styles.css".to_string(),
      ],
    }
  }

  fn snapshot(status: u16, body: &[u8]) -> ResponseSnapshot {
    ResponseSnapshot {
      status,
      headers: Vec::new(),
      body: body.to_vec(),
    }
  }

  fn active_worker(env: Environment) -> (Arc<MemoryAssetStore>, CacheWorker<MemoryAssetStore>) {
    let store = Arc::new(MemoryAssetStore::default());
    let worker = CacheWorker::resume(store.clone(), env, settings());
    (store, worker)
  }

  fn failing() -> Result<ResponseSnapshot> {
    Err(eyre!("connection refused"))
  }

  #[tokio::test]
  async fn test_install_precaches_in_production() {
    let store = Arc::new(MemoryAssetStore::default());
    let mut worker = CacheWorker::new(store.clone(), Environment::Production, settings());

    worker
      .install(|url| async move { Ok(snapshot(200, url.as_bytes())) })
      .await
      .unwrap();
    worker.activate().unwrap();

    assert_eq!(worker.state(), WorkerState::Active);
    let shell_key = AssetRequest::new(SHELL).identity();
    assert!(store.get(VERSION, &shell_key).unwrap().is_some());
  }

  #[tokio::test]
  async fn test_install_failure_is_fatal_and_leaves_store_alone() {
    let store = Arc::new(MemoryAssetStore::default());
    // A previous generation is still present.
    store.put("v2", "old", "u", &snapshot(200, b"old")).unwrap();

    let mut worker = CacheWorker::new(store.clone(), Environment::Production, settings());
    let result = worker
      .install(|url| async move {
        if url.ends_with(".css") {
          failing()
        } else {
          Ok(snapshot(200, b"ok"))
        }
      })
      .await;

    assert!(result.is_err());
    assert_eq!(worker.state(), WorkerState::Installing);
    // The old generation was not touched.
    assert!(store.get("v2", "old").unwrap().is_some());
  }

  #[tokio::test]
  async fn test_install_rejects_non_ok_precache_response() {
    let store = Arc::new(MemoryAssetStore::default());
    let mut worker = CacheWorker::new(store, Environment::Production, settings());
    let result = worker
      .install(|_| async { Ok(snapshot(404, b"missing")) })
      .await;
    assert!(result.is_err());
  }

  #[tokio::test]
  async fn test_install_skipped_in_development() {
    let store = Arc::new(MemoryAssetStore::default());
    let mut worker = CacheWorker::new(store.clone(), Environment::Development, settings());
    worker
      .install(|_| async { failing() })
      .await
      .unwrap();
    assert!(store.versions().unwrap().is_empty());
  }

  #[test]
  fn test_activation_keeps_only_current_version_in_production() {
    let store = Arc::new(MemoryAssetStore::default());
    store.put("adhkar-cache-v2", "k", "u", &snapshot(200, b"x")).unwrap();
    store.put(VERSION, "k", "u", &snapshot(200, b"y")).unwrap();

    let mut worker = CacheWorker::new(store.clone(), Environment::Production, settings());
    worker.activate().unwrap();

    assert_eq!(store.versions().unwrap(), vec![VERSION]);
  }

  #[test]
  fn test_activation_clears_everything_in_development() {
    let store = Arc::new(MemoryAssetStore::default());
    store.put("adhkar-cache-v2", "k", "u", &snapshot(200, b"x")).unwrap();
    store.put(VERSION, "k", "u", &snapshot(200, b"y")).unwrap();

    let mut worker = CacheWorker::new(store.clone(), Environment::Development, settings());
    worker.activate().unwrap();

    assert!(store.versions().unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_fetch_before_activation_is_rejected() {
    let store = Arc::new(MemoryAssetStore::default());
    let worker = CacheWorker::new(store, Environment::Production, settings());
    let request = AssetRequest::new("https://example.com/x.png");
    let result = worker
      .handle_fetch(&request, || async { Ok(snapshot(200, b"png")) })
      .await;
    assert!(result.is_err());
  }

  #[tokio::test]
  async fn test_production_image_miss_fetches_and_stores() {
    let (store, worker) = active_worker(Environment::Production);
    let request =
      AssetRequest::new("https://example.com/logo.png").with_destination(Destination::Image);

    let served = worker
      .handle_fetch(&request, || async { Ok(snapshot(200, b"png-bytes")) })
      .await
      .unwrap();

    assert_eq!(served.source, ServedFrom::Network);
    let cached = store.get(VERSION, &request.identity()).unwrap().unwrap();
    assert_eq!(cached.body, b"png-bytes");
  }

  #[tokio::test]
  async fn test_production_image_hit_skips_network() {
    let (store, worker) = active_worker(Environment::Production);
    let request =
      AssetRequest::new("https://example.com/logo.png").with_destination(Destination::Image);
    store
      .put(VERSION, &request.identity(), &request.url, &snapshot(200, b"cached"))
      .unwrap();

    let served = worker
      .handle_fetch(&request, || async {
        panic!("cache-first must not hit the network on a hit")
      })
      .await
      .unwrap();

    assert_eq!(served.source, ServedFrom::Cache);
    assert_eq!(served.snapshot.body, b"cached");
  }

  #[tokio::test]
  async fn test_production_image_miss_and_network_failure_propagates() {
    let (store, worker) = active_worker(Environment::Production);
    let request =
      AssetRequest::new("https://example.com/logo.png").with_destination(Destination::Image);

    let result = worker.handle_fetch(&request, || async { failing() }).await;

    assert!(result.is_err());
    assert!(store.get(VERSION, &request.identity()).unwrap().is_none());
  }

  #[tokio::test]
  async fn test_production_script_prefers_network_and_stores() {
    let (store, worker) = active_worker(Environment::Production);
    let request =
      AssetRequest::new("https://example.com/app.js").with_destination(Destination::Script);
    store
      .put(VERSION, &request.identity(), &request.url, &snapshot(200, b"stale"))
      .unwrap();

    let served = worker
      .handle_fetch(&request, || async { Ok(snapshot(200, b"fresh")) })
      .await
      .unwrap();

    assert_eq!(served.source, ServedFrom::Network);
    assert_eq!(served.snapshot.body, b"fresh");
    let cached = store.get(VERSION, &request.identity()).unwrap().unwrap();
    assert_eq!(cached.body, b"fresh");
  }

  #[tokio::test]
  async fn test_production_script_falls_back_to_cache_without_shell() {
    let (store, worker) = active_worker(Environment::Production);
    let request =
      AssetRequest::new("https://example.com/app.js").with_destination(Destination::Script);
    store
      .put(VERSION, &request.identity(), &request.url, &snapshot(200, b"cached-js"))
      .unwrap();
    // Shell is cached too, but scripts never get shell substitution.
    let shell = AssetRequest::new(SHELL);
    store
      .put(VERSION, &shell.identity(), SHELL, &snapshot(200, b"<html>"))
      .unwrap();

    let served = worker.handle_fetch(&request, || async { failing() }).await.unwrap();
    assert_eq!(served.source, ServedFrom::Cache);
    assert_eq!(served.snapshot.body, b"cached-js");
  }

  #[tokio::test]
  async fn test_production_script_miss_propagates_failure() {
    let (_, worker) = active_worker(Environment::Production);
    let request =
      AssetRequest::new("https://example.com/app.js").with_destination(Destination::Script);
    let result = worker.handle_fetch(&request, || async { failing() }).await;
    assert!(result.is_err());
  }

  #[tokio::test]
  async fn test_production_navigation_falls_back_to_shell() {
    let (store, worker) = active_worker(Environment::Production);
    let shell = AssetRequest::new(SHELL);
    store
      .put(VERSION, &shell.identity(), SHELL, &snapshot(200, b"<html>shell"))
      .unwrap();

    let request =
      AssetRequest::new("https://example.com/some/page").with_destination(Destination::Document);
    let served = worker.handle_fetch(&request, || async { failing() }).await.unwrap();

    assert_eq!(served.source, ServedFrom::Shell);
    assert_eq!(served.snapshot.body, b"<html>shell");
  }

  #[tokio::test]
  async fn test_production_navigation_synthesizes_offline_without_shell() {
    let (_, worker) = active_worker(Environment::Production);
    let request =
      AssetRequest::new("https://example.com/some/page").with_destination(Destination::Document);

    let served = worker.handle_fetch(&request, || async { failing() }).await.unwrap();

    assert_eq!(served.source, ServedFrom::Synthesized);
    assert_eq!(served.snapshot.status, 503);
  }

  #[tokio::test]
  async fn test_production_html_accepting_request_is_navigation() {
    let (_, worker) = active_worker(Environment::Production);
    let request = AssetRequest::new("https://example.com/page").accepting_html();

    let served = worker.handle_fetch(&request, || async { failing() }).await.unwrap();
    assert_eq!(served.source, ServedFrom::Synthesized);
  }

  #[tokio::test]
  async fn test_development_never_stores() {
    let (store, worker) = active_worker(Environment::Development);
    let request =
      AssetRequest::new("https://example.com/logo.png").with_destination(Destination::Image);

    let served = worker
      .handle_fetch(&request, || async { Ok(snapshot(200, b"png")) })
      .await
      .unwrap();

    assert_eq!(served.source, ServedFrom::Network);
    assert!(store.get(VERSION, &request.identity()).unwrap().is_none());
  }

  #[tokio::test]
  async fn test_development_navigation_falls_back_to_shell_then_error() {
    let (store, worker) = active_worker(Environment::Development);
    let request =
      AssetRequest::new("https://example.com/page").with_destination(Destination::Document);

    // No cache at all: failure propagates.
    assert!(worker.handle_fetch(&request, || async { failing() }).await.is_err());

    // With a cached shell the navigation is served from it.
    let shell = AssetRequest::new(SHELL);
    store
      .put(VERSION, &shell.identity(), SHELL, &snapshot(200, b"<html>"))
      .unwrap();
    let served = worker.handle_fetch(&request, || async { failing() }).await.unwrap();
    assert_eq!(served.source, ServedFrom::Shell);
  }

  #[tokio::test]
  async fn test_development_non_navigation_failure_propagates() {
    let (store, worker) = active_worker(Environment::Development);
    let shell = AssetRequest::new(SHELL);
    store
      .put(VERSION, &shell.identity(), SHELL, &snapshot(200, b"<html>"))
      .unwrap();

    let request =
      AssetRequest::new("https://example.com/x.css").with_destination(Destination::Style);
    assert!(worker.handle_fetch(&request, || async { failing() }).await.is_err());
  }

  #[test]
  fn test_supersede() {
    let (_, mut worker) = active_worker(Environment::Production);
    worker.supersede();
    assert_eq!(worker.state(), WorkerState::Superseded);
  }

  #[tokio::test]
  async fn test_install_after_activation_rejected() {
    let (_, mut worker) = active_worker(Environment::Production);
    let result = worker.install(|_| async { Ok(snapshot(200, b"x")) }).await;
    assert!(result.is_err());
  }
}
