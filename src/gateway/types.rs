//! Request identity, classification, and stored response snapshots.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::{Host, Url};

/// What kind of resource a request is for. Mirrors the platform's request
/// destination hint; `Other` covers anything unclassified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
  Document,
  Script,
  Style,
  Image,
  Font,
  Other,
}

/// Coarse request class driving strategy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
  /// Top-level document loads and anything that accepts HTML.
  Navigation,
  /// Code resources: freshest copy wins.
  ScriptStyle,
  /// Images, fonts, and everything else: latency wins.
  Asset,
}

/// A request as the gateway sees it: GET identity plus routing hints.
#[derive(Debug, Clone)]
pub struct AssetRequest {
  pub url: String,
  pub destination: Destination,
  pub accepts_html: bool,
}

impl AssetRequest {
  pub fn new(url: &str) -> Self {
    Self {
      url: url.to_string(),
      destination: Destination::Other,
      accepts_html: false,
    }
  }

  pub fn with_destination(mut self, destination: Destination) -> Self {
    self.destination = destination;
    self
  }

  pub fn accepting_html(mut self) -> Self {
    self.accepts_html = true;
    self
  }

  pub fn class(&self) -> RequestClass {
    match self.destination {
      Destination::Document => RequestClass::Navigation,
      Destination::Script | Destination::Style => RequestClass::ScriptStyle,
      _ if self.accepts_html => RequestClass::Navigation,
      _ => RequestClass::Asset,
    }
  }

  /// Stable cache identity for this request. The gateway only ever issues
  /// GETs, so identity is the hashed method+URL pair.
  pub fn identity(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"GET ");
    hasher.update(self.url.as_bytes());
    hex::encode(hasher.finalize())
  }
}

/// Whether the gateway serves a development or production scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
  Development,
  Production,
}

impl Environment {
  /// Classify by the scope URL's host: loopback and private ranges mean
  /// development, everything else production.
  pub fn from_scope(scope: &str) -> Self {
    let dev = Url::parse(scope)
      .ok()
      .and_then(|u| u.host().map(|h| is_dev_host(&h)));
    match dev {
      Some(true) => Environment::Development,
      _ => Environment::Production,
    }
  }
}

fn is_dev_host(host: &Host<&str>) -> bool {
  match host {
    Host::Domain(name) => *name == "localhost",
    // 127.0.0.0/8, 10.0.0.0/8, 172.16.0.0/12, 192.168.0.0/16
    Host::Ipv4(addr) => addr.is_loopback() || addr.is_private(),
    Host::Ipv6(addr) => addr.is_loopback(),
  }
}

/// A stored response: status, headers, and the full body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseSnapshot {
  pub status: u16,
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
}

impl ResponseSnapshot {
  pub fn ok(&self) -> bool {
    (200..300).contains(&self.status)
  }

  /// Synthesized response served when navigation has no fallback left.
  pub fn offline() -> Self {
    Self {
      status: 503,
      headers: vec![("content-type".to_string(), "text/plain".to_string())],
      body: b"offline".to_vec(),
    }
  }
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
  Network,
  Cache,
  /// The cached application-shell document, substituted for a navigation.
  Shell,
  /// Synthesized offline response; nothing cached matched.
  Synthesized,
}

/// A response plus its provenance.
#[derive(Debug, Clone)]
pub struct ServedResponse {
  pub snapshot: ResponseSnapshot,
  pub source: ServedFrom,
}
