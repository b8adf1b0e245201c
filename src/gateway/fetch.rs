//! Network seam for the gateway: GET-only fetches returning snapshots.

use color_eyre::{eyre::eyre, Result};

use super::types::ResponseSnapshot;

/// Thin reqwest wrapper. A transport failure is an `Err`; any received
/// response, whatever its status, is a snapshot — the strategies decide
/// what counts as usable.
#[derive(Clone)]
pub struct HttpClient {
  client: reqwest::Client,
}

impl HttpClient {
  pub fn new() -> Result<Self> {
    let client = reqwest::Client::builder()
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client })
  }

  /// Issue a GET and capture the full response as a snapshot.
  pub async fn get(&self, url: &str) -> Result<ResponseSnapshot> {
    let response = self
      .client
      .get(url)
      .send()
      .await
      .map_err(|e| eyre!("Failed to fetch {}: {}", url, e))?;

    let status = response.status().as_u16();
    let headers = response
      .headers()
      .iter()
      .filter_map(|(name, value)| {
        value
          .to_str()
          .ok()
          .map(|v| (name.to_string(), v.to_string()))
      })
      .collect();

    let body = response
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read body of {}: {}", url, e))?
      .to_vec();

    Ok(ResponseSnapshot {
      status,
      headers,
      body,
    })
  }
}
