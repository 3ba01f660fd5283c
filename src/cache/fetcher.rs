//! Network fetch abstraction for shell assets.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use url::Url;

/// One asset as it came off the network.
#[derive(Debug, Clone)]
pub struct FetchedAsset {
  pub content_type: Option<String>,
  pub body: Vec<u8>,
}

/// A boxed future resolving to a fetched asset or a network error.
pub type FetchFuture = Pin<Box<dyn Future<Output = Result<FetchedAsset, String>> + Send>>;

/// Trait for fetching assets over the network.
///
/// Errors are plain strings: the controller only cares that the network
/// attempt failed, not why.
pub trait AssetFetcher: Send + Sync {
  fn fetch(&self, url: &Url) -> FetchFuture;
}

/// reqwest-backed fetcher with a per-request timeout.
///
/// The timeout bounds network-first document requests so they fall back to
/// cache instead of hanging.
#[derive(Clone)]
pub struct HttpFetcher {
  client: reqwest::Client,
}

impl HttpFetcher {
  pub fn new(timeout: Duration) -> Result<Self, String> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| format!("build http client: {}", e))?;

    Ok(Self { client })
  }
}

impl AssetFetcher for HttpFetcher {
  fn fetch(&self, url: &Url) -> FetchFuture {
    let client = self.client.clone();
    let url = url.clone();

    Box::pin(async move {
      let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| format!("fetch {}: {}", url, e))?;

      if !response.status().is_success() {
        return Err(format!("fetch {}: status {}", url, response.status()));
      }

      let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

      let body = response
        .bytes()
        .await
        .map_err(|e| format!("read {}: {}", url, e))?
        .to_vec();

      Ok(FetchedAsset { content_type, body })
    })
  }
}
