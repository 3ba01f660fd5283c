//! Shell cache controller: generation lifecycle plus per-request policy.
//!
//! An explicit state machine replaces the usual implicit install/activate
//! event handlers: `Installing -> Activating -> Active`. Install populates
//! a fresh generation all-or-nothing; activate sweeps every other
//! generation and cuts over immediately; active arbitrates each request
//! between network and cache by request class.

use futures::future::join_all;
use tracing::{debug, info, warn};
use url::Url;

use super::fetcher::{AssetFetcher, FetchedAsset};
use super::storage::{AssetStorage, CachedAsset};
use crate::error::CacheError;

/// Lifecycle phase of the target generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePhase {
  /// Manifest not yet populated (or population failed).
  Installing,
  /// Manifest populated, stale generations being swept.
  Activating,
  /// Serving requests against the current generation.
  Active,
}

/// Policy class of a same-origin request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
  /// Document, stylesheet or script: network-first.
  Shell,
  /// Everything else: cache-first.
  Asset,
}

/// Classify a request path by what the response is expected to be.
///
/// Navigations (no file extension or trailing slash) count as documents.
pub fn classify(path: &str) -> RequestClass {
  let clean = path.split(['?', '#']).next().unwrap_or(path);
  if clean.ends_with('/') {
    return RequestClass::Shell;
  }

  let last = clean.rsplit('/').next().unwrap_or(clean);
  match last.rsplit_once('.').map(|(_, ext)| ext) {
    None => RequestClass::Shell,
    Some("html") | Some("htm") | Some("css") | Some("js") | Some("mjs") => RequestClass::Shell,
    Some(_) => RequestClass::Asset,
  }
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeSource {
  Network,
  Cache,
}

/// A response served through the cache policy.
#[derive(Debug, Clone)]
pub struct ServedAsset {
  pub content_type: Option<String>,
  pub body: Vec<u8>,
  pub source: ServeSource,
}

impl ServedAsset {
  fn network(fetched: FetchedAsset) -> Self {
    Self {
      content_type: fetched.content_type,
      body: fetched.body,
      source: ServeSource::Network,
    }
  }

  fn cached(asset: CachedAsset) -> Self {
    Self {
      content_type: asset.content_type,
      body: asset.body,
      source: ServeSource::Cache,
    }
  }
}

/// Versioned cache-and-network arbiter for the application shell.
pub struct ShellCache<S: AssetStorage, F: AssetFetcher> {
  storage: S,
  fetcher: F,
  /// Origin the cache intercepts; other origins pass through.
  origin: Url,
  /// Target generation tag for this deployment.
  generation: String,
  /// Fixed asset list populated on install.
  manifest: Vec<String>,
  /// Generation requests resolve against. Stays on the previous tag when
  /// an install fails, and is `None` when nothing was ever installed.
  active: Option<String>,
  phase: CachePhase,
}

impl<S: AssetStorage, F: AssetFetcher> ShellCache<S, F> {
  pub fn new(
    storage: S,
    fetcher: F,
    origin: Url,
    generation: impl Into<String>,
    manifest: Vec<String>,
  ) -> Result<Self, CacheError> {
    let generation = generation.into();

    // A previous run leaves at most one generation behind; resolve
    // requests against it until a new install completes.
    let existing = storage.list_generations()?;
    let active = if existing.iter().any(|g| g == &generation) {
      Some(generation.clone())
    } else {
      existing.first().cloned()
    };

    let phase = if active.as_deref() == Some(generation.as_str()) {
      CachePhase::Active
    } else {
      CachePhase::Installing
    };

    Ok(Self {
      storage,
      fetcher,
      origin,
      generation,
      manifest,
      active,
      phase,
    })
  }

  #[allow(dead_code)]
  pub fn phase(&self) -> CachePhase {
    self.phase
  }

  pub fn active_generation(&self) -> Option<&str> {
    self.active.as_deref()
  }

  /// Populate the target generation from the manifest, then activate it.
  ///
  /// All-or-nothing: if any asset fails to fetch, nothing is written, the
  /// previously active generation keeps serving, and `InstallFailed` is
  /// returned.
  pub async fn install(&mut self) -> Result<(), CacheError> {
    self.phase = CachePhase::Installing;
    info!(generation = %self.generation, assets = self.manifest.len(), "installing shell generation");

    // Borrow the fetcher once so the per-path futures capture a shared
    // reference instead of pulling `self` into the `async move` blocks.
    let fetcher = &self.fetcher;
    let origin = &self.origin;
    let fetches = self.manifest.iter().map(|path| {
      let url = join_asset(origin, path);
      let path = path.clone();
      async move {
        match url {
          Ok(url) => fetcher.fetch(&url).await.map(|fetched| CachedAsset {
            path,
            content_type: fetched.content_type,
            body: fetched.body,
          }),
          Err(e) => Err(e),
        }
      }
    });

    let mut assets = Vec::with_capacity(self.manifest.len());
    for result in join_all(fetches).await {
      match result {
        Ok(asset) => assets.push(asset),
        Err(e) => {
          warn!(generation = %self.generation, error = %e, "shell install aborted");
          return Err(CacheError::InstallFailed(e));
        }
      }
    }

    self.storage.put_generation(&self.generation, &assets)?;
    self.activate()
  }

  /// Sweep every generation other than the target, then cut over.
  fn activate(&mut self) -> Result<(), CacheError> {
    self.phase = CachePhase::Activating;

    for stale in self.storage.list_generations()? {
      if stale != self.generation {
        info!(generation = %stale, "deleting stale shell generation");
        self.storage.delete_generation(&stale)?;
      }
    }

    self.active = Some(self.generation.clone());
    self.phase = CachePhase::Active;
    info!(generation = %self.generation, "shell generation active");
    Ok(())
  }

  /// Serve one request through the cache policy.
  ///
  /// Cross-origin requests pass through untouched. Same-origin requests
  /// are network-first (shell class) or cache-first (asset class) against
  /// the active generation; with no active generation everything degrades
  /// to plain network.
  pub async fn handle(&self, url: &Url) -> Result<ServedAsset, CacheError> {
    if url.origin() != self.origin.origin() {
      debug!(url = %url, "cross-origin request, passing through");
      return self.network_only(url).await;
    }

    let path = url.path().to_string();
    let generation = match &self.active {
      Some(g) => g.clone(),
      None => {
        debug!(path = %path, "no active generation, serving network only");
        return self.network_only(url).await;
      }
    };

    match classify(&path) {
      RequestClass::Shell => self.network_first(url, &path, &generation).await,
      RequestClass::Asset => self.cache_first(url, &path, &generation).await,
    }
  }

  async fn network_first(
    &self,
    url: &Url,
    path: &str,
    generation: &str,
  ) -> Result<ServedAsset, CacheError> {
    match self.fetcher.fetch(url).await {
      Ok(fetched) => {
        // Keep the cached copy current for the next offline load.
        self.storage.put(
          generation,
          &CachedAsset {
            path: path.to_string(),
            content_type: fetched.content_type.clone(),
            body: fetched.body.clone(),
          },
        )?;
        debug!(path = %path, "network-first: served fresh copy");
        Ok(ServedAsset::network(fetched))
      }
      Err(e) => match self.storage.get(generation, path)? {
        Some(cached) => {
          warn!(path = %path, error = %e, "network-first: falling back to cache");
          Ok(ServedAsset::cached(cached))
        }
        None => Err(CacheError::Unreachable(e)),
      },
    }
  }

  async fn cache_first(
    &self,
    url: &Url,
    path: &str,
    generation: &str,
  ) -> Result<ServedAsset, CacheError> {
    if let Some(cached) = self.storage.get(generation, path)? {
      debug!(path = %path, "cache-first: hit");
      return Ok(ServedAsset::cached(cached));
    }

    // Miss: read through to the network without writing back. These are
    // typically immutable, versioned assets.
    debug!(path = %path, "cache-first: miss, fetching");
    self.network_only(url).await
  }

  async fn network_only(&self, url: &Url) -> Result<ServedAsset, CacheError> {
    self
      .fetcher
      .fetch(url)
      .await
      .map(ServedAsset::network)
      .map_err(CacheError::Unreachable)
  }

}

fn join_asset(origin: &Url, path: &str) -> Result<Url, String> {
  origin
    .join(path)
    .map_err(|e| format!("bad manifest path {}: {}", path, e))
}
