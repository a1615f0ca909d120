//! Offline cache for static assets.
//!
//! API traffic is never cached. Assets from our own origin are fetched from
//! the network first so deploys show up immediately, with the cached copy as
//! a fallback; third-party assets (CDN scripts, fonts) are served from cache
//! when present. Caches are versioned: activating a new version drops the
//! others.

use crate::errors::HealthError;
use reqwest::{Client, Url};
use std::collections::HashMap;
use std::future::Future;
use tracing::{debug, info};

pub const API_PREFIX: &str = "/api/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStrategy {
    Bypass,
    NetworkFirst,
    CacheFirst,
}

pub fn strategy_for(url: &Url, origin: &Url) -> FetchStrategy {
    if url.path().starts_with(API_PREFIX) {
        FetchStrategy::Bypass
    } else if url.origin() == origin.origin() {
        FetchStrategy::NetworkFirst
    } else {
        FetchStrategy::CacheFirst
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

pub trait AssetFetcher {
    fn fetch(&self, url: &Url) -> impl Future<Output = Result<Asset, HealthError>> + Send;
}

#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    http: Client,
}

impl AssetFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<Asset, HealthError> {
        let resp = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|err| HealthError::AssetUnavailable(format!("{url}: {err}")))?;
        if !resp.status().is_success() {
            return Err(HealthError::AssetUnavailable(format!("{url}: HTTP {}", resp.status())));
        }
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp
            .bytes()
            .await
            .map_err(|err| HealthError::AssetUnavailable(format!("{url}: {err}")))?;
        Ok(Asset {
            content_type,
            body: body.to_vec(),
        })
    }
}

pub struct OfflineAssetCache<F> {
    version: String,
    origin: Url,
    fetcher: F,
    caches: HashMap<String, HashMap<String, Asset>>,
}

impl<F: AssetFetcher> OfflineAssetCache<F> {
    pub fn new(version: impl Into<String>, origin: Url, fetcher: F) -> Self {
        Self {
            version: version.into(),
            origin,
            fetcher,
            caches: HashMap::new(),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Precaches `assets` into the current version. Fails as a whole if any
    /// asset cannot be fetched, leaving the cache unchanged.
    pub async fn install(&mut self, assets: &[&str]) -> Result<usize, HealthError> {
        let mut fetched = HashMap::new();
        for raw in assets {
            let url = self.resolve(raw)?;
            let asset = self.fetcher.fetch(&url).await?;
            fetched.insert(url.to_string(), asset);
        }
        let count = fetched.len();
        self.caches.entry(self.version.clone()).or_default().extend(fetched);
        info!("precached {count} assets into {}", self.version);
        Ok(count)
    }

    /// Deletes every cache whose version is not the current one.
    pub fn activate(&mut self) -> usize {
        let before = self.caches.len();
        let version = self.version.clone();
        self.caches.retain(|name, _| *name == version);
        before - self.caches.len()
    }

    pub fn cached(&self, url: &Url) -> Option<&Asset> {
        self.caches.get(&self.version)?.get(url.as_str())
    }

    pub async fn handle(&mut self, raw: &str) -> Result<Asset, HealthError> {
        let url = self.resolve(raw)?;
        match strategy_for(&url, &self.origin) {
            FetchStrategy::Bypass => self.fetcher.fetch(&url).await,
            FetchStrategy::NetworkFirst => match self.fetcher.fetch(&url).await {
                Ok(asset) => {
                    self.caches
                        .entry(self.version.clone())
                        .or_default()
                        .insert(url.to_string(), asset.clone());
                    Ok(asset)
                }
                Err(err) => {
                    debug!("network failed for {url}, trying cache: {err}");
                    self.cached(&url).cloned().ok_or(err)
                }
            },
            FetchStrategy::CacheFirst => match self.cached(&url) {
                Some(asset) => Ok(asset.clone()),
                None => self.fetcher.fetch(&url).await,
            },
        }
    }

    fn resolve(&self, raw: &str) -> Result<Url, HealthError> {
        self.origin
            .join(raw)
            .map_err(|err| HealthError::AssetUnavailable(format!("{raw}: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeNetwork {
        down: AtomicBool,
        calls: AtomicUsize,
    }

    impl AssetFetcher for &FakeNetwork {
        async fn fetch(&self, url: &Url) -> Result<Asset, HealthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.down.load(Ordering::SeqCst) {
                return Err(HealthError::AssetUnavailable(url.to_string()));
            }
            Ok(Asset {
                content_type: Some("text/plain".into()),
                body: url.path().as_bytes().to_vec(),
            })
        }
    }

    fn origin() -> Url {
        Url::parse("http://localhost:8080/").unwrap()
    }

    #[test]
    fn requests_are_routed_by_path_and_origin() {
        let api = origin().join("/api/data").unwrap();
        let page = origin().join("/index.html").unwrap();
        let cdn = Url::parse("https://cdn.jsdelivr.net/npm/chart.js").unwrap();
        assert_eq!(strategy_for(&api, &origin()), FetchStrategy::Bypass);
        assert_eq!(strategy_for(&page, &origin()), FetchStrategy::NetworkFirst);
        assert_eq!(strategy_for(&cdn, &origin()), FetchStrategy::CacheFirst);
    }

    #[tokio::test]
    async fn same_origin_falls_back_to_cache_when_offline() {
        let network = FakeNetwork::default();
        let mut cache = OfflineAssetCache::new("healthos-v3", origin(), &network);

        let online = cache.handle("/index.html").await.unwrap();
        network.down.store(true, Ordering::SeqCst);
        let offline = cache.handle("/index.html").await.unwrap();

        assert_eq!(online, offline);
        assert!(cache.handle("/never-seen.js").await.is_err());
    }

    #[tokio::test]
    async fn api_calls_are_never_cached() {
        let network = FakeNetwork::default();
        let mut cache = OfflineAssetCache::new("healthos-v3", origin(), &network);

        cache.handle("/api/data").await.unwrap();
        assert!(cache.cached(&origin().join("/api/data").unwrap()).is_none());

        network.down.store(true, Ordering::SeqCst);
        assert!(cache.handle("/api/data").await.is_err());
    }

    #[tokio::test]
    async fn cross_origin_assets_are_served_from_cache_first() {
        let network = FakeNetwork::default();
        let mut cache = OfflineAssetCache::new("healthos-v3", origin(), &network);
        let cdn = "https://cdn.jsdelivr.net/npm/chart.js";

        assert_eq!(cache.install(&[cdn, "/app.js"]).await.unwrap(), 2);
        let calls = network.calls.load(Ordering::SeqCst);

        cache.handle(cdn).await.unwrap();
        assert_eq!(network.calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test]
    async fn activating_a_new_version_drops_old_caches() {
        let network = FakeNetwork::default();
        let mut old = OfflineAssetCache::new("healthos-v2", origin(), &network);
        old.install(&["/app.js"]).await.unwrap();

        let mut current = OfflineAssetCache {
            version: "healthos-v3".into(),
            ..old
        };
        current.install(&["/app.js"]).await.unwrap();
        assert_eq!(current.activate(), 1);
        assert_eq!(current.activate(), 0);
        assert_eq!(current.version(), "healthos-v3");
    }

    #[tokio::test]
    async fn http_fetcher_reports_unreachable_hosts() {
        let url = Url::parse("http://127.0.0.1:9/app.js").unwrap();
        let err = HttpFetcher::default().fetch(&url).await.unwrap_err();
        assert!(matches!(err, HealthError::AssetUnavailable(_)));
    }

    #[tokio::test]
    async fn failed_install_caches_nothing() {
        let network = FakeNetwork::default();
        network.down.store(true, Ordering::SeqCst);
        let mut cache = OfflineAssetCache::new("healthos-v3", origin(), &network);

        assert!(cache.install(&["/index.html"]).await.is_err());
        assert!(cache.cached(&origin().join("/index.html").unwrap()).is_none());
    }
}
