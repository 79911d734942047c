use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::config::{Config, ASSET_MANIFEST};

/// A stored response: status, content type and raw body bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl CachedResponse {
    pub fn new(status: u16, content_type: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type: content_type.into(),
            body,
        }
    }

    /// Synthesized response for an API request that failed with no cache entry.
    fn offline_json() -> Self {
        Self::new(
            503,
            "application/json",
            br#"{"error":"Offline and no cached data available"}"#.to_vec(),
        )
    }

    /// Synthesized response for a static asset with no cache and no network.
    fn offline_text() -> Self {
        Self::new(
            503,
            "text/plain",
            b"Offline and resource not cached".to_vec(),
        )
    }
}

/// Named caches of request URL -> response. Each deployment writes under a
/// single cache name; stale names are purged on activation.
#[derive(Default)]
pub struct CacheStore {
    caches: RwLock<HashMap<String, HashMap<String, CachedResponse>>>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, cache_name: &str, request_key: &str, response: CachedResponse) {
        let mut caches = self.caches.write().unwrap();
        caches
            .entry(cache_name.to_string())
            .or_default()
            .insert(request_key.to_string(), response);
    }

    pub fn get(&self, cache_name: &str, request_key: &str) -> Option<CachedResponse> {
        let caches = self.caches.read().unwrap();
        caches.get(cache_name)?.get(request_key).cloned()
    }

    pub fn cache_names(&self) -> Vec<String> {
        self.caches.read().unwrap().keys().cloned().collect()
    }

    pub fn delete_cache(&self, cache_name: &str) -> bool {
        self.caches.write().unwrap().remove(cache_name).is_some()
    }
}

/// Network seam for the gateway. An error means the fetch never produced a
/// response (offline, DNS, refused); HTTP error statuses still come back as
/// responses, matching platform fetch semantics.
#[async_trait]
pub trait Origin: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<CachedResponse>;
}

pub struct HttpOrigin {
    client: reqwest::Client,
}

impl HttpOrigin {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpOrigin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Origin for HttpOrigin {
    async fn fetch(&self, url: &str) -> Result<CachedResponse> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| anyhow!("Fetch failed for {}: {}", url, e))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let body = response.bytes().await?.to_vec();

        Ok(CachedResponse::new(status, content_type, body))
    }
}

/// Intercepts every outbound request from the app. API hosts are served
/// network-first with a cache fallback; everything else is cache-first.
pub struct Gateway {
    cache_name: String,
    asset_base: String,
    api_hosts: Vec<String>,
    store: Arc<CacheStore>,
    origin: Arc<dyn Origin>,
}

impl Gateway {
    pub fn new(config: &Config, store: Arc<CacheStore>, origin: Arc<dyn Origin>) -> Self {
        Self {
            cache_name: config.cache_name.clone(),
            asset_base: config.asset_base.clone(),
            api_hosts: config.api_hosts.clone(),
            store,
            origin,
        }
    }

    /// Pre-populate the cache with the static asset manifest. Best-effort:
    /// a failed asset is logged and skipped, the rest still install.
    pub async fn install(&self) {
        info!("Gateway: installing cache {}", self.cache_name);
        for path in ASSET_MANIFEST {
            let url = format!("{}{}", self.asset_base, path);
            match self.origin.fetch(&url).await {
                Ok(response) => self.store.put(&self.cache_name, &url, response),
                Err(e) => error!("Gateway: failed to cache {}: {}", url, e),
            }
        }
    }

    /// Drop every cache generation other than the current one.
    pub fn activate(&self) {
        for name in self.store.cache_names() {
            if name != self.cache_name {
                info!("Gateway: deleting old cache {}", name);
                self.store.delete_cache(&name);
            }
        }
    }

    fn is_api_request(&self, url: &str) -> bool {
        self.api_hosts.iter().any(|host| url.starts_with(host.as_str()))
    }

    pub async fn handle(&self, url: &str) -> CachedResponse {
        if self.is_api_request(url) {
            self.network_first(url).await
        } else {
            self.cache_first(url).await
        }
    }

    async fn network_first(&self, url: &str) -> CachedResponse {
        match self.origin.fetch(url).await {
            Ok(response) => {
                self.store.put(&self.cache_name, url, response.clone());
                response
            }
            Err(e) => {
                warn!("Gateway: network fetch failed, falling back to cache: {} ({})", url, e);
                match self.store.get(&self.cache_name, url) {
                    Some(cached) => cached,
                    None => CachedResponse::offline_json(),
                }
            }
        }
    }

    async fn cache_first(&self, url: &str) -> CachedResponse {
        if let Some(cached) = self.store.get(&self.cache_name, url) {
            info!("Gateway: serving from cache {}", url);
            return cached;
        }

        match self.origin.fetch(url).await {
            Ok(response) => {
                self.store.put(&self.cache_name, url, response.clone());
                response
            }
            Err(e) => {
                error!("Gateway: fetch failed for {}: {}", url, e);
                CachedResponse::offline_text()
            }
        }
    }

    /// Resolve a manifest-relative asset path against the asset origin.
    pub fn asset_url(&self, path: &str) -> String {
        format!("{}{}", self.asset_base, path)
    }
}
