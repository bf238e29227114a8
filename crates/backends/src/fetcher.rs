//! Remote content through the two-tier cache.

use crate::error::LiftExt;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use trove_cache::{CacheKey, ContentCache, DEFAULT_MIN_SIZE};
use trove_net::MultisourceProvider;
use trove_vfs::{Result, Url};

/// Fetches remote content from mirrors, remembering it in a [`ContentCache`].
///
/// Two policies, because catalogs mix immutable files with listings that
/// change over time:
///
/// - [`fetch_file`](Self::fetch_file): cache first, network on a miss.
/// - [`fetch_listing`](Self::fetch_listing): network first, cached copy only
///   when the network fails (offline browsing).
///
/// Cache trouble never fails a fetch; it is logged and the network is used.
pub struct CachingFetcher {
    network: Arc<MultisourceProvider>,
    cache: Option<Arc<ContentCache>>,
    min_size: usize,
}

impl CachingFetcher {
    pub fn new(network: Arc<MultisourceProvider>, cache: Option<Arc<ContentCache>>) -> Self {
        Self {
            network,
            cache,
            min_size: DEFAULT_MIN_SIZE,
        }
    }

    /// Files smaller than this are not cached.
    pub fn with_min_size(mut self, min_size: usize) -> Self {
        self.min_size = min_size;
        self
    }

    pub fn network(&self) -> &Arc<MultisourceProvider> {
        &self.network
    }

    #[instrument(level = "debug", skip(self, uris), fields(key = %key))]
    pub async fn fetch_file(&self, key: &CacheKey, uris: &[Url]) -> Result<Vec<u8>> {
        if let Some(content) = self.cached(key).await {
            return Ok(content);
        }
        let content = self.network.fetch_any(uris).await.lift()?;
        self.store(key, &content, self.min_size).await;
        Ok(content)
    }

    #[instrument(level = "debug", skip(self, uris), fields(key = %key))]
    pub async fn fetch_listing(&self, key: &CacheKey, uris: &[Url]) -> Result<Vec<u8>> {
        match self.network.fetch_any(uris).await.lift() {
            Ok(content) => {
                self.store(key, &content, 0).await;
                Ok(content)
            },
            Err(err) => match self.cached(key).await {
                Some(content) => {
                    warn!(error = ?err, "Serving stale listing from cache");
                    Ok(content)
                },
                None => Err(err),
            },
        }
    }

    async fn cached(&self, key: &CacheKey) -> Option<Vec<u8>> {
        let cache = self.cache.as_ref()?;
        match cache.get(key).await {
            Ok(content) => content,
            Err(err) => {
                warn!(error = ?err, "Cache read failed, treating as miss");
                None
            },
        }
    }

    async fn store(&self, key: &CacheKey, content: &[u8], min_size: usize) {
        let Some(cache) = &self.cache else {
            return;
        };
        match cache.put(key, content, min_size).await {
            Ok(true) => debug!("Cached"),
            Ok(false) => {},
            Err(err) => warn!(error = ?err, "Cache write failed"),
        }
    }
}
