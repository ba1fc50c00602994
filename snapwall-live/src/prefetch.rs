//! Image warm-up over HTTP.
//!
//! The slideshow asks for the next few photos after every tick. Each URL is
//! fetched once in the background and the body kept in a small LRU, so the
//! surface finds the bytes ready when the photo comes up. Failures are
//! logged and forgotten.

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

use lru::LruCache;
use snapwall_core::Prefetch;
use tokio::runtime::Handle;

const DEFAULT_CAPACITY: usize = 16;

#[derive(Default)]
struct PrefetchState {
    in_flight: HashSet<String>,
    failures: u64,
}

#[derive(Clone)]
pub struct HttpPrefetcher {
    client: reqwest::Client,
    runtime: Handle,
    cache: Arc<Mutex<LruCache<String, Arc<Vec<u8>>>>>,
    state: Arc<Mutex<PrefetchState>>,
}

impl HttpPrefetcher {
    /// Must be called inside a Tokio runtime; fetches run on it.
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_capacity(client, Handle::current(), DEFAULT_CAPACITY)
    }

    pub fn with_capacity(client: reqwest::Client, runtime: Handle, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            client,
            runtime,
            cache: Arc::new(Mutex::new(LruCache::new(capacity))),
            state: Arc::new(Mutex::new(PrefetchState::default())),
        }
    }

    /// Body of a previously prefetched URL.
    pub fn cached(&self, url: &str) -> Option<Arc<Vec<u8>>> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .cloned()
    }

    pub fn is_in_flight(&self, url: &str) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .in_flight
            .contains(url)
    }

    pub fn failures(&self) -> u64 {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).failures
    }

    async fn fetch(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, reqwest::Error> {
        let resp = client.get(url).send().await?.error_for_status()?;
        Ok(resp.bytes().await?.to_vec())
    }
}

impl Prefetch for HttpPrefetcher {
    fn prefetch(&self, url: &str) {
        if self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(url)
        {
            return;
        }
        if !self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .in_flight
            .insert(url.to_string())
        {
            return;
        }

        let client = self.client.clone();
        let cache = Arc::clone(&self.cache);
        let state = Arc::clone(&self.state);
        let url = url.to_string();
        self.runtime.spawn(async move {
            let result = Self::fetch(&client, &url).await;
            let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
            state.in_flight.remove(&url);
            match result {
                Ok(body) => {
                    log::debug!("Prefetched {url} ({} bytes)", body.len());
                    cache
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .put(url, Arc::new(body));
                }
                Err(e) => {
                    state.failures += 1;
                    log::debug!("Prefetch of {url} failed: {e}");
                }
            }
        });
    }
}
