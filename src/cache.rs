use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header::CONTENT_TYPE, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use dashmap::DashMap;
use tracing::{debug, error, warn};

#[derive(Debug, Clone)]
struct CachedPage {
    status: StatusCode,
    content_type: Option<HeaderValue>,
    body: Bytes,
    expires_at: Instant,
}

impl CachedPage {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

impl IntoResponse for CachedPage {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.body).into_response();
        if let Some(content_type) = self.content_type {
            response.headers_mut().insert(CONTENT_TYPE, content_type);
        }
        response
    }
}

/// Whole rendered pages keyed by path and query string.
///
/// Entries live for a fixed `ttl` after insertion. Expired entries are swept
/// on every insert, and once `max_entries` is reached the entries closest to
/// expiry are evicted first. Concurrent writers for the same key overwrite
/// each other.
#[derive(Clone)]
pub struct PageCache {
    store: Arc<DashMap<String, CachedPage>>,
    ttl: Duration,
    max_entries: usize,
}

impl PageCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        debug!(ttl_secs = ttl.as_secs(), max_entries, "Initializing page cache");
        Self {
            store: Arc::new(DashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    fn get(&self, key: &str) -> Option<CachedPage> {
        let entry = self.store.get(key)?.clone();
        if entry.is_expired() {
            self.store.remove_if(key, |_, e| e.is_expired());
            return None;
        }
        Some(entry)
    }

    fn insert(
        &self,
        key: String,
        status: StatusCode,
        content_type: Option<HeaderValue>,
        body: Bytes,
    ) {
        self.enforce_limits(&key);
        self.store.insert(
            key,
            CachedPage {
                status,
                content_type,
                body,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Makes room for one more entry under `key`.
    fn enforce_limits(&self, key: &str) {
        self.store.retain(|_, page| !page.is_expired());

        if self.store.contains_key(key) || self.store.len() < self.max_entries {
            return;
        }

        let evict_count = self.store.len() + 1 - self.max_entries;
        let mut oldest: Vec<(String, Instant)> = self
            .store
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().expires_at))
            .collect();
        oldest.sort_by_key(|(_, expires_at)| *expires_at);

        warn!(
            current_entries = oldest.len(),
            evict_count, "page cache full, evicting entries"
        );
        for (key, _) in oldest.into_iter().take(evict_count) {
            self.store.remove(&key);
        }
    }

    #[cfg(test)]
    pub fn invalidate(&self, key: &str) {
        self.store.remove(key);
    }

    #[cfg(test)]
    pub fn clear(&self) {
        self.store.clear();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.store.len()
    }
}

/// Serves GET requests out of the page cache, filling it on a miss.
pub async fn cache_page(State(cache): State<PageCache>, request: Request, next: Next) -> Response {
    if request.method() != Method::GET {
        return next.run(request).await;
    }

    let key = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    if let Some(page) = cache.get(&key) {
        debug!(key = %key, "page cache hit");
        return page.into_response();
    }

    let response = next.run(request).await;
    if response.status() != StatusCode::OK {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Failed to buffer response for caching: {:?}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    cache.insert(
        key,
        parts.status,
        parts.headers.get(CONTENT_TYPE).cloned(),
        bytes.clone(),
    );

    Response::from_parts(parts, Body::from(bytes))
}
