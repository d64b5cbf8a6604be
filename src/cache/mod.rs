//! The fetch-and-cache engine.
//!
//! [`UrlCache`] ties the components together: recognize the URL, derive the
//! content-addressed key, load prior validators, open a staging file, issue
//! the (conditional) request streaming the body into staging, refresh the
//! metadata record, then promote or discard. Every exit path releases the
//! staging file; failures come back as values inside [`FetchResult`].
//!
//! Fetches for the same key are serialized through a keyed lock registry, so
//! concurrent callers cannot race on the metadata record or the final-path
//! promotion. Fetches for different keys are fully independent.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::app::{Result, UrlCacheError};
use crate::config::CacheConfig;
use crate::domain::{CacheEntry, CacheKey, FailureReason, FetchOutcome, FetchResult};
use crate::fetcher::{FetchedResponse, Fetcher, HttpFetcher};
use crate::recognizer::{Recognizer, UrlShape};
use crate::staging::{self, StagingFile};
use crate::store::{FileMetaStore, MetaStore};

struct KeyLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyLocks {
    fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    fn for_key(&self, key: &CacheKey) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().expect("lock registry poisoned");
        map.entry(key.hex())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Drop the registry entry for `key` once no caller holds it anymore,
    /// so the map does not grow one entry per distinct URL for the life of
    /// the process.
    fn evict(&self, key: &CacheKey) {
        let mut map = self.inner.lock().expect("lock registry poisoned");
        let hex = key.hex();
        if map.get(&hex).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            map.remove(&hex);
        }
    }
}

pub struct UrlCache {
    config: CacheConfig,
    recognizer: Recognizer,
    fetcher: Arc<dyn Fetcher + Send + Sync>,
    store: FileMetaStore,
    locks: KeyLocks,
}

impl UrlCache {
    pub fn new(config: CacheConfig) -> Result<Self> {
        let fetcher: Arc<dyn Fetcher + Send + Sync> = Arc::new(HttpFetcher::new(&config)?);
        Ok(Self::with_fetcher(config, fetcher))
    }

    /// Construct with an injected transport, for callers that bring their
    /// own client.
    pub fn with_fetcher(config: CacheConfig, fetcher: Arc<dyn Fetcher + Send + Sync>) -> Self {
        let store = FileMetaStore::new(&config.base_dir);
        Self {
            config,
            recognizer: Recognizer::new(),
            fetcher,
            store,
            locks: KeyLocks::new(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Expose URL recognition so callers can route non-URLs to local file
    /// handling before involving the engine.
    pub fn recognize(&self, candidate: &str) -> Option<UrlShape> {
        self.recognizer.recognize(candidate)
    }

    /// Fetch `url` into the cache, revalidating any cached copy, and return
    /// the local path of the result. GET without a payload, POST with one.
    /// All failures are reported through the returned [`FetchResult`].
    pub async fn fetch(&self, url: &str, payload: Option<&str>) -> FetchResult {
        let started = Instant::now();

        let Some(shape) = self.recognizer.recognize(url) else {
            tracing::debug!("{} does not match the URL grammar", url);
            return FetchResult::failed(FailureReason::NotAUrl, None, elapsed_ms(started));
        };

        let key = CacheKey::compute(url, payload);
        let lock = self.locks.for_key(&key);
        let result = {
            let _guard = lock.lock().await;
            self.fetch_under_lock(url, payload, &shape, &key, started).await
        };
        drop(lock);
        self.locks.evict(&key);
        result
    }

    async fn fetch_under_lock(
        &self,
        url: &str,
        payload: Option<&str>,
        shape: &UrlShape,
        key: &CacheKey,
        started: Instant,
    ) -> FetchResult {
        let mut prior = match self.store.load(key) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("metadata load failed for {}: {}", url, e);
                CacheEntry::default()
            }
        };

        let final_path = staging::resolve_final_path(
            &self.config.base_dir,
            shape.basename().as_deref(),
            key,
            self.config.use_url_basename,
        );

        // a surviving record whose file was evicted must not drive a
        // conditional request: a 304 would leave nothing to serve
        if prior.has_validators() && !final_path.exists() {
            tracing::debug!("cached copy of {} is gone, refetching unconditionally", url);
            prior = CacheEntry::default();
        }

        let staging = match StagingFile::create_in(&self.config.base_dir) {
            Ok(staging) => staging,
            Err(e) => {
                return FetchResult::failed(
                    FailureReason::LocalIo(e.to_string()),
                    None,
                    elapsed_ms(started),
                )
            }
        };

        let mut sink = match staging.reopen() {
            Ok(file) => tokio::fs::File::from_std(file),
            Err(e) => {
                return FetchResult::failed(
                    FailureReason::LocalIo(e.to_string()),
                    None,
                    elapsed_ms(started),
                )
            }
        };

        if prior.has_validators() {
            tracing::debug!("revalidating {} against stored validators", url);
        }

        let response = self.fetcher.fetch(url, payload, &prior, &mut sink).await;
        drop(sink);
        let duration_ms = elapsed_ms(started);

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("fetch of {} failed: {}", url, e);
                let reason = match e {
                    UrlCacheError::Io(e) => FailureReason::LocalIo(e.to_string()),
                    other => FailureReason::Transport(other.to_string()),
                };
                return FetchResult::failed(reason, None, duration_ms);
            }
        };

        if response.is_not_modified() {
            // the record is rewritten even on 304
            self.refresh_metadata(key, &final_path, &response, Some(&prior));
            staging.discard();

            if final_path.exists() {
                tracing::debug!("{} not modified, reusing cached copy", url);
                return FetchResult::new(
                    FetchOutcome::CacheHit { duration_ms },
                    Some(final_path),
                    false,
                );
            }

            tracing::warn!("origin answered 304 for {} but no cached file exists", url);
            return FetchResult::failed(FailureReason::HttpStatus(304), Some(304), duration_ms);
        }

        if !response.is_ok() {
            staging.discard();
            return FetchResult::failed(
                FailureReason::HttpStatus(response.status),
                Some(response.status),
                duration_ms,
            );
        }

        if !self.config.content_type_ok(response.content_type.as_deref()) {
            staging.discard();
            let content_type = response
                .content_type
                .unwrap_or_else(|| "(none)".to_string());
            return FetchResult::failed(
                FailureReason::ContentType(content_type),
                Some(200),
                duration_ms,
            );
        }

        self.refresh_metadata(key, &final_path, &response, None);

        match staging.promote(&final_path) {
            Ok(()) => {
                tracing::info!("fetched {} into {}", url, final_path.display());
                FetchResult::new(
                    FetchOutcome::Fetched {
                        status: response.status,
                        content_type: response.content_type,
                        duration_ms,
                    },
                    Some(final_path),
                    false,
                )
            }
            Err(e) => FetchResult::failed(
                FailureReason::LocalIo(e.to_string()),
                Some(200),
                duration_ms,
            ),
        }
    }

    /// Rewrite the metadata record from the response validators. On 304 the
    /// origin usually repeats no validators, so `fallback` carries the prior
    /// entry's values forward; on 200 the response is authoritative.
    fn refresh_metadata(
        &self,
        key: &CacheKey,
        final_path: &Path,
        response: &FetchedResponse,
        fallback: Option<&CacheEntry>,
    ) {
        let empty = CacheEntry::default();
        let prior = fallback.unwrap_or(&empty);
        let carry =
            |new: &Option<String>, old: &str| new.clone().unwrap_or_else(|| old.to_string());
        let entry = CacheEntry {
            file_name: final_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            etag: carry(&response.etag, &prior.etag),
            last_modified: carry(&response.last_modified, &prior.last_modified),
            cache_control: carry(&response.cache_control, &prior.cache_control),
        };

        // best effort: losing the record just means the next fetch
        // revalidates unconditionally
        if let Err(e) = self.store.save(key, &entry) {
            tracing::warn!("metadata write failed for {}: {}", key.hex(), e);
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn cache_at(dir: &Path) -> UrlCache {
        let config = CacheConfig {
            base_dir: dir.to_path_buf(),
            ..Default::default()
        };
        UrlCache::new(config).unwrap()
    }

    fn staging_leftovers(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with(staging::STAGING_PREFIX))
            .collect()
    }

    #[tokio::test]
    async fn test_fetch_promotes_content_and_writes_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("{\"a\":1}", "application/json")
                    .insert_header("ETag", "\"v1\""),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let cache = cache_at(dir.path());
        let url = format!("{}/data.json", server.uri());

        let result = cache.fetch(&url, None).await;
        assert!(result.succeeded());
        assert_eq!(result.status(), Some(200));
        assert_eq!(result.content_type(), Some("application/json"));
        assert!(!result.needs_unlink);

        let local = result.local_path.as_ref().unwrap();
        assert_eq!(fs::read_to_string(local).unwrap(), "{\"a\":1}");

        // strict keying: the slot is named by the content hash
        let key = CacheKey::compute(&url, None);
        assert_eq!(local.file_name().unwrap().to_str().unwrap(), key.hex());

        // sidecar record with a non-empty resolved filename
        let meta = fs::read_to_string(dir.path().join(format!("{}.meta", key.hex()))).unwrap();
        assert!(meta.starts_with(&format!("{}|\"v1\"|", key.hex())));

        assert!(staging_leftovers(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_revalidation_304_reuses_cached_copy() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("{\"a\":1}", "application/json")
                    .insert_header("ETag", "\"v1\""),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let cache = cache_at(dir.path());
        let url = format!("{}/data.json", server.uri());

        let first = cache.fetch(&url, None).await;
        assert!(first.succeeded());

        // second round: origin validates the stored ETag
        server.reset().await;
        Mock::given(method("GET"))
            .and(path("/data.json"))
            .and(header("If-None-Match", "\"v1\""))
            .respond_with(ResponseTemplate::new(304))
            .mount(&server)
            .await;

        let second = cache.fetch(&url, None).await;
        assert!(second.succeeded());
        assert!(matches!(second.outcome, FetchOutcome::CacheHit { .. }));
        assert_eq!(second.status(), Some(304));
        assert_eq!(second.local_path, first.local_path);
        assert_eq!(
            fs::read_to_string(second.local_path.as_ref().unwrap()).unwrap(),
            "{\"a\":1}"
        );

        // validators survive the 304 rewrite
        let key = CacheKey::compute(&url, None);
        let meta = fs::read_to_string(dir.path().join(format!("{}.meta", key.hex()))).unwrap();
        assert!(meta.contains("\"v1\""));

        assert!(staging_leftovers(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_evicted_file_refetches_unconditionally() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("{\"a\":1}", "application/json")
                    .insert_header("ETag", "\"v1\""),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let cache = cache_at(dir.path());
        let url = format!("{}/data.json", server.uri());

        let first = cache.fetch(&url, None).await;
        assert!(first.succeeded());

        // the cached file disappears while its metadata record survives
        fs::remove_file(first.local_path.as_ref().unwrap()).unwrap();

        // a conditional request would get 304 and have nothing to serve;
        // the engine must drop the stored validators and refetch
        server.reset().await;
        Mock::given(method("GET"))
            .and(path("/data.json"))
            .and(header("If-None-Match", "\"v1\""))
            .respond_with(ResponseTemplate::new(304))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/data.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("{\"a\":2}", "application/json")
                    .insert_header("ETag", "\"v2\""),
            )
            .mount(&server)
            .await;

        let second = cache.fetch(&url, None).await;
        assert!(matches!(second.outcome, FetchOutcome::Fetched { .. }));
        assert_eq!(
            fs::read_to_string(second.local_path.as_ref().unwrap()).unwrap(),
            "{\"a\":2}"
        );

        // the rewritten record carries the fresh validator
        let key = CacheKey::compute(&url, None);
        let meta = fs::read_to_string(dir.path().join(format!("{}.meta", key.hex()))).unwrap();
        assert!(meta.contains("\"v2\""));
    }

    #[tokio::test]
    async fn test_404_leaves_nothing_behind() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.json"))
            .respond_with(ResponseTemplate::new(404).set_body_string("gone"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let cache = cache_at(dir.path());
        let url = format!("{}/missing.json", server.uri());

        let result = cache.fetch(&url, None).await;
        assert!(!result.succeeded());
        assert_eq!(result.status(), Some(404));
        assert!(matches!(
            result.outcome,
            FetchOutcome::Failed {
                reason: FailureReason::HttpStatus(404),
                ..
            }
        ));
        assert!(result.local_path.is_none());

        let key = CacheKey::compute(&url, None);
        assert!(!dir.path().join(key.hex()).exists());
        assert!(staging_leftovers(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_non_url_fails_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_at(dir.path());

        let result = cache.fetch("/etc/hosts", None).await;
        assert!(!result.succeeded());
        assert!(matches!(
            result.outcome,
            FetchOutcome::Failed {
                reason: FailureReason::NotAUrl,
                ..
            }
        ));
        assert!(result.local_path.is_none());
        // the engine never touched the cache directory
        assert!(fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_payloads_occupy_distinct_slots() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("rows", "application/json"),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let cache = cache_at(dir.path());
        let url = format!("{}/query", server.uri());

        let a = cache.fetch(&url, Some("q=1")).await;
        let b = cache.fetch(&url, Some("q=2")).await;
        assert!(a.succeeded() && b.succeeded());
        assert_ne!(a.local_path, b.local_path);
    }

    #[tokio::test]
    async fn test_basename_naming_mode() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/report.json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("{}", "application/json"),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = CacheConfig {
            base_dir: dir.path().to_path_buf(),
            use_url_basename: true,
            ..Default::default()
        };
        let cache = UrlCache::new(config).unwrap();

        let result = cache
            .fetch(&format!("{}/files/report.json", server.uri()), None)
            .await;
        assert!(result.succeeded());
        assert_eq!(
            result.local_path.as_ref().unwrap(),
            &dir.path().join("report.json")
        );
    }

    #[tokio::test]
    async fn test_content_type_gate_rejects_200() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page.html"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = CacheConfig {
            base_dir: dir.path().to_path_buf(),
            check_content_type: true,
            ..Default::default()
        };
        let cache = UrlCache::new(config).unwrap();

        let result = cache
            .fetch(&format!("{}/page.html", server.uri()), None)
            .await;
        assert!(!result.succeeded());
        assert!(matches!(
            result.outcome,
            FetchOutcome::Failed {
                reason: FailureReason::ContentType(_),
                status: Some(200),
                ..
            }
        ));
        assert!(staging_leftovers(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_fetches_of_same_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data.json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("{\"a\":1}", "application/json"),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(cache_at(dir.path()));
        let url = format!("{}/data.json", server.uri());

        let (a, b) = tokio::join!(cache.fetch(&url, None), cache.fetch(&url, None));
        assert!(a.succeeded() && b.succeeded());
        assert_eq!(a.local_path, b.local_path);
        assert_eq!(
            fs::read_to_string(a.local_path.as_ref().unwrap()).unwrap(),
            "{\"a\":1}"
        );

        // both callers are done, so the lock registry is empty again
        assert!(cache.locks.inner.lock().unwrap().is_empty());
    }

    #[test]
    fn test_key_locks_evicted_when_unused() {
        let locks = KeyLocks::new();
        let key = CacheKey::compute("http://example.com/a", None);

        let held = locks.for_key(&key);
        locks.evict(&key);
        // still held by a caller, so the entry stays
        assert!(!locks.inner.lock().unwrap().is_empty());

        drop(held);
        locks.evict(&key);
        assert!(locks.inner.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_is_reported_not_thrown() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_at(dir.path());

        // nothing listens on the discard port
        let result = cache.fetch("http://127.0.0.1:9/unreachable", None).await;
        assert!(!result.succeeded());
        assert!(matches!(
            result.outcome,
            FetchOutcome::Failed {
                reason: FailureReason::Transport(_),
                ..
            }
        ));
        assert!(staging_leftovers(dir.path()).is_empty());
    }
}
