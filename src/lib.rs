//! # urlcache
//!
//! A fetch-and-cache engine: give it a URL (and optionally a POST payload)
//! and it hands back a local readable file path, reusing the on-disk copy
//! across calls through HTTP conditional-request revalidation
//! (ETag / Last-Modified).
//!
//! ## Architecture
//!
//! ```text
//! Recognizer -> CacheKey -> MetaStore -> Staging -> Fetcher -> FetchResult
//! ```
//!
//! A fetch recognizes the URL, derives a content-addressed key over
//! (URL, payload), loads any stored validators, opens an exclusively created
//! staging file, streams the response body into it, then promotes the file
//! into the cache on HTTP 200 or reuses the cached copy on 304. All failure
//! modes come back as values in the result; the caller checks, the engine
//! never panics on bad servers or bad disks.
//!
//! ## Quick start
//!
//! ```no_run
//! use urlcache::cache::UrlCache;
//! use urlcache::config::CacheConfig;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let cache = UrlCache::new(CacheConfig::default())?;
//! let mut result = cache.fetch("https://example.com/data.json", None).await;
//! if result.succeeded() {
//!     println!("{}", result.local_path.as_ref().unwrap().display());
//! }
//! result.release();
//! # Ok(())
//! # }
//! ```

/// Crate error type and `Result` alias.
pub mod app;

/// The engine: orchestration, per-key serialization.
pub mod cache;

/// Command-line interface: `fetch` and `resolve` subcommands.
pub mod cli;

/// Engine configuration, loadable from TOML.
pub mod config;

/// Core value types: [`CacheKey`](domain::CacheKey),
/// [`CacheEntry`](domain::CacheEntry), [`FetchResult`](domain::FetchResult).
pub mod domain;

/// HTTP transport: the [`Fetcher`](fetcher::Fetcher) seam, the reqwest
/// implementation, and POST payload encoding.
pub mod fetcher;

/// URL grammar matching and basename extraction.
pub mod recognizer;

/// Remote operations map resolution (a thin recursive consumer of the
/// engine).
pub mod rom;

/// Staging file lifecycle: exclusive creation, promotion, discard.
pub mod staging;

/// Validator metadata persistence (`<keyhex>.meta` sidecar records).
pub mod store;
