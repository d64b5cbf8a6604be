//! Engine configuration.
//!
//! Plain serde struct with defaults for every field, loadable from a TOML
//! file. The content-type gate reproduces the original deployment knobs:
//! strict `application/json`, optionally widened to the historically
//! tolerated variants, optionally tolerating a missing Content-Type header.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::app::{Result, UrlCacheError};

/// Content types accepted when `liberal_content_types` is enabled, in
/// addition to `application/json`.
const LIBERAL_CONTENT_TYPES: &[&str] = &[
    "application/x-javascript",
    "text/javascript",
    "text/x-javascript",
    "text/x-json",
    "text/html",
    "application/x-gzip",
];

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding promoted content files, `.meta` sidecars, and
    /// transient staging files. Created on demand, owner-only on unix.
    pub base_dir: PathBuf,

    /// Request timeout in seconds (default: 30).
    pub timeout_secs: u64,

    /// Client identification sent with every request.
    pub user_agent: String,

    /// Redirect hop cap (default: 5).
    pub max_redirects: usize,

    /// Name promoted files by URL basename instead of the content hash.
    /// Human-readable, but distinct URLs sharing a trailing path segment
    /// will share a cache slot (default: false).
    pub use_url_basename: bool,

    /// Gate HTTP 200 responses on the content-type allow-list
    /// (default: false).
    pub check_content_type: bool,

    /// With the gate on, accept responses carrying no Content-Type header.
    pub allow_missing_content_type: bool,

    /// With the gate on, also accept the historically tolerated variants
    /// (text/javascript, text/html, application/x-gzip, ...).
    pub liberal_content_types: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            timeout_secs: 30,
            user_agent: concat!("urlcache/", env!("CARGO_PKG_VERSION")).to_string(),
            max_redirects: 5,
            use_url_basename: false,
            check_content_type: false,
            allow_missing_content_type: false,
            liberal_content_types: false,
        }
    }
}

impl CacheConfig {
    /// Load configuration from a TOML file. Missing fields use defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| UrlCacheError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Apply the content-type gate to an HTTP 200 response. Parameters on
    /// the header value (`; charset=...`) are ignored.
    pub fn content_type_ok(&self, content_type: Option<&str>) -> bool {
        if !self.check_content_type {
            return true;
        }

        let media_type = match content_type {
            Some(value) => value.split(';').next().unwrap_or("").trim(),
            None => return self.allow_missing_content_type,
        };

        if media_type.eq_ignore_ascii_case("application/json") {
            return true;
        }

        self.liberal_content_types
            && LIBERAL_CONTENT_TYPES
                .iter()
                .any(|t| media_type.eq_ignore_ascii_case(t))
    }
}

/// `<platform cache dir>/urlcache`, falling back to the system temp dir.
fn default_base_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("urlcache")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = CacheConfig::default();
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.max_redirects, 5);
        assert!(!config.use_url_basename);
        assert!(!config.check_content_type);
        assert!(config.user_agent.starts_with("urlcache/"));
    }

    #[test]
    fn test_gate_off_accepts_anything() {
        let config = CacheConfig::default();
        assert!(config.content_type_ok(Some("text/plain")));
        assert!(config.content_type_ok(None));
    }

    #[test]
    fn test_strict_gate() {
        let config = CacheConfig {
            check_content_type: true,
            ..Default::default()
        };
        assert!(config.content_type_ok(Some("application/json")));
        assert!(config.content_type_ok(Some("application/json; charset=utf-8")));
        assert!(config.content_type_ok(Some("Application/JSON")));
        assert!(!config.content_type_ok(Some("text/html")));
        assert!(!config.content_type_ok(None));
    }

    #[test]
    fn test_liberal_gate() {
        let config = CacheConfig {
            check_content_type: true,
            liberal_content_types: true,
            ..Default::default()
        };
        assert!(config.content_type_ok(Some("text/javascript")));
        assert!(config.content_type_ok(Some("application/x-gzip")));
        assert!(!config.content_type_ok(Some("image/png")));
    }

    #[test]
    fn test_missing_content_type_toggle() {
        let config = CacheConfig {
            check_content_type: true,
            allow_missing_content_type: true,
            ..Default::default()
        };
        assert!(config.content_type_ok(None));
    }

    #[test]
    fn test_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "timeout_secs = 10\nuse_url_basename = true\nbase_dir = \"/tmp/uc\"\n",
        )
        .unwrap();

        let config = CacheConfig::from_file(&path).unwrap();
        assert_eq!(config.timeout_secs, 10);
        assert!(config.use_url_basename);
        assert_eq!(config.base_dir, PathBuf::from("/tmp/uc"));
        // untouched fields keep defaults
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "timeout_secs = \"not a number\"").unwrap();
        assert!(CacheConfig::from_file(&path).is_err());
    }
}
