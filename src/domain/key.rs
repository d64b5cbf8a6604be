use sha2::{Digest, Sha256};

/// Content-addressed cache key: a SHA-256 digest over the URL bytes followed
/// by the POST payload bytes, if any. The payload participates in caching on
/// purpose: the same URL queried with different payloads is different
/// content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    /// Compute the key for a (url, payload) pair. Deterministic across
    /// process restarts; no randomness or timestamps participate.
    pub fn compute(url: &str, payload: Option<&str>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        if let Some(payload) = payload {
            hasher.update(payload.as_bytes());
        }
        Self(hasher.finalize().into())
    }

    /// Lowercase hex rendering, also used as the default on-disk filename
    /// when a URL has no usable basename.
    pub fn hex(&self) -> String {
        hex::encode(self.0)
    }
}
