//! Staging file lifecycle.
//!
//! Every fetch streams its response body into a private, uniquely named,
//! exclusively created file inside the cache directory. On HTTP 200 the
//! staging file is promoted over the final cache path; on any other outcome
//! it is discarded by dropping it, leaving any pre-existing cached file
//! untouched. Staging names never collide across concurrent fetches and are
//! never equal to a final cache path.

use std::fs::File;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::app::Result;
use crate::domain::CacheKey;
use crate::store::file::ensure_dir;

pub const STAGING_PREFIX: &str = ".staging-";

/// An exclusively owned temporary file receiving a live response body.
/// Dropping it unlinks the file.
pub struct StagingFile {
    inner: NamedTempFile,
}

impl StagingFile {
    /// Create the cache directory if missing, then an exclusively created
    /// staging file inside it.
    pub fn create_in(base_dir: &Path) -> Result<Self> {
        ensure_dir(base_dir)?;
        let inner = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempfile_in(base_dir)?;
        Ok(Self { inner })
    }

    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    /// Open an independent read/write handle on the staging file, so the
    /// body writer and the temp-file lifetime stay decoupled.
    pub fn reopen(&self) -> Result<File> {
        Ok(self.inner.reopen()?)
    }

    /// Promote the staged bytes to `final_path`, replacing any existing file
    /// there. Consumes the staging file; its temporary name is gone
    /// afterwards. Same-directory rename, so no cross-device copy happens.
    pub fn promote(self, final_path: &Path) -> Result<()> {
        self.inner.persist(final_path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Discard the staged bytes. Equivalent to dropping, spelled out for
    /// the call sites where discarding is a decision.
    pub fn discard(self) {}
}

/// Resolve the durable cache path for a fetch.
///
/// Strict content-hash keying names the slot by the key's hex, so distinct
/// URLs can never alias. The historical human-readable naming
/// (`use_url_basename`) uses the URL basename when one exists, accepting
/// that different URLs sharing a trailing segment share a slot. URLs with
/// no usable basename always fall back to the key hex.
pub fn resolve_final_path(
    base_dir: &Path,
    basename: Option<&str>,
    key: &CacheKey,
    use_url_basename: bool,
) -> PathBuf {
    match basename {
        Some(name) if use_url_basename => base_dir.join(name),
        _ => base_dir.join(key.hex()),
    }
}
