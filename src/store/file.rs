use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::app::Result;
use crate::domain::{CacheEntry, CacheKey};
use crate::store::MetaStore;

/// Flat-file metadata store: one `<keyhex>.meta` sidecar per cached URL,
/// holding the pipe-delimited validator record next to the content files.
///
/// No locking is attempted; concurrent writers to the same key are a known
/// race resolved upstream by the engine's per-key serialization.
pub struct FileMetaStore {
    base_dir: PathBuf,
}

impl FileMetaStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn meta_path(&self, key: &CacheKey) -> PathBuf {
        self.base_dir.join(format!("{}.meta", key.hex()))
    }
}

impl MetaStore for FileMetaStore {
    /// Read the record for `key`. A missing file yields an empty entry; an
    /// unparseable one degrades the same way, with a warning.
    fn load(&self, key: &CacheKey) -> Result<CacheEntry> {
        let path = self.meta_path(key);
        let record = match fs::read_to_string(&path) {
            Ok(record) => record,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(CacheEntry::default()),
            Err(e) => return Err(e.into()),
        };

        match CacheEntry::parse_record(&record) {
            Some(entry) => Ok(entry),
            None => {
                tracing::warn!("discarding unparseable metadata record at {}", path.display());
                Ok(CacheEntry::default())
            }
        }
    }

    /// Overwrite the record for `key` with the current validator values.
    fn save(&self, key: &CacheKey, entry: &CacheEntry) -> Result<()> {
        ensure_dir(&self.base_dir)?;
        fs::write(self.meta_path(key), entry.to_record())?;
        Ok(())
    }
}

/// Create the cache base directory if missing, owner-only on unix.
pub fn ensure_dir(base: &Path) -> std::io::Result<()> {
    fs::create_dir_all(base)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(base, fs::Permissions::from_mode(0o700))?;
    }
    Ok(())
}
