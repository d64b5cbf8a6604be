pub mod file;

use crate::app::Result;
use crate::domain::{CacheEntry, CacheKey};

pub use file::FileMetaStore;

/// Persistence seam for per-key validator records.
///
/// The store is the sole writer of cache metadata. A missing or unparseable
/// record is "no prior validators known", never an error; the engine then
/// issues an unconditional request.
pub trait MetaStore {
    fn load(&self, key: &CacheKey) -> Result<CacheEntry>;
    fn save(&self, key: &CacheKey, entry: &CacheEntry) -> Result<()>;
}
