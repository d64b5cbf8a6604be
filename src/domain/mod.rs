pub mod entry;
pub mod key;
pub mod outcome;

pub use entry::CacheEntry;
pub use key::CacheKey;
pub use outcome::{FailureReason, FetchOutcome, FetchResult};
