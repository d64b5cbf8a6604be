pub mod encode;
pub mod http_fetcher;

use async_trait::async_trait;
use tokio::io::AsyncWrite;

use crate::app::Result;
use crate::domain::CacheEntry;

pub use http_fetcher::HttpFetcher;

/// What came back from the origin server, minus the body (which was
/// streamed into the caller's sink as it arrived).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FetchedResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub cache_control: Option<String>,
}

impl FetchedResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    pub fn is_not_modified(&self) -> bool {
        self.status == 304
    }
}

/// Transport seam. Implementations issue one HTTP(S) request, injecting
/// conditional headers from `prior` validators, and write body bytes to
/// `sink` per received chunk. Errors are transport or sink failures only;
/// non-success HTTP statuses are reported through the response value.
#[async_trait]
pub trait Fetcher {
    async fn fetch(
        &self,
        url: &str,
        payload: Option<&str>,
        prior: &CacheEntry,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<FetchedResponse>;
}
