use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, IF_MODIFIED_SINCE, IF_NONE_MATCH};
use reqwest::{redirect, Client, StatusCode};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::app::Result;
use crate::config::CacheConfig;
use crate::domain::CacheEntry;
use crate::fetcher::{encode, FetchedResponse, Fetcher};

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &CacheConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .gzip(true)
            .brotli(true)
            .user_agent(config.user_agent.clone())
            .redirect(redirect::Policy::limited(config.max_redirects))
            .referer(true)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(
        &self,
        url: &str,
        payload: Option<&str>,
        prior: &CacheEntry,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<FetchedResponse> {
        let mut headers = HeaderMap::new();

        if let Some(etag) = prior.etag() {
            if let Ok(value) = HeaderValue::from_str(etag) {
                headers.insert(IF_NONE_MATCH, value);
            }
        }

        if let Some(last_modified) = prior.last_modified() {
            if let Ok(value) = HeaderValue::from_str(last_modified) {
                headers.insert(IF_MODIFIED_SINCE, value);
            }
        }

        // POST when a payload is supplied, GET otherwise
        let request = match payload {
            Some(payload) => self
                .client
                .post(url)
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(encode::encode_post_payload(payload)),
            None => self.client.get(url),
        };

        let mut response = request.headers(headers).send().await?;

        let fetched = FetchedResponse {
            status: response.status().as_u16(),
            content_type: first_header(&response, "content-type"),
            etag: first_header(&response, "etag"),
            last_modified: first_header(&response, "last-modified"),
            cache_control: first_header(&response, "cache-control"),
        };

        // 304 carries no body; everything else streams into the sink as
        // received, even on error statuses (the caller discards those).
        if response.status() != StatusCode::NOT_MODIFIED {
            while let Some(chunk) = response.chunk().await? {
                sink.write_all(&chunk).await?;
            }
            sink.flush().await?;
        }

        Ok(fetched)
    }
}

/// First occurrence of a response header, trimmed. Later duplicates are
/// ignored.
fn first_header(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
