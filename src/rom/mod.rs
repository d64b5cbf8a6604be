//! Remote operations map (ROM) resolution.
//!
//! A ROM is a small JSON document, itself fetched through the cache engine,
//! that translates a logical table operation into a concrete URL and HTTP
//! method. Schema 2 documents look like:
//!
//! ```json
//! {
//!   "romschema": "2",
//!   "host": "https://api.example.com",
//!   "url": "/v1",
//!   "devicestate": {
//!     "url": "/devices",
//!     "select": {
//!       "method": "GET",
//!       "url": "/state",
//!       "query": [ { "name": "limit", "value": "100" } ]
//!     }
//!   }
//! }
//! ```
//!
//! When the document carries no `host`, the scheme and authority of the ROM
//! URL itself are reused.

use std::sync::Arc;

use serde_json::Value;

use crate::app::{Result, UrlCacheError};
use crate::cache::UrlCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RomAction {
    Select,
    Insert,
    Update,
    Delete,
}

impl RomAction {
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "select" => Some(Self::Select),
            "insert" => Some(Self::Insert),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// A resolved operation: where to send the request and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RomInvocation {
    pub url: String,
    pub method: String,
}

pub struct RomResolver {
    cache: Arc<UrlCache>,
}

impl RomResolver {
    pub fn new(cache: Arc<UrlCache>) -> Self {
        Self { cache }
    }

    /// Fetch the ROM document at `rom_url`, validate its schema, and build
    /// the invocation for `rom_path` under `action`.
    pub async fn resolve(
        &self,
        rom_url: &str,
        rom_path: &str,
        action: RomAction,
    ) -> Result<RomInvocation> {
        if rom_url.is_empty() || rom_path.is_empty() {
            return Err(UrlCacheError::Rom("empty ROM URL or path".into()));
        }

        let root = self.fetch_document(rom_url).await?;

        let table = root
            .get(rom_path)
            .filter(|v| v.is_object())
            .ok_or_else(|| UrlCacheError::Rom(format!("no table entry for {}", rom_path)))?;

        let action_obj = table.get(action.keyword()).ok_or_else(|| {
            UrlCacheError::Rom(format!("{} has no {} action", rom_path, action.keyword()))
        })?;

        let method = action_obj
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or("GET")
            .to_string();

        // host from the document, else reuse the ROM URL's own origin
        let mut url = match root.get("host").and_then(Value::as_str) {
            Some(host) if !host.is_empty() => host.to_string(),
            _ => self.origin_of(rom_url)?,
        };

        push_url_segment(&mut url, root.get("url").and_then(Value::as_str));
        push_url_segment(&mut url, table.get("url").and_then(Value::as_str));
        push_url_segment(&mut url, action_obj.get("url").and_then(Value::as_str));

        if let Some(query) = action_obj.get("query").and_then(Value::as_array) {
            let mut first = true;
            for pair in query {
                let name = pair.get("name").and_then(Value::as_str).unwrap_or("");
                let value = pair.get("value").and_then(Value::as_str).unwrap_or("");
                if name.is_empty() || value.is_empty() {
                    continue;
                }
                url.push(if first { '?' } else { '&' });
                first = false;
                url.push_str(name);
                url.push('=');
                url.push_str(value);
            }
        }

        Ok(RomInvocation { url, method })
    }

    async fn fetch_document(&self, rom_url: &str) -> Result<Value> {
        let mut result = self.cache.fetch(rom_url, None).await;
        if !result.succeeded() {
            return Err(UrlCacheError::Rom(format!(
                "could not fetch ROM at {}",
                rom_url
            )));
        }

        let path = result
            .local_path
            .clone()
            .ok_or_else(|| UrlCacheError::Rom("fetch produced no local file".into()))?;
        let text = tokio::fs::read_to_string(&path).await?;
        result.release();

        let root: Value = serde_json::from_str(&text)
            .map_err(|e| UrlCacheError::Rom(format!("invalid JSON: {}", e)))?;

        // must be an object with schema 2, else not the rom we are looking for
        if !root.is_object() || !schema_is_v2(&root) {
            return Err(UrlCacheError::Rom("not a romschema 2 document".into()));
        }

        Ok(root)
    }

    fn origin_of(&self, rom_url: &str) -> Result<String> {
        let shape = self
            .cache
            .recognize(rom_url)
            .ok_or_else(|| UrlCacheError::NotAUrl(rom_url.to_string()))?;
        Ok(format!("{}://{}", shape.scheme, shape.authority()))
    }
}

/// `romschema` historically arrives as a string, sometimes as a number.
fn schema_is_v2(root: &Value) -> bool {
    match root.get("romschema") {
        Some(Value::String(s)) => s.trim().parse::<i64>() == Ok(2),
        Some(Value::Number(n)) => n.as_i64() == Some(2),
        _ => false,
    }
}

/// Append a URL segment, skipping a lone `/` onto a `/`-terminated prefix so
/// `"/blah/"` + `"/"` never becomes `"/blah//"`.
fn push_url_segment(dst: &mut String, src: Option<&str>) {
    let Some(src) = src else { return };
    if src.is_empty() {
        return;
    }
    if dst.ends_with('/') && src == "/" {
        return;
    }
    dst.push_str(src);
}
