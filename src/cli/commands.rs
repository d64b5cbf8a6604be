use std::sync::Arc;

use crate::app::{Result, UrlCacheError};
use crate::cache::UrlCache;
use crate::domain::FetchOutcome;
use crate::rom::{RomAction, RomResolver};

pub async fn fetch_url(cache: &UrlCache, url: &str, post: Option<&str>, cat: bool) -> Result<()> {
    let mut result = cache.fetch(url, post).await;

    match &result.outcome {
        FetchOutcome::Fetched {
            status,
            content_type,
            duration_ms,
        } => {
            let path = result.local_path.as_ref().expect("fetched result has a path");
            println!("{} -> {}", url, path.display());
            println!(
                "  HTTP {} {} in {} ms",
                status,
                content_type.as_deref().unwrap_or("(no content type)"),
                duration_ms
            );
            if cat {
                let body = std::fs::read_to_string(path)?;
                print!("{}", body);
            }
        }
        FetchOutcome::CacheHit { duration_ms } => {
            let path = result.local_path.as_ref().expect("cache hit has a path");
            println!("{} -> {} (not modified)", url, path.display());
            println!("  HTTP 304 in {} ms", duration_ms);
            if cat {
                let body = std::fs::read_to_string(path)?;
                print!("{}", body);
            }
        }
        FetchOutcome::Failed { reason, .. } => {
            let message = reason.to_string();
            result.release();
            return Err(UrlCacheError::Other(format!("{}: {}", url, message)));
        }
    }

    result.release();
    Ok(())
}

pub async fn resolve_rom(
    cache: Arc<UrlCache>,
    rom_url: &str,
    rom_path: &str,
    action: &str,
) -> Result<()> {
    let action = RomAction::parse(action)
        .ok_or_else(|| UrlCacheError::Config(format!("unknown action: {}", action)))?;

    let resolver = RomResolver::new(cache);
    let invocation = resolver.resolve(rom_url, rom_path, action).await?;

    println!("url    {}", invocation.url);
    println!("method {}", invocation.method);
    Ok(())
}
