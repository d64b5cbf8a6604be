use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use urlcache::cache::UrlCache;
use urlcache::cli::{commands, Cli, Commands};
use urlcache::config::CacheConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => CacheConfig::from_file(path)?,
        None => CacheConfig::default(),
    };
    if let Some(dir) = &cli.cache_dir {
        config.base_dir = dir.clone();
    }

    let cache = Arc::new(UrlCache::new(config)?);

    match cli.command {
        Commands::Fetch { url, post, cat } => {
            commands::fetch_url(&cache, &url, post.as_deref(), cat).await?;
        }
        Commands::Resolve {
            rom_url,
            rom_path,
            action,
        } => {
            commands::resolve_rom(cache.clone(), &rom_url, &rom_path, &action).await?;
        }
    }

    Ok(())
}
