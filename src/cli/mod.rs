pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "urlcache")]
#[command(about = "Fetch and cache remote resources over HTTP(S)", long_about = None)]
pub struct Cli {
    /// Cache directory (defaults to the platform cache dir)
    #[arg(short = 'd', long, global = true)]
    pub cache_dir: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short = 'f', long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch a URL into the cache and print the local file path
    Fetch {
        /// URL to fetch
        url: String,

        /// POST payload as pre-formatted key=value&key=value pairs
        #[arg(short, long)]
        post: Option<String>,

        /// Print the fetched content after the path
        #[arg(long)]
        cat: bool,
    },
    /// Resolve a remote operations map entry to a URL and method
    Resolve {
        /// URL of the ROM document
        rom_url: String,

        /// Table path inside the document
        rom_path: String,

        /// Operation: select, insert, update, or delete
        #[arg(short, long, default_value = "select")]
        action: String,
    },
}
