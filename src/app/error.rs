use thiserror::Error;

#[derive(Error, Debug)]
pub enum UrlCacheError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not a fetchable URL: {0}")]
    NotAUrl(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("ROM document rejected: {0}")]
    Rom(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, UrlCacheError>;
