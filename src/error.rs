//! Errors raised while scraping the NAP registry or handling the cached csv

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Expected element `{selector}` not found in {page}")]
    MissingElement { selector: String, page: String },

    #[error("Expected column `{0}` not found")]
    MissingColumn(String),

    #[error("Search table has {rows} rows but {links} installations links")]
    LinkCountMismatch { rows: usize, links: usize },

    #[error("Could not read a page count from `{0}`")]
    InvalidPageCount(String),

    #[error("Invalid link `{link}`: {source}")]
    InvalidLink {
        link: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Invalid HTTP header `{0}`")]
    InvalidHeader(String),

    #[error("max_attempts must be at least 1, got {0}")]
    InvalidRetryBound(u32),

    #[error("Failed to parse configuration file: {0}")]
    Config(#[from] toml::de::Error),

    #[error("No cached allocations found at {0}")]
    CacheNotFound(PathBuf),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
