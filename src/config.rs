//! Settings for the scraper, read from a toml file
//!
//! Every field has a default so a missing file, or a file that only sets a couple of values,
//! still produces a complete configuration.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub site: SiteConfig,
    pub http: HttpConfig,
    pub data_dir: PathBuf,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SiteConfig {
    /// NAP search endpoint
    pub search_url: String,
    /// Base the "Installations linked" hrefs are resolved against
    pub link_root: String,
    /// Registry code used when only the country selector is needed
    pub default_registry: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub user_agent: String,
    pub headers: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            site: SiteConfig::default(),
            http: HttpConfig::default(),
            data_dir: PathBuf::from("data"),
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        SiteConfig {
            search_url: "https://ec.europa.eu/clima/ets/nap.do".to_string(),
            link_root: "https://ec.europa.eu/".to_string(),
            default_registry: "AT".to_string(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            timeout_secs: 60,
            max_attempts: 5,
            user_agent: concat!("eutl_nap/", env!("CARGO_PKG_VERSION")).to_string(),
            headers: BTreeMap::new(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Reads the config file at `path`, using the defaults when it does not exist
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(text) => Self::from_toml(&text),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                Ok(Self::default())
            }
            Err(err) => Err(err.into()),
        }
    }
}
