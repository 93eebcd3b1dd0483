//! Cached allocations csv: reuse it, or scrape the site again and overwrite it

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Error, Result};
use crate::nap::client::HttpGet;
use crate::nap::NapScraper;
use crate::table::Table;

pub const CACHE_FILE: &str = "installation_allocations.csv";

pub fn cache_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CACHE_FILE)
}

pub fn load_cached(data_dir: &Path) -> Result<Table> {
    let path = cache_path(data_dir);
    if !path.is_file() {
        return Err(Error::CacheNotFound(path));
    }
    info!(path = %path.display(), "Loading cached allocations");
    Table::read_csv(&path)
}

/// Returns the allocations table, scraping the whole registry first when `redownload` is set
pub fn load_or_build<C: HttpGet>(
    scraper: &NapScraper<C>,
    data_dir: &Path,
    redownload: bool,
) -> Result<Table> {
    if !redownload {
        return load_cached(data_dir);
    }

    fs::create_dir_all(data_dir)?;
    let codes = scraper.fetch_country_codes()?;
    info!(registries = codes.len(), "Found registries");
    let search_rows = scraper.collect_search_rows(&codes)?;
    let allocations = scraper.build_full_table(&search_rows)?;

    let path = cache_path(data_dir);
    allocations.write_csv(&path)?;
    info!(path = %path.display(), rows = allocations.len(), "Wrote allocations");
    Ok(allocations)
}
