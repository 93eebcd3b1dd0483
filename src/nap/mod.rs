//! Module for scraping the EU ETS National Allocation Plan (NAP) pages
//!
//! The registry lists, per country, one allocation table per trading phase. Each of those links
//! to a paginated list of installations with their yearly allowance allocations. The scraper
//! walks country → phase → page and stitches the fragments back into one table.

pub mod aggregate;
pub mod client;
pub mod pages;
pub mod search;

#[cfg(test)]
pub(crate) mod fake;

use url::Url;

use crate::config::{Config, SiteConfig};
use crate::error::{Error, Result};
use client::{BlockingClient, HttpGet};

pub use aggregate::latest_update;
pub use client::{fetch_with_retry, QueryParams};
pub use pages::{parse_allocation_table, parse_page_count, split_url};
pub use search::{parse_country_codes, parse_search_table, SearchRow};

pub const SEARCH_TABLE_ID: &str = "tblNapSearchResult";
pub const ALLOCATION_TABLE_ID: &str = "tblNapList";
pub const REGISTRY_SELECT_NAME: &str = "nap.registryCodeArray";
pub const LAST_PAGE_INPUT_NAME: &str = "resultList.lastPageNumber";
pub const INSTALLATIONS_LINK_TEXT: &str = "Installations linked to this Allocation Table";

/// Scraper bound to one HTTP client and site configuration
pub struct NapScraper<C> {
    client: C,
    search_url: Url,
    link_root: Url,
    default_registry: String,
    max_attempts: u32,
}

impl<C: HttpGet> NapScraper<C> {
    pub fn new(client: C, site: &SiteConfig, max_attempts: u32) -> Result<Self> {
        Ok(Self {
            client,
            search_url: parse_link(&site.search_url)?,
            link_root: parse_link(&site.link_root)?,
            default_registry: site.default_registry.clone(),
            max_attempts,
        })
    }

    pub fn client(&self) -> &C {
        &self.client
    }
}

impl NapScraper<BlockingClient> {
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = BlockingClient::new(&config.http)?;
        Self::new(client, &config.site, config.http.max_attempts)
    }
}

pub(crate) fn parse_link(link: &str) -> Result<Url> {
    Url::parse(link).map_err(|source| Error::InvalidLink {
        link: link.to_string(),
        source,
    })
}
