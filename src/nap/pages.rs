//! Paginated installation lists behind each "Installations linked" link

use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use super::client::{self, HttpGet, QueryParams};
use super::{parse_link, NapScraper, ALLOCATION_TABLE_ID, LAST_PAGE_INPUT_NAME};
use crate::error::{Error, Result};
use crate::html::{table_by_id, table_grid};
use crate::table::Table;

const ALLOCATION_HEADER_ROWS: usize = 2;
const OPTIONS_COLUMN: &str = "Options";

/// Splits a link into its address and query parameters
///
/// Only the first value of a repeated parameter is kept.
pub fn split_url(link: &str) -> Result<(Url, QueryParams)> {
    let mut base = parse_link(link)?;
    let mut params = QueryParams::new();
    for (key, value) in base.query_pairs() {
        if params.get(&key).is_none() {
            params.set(&key, value.into_owned());
        }
    }
    base.set_query(None);
    base.set_fragment(None);
    Ok((base, params))
}

/// Number of result pages announced by the page, 1 when it has no pagination controls
pub fn parse_page_count(html: &str) -> Result<usize> {
    let document = Html::parse_document(html);
    let inputs = Selector::parse("input").expect("input selector to compile");
    let last_page = document
        .select(&inputs)
        .find(|input| input.value().attr("name") == Some(LAST_PAGE_INPUT_NAME));

    match last_page {
        None => Ok(1),
        Some(input) => {
            let value = input.value().attr("value").unwrap_or_default();
            value
                .trim()
                .parse::<usize>()
                .map_err(|_| Error::InvalidPageCount(value.to_string()))
        }
    }
}

/// One page of installations, with the column names row as header and the options column gone
pub fn parse_allocation_table(html: &str) -> Result<Table> {
    let document = Html::parse_document(html);
    let table = table_by_id(&document, ALLOCATION_TABLE_ID).ok_or_else(|| Error::MissingElement {
        selector: format!("table#{ALLOCATION_TABLE_ID}"),
        page: "installations list".to_string(),
    })?;

    let mut grid = table_grid(table);
    if grid.len() <= ALLOCATION_HEADER_ROWS {
        return Err(Error::MissingElement {
            selector: format!("table#{ALLOCATION_TABLE_ID} column names row"),
            page: "installations list".to_string(),
        });
    }
    let mut body = grid.split_off(ALLOCATION_HEADER_ROWS);
    let header = body.remove(0);
    let mut page = Table::from_header_and_rows(header, body);
    page.drop_column(OPTIONS_COLUMN)?;
    Ok(page)
}

impl<C: HttpGet> NapScraper<C> {
    pub fn count_pages(&self, base_url: &Url, params: &QueryParams) -> Result<usize> {
        let html = self.client.get_text(base_url, params)?;
        parse_page_count(&html)
    }

    /// GET with the configured number of attempts
    pub fn fetch_with_retry(&self, base_url: &Url, params: &QueryParams) -> Result<String> {
        client::fetch_with_retry(&self.client, base_url, params, self.max_attempts)
    }

    /// Every page of one installations list, stacked in page order
    pub fn fetch_all_pages(&self, base_url: &Url, mut params: QueryParams) -> Result<Table> {
        let page_count = self.count_pages(base_url, &params)?;
        params.set("nextList", "Next");

        let mut pages = Vec::with_capacity(page_count);
        for page_number in 0..page_count {
            params.set("resultList.currentPageNumber", page_number.to_string());
            debug!(url = %base_url, page = page_number + 1, page_count, "Fetching installations page");
            let html = self.fetch_with_retry(base_url, &params)?;
            pages.push(parse_allocation_table(&html)?);
        }
        Ok(Table::concat(pages))
    }
}
