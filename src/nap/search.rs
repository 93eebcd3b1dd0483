//! Country search pages: registry codes and the per-phase allocation tables of each country

use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use super::client::{HttpGet, QueryParams};
use super::{NapScraper, INSTALLATIONS_LINK_TEXT, REGISTRY_SELECT_NAME, SEARCH_TABLE_ID};
use crate::error::{Error, Result};
use crate::html::{element_text, table_by_id, table_grid, Cell};
use crate::table::Table;

/// Header rows above the column names in the search results table
const SEARCH_HEADER_ROWS: usize = 2;
/// Trailing link columns (details, installations, history)
const SEARCH_ACTION_COLUMNS: usize = 3;

const SEARCH_COLUMNS: [(&str, &str); 4] = [
    ("National Administrator", "country"),
    ("EU ETS Phase", "phase"),
    ("For issuance to not new entrants", "non_new_entrants"),
    ("From NER", "new_entrants_reserve"),
];

lazy_static! {
    static ref INSTALLATIONS_LINK_REGEX: Regex = Regex::new(&regex::escape(INSTALLATIONS_LINK_TEXT))
        .expect("INSTALLATIONS_LINK_REGEX to compile");
}

/// One allocation table of one country, i.e. one phase
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRow {
    pub country: Cell,
    pub phase: Cell,
    pub non_new_entrants: Cell,
    pub new_entrants_reserve: Cell,
    pub installations_link: Url,
}

impl SearchRow {
    pub fn has_nulls(&self) -> bool {
        self.country.is_none()
            || self.phase.is_none()
            || self.non_new_entrants.is_none()
            || self.new_entrants_reserve.is_none()
    }
}

impl<C: HttpGet> NapScraper<C> {
    /// Raw search results page for one registry, all phases
    pub fn fetch_country_search(&self, country_code: &str) -> Result<String> {
        let params: QueryParams = [
            ("languageCode", "en"),
            ("nap.registryCodeArray", country_code),
            ("periodCode", "-1"),
            ("search", "Search"),
            ("currentSortSettings", ""),
        ]
        .into_iter()
        .collect();
        self.client.get_text(&self.search_url, &params)
    }

    /// Registry code and country name pairs, in the order the search form offers them
    pub fn fetch_country_codes(&self) -> Result<Vec<(String, String)>> {
        let html = self.fetch_country_search(&self.default_registry)?;
        parse_country_codes(&html)
    }

    /// Search rows for every registry in `codes`, in the given order
    pub fn collect_search_rows(&self, codes: &[(String, String)]) -> Result<Vec<SearchRow>> {
        let mut rows = Vec::new();
        for (index, (code, name)) in codes.iter().enumerate() {
            if code.trim().is_empty() {
                debug!(name = %name, "Skipping registry option without a code");
                continue;
            }
            info!(code = %code, country = %name, "Searching registry {}/{}", index + 1, codes.len());
            let html = self.fetch_country_search(code)?;
            rows.extend(parse_search_table(&html, &self.link_root)?);
        }

        if rows.iter().any(SearchRow::has_nulls) {
            warn!("There are null values present in the search results");
        }
        Ok(rows)
    }
}

/// Options of the registry selector in document order
///
/// A code offered twice keeps its first position and the later name.
pub fn parse_country_codes(html: &str) -> Result<Vec<(String, String)>> {
    let document = Html::parse_document(html);
    let selects = Selector::parse("select").expect("select selector to compile");
    let options = Selector::parse("option").expect("option selector to compile");

    let select = document
        .select(&selects)
        .find(|select| select.value().attr("name") == Some(REGISTRY_SELECT_NAME))
        .ok_or_else(|| Error::MissingElement {
            selector: format!("select[name=\"{REGISTRY_SELECT_NAME}\"]"),
            page: "search form".to_string(),
        })?;

    let mut codes: Vec<(String, String)> = Vec::new();
    for option in select.select(&options) {
        let name = element_text(option);
        let code = option.value().attr("value").map_or_else(|| name.clone(), str::to_string);
        match codes.iter_mut().find(|(known, _)| *known == code) {
            Some(entry) => entry.1 = name,
            None => codes.push((code, name)),
        }
    }
    Ok(codes)
}

/// Reads the allocation tables listed on a country's search page
///
/// Row `i` gets the `i`-th "Installations linked" anchor of the page as its link, so the two
/// counts must agree.
pub fn parse_search_table(html: &str, link_root: &Url) -> Result<Vec<SearchRow>> {
    let document = Html::parse_document(html);
    let table = table_by_id(&document, SEARCH_TABLE_ID).ok_or_else(|| Error::MissingElement {
        selector: format!("table#{SEARCH_TABLE_ID}"),
        page: "search results".to_string(),
    })?;

    let mut grid = table_grid(table);
    if grid.len() <= SEARCH_HEADER_ROWS {
        return Err(Error::MissingElement {
            selector: format!("table#{SEARCH_TABLE_ID} column names row"),
            page: "search results".to_string(),
        });
    }
    let mut body = grid.split_off(SEARCH_HEADER_ROWS);
    for row in body.iter_mut() {
        let width = row.len().saturating_sub(SEARCH_ACTION_COLUMNS);
        row.truncate(width);
    }
    let header = body.remove(0);
    let mut results = Table::from_header_and_rows(header, body);
    results.rename(&SEARCH_COLUMNS);

    let links = installations_links(&document, link_root)?;
    if links.len() != results.len() {
        return Err(Error::LinkCountMismatch {
            rows: results.len(),
            links: links.len(),
        });
    }

    let country = results.column("country")?;
    let phase = results.column("phase")?;
    let non_new_entrants = results.column("non_new_entrants")?;
    let new_entrants_reserve = results.column("new_entrants_reserve")?;
    Ok(links
        .into_iter()
        .enumerate()
        .map(|(row, installations_link)| SearchRow {
            country: country[row].map(str::to_string),
            phase: phase[row].map(str::to_string),
            non_new_entrants: non_new_entrants[row].map(str::to_string),
            new_entrants_reserve: new_entrants_reserve[row].map(str::to_string),
            installations_link,
        })
        .collect())
}

/// Hrefs of the "Installations linked" anchors in document order, resolved against `link_root`
fn installations_links(document: &Html, link_root: &Url) -> Result<Vec<Url>> {
    let anchors = Selector::parse("a").expect("anchor selector to compile");
    document
        .select(&anchors)
        .filter(|anchor| INSTALLATIONS_LINK_REGEX.is_match(&element_text(*anchor)))
        .map(|anchor| resolve_href(anchor, link_root))
        .collect()
}

fn resolve_href(anchor: ElementRef, link_root: &Url) -> Result<Url> {
    let href = anchor.value().attr("href").ok_or_else(|| Error::MissingElement {
        selector: "a[href]".to_string(),
        page: "search results".to_string(),
    })?;
    link_root.join(href.trim()).map_err(|source| Error::InvalidLink {
        link: href.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::nap::fake::FakeSite;

    const SEARCH_PAGE: &str = include_str!("../../tests/fixtures/nap_search.html");

    fn link_root() -> Url {
        Url::parse("https://ec.europa.eu/").unwrap()
    }

    /// Row `i` gets the `i`-th installations anchor of the saved page
    #[test]
    fn rows_line_up_with_installation_links() {
        let rows = parse_search_table(SEARCH_PAGE, &link_root()).unwrap();
        let anchors = SEARCH_PAGE
            .matches("Installations linked to this Allocation Table")
            .count();
        assert_eq!(rows.len(), anchors);
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].country.as_deref(), Some("Austria"));
        assert_eq!(rows[0].phase.as_deref(), Some("Phase 1 (2005-2007)"));
        assert_eq!(rows[0].non_new_entrants.as_deref(), Some("97549596"));
        assert_eq!(rows[0].new_entrants_reserve.as_deref(), Some("990000"));
        assert_eq!(
            rows[0].installations_link.as_str(),
            "https://ec.europa.eu/clima/ets/napInstallation.do?languageCode=en&nap.registryCodeArray=AT&periodCode=0&search=Search"
        );
        assert_eq!(rows[1].phase.as_deref(), Some("Phase 2 (2008-2012)"));
        assert!(rows[1].installations_link.as_str().contains("periodCode=1"));
    }

    /// Empty cells become `None` and are reported by `has_nulls`
    #[test]
    fn blank_cells_are_nulls() {
        let rows = parse_search_table(SEARCH_PAGE, &link_root()).unwrap();
        assert!(!rows[0].has_nulls());
        assert_eq!(rows[1].new_entrants_reserve, None);
        assert!(rows[1].has_nulls());
    }

    /// A page without the results table is an error, not an empty list
    #[test]
    fn missing_results_table_is_an_error() {
        let html = "<html><body><p>No results</p></body></html>";
        assert!(matches!(
            parse_search_table(html, &link_root()),
            Err(Error::MissingElement { .. })
        ));
    }

    /// One missing anchor is caught rather than shifting every link
    #[test]
    fn link_count_must_match_rows() {
        let html = SEARCH_PAGE.replacen(
            "Installations linked to this Allocation Table</a>",
            "Installations</a>",
            1,
        );
        assert!(matches!(
            parse_search_table(&html, &link_root()),
            Err(Error::LinkCountMismatch { rows: 2, links: 1 })
        ));
    }

    /// Codes and names come from the registry selector options
    #[test]
    fn country_codes_from_selector() {
        let codes = parse_country_codes(SEARCH_PAGE).unwrap();
        assert_eq!(
            codes,
            vec![
                ("AT".to_string(), "Austria".to_string()),
                ("BE".to_string(), "Belgium".to_string()),
                ("GB".to_string(), "United Kingdom".to_string()),
            ]
        );
    }

    /// Registries are visited in the order the site lists them, not sorted by code
    #[test]
    fn country_codes_keep_document_order() {
        let html = r#"<select name="nap.registryCodeArray">
            <option value="GB">United Kingdom</option>
            <option value="AT">Austria</option>
            <option value="">All</option>
            <option value="GB">Great Britain</option>
        </select>"#;
        let codes = parse_country_codes(html).unwrap();
        let order: Vec<&str> = codes.iter().map(|(code, _)| code.as_str()).collect();
        assert_eq!(order, vec!["GB", "AT", ""]);
        assert_eq!(codes[0].1, "Great Britain");
    }

    /// One search per non-blank code, in the order given, with the fixed parameters
    #[test]
    fn search_requests_carry_the_registry_code() {
        let search_url = SiteConfig::default().search_url;
        let mut site = FakeSite::new();
        site.serve(&search_url, &[("nap.registryCodeArray", "AT")], SEARCH_PAGE);
        site.serve(&search_url, &[("nap.registryCodeArray", "BE")], SEARCH_PAGE);
        let scraper = NapScraper::new(site, &SiteConfig::default(), 5).unwrap();

        let codes: Vec<(String, String)> = [("BE", "Belgium"), ("", "All"), ("AT", "Austria")]
            .into_iter()
            .map(|(code, name)| (code.to_string(), name.to_string()))
            .collect();
        let rows = scraper.collect_search_rows(&codes).unwrap();
        assert_eq!(rows.len(), 4);

        let requests = scraper.client().requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].1.get("nap.registryCodeArray"), Some("BE"));
        let (url, params) = &requests[1];
        assert_eq!(url, &search_url);
        assert_eq!(params.get("nap.registryCodeArray"), Some("AT"));
        assert_eq!(params.get("periodCode"), Some("-1"));
        assert_eq!(params.get("languageCode"), Some("en"));
        assert_eq!(params.get("currentSortSettings"), Some(""));
    }
}
