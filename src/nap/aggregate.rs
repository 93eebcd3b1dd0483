//! Merges the scraped installation lists into the final allocations table
//!
//! Within a country the phases are outer joined on the installation identity, so an
//! installation present in several phases ends up as one row carrying every phase's years.
//! Countries are then stacked, the per-phase "Latest Update" columns are collapsed into one,
//! columns are renamed and ordered, and legend rows are dropped.

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{info, warn};

use super::client::HttpGet;
use super::pages::split_url;
use super::search::SearchRow;
use super::NapScraper;
use crate::error::Result;
use crate::html::Cell;
use crate::table::Table;

/// Scraped identity columns and their names in the final table
pub const IDENTITY_COLUMNS: [(&str, &str); 7] = [
    ("Installation ID", "installation_id"),
    ("Installation Name", "installation_name"),
    ("Address City", "installation_city"),
    ("Account Holder Name", "account_holder"),
    ("Account Status", "account_status"),
    ("Permit ID", "permit_id"),
    ("Status", "status"),
];

const UPDATE_COLUMN_MARKER: &str = "Latest Update";
const TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%d/%m/%Y %H:%M:%S"];

impl<C: HttpGet> NapScraper<C> {
    /// Scrapes every installations link in `search_rows` and builds the allocations table
    pub fn build_full_table(&self, search_rows: &[SearchRow]) -> Result<Table> {
        let mut countries: Vec<&Cell> = Vec::new();
        for row in search_rows {
            if !countries.contains(&&row.country) {
                countries.push(&row.country);
            }
        }

        let mut country_tables = Vec::with_capacity(countries.len());
        for (index, country) in countries.iter().enumerate() {
            let label = country.as_deref().unwrap_or("<unknown>");
            let links: Vec<&SearchRow> = search_rows
                .iter()
                .filter(|row| &row.country == *country)
                .collect();
            info!(country = label, phases = links.len(), "Country {}/{}", index + 1, countries.len());

            let mut phases = Vec::with_capacity(links.len());
            for (link_index, row) in links.iter().enumerate() {
                info!(
                    country = label,
                    phase = row.phase.as_deref().unwrap_or("<unknown>"),
                    "Link {}/{}",
                    link_index + 1,
                    links.len()
                );
                let (base_url, params) = split_url(row.installations_link.as_str())?;
                phases.push(self.fetch_all_pages(&base_url, params)?);
            }
            country_tables.push(((*country).clone(), merge_phases(phases)?));
        }

        finish_table(country_tables)
    }
}

/// Outer joins one country's phase tables on the identity columns
pub fn merge_phases(phases: Vec<Table>) -> Result<Table> {
    let keys: Vec<&str> = IDENTITY_COLUMNS.iter().map(|(scraped, _)| *scraped).collect();
    let mut merged = Table::default();
    for phase in phases {
        if phase.columns().is_empty() {
            continue;
        }
        merged = if merged.is_empty() {
            phase
        } else {
            merged.outer_join(&phase, &keys)?
        };
    }
    Ok(merged)
}

/// Stacks the country tables and shapes them into the final column layout
pub fn finish_table(country_tables: Vec<(Cell, Table)>) -> Result<Table> {
    let tagged = country_tables
        .into_iter()
        .map(|(country, mut table)| {
            let rows = table.len();
            table.set_column("country", vec![country; rows]);
            table
        })
        .collect();
    let mut allocations = Table::concat(tagged);

    let update_columns: Vec<String> = allocations
        .columns()
        .iter()
        .filter(|column| column.contains(UPDATE_COLUMN_MARKER))
        .cloned()
        .collect();
    let update_values = update_columns
        .iter()
        .map(|column| allocations.drop_column(column))
        .collect::<Result<Vec<_>>>()?;
    // A blank result is stored as None, which is also what reading the csv back gives
    let latest: Vec<Cell> = (0..allocations.len())
        .map(|row| {
            Some(latest_update(
                update_values.iter().map(|values| values[row].as_deref()),
            ))
            .filter(|latest| !latest.is_empty())
        })
        .collect();
    warn_on_unrecognised_timestamps(&latest);
    allocations.set_column("latest_update", latest);

    allocations.rename(&IDENTITY_COLUMNS);

    let mut ordered: Vec<String> = std::iter::once("country")
        .chain(IDENTITY_COLUMNS.iter().map(|(_, renamed)| *renamed))
        .chain(std::iter::once("latest_update"))
        .map(str::to_string)
        .collect();
    let mut year_columns: Vec<String> = allocations
        .columns()
        .iter()
        .filter(|column| !ordered.contains(column))
        .cloned()
        .collect();
    year_columns.sort();
    ordered.extend(year_columns);
    let mut allocations = allocations.select(&ordered)?;

    let dropped = allocations.retain_rows("permit_id", |permit| {
        !permit.map_or(false, |permit| permit.contains('*'))
    })?;
    info!(rows = allocations.len(), legend_rows_dropped = dropped, "Allocations table assembled");
    Ok(allocations)
}

/// Largest of the per-phase update values, a blank or missing value counting as `""`
pub fn latest_update<'a>(values: impl IntoIterator<Item = Option<&'a str>>) -> String {
    values
        .into_iter()
        .map(|value| value.unwrap_or(""))
        .max()
        .unwrap_or("")
        .to_string()
}

/// The update columns are compared as text, which only orders correctly for ISO-like timestamps
fn warn_on_unrecognised_timestamps(values: &[Cell]) {
    let unrecognised = values
        .iter()
        .flatten()
        .filter(|value| !value.is_empty() && !is_timestamp(value))
        .count();
    if unrecognised > 0 {
        warn!(unrecognised, "Some latest_update values are not recognised timestamps");
    }
}

fn is_timestamp(value: &str) -> bool {
    TIMESTAMP_FORMATS
        .iter()
        .any(|format| NaiveDateTime::parse_from_str(value, format).is_ok())
        || NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}
