//! Scrapes the EU ETS National Allocation Plan registry into a table of installation level
//! allowance allocations, cached as a csv file.

pub mod config;
pub mod error;
pub mod html;
pub mod nap;
pub mod store;
pub mod table;

pub use config::Config;
pub use error::{Error, Result};
pub use nap::NapScraper;
pub use store::{load_cached, load_or_build};
pub use table::Table;
