use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use eutl_nap::{load_or_build, Config, NapScraper};

/// Download EU ETS installation allocations from the NAP registry
#[derive(Parser, Debug)]
#[command(name = "eutl_nap", version)]
struct Cli {
    /// Configuration file, defaults are used when it does not exist
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Directory holding installation_allocations.csv (overrides the config file)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Scrape the registry again instead of reading the cached csv
    #[arg(short, long)]
    redownload: bool,

    /// -v for debug, -vv for trace
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data_dir.clone());

    let scraper = NapScraper::from_config(&config).context("Failed to set up HTTP client")?;
    let allocations = load_or_build(&scraper, &data_dir, cli.redownload).with_context(|| {
        format!("Failed to get installation allocations in {}", data_dir.display())
    })?;

    println!(
        "{} installations, {} columns",
        allocations.len(),
        allocations.columns().len()
    );
    Ok(())
}
