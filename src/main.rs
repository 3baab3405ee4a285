use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use regional_weather::report::export::ExportOutcome;
use regional_weather::report::regions::{load_regions, sweden_regions};
use regional_weather::report::{run_report, ReportConfig, DEFAULT_OUTPUT};
use regional_weather::{InterpolationMethod, Meteostat, PointSettings};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Method {
    /// Per day, take the value of the best ranked station that has one
    Nearest,
    /// Per day, average all stations weighted by their score
    Weighted,
}

impl From<Method> for InterpolationMethod {
    fn from(value: Method) -> Self {
        match value {
            Method::Nearest => InterpolationMethod::Nearest,
            Method::Weighted => InterpolationMethod::Weighted,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "regional-weather")]
#[command(about = "Collect daily temperature and precipitation for named regions into one spreadsheet", long_about = None)]
struct Cli {
    /// Start date (YYYY-MM-DD)
    #[arg(short, long, default_value = "2022-01-01")]
    start: String,

    /// End date (YYYY-MM-DD), inclusive
    #[arg(short, long, default_value = "2025-03-24")]
    end: String,

    /// Output file; falls back to CSV next to it if the spreadsheet cannot be written
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// JSON region list to use instead of the built-in Swedish regions
    #[arg(short, long)]
    regions: Option<PathBuf>,

    /// Directory for the station catalogue and daily data cache
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Emit a row for every day of the period, empty where nothing was measured
    #[arg(long)]
    normalize: bool,

    /// How to combine the stations around a region
    #[arg(short, long, value_enum, default_value_t = Method::Nearest)]
    method: Method,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let start = NaiveDate::parse_from_str(&cli.start, "%Y-%m-%d")
        .context("Invalid start date format. Use YYYY-MM-DD")?;
    let end = NaiveDate::parse_from_str(&cli.end, "%Y-%m-%d")
        .context("Invalid end date format. Use YYYY-MM-DD")?;
    if end < start {
        anyhow::bail!("End date {end} is before start date {start}");
    }

    let regions = match &cli.regions {
        Some(path) => load_regions(path)
            .with_context(|| format!("Could not load regions from '{}'", path.display()))?,
        None => sweden_regions(),
    };

    let client = Meteostat::configure()
        .maybe_cache_folder(cli.cache_dir)
        .build()
        .await
        .context("Could not initialise the Meteostat client")?;

    let config = ReportConfig {
        output: cli.output,
        normalize: cli.normalize,
        point_settings: PointSettings {
            method: cli.method.into(),
            ..PointSettings::default()
        },
        ..ReportConfig::new(start, end)
    };

    let outcome = run_report(&client, &regions, &config)
        .await
        .context("Could not produce the weather report")?;

    println!();
    println!("{}", outcome.report);
    match outcome.export {
        Some(ExportOutcome::Spreadsheet(path)) => {
            println!("Data saved to spreadsheet '{}'", path.display())
        }
        Some(ExportOutcome::Csv(path)) => println!("Data saved as CSV to '{}'", path.display()),
        None => println!("No data to save."),
    }

    Ok(())
}
