//! Multi-region daily weather report: fetch every region, union the rows, export.

pub mod collect;
pub mod export;
pub mod regions;

use crate::report::collect::{collect_regions, DailySource, RegionReport};
use crate::report::export::{write_report, ExportError, ExportOutcome};
use crate::report::regions::Region;
use crate::types::point::PointSettings;
use chrono::NaiveDate;
use log::warn;
use polars::prelude::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

/// Default output file of the report.
pub const DEFAULT_OUTPUT: &str = "Sweden_Weather_Data.xlsx";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to combine region data")]
    Combine(#[from] PolarsError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

/// Settings of one report run.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportConfig {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub output: PathBuf,
    /// Emit one row per calendar day per region, with nulls where nothing was measured.
    pub normalize: bool,
    pub point_settings: PointSettings,
}

impl ReportConfig {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start,
            end,
            output: PathBuf::from(DEFAULT_OUTPUT),
            normalize: false,
            point_settings: PointSettings::default(),
        }
    }
}

/// What a report run produced.
#[derive(Debug)]
pub struct ReportOutcome {
    pub report: RegionReport,
    /// `None` when no region returned data and nothing was written.
    pub export: Option<ExportOutcome>,
}

/// Collects all regions and writes the combined table to `config.output`.
pub async fn run_report<S: DailySource>(
    source: &S,
    regions: &[Region],
    config: &ReportConfig,
) -> Result<ReportOutcome, ReportError> {
    let mut report = collect_regions(source, regions, config).await?;
    let export = match report.data.as_mut() {
        Some(df) => Some(write_report(df, &config.output)?),
        None => {
            warn!("No data was successfully fetched; no file written");
            None
        }
    };
    Ok(ReportOutcome { report, export })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::point::Point;
    use crate::MeteostatError;
    use polars::prelude::*;

    struct OneDay;

    impl DailySource for OneDay {
        async fn fetch_daily(
            &self,
            point: &Point,
            start: NaiveDate,
            _end: NaiveDate,
            _settings: &PointSettings,
        ) -> Result<DataFrame, MeteostatError> {
            if point.lat < 0.0 {
                return Ok(DataFrame::empty());
            }
            Ok(df!(
                "date" => [start],
                "tavg" => [Some(point.lat)],
                "prcp" => [None::<f64>],
            )?)
        }
    }

    fn config(output: PathBuf) -> ReportConfig {
        let day = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        ReportConfig {
            output,
            ..ReportConfig::new(day, day)
        }
    }

    #[test]
    fn test_config_defaults() {
        let day = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        let config = ReportConfig::new(day, day);
        assert_eq!(config.output, PathBuf::from("Sweden_Weather_Data.xlsx"));
        assert!(!config.normalize);
        assert_eq!(config.point_settings, PointSettings::default());
    }

    #[tokio::test]
    async fn test_run_report_writes_spreadsheet() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let output = dir.path().join("weather.xlsx");
        let regions = [
            Region::new("North", Point::new(60.0, 15.0)),
            Region::new("Nowhere", Point::new(-1.0, 15.0)),
        ];
        let outcome = run_report(&OneDay, &regions, &config(output.clone())).await?;
        assert_eq!(outcome.export, Some(ExportOutcome::Spreadsheet(output.clone())));
        assert!(output.is_file());
        assert_eq!(outcome.report.fetched.len(), 1);
        assert_eq!(outcome.report.failed[0].name, "Nowhere");
        Ok(())
    }

    #[tokio::test]
    async fn test_run_report_without_data_writes_nothing() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let output = dir.path().join("weather.xlsx");
        let regions = [Region::new("Nowhere", Point::new(-1.0, 15.0))];
        let outcome = run_report(&OneDay, &regions, &config(output.clone())).await?;
        assert!(outcome.export.is_none());
        assert!(!output.exists());
        Ok(())
    }
}
