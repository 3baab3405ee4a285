//! The fetch-transform-accumulate loop over a region catalogue.

use crate::report::regions::Region;
use crate::report::ReportConfig;
use crate::types::daily_frame::DailyLazyFrame;
use crate::types::point::{Point, PointSettings};
use crate::{Meteostat, MeteostatError};
use chrono::NaiveDate;
use log::{error, info, warn};
use polars::prelude::*;
use std::error::Error;
use std::fmt;
use std::future::Future;

/// Column names of the report table, in order.
pub const REPORT_COLUMNS: [&str; 4] = ["Date", "Region", "Temp", "Prcp"];

/// Source columns for the report's measurement columns.
const MEASUREMENTS: [(&str, &str); 2] = [("tavg", "Temp"), ("prcp", "Prcp")];

/// Where the report loop gets daily data for a point from.
pub trait DailySource {
    /// Daily data for `point` over `start..=end` with (at least) the `date`, `tavg`
    /// and `prcp` columns. An empty frame means nothing was measured.
    fn fetch_daily(
        &self,
        point: &Point,
        start: NaiveDate,
        end: NaiveDate,
        settings: &PointSettings,
    ) -> impl Future<Output = Result<DataFrame, MeteostatError>>;
}

impl DailySource for Meteostat {
    async fn fetch_daily(
        &self,
        point: &Point,
        start: NaiveDate,
        end: NaiveDate,
        settings: &PointSettings,
    ) -> Result<DataFrame, MeteostatError> {
        let daily = self
            .daily()
            .point(*point)
            .period(start, end)
            .settings(*settings)
            .call()
            .await?;
        Ok(daily.frame.collect()?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedRegion {
    pub name: String,
    pub rows: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedRegion {
    pub name: String,
    pub reason: String,
}

/// Outcome of the loop: the combined table, if any region returned rows, and per-region results.
#[derive(Debug)]
pub struct RegionReport {
    pub data: Option<DataFrame>,
    pub fetched: Vec<FetchedRegion>,
    pub failed: Vec<FailedRegion>,
}

impl fmt::Display for RegionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Fetch Summary ---")?;
        match &self.data {
            Some(df) => writeln!(
                f,
                "Successfully fetched data for {} region(s), {} rows in total.",
                self.fetched.len(),
                df.height()
            )?,
            None => writeln!(f, "No data was successfully fetched for any region.")?,
        }
        if self.failed.is_empty() {
            write!(f, "No regions encountered fetch/processing issues.")
        } else {
            write!(f, "Regions with fetch/processing issues:")?;
            for failed in &self.failed {
                write!(f, "\n  - {}: {}", failed.name, failed.reason)?;
            }
            Ok(())
        }
    }
}

/// Renders an error with all of its sources, `outer: inner: root`.
pub(crate) fn error_chain(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Fetches every region in order and unions the results.
///
/// A region that fails or returns no rows is recorded in `failed` and the loop moves on.
pub async fn collect_regions<S: DailySource>(
    source: &S,
    regions: &[Region],
    config: &ReportConfig,
) -> PolarsResult<RegionReport> {
    info!(
        "Starting data fetch for {} region(s), {} to {}",
        regions.len(),
        config.start,
        config.end
    );

    let mut frames = Vec::new();
    let mut fetched = Vec::new();
    let mut failed = Vec::new();

    for region in regions {
        info!("Fetching data for {} at {}", region.name, region.point);
        match fetch_region(source, region, config).await {
            Ok(Some(frame)) => {
                info!("Data processed and appended for {} ({} rows)", region.name, frame.height());
                fetched.push(FetchedRegion {
                    name: region.name.clone(),
                    rows: frame.height(),
                });
                frames.push(frame.lazy());
            }
            Ok(None) => {
                warn!("No data returned for {}", region.name);
                failed.push(FailedRegion {
                    name: region.name.clone(),
                    reason: "No data returned".to_string(),
                });
            }
            Err(e) => {
                let reason = error_chain(&e);
                error!("Failed fetching or processing data for {}: {}", region.name, reason);
                failed.push(FailedRegion {
                    name: region.name.clone(),
                    reason,
                });
            }
        }
    }

    let data = if frames.is_empty() {
        None
    } else {
        Some(concat(frames, UnionArgs::default())?.collect()?)
    };

    Ok(RegionReport {
        data,
        fetched,
        failed,
    })
}

/// One region: fetch, skip if empty, project to the report columns.
async fn fetch_region<S: DailySource>(
    source: &S,
    region: &Region,
    config: &ReportConfig,
) -> Result<Option<DataFrame>, MeteostatError> {
    let df = source
        .fetch_daily(&region.point, config.start, config.end, &config.point_settings)
        .await?;
    if df.height() == 0 {
        return Ok(None);
    }
    info!("Fetched {} rows for {}", df.height(), region.name);

    let mut projection = vec![col("date").alias("Date"), lit(region.name.clone()).alias("Region")];
    for (source_column, report_column) in MEASUREMENTS {
        let expr = match df.column(source_column) {
            Ok(column) if column.null_count() < column.len() => col(source_column),
            Ok(_) => {
                info!("Note: '{}' has no values for {}", source_column, region.name);
                col(source_column)
            }
            Err(_) => {
                info!("Note: '{}' column missing for {}", source_column, region.name);
                lit(Null {})
            }
        };
        projection.push(expr.cast(DataType::Float64).alias(report_column));
    }

    let mut daily = DailyLazyFrame::new(df.lazy());
    if config.normalize {
        daily = daily.normalize(config.start, config.end)?;
    }
    Ok(Some(daily.frame.select(projection).collect()?))
}
