//! Combines the daily series of several stations into the series of a single point.

use crate::types::point::InterpolationMethod;
use crate::weather_data::data_loader::{daily_schema, DAILY_COLUMNS};
use polars::prelude::*;

const RANK_COLUMN: &str = "_rank";
const SCORE_COLUMN: &str = "_score";

/// Columns shifted when a station's temperatures are adapted to the point altitude.
pub const TEMPERATURE_COLUMNS: [&str; 3] = ["tavg", "tmin", "tmax"];

/// The daily series of one station, already restricted to the period of interest.
pub struct StationSeries {
    pub frame: LazyFrame,
    /// Position in the ranking, 0 is the best station.
    pub rank: u32,
    pub score: f64,
    /// Added to every temperature column when set.
    pub temperature_offset: Option<f64>,
}

/// Columns a weighted mean makes no sense for. Wind direction is a bearing.
const UNWEIGHTED_COLUMNS: [&str; 1] = ["wdir"];

fn measurement_columns() -> impl Iterator<Item = &'static str> {
    DAILY_COLUMNS.into_iter().filter(|name| *name != "date")
}

/// The first non-null value of `name` in station rank order.
fn first_by_rank(name: &str) -> Expr {
    col(name)
        .sort_by([col(RANK_COLUMN)], SortMultipleOptions::default())
        .drop_nulls()
        .first()
        .alias(name)
}

/// Merges station series into one frame with one row per date and the daily schema.
///
/// With [`InterpolationMethod::Nearest`] each column takes the first non-null value in
/// rank order. With [`InterpolationMethod::Weighted`] each column is the score-weighted
/// mean of the non-null values, except wind direction, which is taken as with `Nearest`.
pub fn interpolate(
    series: Vec<StationSeries>,
    method: InterpolationMethod,
) -> PolarsResult<LazyFrame> {
    if series.is_empty() {
        return Ok(DataFrame::empty_with_schema(&daily_schema()).lazy());
    }

    let frames: Vec<LazyFrame> = series
        .into_iter()
        .map(|s| {
            let mut frame = s.frame.select(DAILY_COLUMNS.map(col)).with_columns([
                lit(s.rank).alias(RANK_COLUMN),
                lit(s.score).alias(SCORE_COLUMN),
            ]);
            if let Some(offset) = s.temperature_offset {
                frame = frame.with_columns(
                    TEMPERATURE_COLUMNS.map(|name| (col(name) + lit(offset)).alias(name)),
                );
            }
            frame
        })
        .collect();

    let combined = concat(frames, UnionArgs::default())?;

    let aggregations: Vec<Expr> = match method {
        InterpolationMethod::Nearest => measurement_columns().map(first_by_rank).collect(),
        InterpolationMethod::Weighted => measurement_columns()
            .map(|name| {
                if UNWEIGHTED_COLUMNS.contains(&name) {
                    return first_by_rank(name);
                }
                let numerator = (col(name) * col(SCORE_COLUMN)).sum();
                let denominator = col(SCORE_COLUMN).filter(col(name).is_not_null()).sum();
                // All contributing stations sit on the radius edge: fall back to a plain mean.
                when(denominator.clone().gt(lit(0.0)))
                    .then(numerator / denominator)
                    .otherwise(col(name).mean())
                    .alias(name)
            })
            .collect(),
    };

    Ok(combined
        .group_by([col("date")])
        .agg(aggregations)
        .sort(["date"], SortMultipleOptions::default())
        .select(DAILY_COLUMNS.map(col)))
}


#[cfg(test)]
mod tests {
    use super::test_support::daily_frame;
    use super::*;
    use chrono::NaiveDate;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 1, day).unwrap()
    }

    fn two_stations(offset: Option<f64>) -> Vec<StationSeries> {
        vec![
            StationSeries {
                frame: daily_frame(&[(d(1), Some(1.0), None), (d(2), None, Some(2.0))]),
                rank: 0,
                score: 0.75,
                temperature_offset: offset,
            },
            StationSeries {
                frame: daily_frame(&[
                    (d(1), Some(3.0), Some(4.0)),
                    (d(2), Some(5.0), Some(6.0)),
                    (d(3), Some(7.0), None),
                ]),
                rank: 1,
                score: 0.25,
                temperature_offset: None,
            },
        ]
    }

    #[test]
    fn test_nearest_takes_first_non_null_in_rank_order() -> PolarsResult<()> {
        let df = interpolate(two_stations(None), InterpolationMethod::Nearest)?.collect()?;
        assert_eq!(df.height(), 3);
        assert_eq!(df.get_column_names(), DAILY_COLUMNS);

        let tavg: Vec<Option<f64>> = df.column("tavg")?.f64()?.into_iter().collect();
        let prcp: Vec<Option<f64>> = df.column("prcp")?.f64()?.into_iter().collect();
        assert_eq!(tavg, [Some(1.0), Some(5.0), Some(7.0)]);
        assert_eq!(prcp, [Some(4.0), Some(2.0), None]);
        Ok(())
    }

    #[test]
    fn test_weighted_mean_ignores_nulls() -> PolarsResult<()> {
        let df = interpolate(two_stations(None), InterpolationMethod::Weighted)?.collect()?;
        let tavg: Vec<Option<f64>> = df.column("tavg")?.f64()?.into_iter().collect();
        assert!((tavg[0].unwrap() - 1.5).abs() < 1e-12);
        assert!((tavg[1].unwrap() - 5.0).abs() < 1e-12);
        assert!((tavg[2].unwrap() - 7.0).abs() < 1e-12);
        let snow = df.column("snow")?.f64()?;
        assert_eq!(snow.null_count(), 3);
        Ok(())
    }

    #[test]
    fn test_weighted_keeps_wind_direction_of_best_station() -> PolarsResult<()> {
        let with_wdir = |wdir: f64, rank: u32| StationSeries {
            frame: daily_frame(&[(d(1), Some(1.0), None)])
                .with_column(lit(wdir).alias("wdir")),
            rank,
            score: 0.5,
            temperature_offset: None,
        };
        // Listed out of rank order on purpose.
        let series = vec![with_wdir(10.0, 1), with_wdir(350.0, 0)];
        let df = interpolate(series, InterpolationMethod::Weighted)?.collect()?;
        assert_eq!(df.column("wdir")?.f64()?.get(0), Some(350.0));
        assert_eq!(df.column("tavg")?.f64()?.get(0), Some(1.0));
        Ok(())
    }

    #[test]
    fn test_temperature_offset_applies_to_temperatures_only() -> PolarsResult<()> {
        let df = interpolate(two_stations(Some(1.2)), InterpolationMethod::Nearest)?.collect()?;
        let tavg = df.column("tavg")?.f64()?;
        let prcp = df.column("prcp")?.f64()?;
        assert!((tavg.get(0).unwrap() - 2.2).abs() < 1e-12);
        assert_eq!(prcp.get(1), Some(2.0));
        Ok(())
    }

    #[test]
    fn test_no_stations_gives_empty_frame() -> PolarsResult<()> {
        let df = interpolate(vec![], InterpolationMethod::Nearest)?.collect()?;
        assert_eq!(df.height(), 0);
        assert_eq!(df.width(), DAILY_COLUMNS.len());
        Ok(())
    }
}
