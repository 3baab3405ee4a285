//! Contains the `DailyLazyFrame` structure for lazy operations on daily weather data.

use chrono::NaiveDate;
use polars::prelude::*;

/// A wrapper around a Polars `LazyFrame` holding daily weather data with the columns
/// `date, tavg, tmin, tmax, prcp, snow, wdir, wspd, wpgt, pres, tsun`.
///
/// Instances are obtained via [`crate::Meteostat::daily`]. Operations stay lazy until
/// `.frame.collect()` is called.
#[derive(Clone)]
pub struct DailyLazyFrame {
    /// The underlying Polars LazyFrame containing the daily data.
    pub frame: LazyFrame,
}

impl DailyLazyFrame {
    pub fn new(frame: LazyFrame) -> Self {
        Self { frame }
    }

    /// Filters the daily data based on a Polars predicate expression.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use regional_weather::{Meteostat, Point};
    /// use polars::prelude::{col, lit};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = Meteostat::new().await?;
    /// let daily = client.daily().station("02485").call().await?;
    ///
    /// // Days where the average temperature was above 20 degrees Celsius
    /// let warm_days = daily.filter(col("tavg").gt(lit(20.0f64))).frame.collect()?;
    /// println!("{warm_days}");
    /// # Ok(())
    /// # }
    /// ```
    pub fn filter(&self, predicate: Expr) -> DailyLazyFrame {
        DailyLazyFrame::new(self.frame.clone().filter(predicate))
    }

    /// Keeps only the days within `start..=end`.
    pub fn get_range(&self, start: NaiveDate, end: NaiveDate) -> DailyLazyFrame {
        self.filter(
            col("date")
                .gt_eq(lit(start))
                .and(col("date").lt_eq(lit(end))),
        )
    }

    /// Keeps only the row for `date`. Collecting yields zero or one row.
    pub fn get_at(&self, date: NaiveDate) -> DailyLazyFrame {
        self.filter(col("date").eq(lit(date)))
    }

    /// Restricts the data to `start..=end` and inserts a row for every missing day, so
    /// the result has exactly one row per calendar day with nulls where nothing was measured.
    ///
    /// An empty range (start after end) gives an empty frame.
    pub fn normalize(&self, start: NaiveDate, end: NaiveDate) -> PolarsResult<DailyLazyFrame> {
        let days: Vec<NaiveDate> = start.iter_days().take_while(|day| *day <= end).collect();
        let calendar = df!("date" => days)?.lazy();
        let joined = calendar
            .left_join(self.get_range(start, end).frame, col("date"), col("date"))
            .sort(["date"], SortMultipleOptions::default());
        Ok(DailyLazyFrame::new(joined))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weather_data::interpolate::test_support::daily_frame;
    use chrono::Datelike;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, m, day).unwrap()
    }

    fn sample() -> DailyLazyFrame {
        DailyLazyFrame::new(daily_frame(&[
            (d(1, 1), Some(1.0), Some(0.0)),
            (d(1, 2), Some(26.0), Some(5.5)),
            (d(1, 5), Some(3.0), None),
            (d(2, 1), Some(-4.0), Some(1.0)),
        ]))
    }

    fn dates(df: &DataFrame) -> Vec<NaiveDate> {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        df.column("date")
            .unwrap()
            .date()
            .unwrap()
            .into_iter()
            .map(|days| epoch + chrono::Duration::days(days.unwrap() as i64))
            .collect()
    }

    #[test]
    fn test_get_range_is_inclusive() -> PolarsResult<()> {
        let df = sample().get_range(d(1, 2), d(1, 5)).frame.collect()?;
        assert_eq!(dates(&df), [d(1, 2), d(1, 5)]);
        Ok(())
    }

    #[test]
    fn test_get_at_single_day() -> PolarsResult<()> {
        let df = sample().get_at(d(2, 1)).frame.collect()?;
        assert_eq!(df.height(), 1);
        assert_eq!(df.column("tavg")?.f64()?.get(0), Some(-4.0));
        assert_eq!(sample().get_at(d(3, 1)).frame.collect()?.height(), 0);
        Ok(())
    }

    #[test]
    fn test_filter_temperature() -> PolarsResult<()> {
        let df = sample().filter(col("tavg").gt(lit(25.0f64))).frame.collect()?;
        assert_eq!(dates(&df), [d(1, 2)]);
        Ok(())
    }

    #[test]
    fn test_normalize_fills_missing_days() -> PolarsResult<()> {
        let df = sample().normalize(d(1, 1), d(1, 6))?.frame.collect()?;
        let days = dates(&df);
        assert_eq!(days.len(), 6);
        assert!(days.windows(2).all(|w| w[1].ordinal() == w[0].ordinal() + 1));

        let tavg: Vec<Option<f64>> = df.column("tavg")?.f64()?.into_iter().collect();
        assert_eq!(tavg, [Some(1.0), Some(26.0), None, None, Some(3.0), None]);
        Ok(())
    }

    #[test]
    fn test_normalize_empty_range() -> PolarsResult<()> {
        let df = sample().normalize(d(2, 1), d(1, 1))?.frame.collect()?;
        assert_eq!(df.height(), 0);
        Ok(())
    }
}
