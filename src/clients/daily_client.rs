//! Provides the `DailyClient` for requesting Meteostat daily weather data.
//!
//! Obtained via [`Meteostat::daily()`], it lets the caller pick the data source (a
//! station ID, the nearest station to a coordinate, or a point interpolated from
//! several stations) before executing the request.

use crate::types::daily_frame::DailyLazyFrame;
use crate::types::point::{Point, PointSettings};
use crate::{LatLon, Meteostat, MeteostatError, RequiredData};
use bon::bon;
use chrono::NaiveDate;

/// A request builder for daily weather data.
///
/// Every entry point ends with `.call().await` and returns a
/// [`Result<DailyLazyFrame, MeteostatError>`].
pub struct DailyClient<'a> {
    client: &'a Meteostat,
}

#[bon]
impl<'a> DailyClient<'a> {
    pub(crate) fn new(client: &'a Meteostat) -> Self {
        Self { client }
    }

    /// Fetches the full daily record of a station.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use regional_weather::{Meteostat, MeteostatError};
    /// # use chrono::NaiveDate;
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = Meteostat::new().await?;
    /// let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
    /// let end = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
    ///
    /// let daily = client.daily().station("02485").call().await?;
    /// let year = daily.get_range(start, end).frame.collect()?;
    /// println!("{}", year.head(Some(5)));
    /// # Ok(())
    /// # }
    /// ```
    #[builder(start_fn = station)]
    #[doc(hidden)]
    pub async fn build_station(
        &self,
        #[builder(start_fn)] station: &str,
    ) -> Result<DailyLazyFrame, MeteostatError> {
        let frame = self
            .client
            .data_from_station()
            .station(station)
            .call()
            .await?;
        Ok(DailyLazyFrame::new(frame))
    }

    /// Fetches the daily record of the nearest station to a coordinate that has data.
    ///
    /// Optional settings:
    /// *   `.max_distance_km(f64)`: search radius (default: 50.0 km).
    /// *   `.station_limit(usize)`: number of candidate stations to try (default: 1).
    /// *   `.required_data(RequiredData)`: inventory filter for candidates (default: any daily data).
    ///
    /// # Errors
    ///
    /// *   [`MeteostatError::NoStationWithinRadius`] if no candidate station exists.
    /// *   [`MeteostatError::NoDataFoundForNearbyStations`] if every candidate failed to download.
    #[builder(start_fn = location)]
    #[doc(hidden)]
    pub async fn build_location(
        &self,
        #[builder(start_fn)] coordinate: LatLon,
        max_distance_km: Option<f64>,
        station_limit: Option<usize>,
        required_data: Option<RequiredData>,
    ) -> Result<DailyLazyFrame, MeteostatError> {
        let frame = self
            .client
            .data_from_location()
            .location(coordinate)
            .maybe_max_distance_km(max_distance_km)
            .maybe_station_limit(station_limit)
            .maybe_required_data(required_data)
            .call()
            .await?;
        Ok(DailyLazyFrame::new(frame))
    }

    /// Fetches daily data for a point over a period, combining up to four nearby stations.
    ///
    /// `.period(start, end)` is required; `.settings(PointSettings)` is optional.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use regional_weather::{Meteostat, Point};
    /// # use chrono::NaiveDate;
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = Meteostat::new().await?;
    /// let gotland = Point::new(57.6366, 18.2926).with_alt(0.0);
    /// let start = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
    /// let end = NaiveDate::from_ymd_opt(2022, 12, 31).unwrap();
    ///
    /// let daily = client.daily().point(gotland).period(start, end).call().await?;
    /// println!("{}", daily.frame.collect()?);
    /// # Ok(())
    /// # }
    /// ```
    #[builder(start_fn = point)]
    #[doc(hidden)]
    pub async fn build_point(
        &self,
        #[builder(start_fn)] point: Point,
        #[builder(with = |start: NaiveDate, end: NaiveDate| (start, end))] period: (
            NaiveDate,
            NaiveDate,
        ),
        settings: Option<PointSettings>,
    ) -> Result<DailyLazyFrame, MeteostatError> {
        let (start, end) = period;
        let frame = self
            .client
            .data_from_point(point, start, end, settings.unwrap_or_default())
            .await?;
        Ok(DailyLazyFrame::new(frame))
    }
}
