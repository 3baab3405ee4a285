//! The main entry point for fetching Meteostat daily data, either for a station ID,
//! for the nearest station to a coordinate, or interpolated for a [`Point`] from
//! several nearby stations.

use crate::clients::daily_client::DailyClient;
use crate::error::MeteostatError;
use crate::stations::locate_station::StationLocator;
use crate::types::daily_frame::DailyLazyFrame;
use crate::types::point::{estimate_altitude, rank_stations, Point, PointSettings};
use crate::types::required_data::RequiredData;
use crate::types::station::Station;
use crate::utils::{ensure_cache_dir_exists, get_cache_dir};
use crate::weather_data::frame_fetcher::FrameFetcher;
use crate::weather_data::interpolate::{interpolate, StationSeries};
use bon::bon;
use chrono::NaiveDate;
use log::{info, warn};
use polars::prelude::LazyFrame;
use std::path::PathBuf;
use std::time::Duration;

/// Cached daily files older than this are downloaded again.
pub const DEFAULT_MAX_CACHE_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// A geographical coordinate: latitude first, longitude second.
///
/// # Examples
///
/// ```
/// use regional_weather::LatLon;
///
/// let stockholm = LatLon(59.3293, 18.0686);
/// assert_eq!(stockholm.0, 59.3293); // Latitude
/// assert_eq!(stockholm.1, 18.0686); // Longitude
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon(pub f64, pub f64);

/// The client for Meteostat daily data.
///
/// Keeps the station catalogue in memory and caches downloaded station files on disk,
/// so repeated requests for the same station only hit the network once.
///
/// # Examples
///
/// ```no_run
/// # use regional_weather::{Meteostat, MeteostatError};
/// # async fn run() -> Result<(), MeteostatError> {
/// let client = Meteostat::new().await?;
/// # Ok(())
/// # }
/// ```
pub struct Meteostat {
    fetcher: FrameFetcher,
    station_locator: StationLocator,
}

#[bon]
impl Meteostat {
    /// Creates a client caching into `cache_folder`, which is created if needed.
    pub async fn with_cache_folder(cache_folder: PathBuf) -> Result<Self, MeteostatError> {
        Self::configure().cache_folder(cache_folder).build().await
    }

    /// Creates a client using the default cache directory
    /// (`regional_weather_cache` inside the user cache directory).
    pub async fn new() -> Result<Self, MeteostatError> {
        Self::configure().build().await
    }

    /// Creates a client with explicit settings.
    ///
    /// * `.cache_folder(path)`: Optional. Defaults to the user cache directory.
    /// * `.max_cache_age(duration)`: Optional. Defaults to [`DEFAULT_MAX_CACHE_AGE`].
    ///
    /// ```no_run
    /// # use regional_weather::{Meteostat, MeteostatError};
    /// # use std::time::Duration;
    /// # async fn run() -> Result<(), MeteostatError> {
    /// let client = Meteostat::configure()
    ///     .cache_folder("/tmp/weather-cache")
    ///     .max_cache_age(Duration::from_secs(3600))
    ///     .build()
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    #[builder(finish_fn = build)]
    pub async fn configure(
        #[builder(into)] cache_folder: Option<PathBuf>,
        max_cache_age: Option<Duration>,
    ) -> Result<Self, MeteostatError> {
        let cache_folder = match cache_folder {
            Some(folder) => folder,
            None => get_cache_dir().map_err(MeteostatError::CacheDirResolution)?,
        };
        ensure_cache_dir_exists(&cache_folder)
            .await
            .map_err(|e| MeteostatError::CacheDirCreation(cache_folder.clone(), e))?;
        let max_cache_age = max_cache_age.unwrap_or(DEFAULT_MAX_CACHE_AGE);
        Ok(Self {
            station_locator: StationLocator::new(&cache_folder).await?,
            fetcher: FrameFetcher::new(&cache_folder, Some(max_cache_age)),
        })
    }

    /// Starts a daily data request. See [`DailyClient`].
    pub fn daily(&self) -> DailyClient<'_> {
        DailyClient::new(self)
    }

    /// Finds weather stations near a location, closest first.
    ///
    /// * `.location(LatLon)`: **Required.**
    /// * `.required_data(RequiredData)`: Optional daily inventory filter.
    /// * `.max_distance_km(f64)`: Optional. Defaults to `50.0`.
    /// * `.station_limit(usize)`: Optional. Defaults to `5`.
    ///
    /// The result may be empty.
    #[builder]
    pub async fn find_stations(
        &self,
        location: LatLon,
        required_data: Option<RequiredData>,
        max_distance_km: Option<f64>,
        station_limit: Option<usize>,
    ) -> Result<Vec<Station>, MeteostatError> {
        let max_distance_km = max_distance_km.unwrap_or(50.0);
        let station_limit = station_limit.unwrap_or(5);

        Ok(self
            .station_locator
            .query(
                location.0,
                location.1,
                station_limit,
                max_distance_km,
                required_data,
            )
            .into_iter()
            .map(|(station, _distance)| station)
            .collect())
    }

    /// Daily frame of one station.
    #[builder]
    pub(crate) async fn data_from_station(&self, station: &str) -> Result<LazyFrame, MeteostatError> {
        Ok(self.fetcher.get_cache_lazyframe(station).await?)
    }

    /// Daily frame of the closest station to `location` that has data.
    ///
    /// Candidates are tried closest first; the first successful download wins.
    #[builder]
    pub(crate) async fn data_from_location(
        &self,
        location: LatLon,
        max_distance_km: Option<f64>,
        station_limit: Option<usize>,
        required_data: Option<RequiredData>,
    ) -> Result<LazyFrame, MeteostatError> {
        let max_distance_km = max_distance_km.unwrap_or(50.0);
        let station_limit = station_limit.unwrap_or(1);

        let stations = self.station_locator.query(
            location.0,
            location.1,
            station_limit,
            max_distance_km,
            Some(required_data.unwrap_or(RequiredData::Any)),
        );

        if stations.is_empty() {
            return Err(MeteostatError::NoStationWithinRadius {
                radius: max_distance_km,
                lat: location.0,
                lon: location.1,
            });
        }

        let mut last_error: Option<MeteostatError> = None;
        for (station, _) in stations.iter() {
            match self.fetcher.get_cache_lazyframe(&station.id).await {
                Ok(lazy_frame) => return Ok(lazy_frame),
                Err(e) => last_error = Some(MeteostatError::from(e)),
            }
        }

        Err(MeteostatError::NoDataFoundForNearbyStations {
            radius: max_distance_km,
            lat: location.0,
            lon: location.1,
            stations_tried: stations.len(),
            last_error: last_error.map(Box::new),
        })
    }

    /// Daily frame for a point over `start..=end`, interpolated from up to
    /// `settings.max_count` nearby stations.
    ///
    /// A point without altitude gets the mean elevation of its closest stations.
    /// Stations whose file cannot be downloaded are skipped. The result has one row
    /// per day on which at least one selected station reported, and is empty when no
    /// station qualifies for the point.
    pub(crate) async fn data_from_point(
        &self,
        point: Point,
        start: NaiveDate,
        end: NaiveDate,
        settings: PointSettings,
    ) -> Result<LazyFrame, MeteostatError> {
        if start > end {
            return Err(MeteostatError::InvalidPeriod { start, end });
        }

        let candidates = self
            .station_locator
            .within_radius(point.lat, point.lon, settings.radius_km);
        let point = estimate_altitude(point, &candidates, settings.max_count);
        let ranked = rank_stations(candidates, &point, &settings, start, end);
        if ranked.is_empty() {
            warn!(
                "No station within {} km qualifies for point {}",
                settings.radius_km, point
            );
            return Ok(interpolate(Vec::new(), settings.method)?);
        }

        let mut series = Vec::with_capacity(ranked.len());
        let mut last_error: Option<MeteostatError> = None;
        for (rank, candidate) in (0u32..).zip(ranked.iter()) {
            match self.fetcher.get_cache_lazyframe(&candidate.station.id).await {
                Ok(frame) => {
                    info!(
                        "Using station {} ({}) at {:.1} km, score {:.3}",
                        candidate.station.id,
                        candidate.station.display_name(),
                        candidate.distance_km,
                        candidate.score
                    );
                    series.push(StationSeries {
                        frame: DailyLazyFrame::new(frame).get_range(start, end).frame,
                        rank,
                        score: candidate.score,
                        temperature_offset: candidate.temperature_offset(&point, &settings),
                    });
                }
                Err(e) => {
                    warn!(
                        "Skipping station {} for point {}: {}",
                        candidate.station.id, point, e
                    );
                    last_error = Some(MeteostatError::from(e));
                }
            }
        }

        if series.is_empty() {
            return Err(MeteostatError::NoDataFoundForNearbyStations {
                radius: settings.radius_km,
                lat: point.lat,
                lon: point.lon,
                stations_tried: ranked.len(),
                last_error: last_error.map(Box::new),
            });
        }

        Ok(interpolate(series, settings.method)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    // These talk to bulk.meteostat.net.

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_find_stations_near_stockholm() -> Result<(), MeteostatError> {
        let meteostat = Meteostat::new().await?;
        let stations = meteostat
            .find_stations()
            .location(LatLon(59.3293, 18.0686))
            .station_limit(3)
            .call()
            .await?;
        assert!(!stations.is_empty());
        assert!(stations.len() <= 3);
        Ok(())
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_find_stations_none_in_pacific() -> Result<(), MeteostatError> {
        let meteostat = Meteostat::new().await?;
        let stations = meteostat
            .find_stations()
            .location(LatLon(0.0, -160.0))
            .max_distance_km(10.0)
            .call()
            .await?;
        assert!(stations.is_empty());
        Ok(())
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_point_data_for_stockholm() -> Result<(), MeteostatError> {
        let meteostat = Meteostat::new().await?;
        let start = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2022, 1, 31).unwrap();
        let frame = meteostat
            .data_from_point(
                Point::new(59.3293, 18.0686).with_alt(0.0),
                start,
                end,
                PointSettings::default(),
            )
            .await?
            .collect()?;
        assert!(frame.height() > 0 && frame.height() <= 31);
        Ok(())
    }

    mod offline {
        use super::*;
        use crate::types::station::test_support::station;
        use crate::weather_data::data_loader::test_support::write_cached_station;
        use std::path::Path;

        const JANUARY: &str = "\
2022-01-01,1.0,-1.0,2.0,0.5,,250,10.0,,1010.0,
2022-01-02,2.0,0.0,3.0,0.0,,260,12.0,,1011.0,
2022-01-03,3.0,1.0,4.0,1.5,,270,14.0,,1012.0,
";

        /// Ids without a cache file; fetching them must fail.
        const MISSING: &str = "zz-no-such-station";

        fn client(cache: &Path, stations: Vec<Station>) -> Meteostat {
            Meteostat {
                fetcher: FrameFetcher::new(cache, None),
                station_locator: StationLocator::from_stations(stations),
            }
        }

        fn d(day: u32) -> NaiveDate {
            NaiveDate::from_ymd_opt(2022, 1, day).unwrap()
        }

        fn covering() -> (Option<NaiveDate>, Option<NaiveDate>) {
            (
                NaiveDate::from_ymd_opt(1990, 1, 1),
                NaiveDate::from_ymd_opt(2025, 12, 31),
            )
        }

        #[tokio::test]
        async fn test_point_data_skips_failing_station() -> Result<(), Box<dyn std::error::Error>> {
            let dir = tempfile::tempdir()?;
            write_cached_station(dir.path(), "bromma", JANUARY)?;
            let meteostat = client(
                dir.path(),
                vec![
                    // Closest, so it ranks first, but it has no data.
                    station(MISSING, 59.33, 18.07, Some(10), covering()),
                    station("bromma", 59.35, 17.95, Some(14), covering()),
                ],
            );

            let df = meteostat
                .data_from_point(
                    Point::new(59.3293, 18.0686).with_alt(0.0),
                    d(1),
                    d(2),
                    PointSettings::default(),
                )
                .await?
                .collect()?;
            assert_eq!(df.height(), 2);
            let tavg = df.column("tavg")?.f64()?;
            // Bromma sits 14 m above the point: 0.084 °C warmer at the point.
            assert!((tavg.get(0).unwrap() - 1.084).abs() < 1e-9);
            Ok(())
        }

        #[tokio::test]
        async fn test_point_data_without_stations_is_empty() -> Result<(), Box<dyn std::error::Error>> {
            let dir = tempfile::tempdir()?;
            let meteostat = client(
                dir.path(),
                vec![station("bromma", 59.35, 17.95, Some(14), covering())],
            );
            let df = meteostat
                .data_from_point(Point::new(0.0, 0.0), d(1), d(3), PointSettings::default())
                .await?
                .collect()?;
            assert_eq!(df.height(), 0);
            assert_eq!(df.get_column_names(), crate::weather_data::data_loader::DAILY_COLUMNS);
            Ok(())
        }

        #[tokio::test]
        async fn test_point_data_all_stations_failing() -> Result<(), Box<dyn std::error::Error>> {
            let dir = tempfile::tempdir()?;
            let meteostat = client(
                dir.path(),
                vec![station(MISSING, 59.33, 18.07, Some(10), covering())],
            );
            let result = meteostat
                .data_from_point(Point::new(59.3293, 18.0686), d(1), d(3), PointSettings::default())
                .await;
            assert!(matches!(
                result,
                Err(MeteostatError::NoDataFoundForNearbyStations {
                    stations_tried: 1,
                    last_error: Some(_),
                    ..
                })
            ));
            Ok(())
        }

        #[tokio::test]
        async fn test_point_data_rejects_reversed_period() -> Result<(), Box<dyn std::error::Error>> {
            let dir = tempfile::tempdir()?;
            let meteostat = client(dir.path(), vec![]);
            let result = meteostat
                .data_from_point(Point::new(59.0, 18.0), d(3), d(1), PointSettings::default())
                .await;
            assert!(matches!(result, Err(MeteostatError::InvalidPeriod { .. })));
            Ok(())
        }

        #[tokio::test]
        async fn test_location_data_without_stations() -> Result<(), Box<dyn std::error::Error>> {
            let dir = tempfile::tempdir()?;
            write_cached_station(dir.path(), "bromma", JANUARY)?;
            let meteostat = client(
                dir.path(),
                vec![station("bromma", 59.35, 17.95, Some(14), covering())],
            );

            let result = meteostat
                .data_from_location()
                .location(LatLon(0.0, 0.0))
                .call()
                .await;
            assert!(matches!(result, Err(MeteostatError::NoStationWithinRadius { .. })));

            let frame = meteostat
                .data_from_location()
                .location(LatLon(59.3293, 18.0686))
                .call()
                .await?
                .collect()?;
            assert_eq!(frame.height(), 3);
            Ok(())
        }
    }
}
