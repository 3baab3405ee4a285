use crate::stations::error::LocateStationError;
use crate::weather_data::error::WeatherDataError;
use chrono::NaiveDate;
use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MeteostatError {
    #[error(transparent)]
    WeatherData(#[from] WeatherDataError),

    #[error(transparent)]
    LocateStation(#[from] LocateStationError),

    #[error(transparent)]
    Polars(#[from] PolarsError),

    #[error("Failed to create cache directory '{0}'")]
    CacheDirCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed to determine cache directory")]
    CacheDirResolution(#[source] std::io::Error),

    #[error("No weather station found within {radius} km of ({lat}, {lon})")]
    NoStationWithinRadius { radius: f64, lat: f64, lon: f64 },

    #[error("Tried {stations_tried} station(s) within {radius} km of ({lat}, {lon}), none returned data")]
    NoDataFoundForNearbyStations {
        radius: f64,
        lat: f64,
        lon: f64,
        stations_tried: usize,
        #[source]
        last_error: Option<Box<MeteostatError>>,
    },

    #[error("Invalid period: start {start} is after end {end}")]
    InvalidPeriod { start: NaiveDate, end: NaiveDate },
}
