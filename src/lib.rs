mod clients;
mod error;
mod meteostat;
pub mod report;
mod stations;
mod types;
mod utils;
mod weather_data;

pub use error::MeteostatError;
pub use meteostat::*;

pub use clients::daily_client::*;

pub use types::daily_frame::*;
pub use types::point::{InterpolationMethod, Point, PointSettings, RankedStation};
pub use types::required_data::RequiredData;
pub use types::station::*;

pub use stations::error::LocateStationError;
pub use stations::locate_station::StationLocator;
pub use weather_data::error::WeatherDataError;
