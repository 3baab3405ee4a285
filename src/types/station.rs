//! Data structures describing Meteostat weather stations, as found in the
//! `stations/lite.json.gz` catalogue, plus the `rstar` glue that lets them live
//! in an R-tree.

use chrono::NaiveDate;
use rstar::{PointDistance, RTreeObject, AABB};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single Meteostat weather station and the metadata needed to pick it for a location.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    /// The unique Meteostat station identifier (e.g., "02464").
    pub id: String,
    /// The country code where the station is located (e.g., "SE").
    pub country: String,
    /// The region code (state, province, etc.), if available.
    pub region: Option<String>,
    /// The IANA timezone name for the station's location, if available.
    pub timezone: Option<String>,
    /// Station names keyed by language code (e.g., {"en": "Stockholm / Bromma"}).
    pub name: HashMap<String, String>,
    /// Geographical location details (latitude, longitude, elevation).
    pub location: Location,
    /// Availability of daily data for this station.
    pub inventory: Inventory,
}

impl Station {
    /// English station name, falling back to the station id.
    pub fn display_name(&self) -> &str {
        self.name.get("en").map(String::as_str).unwrap_or(&self.id)
    }
}

/// The data availability reported by Meteostat for a station.
///
/// Only the daily range is kept; the other frequencies in the catalogue are ignored
/// when deserializing.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Inventory {
    /// The reported start and end dates for daily data.
    pub daily: DateRange,
}

/// A date range with optional start and end dates.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    /// The earliest date for which data is reported available, if known.
    pub start: Option<NaiveDate>,
    /// The latest date for which data is reported available, if known.
    pub end: Option<NaiveDate>,
}

/// The geographical location of a weather station.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Location {
    /// Latitude in decimal degrees (positive for North, negative for South).
    pub latitude: f64,
    /// Longitude in decimal degrees (positive for East, negative for West).
    pub longitude: f64,
    /// Elevation above sea level in meters, if available.
    pub elevation: Option<i32>,
}

impl RTreeObject for Station {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.location.latitude, self.location.longitude])
    }
}

/// Squared euclidean distance in degree space. Only used to order R-tree candidates;
/// real distances are computed with haversine.
impl PointDistance for Station {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.location.latitude - point[0];
        let dy = self.location.longitude - point[1];
        dx * dx + dy * dy
    }
}
