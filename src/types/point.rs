//! Geographic points and the settings used to turn nearby stations into a single
//! series for that point.

use crate::types::required_data::RequiredData;
use crate::types::station::Station;
use chrono::NaiveDate;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::fmt;

/// A geographical point of interest.
///
/// `alt` is the altitude of the point in meters. When it is set, stations far above or
/// below the point are ignored and temperatures can be adjusted for the height difference.
///
/// # Examples
///
/// ```
/// use regional_weather::Point;
///
/// let stockholm = Point::new(59.3293, 18.0686).with_alt(0.0);
/// assert_eq!(stockholm.alt, Some(0.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub alt: Option<f64>,
}

impl Point {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon, alt: None }
    }

    pub fn with_alt(mut self, alt: f64) -> Self {
        self.alt = Some(alt);
        self
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.alt {
            Some(alt) => write!(f, "({:.4}, {:.4}, {alt} m)", self.lat, self.lon),
            None => write!(f, "({:.4}, {:.4})", self.lat, self.lon),
        }
    }
}

/// How the series of several stations are combined into one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterpolationMethod {
    /// Per day and column, take the first non-null value in station rank order.
    #[default]
    Nearest,
    /// Per day and column, average the non-null values weighted by station score.
    Weighted,
}

/// Station selection and interpolation settings for a [`Point`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointSettings {
    /// Search radius around the point, in kilometers.
    pub radius_km: f64,
    /// Maximum number of stations combined for one point.
    pub max_count: usize,
    /// Maximum altitude difference between point and station, in meters.
    pub alt_range_m: f64,
    /// Shift temperatures by the altitude difference between station and point.
    pub adapt_temp: bool,
    /// Share of the score given to distance.
    pub weight_dist: f64,
    /// Share of the score given to altitude difference.
    pub weight_alt: f64,
    pub method: InterpolationMethod,
}

impl Default for PointSettings {
    fn default() -> Self {
        Self {
            radius_km: 35.0,
            max_count: 4,
            alt_range_m: 350.0,
            adapt_temp: true,
            weight_dist: 0.6,
            weight_alt: 0.4,
            method: InterpolationMethod::Nearest,
        }
    }
}

/// Temperature lapse rate used for altitude adaptation, in °C per 100 m.
pub(crate) const LAPSE_RATE_PER_100M: f64 = 0.6;

/// A station picked for a point, with its distance and score.
#[derive(Debug, Clone)]
pub struct RankedStation {
    pub station: Station,
    pub distance_km: f64,
    pub score: f64,
}

impl RankedStation {
    /// Temperature offset in °C to apply to this station's readings for the given point,
    /// or `None` if no adaptation applies.
    pub fn temperature_offset(&self, point: &Point, settings: &PointSettings) -> Option<f64> {
        if !settings.adapt_temp {
            return None;
        }
        let alt = point.alt?;
        let elevation = f64::from(self.station.location.elevation?);
        Some((elevation - alt) / 100.0 * LAPSE_RATE_PER_100M)
    }
}

/// Fills in a missing altitude with the mean elevation of the `max_count` closest
/// candidates that report one. A point with an altitude is returned unchanged, as is a
/// point whose closest candidates all lack an elevation.
///
/// `candidates` must be sorted by distance.
pub fn estimate_altitude(point: Point, candidates: &[(Station, f64)], max_count: usize) -> Point {
    if point.alt.is_some() {
        return point;
    }
    let elevations: Vec<f64> = candidates
        .iter()
        .take(max_count)
        .filter_map(|(station, _)| station.location.elevation.map(f64::from))
        .collect();
    if elevations.is_empty() {
        return point;
    }
    point.with_alt(elevations.iter().sum::<f64>() / elevations.len() as f64)
}

/// Picks and ranks the stations used for `point` over `start..=end`.
///
/// `candidates` are all stations inside the search radius with their haversine distance.
/// When the point has an altitude, stations outside `alt_range_m` of it are dropped.
/// Stations whose daily inventory covers the whole period come first; if there are fewer
/// than `max_count` of them, the closest remaining stations fill up the list. The
/// selection is then ordered by score, best first.
pub fn rank_stations(
    mut candidates: Vec<(Station, f64)>,
    point: &Point,
    settings: &PointSettings,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<RankedStation> {
    candidates.sort_by_key(|(_, distance_km)| OrderedFloat(*distance_km));
    let eligible: Vec<(Station, f64)> = candidates
        .into_iter()
        .filter(|(_, distance_km)| *distance_km <= settings.radius_km)
        .filter(|(station, _)| match point.alt {
            Some(alt) => station
                .location
                .elevation
                .is_some_and(|elevation| (alt - f64::from(elevation)).abs() <= settings.alt_range_m),
            None => true,
        })
        .collect();

    let requirement = RequiredData::DateRange { start, end };
    let (mut selected, rest): (Vec<_>, Vec<_>) = eligible
        .into_iter()
        .partition(|(station, _)| requirement.is_met_by(&station.inventory.daily));
    if selected.len() < settings.max_count {
        let missing = settings.max_count - selected.len();
        selected.extend(rest.into_iter().take(missing));
    }

    let mut ranked: Vec<RankedStation> = selected
        .into_iter()
        .map(|(station, distance_km)| {
            let dist_part = 1.0 - distance_km / settings.radius_km;
            let score = match (point.alt, station.location.elevation) {
                (Some(alt), Some(elevation)) => {
                    let alt_part = 1.0 - (alt - f64::from(elevation)).abs() / settings.alt_range_m;
                    dist_part * settings.weight_dist + alt_part * settings.weight_alt
                }
                _ => dist_part,
            };
            RankedStation {
                station,
                distance_km,
                score,
            }
        })
        .collect();

    // Stable sort keeps distance order among equal scores.
    ranked.sort_by_key(|r| Reverse(OrderedFloat(r.score)));
    ranked.truncate(settings.max_count);
    ranked
}
