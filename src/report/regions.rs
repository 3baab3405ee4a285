//! The catalogue of named regions a report is built for.

use crate::types::point::Point;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegionCatalogError {
    #[error("Failed to read region file '{0}'")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse region file '{0}'")]
    Parse(PathBuf, #[source] serde_json::Error),

    #[error("Region '{0}' is listed more than once")]
    DuplicateName(String),

    #[error("Region file '{0}' does not list any region")]
    Empty(PathBuf),
}

/// A named point of interest.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub name: String,
    pub point: Point,
}

impl Region {
    pub fn new(name: impl Into<String>, point: Point) -> Self {
        Self {
            name: name.into(),
            point,
        }
    }
}

#[derive(Deserialize)]
struct RegionEntry {
    name: String,
    #[serde(flatten)]
    point: Point,
}

fn sea_level(name: &str, lat: f64, lon: f64) -> Region {
    Region::new(name, Point::new(lat, lon).with_alt(0.0))
}

/// The Swedish regions of the weather report, in report order.
pub fn sweden_regions() -> Vec<Region> {
    vec![
        sea_level("Stockholm", 59.3293, 18.0686),
        sea_level("Göteborg och Bohuslän", 57.7089, 11.9746),
        sea_level("Skåne", 55.6050, 13.0038),
        sea_level("Uppsala", 59.8586, 17.6389),
        sea_level("Östgöta", 58.4108, 15.6214),
        sea_level("Södermanland", 59.1984, 16.6113),
        sea_level("Halland", 56.6745, 12.8570),
        sea_level("Kalmar", 56.6616, 16.3616),
        sea_level("Kronoberg", 56.9292, 14.7135),
        sea_level("Blekinge", 56.2780, 15.4220),
        sea_level("Gotland", 57.6366, 18.2926),
        sea_level("Värmland", 59.3793, 13.5036),
        sea_level("Dalarna", 60.4858, 15.4376),
        sea_level("Gävleborg", 60.6749, 17.1413),
        sea_level("Västernorrland", 62.3908, 17.3069),
        // No altitude: estimated from the closest stations.
        Region::new("Jämtland", Point::new(63.1792, 14.6357)),
        sea_level("Västerbotten", 64.7500, 20.9500),
        sea_level("Norrbotten", 65.58381853174998, 22.156047098542405),
        sea_level("Jönköping", 57.7826, 14.1618),
        sea_level("Älvsborg", 58.1624, 12.5655),
        sea_level("Skaraborg", 58.3912, 13.8450),
        sea_level("Bergslagen", 59.6004350028211, 16.526784483212424),
        sea_level("Göinge-Kristianstad", 56.0294, 14.1567),
    ]
}

/// Parses a JSON region list: `[{"name": "...", "lat": .., "lon": .., "alt": ..}]`,
/// with `alt` optional.
pub fn parse_regions(json: &str, source: &Path) -> Result<Vec<Region>, RegionCatalogError> {
    let entries: Vec<RegionEntry> = serde_json::from_str(json)
        .map_err(|e| RegionCatalogError::Parse(source.to_path_buf(), e))?;
    if entries.is_empty() {
        return Err(RegionCatalogError::Empty(source.to_path_buf()));
    }

    let mut seen = HashSet::new();
    entries
        .into_iter()
        .map(|entry| {
            if !seen.insert(entry.name.clone()) {
                return Err(RegionCatalogError::DuplicateName(entry.name));
            }
            Ok(Region::new(entry.name, entry.point))
        })
        .collect()
}

/// Reads a JSON region list from disk. See [`parse_regions`].
pub fn load_regions(path: &Path) -> Result<Vec<Region>, RegionCatalogError> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| RegionCatalogError::Read(path.to_path_buf(), e))?;
    parse_regions(&json, path)
}
