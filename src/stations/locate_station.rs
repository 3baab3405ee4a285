use crate::stations::error::LocateStationError;
use crate::types::required_data::RequiredData;
use crate::types::station::Station;
use async_compression::tokio::bufread::GzipDecoder;
use bincode::config::{Configuration, Fixint, LittleEndian};
use futures_util::TryStreamExt;
use haversine::{distance, Location as HaversineLocation, Units};
use log::{info, warn};
use reqwest::Client;
use rstar::{RTree, AABB};
use std::cmp::Ordering;
use std::io;
use std::path::Path;
use tokio::io::{AsyncReadExt, BufReader};
use tokio_util::io::StreamReader;

const DATA_URL: &str = "https://bulk.meteostat.net/v2/stations/lite.json.gz";
const BINCODE_CACHE_FILE_NAME: &str = "stations_lite.bin";
const BINCODE_CONFIG: Configuration<LittleEndian, Fixint> =
    bincode::config::standard().with_fixed_int_encoding();

/// Earth radius used by the `haversine` crate.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Spatial index over the Meteostat station catalogue.
#[derive(Debug, Clone)]
pub struct StationLocator {
    rtree: RTree<Station>,
}

impl StationLocator {
    /// Loads the station catalogue from `cache_dir`, downloading and caching it first if needed.
    pub async fn new(cache_dir: &Path) -> Result<Self, LocateStationError> {
        let cache_file = cache_dir.join(BINCODE_CACHE_FILE_NAME);

        let stations = if cache_file.exists() {
            let path_clone = cache_file.clone();
            let stations =
                tokio::task::spawn_blocking(move || Self::get_cached_stations(&path_clone))
                    .await??;
            info!(
                "Loaded {} stations from cache {}",
                stations.len(),
                cache_file.display()
            );
            stations
        } else {
            warn!("Station cache not found. Fetching from URL: {}", DATA_URL);
            let stations = Self::fetch_stations().await?;
            Self::cache_stations(stations.clone(), &cache_file).await?;
            stations
        };

        Ok(Self::from_stations(stations))
    }

    /// Builds a locator over an already loaded set of stations.
    pub fn from_stations(stations: Vec<Station>) -> Self {
        StationLocator {
            rtree: RTree::bulk_load(stations),
        }
    }

    pub fn len(&self) -> usize {
        self.rtree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.rtree.size() == 0
    }

    fn get_cached_stations(cache_path: &Path) -> Result<Vec<Station>, LocateStationError> {
        let bytes = std::fs::read(cache_path)
            .map_err(|e| LocateStationError::CacheRead(cache_path.to_path_buf(), e))?;
        let (decoded_stations, _) =
            bincode::serde::decode_from_slice::<Vec<Station>, _>(&bytes, BINCODE_CONFIG).map_err(
                |e| LocateStationError::CacheDecode(cache_path.to_path_buf(), Box::from(e)),
            )?;
        Ok(decoded_stations)
    }

    async fn fetch_stations() -> Result<Vec<Station>, LocateStationError> {
        let client = Client::new();
        let response = client
            .get(DATA_URL)
            .send()
            .await
            .map_err(|e| LocateStationError::NetworkRequest(DATA_URL.to_string(), e))?;
        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                warn!("HTTP error for {}: {:?}", DATA_URL, e);
                return Err(match e.status() {
                    Some(status) => LocateStationError::HttpStatus {
                        url: DATA_URL.to_string(),
                        status,
                        source: e,
                    },
                    None => LocateStationError::NetworkRequest(DATA_URL.to_string(), e),
                });
            }
        };
        let stream = response.bytes_stream().map_err(io::Error::other);
        let stream_reader = StreamReader::new(stream);
        let gzip_decoder = GzipDecoder::new(BufReader::new(stream_reader));
        let mut decoder_reader = BufReader::new(gzip_decoder);
        let mut decompressed_json = Vec::with_capacity(20_000_000);
        decoder_reader.read_to_end(&mut decompressed_json).await?;

        let parse_start = std::time::Instant::now();
        let stations = tokio::task::spawn_blocking(move || {
            serde_json::from_slice::<Vec<Station>>(&decompressed_json)
                .map_err(LocateStationError::from)
        })
        .await??;
        info!(
            "Parsed {} stations from JSON in {:?}",
            stations.len(),
            parse_start.elapsed()
        );
        Ok(stations)
    }

    async fn cache_stations(
        stations: Vec<Station>,
        cache_path: &Path,
    ) -> Result<(), LocateStationError> {
        let cache_start = std::time::Instant::now();
        let bincode_data = tokio::task::spawn_blocking(move || {
            bincode::serde::encode_to_vec(stations, BINCODE_CONFIG)
                .map_err(|e| LocateStationError::CacheEncode(Box::new(e)))
        })
        .await??;
        tokio::fs::write(&cache_path, &bincode_data)
            .await
            .map_err(|e| LocateStationError::CacheWrite(cache_path.to_path_buf(), e))?;
        info!(
            "Serialized and wrote station cache ({} bytes) to {} in {:?}",
            bincode_data.len(),
            cache_path.display(),
            cache_start.elapsed()
        );
        Ok(())
    }

    /// Every station within `radius_km` of the location, closest first.
    ///
    /// The R-tree is searched with a latitude/longitude box that encloses the radius,
    /// and the haversine distance decides membership.
    pub fn within_radius(&self, latitude: f64, longitude: f64, radius_km: f64) -> Vec<(Station, f64)> {
        if radius_km < 0.0 {
            return vec![];
        }
        let angular_radius = radius_km / EARTH_RADIUS_KM;
        let lat_delta = angular_radius.to_degrees();
        // Widest longitude span of the circle; when it reaches a pole, all longitudes.
        let sin_ratio = angular_radius.sin() / latitude.to_radians().cos();
        let lon_delta = if angular_radius < std::f64::consts::FRAC_PI_2
            && (0.0..1.0).contains(&sin_ratio)
        {
            sin_ratio.asin().to_degrees()
        } else {
            180.0
        };
        let envelope = AABB::from_corners(
            [latitude - lat_delta, longitude - lon_delta],
            [latitude + lat_delta, longitude + lon_delta],
        );

        let mut stations_with_dist: Vec<(Station, f64)> = self
            .rtree
            .locate_in_envelope(&envelope)
            .filter_map(|station| {
                let dist_km = distance(
                    HaversineLocation {
                        latitude,
                        longitude,
                    },
                    HaversineLocation {
                        latitude: station.location.latitude,
                        longitude: station.location.longitude,
                    },
                    Units::Kilometers,
                );
                (dist_km <= radius_km).then(|| (station.to_owned(), dist_km))
            })
            .collect();

        stations_with_dist.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
        stations_with_dist
    }

    /// Finds up to `n_results` nearest stations within `max_distance_km`, optionally
    /// restricted to stations whose daily inventory meets `required_data`.
    pub fn query(
        &self,
        latitude: f64,
        longitude: f64,
        n_results: usize,
        max_distance_km: f64,
        required_data: Option<RequiredData>,
    ) -> Vec<(Station, f64)> {
        if n_results == 0 {
            return vec![];
        }
        self.within_radius(latitude, longitude, max_distance_km)
            .into_iter()
            .filter(|(station, _)| {
                required_data.is_none_or(|req| req.is_met_by(&station.inventory.daily))
            })
            .take(n_results)
            .collect()
    }
}
