use crate::weather_data::data_loader::WeatherDataLoader;
use crate::weather_data::error::WeatherDataError;
use polars::prelude::LazyFrame;
use std::collections::{hash_map::Entry, HashMap};
use std::path::Path;
use std::time::Duration;
use tokio::sync::Mutex;

/// Keeps one `LazyFrame` per station for the lifetime of the client.
pub struct FrameFetcher {
    loader: WeatherDataLoader,
    lazyframe_cache: Mutex<HashMap<String, LazyFrame>>,
}

impl FrameFetcher {
    pub fn new(cache_dir: &Path, max_cache_age: Option<Duration>) -> Self {
        Self {
            loader: WeatherDataLoader::new(cache_dir, max_cache_age),
            lazyframe_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Gets the daily frame of a station, using the in-memory cache if possible.
    pub async fn get_cache_lazyframe(&self, station: &str) -> Result<LazyFrame, WeatherDataError> {
        {
            let cache = self.lazyframe_cache.lock().await;
            if let Some(cached) = cache.get(station) {
                return Ok(cached.clone());
            }
        }

        // Loading may download, so it happens without holding the lock.
        let loaded_frame = self.loader.get_frame(station).await?;

        let mut cache = self.lazyframe_cache.lock().await;
        match cache.entry(station.to_string()) {
            // Someone else loaded the station while we were downloading.
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                entry.insert(loaded_frame.clone());
                Ok(loaded_frame)
            }
        }
    }
}
