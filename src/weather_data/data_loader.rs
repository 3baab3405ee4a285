use crate::weather_data::error::WeatherDataError;
use async_compression::tokio::bufread::GzipDecoder;
use futures_util::TryStreamExt;
use log::{info, warn};
use polars::prelude::*;
use reqwest::Client;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::NamedTempFile;
use tokio::io::AsyncReadExt;
use tokio::{fs, task};
use tokio_util::io::StreamReader;

const BASE_URL: &str = "https://bulk.meteostat.net/v2/daily";

/// Column names of the Meteostat daily bulk files, in file order.
pub const DAILY_COLUMNS: [&str; 11] = [
    "date", "tavg", "tmin", "tmax", "prcp", "snow", "wdir", "wspd", "wpgt", "pres", "tsun",
];

/// The schema every daily frame has after parsing: `date` as Date, all measurements as Float64.
pub fn daily_schema() -> Schema {
    DAILY_COLUMNS
        .iter()
        .map(|name| {
            let dtype = if *name == "date" {
                DataType::Date
            } else {
                DataType::Float64
            };
            Field::new((*name).into(), dtype)
        })
        .collect()
}

/// Downloads Meteostat daily bulk files and keeps them as parquet in the cache directory.
pub struct WeatherDataLoader {
    cache_dir: PathBuf,
    download_client: Client,
    max_cache_age: Option<Duration>,
}

impl WeatherDataLoader {
    pub fn new(cache_dir: &Path, max_cache_age: Option<Duration>) -> WeatherDataLoader {
        WeatherDataLoader {
            cache_dir: cache_dir.to_path_buf(),
            download_client: Client::new(),
            max_cache_age,
        }
    }

    fn cache_path(&self, station: &str) -> PathBuf {
        self.cache_dir.join(format!("daily-{station}.parquet"))
    }

    /// Loads the daily frame for a station. Uses the parquet cache when it is present and
    /// fresh, downloads and caches the station otherwise.
    pub async fn get_frame(&self, station: &str) -> Result<LazyFrame, WeatherDataError> {
        let parquet_path = self.cache_path(station);

        if self.is_cache_fresh(&parquet_path).await? {
            info!("Cache hit for daily data of station {} at {:?}", station, parquet_path);
        } else {
            warn!(
                "Cache miss for daily data of station {}. Downloading and processing.",
                station
            );
            let raw_bytes = self.download(station).await?;
            let df = Self::csv_to_dataframe(raw_bytes, station).await?;

            fs::create_dir_all(&self.cache_dir)
                .await
                .map_err(|e| WeatherDataError::CacheDirCreation(self.cache_dir.clone(), e))?;

            Self::cache_dataframe(df, &parquet_path).await?;
            info!("Cached daily data for station {} to {:?}", station, parquet_path);
        }

        LazyFrame::scan_parquet(&parquet_path, Default::default())
            .map_err(|e| WeatherDataError::ParquetScan(parquet_path.clone(), e))
    }

    /// Whether a usable cache file exists. Stale files are removed.
    async fn is_cache_fresh(&self, path: &Path) -> Result<bool, WeatherDataError> {
        let metadata = match fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(WeatherDataError::CacheMetadataRead(path.to_path_buf(), e)),
        };
        let Some(max_age) = self.max_cache_age else {
            return Ok(true);
        };
        let modified = metadata
            .modified()
            .map_err(|e| WeatherDataError::CacheMetadataRead(path.to_path_buf(), e))?;
        let age = SystemTime::now()
            .duration_since(modified)
            .map_err(|e| WeatherDataError::SystemTimeCalculation(path.to_path_buf(), e))?;
        if age <= max_age {
            return Ok(true);
        }
        info!("Cache file {:?} is {:?} old, refreshing", path, age);
        fs::remove_file(path)
            .await
            .map_err(|e| WeatherDataError::CacheDeletionError(path.to_path_buf(), e))?;
        Ok(false)
    }

    /// Downloads and decompresses the daily file of a station.
    async fn download(&self, station: &str) -> Result<Vec<u8>, WeatherDataError> {
        let url = format!("{BASE_URL}/{station}.csv.gz");
        info!("Downloading data from {}", url);

        let response = self
            .download_client
            .get(&url)
            .send()
            .await
            .map_err(|e| WeatherDataError::NetworkRequest(url.clone(), e))?;

        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                warn!("HTTP error for {}: {:?}", url, e);
                return Err(match e.status() {
                    Some(status) => WeatherDataError::HttpStatus {
                        url,
                        status,
                        source: e,
                    },
                    None => WeatherDataError::NetworkRequest(url, e),
                });
            }
        };

        let stream = response.bytes_stream().map_err(std::io::Error::other);
        let stream_reader = StreamReader::new(stream);
        let mut decoder = GzipDecoder::new(stream_reader);
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed).await?;
        info!(
            "Downloaded and decompressed {} bytes for station {}",
            decompressed.len(),
            station
        );
        Ok(decompressed)
    }

    /// Parses raw CSV bytes (without header) into a DataFrame on a blocking thread.
    async fn csv_to_dataframe(bytes: Vec<u8>, station: &str) -> Result<DataFrame, WeatherDataError> {
        let station_owned = station.to_string();
        task::spawn_blocking(move || parse_daily_csv(&bytes, &station_owned)).await?
    }

    /// Writes a DataFrame to a Parquet file using spawn_blocking.
    async fn cache_dataframe(mut df: DataFrame, path: &Path) -> Result<(), WeatherDataError> {
        let path_buf = path.to_path_buf();
        task::spawn_blocking(move || {
            let file = std::fs::File::create(&path_buf)
                .map_err(|e| WeatherDataError::ParquetWriteIo(path_buf.clone(), e))?;
            ParquetWriter::new(file)
                .with_compression(ParquetCompression::Snappy)
                .finish(&mut df)
                .map_err(|e| WeatherDataError::ParquetWritePolars(path_buf, e))?;
            Ok::<(), WeatherDataError>(())
        })
        .await??;
        Ok(())
    }
}

/// Parses a header-less Meteostat daily CSV into a frame with [`daily_schema`].
pub(crate) fn parse_daily_csv(bytes: &[u8], station: &str) -> Result<DataFrame, WeatherDataError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(DataFrame::empty_with_schema(&daily_schema()));
    }

    let csv_io = |source| WeatherDataError::CsvReadIo {
        station: station.to_string(),
        source,
    };
    let csv_polars = |source| WeatherDataError::CsvReadPolars {
        station: station.to_string(),
        source,
    };

    let mut temp_file = NamedTempFile::new().map_err(csv_io)?;
    temp_file.write_all(bytes).map_err(csv_io)?;
    temp_file.flush().map_err(csv_io)?;

    let mut df = CsvReadOptions::default()
        .with_has_header(false)
        .map_parse_options(|opts| opts.with_try_parse_dates(true))
        .try_into_reader_with_file_path(Some(temp_file.path().to_path_buf()))
        .map_err(csv_polars)?
        .finish()
        .map_err(csv_polars)?;

    if df.width() != DAILY_COLUMNS.len() {
        warn!(
            "CSV column count ({}) does not match daily schema ({}) for station {}",
            df.width(),
            DAILY_COLUMNS.len(),
            station
        );
        return Err(WeatherDataError::SchemaMismatch {
            station: station.to_string(),
            expected: DAILY_COLUMNS.len(),
            found: df.width(),
        });
    }

    df.set_column_names(DAILY_COLUMNS.iter().copied())
        .map_err(|source| WeatherDataError::ColumnRenameError {
            station: station.to_string(),
            source,
        })?;

    // Columns without a single value are inferred as strings; force the daily schema.
    let casts: Vec<Expr> = daily_schema()
        .iter()
        .map(|(name, dtype)| col(name.clone()).cast(dtype.clone()))
        .collect();
    Ok(df.lazy().with_columns(casts).collect()?)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Parses `csv` and stores it as the cache file of `station` in `cache_dir`.
    pub(crate) fn write_cached_station(
        cache_dir: &Path,
        station: &str,
        csv: &str,
    ) -> Result<(), WeatherDataError> {
        let mut df = parse_daily_csv(csv.as_bytes(), station)?;
        let path = WeatherDataLoader::new(cache_dir, None).cache_path(station);
        let file = std::fs::File::create(&path)
            .map_err(|e| WeatherDataError::ParquetWriteIo(path.clone(), e))?;
        ParquetWriter::new(file)
            .finish(&mut df)
            .map_err(|e| WeatherDataError::ParquetWritePolars(path, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const SAMPLE: &str = "\
2022-01-01,3.1,1.0,4.2,0.4,,230,14.2,,1012.3,
2022-01-02,2.5,0.1,3.9,,,210,10.1,,1008.0,
2022-01-03,-1.0,-3.4,0.8,2.2,10,,8.0,,1001.5,
";

    #[test]
    fn test_parse_daily_csv_schema() -> Result<(), Box<dyn std::error::Error>> {
        let df = parse_daily_csv(SAMPLE.as_bytes(), "test")?;
        assert_eq!(df.shape(), (3, 11));
        assert_eq!(df.get_column_names(), DAILY_COLUMNS);
        assert_eq!(df.column("date")?.dtype(), &DataType::Date);
        assert_eq!(df.column("tsun")?.dtype(), &DataType::Float64);
        assert_eq!(df.column("snow")?.dtype(), &DataType::Float64);

        let prcp = df.column("prcp")?.f64()?;
        assert_eq!(prcp.get(0), Some(0.4));
        assert_eq!(prcp.get(1), None);

        let dates = df.column("date")?.date()?;
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        let first = epoch + chrono::Duration::days(dates.get(0).unwrap() as i64);
        assert_eq!(first, NaiveDate::from_ymd_opt(2022, 1, 1).unwrap());
        Ok(())
    }

    #[test]
    fn test_parse_daily_csv_empty_file() -> Result<(), Box<dyn std::error::Error>> {
        let df = parse_daily_csv(b"", "empty")?;
        assert_eq!(df.height(), 0);
        assert_eq!(df.width(), 11);
        Ok(())
    }

    #[test]
    fn test_parse_daily_csv_wrong_width() {
        let result = parse_daily_csv(b"2022-01-01,1.0,2.0\n", "narrow");
        assert!(matches!(
            result,
            Err(WeatherDataError::SchemaMismatch { found: 3, .. })
        ));
    }

    #[tokio::test]
    async fn test_get_frame_uses_fresh_cache() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let loader = WeatherDataLoader::new(dir.path(), Some(Duration::from_secs(3600)));

        let df = parse_daily_csv(SAMPLE.as_bytes(), "cached")?;
        WeatherDataLoader::cache_dataframe(df, &loader.cache_path("cached")).await?;

        let frame = loader.get_frame("cached").await?.collect()?;
        assert_eq!(frame.height(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_stale_cache_is_removed() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let loader = WeatherDataLoader::new(dir.path(), Some(Duration::ZERO));
        let path = loader.cache_path("stale");

        let df = parse_daily_csv(SAMPLE.as_bytes(), "stale")?;
        WeatherDataLoader::cache_dataframe(df, &path).await?;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(!loader.is_cache_fresh(&path).await?);
        assert!(!path.exists());
        Ok(())
    }

    #[tokio::test]
    #[ignore = "downloads from bulk.meteostat.net"]
    async fn test_download_stockholm() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let loader = WeatherDataLoader::new(dir.path(), None);
        let frame = loader.get_frame("02485").await?.collect()?;
        assert!(frame.height() > 10_000);
        assert_eq!(frame.get_column_names(), DAILY_COLUMNS);
        Ok(())
    }
}
