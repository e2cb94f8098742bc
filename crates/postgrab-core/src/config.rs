use std::{env, path::PathBuf, time::Duration};

use crate::{errors::Error, Result};

const GIB: u64 = 1024 * 1024 * 1024;

/// Typed configuration for the orchestration core.
#[derive(Clone, Debug)]
pub struct Config {
    // Storage
    pub download_dir: PathBuf,

    // Size gate
    pub standard_size_limit: u64,
    pub elevated_size_limit: u64,

    // Pacing / progress
    pub item_pacing: Duration,
    pub progress_interval: Duration,
    pub notify_min_interval: Duration,

    // History walks
    pub history_page_size: usize,
    pub max_scan_messages: Option<usize>,

    // Batch policy
    pub max_range_len: Option<u32>,
    pub item_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            download_dir: env::temp_dir().join("postgrab"),
            standard_size_limit: 2 * GIB,
            elevated_size_limit: 4 * GIB,
            item_pacing: Duration::from_millis(1000),
            progress_interval: Duration::from_millis(3000),
            notify_min_interval: Duration::from_millis(1050),
            history_page_size: 100,
            max_scan_messages: None,
            max_range_len: None,
            item_retries: 0,
        }
    }
}

impl Config {
    /// Load from the process environment (a `.env` file is read first, without
    /// overriding variables that are already set).
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let download_dir = get("DOWNLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.download_dir);

        let standard_size_limit =
            parse_or("STANDARD_SIZE_LIMIT", get("STANDARD_SIZE_LIMIT"), defaults.standard_size_limit)?;
        let elevated_size_limit =
            parse_or("ELEVATED_SIZE_LIMIT", get("ELEVATED_SIZE_LIMIT"), defaults.elevated_size_limit)?;
        if elevated_size_limit < standard_size_limit {
            return Err(Error::Config(format!(
                "ELEVATED_SIZE_LIMIT ({elevated_size_limit}) must not be below STANDARD_SIZE_LIMIT ({standard_size_limit})"
            )));
        }

        let item_pacing = millis_or("ITEM_PACING_MS", get("ITEM_PACING_MS"), defaults.item_pacing)?;
        let progress_interval = millis_or(
            "PROGRESS_INTERVAL_MS",
            get("PROGRESS_INTERVAL_MS"),
            defaults.progress_interval,
        )?;
        let notify_min_interval = millis_or(
            "NOTIFY_MIN_INTERVAL_MS",
            get("NOTIFY_MIN_INTERVAL_MS"),
            defaults.notify_min_interval,
        )?;

        let history_page_size =
            parse_or("HISTORY_PAGE_SIZE", get("HISTORY_PAGE_SIZE"), defaults.history_page_size)?;
        if history_page_size == 0 {
            return Err(Error::Config("HISTORY_PAGE_SIZE must be at least 1".to_string()));
        }

        let max_scan_messages = get("MAX_SCAN_MESSAGES")
            .map(|v| parse_value::<usize>("MAX_SCAN_MESSAGES", &v))
            .transpose()?;
        let max_range_len = get("MAX_RANGE_LEN")
            .map(|v| parse_value::<u32>("MAX_RANGE_LEN", &v))
            .transpose()?;
        let item_retries = parse_or("ITEM_RETRIES", get("ITEM_RETRIES"), defaults.item_retries)?;

        Ok(Self {
            download_dir,
            standard_size_limit,
            elevated_size_limit,
            item_pacing,
            progress_interval,
            notify_min_interval,
            history_page_size,
            max_scan_messages,
            max_range_len,
            item_retries,
        })
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse::<T>()
        .map_err(|_| Error::Config(format!("{key} has an invalid value: {raw:?}")))
}

fn parse_or<T: std::str::FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T> {
    match raw {
        Some(v) => parse_value(key, &v),
        None => Ok(default),
    }
}

fn millis_or(key: &str, raw: Option<String>, default: Duration) -> Result<Duration> {
    match raw {
        Some(v) => parse_value::<u64>(key, &v).map(Duration::from_millis),
        None => Ok(default),
    }
}
