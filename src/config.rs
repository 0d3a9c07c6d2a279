use log::{info, warn};
use secrecy::SecretString;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::error::ConfigError;
use crate::models::TemperatureUnit;
use crate::service::Credentials;
use crate::utils::split_list;

/// Shortest poll interval accepted before falling back to the default.
pub const MIN_QUERY_FREQUENCY_MS: u64 = 5_000;
pub const DEFAULT_QUERY_FREQUENCY_MS: u64 = 20_000;
pub const DEFAULT_BASE_URL: &str = "https://www.mytaglist.com";
pub const DEFAULT_CACHE_FILE: &str = "wireless-tags.json";
pub const DEFAULT_BEEP_DURATION: u32 = 1001;

#[derive(Debug)]
pub struct BridgeConfig {
    pub credentials: Credentials,
    pub query_frequency: Duration,
    pub ignore_names: Vec<String>,
    /// Sign in again before every poll instead of only at startup.
    pub reauthenticate: bool,
    pub temperature_unit: TemperatureUnit,
    pub base_url: Url,
    pub cache_file: PathBuf,
    pub beep_duration: u32,
    /// Serials to unregister from the host at startup.
    pub forget_tags: Vec<String>,
}

impl BridgeConfig {
    pub fn new() -> Result<Self, ConfigError> {
        // Load environment variables
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup (the process environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let username = lookup("WST_USERNAME").ok_or(ConfigError::Missing("WST_USERNAME"))?;
        let password = lookup("WST_PASSWORD").ok_or(ConfigError::Missing("WST_PASSWORD"))?;

        let requested = lookup("WST_QUERY_FREQUENCY")
            .map(|v| parse_number::<u64>("WST_QUERY_FREQUENCY", &v))
            .transpose()?;
        let query_frequency = clamp_query_frequency(requested);

        let ignore_names = lookup("WST_IGNORE_NAMES")
            .map(|v| split_list(&v))
            .unwrap_or_default();

        let reauthenticate = lookup("WST_REAUTHENTICATE")
            .map(|v| parse_bool("WST_REAUTHENTICATE", &v))
            .transpose()?
            .unwrap_or(false);

        let temperature_unit = match lookup("WST_TEMPERATURE_UNIT") {
            Some(v) => v.parse().map_err(|reason| ConfigError::Invalid {
                name: "WST_TEMPERATURE_UNIT",
                value: v.clone(),
                reason,
            })?,
            None => TemperatureUnit::default(),
        };

        let base_url_raw = lookup("WST_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = Url::parse(&base_url_raw).map_err(|e| ConfigError::Invalid {
            name: "WST_BASE_URL",
            value: base_url_raw.clone(),
            reason: e.to_string(),
        })?;

        let cache_file = lookup("WST_CACHE_FILE")
            .unwrap_or_else(|| DEFAULT_CACHE_FILE.to_string())
            .into();

        let beep_duration = lookup("WST_BEEP_DURATION")
            .map(|v| parse_number::<u32>("WST_BEEP_DURATION", &v))
            .transpose()?
            .unwrap_or(DEFAULT_BEEP_DURATION);

        let forget_tags = lookup("WST_FORGET_TAGS")
            .map(|v| split_list(&v))
            .unwrap_or_default();

        info!(
            "Configuration loaded: interval={}ms, ignore={:?}, reauthenticate={}, unit={:?}",
            query_frequency.as_millis(),
            ignore_names,
            reauthenticate,
            temperature_unit
        );

        Ok(BridgeConfig {
            credentials: Credentials {
                username,
                password: SecretString::from(password),
            },
            query_frequency,
            ignore_names,
            reauthenticate,
            temperature_unit,
            base_url,
            cache_file,
            beep_duration,
            forget_tags,
        })
    }
}

/// Apply the poll interval floor. Too-short intervals would hammer the
/// service, so they are replaced by the default rather than disabled.
pub fn clamp_query_frequency(requested_ms: Option<u64>) -> Duration {
    match requested_ms {
        None => Duration::from_millis(DEFAULT_QUERY_FREQUENCY_MS),
        Some(ms) if ms < MIN_QUERY_FREQUENCY_MS => {
            warn!(
                "Invalid query frequency {}ms (minimum {}ms), using {}ms default",
                ms, MIN_QUERY_FREQUENCY_MS, DEFAULT_QUERY_FREQUENCY_MS
            );
            Duration::from_millis(DEFAULT_QUERY_FREQUENCY_MS)
        }
        Some(ms) => Duration::from_millis(ms),
    }
}

fn parse_number<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}
