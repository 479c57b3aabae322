use anyhow::{ensure, Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Upper bound for any `*_INTERVAL_MS` setting (ten minutes)
pub const MAX_REQUEST_INTERVAL_MS: u64 = 600_000;

/// Runtime configuration, read from the environment (and `.env` if present)
#[derive(Debug, Clone)]
pub struct Config {
    pub nominatim_url: String,
    pub overpass_url: String,
    pub generative_url: String,
    pub generative_model: String,
    /// Never shipped to clients. Unset when `generative_url` is a proxy owning the key.
    pub generative_api_key: Option<String>,
    /// Identifies this application to every upstream service
    pub user_agent: String,
    pub http_timeout: Duration,
    pub intervals: RequestIntervals,
}

/// Minimum spacing between consecutive requests to the same upstream
#[derive(Debug, Clone, Copy)]
pub struct RequestIntervals {
    pub geocoder: Duration,
    pub overpass: Duration,
    pub generative: Duration,
}

impl RequestIntervals {
    /// No spacing at all, for tests and local mocks.
    pub fn none() -> Self {
        Self {
            geocoder: Duration::ZERO,
            overpass: Duration::ZERO,
            generative: Duration::ZERO,
        }
    }
}

impl Default for RequestIntervals {
    fn default() -> Self {
        Self {
            geocoder: Duration::from_millis(1100),
            overpass: Duration::from_millis(1000),
            generative: Duration::from_millis(1500),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            nominatim_url: "https://nominatim.openstreetmap.org".to_string(),
            overpass_url: "https://overpass-api.de/api/interpreter".to_string(),
            generative_url: "https://generativelanguage.googleapis.com".to_string(),
            generative_model: "gemini-1.5-flash".to_string(),
            generative_api_key: None,
            user_agent: format!("camp-scout/{} (youth camp planning)", env!("CARGO_PKG_VERSION")),
            http_timeout: Duration::from_secs(30),
            intervals: RequestIntervals::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        let defaults = Self::default();

        Ok(Self {
            nominatim_url: string_var("CAMP_SCOUT_NOMINATIM_URL", defaults.nominatim_url),
            overpass_url: string_var("CAMP_SCOUT_OVERPASS_URL", defaults.overpass_url),
            generative_url: string_var("CAMP_SCOUT_GENERATIVE_URL", defaults.generative_url),
            generative_model: string_var("CAMP_SCOUT_GENERATIVE_MODEL", defaults.generative_model),
            generative_api_key: env::var("GEMINI_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            user_agent: string_var("CAMP_SCOUT_USER_AGENT", defaults.user_agent),
            http_timeout: Duration::from_secs(parsed_var("CAMP_SCOUT_HTTP_TIMEOUT_SECS", 30)?),
            intervals: RequestIntervals {
                geocoder: interval_var("CAMP_SCOUT_GEOCODER_INTERVAL_MS", 1100)?,
                overpass: interval_var("CAMP_SCOUT_OVERPASS_INTERVAL_MS", 1000)?,
                generative: interval_var("CAMP_SCOUT_GENERATIVE_INTERVAL_MS", 1500)?,
            },
        })
    }
}

fn string_var(name: &str, default: String) -> String {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(default)
}

fn parsed_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {name}: {raw}")),
        _ => Ok(default),
    }
}

fn interval_var(name: &str, default_ms: u64) -> Result<Duration> {
    let ms: u64 = parsed_var(name, default_ms)?;
    ensure!(
        ms <= MAX_REQUEST_INTERVAL_MS,
        "{name} must be at most {MAX_REQUEST_INTERVAL_MS} ms, got {ms}"
    );
    Ok(Duration::from_millis(ms))
}
