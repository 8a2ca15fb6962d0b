use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::error::HarvestError;
use crate::coordinator::{DEFAULT_REQUEST_DELAY, DEFAULT_SAVE_EVERY, DEFAULT_WORKERS};
use crate::extract::types::{
    Source, DEFAULT_MAX_RETRIES, DEFAULT_REQUEST_TIMEOUT, DEFAULT_RETRY_DELAY,
};

pub const DEFAULT_DATA_DIR: &str = "data/extracted";
pub const DEFAULT_UNIVERSE_FILE: &str = "ec_standards_api.json";
pub const DEFAULT_PORTAL_URL: &str = "https://conocer.gob.mx/conocer/#/renec";
pub const DEFAULT_API_BASE: &str = "https://conocer.gob.mx/CONOCERBACKCITAS";
pub const DEFAULT_BROWSERLESS_URL: &str = "http://localhost:3000";

/// Retrieves an environment variable and splits it into a vector of strings based on a delimiter.
///
/// Empty segments are dropped, so an unset variable yields an empty vector.
pub fn get_env_var_as_vec(var: &str, delimiter: char) -> Vec<String> {
    env::var(var)
        .unwrap_or_default()
        .split(delimiter)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parses an environment variable, falling back to `default` when unset or unparseable.
pub fn get_env_var_or<T: FromStr>(var: &str, default: T) -> T {
    match env::var(var) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!("Ignoring unparseable value {:?} for {}", raw, var);
                default
            }
        },
        Err(_) => default,
    }
}

/// Runtime settings for a harvest run.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub data_dir: PathBuf,
    pub universe_file: PathBuf,
    pub portal_url: String,
    pub api_base: String,
    pub browserless_url: String,
    pub browserless_token: Option<String>,
    /// Detail sources in the order they are tried on each attempt.
    pub sources: Vec<Source>,
    pub workers: usize,
    pub save_every: usize,
    pub request_delay: Duration,
    pub max_retries: usize,
    pub retry_delay: Duration,
    pub timeout: Duration,
}

impl HarvestConfig {
    pub fn from_env() -> Result<Self, HarvestError> {
        let data_dir = PathBuf::from(
            env::var("RENEC_DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.to_string()),
        );
        let universe_file = env::var("RENEC_UNIVERSE_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join(DEFAULT_UNIVERSE_FILE));

        let source_names = get_env_var_as_vec("HARVEST_SOURCES", ';');
        let sources = if source_names.is_empty() {
            vec![Source::RenderedPage]
        } else {
            source_names
                .iter()
                .map(|name| name.parse::<Source>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(HarvestError::Config)?
        };

        Ok(HarvestConfig {
            data_dir,
            universe_file,
            portal_url: env::var("RENEC_PORTAL_URL")
                .unwrap_or_else(|_| DEFAULT_PORTAL_URL.to_string()),
            api_base: env::var("RENEC_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            browserless_url: env::var("BROWSERLESS_URL")
                .unwrap_or_else(|_| DEFAULT_BROWSERLESS_URL.to_string()),
            browserless_token: env::var("BROWSERLESS_TOKEN").ok().filter(|t| !t.is_empty()),
            sources,
            workers: get_env_var_or("HARVEST_WORKERS", DEFAULT_WORKERS),
            save_every: get_env_var_or("HARVEST_SAVE_EVERY", DEFAULT_SAVE_EVERY),
            request_delay: Duration::from_millis(get_env_var_or(
                "HARVEST_REQUEST_DELAY_MS",
                DEFAULT_REQUEST_DELAY.as_millis() as u64,
            )),
            max_retries: get_env_var_or("HARVEST_MAX_RETRIES", DEFAULT_MAX_RETRIES),
            retry_delay: Duration::from_millis(get_env_var_or(
                "HARVEST_RETRY_DELAY_MS",
                DEFAULT_RETRY_DELAY.as_millis() as u64,
            )),
            timeout: Duration::from_secs(get_env_var_or(
                "HARVEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT.as_secs(),
            )),
        })
    }

    pub fn validate(&self) -> Result<(), HarvestError> {
        if self.workers == 0 {
            return Err(HarvestError::Config("workers must be at least 1".into()));
        }
        if self.save_every == 0 {
            return Err(HarvestError::Config("save cadence must be at least 1".into()));
        }
        if self.sources.is_empty() {
            return Err(HarvestError::Config("no detail sources configured".into()));
        }
        for (name, value) in [
            ("RENEC_PORTAL_URL", &self.portal_url),
            ("RENEC_API_BASE", &self.api_base),
            ("BROWSERLESS_URL", &self.browserless_url),
        ] {
            if !is_valid_url(value) {
                return Err(HarvestError::Config(format!(
                    "{} is not an http(s) URL: {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// True for absolute http(s) URLs that name a host.
pub fn is_valid_url(url: &str) -> bool {
    url::Url::parse(url)
        .map(|parsed| matches!(parsed.scheme(), "http" | "https") && parsed.has_host())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> HarvestConfig {
        HarvestConfig {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            universe_file: PathBuf::from(DEFAULT_UNIVERSE_FILE),
            portal_url: DEFAULT_PORTAL_URL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            browserless_url: DEFAULT_BROWSERLESS_URL.to_string(),
            browserless_token: None,
            sources: vec![Source::Api, Source::RenderedPage],
            workers: 2,
            save_every: 10,
            request_delay: Duration::from_millis(500),
            max_retries: 2,
            retry_delay: Duration::from_secs(2),
            timeout: Duration::from_secs(60),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(sample_config().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_workers_and_bad_urls() {
        let mut config = sample_config();
        config.workers = 0;
        assert!(config.validate().is_err());

        let mut config = sample_config();
        config.browserless_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_is_valid_url() {
        assert!(is_valid_url("https://conocer.gob.mx/conocer/#/renec"));
        assert!(!is_valid_url("not a url"));
        assert!(!is_valid_url("ftp://conocer.gob.mx/renec"));
        assert!(!is_valid_url("file:///tmp/universe.json"));
        assert!(is_valid_url("http://localhost:3000"));
    }
}
