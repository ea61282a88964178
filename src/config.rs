use dotenv::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::api_connection::endpoints::FOOD_DATA_CENTRAL_BASE_URL;

pub const API_KEY_ENV_VAR: &str = "USDA_API_KEY";
pub const BASE_URL_ENV_VAR: &str = "USDA_BASE_URL";
pub const TIMEOUT_ENV_VAR: &str = "NUTRITION_LOOKUP_TIMEOUT_SECS";
pub const CACHE_ENABLED_ENV_VAR: &str = "NUTRITION_CACHE_ENABLED";

pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Settings for the nutrition pipeline.
///
/// A missing API key is a supported mode: every lookup misses and recipes
/// get estimator numbers.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub lookup_timeout: Duration,
    pub cache_enabled: bool,
    pub cache_ttl: Duration,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: FOOD_DATA_CENTRAL_BASE_URL.to_string(),
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
            cache_enabled: true,
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }
}

impl EnrichmentConfig {
    /// Reads the process environment, after loading `.env` if there is one.
    pub fn from_env() -> Self {
        dotenv().ok();
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Builds a config from any variable source. Bad values fall back to defaults.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let api_key = var(API_KEY_ENV_VAR)
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());
        let base_url = var(BASE_URL_ENV_VAR)
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or(defaults.base_url);
        let lookup_timeout = parse_or(&var, TIMEOUT_ENV_VAR, DEFAULT_LOOKUP_TIMEOUT.as_secs())
            .max(1);
        let cache_enabled = parse_or(&var, CACHE_ENABLED_ENV_VAR, defaults.cache_enabled);

        Self {
            api_key,
            base_url,
            lookup_timeout: Duration::from_secs(lookup_timeout),
            cache_enabled,
            cache_ttl: defaults.cache_ttl,
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

fn parse_or<T: FromStr>(var: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> T {
    match var(name) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(variable = name, value = %raw, "ignoring unparseable setting");
            default
        }),
    }
}
