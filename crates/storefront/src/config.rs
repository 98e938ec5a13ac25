//! Storefront cart configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `SHOPCART_API_URL` - Backend REST base URL (default: `http://localhost:3000/api`)
//! - `SHOPCART_DATA_DIR` - Directory for local cart storage (default: `.shopcart`)
//! - `SHOPCART_TAX_RATE` - Tax fraction applied to the subtotal (default: 0.05)
//! - `SHOPCART_MERGE_POLICY` - `union` or `discard` (default: union)
//! - `SHOPCART_DECREMENT_POLICY` - `floor` or `remove` (default: floor)
//! - `SHOPCART_LOGOUT_POLICY` - `empty` or `restore` (default: empty)
//! - `SHOPCART_HTTP_TIMEOUT_SECS` - Per-request timeout (default: 10)
//! - `SHOPCART_LOG_FORMAT` - `text` or `json` (default: text)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use shopcart_core::{DEFAULT_TAX_RATE, DecrementPolicy};
use thiserror::Error;
use url::Url;

use crate::cart::{CartOptions, LogoutPolicy, MergePolicy};

const DEFAULT_API_URL: &str = "http://localhost:3000/api";
const DEFAULT_DATA_DIR: &str = ".shopcart";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// How log lines are written to stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Storefront cart configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Backend REST base URL, always ending in `/`
    pub api_url: Url,
    /// Directory holding local cart and session files
    pub data_dir: PathBuf,
    /// Timeout applied to every backend request
    pub http_timeout: Duration,
    /// Cart behaviour
    pub cart: CartOptions,
    /// Log output format
    pub log_format: LogFormat,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(lookup);

        let api_url = normalize_base_url(&env.or_default("SHOPCART_API_URL", DEFAULT_API_URL))
            .map_err(|e| ConfigError::InvalidEnvVar("SHOPCART_API_URL".to_string(), e))?;
        let data_dir = PathBuf::from(env.or_default("SHOPCART_DATA_DIR", DEFAULT_DATA_DIR));
        let timeout_secs: u64 = env.parsed(
            "SHOPCART_HTTP_TIMEOUT_SECS",
            DEFAULT_HTTP_TIMEOUT_SECS,
        )?;

        let tax_rate: Decimal = env.parsed("SHOPCART_TAX_RATE", DEFAULT_TAX_RATE)?;
        if tax_rate < Decimal::ZERO || tax_rate >= Decimal::ONE {
            return Err(ConfigError::InvalidEnvVar(
                "SHOPCART_TAX_RATE".to_string(),
                format!("{tax_rate} is outside 0 <= rate < 1"),
            ));
        }

        let cart = CartOptions {
            tax_rate,
            merge_policy: env.choice(
                "SHOPCART_MERGE_POLICY",
                &[("union", MergePolicy::Union), ("discard", MergePolicy::DiscardLocal)],
            )?,
            decrement_policy: env.choice(
                "SHOPCART_DECREMENT_POLICY",
                &[
                    ("floor", DecrementPolicy::FloorAtOne),
                    ("remove", DecrementPolicy::RemoveAtZero),
                ],
            )?,
            logout_policy: env.choice(
                "SHOPCART_LOGOUT_POLICY",
                &[
                    ("empty", LogoutPolicy::StartEmpty),
                    ("restore", LogoutPolicy::RestoreAnonymous),
                ],
            )?,
        };

        Ok(Self {
            api_url,
            data_dir,
            http_timeout: Duration::from_secs(timeout_secs),
            cart,
            log_format: env.choice(
                "SHOPCART_LOG_FORMAT",
                &[("text", LogFormat::Text), ("json", LogFormat::Json)],
            )?,
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
        })
    }

    /// Resolve a path relative to the API base URL (e.g. `cart`, `orders`).
    ///
    /// # Errors
    ///
    /// Returns a parse error if `path` cannot be joined onto the base URL.
    pub fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        self.api_url.join(path.trim_start_matches('/'))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    /// Get an optional variable, treating blank values as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Get a variable with a default value.
    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    /// Parse a variable, falling back to `default` when unset.
    fn parsed<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key).map_or(Ok(default), |raw| {
            raw.parse::<T>()
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
    }

    /// Pick one of a fixed set of case-insensitive names; the first is the default.
    fn choice<T: Copy>(&self, key: &str, options: &[(&str, T)]) -> Result<T, ConfigError> {
        let Some((_, default)) = options.first() else {
            return Err(ConfigError::MissingEnvVar(key.to_string()));
        };
        let Some(raw) = self.optional(key) else {
            return Ok(*default);
        };
        options
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(&raw))
            .map(|(_, value)| *value)
            .ok_or_else(|| {
                let names: Vec<_> = options.iter().map(|(name, _)| *name).collect();
                ConfigError::InvalidEnvVar(
                    key.to_string(),
                    format!("expected one of {}, got '{raw}'", names.join(", ")),
                )
            })
    }
}

/// Parse a base URL and make sure relative joins append to its path.
fn normalize_base_url(raw: &str) -> Result<Url, String> {
    let mut url = Url::parse(raw).map_err(|e| e.to_string())?;
    if url.cannot_be_a_base() {
        return Err("must be an absolute http(s) URL".to_string());
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<StorefrontConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        StorefrontConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.api_url.as_str(), "http://localhost:3000/api/");
        assert_eq!(config.data_dir, PathBuf::from(".shopcart"));
        assert_eq!(config.http_timeout, Duration::from_secs(10));
        assert_eq!(config.cart.tax_rate, Decimal::new(5, 2));
        assert_eq!(config.cart.merge_policy, MergePolicy::Union);
        assert_eq!(config.cart.decrement_policy, DecrementPolicy::FloorAtOne);
        assert_eq!(config.cart.logout_policy, LogoutPolicy::StartEmpty);
        assert_eq!(config.log_format, LogFormat::Text);
        assert!(config.sentry_dsn.is_none());
    }

    #[test]
    fn test_policies_are_case_insensitive() {
        let config = load(&[
            ("SHOPCART_MERGE_POLICY", "Discard"),
            ("SHOPCART_DECREMENT_POLICY", "REMOVE"),
            ("SHOPCART_LOGOUT_POLICY", "restore"),
            ("SHOPCART_LOG_FORMAT", "JSON"),
        ])
        .unwrap();
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.cart.merge_policy, MergePolicy::DiscardLocal);
        assert_eq!(config.cart.decrement_policy, DecrementPolicy::RemoveAtZero);
        assert_eq!(config.cart.logout_policy, LogoutPolicy::RestoreAnonymous);
    }

    #[test]
    fn test_unknown_policy_is_rejected() {
        let err = load(&[("SHOPCART_MERGE_POLICY", "sometimes")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(key, _) if key == "SHOPCART_MERGE_POLICY"));
    }

    #[test]
    fn test_tax_rate_validation() {
        assert_eq!(
            load(&[("SHOPCART_TAX_RATE", "0.2")]).unwrap().cart.tax_rate,
            Decimal::new(2, 1)
        );
        assert!(load(&[("SHOPCART_TAX_RATE", "1.5")]).is_err());
        assert!(load(&[("SHOPCART_TAX_RATE", "-0.1")]).is_err());
        assert!(load(&[("SHOPCART_TAX_RATE", "five")]).is_err());
    }

    #[test]
    fn test_api_url_gets_trailing_slash() {
        let config = load(&[("SHOPCART_API_URL", "https://shop.example.com/api")]).unwrap();
        assert_eq!(
            config.endpoint("cart").unwrap().as_str(),
            "https://shop.example.com/api/cart"
        );
        assert_eq!(
            config.endpoint("/orders").unwrap().as_str(),
            "https://shop.example.com/api/orders"
        );
    }

    #[test]
    fn test_invalid_api_url() {
        assert!(load(&[("SHOPCART_API_URL", "not a url")]).is_err());
        assert!(load(&[("SHOPCART_API_URL", "mailto:shop@example.com")]).is_err());
    }

    #[test]
    fn test_blank_values_are_unset() {
        let config = load(&[("SENTRY_DSN", "  "), ("SHOPCART_HTTP_TIMEOUT_SECS", "")]).unwrap();
        assert!(config.sentry_dsn.is_none());
        assert_eq!(config.http_timeout, Duration::from_secs(10));
    }
}
