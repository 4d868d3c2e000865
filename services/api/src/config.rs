//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use humanizer_core::{HumanizeParams, InputLimits, PlanAllowances};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub cors_origin: String,
    /// Base URL of this service, used to build email confirmation links.
    pub public_base_url: String,
    pub humanizer_base_url: String,
    pub humanizer_api_key: String,
    pub humanizer_request_timeout: Duration,
    pub humanize_params: HumanizeParams,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
    pub input_limits: InputLimits,
    pub plan_allowances: PlanAllowances,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Server and Database Settings ---
        let bind_address = parse_or(&lookup, "BIND_ADDRESS", "0.0.0.0:3000".parse::<SocketAddr>())?;
        let database_url = required(&lookup, "DATABASE_URL")?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin =
            lookup("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:5173".to_string());
        let public_base_url =
            lookup("PUBLIC_BASE_URL").unwrap_or_else(|| "http://localhost:3000".to_string());

        // --- Remote Humanizer ---
        let humanizer_base_url = lookup("HUMANIZER_BASE_URL")
            .unwrap_or_else(|| "https://humanize-api.undetectable.ai".to_string());
        let humanizer_api_key = required(&lookup, "HUMANIZER_API_KEY")?;
        let humanizer_request_timeout =
            Duration::from_secs(parse_or(&lookup, "HUMANIZER_REQUEST_TIMEOUT_SECS", Ok(30u64))?);
        let humanize_params = HumanizeParams {
            readability: lookup("HUMANIZER_READABILITY")
                .unwrap_or_else(|| "University".to_string()),
            purpose: lookup("HUMANIZER_PURPOSE").unwrap_or_else(|| "General Writing".to_string()),
            strength: lookup("HUMANIZER_STRENGTH").unwrap_or_else(|| "More Human".to_string()),
            model: lookup("HUMANIZER_MODEL").unwrap_or_else(|| "v11".to_string()),
        };

        // --- Polling ---
        let poll_interval = Duration::from_secs(parse_or(&lookup, "POLL_INTERVAL_SECS", Ok(5u64))?);
        let poll_timeout = Duration::from_secs(parse_or(&lookup, "POLL_TIMEOUT_SECS", Ok(300u64))?);
        if poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "POLL_INTERVAL_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        // --- Gate Limits ---
        let input_limits = InputLimits {
            min_chars: parse_or(&lookup, "MIN_INPUT_CHARS", Ok(50usize))?,
            max_chars: parse_or(&lookup, "MAX_INPUT_CHARS", Ok(2000usize))?,
        };
        if input_limits.min_chars > input_limits.max_chars {
            return Err(ConfigError::InvalidValue(
                "MIN_INPUT_CHARS".to_string(),
                "must not exceed MAX_INPUT_CHARS".to_string(),
            ));
        }
        let plan_allowances = PlanAllowances {
            free: parse_or(&lookup, "FREE_PLAN_CREDITS", Ok(10u32))?,
            pro: parse_or(&lookup, "PRO_PLAN_CREDITS", Ok(100u32))?,
            enterprise: parse_or(&lookup, "ENTERPRISE_PLAN_CREDITS", Ok(500u32))?,
        };

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            cors_origin,
            public_base_url,
            humanizer_base_url,
            humanizer_api_key,
            humanizer_request_timeout,
            humanize_params,
            poll_interval,
            poll_timeout,
            input_limits,
            plan_allowances,
        })
    }
}

fn required<F>(lookup: &F, name: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingVar(name.to_string()))
}

/// Parses `name` if set, otherwise returns `default`.
fn parse_or<F, T>(lookup: &F, name: &str, default: Result<T, T::Err>) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        None => default.map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
    }
}
