//! Application configuration loaded from environment variables.
//!
//! Configuration is loaded once at startup and validated before the pipeline is built.
//! Every knob has a default matching the production deployment, so an empty
//! environment yields a working development server.
//!
//! ## Variables
//!
//! - `APP_ENV` - `development` or `production` (default: `development`)
//! - `LISTEN` - Bind address (default: `0.0.0.0:3000`)
//! - `RUST_LOG` - Log level (default: `info`)
//! - `LOG_FORMAT` - Log format: `text` or `json` (default: `text`)
//! - `BEHIND_PROXY` - Read client IP from forwarding headers (default: `false`)
//! - `STATIC_ROOT` - Public asset directory (default: `public`)
//! - `API_PREFIX` - Path prefix the rate limiter guards (default: `/api`)
//! - `WEBHOOK_PATH` - Raw-body payment webhook path (default: `/webhook-checkout`)
//! - `RATE_LIMIT_MAX` - Requests admitted per window (default: 100)
//! - `RATE_LIMIT_WINDOW_SECS` - Window length in seconds (default: 3600)
//! - `BODY_LIMIT_BYTES` - Maximum parsed body size (default: 10240)
//! - `COMPRESSION_MIN_BYTES` - Smallest body worth compressing (default: 1024)
//! - `HPP_WHITELIST` - Comma-separated query keys allowed to repeat
//! - `CSP_ALLOWED_ORIGINS` - Comma-separated origins added to the CSP allow-list

use anyhow::{Context, Result};
use crate::api::middleware::rate_limit::is_under_prefix;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Query keys allowed to appear more than once (range filters on tours).
pub const DEFAULT_HPP_WHITELIST: &[&str] = &[
    "duration",
    "ratingsQuantity",
    "ratingsAverage",
    "maxGroupSize",
    "difficulty",
    "price",
];

/// Third-party origins the site loads scripts, frames and tiles from.
pub const DEFAULT_CSP_ORIGINS: &[&str] = &[
    "https://js.stripe.com",
    "https://*.stripe.com",
    "https://*.mapbox.com",
    "https://*.cloudflare.com",
];

/// Deployment mode selected by `APP_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => anyhow::bail!("APP_ENV must be 'development' or 'production', got '{other}'"),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed-window rate limit applied to API paths.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
    /// When true, client identity comes from X-Forwarded-For / X-Real-IP headers.
    /// Enable only when the service is behind a trusted reverse proxy.
    pub behind_proxy: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_secs(60 * 60),
            behind_proxy: false,
        }
    }
}

/// Everything the request pipeline needs to assemble its stages.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub environment: Environment,
    pub static_root: PathBuf,
    pub api_prefix: String,
    pub webhook_path: String,
    pub rate_limit: RateLimitConfig,
    pub body_limit_bytes: usize,
    pub compression_min_bytes: u16,
    pub hpp_whitelist: Vec<String>,
    pub csp_allowed_origins: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            static_root: PathBuf::from("public"),
            api_prefix: "/api".to_string(),
            webhook_path: "/webhook-checkout".to_string(),
            rate_limit: RateLimitConfig::default(),
            body_limit_bytes: 10 * 1024,
            compression_min_bytes: 1024,
            hpp_whitelist: DEFAULT_HPP_WHITELIST.iter().map(|s| s.to_string()).collect(),
            csp_allowed_origins: DEFAULT_CSP_ORIGINS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl PipelineConfig {
    /// Validates the pipeline settings.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the rate limit admits no requests or has a zero window
    /// - the body cap is zero or above 1 MiB
    /// - a prefix or path does not start with `/`
    /// - an allow-listed origin is not an http(s) or wildcard origin
    pub fn validate(&self) -> Result<()> {
        if self.rate_limit.max_requests == 0 {
            anyhow::bail!("RATE_LIMIT_MAX must be at least 1");
        }

        if self.rate_limit.window.is_zero() {
            anyhow::bail!("RATE_LIMIT_WINDOW_SECS must be greater than 0");
        }

        if self.body_limit_bytes == 0 || self.body_limit_bytes > 1024 * 1024 {
            anyhow::bail!(
                "BODY_LIMIT_BYTES must be between 1 and 1048576, got {}",
                self.body_limit_bytes
            );
        }

        if !self.api_prefix.starts_with('/') || self.api_prefix.len() < 2 {
            anyhow::bail!(
                "API_PREFIX must start with '/' and name a segment, got '{}'",
                self.api_prefix
            );
        }

        if !self.webhook_path.starts_with('/') {
            anyhow::bail!(
                "WEBHOOK_PATH must start with '/', got '{}'",
                self.webhook_path
            );
        }

        if is_under_prefix(&self.webhook_path, &self.api_prefix) {
            anyhow::bail!(
                "WEBHOOK_PATH '{}' must not live under API_PREFIX '{}'",
                self.webhook_path,
                self.api_prefix
            );
        }

        if let Some(origin) = self
            .csp_allowed_origins
            .iter()
            .find(|o| !(o.starts_with("https://") || o.starts_with("http://") || o.starts_with("wss://")))
        {
            anyhow::bail!("CSP_ALLOWED_ORIGINS entry '{origin}' is not an http(s) or wss origin");
        }

        if self.csp_allowed_origins.iter().any(|o| o.contains([';', ' ', '\''])) {
            anyhow::bail!("CSP_ALLOWED_ORIGINS entries must not contain spaces, quotes or ';'");
        }

        Ok(())
    }
}

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: String,
    pub log_level: String,
    pub log_format: String,
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let listen_addr = env::var("LISTEN").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let log_format = env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

        let defaults = PipelineConfig::default();

        let environment = match env::var("APP_ENV") {
            Ok(v) => v.parse()?,
            Err(_) => defaults.environment,
        };

        let behind_proxy = env::var("BEHIND_PROXY")
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);

        let max_requests = parse_var("RATE_LIMIT_MAX")?.unwrap_or(defaults.rate_limit.max_requests);
        let window = parse_var::<u64>("RATE_LIMIT_WINDOW_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.rate_limit.window);

        let pipeline = PipelineConfig {
            environment,
            static_root: env::var("STATIC_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_root),
            api_prefix: env::var("API_PREFIX").unwrap_or(defaults.api_prefix),
            webhook_path: env::var("WEBHOOK_PATH").unwrap_or(defaults.webhook_path),
            rate_limit: RateLimitConfig {
                max_requests,
                window,
                behind_proxy,
            },
            body_limit_bytes: parse_var("BODY_LIMIT_BYTES")?.unwrap_or(defaults.body_limit_bytes),
            compression_min_bytes: parse_var("COMPRESSION_MIN_BYTES")?
                .unwrap_or(defaults.compression_min_bytes),
            hpp_whitelist: list_var("HPP_WHITELIST").unwrap_or(defaults.hpp_whitelist),
            csp_allowed_origins: list_var("CSP_ALLOWED_ORIGINS")
                .unwrap_or(defaults.csp_allowed_origins),
        };

        Ok(Self {
            listen_addr,
            log_level,
            log_format,
            pipeline,
        })
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `log_format` is not `text` or `json`
    /// - `listen_addr` is invalid
    /// - any pipeline setting is rejected by [`PipelineConfig::validate`]
    pub fn validate(&self) -> Result<()> {
        if self.log_format != "text" && self.log_format != "json" {
            anyhow::bail!(
                "LOG_FORMAT must be 'text' or 'json', got '{}'",
                self.log_format
            );
        }

        if !self.listen_addr.contains(':') {
            anyhow::bail!(
                "LISTEN must be in format 'host:port', got '{}'",
                self.listen_addr
            );
        }

        self.pipeline.validate()
    }

    /// Prints configuration summary.
    pub fn print_summary(&self) {
        let p = &self.pipeline;
        tracing::info!("Configuration loaded:");
        tracing::info!("  Environment: {}", p.environment);
        tracing::info!("  Listen address: {}", self.listen_addr);
        tracing::info!("  Static root: {}", p.static_root.display());
        tracing::info!(
            "  Rate limit: {} requests / {}s on {}",
            p.rate_limit.max_requests,
            p.rate_limit.window.as_secs(),
            p.api_prefix
        );
        tracing::info!("  Body limit: {} bytes", p.body_limit_bytes);
        tracing::info!("  Webhook path: {}", p.webhook_path);
        tracing::info!("  Log level: {}", self.log_level);
        tracing::info!("  Log format: {}", self.log_format);
    }
}

/// Reads an optional variable and parses it, failing loudly on garbage.
fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{name} has an invalid value '{raw}'")),
        Err(_) => Ok(None),
    }
}

/// Reads a comma-separated list; blank entries are dropped.
fn list_var(name: &str) -> Option<Vec<String>> {
    env::var(name).ok().map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
}

/// Loads and validates configuration from environment variables.
///
/// # Errors
///
/// Returns an error if a variable is malformed or validation fails.
///
/// # Note
///
/// This function expects environment variables to be already loaded
/// (e.g., via `dotenvy::dotenv()` in `main.rs`).
pub fn load_from_env() -> Result<Config> {
    let config = Config::from_env()?;
    config.validate()?;
    Ok(config)
}
