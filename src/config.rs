use std::time::Duration;

use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Protected site
    pub site_base_url: String,
    pub category: String,
    pub ajax_path: String,
    pub listing_template: String,

    // Solver
    pub solver_url: String,
    pub solver_timeout: Duration,

    // Direct requests
    pub request_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Every variable has a default, so this only fails on malformed values.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Protected site
            site_base_url: env_or_default("SITE_BASE_URL", "https://9tsu.cc")
                .trim_end_matches('/')
                .to_string(),
            category: env_or_default("SITE_CATEGORY", "douga"),
            ajax_path: env_or_default("SITE_AJAX_PATH", "/wp-admin/admin-ajax.php"),
            listing_template: env_or_default("LISTING_TEMPLATE", "html/loop/content"),

            // Solver
            solver_url: env_or_default("SOLVER_URL", "http://localhost:8191/v1"),
            solver_timeout: Duration::from_secs(parse_env_u64("SOLVER_TIMEOUT_SECS", 120)?),

            // Direct requests
            request_timeout: Duration::from_secs(parse_env_u64("REQUEST_TIMEOUT_SECS", 30)?),
        })
    }

    /// Configuration pointing at a test origin and a test solver.
    #[must_use]
    pub fn for_testing(site_base_url: &str, solver_url: &str) -> Self {
        Self {
            site_base_url: site_base_url.trim_end_matches('/').to_string(),
            category: "douga".to_string(),
            ajax_path: "/wp-admin/admin-ajax.php".to_string(),
            listing_template: "html/loop/content".to_string(),
            solver_url: solver_url.to_string(),
            solver_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
        }
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_url("SITE_BASE_URL", &self.site_base_url)?;
        check_url("SOLVER_URL", &self.solver_url)?;
        if self.category.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "SITE_CATEGORY".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        if !self.ajax_path.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                name: "SITE_AJAX_PATH".to_string(),
                message: "must start with '/'".to_string(),
            });
        }
        if self.solver_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "SOLVER_TIMEOUT_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "REQUEST_TIMEOUT_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Listing root probed during session bring-up, e.g. `https://site/douga`.
    #[must_use]
    pub fn listing_url(&self) -> String {
        format!("{}/{}", self.site_base_url, self.category)
    }

    /// Absolute URL of the AJAX endpoint.
    #[must_use]
    pub fn ajax_url(&self) -> String {
        format!("{}{}", self.site_base_url, self.ajax_path)
    }
}

fn check_url(name: &str, value: &str) -> Result<(), ConfigError> {
    match Url::parse(value) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(()),
        Ok(url) => Err(ConfigError::InvalidValue {
            name: name.to_string(),
            message: format!("unsupported scheme '{}'", url.scheme()),
        }),
        Err(e) => Err(ConfigError::InvalidValue {
            name: name.to_string(),
            message: e.to_string(),
        }),
    }
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}
