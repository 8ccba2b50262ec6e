//! Application configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::backend::PushFilters;

/// Development default values - NEVER use in production.
pub mod defaults {
    pub const DEV_BACKEND_URL: &str = "http://localhost:8000";
    pub const DEV_REPO: &str = "autoland";
    pub const PUSH_COUNT: usize = 10;
    pub const JOB_POLL_INTERVAL_SECS: u64 = 60;
    pub const PUSH_POLL_INTERVAL_SECS: u64 = 60;
    pub const MAX_POLL_MULTIPLIER: u32 = 15; // Full refetch once this many job periods pass
    pub const QUIET_WINDOW_MULTIPLIER: u32 = 5; // Watermark never trails now by more than this
    pub const WATERMARK_SLACK_SECS: u64 = 3; // Clock skew between parallel job requests
    pub const JOB_CHUNK_SIZE: usize = 40;
    pub const JOB_RETRY_DELAY_SECS: u64 = 10;
}

/// Runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// Parse environment from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Some(Self::Development),
            "production" | "prod" => Some(Self::Production),
            _ => None,
        }
    }

    /// Check if this is a development environment.
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    /// Check if this is a production environment.
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
        }
    }
}

/// Tuning of the sync service. Every constant the pollers and loaders use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Default page size for push loads.
    pub push_count: usize,
    pub job_poll_interval: Duration,
    pub push_poll_interval: Duration,
    /// Staleness ceiling = multiplier × job poll interval.
    pub max_poll_multiplier: u32,
    /// Quiet clamp = now − multiplier × job poll interval.
    pub quiet_window_multiplier: u32,
    /// Subtracted from the newest `last_modified` seen.
    pub watermark_slack: Duration,
    pub job_chunk_size: usize,
    pub job_retry_delay: Duration,
    /// Load pushes only, never their jobs.
    pub no_jobs: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            push_count: defaults::PUSH_COUNT,
            job_poll_interval: Duration::from_secs(defaults::JOB_POLL_INTERVAL_SECS),
            push_poll_interval: Duration::from_secs(defaults::PUSH_POLL_INTERVAL_SECS),
            max_poll_multiplier: defaults::MAX_POLL_MULTIPLIER,
            quiet_window_multiplier: defaults::QUIET_WINDOW_MULTIPLIER,
            watermark_slack: Duration::from_secs(defaults::WATERMARK_SLACK_SECS),
            job_chunk_size: defaults::JOB_CHUNK_SIZE,
            job_retry_delay: Duration::from_secs(defaults::JOB_RETRY_DELAY_SECS),
            no_jobs: false,
        }
    }
}

impl SyncSettings {
    /// Time since the last poll after which a full refetch replaces the delta query.
    pub fn staleness_ceiling(&self) -> Duration {
        self.job_poll_interval * self.max_poll_multiplier
    }

    /// How far behind now the watermark may trail after a quiet poll.
    pub fn quiet_window(&self) -> Duration {
        self.job_poll_interval * self.quiet_window_multiplier
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Runtime environment
    pub environment: Environment,
    /// CI backend base URL
    pub backend_url: String,
    /// Repository to view
    pub repo: String,
    /// Serve data from this JSON fixture instead of HTTP
    pub fixture_path: Option<PathBuf>,
    /// Whole-request HTTP timeout (none by default)
    pub request_timeout: Option<Duration>,
    /// Poller and loader tuning
    pub sync: SyncSettings,
    /// Revision range and push filters
    pub filters: PushFilters,
}

fn parse_var<T: FromStr>(
    name: &'static str,
    default: T,
    error: &'static str,
) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value.parse::<T>().map_err(|_| ConfigError::InvalidValue(error)),
        Err(_) => Ok(default),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In development mode (RUST_ENV=development):
    /// - All variables have sensible defaults
    /// - Only RUST_ENV is required
    ///
    /// In production mode (RUST_ENV=production):
    /// - PSYNC_BACKEND_URL must not be the development default
    ///   (unless a fixture is served)
    ///
    /// Environment variables:
    /// - `RUST_ENV`: Environment (development/production) - REQUIRED
    /// - `PSYNC_BACKEND_URL`: CI backend base URL (default: http://localhost:8000)
    /// - `PSYNC_REPO`: Repository to view (default: autoland)
    /// - `PSYNC_FIXTURE_PATH`: JSON fixture to serve instead of HTTP
    /// - `PSYNC_PUSH_COUNT`: Pushes per page (default: 10)
    /// - `PSYNC_JOB_POLL_INTERVAL_SECS`: Job poll period (default: 60)
    /// - `PSYNC_PUSH_POLL_INTERVAL_SECS`: Push poll period (default: 60)
    /// - `PSYNC_MAX_POLL_MULTIPLIER`: Staleness ceiling in job periods (default: 15)
    /// - `PSYNC_QUIET_WINDOW_MULTIPLIER`: Quiet watermark clamp in job periods (default: 5)
    /// - `PSYNC_WATERMARK_SLACK_SECS`: Watermark slack (default: 3)
    /// - `PSYNC_JOB_CHUNK_SIZE`: Ids per by-id request (default: 40)
    /// - `PSYNC_JOB_RETRY_DELAY_SECS`: Delay before re-requesting ids (default: 10)
    /// - `PSYNC_REQUEST_TIMEOUT_SECS`: HTTP request timeout (default: none)
    /// - `PSYNC_NO_JOBS`: Load pushes only (default: false)
    /// - `PSYNC_REVISION`, `PSYNC_AUTHOR`, `PSYNC_FROMCHANGE`, `PSYNC_TOCHANGE`,
    ///   `PSYNC_STARTDATE`, `PSYNC_ENDDATE`: push filters
    pub fn from_env() -> Result<Self, ConfigError> {
        // Parse environment - required
        let env_str = env::var("RUST_ENV").map_err(|_| ConfigError::MissingEnvVar("RUST_ENV"))?;

        let environment = Environment::parse(&env_str).ok_or(ConfigError::InvalidValue(
            "RUST_ENV must be 'development' or 'production'",
        ))?;

        let backend_url =
            env::var("PSYNC_BACKEND_URL").unwrap_or_else(|_| defaults::DEV_BACKEND_URL.to_string());
        let repo = env::var("PSYNC_REPO").unwrap_or_else(|_| defaults::DEV_REPO.to_string());
        let fixture_path = env::var("PSYNC_FIXTURE_PATH").ok().map(PathBuf::from);

        let request_timeout = match env::var("PSYNC_REQUEST_TIMEOUT_SECS") {
            Ok(value) => Some(Duration::from_secs(value.parse::<u64>().map_err(|_| {
                ConfigError::InvalidValue("PSYNC_REQUEST_TIMEOUT_SECS must be a valid number")
            })?)),
            Err(_) => None,
        };

        let no_jobs = match env::var("PSYNC_NO_JOBS") {
            Ok(value) => parse_bool(&value)
                .ok_or(ConfigError::InvalidValue("PSYNC_NO_JOBS must be true or false"))?,
            Err(_) => false,
        };

        let sync = SyncSettings {
            push_count: parse_var(
                "PSYNC_PUSH_COUNT",
                defaults::PUSH_COUNT,
                "PSYNC_PUSH_COUNT must be a valid number",
            )?,
            job_poll_interval: Duration::from_secs(parse_var(
                "PSYNC_JOB_POLL_INTERVAL_SECS",
                defaults::JOB_POLL_INTERVAL_SECS,
                "PSYNC_JOB_POLL_INTERVAL_SECS must be a valid number",
            )?),
            push_poll_interval: Duration::from_secs(parse_var(
                "PSYNC_PUSH_POLL_INTERVAL_SECS",
                defaults::PUSH_POLL_INTERVAL_SECS,
                "PSYNC_PUSH_POLL_INTERVAL_SECS must be a valid number",
            )?),
            max_poll_multiplier: parse_var(
                "PSYNC_MAX_POLL_MULTIPLIER",
                defaults::MAX_POLL_MULTIPLIER,
                "PSYNC_MAX_POLL_MULTIPLIER must be a valid number",
            )?,
            quiet_window_multiplier: parse_var(
                "PSYNC_QUIET_WINDOW_MULTIPLIER",
                defaults::QUIET_WINDOW_MULTIPLIER,
                "PSYNC_QUIET_WINDOW_MULTIPLIER must be a valid number",
            )?,
            watermark_slack: Duration::from_secs(parse_var(
                "PSYNC_WATERMARK_SLACK_SECS",
                defaults::WATERMARK_SLACK_SECS,
                "PSYNC_WATERMARK_SLACK_SECS must be a valid number",
            )?),
            job_chunk_size: parse_var(
                "PSYNC_JOB_CHUNK_SIZE",
                defaults::JOB_CHUNK_SIZE,
                "PSYNC_JOB_CHUNK_SIZE must be a valid number",
            )?,
            job_retry_delay: Duration::from_secs(parse_var(
                "PSYNC_JOB_RETRY_DELAY_SECS",
                defaults::JOB_RETRY_DELAY_SECS,
                "PSYNC_JOB_RETRY_DELAY_SECS must be a valid number",
            )?),
            no_jobs,
        };

        let filters = PushFilters {
            revision: env::var("PSYNC_REVISION").ok(),
            author: env::var("PSYNC_AUTHOR").ok(),
            fromchange: env::var("PSYNC_FROMCHANGE").ok(),
            tochange: env::var("PSYNC_TOCHANGE").ok(),
            startdate: env::var("PSYNC_STARTDATE").ok(),
            enddate: env::var("PSYNC_ENDDATE").ok(),
        };

        let config = Config {
            environment,
            backend_url,
            repo,
            fixture_path,
            request_timeout,
            sync,
            filters,
        };

        config.validate()?;

        // Validate production configuration
        if environment.is_production() {
            config.validate_production()?;
        }

        Ok(config)
    }

    /// Reject settings the pollers cannot run with.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.push_count == 0 {
            return Err(ConfigError::InvalidValue("PSYNC_PUSH_COUNT must be at least 1"));
        }
        if self.sync.job_chunk_size == 0 {
            return Err(ConfigError::InvalidValue(
                "PSYNC_JOB_CHUNK_SIZE must be at least 1",
            ));
        }
        if self.sync.job_poll_interval.is_zero() || self.sync.push_poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue("Poll intervals must be at least 1 second"));
        }
        if self.repo.is_empty() {
            return Err(ConfigError::InvalidValue("PSYNC_REPO must not be empty"));
        }
        Ok(())
    }

    /// Validate that production configuration does not use development defaults.
    fn validate_production(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.fixture_path.is_none() && self.backend_url == defaults::DEV_BACKEND_URL {
            errors.push(format!(
                "PSYNC_BACKEND_URL is using development default '{}'. Set the production backend URL.",
                defaults::DEV_BACKEND_URL
            ));
        }

        if !self.backend_url.starts_with("http://") && !self.backend_url.starts_with("https://") {
            errors.push(format!(
                "PSYNC_BACKEND_URL '{}' is not an http(s) URL.",
                self.backend_url
            ));
        }

        if !errors.is_empty() {
            return Err(ConfigError::ProductionValidation(errors));
        }

        Ok(())
    }

    /// Check if running in development mode.
    pub fn is_development(&self) -> bool {
        self.environment.is_development()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(&'static str),

    #[error("Production configuration validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    ProductionValidation(Vec<String>),
}
