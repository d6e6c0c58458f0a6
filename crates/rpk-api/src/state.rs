//! # Application State & Configuration
//!
//! [`AppConfig`] is read from environment variables with defaults; invalid
//! values are a [`ConfigError`] at startup. [`AppState`] carries the shared
//! [`RulepackRegistry`] handle into every handler via the `State` extractor.

use std::sync::Arc;
use std::time::Duration;

use rpk_registry::{
    InMemorySnapshotRepository, RegistryConfig, RulepackRegistry, TaxRuleEvaluator,
    UnconfiguredEvaluator,
};
use thiserror::Error;
use url::Url;

use crate::evaluator::HttpEvaluator;

// -- Configuration ------------------------------------------------------------

/// Log output format for the server binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidValue { var: String, reason: String },
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("evaluator client could not be built: {0}")]
    EvaluatorClient(String),
}

/// Server configuration.
///
/// Custom `Debug` redacts the `auth_token`.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Static bearer secret. `None` disables authentication.
    pub auth_token: Option<String>,
    /// UTC hour of the daily regression sweep.
    pub sweep_hour_utc: u32,
    /// Interval between statute scans.
    pub statute_scan_interval: Duration,
    /// Remote Tax Rule Evaluator endpoint.
    pub evaluator_url: Option<Url>,
    /// Per-vector evaluator timeout.
    pub evaluator_timeout: Duration,
    /// Age after which a `running` run is expired.
    pub stale_run_after: Duration,
    /// Runs averaged by the dashboard.
    pub dashboard_window: usize,
    /// Log output format.
    pub log_format: LogFormat,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("sweep_hour_utc", &self.sweep_hour_utc)
            .field("statute_scan_interval", &self.statute_scan_interval)
            .field("evaluator_url", &self.evaluator_url.as_ref().map(Url::as_str))
            .field("evaluator_timeout", &self.evaluator_timeout)
            .field("stale_run_after", &self.stale_run_after)
            .field("dashboard_window", &self.dashboard_window)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let registry = RegistryConfig::default();
        Self {
            port: 8080,
            auth_token: None,
            sweep_hour_utc: 2,
            statute_scan_interval: Duration::from_secs(6 * 3600),
            evaluator_url: None,
            evaluator_timeout: registry.evaluator_timeout,
            stale_run_after: registry.stale_run_after,
            dashboard_window: registry.dashboard_window,
            log_format: LogFormat::Text,
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// Variables: `PORT`, `AUTH_TOKEN`, `REGRESSION_SWEEP_HOUR_UTC`,
    /// `STATUTE_SCAN_INTERVAL_HOURS`, `EVALUATOR_URL`,
    /// `EVALUATOR_TIMEOUT_SECS`, `STALE_RUN_AFTER_MINUTES`,
    /// `DASHBOARD_WINDOW`, `LOG_FORMAT`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let sweep_hour_utc = parse_or(&get, "REGRESSION_SWEEP_HOUR_UTC", defaults.sweep_hour_utc)?;
        if sweep_hour_utc > 23 {
            return Err(invalid("REGRESSION_SWEEP_HOUR_UTC", "must be between 0 and 23"));
        }
        let scan_hours: u64 = parse_or(&get, "STATUTE_SCAN_INTERVAL_HOURS", 6)?;
        let timeout_secs: u64 = parse_or(
            &get,
            "EVALUATOR_TIMEOUT_SECS",
            defaults.evaluator_timeout.as_secs(),
        )?;
        let stale_minutes: u64 = parse_or(
            &get,
            "STALE_RUN_AFTER_MINUTES",
            defaults.stale_run_after.as_secs() / 60,
        )?;
        let dashboard_window: usize = parse_or(&get, "DASHBOARD_WINDOW", defaults.dashboard_window)?;
        for (var, value) in [
            ("STATUTE_SCAN_INTERVAL_HOURS", scan_hours),
            ("EVALUATOR_TIMEOUT_SECS", timeout_secs),
            ("STALE_RUN_AFTER_MINUTES", stale_minutes),
            ("DASHBOARD_WINDOW", dashboard_window as u64),
        ] {
            if value == 0 {
                return Err(invalid(var, "must be at least 1"));
            }
        }

        let evaluator_url = get("EVALUATOR_URL")
            .map(|raw| {
                Url::parse(raw.trim())
                    .map_err(|e| ConfigError::InvalidUrl("EVALUATOR_URL".into(), e.to_string()))
            })
            .transpose()?;

        let log_format = match get("LOG_FORMAT").as_deref().map(str::trim) {
            Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            port: parse_or(&get, "PORT", defaults.port)?,
            auth_token: get("AUTH_TOKEN"),
            sweep_hour_utc,
            statute_scan_interval: Duration::from_secs(scan_hours * 3600),
            evaluator_url,
            evaluator_timeout: Duration::from_secs(timeout_secs),
            stale_run_after: Duration::from_secs(stale_minutes * 60),
            dashboard_window,
            log_format,
        })
    }

    /// Tunables handed to the registry core.
    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            evaluator_timeout: self.evaluator_timeout,
            stale_run_after: self.stale_run_after,
            dashboard_window: self.dashboard_window,
            ..RegistryConfig::default()
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    var: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match get(var) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| invalid(var, &e.to_string())),
        None => Ok(default),
    }
}

fn invalid(var: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        var: var.to_string(),
        reason: reason.to_string(),
    }
}

// -- Application State --------------------------------------------------------

/// Shared state for every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The registry handle.
    pub registry: RulepackRegistry,
    /// Server configuration.
    pub config: AppConfig,
}

impl AppState {
    /// Default configuration, in-memory snapshots, no evaluator.
    pub fn new() -> Self {
        let config = AppConfig::default();
        let registry = RulepackRegistry::new(
            Arc::new(InMemorySnapshotRepository::new()),
            Arc::new(UnconfiguredEvaluator),
            config.registry_config(),
        );
        Self { registry, config }
    }

    /// Wire the registry from configuration: an [`HttpEvaluator`] when
    /// `evaluator_url` is set, otherwise the unconfigured evaluator.
    pub fn from_config(config: AppConfig) -> Result<Self, ConfigError> {
        let evaluator: Arc<dyn TaxRuleEvaluator> = match &config.evaluator_url {
            Some(url) => Arc::new(
                HttpEvaluator::new(url.clone(), config.evaluator_timeout)
                    .map_err(|e| ConfigError::EvaluatorClient(e.to_string()))?,
            ),
            None => {
                tracing::warn!("EVALUATOR_URL not set; every regression vector will fail");
                Arc::new(UnconfiguredEvaluator)
            }
        };
        let registry = RulepackRegistry::new(
            Arc::new(InMemorySnapshotRepository::new()),
            evaluator,
            config.registry_config(),
        );
        Ok(Self { registry, config })
    }

    /// Serve an existing registry.
    pub fn with_registry(registry: RulepackRegistry, config: AppConfig) -> Self {
        Self { registry, config }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
