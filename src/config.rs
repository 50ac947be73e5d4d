use crate::circuit_breaker::CircuitBreakerConfig;
use crate::error::Result;
use crate::health::HealthConfig;
use crate::manager::ErrorHandlingManagerConfig;
use crate::operations::WrapperConfig;
use crate::persistence::StoreConfig;
use crate::retry::RetryConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an optional configuration file
pub const CONFIG_PATH_ENV: &str = "AGENT_RESILIENCE_CONFIG";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerSettings,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub health: HealthSettings,

    #[serde(default)]
    pub error_log: ErrorLogSettings,

    #[serde(default)]
    pub operations: OperationSettings,

    #[serde(default)]
    pub persistence: PersistenceSettings,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the embedded defaults, an optional file and
    /// the environment.
    ///
    /// The file is `path` if given, else `$AGENT_RESILIENCE_CONFIG`. Environment
    /// overrides use the `AGENT_RESILIENCE__` prefix with `__` between
    /// sections, e.g. `AGENT_RESILIENCE__RETRY__MAX_RETRIES=5`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from));

        let mut builder = config::Config::builder().add_source(config::File::from_str(
            include_str!("../config/default.toml"),
            config::FileFormat::Toml,
        ));

        if let Some(file) = file {
            builder = builder.add_source(config::File::from(file).required(false));
        }

        let config: Config = builder
            .add_source(
                config::Environment::with_prefix("AGENT_RESILIENCE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.manager_config().validate()?;
        Ok(config)
    }

    pub fn manager_config(&self) -> ErrorHandlingManagerConfig {
        ErrorHandlingManagerConfig {
            circuit_breaker: self.circuit_breaker.to_breaker_config(),
            retry: self.retry.to_retry_config(),
            health: self.health.to_health_config(),
            max_log_size: self.error_log.max_size,
            event_capacity: self.error_log.event_capacity,
        }
    }

    pub fn wrapper_config(&self) -> WrapperConfig {
        WrapperConfig {
            component: self.operations.component.clone(),
            max_memory_ratio: self.operations.max_memory_ratio,
            history_size: self.operations.history_size,
        }
    }

    pub fn store_config(&self) -> StoreConfig {
        self.persistence.to_store_config()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerSettings {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Open state duration before a trial call (seconds)
    #[serde(default = "default_recovery_timeout_secs")]
    pub recovery_timeout_secs: u64,

    #[serde(default = "default_half_open_successes")]
    pub required_half_open_successes: u32,
}

impl CircuitBreakerSettings {
    pub fn to_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            recovery_timeout: Duration::from_secs(self.recovery_timeout_secs),
            required_half_open_successes: self.required_half_open_successes,
        }
    }
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            recovery_timeout_secs: default_recovery_timeout_secs(),
            required_half_open_successes: default_half_open_successes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    #[serde(default = "default_jitter_fraction")]
    pub jitter_fraction: f64,
}

impl RetrySettings {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            backoff_multiplier: self.backoff_multiplier,
            jitter_fraction: self.jitter_fraction,
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter_fraction: default_jitter_fraction(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSettings {
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,

    /// Trailing window for the error rate (seconds)
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    #[serde(default = "default_max_error_rate")]
    pub max_error_rate: f64,

    #[serde(default = "default_max_critical_errors")]
    pub max_critical_errors: usize,

    #[serde(default = "default_max_open_breakers")]
    pub max_open_breakers: usize,
}

impl HealthSettings {
    pub fn to_health_config(&self) -> HealthConfig {
        HealthConfig {
            check_interval: Duration::from_secs(self.check_interval_secs),
            window: Duration::from_secs(self.window_secs),
            max_error_rate: self.max_error_rate,
            max_critical_errors: self.max_critical_errors,
            max_open_breakers: self.max_open_breakers,
        }
    }
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval_secs(),
            window_secs: default_window_secs(),
            max_error_rate: default_max_error_rate(),
            max_critical_errors: default_max_critical_errors(),
            max_open_breakers: default_max_open_breakers(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorLogSettings {
    #[serde(default = "default_max_log_size")]
    pub max_size: usize,

    /// Broadcast channel capacity for async event consumers
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for ErrorLogSettings {
    fn default() -> Self {
        Self {
            max_size: default_max_log_size(),
            event_capacity: default_event_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationSettings {
    #[serde(default = "default_component")]
    pub component: String,

    #[serde(default = "default_max_memory_ratio")]
    pub max_memory_ratio: f64,

    #[serde(default = "default_history_size")]
    pub history_size: usize,
}

impl Default for OperationSettings {
    fn default() -> Self {
        Self {
            component: default_component(),
            max_memory_ratio: default_max_memory_ratio(),
            history_size: default_history_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceSettings {
    /// Root directory; the database lives in `db/`, backups in `backups/`
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Overrides `<data_dir>/backups`
    pub backup_dir: Option<PathBuf>,

    #[serde(default = "default_min_db_size_bytes")]
    pub min_db_size_bytes: u64,

    #[serde(default = "default_fallback_capacity")]
    pub fallback_capacity: u64,

    #[serde(default = "default_transaction_retention_secs")]
    pub transaction_retention_secs: u64,

    #[serde(default = "default_backup_retention_secs")]
    pub backup_retention_secs: u64,

    #[serde(default = "default_min_backup_interval_secs")]
    pub min_backup_interval_secs: u64,

    #[serde(default = "default_maintenance_interval_secs")]
    pub maintenance_interval_secs: u64,
}

impl PersistenceSettings {
    pub fn to_store_config(&self) -> StoreConfig {
        StoreConfig {
            data_dir: self.data_dir.join("db"),
            backup_dir: self
                .backup_dir
                .clone()
                .unwrap_or_else(|| self.data_dir.join("backups")),
            min_db_size_bytes: self.min_db_size_bytes,
            fallback_capacity: self.fallback_capacity,
            transaction_retention: Duration::from_secs(self.transaction_retention_secs),
            backup_retention: Duration::from_secs(self.backup_retention_secs),
            min_backup_interval: Duration::from_secs(self.min_backup_interval_secs),
            maintenance_interval: Duration::from_secs(self.maintenance_interval_secs),
        }
    }
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            backup_dir: None,
            min_db_size_bytes: default_min_db_size_bytes(),
            fallback_capacity: default_fallback_capacity(),
            transaction_retention_secs: default_transaction_retention_secs(),
            backup_retention_secs: default_backup_retention_secs(),
            min_backup_interval_secs: default_min_backup_interval_secs(),
            maintenance_interval_secs: default_maintenance_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Filter used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

// Default value functions
fn default_failure_threshold() -> u32 {
    5
}

fn default_recovery_timeout_secs() -> u64 {
    30
}

fn default_half_open_successes() -> u32 {
    3
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_jitter_fraction() -> f64 {
    0.1
}

fn default_check_interval_secs() -> u64 {
    60
}

fn default_window_secs() -> u64 {
    300
}

fn default_max_error_rate() -> f64 {
    0.10
}

fn default_max_critical_errors() -> usize {
    5
}

fn default_max_open_breakers() -> usize {
    3
}

fn default_max_log_size() -> usize {
    1000
}

fn default_event_capacity() -> usize {
    256
}

fn default_component() -> String {
    "mcp-tools".to_string()
}

fn default_max_memory_ratio() -> f64 {
    0.9
}

fn default_history_size() -> usize {
    100
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_min_db_size_bytes() -> u64 {
    1
}

fn default_fallback_capacity() -> u64 {
    100_000
}

fn default_transaction_retention_secs() -> u64 {
    24 * 3600
}

fn default_backup_retention_secs() -> u64 {
    7 * 24 * 3600
}

fn default_min_backup_interval_secs() -> u64 {
    60
}

fn default_maintenance_interval_secs() -> u64 {
    300
}

fn default_log_level() -> String {
    "agent_resilience=info".to_string()
}
