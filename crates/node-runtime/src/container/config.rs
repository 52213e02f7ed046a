//! # Node Configuration
//!
//! Unified configuration for every subsystem plus the runtime around them.
//!
//! ## Environment Overrides
//!
//! | Variable | Field |
//! |----------|-------|
//! | `MM_DATA_DIR` | `storage.data_dir` |
//! | `MM_IN_MEMORY` | `storage.in_memory` |
//! | `MM_LICENSE_FILE` | `licensing.license_file` |
//! | `MM_GLOBAL_ADMINS` | `admins.global` (comma separated) |
//! | `MM_WORKER_THREADS` | `runtime.worker_threads` |
//! | `MM_MAX_CONCURRENT_BLOCKS` | `transfer.max_concurrent_blocks` |
//! | `MM_ALLOCATION_STRATEGY` | `allocator.strategy` |
//! | `MM_CIRCUIT_THRESHOLD` | `recovery.circuit_threshold` |
//! | `MM_MAX_PENDING_REQUESTS` | `admission.max_pending` |
//! | `MM_PBKDF2_ITERATIONS` | `keys.pbkdf2_iterations` |

use std::path::PathBuf;
use std::str::FromStr;

use mm_01_key_management::KeyManagerConfig;
use mm_02_authentication::AuthConfig;
use mm_03_resource_allocation::{AllocatorConfig, ConflictStrategy};
use mm_04_connection_recovery::RecoveryConfig;
use mm_05_admission::AdmissionConfig;
use mm_06_secure_transfer::TransferConfig;
use shared_types::{MINUTE_MS, SECOND_MS};
use thiserror::Error;

/// Complete node configuration.
#[derive(Debug, Clone, Default)]
pub struct NodeConfig {
    pub storage: StorageConfig,
    pub licensing: LicensingConfig,
    pub admins: AdminConfig,
    pub runtime: RuntimeConfig,
    pub schedule: ScheduleConfig,
    pub keys: KeyManagerConfig,
    pub auth: AuthConfig,
    pub allocator: AllocatorConfig,
    pub recovery: RecoveryConfig,
    pub admission: AdmissionConfig,
    pub transfer: TransferConfig,
}

impl NodeConfig {
    /// In-memory storage and the subsystems' test settings.
    pub fn for_testing() -> Self {
        Self {
            storage: StorageConfig {
                in_memory: true,
                ..StorageConfig::default()
            },
            licensing: LicensingConfig::default(),
            admins: AdminConfig::default(),
            runtime: RuntimeConfig { worker_threads: 2 },
            schedule: ScheduleConfig::for_testing(),
            keys: KeyManagerConfig::for_testing(),
            auth: AuthConfig::for_testing(),
            allocator: AllocatorConfig::for_testing(),
            recovery: RecoveryConfig::for_testing(),
            admission: AdmissionConfig::for_testing(),
            transfer: TransferConfig::for_testing(),
        }
    }

    /// Defaults with `MM_*` environment overrides applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults with overrides read through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup("MM_DATA_DIR") {
            config.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(flag) = lookup("MM_IN_MEMORY") {
            config.storage.in_memory = parse_flag("MM_IN_MEMORY", &flag)?;
        }
        if let Some(path) = lookup("MM_LICENSE_FILE") {
            config.licensing.license_file = Some(PathBuf::from(path));
        }
        if let Some(list) = lookup("MM_GLOBAL_ADMINS") {
            config.admins.global = list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(threads) = parse_var(&lookup, "MM_WORKER_THREADS")? {
            config.runtime.worker_threads = threads;
        }
        if let Some(blocks) = parse_var(&lookup, "MM_MAX_CONCURRENT_BLOCKS")? {
            config.transfer.max_concurrent_blocks = blocks;
        }
        if let Some(strategy) = lookup("MM_ALLOCATION_STRATEGY") {
            config.allocator.strategy = parse_strategy(&strategy)?;
        }
        if let Some(threshold) = parse_var(&lookup, "MM_CIRCUIT_THRESHOLD")? {
            config.recovery.circuit_threshold = threshold;
        }
        if let Some(max_pending) = parse_var(&lookup, "MM_MAX_PENDING_REQUESTS")? {
            config.admission.max_pending = max_pending;
        }
        if let Some(iterations) = parse_var(&lookup, "MM_PBKDF2_ITERATIONS")? {
            config.keys.pbkdf2_iterations = iterations;
        }

        Ok(config)
    }

    /// Reject settings the subsystems cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.storage.in_memory && self.storage.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::MissingDataDir);
        }
        if self.runtime.worker_threads == 0 {
            return Err(ConfigError::ZeroLimit("runtime.worker_threads"));
        }
        if self.transfer.max_concurrent_blocks == 0 {
            return Err(ConfigError::ZeroLimit("transfer.max_concurrent_blocks"));
        }
        if self.transfer.retry_base_delay_ms > self.transfer.retry_max_delay_ms {
            return Err(ConfigError::Inconsistent(
                "transfer retry base delay exceeds its cap".into(),
            ));
        }
        if self.recovery.circuit_threshold == 0 {
            return Err(ConfigError::ZeroLimit("recovery.circuit_threshold"));
        }
        if self.recovery.base_delay_ms > self.recovery.max_delay_ms {
            return Err(ConfigError::Inconsistent(
                "recovery base delay exceeds its cap".into(),
            ));
        }
        if self.recovery.jitter_min > self.recovery.jitter_max {
            return Err(ConfigError::Inconsistent(
                "recovery jitter range is inverted".into(),
            ));
        }
        if self.admission.max_pending == 0 {
            return Err(ConfigError::ZeroLimit("admission.max_pending"));
        }
        if self.admission.default_ttl_ms > self.admission.max_ttl_ms {
            return Err(ConfigError::Inconsistent(
                "admission default TTL exceeds the maximum TTL".into(),
            ));
        }
        if self.allocator.total.is_zero() {
            return Err(ConfigError::Inconsistent("resource pool is empty".into()));
        }
        for (task, interval_ms) in self.schedule.intervals() {
            if interval_ms == 0 {
                return Err(ConfigError::ZeroInterval(task));
            }
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} has an invalid value: {value}")]
    InvalidValue { var: &'static str, value: String },

    #[error("a data directory is required unless storage is in-memory")]
    MissingDataDir,

    #[error("{0} must be greater than zero")]
    ZeroLimit(&'static str),

    #[error("periodic task {0} has a zero interval")]
    ZeroInterval(&'static str),

    #[error("inconsistent configuration: {0}")]
    Inconsistent(String),
}

fn parse_var<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { var, value }),
        None => Ok(None),
    }
}

fn parse_flag(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var,
            value: value.to_string(),
        }),
    }
}

fn parse_strategy(value: &str) -> Result<ConflictStrategy, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "priority_based" | "priority" => Ok(ConflictStrategy::PriorityBased),
        "fair_share" => Ok(ConflictStrategy::FairShare),
        "fcfs" | "first_come_first_served" => Ok(ConflictStrategy::FirstComeFirstServed),
        _ => Err(ConfigError::InvalidValue {
            var: "MM_ALLOCATION_STRATEGY",
            value: value.to_string(),
        }),
    }
}

/// Storage configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root of the JSON record store.
    pub data_dir: PathBuf,
    /// Keep every record in memory only.
    pub in_memory: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            in_memory: false,
        }
    }
}

/// License table configuration.
#[derive(Debug, Clone, Default)]
pub struct LicensingConfig {
    /// JSON array of license grants imported at startup.
    pub license_file: Option<PathBuf>,
}

/// Admins with authority over every network.
#[derive(Debug, Clone, Default)]
pub struct AdminConfig {
    pub global: Vec<String>,
}

/// Tokio runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Worker threads of the multi-threaded scheduler.
    pub worker_threads: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: num_cpus::get().max(1),
        }
    }
}

/// Intervals of the periodic passes, ms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub admission_sweep_ms: u64,
    pub key_cleanup_ms: u64,
    pub challenge_cleanup_ms: u64,
    pub allocation_pass_ms: u64,
    pub allocation_maintenance_ms: u64,
    pub health_monitor_ms: u64,
    pub circuit_check_ms: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            admission_sweep_ms: MINUTE_MS,
            key_cleanup_ms: 60 * MINUTE_MS,
            challenge_cleanup_ms: MINUTE_MS,
            allocation_pass_ms: 5 * SECOND_MS,
            allocation_maintenance_ms: MINUTE_MS,
            health_monitor_ms: 30 * SECOND_MS,
            circuit_check_ms: 10 * SECOND_MS,
        }
    }
}

impl ScheduleConfig {
    /// Sub-second ticks for paused-time tests.
    pub fn for_testing() -> Self {
        Self {
            admission_sweep_ms: 500,
            key_cleanup_ms: 500,
            challenge_cleanup_ms: 500,
            allocation_pass_ms: 100,
            allocation_maintenance_ms: 500,
            health_monitor_ms: 250,
            circuit_check_ms: 100,
        }
    }

    /// Every task name with its interval.
    pub fn intervals(&self) -> [(&'static str, u64); 7] {
        [
            ("admission_sweep", self.admission_sweep_ms),
            ("key_cleanup", self.key_cleanup_ms),
            ("challenge_cleanup", self.challenge_cleanup_ms),
            ("allocation_pass", self.allocation_pass_ms),
            ("allocation_maintenance", self.allocation_maintenance_ms),
            ("health_monitor", self.health_monitor_ms),
            ("circuit_check", self.circuit_check_ms),
        ]
    }
}
