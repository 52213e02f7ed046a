//! # Control Plane Container
//!
//! Central container holding every subsystem instance, with lifetime
//! management and dependency injection through adapters.
//!
//! - Subsystems are built in dependency order (independent first)
//! - Cross-subsystem calls go through adapters, notifications through the bus
//! - Configuration is validated before anything is built

pub mod authority;
pub mod config;
pub mod errors;
pub mod plane;

pub use authority::{load_or_create_authority, AUTHORITY_COLLECTION};
pub use config::{
    AdminConfig, ConfigError, LicensingConfig, NodeConfig, RuntimeConfig, ScheduleConfig, StorageConfig,
};
pub use errors::ControlPlaneError;
pub use plane::ControlPlane;
