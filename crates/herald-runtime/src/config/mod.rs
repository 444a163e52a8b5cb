//! Configuration module for the Herald runtime.
//!
//! Layered loading ([`ConfigLoader`]), the schema ([`HeraldConfig`]) and
//! validation ([`validate_config`]).

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    BotConfig, BusConfig, HeraldConfig, LogFormat, LogLevel, LogOutput, LogRotation,
    LoggingConfig, PollerConfig, ShutdownConfig, SourceConfig, SpanEventConfig, WebhookConfig,
};
pub use validation::validate_config;
