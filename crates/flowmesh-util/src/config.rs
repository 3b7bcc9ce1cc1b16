//! Process configuration, read from the environment with sane defaults.
//! There is no config file: every knob the binary needs is small enough
//! to live in an env var.

use std::env;
use std::net::SocketAddr;

use thiserror::Error;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_DEADLINE_MS: u64 = 15_000;
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("FLOWMESH_BIND_ADDR={value:?} is not a valid socket address")]
    InvalidBindAddr { value: String },
    #[error("FLOWMESH_DEFAULT_DEADLINE_MS={value:?} is not a valid positive integer")]
    InvalidDeadline { value: String },
}

/// Runtime configuration for `flowmesh-server`.
#[derive(Debug, Clone)]
pub struct FlowmeshConfig {
    /// Address the REST/WebSocket listener binds to.
    pub bind_addr: SocketAddr,
    /// Default task deadline (spec §4.2.2) used when a submitted workflow
    /// does not override it per task.
    pub default_deadline_ms: u64,
    /// `tracing_subscriber::EnvFilter` directive string.
    pub log_filter: String,
}

impl FlowmeshConfig {
    /// Load configuration from the environment, falling back to defaults
    /// for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr = match env::var("FLOWMESH_BIND_ADDR") {
            Ok(value) if !value.trim().is_empty() => value.parse().map_err(|_| ConfigError::InvalidBindAddr { value: value.clone() })?,
            _ => DEFAULT_BIND_ADDR.parse().expect("default bind addr is valid"),
        };

        let default_deadline_ms = match env::var("FLOWMESH_DEFAULT_DEADLINE_MS") {
            Ok(value) if !value.trim().is_empty() => {
                let parsed: u64 = value.parse().map_err(|_| ConfigError::InvalidDeadline { value: value.clone() })?;
                if parsed == 0 {
                    return Err(ConfigError::InvalidDeadline { value });
                }
                parsed
            }
            _ => DEFAULT_DEADLINE_MS,
        };

        let log_filter = env::var("FLOWMESH_LOG").ok().filter(|value| !value.trim().is_empty()).unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Ok(Self { bind_addr, default_deadline_ms, log_filter })
    }
}
