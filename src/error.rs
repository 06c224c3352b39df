//! Error types
//!
//! Only startup can fail in a way that reaches the caller. Per-connection
//! failures are logged inside the relay and never surface here.

use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating the configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("config does not define any apps")]
    NoApps,

    #[error("app '{app}' has no ports")]
    EmptyPorts { app: String },

    #[error("app '{app}' has no targets")]
    EmptyTargets { app: String },
}

/// Errors raised while starting the proxy
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("target pool for app '{app}' is empty")]
    EmptyPool { app: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}
