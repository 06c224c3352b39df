//! Proxy configuration
//!
//! The configuration is a YAML document listing apps. Every app exposes one
//! or more ports and forwards them to a shared pool of `host:port` targets.
//!
//! ```yaml
//! listen_host: 0.0.0.0
//! apps:
//!   - name: web
//!     ports: [8080, 8081]
//!     targets: ["10.0.0.1:80", "10.0.0.2:80"]
//!     connect_timeout_ms: 2000
//! ```

use crate::error::ConfigError;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::time::Duration;

/// Default location of the config file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "./config.yaml";

/// Top-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    /// Interface every listener binds to
    #[serde(default = "default_listen_host")]
    pub listen_host: IpAddr,

    pub apps: Vec<AppSpec>,
}

/// One app: a set of listening ports sharing a pool of targets
#[derive(Debug, Clone, Deserialize)]
pub struct AppSpec {
    /// Name used in logs only
    pub name: String,

    pub ports: Vec<u16>,

    /// Backend addresses in `host:port` form
    pub targets: Vec<String>,

    /// Upper bound on a single dial attempt. No bound when unset.
    #[serde(default)]
    pub connect_timeout_ms: Option<u64>,
}

fn default_listen_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

impl AppSpec {
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }
}

impl ProxyConfig {
    /// Read, parse and validate a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_yaml_str(&content)
    }

    /// Parse and validate a config document
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ProxyConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the proxy core relies on: at least one app, and
    /// every app has at least one port and one target.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.apps.is_empty() {
            return Err(ConfigError::NoApps);
        }

        for app in &self.apps {
            if app.ports.is_empty() {
                return Err(ConfigError::EmptyPorts {
                    app: app.name.clone(),
                });
            }
            if app.targets.is_empty() {
                return Err(ConfigError::EmptyTargets {
                    app: app.name.clone(),
                });
            }
        }

        Ok(())
    }
}

