//! Backend target pool
//!
//! A pool is the ordered list of backend addresses configured for one app.
//! It never changes after startup, so every listener and relay of the app
//! shares it through an `Arc` without locking.

use crate::config::AppSpec;
use crate::error::ProxyError;
use std::sync::Arc;

/// Immutable, cheaply clonable list of backend addresses
#[derive(Debug, Clone)]
pub struct TargetPool {
    /// App name, for logging
    app: Arc<str>,

    /// Backend addresses (e.g., "10.0.0.1:80")
    targets: Arc<[String]>,
}

impl TargetPool {
    /// Create a pool. An empty target list is rejected.
    pub fn new(app: impl Into<Arc<str>>, targets: Vec<String>) -> Result<Self, ProxyError> {
        let app = app.into();
        if targets.is_empty() {
            return Err(ProxyError::EmptyPool {
                app: app.to_string(),
            });
        }

        Ok(Self {
            app,
            targets: targets.into(),
        })
    }

    /// Create the pool for an app from its configuration
    pub fn from_app(app: &AppSpec) -> Result<Self, ProxyError> {
        Self::new(app.name.as_str(), app.targets.clone())
    }

    pub fn app_name(&self) -> &str {
        &self.app
    }

    /// Number of targets; always at least one
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Address of the target at `index`
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`. Indices produced by the selector are
    /// always in range.
    pub fn target(&self, index: usize) -> &str {
        &self.targets[index]
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }
}
