//! Proxy runtime
//!
//! Owns one listener per (app, port) pair. Startup binds everything before
//! serving so that a single bad port aborts the whole process; shutdown stops
//! every listener and waits until all of them have closed their sockets.

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::proxy::{TargetPool, TargetSelector};
use crate::server::listener::{ListenerHandle, ListenerService};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// Set of running listeners
#[derive(Debug)]
pub struct ProxyRuntime {
    listeners: Vec<ListenerHandle>,
}

impl ProxyRuntime {
    /// Bind and start every listener named by `config`
    pub async fn start(config: &ProxyConfig) -> Result<Self, ProxyError> {
        Self::start_with_selector(config, Arc::new(TargetSelector::new())).await
    }

    /// Like [`ProxyRuntime::start`], with an explicit selector shared by all
    /// listeners
    pub async fn start_with_selector(
        config: &ProxyConfig,
        selector: Arc<TargetSelector>,
    ) -> Result<Self, ProxyError> {
        config.validate()?;

        let pools = config
            .apps
            .iter()
            .map(TargetPool::from_app)
            .collect::<Result<Vec<_>, _>>()?;

        // Bind everything first. If any bind fails the services bound so far
        // are dropped here, which closes their sockets.
        let mut services = Vec::new();
        for (app, pool) in config.apps.iter().zip(&pools) {
            for &port in &app.ports {
                let addr = SocketAddr::new(config.listen_host, port);
                let service = ListenerService::bind(addr, pool.clone(), Arc::clone(&selector))
                    .await?
                    .with_connect_timeout(app.connect_timeout());
                services.push(service);
            }
        }

        let listeners: Vec<ListenerHandle> =
            services.into_iter().map(ListenerService::spawn).collect();

        info!(listeners = listeners.len(), "Proxy started");

        Ok(Self { listeners })
    }

    /// Addresses of every listener, in config order
    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.listeners.iter().map(ListenerHandle::local_addr).collect()
    }

    pub fn listeners(&self) -> &[ListenerHandle] {
        &self.listeners
    }

    /// Stop accepting on every listener and wait until all are closed
    ///
    /// Connections already being relayed are left to finish on their own.
    pub async fn shutdown(self) {
        info!(listeners = self.listeners.len(), "Stopping services");

        for listener in &self.listeners {
            info!(addr = %listener.local_addr(), "Closing listener");
            listener.stop();
        }

        for listener in &self.listeners {
            listener.closed().await;
        }

        info!("All listeners closed");
    }

    /// Serve until `signal` completes, then shut down
    pub async fn run_until<F>(self, signal: F)
    where
        F: Future<Output = ()>,
    {
        signal.await;
        info!("Received shutdown signal");
        self.shutdown().await;
    }
}
