//! Per-port listener
//!
//! A listener owns one bound socket and runs an accept loop on its own task,
//! spawning a relay per accepted connection. It moves through
//! `Created → Listening → Draining → Closed`; stopping it closes the socket
//! but leaves in-flight relays running until they finish on their own.

use crate::error::ProxyError;
use crate::proxy::{ConnectionRelay, RelayOutcome, TargetPool, TargetSelector};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{Instrument, debug, error, info};

/// Pause after a failed accept so persistent errors do not spin the loop
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Lifecycle of a listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Socket bound, accept loop not started
    Created,
    /// Accepting connections
    Listening,
    /// Stop requested, socket being closed
    Draining,
    /// Accept loop returned and socket closed
    Closed,
}

/// A bound listener that has not started accepting yet
pub struct ListenerService {
    listener: TcpListener,
    local_addr: SocketAddr,
    pool: TargetPool,
    selector: Arc<TargetSelector>,
    connect_timeout: Option<Duration>,
}

impl ListenerService {
    /// Bind `addr` eagerly
    pub async fn bind(
        addr: SocketAddr,
        pool: TargetPool,
        selector: Arc<TargetSelector>,
    ) -> Result<Self, ProxyError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ProxyError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ProxyError::Bind { addr, source })?;

        info!(app = pool.app_name(), addr = %local_addr, "Listener bound");

        Ok(Self {
            listener,
            local_addr,
            pool,
            selector,
            connect_timeout: None,
        })
    }

    /// Bound every dial made by this listener's relays
    pub fn with_connect_timeout(mut self, connect_timeout: Option<Duration>) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> ListenerState {
        ListenerState::Created
    }

    /// Start the accept loop on a new task
    pub fn spawn(self) -> ListenerHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(ListenerState::Listening);
        let local_addr = self.local_addr;

        tokio::spawn(self.accept_loop(stop_rx, state_tx));

        ListenerHandle {
            local_addr,
            stop_tx,
            state_rx,
        }
    }

    async fn accept_loop(
        self,
        mut stop_rx: watch::Receiver<bool>,
        state_tx: watch::Sender<ListenerState>,
    ) {
        let Self {
            listener,
            local_addr,
            pool,
            selector,
            connect_timeout,
        } = self;

        info!(app = pool.app_name(), addr = %local_addr, "Listening");

        loop {
            if *stop_rx.borrow() {
                break;
            }

            tokio::select! {
                // Fires on stop, and also when the handle is dropped.
                _ = stop_rx.changed() => break,

                accepted = listener.accept() => match accepted {
                    Ok((client, peer)) => {
                        let initial = selector.pick_initial(pool.len());
                        info!(
                            app = pool.app_name(),
                            peer = %peer,
                            backend = pool.target(initial),
                            "Accepted connection"
                        );

                        let relay = ConnectionRelay::new(client, pool.clone())
                            .with_connect_timeout(connect_timeout);
                        let span = tracing::info_span!(
                            "connection",
                            peer = %peer,
                            port = local_addr.port()
                        );

                        tokio::spawn(
                            async move {
                                let outcome = relay.run(initial).await;
                                if let RelayOutcome::Exhausted { attempts } = outcome {
                                    debug!(attempts, "Connection dropped");
                                }
                            }
                            .instrument(span),
                        );
                    }
                    Err(e) => {
                        if *stop_rx.borrow() {
                            break;
                        }
                        error!(
                            app = pool.app_name(),
                            addr = %local_addr,
                            error = %e,
                            "Accept error"
                        );
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                },
            }
        }

        state_tx.send_replace(ListenerState::Draining);
        drop(listener);
        state_tx.send_replace(ListenerState::Closed);
        info!(app = pool.app_name(), addr = %local_addr, "Listener closed");
    }
}

/// Control handle for a running listener
///
/// Dropping the handle stops the listener as well.
#[derive(Debug)]
pub struct ListenerHandle {
    local_addr: SocketAddr,
    stop_tx: watch::Sender<bool>,
    state_rx: watch::Receiver<ListenerState>,
}

impl ListenerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> ListenerState {
        *self.state_rx.borrow()
    }

    /// Ask the accept loop to stop and close the socket. Does not wait.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Wait until the accept loop has returned and the socket is closed
    pub async fn closed(&self) {
        let mut state_rx = self.state_rx.clone();
        while *state_rx.borrow_and_update() != ListenerState::Closed {
            // Sender gone means the accept task is gone too.
            if state_rx.changed().await.is_err() {
                break;
            }
        }
    }

    /// Stop and wait for the socket to close
    pub async fn shutdown(self) {
        self.stop();
        self.closed().await;
    }
}
