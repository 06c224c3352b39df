//! Connection relaying
//!
//! A relay owns one accepted client connection. It dials a backend from the
//! app's pool, falling back to the next target on failure, and then pipes
//! bytes in both directions until both sides are done.

use crate::proxy::backend::TargetPool;
use crate::proxy::selector::TargetSelector;
use bytes::BytesMut;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Default buffer size for each copy direction
const BUFFER_SIZE: usize = 8192;

/// How a relay ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// A backend accepted the connection and both directions finished
    Relayed {
        target: String,
        attempts: usize,
        bytes_to_backend: u64,
        bytes_from_backend: u64,
    },
    /// Every target refused; the client was dropped without relaying data
    Exhausted { attempts: usize },
}

impl RelayOutcome {
    pub fn attempts(&self) -> usize {
        match self {
            RelayOutcome::Relayed { attempts, .. } | RelayOutcome::Exhausted { attempts } => {
                *attempts
            }
        }
    }
}

/// Relays one client connection to one backend
pub struct ConnectionRelay {
    client: TcpStream,
    pool: TargetPool,
    connect_timeout: Option<Duration>,
}

impl ConnectionRelay {
    pub fn new(client: TcpStream, pool: TargetPool) -> Self {
        Self {
            client,
            pool,
            connect_timeout: None,
        }
    }

    /// Bound every dial attempt by `connect_timeout`
    pub fn with_connect_timeout(mut self, connect_timeout: Option<Duration>) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Run the relay to completion, starting at target `initial`
    ///
    /// Never fails: errors are logged and only affect this connection. The
    /// client and backend sockets are closed when this returns, whatever the
    /// path taken.
    pub async fn run(self, initial: usize) -> RelayOutcome {
        let Self {
            mut client,
            pool,
            connect_timeout,
        } = self;

        let mut attempts = 0;

        for index in TargetSelector::retry_sequence(initial, pool.len()) {
            let target = pool.target(index);
            attempts += 1;

            debug!(
                app = pool.app_name(),
                backend = target,
                attempt = attempts,
                max_attempts = pool.len(),
                "Dialing target"
            );

            let mut backend = match dial(target, connect_timeout).await {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(
                        app = pool.app_name(),
                        backend = target,
                        attempt = attempts,
                        error = %e,
                        "Unable to connect to target"
                    );
                    continue;
                }
            };

            info!(
                app = pool.app_name(),
                backend = target,
                attempt = attempts,
                "Connected to target"
            );

            let (bytes_to_backend, bytes_from_backend) =
                relay_bidirectional(&mut client, &mut backend).await;

            info!(
                app = pool.app_name(),
                backend = target,
                bytes_to_backend,
                bytes_from_backend,
                "Closing connection"
            );

            return RelayOutcome::Relayed {
                target: target.to_string(),
                attempts,
                bytes_to_backend,
                bytes_from_backend,
            };
        }

        error!(
            app = pool.app_name(),
            attempts, "Failed to find any healthy targets, closing connection"
        );

        RelayOutcome::Exhausted { attempts }
    }
}

async fn dial(target: &str, connect_timeout: Option<Duration>) -> io::Result<TcpStream> {
    match connect_timeout {
        Some(limit) => timeout(limit, TcpStream::connect(target))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))?,
        None => TcpStream::connect(target).await,
    }
}

/// Pipe `client` and `backend` into each other until both directions end
///
/// Returns (bytes client→backend, bytes backend→client).
async fn relay_bidirectional(client: &mut TcpStream, backend: &mut TcpStream) -> (u64, u64) {
    let (client_read, client_write) = client.split();
    let (backend_read, backend_write) = backend.split();

    tokio::join!(
        copy_then_half_close(client_read, backend_write, "client->backend"),
        copy_then_half_close(backend_read, client_write, "backend->client"),
    )
}

/// Copy `reader` into `writer` until EOF or an I/O error, then shut down the
/// write side of `writer` so the peer sees end-of-stream while the opposite
/// direction keeps flowing.
async fn copy_then_half_close<R, W>(mut reader: R, mut writer: W, direction: &'static str) -> u64
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buffer = BytesMut::with_capacity(BUFFER_SIZE);
    let mut total = 0u64;

    loop {
        match reader.read_buf(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => {
                if let Err(e) = writer.write_all(&buffer).await {
                    debug!(direction, error = %e, "Write failed");
                    break;
                }
                total += n as u64;
                buffer.clear();
            }
            Err(e) => {
                debug!(direction, error = %e, "Read failed");
                break;
            }
        }
    }

    if let Err(e) = writer.shutdown().await {
        debug!(direction, error = %e, "Half-close failed");
    }

    total
}
