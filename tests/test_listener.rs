//! Tests for the per-port listener

mod common;

use common::*;
use portrelay::error::ProxyError;
use portrelay::proxy::TargetSelector;
use portrelay::server::{ListenerHandle, ListenerService, ListenerState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

async fn start_listener(targets: &[SocketAddr]) -> ListenerHandle {
    let service = ListenerService::bind(
        "127.0.0.1:0".parse().unwrap(),
        pool_of(targets),
        Arc::new(TargetSelector::new()),
    )
    .await
    .unwrap();

    service.spawn()
}

async fn wait_until_refused(addr: SocketAddr) {
    for _ in 0..100 {
        if TcpStream::connect(addr).await.is_err() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("listener at {addr} still accepting");
}

#[tokio::test]
async fn test_listener_starts_in_created_state() {
    let service = ListenerService::bind(
        "127.0.0.1:0".parse().unwrap(),
        pool_of(&[unreachable_addr().await]),
        Arc::new(TargetSelector::new()),
    )
    .await
    .unwrap();

    assert_eq!(service.state(), ListenerState::Created);
    assert_ne!(service.local_addr().port(), 0);
}

#[tokio::test]
async fn test_listener_relays_connections() {
    let backend = spawn_echo_backend().await;
    let handle = start_listener(&[backend]).await;
    assert_eq!(handle.state(), ListenerState::Listening);

    let mut client = TcpStream::connect(handle.local_addr()).await.unwrap();
    client.write_all(b"ping").await.unwrap();

    let mut buf = [0u8; 4];
    client.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"ping");

    handle.shutdown().await;
}

#[tokio::test]
async fn test_listener_stop_closes_socket() {
    let backend = spawn_echo_backend().await;
    let handle = start_listener(&[backend]).await;
    let addr = handle.local_addr();

    handle.stop();
    timeout(Duration::from_secs(5), handle.closed())
        .await
        .expect("listener did not close");

    assert_eq!(handle.state(), ListenerState::Closed);
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_listener_stop_is_repeatable() {
    let handle = start_listener(&[unreachable_addr().await]).await;

    handle.stop();
    handle.stop();
    handle.closed().await;
    handle.closed().await;

    assert_eq!(handle.state(), ListenerState::Closed);
}

#[tokio::test]
async fn test_listener_in_flight_connection_survives_stop() {
    let backend = spawn_echo_backend().await;
    let handle = start_listener(&[backend]).await;

    let mut client = TcpStream::connect(handle.local_addr()).await.unwrap();
    client.write_all(b"before").await.unwrap();
    let mut buf = [0u8; 6];
    client.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"before");

    handle.shutdown().await;

    client.write_all(b"after!").await.unwrap();
    client.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"after!");

    client.shutdown().await.unwrap();
    let mut rest = Vec::new();
    client.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn test_listener_stops_when_handle_dropped() {
    let handle = start_listener(&[unreachable_addr().await]).await;
    let addr = handle.local_addr();

    drop(handle);
    wait_until_refused(addr).await;
}

#[tokio::test]
async fn test_listener_drops_client_when_targets_down() {
    let handle = start_listener(&[unreachable_addr().await, unreachable_addr().await]).await;

    let received = read_all_from(handle.local_addr()).await;
    assert!(received.is_empty());

    handle.shutdown().await;
}

#[tokio::test]
async fn test_listener_bind_conflict() {
    let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = occupied.local_addr().unwrap();

    let result = ListenerService::bind(
        addr,
        pool_of(&[unreachable_addr().await]),
        Arc::new(TargetSelector::new()),
    )
    .await;

    match result {
        Err(ProxyError::Bind { addr: failed, .. }) => assert_eq!(failed, addr),
        Err(other) => panic!("expected bind error, got {other:?}"),
        Ok(_) => panic!("bind on an occupied port succeeded"),
    }
}
