//! Server public API integration tests

use std::time::Duration;

use xrow_server::{from_sync_fn, MethodDef, ParamShape, Value, XrowServer};

fn ping() -> MethodDef {
    MethodDef::new(ParamShape::new(), from_sync_fn(|_, _| Ok(Value::from("pong"))))
}

#[tokio::test]
async fn test_server_local_addr() {
    let addr: std::net::SocketAddr = "127.0.0.1:0".parse().unwrap();
    let server = XrowServer::builder().bind(addr).build().await.unwrap();

    let local_addr = server.local_addr();
    assert_ne!(local_addr.port(), 0);
    assert!(local_addr.ip().is_loopback());
}

#[tokio::test]
async fn test_server_exposes_dispatcher() {
    let server = XrowServer::builder()
        .bind(([127, 0, 0, 1], 0))
        .method("rpc_ping", ping())
        .build()
        .await
        .unwrap();

    assert_eq!(server.dispatcher().registry().methods(), vec!["ping"]);
}

#[tokio::test]
async fn test_server_port_in_use() {
    let first = XrowServer::builder()
        .bind(([127, 0, 0, 1], 0))
        .build()
        .await
        .unwrap();

    let second = XrowServer::builder().bind(first.local_addr()).build().await;
    assert!(second.is_err());
}

#[tokio::test]
async fn test_server_spawn_and_abort() {
    let server = XrowServer::builder()
        .bind(([127, 0, 0, 1], 0))
        .method("rpc_ping", ping())
        .build()
        .await
        .unwrap();

    let handle = server.spawn();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!handle.is_finished());

    handle.abort();
    assert!(handle.await.unwrap_err().is_cancelled());
}

#[tokio::test]
async fn test_server_drop_cleanup() {
    let server = XrowServer::builder()
        .bind(([127, 0, 0, 1], 0))
        .build()
        .await
        .unwrap();

    drop(server);

    // If we get here without panic, cleanup worked
    tokio::time::sleep(Duration::from_millis(10)).await;
}
