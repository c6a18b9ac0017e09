//! Integration tests for the WebSocket transport
//!
//! These run the full manager over a real socket against the in-process
//! echo server, on the real clock.

mod common;

use common::*;
use livelink::core::connection_state::ConnectionState;
use livelink::net::WsTransportFactory;
use livelink::{ConnectionManager, Credential, TimingConfig};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

fn credential() -> Credential {
    Credential::valid_for("secret-token", Duration::from_secs(3600))
}

fn manager_for(url: &str) -> ConnectionManager {
    livelink::builder()
        .endpoint(url)
        .transport(WsTransportFactory::new())
        .build()
        .unwrap()
}

/// Poll until `condition` holds or five seconds pass
async fn wait_for(condition: impl Fn() -> bool) -> bool {
    wait_within(Duration::from_secs(5), condition).await
}

async fn wait_within(limit: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

#[tokio::test]
async fn test_connects_with_authorization_header() {
    let server = MockWsServer::start().await;
    let manager = manager_for(&server.ws_url());
    let log = StateLog::new();

    manager.connect(credential(), log.observer());

    assert!(wait_for(|| manager.is_connected()).await, "never connected");
    verbose_println!("  Connected to {}", server.ws_url());

    assert_eq!(server.auth_headers(), vec!["secret-token".to_string()]);
    assert_eq!(
        log.states(),
        vec![ConnectionState::Connecting, ConnectionState::Connected]
    );

    manager.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_echoed_payload_reaches_data_subscribers() {
    let server = MockWsServer::start().await;
    let manager = manager_for(&server.ws_url());
    let received = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&received);
    manager.connect(credential(), |_| {});
    manager.receive_data(move |payload| sink.lock().push(payload.to_vec()));
    assert!(wait_for(|| manager.is_connected()).await);

    let (done_tx, done_rx) = tokio::sync::oneshot::channel();
    manager.send(
        b"hello".to_vec(),
        Some(Box::new(move || {
            let _ = done_tx.send(());
        })),
    );

    tokio::time::timeout(Duration::from_secs(5), done_rx)
        .await
        .expect("send never completed")
        .unwrap();
    assert!(wait_for(|| !received.lock().is_empty()).await);
    assert_eq!(*received.lock(), vec![b"hello".to_vec()]);

    manager.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_graceful_disconnect() {
    let server = MockWsServer::start().await;
    let manager = manager_for(&server.ws_url());
    let log = StateLog::new();

    manager.connect(credential(), log.observer());
    assert!(wait_for(|| manager.is_connected()).await);

    manager.disconnect(false);
    assert!(wait_for(|| manager.connection_state() == ConnectionState::Disconnected).await);

    // The server's close reply must not turn into a lost connection
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(manager.connection_state(), ConnectionState::Disconnected);
    assert_eq!(log.last(), Some(ConnectionState::Disconnected));
}

#[tokio::test]
async fn test_server_going_away_is_a_lost_connection() {
    let server = MockWsServer::start().await;
    let manager = manager_for(&server.ws_url());

    manager.connect(credential(), |_| {});
    assert!(wait_for(|| manager.is_connected()).await);

    server.shutdown();

    assert!(
        wait_for(|| manager.connection_state()
            == ConnectionState::ConnectionLost {
                needs_credential_refresh: false
            })
        .await,
        "state was {}",
        manager.connection_state()
    );
}

#[tokio::test]
async fn test_unreachable_endpoint_reports_lost() {
    // Bind then drop to get a port nobody listens on
    let port = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let manager = manager_for(&format!("ws://127.0.0.1:{}", port));

    manager.connect(credential(), |_| {});

    assert!(wait_for(|| manager.connection_state().is_connection_lost()).await);
    assert!(!manager.is_connected());
}

#[tokio::test]
async fn test_silent_peer_is_replaced_by_a_new_connection() {
    let server = SilentWsServer::start().await;
    let manager = livelink::builder()
        .endpoint(server.ws_url())
        .transport(WsTransportFactory::new().with_heartbeat(Duration::from_secs(1), Duration::from_secs(1)))
        .timing(TimingConfig {
            reconnect_delay_secs: 1,
            watchdog_timeout_secs: 1,
            ..TimingConfig::default()
        })
        .build()
        .unwrap();
    let log = StateLog::new();

    manager.connect(credential(), log.observer());
    assert!(wait_for(|| manager.is_connected()).await, "never connected");
    assert_eq!(server.accepted(), 1);

    // Unanswered pings trip the watchdog, then the reconnect timer reopens
    assert!(
        wait_within(Duration::from_secs(15), || server.accepted() >= 2).await,
        "no new connection after the watchdog | states: {:?}",
        log.states()
    );
    verbose_println!("  States: {:?}", log.states());

    assert!(log.states().contains(&ConnectionState::ConnectionLost {
        needs_credential_refresh: false
    }));
    assert!(wait_for(|| manager.is_connected()).await);

    manager.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_connect_after_unanswered_close_opens_a_new_connection() {
    let server = SilentWsServer::start().await;
    let manager = manager_for(&server.ws_url());
    let log = StateLog::new();

    manager.connect(credential(), |_| {});
    assert!(wait_for(|| manager.is_connected()).await);

    // The peer never answers the close frame
    manager.disconnect(false);
    assert!(wait_for(|| manager.connection_state() == ConnectionState::Disconnected).await);

    manager.connect(credential(), log.observer());

    assert!(wait_for(|| server.accepted() >= 2).await, "connect reused the closing task");
    assert!(wait_for(|| manager.is_connected()).await);
    assert_eq!(log.last(), Some(ConnectionState::Connected));

    manager.shutdown().await.unwrap();
}
