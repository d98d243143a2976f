//! Lifecycle tests for the relay client.

use std::{sync::Arc, time::Duration};

use tokio::time::{Instant, sleep};
use tracing_test::traced_test;

use super::helpers::{
    Refusing,
    connected_client,
    next_message,
    recording,
    relay_config,
    wait_for_state,
};
use crate::client::{ClientConfig, ConnectionState, RelayClient, RetryPolicy, SendError};

#[traced_test]
#[tokio::test]
async fn init_without_relay_address_is_noop() {
    let (dispatcher, _rx) = recording();
    let client = RelayClient::new(ClientConfig::new("", 0), dispatcher);
    client.init();
    assert_eq!(client.state(), ConnectionState::Idle);
    assert!(!client.is_prepared());
    assert!(logs_contain("relay address incomplete"));
}

#[test]
fn init_outside_runtime_does_not_panic() {
    let (dispatcher, _rx) = recording();
    let client = RelayClient::new(relay_config(9), dispatcher);
    client.init();
    assert_eq!(client.state(), ConnectionState::Idle);
}

#[tokio::test]
async fn destroy_twice_leaves_client_unprepared() {
    let (_relay, _peer, client, _rx) = connected_client().await;
    assert!(client.is_prepared());

    client.destroy();
    client.destroy();
    assert!(!client.is_prepared());
    assert_eq!(client.state(), ConnectionState::Destroyed);
}

#[tokio::test]
async fn destroy_before_init_is_harmless() {
    let (dispatcher, _rx) = recording();
    let client = RelayClient::new(relay_config(9), dispatcher);
    client.destroy();
    assert_eq!(client.state(), ConnectionState::Destroyed);
    assert!(matches!(client.send_message("x").await, Err(SendError::Closed)));
}

#[tokio::test]
async fn destroy_from_another_task() {
    let (_relay, _peer, client, _rx) = connected_client().await;
    let remote = client.clone();
    tokio::spawn(async move { remote.destroy() })
        .await
        .expect("destroy task");
    assert_eq!(client.state(), ConnectionState::Destroyed);
}

#[tokio::test]
async fn paused_client_stops_dispatching_until_resumed() {
    let (_relay, mut peer, client, mut rx) = connected_client().await;

    client.pause_socket();
    wait_for_state(&client, ConnectionState::Paused).await;
    assert!(client.is_prepared());
    peer.send_text("held back").await.expect("send");
    sleep(Duration::from_millis(100)).await;
    assert!(rx.try_recv().is_err(), "dispatch happened while paused");

    client.resume_socket();
    wait_for_state(&client, ConnectionState::Connected).await;
    assert_eq!(next_message(&mut rx).await, "held back");
}

#[tokio::test]
async fn sends_flow_while_paused() {
    let (_relay, mut peer, client, _rx) = connected_client().await;
    client.pause_socket();
    wait_for_state(&client, ConnectionState::Paused).await;

    client.send_message("still talking").await.expect("send");
    assert_eq!(
        peer.next_text().await.expect("read").as_deref(),
        Some("still talking")
    );
}

#[tokio::test]
async fn peer_close_leaves_client_disconnected() {
    let (_relay, peer, client, _rx) = connected_client().await;
    drop(peer);

    wait_for_state(&client, ConnectionState::Disconnected).await;
    assert!(!client.is_prepared());
    assert!(matches!(
        client.send_message("nobody listens").await,
        Err(SendError::NotConnected)
    ));
}

#[tokio::test]
async fn resume_after_disconnect_reconnects() {
    let (relay, peer, client, mut rx) = connected_client().await;
    drop(peer);
    wait_for_state(&client, ConnectionState::Disconnected).await;

    client.resume_socket();
    let mut peer = relay.accept().await.expect("reconnect");
    let registration = peer.next_text().await.expect("read").expect("registration");
    assert!(registration.starts_with("NOTIFY\r\n"));
    wait_for_state(&client, ConnectionState::Connected).await;

    peer.send_text("welcome back").await.expect("send");
    assert_eq!(next_message(&mut rx).await, "welcome back");
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_end_in_disconnected() {
    let connector = Refusing::default();
    let (dispatcher, _rx) = recording();
    let config = relay_config(9090).retry(RetryPolicy::default());
    let client = RelayClient::with_connector(config, dispatcher, Arc::new(connector.clone()));

    let start = Instant::now();
    client.init();
    wait_for_state(&client, ConnectionState::Disconnected).await;

    assert_eq!(connector.calls(), 3);
    assert!(start.elapsed() >= Duration::from_millis(4000));
    assert!(!client.is_prepared());
}

#[tokio::test(start_paused = true)]
async fn init_while_driver_running_is_noop() {
    let connector = Refusing::default();
    let (dispatcher, _rx) = recording();
    let client =
        RelayClient::with_connector(relay_config(9090), dispatcher, Arc::new(connector.clone()));

    client.init();
    wait_for_state(&client, ConnectionState::Disconnected).await;
    client.init();
    sleep(Duration::from_secs(10)).await;
    assert_eq!(connector.calls(), 1);
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn destroy_during_backoff_answers_pending_sends() {
    let connector = Refusing::default();
    let (dispatcher, _rx) = recording();
    let config = relay_config(9090).retry(RetryPolicy::default());
    let client = RelayClient::with_connector(config, dispatcher, Arc::new(connector.clone()));

    client.init();
    wait_for_state(&client, ConnectionState::Connecting).await;
    let ticket = client.send_message("never sent");
    client.destroy();

    assert!(matches!(ticket.await, Err(SendError::Closed)));
    sleep(Duration::from_secs(10)).await;
    assert!(connector.calls() <= 1);
    assert_eq!(client.state(), ConnectionState::Destroyed);
}

#[tokio::test(start_paused = true)]
async fn init_after_destroy_starts_fresh() {
    let connector = Refusing::default();
    let (dispatcher, _rx) = recording();
    let client =
        RelayClient::with_connector(relay_config(9090), dispatcher, Arc::new(connector.clone()));

    client.init();
    client.destroy();
    client.init();
    wait_for_state(&client, ConnectionState::Disconnected).await;
    assert!(connector.calls() >= 1);
}

#[test]
fn explicit_runtime_drives_client_from_sync_code() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .expect("runtime");
    let connector = Refusing::default();
    let (dispatcher, _rx) = recording();
    let client =
        RelayClient::with_connector(relay_config(9090), dispatcher, Arc::new(connector.clone()))
            .with_runtime(runtime.handle().clone());

    client.init();
    runtime.block_on(wait_for_state(&client, ConnectionState::Disconnected));
    assert_eq!(connector.calls(), 1);
    client.destroy();
}
