//! Shared test helpers for client tests.

use std::{
    io,
    net::Ipv4Addr,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use relaylink_testing::{RelayPeer, StubRelay, parse_envelope};
use tokio::{net::TcpStream, sync::mpsc, time::timeout};

use crate::{
    client::{ClientConfig, ClientError, ConnectionState, Connector, RelayClient, RetryPolicy},
    device::DeviceContext,
    dispatch::MessageDispatcher,
};

/// Upper bound on any single wait in these tests.
pub const WAIT: Duration = Duration::from_secs(30);

/// Config targeting `127.0.0.1:port` as device `192.168.1.2:8080`.
pub fn relay_config(port: u16) -> ClientConfig {
    ClientConfig::new("127.0.0.1", port)
        .retry(RetryPolicy {
            attempts: 1,
            backoff: Duration::from_millis(10),
        })
        .device(DeviceContext::default().local_ip(Ipv4Addr::new(192, 168, 1, 2)))
}

/// Dispatcher forwarding every message to the returned channel.
pub fn recording() -> (impl MessageDispatcher, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let dispatcher = move |text: String| {
        let _ = tx.send(text);
    };
    (dispatcher, rx)
}

pub async fn next_message(rx: &mut mpsc::UnboundedReceiver<String>) -> String {
    timeout(WAIT, rx.recv())
        .await
        .expect("no message dispatched in time")
        .expect("dispatcher dropped")
}

pub async fn wait_for_state(client: &RelayClient, target: ConnectionState) {
    let mut states = client.subscribe();
    timeout(WAIT, states.wait_for(|state| *state == target))
        .await
        .unwrap_or_else(|_| panic!("client never reached {target:?}"))
        .expect("state channel closed");
}

/// Start a client against a fresh stub relay and consume its registration.
pub async fn connected_client() -> (
    StubRelay,
    RelayPeer,
    RelayClient,
    mpsc::UnboundedReceiver<String>,
) {
    let relay = StubRelay::bind().await.expect("bind relay");
    let (dispatcher, rx) = recording();
    let client = RelayClient::new(relay_config(relay.port()), dispatcher);
    client.init();
    let mut peer = relay.accept().await.expect("accept client");
    let registration = peer.next_text().await.expect("read").expect("registration");
    assert_eq!(
        parse_envelope(&registration).expect("envelope").method,
        "NOTIFY"
    );
    wait_for_state(&client, ConnectionState::Connected).await;
    (relay, peer, client, rx)
}

/// Connector refusing every attempt and counting them.
#[derive(Clone, Debug, Default)]
pub struct Refusing {
    pub calls: Arc<AtomicUsize>,
}

impl Refusing {
    pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
}

#[async_trait]
impl Connector for Refusing {
    async fn connect(&self, _host: &str, _port: u16) -> Result<TcpStream, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ClientError::Io(io::Error::from(
            io::ErrorKind::ConnectionRefused,
        )))
    }
}
