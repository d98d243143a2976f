//! Shared utilities for integration tests.
//!
//! Provides a client config pointed at a stub relay and a recording
//! dispatcher so each test binary can focus on behaviour.

// Items in this shared module may not be used by all test binaries that import it.
#![allow(
    dead_code,
    reason = "shared test utilities are not used by all test binaries"
)]

use std::{net::Ipv4Addr, time::Duration};

use relaylink::{
    ClientConfig,
    ConnectionState,
    DeviceContext,
    RelayClient,
    client::RetryPolicy,
};
use tokio::{sync::mpsc, time::timeout};

pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Upper bound on any single wait.
pub const WAIT: Duration = Duration::from_secs(30);

/// Config for a device at `192.168.1.2:8080` talking to `127.0.0.1:port`.
pub fn device_config(port: u16) -> ClientConfig {
    ClientConfig::new("127.0.0.1", port)
        .retry(RetryPolicy {
            attempts: 1,
            backoff: Duration::from_millis(10),
        })
        .device(DeviceContext::default().local_ip(Ipv4Addr::new(192, 168, 1, 2)))
}

/// Build a client whose inbound messages land in the returned channel.
pub fn recording_client(config: ClientConfig) -> (RelayClient, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let client = RelayClient::new(config, move |text: String| {
        let _ = tx.send(text);
    });
    (client, rx)
}

pub async fn wait_for_state(client: &RelayClient, target: ConnectionState) -> TestResult {
    let mut states = client.subscribe();
    timeout(WAIT, states.wait_for(|state| *state == target)).await??;
    Ok(())
}

pub async fn next_message(rx: &mut mpsc::UnboundedReceiver<String>) -> TestResult<String> {
    timeout(WAIT, rx.recv())
        .await?
        .ok_or_else(|| "dispatcher dropped".into())
}
