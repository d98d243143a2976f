//! Connection establishment with bounded retry.

use std::time::Duration;

use async_trait::async_trait;
use tokio::{
    net::{TcpSocket, TcpStream, lookup_host},
    time::{sleep, timeout},
};
use tracing::{info, warn};

use super::{ClientError, RetryPolicy, SocketOptions};
use crate::metrics;

/// Opens TCP streams to the relay.
///
/// The client depends on this seam rather than on `TcpStream::connect`
/// directly so connect behaviour can be substituted.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Connector: Send + Sync {
    /// Make one connection attempt to `host:port`.
    async fn connect(&self, host: &str, port: u16) -> Result<TcpStream, ClientError>;
}

/// [`Connector`] resolving the host and connecting with socket options.
#[derive(Clone, Copy, Debug, Default)]
pub struct TcpConnector {
    options: SocketOptions,
}

impl TcpConnector {
    #[must_use]
    pub const fn new(options: SocketOptions) -> Self { Self { options } }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, host: &str, port: u16) -> Result<TcpStream, ClientError> {
        let mut last_error = None;
        for addr in lookup_host((host, port)).await? {
            let socket = if addr.is_ipv4() {
                TcpSocket::new_v4()?
            } else {
                TcpSocket::new_v6()?
            };
            self.options.apply(&socket)?;
            match socket.connect(addr).await {
                Ok(stream) => return Ok(stream),
                Err(e) => last_error = Some(e),
            }
        }
        Err(match last_error {
            Some(e) => ClientError::Io(e),
            None => ClientError::Unresolved {
                host: host.to_owned(),
                port,
            },
        })
    }
}

/// Connect to `host:port`, retrying according to `policy`.
///
/// Each attempt is bounded by `attempt_timeout`. Between failed attempts the
/// task sleeps for `policy.backoff`; after the final failure it returns
/// without sleeping.
///
/// # Errors
///
/// Returns [`ClientError::ConnectFailed`] wrapping the last attempt's error
/// once every attempt has failed.
pub async fn connect_with_retry(
    connector: &dyn Connector,
    host: &str,
    port: u16,
    policy: RetryPolicy,
    attempt_timeout: Duration,
) -> Result<TcpStream, ClientError> {
    let policy = policy.normalized();
    let mut attempt = 1;
    loop {
        info!(attempt, max_attempts = policy.attempts, host, port, "connecting to relay");
        let result = match timeout(attempt_timeout, connector.connect(host, port)).await {
            Ok(result) => result,
            Err(_elapsed) => Err(ClientError::ConnectTimeout(attempt_timeout)),
        };
        match result {
            Ok(stream) => {
                metrics::inc_connect_attempts(true);
                return Ok(stream);
            }
            Err(error) => {
                metrics::inc_connect_attempts(false);
                warn!(attempt, %error, "connect attempt failed");
                if attempt >= policy.attempts {
                    return Err(ClientError::ConnectFailed {
                        attempts: attempt,
                        source: Box::new(error),
                    });
                }
            }
        }
        sleep(policy.backoff).await;
        attempt += 1;
    }
}
