//! Configuration for relay clients.

use std::{io, time::Duration};

use socket2::{SockRef, TcpKeepalive};
use tokio::net::TcpSocket;

use crate::{
    buffer::INITIAL_RECEIVE_CAPACITY,
    device::DeviceContext,
    framing::{DEFAULT_MAX_FRAME_LENGTH, Framing},
};

/// Default number of connect attempts.
pub const DEFAULT_CONNECT_ATTEMPTS: u32 = 3;
/// Default pause between connect attempts.
pub const DEFAULT_CONNECT_BACKOFF: Duration = Duration::from_millis(2000);
/// Default bound on a single connect attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Size of the scratch buffer each `try_read` fills.
pub const DEFAULT_READ_CHUNK: usize = 512;

/// Bounded retry used when connecting to the relay.
///
/// The client makes at most `attempts` connect attempts, sleeping `backoff`
/// between consecutive attempts. There is no sleep after the last one.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use relaylink::client::RetryPolicy;
///
/// let policy = RetryPolicy {
///     attempts: 0,
///     backoff: Duration::from_millis(10),
/// };
/// assert_eq!(policy.normalized().attempts, 1);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of connect attempts.
    pub attempts: u32,
    /// Delay between consecutive attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_CONNECT_ATTEMPTS,
            backoff: DEFAULT_CONNECT_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Ensure at least one attempt is made.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.attempts = self.attempts.max(1);
        self
    }
}

/// Socket options applied before connecting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SocketOptions {
    nodelay: Option<bool>,
    keepalive: Option<Option<Duration>>,
}

impl SocketOptions {
    /// Configure `TCP_NODELAY`.
    #[must_use]
    pub fn nodelay(mut self, enabled: bool) -> Self {
        self.nodelay = Some(enabled);
        self
    }

    /// Enable `SO_KEEPALIVE` with the given idle time, or disable it.
    #[must_use]
    pub fn keepalive(mut self, idle: Option<Duration>) -> Self {
        self.keepalive = Some(idle);
        self
    }

    pub(crate) fn apply(&self, socket: &TcpSocket) -> io::Result<()> {
        if let Some(enabled) = self.nodelay {
            socket.set_nodelay(enabled)?;
        }
        match self.keepalive {
            Some(Some(idle)) => {
                socket.set_keepalive(true)?;
                SockRef::from(socket).set_tcp_keepalive(&TcpKeepalive::new().with_time(idle))?;
            }
            Some(None) => socket.set_keepalive(false)?,
            None => {}
        }
        Ok(())
    }
}

/// Everything a [`crate::RelayClient`] needs to reach and talk to a relay.
///
/// # Examples
///
/// ```
/// use std::{net::Ipv4Addr, time::Duration};
///
/// use relaylink::{
///     client::{ClientConfig, RetryPolicy},
///     device::DeviceContext,
///     framing::Framing,
/// };
///
/// let config = ClientConfig::new("10.0.0.5", 9090)
///     .framing(Framing::Delimited(b'\n'))
///     .retry(RetryPolicy {
///         attempts: 5,
///         backoff: Duration::from_secs(1),
///     })
///     .device(DeviceContext::default().local_ip(Ipv4Addr::new(192, 168, 1, 2)));
/// assert_eq!(config.relay_port(), 9090);
/// assert!(config.is_addressed());
/// ```
#[derive(Clone, Debug)]
pub struct ClientConfig {
    relay_host: String,
    relay_port: u16,
    retry: RetryPolicy,
    connect_timeout: Duration,
    socket_options: SocketOptions,
    framing: Framing,
    max_frame_length: usize,
    read_chunk: usize,
    initial_buffer_capacity: usize,
    device: DeviceContext,
}

impl ClientConfig {
    /// Target the relay at `host:port` with default settings.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            relay_host: host.into(),
            relay_port: port,
            retry: RetryPolicy::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            socket_options: SocketOptions::default().nodelay(true),
            framing: Framing::default(),
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
            read_chunk: DEFAULT_READ_CHUNK,
            initial_buffer_capacity: INITIAL_RECEIVE_CAPACITY,
            device: DeviceContext::default(),
        }
    }

    /// Set the connect retry policy.
    #[must_use]
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry.normalized();
        self
    }

    /// Bound each connect attempt.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn socket_options(mut self, options: SocketOptions) -> Self {
        self.socket_options = options;
        self
    }

    /// Select how messages are delimited on the wire.
    #[must_use]
    pub fn framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    /// Cap the size of a single inbound or outbound message.
    #[must_use]
    pub fn max_frame_length(mut self, len: usize) -> Self {
        self.max_frame_length = len.max(1);
        self
    }

    /// Size of each socket read and initial size of the receive buffer.
    #[must_use]
    pub fn read_chunk(mut self, len: usize) -> Self {
        self.read_chunk = len.max(1);
        self.initial_buffer_capacity = self.read_chunk;
        self
    }

    /// Identity announced in the registration envelope.
    #[must_use]
    pub fn device(mut self, device: DeviceContext) -> Self {
        self.device = device;
        self
    }

    /// Whether both relay host and port are set.
    #[must_use]
    pub fn is_addressed(&self) -> bool { !self.relay_host.is_empty() && self.relay_port != 0 }

    #[must_use]
    pub fn relay_host(&self) -> &str { &self.relay_host }

    #[must_use]
    pub const fn relay_port(&self) -> u16 { self.relay_port }

    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy { self.retry }

    #[must_use]
    pub const fn connect_timeout_value(&self) -> Duration { self.connect_timeout }

    #[must_use]
    pub const fn socket_options_value(&self) -> SocketOptions { self.socket_options }

    #[must_use]
    pub const fn framing_value(&self) -> Framing { self.framing }

    #[must_use]
    pub const fn max_frame_length_value(&self) -> usize { self.max_frame_length }

    #[must_use]
    pub const fn read_chunk_value(&self) -> usize { self.read_chunk }

    #[must_use]
    pub const fn initial_buffer_capacity(&self) -> usize { self.initial_buffer_capacity }

    #[must_use]
    pub fn device_context(&self) -> &DeviceContext { &self.device }
}
