//! Resilient client for a relay server.
//!
//! [`RelayClient`] keeps one TCP connection to a relay open, announces the
//! device with a registration envelope, dispatches every inbound message to
//! the application and serializes outbound sends through a single writer.
//! Connection setup retries with a fixed backoff; the lifecycle is published
//! as a [`ConnectionState`].

mod config;
mod connect;
mod driver;
mod error;
mod receive;
mod runtime;
mod send_queue;
mod state;

pub use config::{
    ClientConfig,
    DEFAULT_CONNECT_ATTEMPTS,
    DEFAULT_CONNECT_BACKOFF,
    DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_READ_CHUNK,
    RetryPolicy,
    SocketOptions,
};
pub use connect::{Connector, TcpConnector, connect_with_retry};
pub use error::{ClientError, SendError};
pub use runtime::RelayClient;
pub use send_queue::{SendOutcome, SendTicket};
pub use state::ConnectionState;

#[cfg(test)]
mod tests;
