//! Error types for relay client operations.

use std::{io, time::Duration};

use crate::framing::FramingError;

/// Errors raised while establishing a relay connection.
///
/// These never cross the [`crate::RelayClient`] lifecycle methods; they are
/// logged and reflected in [`crate::ConnectionState`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport error from the socket layer.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
    /// The relay host name resolved to no addresses.
    #[error("no address found for relay {host}:{port}")]
    Unresolved { host: String, port: u16 },
    /// A single connect attempt did not complete in time.
    #[error("connect attempt timed out after {0:?}")]
    ConnectTimeout(Duration),
    /// Every connect attempt allowed by the retry policy failed.
    #[error("failed to connect after {attempts} attempts")]
    ConnectFailed {
        attempts: u32,
        #[source]
        source: Box<ClientError>,
    },
}

/// Reasons a queued message was not delivered to the socket.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// No connection to the relay is currently established.
    #[error("relay connection is not established")]
    NotConnected,
    /// The client was destroyed before the message was written.
    #[error("relay client has been destroyed")]
    Closed,
    /// The message could not be framed.
    #[error(transparent)]
    Framing(#[from] FramingError),
    /// Writing to the socket failed.
    #[error("failed to write message: {0}")]
    Io(#[from] io::Error),
}
