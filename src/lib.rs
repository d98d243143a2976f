#![doc(html_root_url = "https://docs.rs/relaylink/latest")]
//! Public API for the `relaylink` library.
//!
//! This crate provides a resilient client for relay servers: bounded connect
//! retry, a registration handshake, readiness-driven message reception and
//! strictly ordered sends.

pub mod buffer;
pub mod client;
pub mod device;
pub mod dispatch;
pub mod envelope;
pub mod framing;
pub mod label;
pub mod metrics;
pub mod panic;

pub use client::{ClientConfig, ClientError, ConnectionState, RelayClient, SendError, SendTicket};
pub use device::{DeviceContext, LocalAddress};
pub use dispatch::MessageDispatcher;
pub use envelope::{Envelope, EnvelopeBody, EnvelopeHeader};
pub use framing::{Framing, FramingError};
pub use label::RoutingLabel;
pub use metrics::{CONNECTIONS_ACTIVE, Direction, ERRORS_TOTAL, FRAMES_PROCESSED};
