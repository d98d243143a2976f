//! Test helpers for `relaylink`.
//!
//! Provides a loopback [`StubRelay`] that accepts client connections and
//! exchanges length-prefixed text frames, parsers for envelope text, and a
//! serialized [`logtest`] fixture.

pub mod logging;
pub mod relay;

pub use logging::{LoggerHandle, logger};
pub use relay::{PEER_TIMEOUT, ParsedEnvelope, RelayPeer, StubRelay, parse_envelope, parse_label};
