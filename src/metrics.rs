//! Metric names and recording helpers.
//!
//! With the `metrics` feature enabled these forward to the
//! [`metrics`](https://docs.rs/metrics) facade; without it they compile to
//! nothing, so call sites stay unconditional.

/// Gauge of relay connections currently established.
pub const CONNECTIONS_ACTIVE: &str = "relaylink_connections_active";
/// Counter of frames sent or received.
pub const FRAMES_PROCESSED: &str = "relaylink_frames_processed_total";
/// Counter of connect attempts, labelled by outcome.
pub const CONNECT_ATTEMPTS: &str = "relaylink_connect_attempts_total";
/// Counter of errors absorbed by the client.
pub const ERRORS_TOTAL: &str = "relaylink_errors_total";

/// Direction of a processed frame.
#[derive(Clone, Copy, Debug)]
pub enum Direction {
    /// Frame received from the relay.
    Inbound,
    /// Frame written to the relay.
    Outbound,
}

impl Direction {
    #[cfg_attr(not(feature = "metrics"), allow(dead_code, reason = "only read by metric labels"))]
    fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

#[cfg(feature = "metrics")]
mod imp {
    use metrics::{counter, gauge};

    use super::{CONNECT_ATTEMPTS, CONNECTIONS_ACTIVE, Direction, ERRORS_TOTAL, FRAMES_PROCESSED};

    pub fn inc_connections() { gauge!(CONNECTIONS_ACTIVE).increment(1.0); }

    pub fn dec_connections() { gauge!(CONNECTIONS_ACTIVE).decrement(1.0); }

    pub fn inc_frames(direction: Direction) {
        counter!(FRAMES_PROCESSED, "direction" => direction.as_str()).increment(1);
    }

    pub fn inc_connect_attempts(success: bool) {
        let outcome = if success { "success" } else { "failure" };
        counter!(CONNECT_ATTEMPTS, "outcome" => outcome).increment(1);
    }

    pub fn inc_errors() { counter!(ERRORS_TOTAL).increment(1); }
}

#[cfg(not(feature = "metrics"))]
mod imp {
    use super::Direction;

    pub fn inc_connections() {}

    pub fn dec_connections() {}

    pub fn inc_frames(_direction: Direction) {}

    pub fn inc_connect_attempts(_success: bool) {}

    pub fn inc_errors() {}
}

/// Increment the active connections gauge.
pub fn inc_connections() { imp::inc_connections(); }

/// Decrement the active connections gauge.
pub fn dec_connections() { imp::dec_connections(); }

/// Record a processed frame for the given direction.
pub fn inc_frames(direction: Direction) { imp::inc_frames(direction); }

/// Record the outcome of one connect attempt.
pub fn inc_connect_attempts(success: bool) { imp::inc_connect_attempts(success); }

/// Record an absorbed error.
pub fn inc_errors() { imp::inc_errors(); }
