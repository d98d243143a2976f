//! Connection lifecycle state and its change notifications.
//!
//! A single driver task owns all transitions for one `init()`. Each driver
//! writes through a [`StateHandle`] stamped with the generation it was
//! started under, so a driver that is still winding down after `destroy()`
//! cannot overwrite the state of its successor. `Destroyed` is sticky for
//! the generation that reached it.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use tokio::sync::watch;

/// Lifecycle of a relay connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Constructed, `init()` not yet called.
    Idle,
    /// Connect attempts in progress.
    Connecting,
    /// Socket connected and inbound messages are being dispatched.
    Connected,
    /// Socket connected; inbound dispatch suspended until resumed.
    Paused,
    /// Connect attempts exhausted or the relay closed the connection.
    Disconnected,
    /// Torn down by `destroy()`.
    Destroyed,
}

impl ConnectionState {
    /// Whether a socket is held and usable for sends.
    #[must_use]
    pub const fn is_prepared(self) -> bool { matches!(self, Self::Connected | Self::Paused) }
}

/// Shared state cell published to subscribers.
#[derive(Clone, Debug)]
pub(crate) struct StateCell {
    tx: Arc<watch::Sender<ConnectionState>>,
    generation: Arc<AtomicU64>,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(ConnectionState::Idle);
        Self {
            tx: Arc::new(tx),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub(crate) fn current(&self) -> ConnectionState { *self.tx.borrow() }

    pub(crate) fn subscribe(&self) -> watch::Receiver<ConnectionState> { self.tx.subscribe() }

    /// Start a new generation in `Idle` and return its writer.
    pub(crate) fn begin(&self) -> StateHandle {
        let mut generation = 0;
        self.tx.send_modify(|state| {
            generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *state = ConnectionState::Idle;
        });
        StateHandle {
            cell: self.clone(),
            generation,
        }
    }

    /// Enter `Destroyed`, whatever the current generation.
    pub(crate) fn destroy(&self) {
        self.tx.send_if_modified(|state| {
            if *state == ConnectionState::Destroyed {
                false
            } else {
                *state = ConnectionState::Destroyed;
                true
            }
        });
    }
}

/// Writer for one driver generation.
#[derive(Debug)]
pub(crate) struct StateHandle {
    cell: StateCell,
    generation: u64,
}

impl StateHandle {
    /// Move to `next`.
    ///
    /// Returns `false` once this generation has been destroyed or superseded;
    /// the caller must stop driving the connection.
    pub(crate) fn transition(&self, next: ConnectionState) -> bool {
        let mut live = false;
        self.cell.tx.send_if_modified(|state| {
            if *state == ConnectionState::Destroyed
                || self.cell.generation.load(Ordering::SeqCst) != self.generation
            {
                return false;
            }
            live = true;
            if *state == next {
                false
            } else {
                *state = next;
                true
            }
        });
        live
    }
}
