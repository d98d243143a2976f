//! Boundary between the client and the application consuming messages.
//!
//! The receive loop hands every decoded message to a [`MessageDispatcher`].
//! Dispatch runs on the connection's driver task, so the next readiness wait
//! starts only after `dispatch` returns; implementations should hand work off
//! rather than block.

use std::sync::Arc;

use log::error;

use crate::panic::contain;

/// Consumer of decoded inbound messages.
///
/// Any `Fn(String) + Send + Sync` closure is a dispatcher.
///
/// # Examples
///
/// ```
/// use relaylink::dispatch::MessageDispatcher;
///
/// let dispatcher = |text: String| println!("relay says: {text}");
/// dispatcher.dispatch("hello".to_owned());
/// ```
pub trait MessageDispatcher: Send + Sync + 'static {
    /// Handle one complete inbound message.
    fn dispatch(&self, text: String);
}

impl<F> MessageDispatcher for F
where
    F: Fn(String) + Send + Sync + 'static,
{
    fn dispatch(&self, text: String) { self(text); }
}

/// Shared dispatcher handle held by the client.
pub type SharedDispatcher = Arc<dyn MessageDispatcher>;

/// Invoke `dispatcher`, containing any panic it raises.
///
/// Returns `false` if the dispatcher panicked.
pub(crate) fn dispatch_guarded(dispatcher: &dyn MessageDispatcher, text: String) -> bool {
    match contain(|| dispatcher.dispatch(text)) {
        Ok(()) => true,
        Err(panic) => {
            error!("message dispatcher panicked: panic={panic}");
            crate::metrics::inc_errors();
            false
        }
    }
}
