//! Containment of panics raised by application code and worker tasks.
//!
//! Panics are logged, never propagated: a panicking dispatcher or send
//! worker must not take the connection driver down with it.

use std::{
    any::Any,
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
};

/// Caught panic payload, rendered for log lines.
///
/// `panic!` with a message carries a `&str` or `String`, shown verbatim.
/// `std::panic::panic_any` can carry anything else, which is shown as an
/// opaque payload.
///
/// ```
/// use relaylink::panic::format_panic;
///
/// assert_eq!(format_panic(Box::new("boom")).to_string(), "boom");
/// assert_eq!(format_panic(Box::new(String::from("bang"))).to_string(), "bang");
/// assert_eq!(format_panic(Box::new(7_u8)).to_string(), "<opaque panic payload>");
/// ```
#[must_use]
pub struct PanicMessage(Box<dyn Any + Send>);

impl PanicMessage {
    /// The panic message, if the payload carried one.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.0
            .downcast_ref::<&'static str>()
            .copied()
            .or_else(|| self.0.downcast_ref::<String>().map(String::as_str))
    }
}

impl fmt::Display for PanicMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text().unwrap_or("<opaque panic payload>"))
    }
}

impl fmt::Debug for PanicMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PanicMessage").field(&self.text()).finish()
    }
}

/// Wrap a payload from a panicked task or `catch_unwind`.
pub fn format_panic(panic: Box<dyn Any + Send>) -> PanicMessage { PanicMessage(panic) }

/// Run `f`, returning its panic as a [`PanicMessage`] instead of unwinding.
///
/// Callers must not rely on state `f` may have left half-updated.
pub(crate) fn contain<R>(f: impl FnOnce() -> R) -> Result<R, PanicMessage> {
    catch_unwind(AssertUnwindSafe(f)).map_err(format_panic)
}
