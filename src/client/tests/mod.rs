//! Tests for the relay client runtime.

mod helpers;
mod lifecycle;
