//! These modules are shared between the session engine and the transport.
pub mod box_error;
pub mod config;
pub mod timekeeper;
pub mod websocket;
pub mod wire_message;

use std::time::{SystemTime, UNIX_EPOCH};

/// Wall clock time in microseconds since the epoch.
///
/// This is the time domain used for wire message timestamps and skew
/// estimation.  It is never used to schedule tones; the emitters run
/// on their own monotonic clock.
pub fn get_micro_time() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_micros()
}
