//! beepjam - shared Morse beep session
//!
//! provides the client core for a session where multiple operators can
//! key tones (press-to-beep) or transmit text as Morse code, and every
//! operator hears everyone else at a consistent perceived latency.
pub mod common;
pub mod morse;
pub mod session;
