//! components that make up the beep session client
pub mod client;
pub mod clock_sync;
pub mod emitter;
pub mod engine;
pub mod freq_debounce;
pub mod roster;
pub mod scheduler;
