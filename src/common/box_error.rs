//! error type shared by everything that can fail in here.
//!
//! The transport runs on its own thread, so the error type has to be
//! Send + Sync to cross the spawn boundary.
pub type BoxError = std::boxed::Box<
    dyn std::error::Error // must implement Error to satisfy ?
        + std::marker::Send // needed for threads
        + std::marker::Sync, // needed for threads
>;
