//! the opaque tone emitter the core drives, and the clock it runs on.
//!
//! The actual audio backend is a collaborator; the core only needs
//! something it can tell "turn on at this time, off at that time" on a
//! monotonic clock.  [`LogEmitter`] is the backend the demo binary
//! uses so the protocol can be exercised with no audio hardware.
use std::time::Instant;

use log::{debug, info};

#[cfg(test)]
use mockall::automock;

/// One oscillator, owned per operator.  Times are seconds on the
/// emitter clock.  An emitter must accept start/stop times in the
/// future and fire on its own; calls here never block.
#[cfg_attr(test, automock)]
pub trait ToneEmitter {
    fn start(&mut self, at: f64);
    fn stop(&mut self, at: f64);
    fn set_frequency(&mut self, hz: f64);
    fn set_volume(&mut self, db: f64);
    fn release(&mut self);
}

/// Creates emitters as operators join the roster.
#[cfg_attr(test, automock)]
pub trait EmitterFactory {
    fn create(&mut self, frequency: f64, volume_db: f64) -> Box<dyn ToneEmitter>;
}

/// The tone emission clock: seconds since construction, monotonic,
/// decoupled from the wall clock used for skew estimation.
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    pub fn new() -> MonotonicClock {
        MonotonicClock {
            epoch: Instant::now(),
        }
    }
    pub fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }
}

/// Emitter that just logs what it was told to do.
pub struct LogEmitter {
    label: String,
    frequency: f64,
    volume_db: f64,
}

impl ToneEmitter for LogEmitter {
    fn start(&mut self, at: f64) {
        info!(
            "[{}] tone on at {:.3} ({:.0} Hz, {:.1} dB)",
            self.label, at, self.frequency, self.volume_db
        );
    }
    fn stop(&mut self, at: f64) {
        info!("[{}] tone off at {:.3}", self.label, at);
    }
    fn set_frequency(&mut self, hz: f64) {
        debug!("[{}] frequency -> {:.0} Hz", self.label, hz);
        self.frequency = hz;
    }
    fn set_volume(&mut self, db: f64) {
        debug!("[{}] volume -> {:.1} dB", self.label, db);
        self.volume_db = db;
    }
    fn release(&mut self) {
        info!("[{}] released", self.label);
    }
}

/// Factory for [`LogEmitter`]s, labelled in creation order.
pub struct LogEmitterFactory {
    count: usize,
}

impl LogEmitterFactory {
    pub fn new() -> LogEmitterFactory {
        LogEmitterFactory { count: 0 }
    }
}

impl EmitterFactory for LogEmitterFactory {
    fn create(&mut self, frequency: f64, volume_db: f64) -> Box<dyn ToneEmitter> {
        self.count += 1;
        Box::new(LogEmitter {
            label: format!("osc-{}", self.count),
            frequency,
            volume_db,
        })
    }
}
