//! debounce for the outbound frequency broadcast.
//!
//! Dragging a frequency control produces a burst of changes; peers
//! only need the value it settles on.  Single slot: keep the latest
//! pending value and re-arm the timer on every update, fire once the
//! wall clock has been quiet for the interval.
use crate::common::timekeeper::MicroTimer;

const DEBOUNCE_MICROS: u128 = 300_000;

pub struct FreqDebounce {
    pending: Option<f64>,
    timer: MicroTimer,
}

impl FreqDebounce {
    pub fn new(now: u128) -> FreqDebounce {
        FreqDebounce {
            pending: None,
            timer: MicroTimer::build(now, DEBOUNCE_MICROS),
        }
    }

    /// Record a new value and restart the quiet period.
    pub fn update(&mut self, frequency: f64, now: u128) -> () {
        self.pending = Some(frequency);
        self.timer.reset(now);
    }

    /// Take the settled value once the quiet period has elapsed.
    pub fn poll(&mut self, now: u128) -> Option<f64> {
        if self.pending.is_some() && self.timer.expired(now) {
            self.pending.take()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod test_freq_debounce {
    use super::*;

    #[test]
    fn fires_once_after_quiet_period() {
        let mut debounce = FreqDebounce::new(0);
        debounce.update(550.0, 1_000);
        assert_eq!(debounce.poll(100_000), None);
        assert_eq!(debounce.poll(302_000), Some(550.0));
        // slot is drained
        assert_eq!(debounce.poll(700_000), None);
    }

    #[test]
    fn update_restarts_the_clock_and_keeps_the_latest() {
        let mut debounce = FreqDebounce::new(0);
        debounce.update(550.0, 1_000);
        debounce.update(575.0, 250_000);
        // would have fired for the first value by now
        assert_eq!(debounce.poll(302_000), None);
        assert_eq!(debounce.poll(551_001), Some(575.0));
    }

    #[test]
    fn nothing_pending_never_fires() {
        let mut debounce = FreqDebounce::new(0);
        assert_eq!(debounce.poll(1_000_000), None);
    }
}
