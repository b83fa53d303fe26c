//! per-operator clock skew estimation.
//!
//! Remote timestamps come from a peer's wall clock, which is offset
//! from ours by network delay plus whatever their clock is off by.  We
//! learn that combined skew once, from the first timed event each
//! operator sends, and then schedule every later event so the total
//! perceived lag stays at the target latency instead of tracking the
//! jitter of each individual message.
//!
//! The skew is deliberately never revised once learned.  If a peer's
//! latency drifts over a long session the drift shows up in the
//! transit jitter stat (logged for diagnostics) but is not corrected.
use std::collections::HashMap;

use log::debug;

use crate::common::timekeeper::StreamTimeStat;

pub struct ClockSync {
    target_latency: f64, // seconds
    skews: HashMap<String, i128>, // local minus remote, microseconds
    transit_stats: StreamTimeStat,
}

impl ClockSync {
    pub fn new(target_latency_msec: u32) -> ClockSync {
        ClockSync {
            target_latency: target_latency_msec as f64 / 1000.0,
            skews: HashMap::new(),
            transit_stats: StreamTimeStat::build(50),
        }
    }

    pub fn target_latency(&self) -> f64 {
        self.target_latency
    }

    /// Compensated playback delay in seconds for an event from this
    /// operator.
    ///
    /// First event seen for an operator: capture the skew and schedule
    /// at the flat target latency (there is nothing to correct against
    /// yet).  Later events: target latency plus how much earlier or
    /// later this one arrived relative to the first.  An event with no
    /// timestamp gets the flat target latency and learns nothing.
    pub fn compensated_delay(
        &mut self,
        operator_id: &str,
        remote_timestamp: Option<u64>,
        local_now: u128,
    ) -> f64 {
        let remote = match remote_timestamp {
            Some(ts) => ts,
            None => {
                debug!("no timestamp from {}, using flat latency", operator_id);
                return self.target_latency;
            }
        };
        let transit = local_now as i128 - remote as i128;
        self.transit_stats.add_sample(transit as f64 / 1000.0);
        match self.skews.get(operator_id) {
            Some(skew) => self.target_latency + (*skew - transit) as f64 / 1_000_000.0,
            None => {
                debug!("learned skew for {}: {} usec", operator_id, transit);
                self.skews.insert(String::from(operator_id), transit);
                self.target_latency
            }
        }
    }

    pub fn knows(&self, operator_id: &str) -> bool {
        self.skews.contains_key(operator_id)
    }

    /// Drop the stored skew when an operator leaves the roster.
    pub fn forget(&mut self, operator_id: &str) -> () {
        self.skews.remove(operator_id);
    }

    pub fn transit_stats(&self) -> &StreamTimeStat {
        &self.transit_stats
    }
}
