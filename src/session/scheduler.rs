//! per-operator playback cursors.
//!
//! Every operator (including the local one) has a single timeline: the
//! cursor is the earliest emitter time their next tone may begin.  A
//! new batch is anchored at max(anchor, cursor), so repeated
//! transmissions queue back to back and never overlap, even when a new
//! one arrives before the previous one has finished sounding.  A held
//! tone (key down, no key up yet) is tracked as an open interval; a
//! batch arriving while one is open closes the held tone where the
//! batch begins, so overlapping intervals are never issued.  The
//! monotonic cursor plus that open set are the only serialization
//! mechanism; there is no locking because everything runs on one
//! logical timeline.
use std::collections::{HashMap, HashSet};

use log::trace;

use crate::morse::keying::KeyingSequence;
use crate::session::emitter::ToneEmitter;

pub struct PlaybackScheduler {
    cursors: HashMap<String, f64>,
    open: HashSet<String>,
}

impl PlaybackScheduler {
    pub fn new() -> PlaybackScheduler {
        PlaybackScheduler {
            cursors: HashMap::new(),
            open: HashSet::new(),
        }
    }

    /// earliest time this operator's next tone may begin, if any is set
    pub fn cursor(&self, operator_id: &str) -> Option<f64> {
        self.cursors.get(operator_id).copied()
    }

    /// Schedule a precomputed batch whose beeps are relative to zero.
    ///
    /// The whole batch is shifted to start at max(anchor, cursor) and
    /// the cursor advances to the batch end (which includes the
    /// sequence's trailing gap).  If the operator has an open held
    /// tone, it is stopped where the batch begins.  Returns the new
    /// cursor.
    pub fn schedule(
        &mut self,
        operator_id: &str,
        sequence: &KeyingSequence,
        anchor: f64,
        emitter: &mut dyn ToneEmitter,
    ) -> f64 {
        let effective = self.effective_start(operator_id, anchor);
        if self.open.remove(operator_id) {
            emitter.stop(effective);
        }
        for beep in &sequence.beeps {
            emitter.start(effective + beep.start);
            emitter.stop(effective + beep.stop);
        }
        let end = effective + sequence.duration;
        trace!(
            "scheduled {} beeps for {} at {:.3}, cursor -> {:.3}",
            sequence.beeps.len(),
            operator_id,
            effective,
            end
        );
        self.cursors.insert(String::from(operator_id), end);
        end
    }

    /// Open a key-down interval.  The stop time is not known yet; it
    /// arrives with a later key_up.  The cursor moves to the start so
    /// a batch cannot be scheduled underneath the held tone's onset.
    /// A key_down while the tone is already held changes nothing.
    pub fn key_down(&mut self, operator_id: &str, at: f64, emitter: &mut dyn ToneEmitter) -> f64 {
        if self.open.contains(operator_id) {
            return self.cursor(operator_id).unwrap_or(at);
        }
        let effective = self.effective_start(operator_id, at);
        emitter.start(effective);
        self.cursors.insert(String::from(operator_id), effective);
        self.open.insert(String::from(operator_id));
        effective
    }

    /// Close the open interval from a key_down.  A key_up with no open
    /// interval (never started, or already closed by a batch) emits
    /// nothing.
    pub fn key_up(&mut self, operator_id: &str, at: f64, emitter: &mut dyn ToneEmitter) -> f64 {
        let effective = self.effective_start(operator_id, at);
        if self.open.remove(operator_id) {
            emitter.stop(effective);
            self.cursors.insert(String::from(operator_id), effective);
        }
        effective
    }

    /// Drop the cursor and any open interval when an operator leaves
    /// the roster.
    pub fn forget(&mut self, operator_id: &str) -> () {
        self.cursors.remove(operator_id);
        self.open.remove(operator_id);
    }

    fn effective_start(&self, operator_id: &str, anchor: f64) -> f64 {
        match self.cursors.get(operator_id) {
            Some(cursor) => anchor.max(*cursor),
            None => anchor,
        }
    }
}
