//! diffs the authoritative operator roster against the emitters we hold.
//!
//! The server sends the full roster every time it changes; it is a
//! replacement, not a delta.  This pure diff decides which emitters to
//! create, which to refresh, and which to stop and discard.  It is the
//! only way per-operator state gets created or removed, so a stray
//! message about an unknown operator can never grow the maps.
use std::collections::HashSet;

use crate::common::wire_message::Operator;

#[derive(Debug, Clone, PartialEq)]
pub struct RosterDiff {
    pub to_create: Vec<Operator>,
    pub to_update: Vec<Operator>,
    pub to_stop: Vec<String>,
}

/// Compute the reconciliation between the roster and the held emitter
/// keys.  The local operator never gets a remote emitter, so it is
/// excluded from the diff entirely.  Safe to run redundantly: with an
/// unchanged roster nothing is created or stopped, and the updates are
/// idempotent setting of frequency and volume.
pub fn reconcile(
    roster: &[Operator],
    held: &HashSet<String>,
    local_id: Option<&str>,
) -> RosterDiff {
    let mut diff = RosterDiff {
        to_create: Vec::new(),
        to_update: Vec::new(),
        to_stop: Vec::new(),
    };
    let mut present: HashSet<&str> = HashSet::new();
    for op in roster {
        present.insert(op.id.as_str());
        if local_id == Some(op.id.as_str()) {
            continue;
        }
        if held.contains(&op.id) {
            diff.to_update.push(op.clone());
        } else {
            diff.to_create.push(op.clone());
        }
    }
    for key in held {
        if !present.contains(key.as_str()) {
            diff.to_stop.push(key.clone());
        }
    }
    diff
}
