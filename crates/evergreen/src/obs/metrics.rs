use serde::{Deserialize, Serialize};
use std::{cell::RefCell, collections::BTreeMap};

thread_local! {
    static STATE: RefCell<CounterState> = RefCell::new(CounterState::default());
}

///
/// CounterState
///
/// Ephemeral, in-memory counters for refresh and propagation decisions.
/// Totals plus a per-owner-type breakdown keyed by type path.
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CounterState {
    pub ops: OpCounters,
    pub owners: BTreeMap<String, OpCounters>,
}

///
/// OpCounters
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct OpCounters {
    // Update guard
    pub sync_applied: u64,
    pub refresh_skipped: u64,
    pub narrow_writes: u64,
    pub full_saves: u64,

    // Propagation
    pub propagation_halted: u64,
    pub predicate_rejected: u64,
    pub cycle_skipped: u64,
}

pub(crate) fn with_state<R>(f: impl FnOnce(&CounterState) -> R) -> R {
    STATE.with(|state| f(&state.borrow()))
}

pub(crate) fn with_state_mut<R>(f: impl FnOnce(&mut CounterState) -> R) -> R {
    STATE.with(|state| f(&mut state.borrow_mut()))
}

/// Snapshot the current counter state for endpoint/test plumbing.
#[must_use]
pub fn snapshot() -> CounterState {
    with_state(Clone::clone)
}

/// Reset all counter state.
pub fn reset() {
    with_state_mut(|state| *state = CounterState::default());
}
