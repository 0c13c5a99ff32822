//! Event sink boundary.
//!
//! Engine logic MUST NOT depend on obs::metrics directly.
//! All instrumentation flows through EngineEvent and EventSink.
//!
//! This module is the only allowed bridge between refresh/propagation
//! logic and the global counter state.
use crate::obs::metrics;
use std::cell::RefCell;

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<*const dyn EventSink>> = const { RefCell::new(None) };
}

///
/// HaltReason
///
/// Why a propagation edge resolved no owner to refresh.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HaltReason {
    MissingForeignKey,
    MissingIntermediate,
    MissingOwner,
}

///
/// EngineEvent
///

#[derive(Clone, Copy, Debug)]
pub enum EngineEvent {
    SyncApplied {
        owner_path: &'static str,
    },
    RefreshSkipped {
        owner_path: &'static str,
    },
    RefreshNarrowWrite {
        owner_path: &'static str,
    },
    RefreshFullSave {
        owner_path: &'static str,
    },
    PropagationHalted {
        owner_path: &'static str,
        reason: HaltReason,
    },
    PredicateRejected {
        owner_path: &'static str,
    },
    CascadeCycleSkipped {
        owner_path: &'static str,
    },
}

impl EngineEvent {
    #[must_use]
    pub const fn owner_path(&self) -> &'static str {
        match self {
            Self::SyncApplied { owner_path }
            | Self::RefreshSkipped { owner_path }
            | Self::RefreshNarrowWrite { owner_path }
            | Self::RefreshFullSave { owner_path }
            | Self::PropagationHalted { owner_path, .. }
            | Self::PredicateRejected { owner_path }
            | Self::CascadeCycleSkipped { owner_path } => owner_path,
        }
    }
}

///
/// EventSink
///

pub trait EventSink {
    fn record(&self, event: EngineEvent);
}

/// GlobalEventSink
/// Default process-local sink that writes into global counter state.
/// Acts as the concrete sink when no scoped override is installed.

pub(crate) struct GlobalEventSink;

impl EventSink for GlobalEventSink {
    fn record(&self, event: EngineEvent) {
        metrics::with_state_mut(|m| {
            let owner = m
                .owners
                .entry(event.owner_path().to_string())
                .or_default();

            match event {
                EngineEvent::SyncApplied { .. } => {
                    m.ops.sync_applied = m.ops.sync_applied.saturating_add(1);
                    owner.sync_applied = owner.sync_applied.saturating_add(1);
                }
                EngineEvent::RefreshSkipped { .. } => {
                    m.ops.refresh_skipped = m.ops.refresh_skipped.saturating_add(1);
                    owner.refresh_skipped = owner.refresh_skipped.saturating_add(1);
                }
                EngineEvent::RefreshNarrowWrite { .. } => {
                    m.ops.narrow_writes = m.ops.narrow_writes.saturating_add(1);
                    owner.narrow_writes = owner.narrow_writes.saturating_add(1);
                }
                EngineEvent::RefreshFullSave { .. } => {
                    m.ops.full_saves = m.ops.full_saves.saturating_add(1);
                    owner.full_saves = owner.full_saves.saturating_add(1);
                }
                EngineEvent::PropagationHalted { .. } => {
                    m.ops.propagation_halted = m.ops.propagation_halted.saturating_add(1);
                    owner.propagation_halted = owner.propagation_halted.saturating_add(1);
                }
                EngineEvent::PredicateRejected { .. } => {
                    m.ops.predicate_rejected = m.ops.predicate_rejected.saturating_add(1);
                    owner.predicate_rejected = owner.predicate_rejected.saturating_add(1);
                }
                EngineEvent::CascadeCycleSkipped { .. } => {
                    m.ops.cycle_skipped = m.ops.cycle_skipped.saturating_add(1);
                    owner.cycle_skipped = owner.cycle_skipped.saturating_add(1);
                }
            }
        });
    }
}

pub(crate) const GLOBAL_EVENT_SINK: GlobalEventSink = GlobalEventSink;

pub(crate) fn record(event: EngineEvent) {
    let override_ptr = SINK_OVERRIDE.with(|cell| *cell.borrow());
    if let Some(ptr) = override_ptr {
        // SAFETY:
        // - `ptr` was produced from a valid `&dyn EventSink` in `with_sink`.
        // - `with_sink` restores the previous pointer on every exit,
        //   including unwind paths via `Guard::drop`, so `ptr` cannot
        //   outlive the borrowed sink.
        // - Dispatch is synchronous; `ptr` is never stored beyond this
        //   call, and only a shared reference is materialized.
        unsafe { (&*ptr).record(event) };
    } else {
        GLOBAL_EVENT_SINK.record(event);
    }
}

/// Snapshot the current counters for endpoint/test plumbing.
#[must_use]
pub fn counters() -> metrics::CounterState {
    metrics::snapshot()
}

/// Reset all counter state.
pub fn counters_reset() {
    metrics::reset();
}

/// Run a closure with a temporary event sink override.
pub fn with_sink<T>(sink: &dyn EventSink, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<*const dyn EventSink>);

    impl Drop for Guard {
        fn drop(&mut self) {
            SINK_OVERRIDE.with(|cell| {
                *cell.borrow_mut() = self.0;
            });
        }
    }

    // SAFETY:
    // - The erased pointer is installed only for this dynamic scope;
    //   `Guard` restores the previous slot on all exits, including panic.
    // - `record` only dereferences synchronously and never persists the
    //   pointer, so the borrow it was made from always outlives its use.
    let sink_ptr = unsafe { std::mem::transmute::<&dyn EventSink, *const dyn EventSink>(sink) };
    let prev = SINK_OVERRIDE.with(|cell| {
        let mut slot = cell.borrow_mut();
        slot.replace(sink_ptr)
    });
    let _guard = Guard(prev);

    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink<'a> {
        calls: &'a AtomicUsize,
    }

    impl EventSink for CountingSink<'_> {
        fn record(&self, _: EngineEvent) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    const EVENT: EngineEvent = EngineEvent::RefreshSkipped {
        owner_path: "obs::tests::Owner",
    };

    #[test]
    fn with_sink_routes_and_restores_nested_overrides() {
        SINK_OVERRIDE.with(|cell| {
            *cell.borrow_mut() = None;
        });

        let outer_calls = AtomicUsize::new(0);
        let inner_calls = AtomicUsize::new(0);
        let outer = CountingSink {
            calls: &outer_calls,
        };
        let inner = CountingSink {
            calls: &inner_calls,
        };

        with_sink(&outer, || {
            record(EVENT);
            assert_eq!(outer_calls.load(Ordering::SeqCst), 1);

            with_sink(&inner, || {
                record(EVENT);
            });

            // Inner override was restored to outer override.
            record(EVENT);
        });

        assert_eq!(outer_calls.load(Ordering::SeqCst), 2);
        assert_eq!(inner_calls.load(Ordering::SeqCst), 1);

        // Outer override was restored to previous (none).
        SINK_OVERRIDE.with(|cell| {
            assert!(cell.borrow().is_none());
        });
    }

    #[test]
    fn with_sink_restores_override_on_panic() {
        SINK_OVERRIDE.with(|cell| {
            *cell.borrow_mut() = None;
        });

        let calls = AtomicUsize::new(0);
        let sink = CountingSink { calls: &calls };

        let panicked = catch_unwind(AssertUnwindSafe(|| {
            with_sink(&sink, || {
                record(EVENT);
                panic!("intentional panic for guard test");
            });
        }))
        .is_err();
        assert!(panicked);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Guard restored TLS slot after unwind.
        SINK_OVERRIDE.with(|cell| {
            assert!(cell.borrow().is_none());
        });
    }

    #[test]
    fn global_sink_accumulates_per_owner_counters() {
        counters_reset();

        record(EngineEvent::RefreshNarrowWrite {
            owner_path: "obs::tests::Owner",
        });
        record(EngineEvent::PropagationHalted {
            owner_path: "obs::tests::Owner",
            reason: HaltReason::MissingForeignKey,
        });

        let snap = counters();
        assert_eq!(snap.ops.narrow_writes, 1);
        assert_eq!(snap.ops.propagation_halted, 1);

        let owner = snap
            .owners
            .get("obs::tests::Owner")
            .expect("owner counters should be present");
        assert_eq!(owner.narrow_writes, 1);
        assert_eq!(owner.propagation_halted, 1);
    }
}
