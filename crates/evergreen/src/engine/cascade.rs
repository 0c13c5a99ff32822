use crate::{error::EngineError, value::Value};
use std::{cell::RefCell, collections::BTreeSet};

///
/// CascadeState
///
/// Per-top-level-event bookkeeping for the recursive cascade. Recursive
/// propagation has no natural termination when dependent values keep
/// diverging, so this guard bounds it: a record/attribute pair refreshes
/// at most once per top-level event (visited set), and engine re-entries
/// are capped (depth limit) as a backstop.
///

#[derive(Debug, Default)]
pub(crate) struct CascadeState {
    depth: usize,
    visited: BTreeSet<(&'static str, Value, &'static str)>,
}

///
/// CascadeScope
///
/// RAII re-entry frame. Dropping the outermost frame clears the visited
/// set, including on error and unwind paths.
///

#[derive(Debug)]
pub(crate) struct CascadeScope<'a> {
    state: &'a RefCell<CascadeState>,
}

impl Drop for CascadeScope<'_> {
    fn drop(&mut self) {
        let mut state = self.state.borrow_mut();
        state.depth -= 1;
        if state.depth == 0 {
            state.visited.clear();
        }
    }
}

/// Enter one cascade frame, failing when the depth limit is reached.
pub(crate) fn enter(
    state: &RefCell<CascadeState>,
    limit: usize,
) -> Result<CascadeScope<'_>, EngineError> {
    let mut inner = state.borrow_mut();
    if inner.depth >= limit {
        return Err(EngineError::CascadeDepthExceeded { limit });
    }
    inner.depth += 1;
    drop(inner);

    Ok(CascadeScope { state })
}

/// Record a refresh target; false when it was already refreshed within
/// the current top-level event.
pub(crate) fn mark_visited(
    state: &RefCell<CascadeState>,
    type_path: &'static str,
    key: Value,
    attribute: &'static str,
) -> bool {
    state.borrow_mut().visited.insert((type_path, key, attribute))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_limit_rejects_entry_at_the_cap() {
        let state = RefCell::new(CascadeState::default());

        let outer = enter(&state, 2).expect("first frame fits");
        let _inner = enter(&state, 2).expect("second frame fits");
        let err = enter(&state, 2).expect_err("third frame exceeds the cap");
        assert_eq!(err, EngineError::CascadeDepthExceeded { limit: 2 });

        drop(outer);
    }

    #[test]
    fn visited_set_clears_when_outermost_frame_exits() {
        let state = RefCell::new(CascadeState::default());

        {
            let _scope = enter(&state, 8).expect("frame fits");
            assert!(mark_visited(&state, "demo::Project", Value::Uint(1), "done"));
            assert!(!mark_visited(&state, "demo::Project", Value::Uint(1), "done"));
            // Same record, different attribute is a distinct target.
            assert!(mark_visited(&state, "demo::Project", Value::Uint(1), "count"));
        }

        // A fresh top-level event starts with a clean slate.
        let _scope = enter(&state, 8).expect("frame fits");
        assert!(mark_visited(&state, "demo::Project", Value::Uint(1), "done"));
    }

    #[test]
    fn nested_frames_share_the_visited_set() {
        let state = RefCell::new(CascadeState::default());

        let _outer = enter(&state, 8).expect("frame fits");
        assert!(mark_visited(&state, "demo::Task", Value::Uint(9), "name"));
        let _inner = enter(&state, 8).expect("frame fits");
        assert!(!mark_visited(&state, "demo::Task", Value::Uint(9), "name"));
    }
}
