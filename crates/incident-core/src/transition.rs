//! The status transition table.
//!
//! | from | allowed to |
//! |------|------------|
//! | `open` | `in_progress`, `resolved`, `closed` |
//! | `in_progress` | `open`, `resolved`, `closed` |
//! | `resolved` | `open`, `in_progress`, `closed` |
//! | `closed` | `open` |
//!
//! Self-transitions are never allowed. There is no terminal state: a closed
//! incident can always be reopened.

use incident_types::Status;

use crate::error::LifecycleError;

/// Returns the statuses reachable from `from` in one step.
pub fn allowed_transitions(from: Status) -> &'static [Status] {
    match from {
        Status::Open => &[Status::InProgress, Status::Resolved, Status::Closed],
        Status::InProgress => &[Status::Open, Status::Resolved, Status::Closed],
        Status::Resolved => &[Status::Open, Status::InProgress, Status::Closed],
        Status::Closed => &[Status::Open],
    }
}

pub fn can_transition(from: Status, to: Status) -> bool {
    allowed_transitions(from).contains(&to)
}

/// Fails with `InvalidTransition` unless `from -> to` is in the table.
pub fn check_transition(from: Status, to: Status) -> Result<(), LifecycleError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(LifecycleError::InvalidTransition { from, to })
    }
}
