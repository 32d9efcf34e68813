use thiserror::Error;

use crate::models::TicketStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("status transition from {current} to {target} is not allowed")]
pub struct TransitionError {
    pub current: TicketStatus,
    pub target: TicketStatus,
}

/// Checks a ticket status change against the lifecycle graph.
///
/// PLANNED → IN_PROGRESS | CANCELLED, IN_PROGRESS → COMPLETED | CANCELLED,
/// COMPLETED → CLOSED. CLOSED and CANCELLED are terminal. Staying in the same
/// status is always accepted.
pub fn validate_transition(
    current: TicketStatus,
    target: TicketStatus,
) -> Result<(), TransitionError> {
    use TicketStatus::*;

    if current == target {
        return Ok(());
    }

    let allowed = match current {
        Planned => matches!(target, InProgress | Cancelled),
        InProgress => matches!(target, Completed | Cancelled),
        Completed => target == Closed,
        terminal => !terminal.is_terminal(),
    };

    if allowed {
        Ok(())
    } else {
        Err(TransitionError { current, target })
    }
}
