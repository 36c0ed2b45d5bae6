use tracing::warn;

use super::types::AppointmentStatus::{self, Cancelled, Completed, Confirmed, Pending};
use crate::error::LifecycleError;
use crate::queue::QueueKind;

/// Statuses reachable from `from` in a single transition.
pub fn allowed_targets(from: AppointmentStatus) -> &'static [AppointmentStatus] {
    match from {
        Pending => &[Confirmed, Cancelled, Completed],
        Confirmed => &[Cancelled, Completed],
        Completed | Cancelled => &[],
    }
}

pub fn check_transition(from: AppointmentStatus, to: AppointmentStatus) -> Result<(), LifecycleError> {
    if allowed_targets(from).contains(&to) {
        Ok(())
    } else {
        warn!(%from, %to, "rejected status transition");
        Err(LifecycleError::IllegalTransition { from, to })
    }
}

/// Queue mutations that accompany a legal transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMove {
    /// Queues to drop the member from. Removal is a no-op where absent.
    pub remove: Vec<QueueKind>,
    /// Queue to (re)insert the member into, scored by its id.
    pub insert: Option<QueueKind>,
}

impl QueueMove {
    pub fn for_transition(from: AppointmentStatus, to: AppointmentStatus) -> Self {
        match (from, to) {
            (Pending, Confirmed) => QueueMove {
                remove: vec![QueueKind::Pending],
                insert: Some(QueueKind::Confirmed),
            },
            // Terminal targets leave both queues; clearing the sibling too
            // heals any earlier half-applied move.
            (_, Completed) | (_, Cancelled) => QueueMove {
                remove: QueueKind::ALL.to_vec(),
                insert: None,
            },
            _ => QueueMove { remove: Vec::new(), insert: None },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permitted_table_is_exact() {
        let permitted = [
            (Pending, Confirmed),
            (Pending, Cancelled),
            (Pending, Completed),
            (Confirmed, Cancelled),
            (Confirmed, Completed),
        ];

        for from in AppointmentStatus::ALL {
            for to in AppointmentStatus::ALL {
                let expected = permitted.contains(&(from, to));
                assert_eq!(
                    check_transition(from, to).is_ok(),
                    expected,
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn terminal_states_have_no_exit() {
        assert!(allowed_targets(Completed).is_empty());
        assert!(allowed_targets(Cancelled).is_empty());
    }

    #[test]
    fn confirmation_moves_between_queues() {
        let mv = QueueMove::for_transition(Pending, Confirmed);
        assert_eq!(mv.remove, vec![QueueKind::Pending]);
        assert_eq!(mv.insert, Some(QueueKind::Confirmed));

        let mv = QueueMove::for_transition(Confirmed, Cancelled);
        assert_eq!(mv.remove, vec![QueueKind::Pending, QueueKind::Confirmed]);
        assert_eq!(mv.insert, None);
    }
}
