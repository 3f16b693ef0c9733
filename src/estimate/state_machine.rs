//! Estimate approval state machine.
//!
//! The transition table lives here and nowhere else. `transition` is pure;
//! persistence and compare-and-swap are the service's job.
//!
//! | From                              | Event             | To                                |
//! |-----------------------------------|-------------------|-----------------------------------|
//! | draft                             | ShareWithMechanic | shared_pending_mechanic_approval  |
//! | shared_pending_mechanic_approval  | MechanicApprove   | approved                          |
//! | shared_pending_mechanic_approval  | MechanicModify    | pending_customer_approval         |
//! | shared_pending_mechanic_approval  | MechanicDecline   | rejected                          |
//! | pending_customer_approval         | CustomerApprove   | approved                          |
//! | pending_customer_approval         | CustomerReject    | shared_pending_mechanic_approval  |

use crate::errors::WorkflowError;

use super::notify::NotificationKind;
use super::types::{EstimateEvent, EstimateStatus, Party};

/// Resolve the next status, or explain why the event is not allowed.
pub fn transition(
    estimate_id: &str,
    from: EstimateStatus,
    event: EstimateEvent,
) -> Result<EstimateStatus, WorkflowError> {
    use EstimateEvent as E;
    use EstimateStatus as S;

    if from.is_terminal() {
        return Err(WorkflowError::TerminalState {
            estimate_id: estimate_id.to_string(),
            status: from,
        });
    }

    match (from, event) {
        (S::Draft, E::ShareWithMechanic) => Ok(S::SharedPendingMechanicApproval),
        (S::SharedPendingMechanicApproval, E::MechanicApprove) => Ok(S::Approved),
        (S::SharedPendingMechanicApproval, E::MechanicModify) => Ok(S::PendingCustomerApproval),
        (S::SharedPendingMechanicApproval, E::MechanicDecline) => Ok(S::Rejected),
        (S::PendingCustomerApproval, E::CustomerApprove) => Ok(S::Approved),
        (S::PendingCustomerApproval, E::CustomerReject) => Ok(S::SharedPendingMechanicApproval),
        _ => Err(WorkflowError::InvalidTransition { from, event }),
    }
}

/// Compare the caller's view of the status with the persisted one.
pub fn ensure_expected(
    estimate_id: &str,
    expected: EstimateStatus,
    actual: EstimateStatus,
) -> Result<(), WorkflowError> {
    if expected != actual {
        return Err(WorkflowError::StateConflict {
            estimate_id: estimate_id.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

/// Who hears about an accepted event, and what they hear.
pub fn notification_for(event: EstimateEvent) -> (Party, NotificationKind) {
    match event {
        EstimateEvent::ShareWithMechanic => (Party::Mechanic, NotificationKind::EstimateShared),
        EstimateEvent::MechanicApprove => (Party::Customer, NotificationKind::EstimateApproved),
        EstimateEvent::MechanicModify => (Party::Customer, NotificationKind::EstimateModified),
        EstimateEvent::MechanicDecline => (Party::Customer, NotificationKind::EstimateDeclined),
        EstimateEvent::CustomerApprove => (Party::Mechanic, NotificationKind::EstimateApproved),
        EstimateEvent::CustomerReject => (Party::Mechanic, NotificationKind::EstimateReturned),
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATUSES: [EstimateStatus; 5] = [
        EstimateStatus::Draft,
        EstimateStatus::SharedPendingMechanicApproval,
        EstimateStatus::PendingCustomerApproval,
        EstimateStatus::Approved,
        EstimateStatus::Rejected,
    ];

    const ALL_EVENTS: [EstimateEvent; 6] = [
        EstimateEvent::ShareWithMechanic,
        EstimateEvent::MechanicApprove,
        EstimateEvent::MechanicModify,
        EstimateEvent::MechanicDecline,
        EstimateEvent::CustomerApprove,
        EstimateEvent::CustomerReject,
    ];

    #[test]
    fn test_happy_paths() {
        assert_eq!(
            transition("e", EstimateStatus::Draft, EstimateEvent::ShareWithMechanic).unwrap(),
            EstimateStatus::SharedPendingMechanicApproval
        );
        assert_eq!(
            transition(
                "e",
                EstimateStatus::SharedPendingMechanicApproval,
                EstimateEvent::MechanicModify
            )
            .unwrap(),
            EstimateStatus::PendingCustomerApproval
        );
        assert_eq!(
            transition(
                "e",
                EstimateStatus::PendingCustomerApproval,
                EstimateEvent::CustomerReject
            )
            .unwrap(),
            EstimateStatus::SharedPendingMechanicApproval
        );
        assert_eq!(
            transition(
                "e",
                EstimateStatus::PendingCustomerApproval,
                EstimateEvent::CustomerApprove
            )
            .unwrap(),
            EstimateStatus::Approved
        );
    }

    #[test]
    fn test_terminal_states_accept_nothing() {
        for from in [EstimateStatus::Approved, EstimateStatus::Rejected] {
            for event in ALL_EVENTS {
                let err = transition("e", from, event).unwrap_err();
                assert_eq!(err.kind(), "TerminalStateError", "{from} / {event}");
            }
        }
    }

    #[test]
    fn test_table_has_exactly_six_edges() {
        let mut allowed = 0;
        for from in ALL_STATUSES {
            for event in ALL_EVENTS {
                match transition("e", from, event) {
                    Ok(_) => allowed += 1,
                    Err(e) => assert!(
                        matches!(e.kind(), "TerminalStateError" | "InvalidTransitionError"),
                        "unexpected {e}"
                    ),
                }
            }
        }
        assert_eq!(allowed, 6);
    }

    #[test]
    fn test_customer_cannot_approve_draft() {
        let err = transition("e", EstimateStatus::Draft, EstimateEvent::CustomerApprove)
            .unwrap_err();
        assert_eq!(err.kind(), "InvalidTransitionError");
    }

    #[test]
    fn test_ensure_expected() {
        assert!(ensure_expected("e", EstimateStatus::Draft, EstimateStatus::Draft).is_ok());
        let err = ensure_expected(
            "e",
            EstimateStatus::PendingCustomerApproval,
            EstimateStatus::Approved,
        )
        .unwrap_err();
        assert_eq!(err.kind(), "StateConflictError");
    }

    #[test]
    fn test_notifications_go_to_the_other_party() {
        for event in ALL_EVENTS {
            let (recipient, _) = notification_for(event);
            assert_ne!(recipient, event.actor(), "{event}");
        }
    }
}
