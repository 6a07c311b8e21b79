//! Notification events and dispatch.
//!
//! Core operations return the events they produce; the caller dispatches
//! them after the store commit. Delivery failure never rolls back the
//! committed operation, so `Notifier::notify` is infallible by contract
//! and implementations swallow (log) their own errors.

use serde::Serialize;

use crate::models::{BugStatus, Priority, RequestDecision, Role, Team};

/// Fire-and-forget event emitted by a committed core operation
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum NotificationEvent {
    BugReported {
        bug_id: String,
        reported_by: String,
    },
    TeamAssigned {
        bug_id: String,
        team: Team,
    },
    PriorityChanged {
        bug_id: String,
        priority: Priority,
    },
    DeveloperAssigned {
        bug_id: String,
        developer: String,
        estimated_hours: f64,
    },
    TesterAssigned {
        bug_id: String,
        tester: String,
        estimated_hours: f64,
    },
    Unassigned {
        bug_id: String,
        user: String,
        role: Role,
    },
    StatusChanged {
        bug_id: String,
        previous_status: BugStatus,
        new_status: BugStatus,
        changed_by: String,
    },
    /// A tester's closure of a critical bug was routed to the team lead
    ClosureApprovalRequired {
        bug_id: String,
        team_lead: Option<String>,
    },
    DuplicateMarked {
        bug_id: String,
        original_bug_id: String,
    },
    DuplicateUnmarked {
        bug_id: String,
        restored_status: BugStatus,
    },
    ReallocationRequested {
        bug_id: String,
        requested_by: String,
        role: Role,
    },
    ReallocationDecided {
        bug_id: String,
        role: Role,
        decision: RequestDecision,
    },
    ReopenRequested {
        bug_id: String,
        requested_by: String,
    },
    ReopenDecided {
        bug_id: String,
        decision: RequestDecision,
    },
}

/// Delivery seam for notification events
pub trait Notifier {
    fn notify(&self, event: &NotificationEvent);
}

/// Default notifier: writes each event to the log
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: &NotificationEvent) {
        log::info!("notification: {:?}", event);
    }
}

/// Dispatches every event through the notifier
pub fn dispatch_all(notifier: &dyn Notifier, events: &[NotificationEvent]) {
    for event in events {
        notifier.notify(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct Recorder(RefCell<Vec<NotificationEvent>>);

    impl Notifier for Recorder {
        fn notify(&self, event: &NotificationEvent) {
            self.0.borrow_mut().push(event.clone());
        }
    }

    #[test]
    fn test_dispatch_all_preserves_order() {
        let recorder = Recorder(RefCell::new(Vec::new()));
        let events = vec![
            NotificationEvent::BugReported {
                bug_id: "BUG-1".into(),
                reported_by: "rita@example.com".into(),
            },
            NotificationEvent::TeamAssigned {
                bug_id: "BUG-1".into(),
                team: Team::Frontend,
            },
        ];
        dispatch_all(&recorder, &events);
        assert_eq!(*recorder.0.borrow(), events);
    }
}
