//! Reopen sub-workflow.
//!
//! A bug can be reopened at most once in its lifetime, whatever the actor's
//! role. The assigned developer or tester raises a request within 7 days of
//! the closing entry; admins and team leads reopen directly with no window.
//! Reopening prefers the original developer when they still fit under the
//! cap, then the assignment engine, and otherwise leaves the bug Open and
//! unassigned.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::assignment::{self, AssignmentConfig};
use crate::auth::RoleContext;
use crate::error::{BugError, Result};
use crate::models::{
    BugStatus, BugStore, HistoryEntry, HistoryKind, ReopenRequest, RequestDecision, Role,
};
use crate::notify::NotificationEvent;
use crate::ops::{bug_team, find_bug, find_bug_mut, Outcome};
use crate::workload::{self, WORKLOAD_CAP};

/// Days after the closing entry during which a developer or tester may
/// still request a reopen
pub const REOPEN_WINDOW_DAYS: i64 = 7;

const REASON_MIN: usize = 10;
const REASON_MAX: usize = 100;

fn ensure_reopenable(store: &BugStore, bug_id: &str) -> Result<()> {
    let bug = find_bug(store, bug_id)?;
    if bug.status != BugStatus::Closed {
        return Err(BugError::StateConflict(format!(
            "only a closed bug can be reopened; {} is {}",
            bug_id, bug.status
        )));
    }
    if bug.reopened {
        return Err(BugError::StateConflict(format!(
            "bug {} was already reopened once; a second reopen is never permitted",
            bug_id
        )));
    }
    Ok(())
}

/// Raises a reopen request on a closed bug
pub fn request_reopen(
    store: &mut BugStore,
    actor: &str,
    bug_id: &str,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<Outcome> {
    let reason_len = reason.chars().count();
    if !(REASON_MIN..=REASON_MAX).contains(&reason_len) {
        return Err(BugError::Validation(format!(
            "reopen reason must be {}-{} characters, got {}",
            REASON_MIN, REASON_MAX, reason_len
        )));
    }
    ensure_reopenable(store, bug_id)?;

    let bug = find_bug(store, bug_id)?;

    let closed_on = bug
        .last_closing_entry()
        .map(|e| e.changed_on)
        .unwrap_or(bug.created_at);
    if now - closed_on > Duration::days(REOPEN_WINDOW_DAYS) {
        return Err(BugError::StateConflict(format!(
            "the {}-day reopen window for {} has passed",
            REOPEN_WINDOW_DAYS, bug_id
        )));
    }
    if bug
        .reopen_requests
        .iter()
        .any(|r| r.requested_by == actor && r.status == RequestDecision::Pending)
    {
        return Err(BugError::StateConflict(format!(
            "{} already has a pending reopen request on {}",
            actor, bug_id
        )));
    }

    // Only the developer or tester still on the assignment record may ask
    let role = if bug.assigned_to.developer.as_deref() == Some(actor) {
        Role::Developer
    } else if bug.assigned_to.tester.as_deref() == Some(actor) {
        Role::Tester
    } else {
        return Err(BugError::Authorization(format!(
            "only the assigned developer or tester of {} may request a reopen",
            bug_id
        )));
    };

    let request = ReopenRequest {
        id: Uuid::new_v4(),
        requested_by: actor.to_string(),
        role,
        reason: reason.to_string(),
        requested_on: now,
        status: RequestDecision::Pending,
        reviewed_by: None,
        reviewed_on: None,
    };
    let request_id = request.id;

    let bug = find_bug_mut(store, bug_id)?;
    bug.reopen_requests.push(request);
    let mut entry = HistoryEntry::new(HistoryKind::ReopenRequest, actor, role, now);
    entry.request_id = Some(request_id);
    entry.reason = Some(reason.to_string());
    bug.change_history.push(entry);

    Ok(
        Outcome::new(bug_id, format!("reopen requested ({})", request_id)).with_event(
            NotificationEvent::ReopenRequested {
                bug_id: bug_id.to_string(),
                requested_by: actor.to_string(),
            },
        ),
    )
}

/// Decides a pending reopen request. Admin/teamlead only.
pub fn decide_reopen(
    store: &mut BugStore,
    config: &AssignmentConfig,
    actor: &str,
    bug_id: &str,
    request_id: Uuid,
    approve: bool,
    now: DateTime<Utc>,
) -> Result<Outcome> {
    let bug = find_bug(store, bug_id)?;
    let application = bug.application.clone();
    let team = bug_team(bug)?;

    let request = bug
        .reopen_requests
        .iter()
        .find(|r| r.id == request_id)
        .ok_or_else(|| {
            BugError::NotFound(format!("reopen request {} not found on {}", request_id, bug_id))
        })?;
    if request.status != RequestDecision::Pending {
        return Err(BugError::StateConflict(format!(
            "reopen request {} was already {}",
            request_id, request.status
        )));
    }

    let ctx = RoleContext::resolve(store, actor, &application, team)?;
    if !ctx.is_privileged() {
        return Err(BugError::Authorization(
            "only an admin or team lead may decide a reopen request".into(),
        ));
    }
    let actor_role = ctx.primary_role();

    if approve {
        ensure_reopenable(store, bug_id)?;
    }

    let decision = if approve {
        RequestDecision::Approved
    } else {
        RequestDecision::Rejected
    };

    let mut events = vec![NotificationEvent::ReopenDecided {
        bug_id: bug_id.to_string(),
        decision,
    }];
    let detail;
    let mut new_status = None;

    if approve {
        let (status, mut reopen_events, summary) =
            perform_reopen(store, config, actor, &application, team, bug_id, now)?;
        events.append(&mut reopen_events);
        detail = format!("reopen approved; {}", summary);
        new_status = Some(status);
    } else {
        detail = format!("reopen request {} rejected", request_id);
    }

    let bug = find_bug_mut(store, bug_id)?;
    if let Some(request) = bug.reopen_requests.iter_mut().find(|r| r.id == request_id) {
        request.status = decision;
        request.reviewed_by = Some(actor.to_string());
        request.reviewed_on = Some(now);
    }
    let mut entry = HistoryEntry::new(HistoryKind::ReopenDecision, actor, actor_role, now);
    entry.request_id = Some(request_id);
    entry.decision = Some(decision);
    entry.previous_status = Some(BugStatus::Closed);
    entry.new_status = Some(new_status.unwrap_or(BugStatus::Closed));
    bug.change_history.push(entry);

    let mut outcome = Outcome::new(bug_id, detail);
    outcome.events = events;
    Ok(outcome)
}

/// Reopens a closed bug directly. Admin/teamlead only; the 7-day window
/// does not apply, but the single-reopen rule still does.
pub fn reopen_direct(
    store: &mut BugStore,
    config: &AssignmentConfig,
    actor: &str,
    bug_id: &str,
    reason: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Outcome> {
    ensure_reopenable(store, bug_id)?;

    let bug = find_bug(store, bug_id)?;
    let application = bug.application.clone();
    let team = bug_team(bug)?;

    let ctx = RoleContext::resolve(store, actor, &application, team)?;
    if !ctx.is_privileged() {
        return Err(BugError::Authorization(
            "only an admin or team lead may reopen a bug directly".into(),
        ));
    }
    let actor_role = ctx.primary_role();

    let (status, events, summary) = perform_reopen(store, config, actor, &application, team, bug_id, now)?;

    let bug = find_bug_mut(store, bug_id)?;
    let mut entry = HistoryEntry::new(HistoryKind::ReopenDecision, actor, actor_role, now);
    entry.decision = Some(RequestDecision::Approved);
    entry.previous_status = Some(BugStatus::Closed);
    entry.new_status = Some(status);
    entry.reason = reason.map(str::to_string);
    bug.change_history.push(entry);

    let mut outcome = Outcome::new(bug_id, summary);
    outcome.events = events;
    Ok(outcome)
}

/// Flips `reopened`, clears the testing fields, and places the bug: the
/// original developer if they still fit under the cap, else the engine's
/// pick, else unassigned in Open.
fn perform_reopen(
    store: &mut BugStore,
    config: &AssignmentConfig,
    actor: &str,
    application: &str,
    team: crate::models::Team,
    bug_id: &str,
    now: DateTime<Utc>,
) -> Result<(BugStatus, Vec<NotificationEvent>, String)> {
    let bug = find_bug(store, bug_id)?;
    let priority = bug.priority;
    let original_developer = bug.assigned_to.developer.clone();

    let mut placement: Option<(String, f64)> = None;
    if let Some(p) = priority {
        let estimate = config.estimate(Role::Developer, p);
        if let Some(dev) = &original_developer {
            if let Ok(current) = workload::current_hours(store, dev, application, team, Role::Developer) {
                if current + estimate <= WORKLOAD_CAP {
                    placement = Some((dev.clone(), estimate));
                }
            }
        }
        if placement.is_none() {
            placement = assignment::select(store, config, application, team, Role::Developer, p)
                .map(|pick| (pick.email, pick.estimated_hours));
        }
    }

    let mut events = Vec::new();
    let status;
    let summary;
    if let Some((email, hours)) = placement {
        workload::adjust(store, &email, application, team, Role::Developer, hours)?;
        status = BugStatus::Assigned;
        summary = format!("reopened and assigned to {}", email);
        events.push(NotificationEvent::DeveloperAssigned {
            bug_id: bug_id.to_string(),
            developer: email.clone(),
            estimated_hours: hours,
        });
        let bug = find_bug_mut(store, bug_id)?;
        bug.assigned_to.developer = Some(email);
    } else {
        status = BugStatus::Open;
        summary = "reopened unassigned".to_string();
        let bug = find_bug_mut(store, bug_id)?;
        bug.assigned_to.developer = None;
    }

    let bug = find_bug_mut(store, bug_id)?;
    bug.reopened = true;
    bug.status = status;
    bug.status_last_updated = Some(now);
    bug.assigned_to.tester = None;
    bug.developer_resolution_hours = None;
    bug.tester_validation_hours = None;

    events.push(NotificationEvent::StatusChanged {
        bug_id: bug_id.to_string(),
        previous_status: BugStatus::Closed,
        new_status: status,
        changed_by: actor.to_string(),
    });

    Ok((status, events, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Seniority;
    use crate::ops::testutil::{dev_hours, now, seeded_store, user};

    fn cfg() -> AssignmentConfig {
        AssignmentConfig::default()
    }

    /// BUG-1 closed just now with dev@x.com on record as its developer
    fn closed_store(closed_on: DateTime<Utc>) -> BugStore {
        let mut store = seeded_store();
        {
            let bug = store.get_bug_mut("BUG-1").unwrap();
            bug.assigned_to.developer = Some("dev@x.com".into());
            bug.status = BugStatus::Closed;
            let mut entry =
                HistoryEntry::new(HistoryKind::StatusChange, "lead@x.com", Role::TeamLead, closed_on);
            entry.previous_status = Some(BugStatus::TestedVerified);
            entry.new_status = Some(BugStatus::Closed);
            bug.change_history.push(entry);
        }
        store
    }

    #[test]
    fn test_request_within_window_and_decide() {
        let mut store = closed_store(now());
        request_reopen(&mut store, "dev@x.com", "BUG-1", "regression seen in 2.4.1", now())
            .unwrap();
        let id = store.get_bug("BUG-1").unwrap().reopen_requests[0].id;

        decide_reopen(&mut store, &cfg(), "lead@x.com", "BUG-1", id, true, now()).unwrap();
        let bug = store.get_bug("BUG-1").unwrap();
        assert!(bug.reopened);
        assert_eq!(bug.status, BugStatus::Assigned);
        // Original developer at 10h easily fits the 6h Critical estimate
        assert_eq!(bug.assigned_to.developer.as_deref(), Some("dev@x.com"));
        assert_eq!(dev_hours(&store, "dev@x.com"), 16.0);
    }

    #[test]
    fn test_request_after_window_rejected() {
        let closed_on = now() - Duration::days(8);
        let mut store = closed_store(closed_on);
        let err = request_reopen(&mut store, "dev@x.com", "BUG-1", "regression seen", now())
            .unwrap_err();
        assert!(matches!(err, BugError::StateConflict(_)));
    }

    #[test]
    fn test_direct_reopen_ignores_window_but_not_single_reopen() {
        let closed_on = now() - Duration::days(30);
        let mut store = closed_store(closed_on);
        reopen_direct(&mut store, &cfg(), "admin@x.com", "BUG-1", None, now()).unwrap();
        assert!(store.get_bug("BUG-1").unwrap().reopened);

        // Close it again and try a second reopen as admin
        store.get_bug_mut("BUG-1").unwrap().status = BugStatus::Closed;
        let err =
            reopen_direct(&mut store, &cfg(), "admin@x.com", "BUG-1", None, now()).unwrap_err();
        assert!(matches!(err, BugError::StateConflict(_)));
    }

    #[test]
    fn test_second_request_rejected_after_reopen() {
        let mut store = closed_store(now());
        reopen_direct(&mut store, &cfg(), "lead@x.com", "BUG-1", None, now()).unwrap();
        store.get_bug_mut("BUG-1").unwrap().status = BugStatus::Closed;

        let err = request_reopen(&mut store, "dev@x.com", "BUG-1", "still failing", now())
            .unwrap_err();
        assert!(matches!(err, BugError::StateConflict(_)));
    }

    #[test]
    fn test_busy_original_developer_falls_back_to_engine() {
        let mut store = closed_store(now());
        store.get_user_mut("dev@x.com").unwrap().roles[0].workload_hours = 38.0;
        store.add_user(user("dev2@x.com", Role::Developer, Some(Seniority::Mid), 4.0));

        reopen_direct(&mut store, &cfg(), "lead@x.com", "BUG-1", None, now()).unwrap();
        let bug = store.get_bug("BUG-1").unwrap();
        assert_eq!(bug.assigned_to.developer.as_deref(), Some("dev2@x.com"));
        assert_eq!(dev_hours(&store, "dev2@x.com"), 10.0);
        assert_eq!(dev_hours(&store, "dev@x.com"), 38.0);
    }

    #[test]
    fn test_no_candidate_leaves_open_unassigned() {
        let mut store = closed_store(now());
        store.get_user_mut("dev@x.com").unwrap().roles[0].workload_hours = 46.0;

        reopen_direct(&mut store, &cfg(), "lead@x.com", "BUG-1", None, now()).unwrap();
        let bug = store.get_bug("BUG-1").unwrap();
        assert_eq!(bug.status, BugStatus::Open);
        assert!(bug.assigned_to.developer.is_none());
        assert!(bug.reopened);
    }

    #[test]
    fn test_rejection_leaves_bug_closed() {
        let mut store = closed_store(now());
        request_reopen(&mut store, "dev@x.com", "BUG-1", "regression seen in 2.4.1", now())
            .unwrap();
        let id = store.get_bug("BUG-1").unwrap().reopen_requests[0].id;

        decide_reopen(&mut store, &cfg(), "lead@x.com", "BUG-1", id, false, now()).unwrap();
        let bug = store.get_bug("BUG-1").unwrap();
        assert_eq!(bug.status, BugStatus::Closed);
        assert!(!bug.reopened);
        assert_eq!(bug.reopen_requests[0].status, RequestDecision::Rejected);
    }

    #[test]
    fn test_reopen_request_requires_assignment() {
        let mut store = closed_store(now());
        let err = request_reopen(&mut store, "rita@x.com", "BUG-1", "it is back again", now())
            .unwrap_err();
        assert!(matches!(err, BugError::Authorization(_)));

        // Holding a developer role on the team is not enough either
        store.add_user(user("dev2@x.com", Role::Developer, Some(Seniority::Mid), 4.0));
        let err = request_reopen(&mut store, "dev2@x.com", "BUG-1", "it is back again", now())
            .unwrap_err();
        assert!(matches!(err, BugError::Authorization(_)));

        // The developer on the assignment record may ask
        request_reopen(&mut store, "dev@x.com", "BUG-1", "it is back again", now()).unwrap();
    }

    #[test]
    fn test_reopen_reason_length_checked() {
        let mut store = closed_store(now());
        let err = request_reopen(&mut store, "dev@x.com", "BUG-1", "too short", now()).unwrap_err();
        assert!(matches!(err, BugError::Validation(_)));

        let long = "x".repeat(101);
        let err = request_reopen(&mut store, "dev@x.com", "BUG-1", &long, now()).unwrap_err();
        assert!(matches!(err, BugError::Validation(_)));
        assert!(store.get_bug("BUG-1").unwrap().reopen_requests.is_empty());
    }
}
