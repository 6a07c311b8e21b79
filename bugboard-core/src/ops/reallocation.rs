//! Reallocation sub-workflow: an assigned developer or tester asks to be
//! replaced, and an admin or team lead decides.
//!
//! Requests move Pending -> Approved/Rejected and are terminal once
//! decided; each requester may have one Pending request per bug and role.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::assignment::{self, AssignmentConfig};
use crate::auth::RoleContext;
use crate::error::{BugError, Result};
use crate::models::{
    BugStatus, BugStore, HistoryEntry, HistoryKind, ReallocationRequest, RequestDecision, Role,
};
use crate::notify::NotificationEvent;
use crate::ops::{bug_priority, bug_team, ensure_not_terminal, find_bug, find_bug_mut, Outcome};
use crate::workload::{self, WORKLOAD_CAP};

const REASON_MIN: usize = 10;
const REASON_MAX: usize = 100;

/// Statuses in which the assigned developer may ask to be replaced
const DEVELOPER_ACTIVE: &[BugStatus] = &[BugStatus::Assigned, BugStatus::FixInProgress];

/// Statuses in which the assigned tester may ask to be replaced
const TESTER_ACTIVE: &[BugStatus] = &[BugStatus::TesterAssigned, BugStatus::TestingInProgress];

/// Raises a reallocation request for the actor's own assignment
pub fn request_reallocation(
    store: &mut BugStore,
    actor: &str,
    bug_id: &str,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<Outcome> {
    let reason_len = reason.chars().count();
    if !(REASON_MIN..=REASON_MAX).contains(&reason_len) {
        return Err(BugError::Validation(format!(
            "reallocation reason must be {}-{} characters, got {}",
            REASON_MIN, REASON_MAX, reason_len
        )));
    }

    let bug = find_bug(store, bug_id)?;
    ensure_not_terminal(bug)?;
    let status = bug.status;

    // The requester's role follows from which assignment they hold
    let role = if bug.assigned_to.developer.as_deref() == Some(actor) {
        if !DEVELOPER_ACTIVE.contains(&status) {
            return Err(BugError::StateConflict(format!(
                "developer reallocation is only available while the bug is {} or {}, currently {}",
                BugStatus::Assigned,
                BugStatus::FixInProgress,
                status
            )));
        }
        Role::Developer
    } else if bug.assigned_to.tester.as_deref() == Some(actor) {
        if !TESTER_ACTIVE.contains(&status) {
            return Err(BugError::StateConflict(format!(
                "tester reallocation is only available while the bug is {} or {}, currently {}",
                BugStatus::TesterAssigned,
                BugStatus::TestingInProgress,
                status
            )));
        }
        Role::Tester
    } else {
        return Err(BugError::Authorization(format!(
            "{} is not assigned to {}",
            actor, bug_id
        )));
    };

    let requests = match role {
        Role::Developer => &bug.reallocation_requests.developer,
        _ => &bug.reallocation_requests.tester,
    };
    if requests
        .iter()
        .any(|r| r.requested_by == actor && r.status == RequestDecision::Pending)
    {
        return Err(BugError::StateConflict(format!(
            "{} already has a pending reallocation request on {}",
            actor, bug_id
        )));
    }

    let request = ReallocationRequest::new(actor, reason);
    let request_id = request.id;

    let bug = find_bug_mut(store, bug_id)?;
    match role {
        Role::Developer => bug.reallocation_requests.developer.push(request),
        _ => bug.reallocation_requests.tester.push(request),
    }
    let mut entry = HistoryEntry::new(HistoryKind::ReallocationRequest, actor, role, now);
    entry.request_id = Some(request_id);
    entry.reason = Some(reason.to_string());
    bug.change_history.push(entry);

    Ok(
        Outcome::new(bug_id, format!("reallocation requested ({})", request_id)).with_event(
            NotificationEvent::ReallocationRequested {
                bug_id: bug_id.to_string(),
                requested_by: actor.to_string(),
                role,
            },
        ),
    )
}

/// Decides a pending reallocation request. Approval releases the outgoing
/// assignee's committed estimate and replaces them, either with a
/// lead-specified user (subject to the 40-hour cap) or through the
/// assignment engine; when neither placement works the bug is left
/// unassigned with the failure recorded.
pub fn decide_reallocation(
    store: &mut BugStore,
    config: &AssignmentConfig,
    actor: &str,
    bug_id: &str,
    request_id: Uuid,
    approve: bool,
    replacement: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Outcome> {
    let bug = find_bug(store, bug_id)?;
    ensure_not_terminal(bug)?;
    let application = bug.application.clone();
    let team = bug_team(bug)?;
    let priority = bug_priority(bug)?;

    // Locate the request; which list it sits in determines the role
    let (role, request) = bug
        .reallocation_requests
        .developer
        .iter()
        .find(|r| r.id == request_id)
        .map(|r| (Role::Developer, r))
        .or_else(|| {
            bug.reallocation_requests
                .tester
                .iter()
                .find(|r| r.id == request_id)
                .map(|r| (Role::Tester, r))
        })
        .ok_or_else(|| {
            BugError::NotFound(format!("reallocation request {} not found on {}", request_id, bug_id))
        })?;
    if request.status != RequestDecision::Pending {
        return Err(BugError::StateConflict(format!(
            "reallocation request {} was already {}",
            request_id, request.status
        )));
    }
    let outgoing = request.requested_by.clone();

    let ctx = RoleContext::resolve(store, actor, &application, team)?;
    if !ctx.is_privileged() {
        return Err(BugError::Authorization(
            "only an admin or team lead may decide a reallocation request".into(),
        ));
    }
    let actor_role = ctx.primary_role();
    let decision = if approve {
        RequestDecision::Approved
    } else {
        RequestDecision::Rejected
    };

    let mut events = vec![NotificationEvent::ReallocationDecided {
        bug_id: bug_id.to_string(),
        role,
        decision,
    }];
    let detail;

    if approve {
        let estimate = config.estimate(role, priority);
        workload::adjust(store, &outgoing, &application, team, role, -estimate)?;

        // Placement: the lead's named replacement wins if they fit the cap,
        // otherwise the engine tries, otherwise the bug goes back to the
        // unassigned pool with the reason recorded
        enum Placement {
            User(String, f64),
            None(String),
        }
        let placement = if let Some(named) = replacement {
            let current = workload::current_hours(store, named, &application, team, role)?;
            if current + estimate <= WORKLOAD_CAP {
                Placement::User(named.to_string(), estimate)
            } else {
                Placement::None(format!(
                    "replacement {} is at {:.1}h and cannot take {:.1}h more",
                    named, current, estimate
                ))
            }
        } else if let Some(pick) =
            assignment::select(store, config, &application, team, role, priority)
        {
            Placement::User(pick.email, pick.estimated_hours)
        } else {
            Placement::None("no eligible replacement found by the assignment engine".into())
        };

        match placement {
            Placement::User(email, hours) => {
                workload::adjust(store, &email, &application, team, role, hours)?;
                let bug = find_bug_mut(store, bug_id)?;
                match role {
                    Role::Developer => {
                        bug.assigned_to.developer = Some(email.clone());
                        bug.status = BugStatus::Assigned;
                        events.push(NotificationEvent::DeveloperAssigned {
                            bug_id: bug_id.to_string(),
                            developer: email.clone(),
                            estimated_hours: hours,
                        });
                    }
                    _ => {
                        bug.assigned_to.tester = Some(email.clone());
                        bug.status = BugStatus::TesterAssigned;
                        events.push(NotificationEvent::TesterAssigned {
                            bug_id: bug_id.to_string(),
                            tester: email.clone(),
                            estimated_hours: hours,
                        });
                    }
                }
                bug.status_last_updated = Some(now);
                detail = format!("reallocation approved, {} takes over from {}", email, outgoing);
            }
            Placement::None(why) => {
                let bug = find_bug_mut(store, bug_id)?;
                match role {
                    Role::Developer => {
                        bug.assigned_to.developer = None;
                        bug.status = BugStatus::Open;
                    }
                    _ => {
                        bug.assigned_to.tester = None;
                        bug.status = BugStatus::FixedTestingPending;
                    }
                }
                bug.status_last_updated = Some(now);
                bug.status_reason = Some(why.clone());
                detail = format!("reallocation approved, left unassigned: {}", why);
            }
        }
    } else {
        detail = format!("reallocation request {} rejected", request_id);
    }

    // Close out the request and stamp the audit trail
    let bug = find_bug_mut(store, bug_id)?;
    let list = match role {
        Role::Developer => &mut bug.reallocation_requests.developer,
        _ => &mut bug.reallocation_requests.tester,
    };
    if let Some(request) = list.iter_mut().find(|r| r.id == request_id) {
        request.status = decision;
        request.reviewed_by = Some(actor.to_string());
        request.reviewed_on = Some(now);
    }

    let new_developer = bug.assigned_to.developer.clone();
    let new_tester = bug.assigned_to.tester.clone();
    let mut entry = HistoryEntry::new(HistoryKind::ReallocationDecision, actor, actor_role, now);
    entry.request_id = Some(request_id);
    entry.decision = Some(decision);
    if approve {
        entry.developer = new_developer;
        entry.tester = new_tester;
    }
    bug.change_history.push(entry);

    let mut outcome = Outcome::new(bug_id, detail);
    outcome.events = events;
    Ok(outcome)
}
