//! Bug lifecycle state machine: edge table, role gating, the 15-minute
//! revert window, the critical-closure gate, and the workload side effects
//! of hour-bearing transitions.

use chrono::{DateTime, Duration, Utc};

use crate::assignment::AssignmentConfig;
use crate::auth::RoleContext;
use crate::error::{BugError, Result};
use crate::models::{BugStatus, BugStore, HistoryEntry, HistoryKind, Priority, Role};
use crate::notify::NotificationEvent;
use crate::ops::{bug_priority, bug_team, find_bug, find_bug_mut, Outcome};
use crate::workload;

/// Window in which the exact inverse of the last status change may be
/// repeated by its original actor
pub const REVERT_WINDOW_MINUTES: i64 = 15;

/// Canonical forward edges for non-privileged actors. The one backward edge
/// is the tester send-back for refixing.
const EDGES: &[(BugStatus, BugStatus)] = &[
    (BugStatus::Open, BugStatus::Assigned),
    (BugStatus::Assigned, BugStatus::FixInProgress),
    (BugStatus::FixInProgress, BugStatus::FixedTestingPending),
    (BugStatus::FixedTestingPending, BugStatus::TesterAssigned),
    (BugStatus::TesterAssigned, BugStatus::TestingInProgress),
    (BugStatus::TestingInProgress, BugStatus::TestedVerified),
    (BugStatus::TestingInProgress, BugStatus::FixInProgress),
    (BugStatus::TestedVerified, BugStatus::ReadyForClosure),
    (BugStatus::TestedVerified, BugStatus::Closed),
    (BugStatus::ReadyForClosure, BugStatus::Closed),
];

/// Targets a developer may set on a bug they are assigned to
const DEVELOPER_TARGETS: &[BugStatus] =
    &[BugStatus::FixInProgress, BugStatus::FixedTestingPending];

/// Targets a tester may set on a bug they are assigned to
const TESTER_TARGETS: &[BugStatus] = &[
    BugStatus::TestingInProgress,
    BugStatus::TestedVerified,
    BugStatus::ReadyForClosure,
    BugStatus::Closed,
    BugStatus::FixInProgress,
];

/// Statuses whose entry requires an assigned developer
const NEEDS_DEVELOPER: &[BugStatus] = &[
    BugStatus::Assigned,
    BugStatus::FixInProgress,
    BugStatus::FixedTestingPending,
];

/// Statuses whose entry requires an assigned tester
const NEEDS_TESTER: &[BugStatus] = &[
    BugStatus::TesterAssigned,
    BugStatus::TestingInProgress,
    BugStatus::TestedVerified,
];

/// Applies a status transition.
///
/// `hours` carries the developer's resolution hours when entering
/// Fixed (Testing Pending) and the tester's validation hours when entering
/// Tested & Verified; it is rejected as malformed anywhere else it would be
/// consumed with a non-positive value.
pub fn update_status(
    store: &mut BugStore,
    config: &AssignmentConfig,
    actor: &str,
    bug_id: &str,
    requested: BugStatus,
    hours: Option<f64>,
    reason: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Outcome> {
    let bug = find_bug(store, bug_id)?;
    let application = bug.application.clone();
    let team = bug_team(bug)?;
    let current = bug.status;
    let developer = bug.assigned_to.developer.clone();
    let tester = bug.assigned_to.tester.clone();
    let dev_logged = bug.developer_resolution_hours;
    let tester_logged = bug.tester_validation_hours;
    let last_change = bug.last_status_change().cloned();

    if current == BugStatus::Duplicate {
        return Err(BugError::StateConflict(format!(
            "bug {} is marked duplicate; undo the duplicate mark first",
            bug_id
        )));
    }
    if requested == BugStatus::Duplicate {
        return Err(BugError::StateConflict(
            "duplicates are set through the mark-duplicate operation".into(),
        ));
    }
    if requested == current {
        return Err(BugError::StateConflict(format!(
            "bug {} is already {}",
            bug_id, current
        )));
    }

    let ctx = RoleContext::resolve(store, actor, &application, team)?;
    let role = ctx.primary_role();

    // Revert exception: the exact inverse of the immediately preceding
    // status change, by the same actor, inside the window. This is the only
    // backward move available to non-privileged actors and the only way out
    // of Closed other than the reopen workflow.
    if let Some(last) = &last_change {
        let exact_inverse = last.new_status == Some(current)
            && last.previous_status == Some(requested)
            && last.changed_by == actor;
        if exact_inverse {
            if now - last.changed_on >= Duration::minutes(REVERT_WINDOW_MINUTES) {
                return Err(BugError::StateConflict(format!(
                    "revert window for {} has expired ({} minutes)",
                    bug_id, REVERT_WINDOW_MINUTES
                )));
            }
            return apply_revert(
                store, config, actor, role, bug_id, &application, team, current, requested,
                &developer, &tester, dev_logged, tester_logged, reason, now,
            );
        }
    }

    if current == BugStatus::Closed {
        return Err(BugError::StateConflict(format!(
            "bug {} is closed; only the reopen workflow may act on it",
            bug_id
        )));
    }
    if requested == BugStatus::Open {
        return Err(BugError::StateConflict(
            "Open is only reachable from Closed, through the reopen workflow".into(),
        ));
    }

    let priority = bug_priority(store.get_bug(bug_id).ok_or_else(|| {
        BugError::NotFound(format!("bug {} not found", bug_id))
    })?)?;

    if !ctx.is_privileged() {
        let is_assigned_developer =
            ctx.is_developer && developer.as_deref() == Some(actor);
        let is_assigned_tester = ctx.is_tester && tester.as_deref() == Some(actor);

        let allowed = if is_assigned_developer {
            DEVELOPER_TARGETS.contains(&requested)
        } else if is_assigned_tester {
            TESTER_TARGETS.contains(&requested)
        } else {
            false
        };
        if !allowed {
            return Err(BugError::Authorization(format!(
                "{} may not move {} to {}",
                actor, bug_id, requested
            )));
        }
        if !EDGES.contains(&(current, requested)) {
            return Err(BugError::StateConflict(format!(
                "illegal transition {} -> {} on {}",
                current, requested, bug_id
            )));
        }
    }

    // Assignment guards apply to privileged actors too
    if NEEDS_DEVELOPER.contains(&requested) && developer.is_none() {
        return Err(BugError::StateConflict(format!(
            "a developer must be assigned before {} becomes {}",
            bug_id, requested
        )));
    }
    if NEEDS_TESTER.contains(&requested) && tester.is_none() {
        return Err(BugError::StateConflict(format!(
            "a tester must be assigned before {} becomes {}",
            bug_id, requested
        )));
    }

    let mut effective = requested;
    let mut events = Vec::new();

    // Critical-bug closure gate: a tester's closure pauses at Ready For
    // Closure and is routed to the team lead for manual closure
    if priority == Priority::Critical
        && !ctx.is_privileged()
        && matches!(requested, BugStatus::Closed | BugStatus::ReadyForClosure)
    {
        if current == BugStatus::ReadyForClosure {
            return Err(BugError::StateConflict(format!(
                "bug {} is awaiting team lead closure",
                bug_id
            )));
        }
        effective = BugStatus::ReadyForClosure;
        events.push(NotificationEvent::ClosureApprovalRequired {
            bug_id: bug_id.to_string(),
            team_lead: store.team_lead(&application, team).map(|u| u.email.clone()),
        });
    }

    // Hour-bearing side effects
    let mut record_dev_hours = None;
    let mut record_tester_hours = None;
    let mut clear_dev_hours = false;

    match effective {
        BugStatus::FixedTestingPending => {
            let logged = positive_hours(hours, "developer resolution hours")?;
            let dev = developer.clone().ok_or_else(|| {
                BugError::StateConflict(format!("bug {} has no developer assigned", bug_id))
            })?;
            workload::adjust(store, &dev, &application, team, Role::Developer, -logged)?;
            record_dev_hours = Some(logged);
        }
        BugStatus::TestedVerified => {
            let logged = positive_hours(hours, "tester validation hours")?;
            let t = tester.clone().ok_or_else(|| {
                BugError::StateConflict(format!("bug {} has no tester assigned", bug_id))
            })?;
            workload::adjust(store, &t, &application, team, Role::Tester, -logged)?;
            record_tester_hours = Some(logged);
        }
        BugStatus::FixInProgress if current == BugStatus::TestingInProgress => {
            // Send-back restarts the fix cycle: the developer's estimate is
            // committed again and the logged resolution hours are discarded
            if let Some(dev) = &developer {
                let estimate = config.estimate(Role::Developer, priority);
                workload::adjust(store, dev, &application, team, Role::Developer, estimate)?;
            }
            clear_dev_hours = true;
        }
        BugStatus::Closed => {
            // Closing an unworked bug releases the committed estimate
            if current == BugStatus::Assigned {
                if let Some(dev) = &developer {
                    let estimate = config.estimate(Role::Developer, priority);
                    workload::adjust(store, dev, &application, team, Role::Developer, -estimate)?;
                }
            } else if current == BugStatus::TesterAssigned {
                if let Some(t) = &tester {
                    let estimate = config.estimate(Role::Tester, priority);
                    workload::adjust(store, t, &application, team, Role::Tester, -estimate)?;
                }
            }
        }
        _ => {}
    }

    // A tester already waiting moves the bug straight past Fixed (Testing
    // Pending) into their queue
    if effective == BugStatus::FixedTestingPending && tester.is_some() {
        effective = BugStatus::TesterAssigned;
    }

    let bug = find_bug_mut(store, bug_id)?;
    if let Some(h) = record_dev_hours {
        bug.developer_resolution_hours = Some(h);
    }
    if let Some(h) = record_tester_hours {
        bug.tester_validation_hours = Some(h);
    }
    if clear_dev_hours {
        bug.developer_resolution_hours = None;
    }
    bug.status = effective;
    bug.status_last_updated = Some(now);
    bug.status_reason = reason.map(str::to_string);

    let mut entry = HistoryEntry::new(HistoryKind::StatusChange, actor, role, now);
    entry.previous_status = Some(current);
    entry.new_status = Some(effective);
    entry.reason = reason.map(str::to_string);
    bug.change_history.push(entry);

    events.insert(
        0,
        NotificationEvent::StatusChanged {
            bug_id: bug_id.to_string(),
            previous_status: current,
            new_status: effective,
            changed_by: actor.to_string(),
        },
    );

    let mut outcome = Outcome::new(bug_id, format!("{} -> {}", current, effective));
    outcome.events = events;
    Ok(outcome)
}

fn positive_hours(hours: Option<f64>, what: &str) -> Result<f64> {
    match hours {
        Some(h) if h > 0.0 => Ok(h),
        Some(h) => Err(BugError::Validation(format!(
            "{} must be positive, got {}",
            what, h
        ))),
        None => Err(BugError::Validation(format!("{} are required", what))),
    }
}

/// Undoes the side effects of the transition being reverted, then applies
/// the inverse transition.
#[allow(clippy::too_many_arguments)]
fn apply_revert(
    store: &mut BugStore,
    config: &AssignmentConfig,
    actor: &str,
    role: Role,
    bug_id: &str,
    application: &str,
    team: crate::models::Team,
    current: BugStatus,
    requested: BugStatus,
    developer: &Option<String>,
    tester: &Option<String>,
    dev_logged: Option<f64>,
    tester_logged: Option<f64>,
    reason: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Outcome> {
    let priority = find_bug(store, bug_id)?.priority;

    let mut clear_dev_hours = false;
    let mut clear_tester_hours = false;

    match (current, requested) {
        // Undo a completed fix: the released hours go back on the ledger
        (BugStatus::FixedTestingPending, BugStatus::FixInProgress)
        | (BugStatus::TesterAssigned, BugStatus::FixInProgress) => {
            if let (Some(dev), Some(h)) = (developer, dev_logged) {
                workload::adjust(store, dev, application, team, Role::Developer, h)?;
            }
            clear_dev_hours = true;
        }
        // Undo a completed validation
        (BugStatus::TestedVerified, BugStatus::TestingInProgress) => {
            if let (Some(t), Some(h)) = (tester, tester_logged) {
                workload::adjust(store, t, application, team, Role::Tester, h)?;
            }
            clear_tester_hours = true;
        }
        // Undo a send-back: the re-committed estimate is released again
        (BugStatus::FixInProgress, BugStatus::TestingInProgress) => {
            if let (Some(dev), Some(p)) = (developer, priority) {
                let estimate = config.estimate(Role::Developer, p);
                workload::adjust(store, dev, application, team, Role::Developer, -estimate)?;
            }
        }
        // Undo an early close: the released estimate is committed again
        (BugStatus::Closed, BugStatus::Assigned) => {
            if let (Some(dev), Some(p)) = (developer, priority) {
                let estimate = config.estimate(Role::Developer, p);
                workload::adjust(store, dev, application, team, Role::Developer, estimate)?;
            }
        }
        (BugStatus::Closed, BugStatus::TesterAssigned) => {
            if let (Some(t), Some(p)) = (tester, priority) {
                let estimate = config.estimate(Role::Tester, p);
                workload::adjust(store, t, application, team, Role::Tester, estimate)?;
            }
        }
        _ => {}
    }

    let bug = find_bug_mut(store, bug_id)?;
    if clear_dev_hours {
        bug.developer_resolution_hours = None;
    }
    if clear_tester_hours {
        bug.tester_validation_hours = None;
    }
    bug.status = requested;
    bug.status_last_updated = Some(now);
    bug.status_reason = reason.map(str::to_string);

    let mut entry = HistoryEntry::new(HistoryKind::StatusChange, actor, role, now);
    entry.previous_status = Some(current);
    entry.new_status = Some(requested);
    entry.reason = Some(reason.unwrap_or("reverted within window").to_string());
    bug.change_history.push(entry);

    Ok(
        Outcome::new(bug_id, format!("reverted {} -> {}", current, requested)).with_event(
            NotificationEvent::StatusChanged {
                bug_id: bug_id.to_string(),
                previous_status: current,
                new_status: requested,
                changed_by: actor.to_string(),
            },
        ),
    )
}

/// Corrects recorded hours after the fact. Only the assigned developer or
/// tester may correct their own entry; the ledger moves by (old - new).
pub fn update_hours(
    store: &mut BugStore,
    actor: &str,
    bug_id: &str,
    role: Role,
    new_hours: f64,
) -> Result<Outcome> {
    if new_hours <= 0.0 {
        return Err(BugError::Validation(format!(
            "corrected hours must be positive, got {}",
            new_hours
        )));
    }

    let bug = find_bug(store, bug_id)?;
    let application = bug.application.clone();
    let team = bug_team(bug)?;

    let (assignee, old) = match role {
        Role::Developer => (bug.assigned_to.developer.clone(), bug.developer_resolution_hours),
        Role::Tester => (bug.assigned_to.tester.clone(), bug.tester_validation_hours),
        other => {
            return Err(BugError::Validation(format!(
                "hours are recorded for developers and testers, not {}",
                other
            )))
        }
    };

    if assignee.as_deref() != Some(actor) {
        return Err(BugError::Authorization(format!(
            "only the assigned {} may correct hours on {}",
            role, bug_id
        )));
    }
    let old = old.ok_or_else(|| {
        BugError::StateConflict(format!("bug {} has no recorded {} hours yet", bug_id, role))
    })?;

    workload::adjust(store, actor, &application, team, role, old - new_hours)?;

    let bug = find_bug_mut(store, bug_id)?;
    match role {
        Role::Developer => bug.developer_resolution_hours = Some(new_hours),
        _ => bug.tester_validation_hours = Some(new_hours),
    }

    Ok(Outcome::new(
        bug_id,
        format!("{} hours corrected {:.1} -> {:.1}", role, old, new_hours),
    ))
}
