//! Developer/tester assignment: manual, engine-backed, and the retry
//! surface over bugs left unassigned by a failed attempt.

use chrono::{DateTime, Utc};

use crate::assignment::{self, AssignmentConfig};
use crate::auth::RoleContext;
use crate::error::{BugError, Result};
use crate::models::{BugStatus, BugStore, HistoryEntry, HistoryKind, Role};
use crate::notify::NotificationEvent;
use crate::ops::{bug_priority, bug_team, ensure_not_terminal, find_bug, find_bug_mut, Outcome};
use crate::workload::{self, WORKLOAD_CAP};

/// Statuses in which a developer assignment may no longer change hands
const DEVELOPER_LOCKED: &[BugStatus] = &[
    BugStatus::FixInProgress,
    BugStatus::FixedTestingPending,
    BugStatus::TesterAssigned,
    BugStatus::TestingInProgress,
    BugStatus::TestedVerified,
];

/// Statuses in which a tester assignment may no longer change hands
const TESTER_LOCKED: &[BugStatus] = &[BugStatus::TestingInProgress, BugStatus::TestedVerified];

/// Manually assigns a developer. Admin/teamlead only; rejected once the fix
/// is in flight or when the assignee would pass the 40-hour cap. Replacing
/// an existing assignee releases their committed estimate first.
pub fn assign_developer(
    store: &mut BugStore,
    config: &AssignmentConfig,
    actor: &str,
    bug_id: &str,
    developer: &str,
    now: DateTime<Utc>,
) -> Result<Outcome> {
    let bug = find_bug(store, bug_id)?;
    ensure_not_terminal(bug)?;
    let application = bug.application.clone();
    let team = bug_team(bug)?;
    let priority = bug_priority(bug)?;
    let status = bug.status;
    let previous = bug.assigned_to.developer.clone();

    if DEVELOPER_LOCKED.contains(&status) {
        return Err(BugError::StateConflict(format!(
            "developer on {} cannot change while it is {}",
            bug_id, status
        )));
    }
    if previous.as_deref() == Some(developer) {
        return Err(BugError::StateConflict(format!(
            "{} is already the developer on {}",
            developer, bug_id
        )));
    }

    let ctx = RoleContext::resolve(store, actor, &application, team)?;
    if !ctx.is_privileged() {
        return Err(BugError::Authorization(
            "only an admin or team lead may assign a developer".into(),
        ));
    }

    let estimate = config.estimate(Role::Developer, priority);
    let current = workload::current_hours(store, developer, &application, team, Role::Developer)?;
    if current + estimate > WORKLOAD_CAP {
        return Err(BugError::CapacityExhausted(format!(
            "{} is at {:.1}h; adding {:.1}h would exceed the {:.0}h cap",
            developer, current, estimate, WORKLOAD_CAP
        )));
    }

    if let Some(prev) = &previous {
        workload::adjust(store, prev, &application, team, Role::Developer, -estimate)?;
    }
    workload::adjust(store, developer, &application, team, Role::Developer, estimate)?;

    let role = ctx.primary_role();
    let bug = find_bug_mut(store, bug_id)?;
    bug.assigned_to.developer = Some(developer.to_string());
    if bug.status == BugStatus::Open {
        bug.status = BugStatus::Assigned;
        bug.status_last_updated = Some(now);
    }
    let mut entry = HistoryEntry::new(HistoryKind::Assignment, actor, role, now);
    entry.developer = Some(developer.to_string());
    bug.change_history.push(entry);

    Ok(
        Outcome::new(bug_id, format!("developer {} assigned ({:.1}h)", developer, estimate))
            .with_event(NotificationEvent::DeveloperAssigned {
                bug_id: bug_id.to_string(),
                developer: developer.to_string(),
                estimated_hours: estimate,
            }),
    )
}

/// Manually assigns a tester. Admin/teamlead only; the bug advances to
/// Tester Assigned once the fix is awaiting testing.
pub fn assign_tester(
    store: &mut BugStore,
    config: &AssignmentConfig,
    actor: &str,
    bug_id: &str,
    tester: &str,
    now: DateTime<Utc>,
) -> Result<Outcome> {
    let bug = find_bug(store, bug_id)?;
    ensure_not_terminal(bug)?;
    let application = bug.application.clone();
    let team = bug_team(bug)?;
    let priority = bug_priority(bug)?;
    let status = bug.status;
    let previous = bug.assigned_to.tester.clone();

    if TESTER_LOCKED.contains(&status) {
        return Err(BugError::StateConflict(format!(
            "tester on {} cannot change while it is {}",
            bug_id, status
        )));
    }
    if previous.as_deref() == Some(tester) {
        return Err(BugError::StateConflict(format!(
            "{} is already the tester on {}",
            tester, bug_id
        )));
    }

    let ctx = RoleContext::resolve(store, actor, &application, team)?;
    if !ctx.is_privileged() {
        return Err(BugError::Authorization(
            "only an admin or team lead may assign a tester".into(),
        ));
    }

    let estimate = config.estimate(Role::Tester, priority);
    let current = workload::current_hours(store, tester, &application, team, Role::Tester)?;
    if current + estimate > WORKLOAD_CAP {
        return Err(BugError::CapacityExhausted(format!(
            "{} is at {:.1}h; adding {:.1}h would exceed the {:.0}h cap",
            tester, current, estimate, WORKLOAD_CAP
        )));
    }

    if let Some(prev) = &previous {
        workload::adjust(store, prev, &application, team, Role::Tester, -estimate)?;
    }
    workload::adjust(store, tester, &application, team, Role::Tester, estimate)?;

    let role = ctx.primary_role();
    let bug = find_bug_mut(store, bug_id)?;
    bug.assigned_to.tester = Some(tester.to_string());
    if bug.status == BugStatus::FixedTestingPending {
        bug.status = BugStatus::TesterAssigned;
        bug.status_last_updated = Some(now);
    }
    let mut entry = HistoryEntry::new(HistoryKind::Assignment, actor, role, now);
    entry.tester = Some(tester.to_string());
    bug.change_history.push(entry);

    Ok(
        Outcome::new(bug_id, format!("tester {} assigned ({:.1}h)", tester, estimate))
            .with_event(NotificationEvent::TesterAssigned {
                bug_id: bug_id.to_string(),
                tester: tester.to_string(),
                estimated_hours: estimate,
            }),
    )
}

/// Removes the developer assignment, releasing the committed estimate when
/// the fix has not completed. Teamleads may only unassign from Assigned;
/// admins from any non-terminal status. The bug returns to Open.
pub fn unassign_developer(
    store: &mut BugStore,
    config: &AssignmentConfig,
    actor: &str,
    bug_id: &str,
    now: DateTime<Utc>,
) -> Result<Outcome> {
    let bug = find_bug(store, bug_id)?;
    ensure_not_terminal(bug)?;
    let application = bug.application.clone();
    let team = bug_team(bug)?;
    let priority = bug_priority(bug)?;
    let status = bug.status;
    let developer = bug.assigned_to.developer.clone().ok_or_else(|| {
        BugError::StateConflict(format!("bug {} has no developer assigned", bug_id))
    })?;

    let ctx = RoleContext::resolve(store, actor, &application, team)?;
    if !ctx.is_privileged() {
        return Err(BugError::Authorization(
            "only an admin or team lead may unassign a developer".into(),
        ));
    }
    if !ctx.is_admin && status != BugStatus::Assigned {
        return Err(BugError::Authorization(format!(
            "a team lead may only unassign a developer while the bug is {}",
            BugStatus::Assigned
        )));
    }

    // The estimate is still committed until the fix completes
    if matches!(status, BugStatus::Assigned | BugStatus::FixInProgress) {
        let estimate = config.estimate(Role::Developer, priority);
        workload::adjust(store, &developer, &application, team, Role::Developer, -estimate)?;
    }

    let role = ctx.primary_role();
    let bug = find_bug_mut(store, bug_id)?;
    bug.assigned_to.developer = None;
    bug.status = BugStatus::Open;
    bug.status_last_updated = Some(now);
    let mut entry = HistoryEntry::new(HistoryKind::Unassign, actor, role, now);
    entry.developer = Some(developer.clone());
    bug.change_history.push(entry);

    Ok(
        Outcome::new(bug_id, format!("developer {} unassigned", developer)).with_event(
            NotificationEvent::Unassigned {
                bug_id: bug_id.to_string(),
                user: developer,
                role: Role::Developer,
            },
        ),
    )
}

/// Removes the tester assignment. Teamleads may only unassign from Tester
/// Assigned; admins from any non-terminal status. The bug returns to
/// Fixed (Testing Pending).
pub fn unassign_tester(
    store: &mut BugStore,
    config: &AssignmentConfig,
    actor: &str,
    bug_id: &str,
    now: DateTime<Utc>,
) -> Result<Outcome> {
    let bug = find_bug(store, bug_id)?;
    ensure_not_terminal(bug)?;
    let application = bug.application.clone();
    let team = bug_team(bug)?;
    let priority = bug_priority(bug)?;
    let status = bug.status;
    let tester = bug.assigned_to.tester.clone().ok_or_else(|| {
        BugError::StateConflict(format!("bug {} has no tester assigned", bug_id))
    })?;

    let ctx = RoleContext::resolve(store, actor, &application, team)?;
    if !ctx.is_privileged() {
        return Err(BugError::Authorization(
            "only an admin or team lead may unassign a tester".into(),
        ));
    }
    if !ctx.is_admin && status != BugStatus::TesterAssigned {
        return Err(BugError::Authorization(format!(
            "a team lead may only unassign a tester while the bug is {}",
            BugStatus::TesterAssigned
        )));
    }

    if matches!(status, BugStatus::TesterAssigned | BugStatus::TestingInProgress) {
        let estimate = config.estimate(Role::Tester, priority);
        workload::adjust(store, &tester, &application, team, Role::Tester, -estimate)?;
    }

    let role = ctx.primary_role();
    let bug = find_bug_mut(store, bug_id)?;
    bug.assigned_to.tester = None;
    bug.status = BugStatus::FixedTestingPending;
    bug.status_last_updated = Some(now);
    let mut entry = HistoryEntry::new(HistoryKind::Unassign, actor, role, now);
    entry.tester = Some(tester.clone());
    bug.change_history.push(entry);

    Ok(
        Outcome::new(bug_id, format!("tester {} unassigned", tester)).with_event(
            NotificationEvent::Unassigned {
                bug_id: bug_id.to_string(),
                user: tester,
                role: Role::Tester,
            },
        ),
    )
}

/// Runs the assignment engine for the developer role and commits its pick.
/// Idempotent: rejects when a developer is already assigned.
pub fn auto_assign_developer(
    store: &mut BugStore,
    config: &AssignmentConfig,
    actor: &str,
    bug_id: &str,
    now: DateTime<Utc>,
) -> Result<Outcome> {
    let bug = find_bug(store, bug_id)?;
    ensure_not_terminal(bug)?;
    let application = bug.application.clone();
    let team = bug_team(bug)?;
    let priority = bug_priority(bug)?;

    if bug.assigned_to.developer.is_some() {
        return Err(BugError::StateConflict(format!(
            "bug {} already has a developer assigned",
            bug_id
        )));
    }

    let ctx = RoleContext::resolve(store, actor, &application, team)?;
    if !ctx.is_privileged() {
        return Err(BugError::Authorization(
            "only an admin or team lead may trigger auto-assignment".into(),
        ));
    }

    let pick = assignment::select(store, config, &application, team, Role::Developer, priority)
        .ok_or_else(|| {
            BugError::CapacityExhausted(format!(
                "no eligible developer for {} ({} priority) on {}/{}",
                bug_id, priority, application, team
            ))
        })?;

    workload::adjust(store, &pick.email, &application, team, Role::Developer, pick.estimated_hours)?;

    let role = ctx.primary_role();
    let bug = find_bug_mut(store, bug_id)?;
    bug.assigned_to.developer = Some(pick.email.clone());
    if bug.status == BugStatus::Open {
        bug.status = BugStatus::Assigned;
        bug.status_last_updated = Some(now);
    }
    let mut entry = HistoryEntry::new(HistoryKind::Assignment, actor, role, now);
    entry.developer = Some(pick.email.clone());
    entry.reason = pick.fallback_notice.clone();
    bug.change_history.push(entry);

    let mut detail = format!(
        "developer {} auto-assigned ({:.1}h, total {:.1}h)",
        pick.email, pick.estimated_hours, pick.total_after_assignment
    );
    if let Some(notice) = &pick.fallback_notice {
        detail.push_str(&format!("; {}", notice));
    }

    Ok(Outcome::new(bug_id, detail).with_event(NotificationEvent::DeveloperAssigned {
        bug_id: bug_id.to_string(),
        developer: pick.email,
        estimated_hours: pick.estimated_hours,
    }))
}

/// Runs the assignment engine for the tester role. Requires the bug to be
/// Fixed (Testing Pending) and advances it to Tester Assigned.
pub fn auto_assign_tester(
    store: &mut BugStore,
    config: &AssignmentConfig,
    actor: &str,
    bug_id: &str,
    now: DateTime<Utc>,
) -> Result<Outcome> {
    let bug = find_bug(store, bug_id)?;
    ensure_not_terminal(bug)?;
    let application = bug.application.clone();
    let team = bug_team(bug)?;
    let priority = bug_priority(bug)?;

    if bug.assigned_to.tester.is_some() {
        return Err(BugError::StateConflict(format!(
            "bug {} already has a tester assigned",
            bug_id
        )));
    }
    if bug.status != BugStatus::FixedTestingPending {
        return Err(BugError::StateConflict(format!(
            "bug {} must be {} before a tester is auto-assigned, currently {}",
            bug_id,
            BugStatus::FixedTestingPending,
            bug.status
        )));
    }

    let ctx = RoleContext::resolve(store, actor, &application, team)?;
    if !ctx.is_privileged() {
        return Err(BugError::Authorization(
            "only an admin or team lead may trigger auto-assignment".into(),
        ));
    }

    let pick = assignment::select(store, config, &application, team, Role::Tester, priority)
        .ok_or_else(|| {
            BugError::CapacityExhausted(format!(
                "no eligible tester for {} ({} priority) on {}/{}",
                bug_id, priority, application, team
            ))
        })?;

    workload::adjust(store, &pick.email, &application, team, Role::Tester, pick.estimated_hours)?;

    let role = ctx.primary_role();
    let bug = find_bug_mut(store, bug_id)?;
    bug.assigned_to.tester = Some(pick.email.clone());
    bug.status = BugStatus::TesterAssigned;
    bug.status_last_updated = Some(now);
    let mut entry = HistoryEntry::new(HistoryKind::Assignment, actor, role, now);
    entry.tester = Some(pick.email.clone());
    entry.reason = pick.fallback_notice.clone();
    bug.change_history.push(entry);

    Ok(Outcome::new(
        bug_id,
        format!(
            "tester {} auto-assigned ({:.1}h, total {:.1}h)",
            pick.email, pick.estimated_hours, pick.total_after_assignment
        ),
    )
    .with_event(NotificationEvent::TesterAssigned {
        bug_id: bug_id.to_string(),
        tester: pick.email,
        estimated_hours: pick.estimated_hours,
    }))
}

/// One line of the retry report: the bug and the developer it got, if any
#[derive(Debug)]
pub struct RetryResult {
    pub bug_id: String,
    pub assigned: Option<String>,
}

/// Re-runs developer auto-assignment over every team-routed, prioritized
/// bug still waiting in Open without a developer. Bugs the engine cannot
/// place are reported, not failed.
pub fn retry_unassigned(
    store: &mut BugStore,
    config: &AssignmentConfig,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<(Vec<RetryResult>, Vec<NotificationEvent>)> {
    let pending: Vec<String> = store
        .bugs
        .iter()
        .filter(|b| {
            b.status == BugStatus::Open
                && b.assigned_team.is_some()
                && b.priority.is_some()
                && b.assigned_to.developer.is_none()
        })
        .map(|b| b.bug_id.clone())
        .collect();

    let mut results = Vec::new();
    let mut events = Vec::new();
    for bug_id in pending {
        match auto_assign_developer(store, config, actor, &bug_id, now) {
            Ok(mut outcome) => {
                let assigned = outcome.events.iter().find_map(|e| match e {
                    NotificationEvent::DeveloperAssigned { developer, .. } => {
                        Some(developer.clone())
                    }
                    _ => None,
                });
                events.append(&mut outcome.events);
                results.push(RetryResult { bug_id, assigned });
            }
            Err(BugError::CapacityExhausted(_)) => {
                results.push(RetryResult {
                    bug_id,
                    assigned: None,
                });
            }
            Err(e) => return Err(e),
        }
    }
    Ok((results, events))
}

/// The tester-side companion to [`retry_unassigned`]: re-runs tester
/// auto-assignment over every bug sitting in Fixed (Testing Pending)
/// without a tester.
pub fn retry_unassigned_testers(
    store: &mut BugStore,
    config: &AssignmentConfig,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<(Vec<RetryResult>, Vec<NotificationEvent>)> {
    let pending: Vec<String> = store
        .bugs
        .iter()
        .filter(|b| {
            b.status == BugStatus::FixedTestingPending
                && b.assigned_team.is_some()
                && b.priority.is_some()
                && b.assigned_to.tester.is_none()
        })
        .map(|b| b.bug_id.clone())
        .collect();

    let mut results = Vec::new();
    let mut events = Vec::new();
    for bug_id in pending {
        match auto_assign_tester(store, config, actor, &bug_id, now) {
            Ok(mut outcome) => {
                let assigned = outcome.events.iter().find_map(|e| match e {
                    NotificationEvent::TesterAssigned { tester, .. } => Some(tester.clone()),
                    _ => None,
                });
                events.append(&mut outcome.events);
                results.push(RetryResult { bug_id, assigned });
            }
            Err(BugError::CapacityExhausted(_)) => {
                results.push(RetryResult {
                    bug_id,
                    assigned: None,
                });
            }
            Err(e) => return Err(e),
        }
    }
    Ok((results, events))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Seniority;
    use crate::ops::testutil::{dev_hours, now, seeded_store, tester_hours, user};

    fn cfg() -> AssignmentConfig {
        AssignmentConfig::default()
    }

    #[test]
    fn test_manual_assign_commits_estimate_and_advances() {
        let mut store = seeded_store();
        assign_developer(&mut store, &cfg(), "lead@x.com", "BUG-1", "dev@x.com", now()).unwrap();

        let bug = store.get_bug("BUG-1").unwrap();
        assert_eq!(bug.status, BugStatus::Assigned);
        assert_eq!(bug.assigned_to.developer.as_deref(), Some("dev@x.com"));
        // Critical developer estimate is 6h on top of the seeded 10h
        assert_eq!(dev_hours(&store, "dev@x.com"), 16.0);
    }

    #[test]
    fn test_manual_assign_rejects_over_cap() {
        let mut store = seeded_store();
        store
            .get_user_mut("dev@x.com")
            .unwrap()
            .roles[0]
            .workload_hours = 38.0;
        let err =
            assign_developer(&mut store, &cfg(), "lead@x.com", "BUG-1", "dev@x.com", now()).unwrap_err();
        assert!(matches!(err, BugError::CapacityExhausted(_)));
        assert_eq!(dev_hours(&store, "dev@x.com"), 38.0);
    }

    #[test]
    fn test_manual_assign_requires_privilege() {
        let mut store = seeded_store();
        let err =
            assign_developer(&mut store, &cfg(), "dev@x.com", "BUG-1", "dev@x.com", now()).unwrap_err();
        assert!(matches!(err, BugError::Authorization(_)));
    }

    #[test]
    fn test_reassignment_releases_previous_estimate() {
        let mut store = seeded_store();
        store.add_user(user("dev2@x.com", Role::Developer, Some(Seniority::Mid), 0.0));
        assign_developer(&mut store, &cfg(), "lead@x.com", "BUG-1", "dev@x.com", now()).unwrap();
        assign_developer(&mut store, &cfg(), "lead@x.com", "BUG-1", "dev2@x.com", now()).unwrap();

        assert_eq!(dev_hours(&store, "dev@x.com"), 10.0);
        assert_eq!(dev_hours(&store, "dev2@x.com"), 6.0);
    }

    #[test]
    fn test_assign_blocked_in_mid_flight_status() {
        let mut store = seeded_store();
        store.get_bug_mut("BUG-1").unwrap().status = BugStatus::FixInProgress;
        let err =
            assign_developer(&mut store, &cfg(), "lead@x.com", "BUG-1", "dev@x.com", now()).unwrap_err();
        assert!(matches!(err, BugError::StateConflict(_)));
    }

    #[test]
    fn test_unassign_releases_and_reopens() {
        let mut store = seeded_store();
        assign_developer(&mut store, &cfg(), "lead@x.com", "BUG-1", "dev@x.com", now()).unwrap();
        unassign_developer(&mut store, &cfg(), "lead@x.com", "BUG-1", now()).unwrap();

        let bug = store.get_bug("BUG-1").unwrap();
        assert_eq!(bug.status, BugStatus::Open);
        assert!(bug.assigned_to.developer.is_none());
        assert_eq!(dev_hours(&store, "dev@x.com"), 10.0);
    }

    #[test]
    fn test_lead_cannot_unassign_in_flight_but_admin_can() {
        let mut store = seeded_store();
        assign_developer(&mut store, &cfg(), "lead@x.com", "BUG-1", "dev@x.com", now()).unwrap();
        store.get_bug_mut("BUG-1").unwrap().status = BugStatus::FixInProgress;

        let err = unassign_developer(&mut store, &cfg(), "lead@x.com", "BUG-1", now()).unwrap_err();
        assert!(matches!(err, BugError::Authorization(_)));

        unassign_developer(&mut store, &cfg(), "admin@x.com", "BUG-1", now()).unwrap();
        assert_eq!(dev_hours(&store, "dev@x.com"), 10.0);
    }

    #[test]
    fn test_auto_assign_is_idempotent() {
        let mut store = seeded_store();
        let config = AssignmentConfig::default();
        auto_assign_developer(&mut store, &config, "lead@x.com", "BUG-1", now()).unwrap();
        let err =
            auto_assign_developer(&mut store, &config, "lead@x.com", "BUG-1", now()).unwrap_err();
        assert!(matches!(err, BugError::StateConflict(_)));
    }

    #[test]
    fn test_auto_assign_tester_requires_fixed_status() {
        let mut store = seeded_store();
        let config = AssignmentConfig::default();
        let err =
            auto_assign_tester(&mut store, &config, "lead@x.com", "BUG-1", now()).unwrap_err();
        assert!(matches!(err, BugError::StateConflict(_)));

        store.get_bug_mut("BUG-1").unwrap().status = BugStatus::FixedTestingPending;
        auto_assign_tester(&mut store, &config, "lead@x.com", "BUG-1", now()).unwrap();
        let bug = store.get_bug("BUG-1").unwrap();
        assert_eq!(bug.status, BugStatus::TesterAssigned);
        assert_eq!(bug.assigned_to.tester.as_deref(), Some("tester@x.com"));
        // Critical tester estimate is 4h on top of the seeded 8h
        assert_eq!(tester_hours(&store, "tester@x.com"), 12.0);
    }

    #[test]
    fn test_retry_skips_assigned_and_reports_failures() {
        let mut store = seeded_store();
        let config = AssignmentConfig::default();

        // Make the only developer ineligible, then retry
        store
            .get_user_mut("dev@x.com")
            .unwrap()
            .roles[0]
            .workload_hours = 46.0;
        let (results, events) = retry_unassigned(&mut store, &config, "admin@x.com", now()).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].assigned.is_none());
        assert!(events.is_empty());

        // Free the developer up and retry again
        store
            .get_user_mut("dev@x.com")
            .unwrap()
            .roles[0]
            .workload_hours = 5.0;
        let (results, events) = retry_unassigned(&mut store, &config, "admin@x.com", now()).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].assigned.as_deref(), Some("dev@x.com"));
        assert_eq!(events.len(), 1);

        // Nothing pending once assigned
        let (results, _) = retry_unassigned(&mut store, &config, "admin@x.com", now()).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_retry_picks_up_bugs_awaiting_a_tester() {
        let mut store = seeded_store();
        let config = cfg();
        store.get_bug_mut("BUG-1").unwrap().status = BugStatus::FixedTestingPending;

        // Make the only tester ineligible, then retry
        store
            .get_user_mut("tester@x.com")
            .unwrap()
            .roles[0]
            .workload_hours = 46.0;
        let (results, events) =
            retry_unassigned_testers(&mut store, &config, "admin@x.com", now()).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].assigned.is_none());
        assert!(events.is_empty());
        assert_eq!(
            store.get_bug("BUG-1").unwrap().status,
            BugStatus::FixedTestingPending
        );

        // Free the tester up and retry again
        store
            .get_user_mut("tester@x.com")
            .unwrap()
            .roles[0]
            .workload_hours = 5.0;
        let (results, _) =
            retry_unassigned_testers(&mut store, &config, "admin@x.com", now()).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].assigned.as_deref(), Some("tester@x.com"));
        let bug = store.get_bug("BUG-1").unwrap();
        assert_eq!(bug.status, BugStatus::TesterAssigned);
        assert_eq!(tester_hours(&store, "tester@x.com"), 9.0);

        // Nothing pending once assigned
        let (results, _) =
            retry_unassigned_testers(&mut store, &config, "admin@x.com", now()).unwrap();
        assert!(results.is_empty());
    }
}
