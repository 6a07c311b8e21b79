//! Duplicate mark and undo.
//!
//! Duplicate is reachable from any non-Closed state; undo restores the
//! status recorded in the last Duplicate Mark entry. Marking a bug that is
//! still unworked releases the committed estimate, keyed on the status the
//! bug held before the mark; undoing commits it again.

use chrono::{DateTime, Utc};

use crate::assignment::AssignmentConfig;
use crate::auth::RoleContext;
use crate::error::{BugError, Result};
use crate::models::{BugStatus, BugStore, HistoryEntry, HistoryKind, Role};
use crate::notify::NotificationEvent;
use crate::ops::{bug_team, find_bug, find_bug_mut, Outcome};
use crate::workload;

fn may_touch_duplicate(ctx: &RoleContext, developer: &Option<String>, tester: &Option<String>) -> bool {
    ctx.is_privileged()
        || developer.as_deref() == Some(ctx.email.as_str())
        || tester.as_deref() == Some(ctx.email.as_str())
}

/// Marks a bug as a duplicate of another
pub fn mark_duplicate(
    store: &mut BugStore,
    config: &AssignmentConfig,
    actor: &str,
    bug_id: &str,
    original_bug_id: &str,
    explanation: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Outcome> {
    if bug_id == original_bug_id {
        return Err(BugError::Validation(
            "a bug cannot be a duplicate of itself".into(),
        ));
    }
    if store.get_bug(original_bug_id).is_none() {
        return Err(BugError::NotFound(format!(
            "original bug {} not found",
            original_bug_id
        )));
    }

    let bug = find_bug(store, bug_id)?;
    let application = bug.application.clone();
    let team = bug_team(bug)?;
    let previous = bug.status;
    let priority = bug.priority;
    let developer = bug.assigned_to.developer.clone();
    let tester = bug.assigned_to.tester.clone();

    match previous {
        BugStatus::Closed => {
            return Err(BugError::StateConflict(format!(
                "closed bug {} cannot be marked duplicate",
                bug_id
            )))
        }
        BugStatus::Duplicate => {
            return Err(BugError::StateConflict(format!(
                "bug {} is already marked duplicate",
                bug_id
            )))
        }
        _ => {}
    }

    let ctx = RoleContext::resolve(store, actor, &application, team)?;
    if !may_touch_duplicate(&ctx, &developer, &tester) {
        return Err(BugError::Authorization(format!(
            "{} may not mark {} as duplicate",
            actor, bug_id
        )));
    }

    // Release keyed on the status held before the mark: only unworked
    // commitments come back off the ledger
    if let Some(p) = priority {
        if previous == BugStatus::Assigned {
            if let Some(dev) = &developer {
                let estimate = config.estimate(Role::Developer, p);
                workload::adjust(store, dev, &application, team, Role::Developer, -estimate)?;
            }
        } else if previous == BugStatus::TesterAssigned {
            if let Some(t) = &tester {
                let estimate = config.estimate(Role::Tester, p);
                workload::adjust(store, t, &application, team, Role::Tester, -estimate)?;
            }
        }
    }

    let role = ctx.primary_role();
    let bug = find_bug_mut(store, bug_id)?;
    bug.is_duplicate = true;
    bug.original_bug_id = Some(original_bug_id.to_string());
    bug.duplicate_explanation = explanation.map(str::to_string);
    bug.status = BugStatus::Duplicate;
    bug.status_last_updated = Some(now);

    let mut entry = HistoryEntry::new(HistoryKind::DuplicateMark, actor, role, now);
    entry.previous_status = Some(previous);
    entry.new_status = Some(BugStatus::Duplicate);
    entry.reason = explanation.map(str::to_string);
    bug.change_history.push(entry);

    Ok(
        Outcome::new(bug_id, format!("marked duplicate of {}", original_bug_id)).with_event(
            NotificationEvent::DuplicateMarked {
                bug_id: bug_id.to_string(),
                original_bug_id: original_bug_id.to_string(),
            },
        ),
    )
}

/// Undoes a duplicate mark, restoring the status recorded in the last
/// Duplicate Mark entry (Open if none is found)
pub fn undo_duplicate(
    store: &mut BugStore,
    config: &AssignmentConfig,
    actor: &str,
    bug_id: &str,
    now: DateTime<Utc>,
) -> Result<Outcome> {
    let bug = find_bug(store, bug_id)?;
    let application = bug.application.clone();
    let team = bug_team(bug)?;
    let priority = bug.priority;
    let developer = bug.assigned_to.developer.clone();
    let tester = bug.assigned_to.tester.clone();

    if bug.status != BugStatus::Duplicate {
        return Err(BugError::StateConflict(format!(
            "bug {} is not marked duplicate",
            bug_id
        )));
    }

    let restored = bug
        .last_duplicate_mark()
        .and_then(|e| e.previous_status)
        .unwrap_or(BugStatus::Open);

    let ctx = RoleContext::resolve(store, actor, &application, team)?;
    if !may_touch_duplicate(&ctx, &developer, &tester) {
        return Err(BugError::Authorization(format!(
            "{} may not undo the duplicate mark on {}",
            actor, bug_id
        )));
    }

    // Restoring an unworked assignment commits its estimate again
    if let Some(p) = priority {
        if restored == BugStatus::Assigned {
            if let Some(dev) = &developer {
                let estimate = config.estimate(Role::Developer, p);
                workload::adjust(store, dev, &application, team, Role::Developer, estimate)?;
            }
        } else if restored == BugStatus::TesterAssigned {
            if let Some(t) = &tester {
                let estimate = config.estimate(Role::Tester, p);
                workload::adjust(store, t, &application, team, Role::Tester, estimate)?;
            }
        }
    }

    let role = ctx.primary_role();
    let bug = find_bug_mut(store, bug_id)?;
    bug.is_duplicate = false;
    bug.original_bug_id = None;
    bug.duplicate_explanation = None;
    bug.status = restored;
    bug.status_last_updated = Some(now);

    let mut entry = HistoryEntry::new(HistoryKind::UndoDuplicate, actor, role, now);
    entry.previous_status = Some(BugStatus::Duplicate);
    entry.new_status = Some(restored);
    bug.change_history.push(entry);

    Ok(
        Outcome::new(bug_id, format!("duplicate mark undone, restored to {}", restored))
            .with_event(NotificationEvent::DuplicateUnmarked {
                bug_id: bug_id.to_string(),
                restored_status: restored,
            }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Bug, Priority, Reporter};
    use crate::ops::assign;
    use crate::ops::testutil::{dev_hours, now, seeded_store, APP, TEAM};

    fn cfg() -> AssignmentConfig {
        AssignmentConfig::default()
    }

    /// Adds BUG-2 so BUG-1 has an original to point at
    fn with_original(store: &mut BugStore) {
        let mut bug = Bug::new(
            APP,
            "Login button unresponsive",
            "Clicking login does nothing on the second attempt",
            Reporter {
                name: "Rita".into(),
                email: "rita@x.com".into(),
            },
            BugStatus::Open,
            now(),
        );
        bug.assigned_team = Some(TEAM);
        bug.priority = Some(Priority::Critical);
        store.add_bug(bug);
    }

    #[test]
    fn test_mark_in_assigned_releases_estimate() {
        let mut store = seeded_store();
        with_original(&mut store);
        assign::assign_developer(&mut store, &cfg(), "lead@x.com", "BUG-1", "dev@x.com", now())
            .unwrap();
        assert_eq!(dev_hours(&store, "dev@x.com"), 16.0);

        mark_duplicate(&mut store, &cfg(), "lead@x.com", "BUG-1", "BUG-2", None, now()).unwrap();
        let bug = store.get_bug("BUG-1").unwrap();
        assert_eq!(bug.status, BugStatus::Duplicate);
        assert!(bug.is_duplicate);
        assert_eq!(bug.original_bug_id.as_deref(), Some("BUG-2"));
        assert_eq!(dev_hours(&store, "dev@x.com"), 10.0);
    }

    #[test]
    fn test_mark_in_fix_in_progress_releases_nothing() {
        let mut store = seeded_store();
        with_original(&mut store);
        assign::assign_developer(&mut store, &cfg(), "lead@x.com", "BUG-1", "dev@x.com", now())
            .unwrap();
        store.get_bug_mut("BUG-1").unwrap().status = BugStatus::FixInProgress;

        mark_duplicate(&mut store, &cfg(), "dev@x.com", "BUG-1", "BUG-2", None, now()).unwrap();
        assert_eq!(dev_hours(&store, "dev@x.com"), 16.0);
    }

    #[test]
    fn test_undo_restores_status_and_recommits() {
        let mut store = seeded_store();
        with_original(&mut store);
        assign::assign_developer(&mut store, &cfg(), "lead@x.com", "BUG-1", "dev@x.com", now())
            .unwrap();
        mark_duplicate(&mut store, &cfg(), "lead@x.com", "BUG-1", "BUG-2", None, now()).unwrap();
        assert_eq!(dev_hours(&store, "dev@x.com"), 10.0);

        undo_duplicate(&mut store, &cfg(), "lead@x.com", "BUG-1", now()).unwrap();
        let bug = store.get_bug("BUG-1").unwrap();
        assert_eq!(bug.status, BugStatus::Assigned);
        assert!(!bug.is_duplicate);
        assert!(bug.original_bug_id.is_none());
        assert_eq!(dev_hours(&store, "dev@x.com"), 16.0);
    }

    #[test]
    fn test_undo_without_mark_entry_restores_open() {
        let mut store = seeded_store();
        // Duplicate state with no history, as an imported record might be
        store.get_bug_mut("BUG-1").unwrap().status = BugStatus::Duplicate;
        store.get_bug_mut("BUG-1").unwrap().is_duplicate = true;

        undo_duplicate(&mut store, &cfg(), "admin@x.com", "BUG-1", now()).unwrap();
        assert_eq!(store.get_bug("BUG-1").unwrap().status, BugStatus::Open);
    }

    #[test]
    fn test_closed_bug_cannot_be_marked() {
        let mut store = seeded_store();
        with_original(&mut store);
        store.get_bug_mut("BUG-1").unwrap().status = BugStatus::Closed;
        let err = mark_duplicate(&mut store, &cfg(), "admin@x.com", "BUG-1", "BUG-2", None, now())
            .unwrap_err();
        assert!(matches!(err, BugError::StateConflict(_)));
    }

    #[test]
    fn test_self_duplicate_rejected() {
        let mut store = seeded_store();
        let err = mark_duplicate(&mut store, &cfg(), "admin@x.com", "BUG-1", "BUG-1", None, now())
            .unwrap_err();
        assert!(matches!(err, BugError::Validation(_)));
    }

    #[test]
    fn test_unrelated_user_may_not_mark() {
        let mut store = seeded_store();
        with_original(&mut store);
        let err = mark_duplicate(&mut store, &cfg(), "rita@x.com", "BUG-1", "BUG-2", None, now())
            .unwrap_err();
        assert!(matches!(err, BugError::Authorization(_)));
    }
}
