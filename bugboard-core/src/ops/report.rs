//! Bug submission, team routing and priority.

use chrono::{DateTime, Utc};

use crate::auth::RoleContext;
use crate::error::{BugError, Result};
use crate::models::{
    Bug, BugStatus, BugStore, HistoryEntry, HistoryKind, Priority, Reporter, Team,
};
use crate::notify::NotificationEvent;
use crate::ops::{bug_team, ensure_not_terminal, find_bug, find_bug_mut, Outcome};

const TITLE_MIN: usize = 15;
const TITLE_MAX: usize = 30;
const DESCRIPTION_MIN: usize = 30;
const DESCRIPTION_MAX: usize = 100;

/// Input for a new bug report
#[derive(Debug)]
pub struct NewBugReport<'a> {
    pub application: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub reporter_email: &'a str,
    /// Reporter-supplied initial state; defaults to Open
    pub initial_status: Option<BugStatus>,
}

/// Submits a new bug report. The store counter allocates the BUG-N id.
pub fn submit(store: &mut BugStore, input: NewBugReport<'_>, now: DateTime<Utc>) -> Result<Outcome> {
    let title_len = input.title.chars().count();
    if !(TITLE_MIN..=TITLE_MAX).contains(&title_len) {
        return Err(BugError::Validation(format!(
            "title must be {}-{} characters, got {}",
            TITLE_MIN, TITLE_MAX, title_len
        )));
    }
    let description_len = input.description.chars().count();
    if !(DESCRIPTION_MIN..=DESCRIPTION_MAX).contains(&description_len) {
        return Err(BugError::Validation(format!(
            "description must be {}-{} characters, got {}",
            DESCRIPTION_MIN, DESCRIPTION_MAX, description_len
        )));
    }
    if input.application.trim().is_empty() {
        return Err(BugError::Validation("application must not be empty".into()));
    }

    let reporter = store
        .get_user(input.reporter_email)
        .ok_or_else(|| BugError::NotFound(format!("reporter {} not found", input.reporter_email)))?;
    let reporter = Reporter {
        name: reporter.full_name.clone(),
        email: reporter.email.clone(),
    };

    let status = input.initial_status.unwrap_or(BugStatus::Open);
    if status.is_terminal() {
        return Err(BugError::Validation(format!(
            "a bug cannot be submitted in the {} state",
            status
        )));
    }

    let reporter_email = reporter.email.clone();
    let bug = Bug::new(
        input.application,
        input.title,
        input.description,
        reporter,
        status,
        now,
    );
    let bug_id = store.add_bug(bug);

    Ok(
        Outcome::new(&bug_id, format!("reported as {}", status)).with_event(
            NotificationEvent::BugReported {
                bug_id,
                reported_by: reporter_email,
            },
        ),
    )
}

/// Routes a bug to a team. Admin only; assignment and lifecycle operations
/// require routing first.
pub fn assign_team(
    store: &mut BugStore,
    actor: &str,
    bug_id: &str,
    team: Team,
    now: DateTime<Utc>,
) -> Result<Outcome> {
    let bug = find_bug(store, bug_id)?;
    ensure_not_terminal(bug)?;
    let application = bug.application.clone();

    let ctx = RoleContext::resolve(store, actor, &application, team)?;
    if !ctx.is_admin {
        return Err(BugError::Authorization(
            "only an admin may route a bug to a team".into(),
        ));
    }

    let role = ctx.primary_role();
    let bug = find_bug_mut(store, bug_id)?;
    bug.assigned_team = Some(team);
    bug.change_history
        .push(HistoryEntry::new(HistoryKind::TeamAssignment, actor, role, now));

    Ok(
        Outcome::new(bug_id, format!("routed to the {} team", team)).with_event(
            NotificationEvent::TeamAssigned {
                bug_id: bug_id.to_string(),
                team,
            },
        ),
    )
}

/// Sets the bug priority. Admin/teamlead only, and rejected once a developer
/// or tester has been assigned.
pub fn set_priority(
    store: &mut BugStore,
    actor: &str,
    bug_id: &str,
    priority: Priority,
    now: DateTime<Utc>,
) -> Result<Outcome> {
    let bug = find_bug(store, bug_id)?;
    ensure_not_terminal(bug)?;
    let application = bug.application.clone();
    let team = bug_team(bug)?;

    if bug.assigned_to.developer.is_some() || bug.assigned_to.tester.is_some() {
        return Err(BugError::StateConflict(format!(
            "priority of {} is locked once a developer or tester is assigned",
            bug_id
        )));
    }

    let ctx = RoleContext::resolve(store, actor, &application, team)?;
    if !ctx.is_privileged() {
        return Err(BugError::Authorization(
            "only an admin or team lead may set priority".into(),
        ));
    }

    let role = ctx.primary_role();
    let bug = find_bug_mut(store, bug_id)?;
    bug.priority = Some(priority);
    let mut entry = HistoryEntry::new(HistoryKind::PriorityChange, actor, role, now);
    entry.priority = Some(priority);
    bug.change_history.push(entry);

    Ok(
        Outcome::new(bug_id, format!("priority set to {}", priority)).with_event(
            NotificationEvent::PriorityChanged {
                bug_id: bug_id.to_string(),
                priority,
            },
        ),
    )
}
