//! Domain operations. Each function validates against the current store
//! state, applies its full effect (bug write plus any workload delta), and
//! returns the notification events it produced. Callers run one operation
//! per `Storage::update_atomically` closure so a rejection leaves no trace.

pub mod assign;
pub mod duplicate;
pub mod reallocation;
pub mod reopen;
pub mod report;
pub mod status;

use serde::Serialize;

use crate::error::{BugError, Result};
use crate::models::{Bug, BugStatus, BugStore, Priority, Team};
use crate::notify::NotificationEvent;

/// Result of a committed operation: what happened, to which bug, and the
/// events the caller dispatches after the store commit
#[derive(Debug, Serialize)]
pub struct Outcome {
    pub bug_id: String,
    pub detail: String,
    #[serde(skip)]
    pub events: Vec<NotificationEvent>,
}

impl Outcome {
    pub fn new(bug_id: &str, detail: impl Into<String>) -> Self {
        Self {
            bug_id: bug_id.to_string(),
            detail: detail.into(),
            events: Vec::new(),
        }
    }

    pub fn with_event(mut self, event: NotificationEvent) -> Self {
        self.events.push(event);
        self
    }
}

pub(crate) fn find_bug<'a>(store: &'a BugStore, bug_id: &str) -> Result<&'a Bug> {
    store
        .get_bug(bug_id)
        .ok_or_else(|| BugError::NotFound(format!("bug {} not found", bug_id)))
}

pub(crate) fn find_bug_mut<'a>(store: &'a mut BugStore, bug_id: &str) -> Result<&'a mut Bug> {
    store
        .get_bug_mut(bug_id)
        .ok_or_else(|| BugError::NotFound(format!("bug {} not found", bug_id)))
}

/// Team the bug is routed to; most operations require routing first
pub(crate) fn bug_team(bug: &Bug) -> Result<Team> {
    bug.assigned_team.ok_or_else(|| {
        BugError::StateConflict(format!("bug {} is not assigned to a team yet", bug.bug_id))
    })
}

/// Priority guard shared by assignment and every transition past Open
pub(crate) fn bug_priority(bug: &Bug) -> Result<Priority> {
    bug.priority.ok_or_else(|| {
        BugError::Validation(format!("bug {} has no priority set", bug.bug_id))
    })
}

/// Upstream guard shared across most mutating operations
pub(crate) fn ensure_not_terminal(bug: &Bug) -> Result<()> {
    match bug.status {
        BugStatus::Closed => Err(BugError::StateConflict(format!(
            "bug {} is closed; only the reopen workflow may act on it",
            bug.bug_id
        ))),
        BugStatus::Duplicate => Err(BugError::StateConflict(format!(
            "bug {} is marked duplicate; undo the duplicate mark first",
            bug.bug_id
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use chrono::{DateTime, Utc};

    use crate::models::{
        Bug, BugStatus, BugStore, Priority, Reporter, Role, RoleGrant, Seniority, Team, User,
    };

    pub const APP: &str = "AppX";
    pub const TEAM: Team = Team::Frontend;

    pub fn now() -> DateTime<Utc> {
        Utc::now()
    }

    pub fn user(email: &str, role: Role, seniority: Option<Seniority>, hours: f64) -> User {
        User {
            full_name: email.split('@').next().unwrap().to_string(),
            email: email.to_string(),
            roles: vec![RoleGrant {
                application: APP.into(),
                team: Some(TEAM),
                role,
                seniority,
                workload_hours: hours,
                over_loaded: false,
            }],
        }
    }

    pub fn admin(email: &str) -> User {
        User {
            full_name: "Admin".into(),
            email: email.to_string(),
            roles: vec![RoleGrant {
                application: APP.into(),
                team: None,
                role: Role::Admin,
                seniority: None,
                workload_hours: 0.0,
                over_loaded: false,
            }],
        }
    }

    /// Store seeded with an admin, a team lead, a developer, a tester, a
    /// reporter and one routed, prioritized bug (BUG-1)
    pub fn seeded_store() -> BugStore {
        let mut store = BugStore::new();
        store.add_user(admin("admin@x.com"));
        store.add_user(user("lead@x.com", Role::TeamLead, None, 0.0));
        store.add_user(user("dev@x.com", Role::Developer, Some(Seniority::Senior), 10.0));
        store.add_user(user("tester@x.com", Role::Tester, Some(Seniority::Mid), 8.0));
        store.add_user(user("rita@x.com", Role::User, None, 0.0));

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
        store
    }

    pub fn dev_hours(store: &BugStore, email: &str) -> f64 {
        store
            .get_user(email)
            .unwrap()
            .grant(APP, TEAM, Role::Developer)
            .unwrap()
            .workload_hours
    }

    pub fn tester_hours(store: &BugStore, email: &str) -> f64 {
        store
            .get_user(email)
            .unwrap()
            .grant(APP, TEAM, Role::Tester)
            .unwrap()
            .workload_hours
    }
}
