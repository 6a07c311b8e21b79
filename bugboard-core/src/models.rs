use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Represents the priority of a bug report
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Critical => write!(f, "Critical"),
            Priority::High => write!(f, "High"),
            Priority::Medium => write!(f, "Medium"),
            Priority::Low => write!(f, "Low"),
        }
    }
}

impl Priority {
    /// Parse a priority from a string (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "critical" => Some(Priority::Critical),
            "high" => Some(Priority::High),
            "medium" => Some(Priority::Medium),
            "low" => Some(Priority::Low),
            _ => None,
        }
    }
}

/// Seniority level of a developer or tester within one role grant
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Seniority {
    Junior,
    Mid,
    Senior,
}

impl fmt::Display for Seniority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Seniority::Junior => write!(f, "junior"),
            Seniority::Mid => write!(f, "mid"),
            Seniority::Senior => write!(f, "senior"),
        }
    }
}

impl Seniority {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "junior" => Some(Seniority::Junior),
            "mid" => Some(Seniority::Mid),
            "senior" => Some(Seniority::Senior),
            _ => None,
        }
    }
}

/// Team a bug can be routed to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Team {
    Frontend,
    Backend,
    Devops,
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Team::Frontend => write!(f, "frontend"),
            Team::Backend => write!(f, "backend"),
            Team::Devops => write!(f, "devops"),
        }
    }
}

impl Team {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "frontend" => Some(Team::Frontend),
            "backend" => Some(Team::Backend),
            "devops" => Some(Team::Devops),
            _ => None,
        }
    }
}

/// Role a user can hold for one (application, team) combination
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Developer,
    Tester,
    TeamLead,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Developer => write!(f, "developer"),
            Role::Tester => write!(f, "tester"),
            Role::TeamLead => write!(f, "teamlead"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

/// Lifecycle status of a bug report
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BugStatus {
    Open,
    Assigned,
    FixInProgress,
    FixedTestingPending,
    TesterAssigned,
    TestingInProgress,
    TestedVerified,
    ReadyForClosure,
    Closed,
    Duplicate,
}

impl fmt::Display for BugStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BugStatus::Open => write!(f, "Open"),
            BugStatus::Assigned => write!(f, "Assigned"),
            BugStatus::FixInProgress => write!(f, "Fix In Progress"),
            BugStatus::FixedTestingPending => write!(f, "Fixed (Testing Pending)"),
            BugStatus::TesterAssigned => write!(f, "Tester Assigned"),
            BugStatus::TestingInProgress => write!(f, "Testing In Progress"),
            BugStatus::TestedVerified => write!(f, "Tested & Verified"),
            BugStatus::ReadyForClosure => write!(f, "Ready For Closure"),
            BugStatus::Closed => write!(f, "Closed"),
            BugStatus::Duplicate => write!(f, "Duplicate"),
        }
    }
}

impl BugStatus {
    /// Parse a status from its display form (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "open" => Some(BugStatus::Open),
            "assigned" => Some(BugStatus::Assigned),
            "fix in progress" => Some(BugStatus::FixInProgress),
            "fixed (testing pending)" => Some(BugStatus::FixedTestingPending),
            "tester assigned" => Some(BugStatus::TesterAssigned),
            "testing in progress" => Some(BugStatus::TestingInProgress),
            "tested & verified" => Some(BugStatus::TestedVerified),
            "ready for closure" => Some(BugStatus::ReadyForClosure),
            "closed" => Some(BugStatus::Closed),
            "duplicate" => Some(BugStatus::Duplicate),
            _ => None,
        }
    }

    /// True for the two terminal states
    pub fn is_terminal(&self) -> bool {
        matches!(self, BugStatus::Closed | BugStatus::Duplicate)
    }
}

/// Kind of a change-history entry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum HistoryKind {
    StatusChange,
    Assignment,
    Unassign,
    TeamAssignment,
    PriorityChange,
    DuplicateMark,
    UndoDuplicate,
    ReallocationRequest,
    ReallocationDecision,
    ReopenRequest,
    ReopenDecision,
}

/// Decision state of a reallocation or reopen request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RequestDecision {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for RequestDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestDecision::Pending => write!(f, "Pending"),
            RequestDecision::Approved => write!(f, "Approved"),
            RequestDecision::Rejected => write!(f, "Rejected"),
        }
    }
}

/// One append-only audit entry on a bug.
///
/// Entries are never mutated or removed; the revert-window and reopen-window
/// checks read them back as the source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub kind: HistoryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_status: Option<BugStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_status: Option<BugStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub developer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tester: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<RequestDecision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Uuid>,
    pub changed_on: DateTime<Utc>,
    pub changed_by: String,
    pub changed_by_role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl HistoryEntry {
    /// Creates an entry with all optional payload fields unset
    pub fn new(kind: HistoryKind, changed_by: &str, role: Role, changed_on: DateTime<Utc>) -> Self {
        Self {
            kind,
            previous_status: None,
            new_status: None,
            developer: None,
            tester: None,
            priority: None,
            decision: None,
            request_id: None,
            changed_on,
            changed_by: changed_by.to_string(),
            changed_by_role: role,
            reason: None,
        }
    }
}

/// Reallocation request raised by the assigned developer or tester
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReallocationRequest {
    pub id: Uuid,
    pub requested_by: String,
    pub reason: String,
    pub status: RequestDecision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_on: Option<DateTime<Utc>>,
}

impl ReallocationRequest {
    pub fn new(requested_by: &str, reason: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            requested_by: requested_by.to_string(),
            reason: reason.to_string(),
            status: RequestDecision::Pending,
            reviewed_by: None,
            reviewed_on: None,
        }
    }
}

/// Reopen request raised on a closed bug
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReopenRequest {
    pub id: Uuid,
    pub requested_by: String,
    pub role: Role,
    pub reason: String,
    pub requested_on: DateTime<Utc>,
    pub status: RequestDecision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_on: Option<DateTime<Utc>>,
}

/// Reallocation requests split by the role they concern
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReallocationRequests {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub developer: Vec<ReallocationRequest>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tester: Vec<ReallocationRequest>,
}

/// Who reported the bug
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reporter {
    pub name: String,
    pub email: String,
}

/// Active developer/tester assignment on a bug (at most one of each)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Assignees {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub developer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tester: Option<String>,
}

/// A tracked bug report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bug {
    /// Human-readable monotonic id ("BUG-1", "BUG-2", ...)
    pub bug_id: String,

    /// Application the bug was reported against (immutable after submission)
    pub application: String,

    pub title: String,
    pub description: String,
    pub reported_by: Reporter,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_team: Option<Team>,

    #[serde(default)]
    pub assigned_to: Assignees,

    /// Must be set before assignment or any status advance past Open
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,

    pub status: BugStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_last_updated: Option<DateTime<Utc>>,

    /// Hours the developer logged when moving to Fixed (Testing Pending)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub developer_resolution_hours: Option<f64>,

    /// Hours the tester logged when moving to Tested & Verified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tester_validation_hours: Option<f64>,

    #[serde(default)]
    pub is_duplicate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_bug_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate_explanation: Option<String>,

    /// Flips permanently on the first reopen; a bug is never reopened twice
    #[serde(default)]
    pub reopened: bool,

    /// Append-only audit trail
    #[serde(default)]
    pub change_history: Vec<HistoryEntry>,

    #[serde(default)]
    pub reallocation_requests: ReallocationRequests,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reopen_requests: Vec<ReopenRequest>,

    pub created_at: DateTime<Utc>,
}

impl Bug {
    /// Creates a new bug in the given initial status (normally Open).
    /// The bug_id is assigned when the bug is added to the store.
    pub fn new(
        application: &str,
        title: &str,
        description: &str,
        reporter: Reporter,
        initial_status: BugStatus,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            bug_id: String::new(),
            application: application.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            reported_by: reporter,
            assigned_team: None,
            assigned_to: Assignees::default(),
            priority: None,
            status: initial_status,
            status_reason: None,
            status_last_updated: None,
            developer_resolution_hours: None,
            tester_validation_hours: None,
            is_duplicate: false,
            original_bug_id: None,
            duplicate_explanation: None,
            reopened: false,
            change_history: Vec::new(),
            reallocation_requests: ReallocationRequests::default(),
            reopen_requests: Vec::new(),
            created_at: now,
        }
    }

    /// Last Status Change entry, used for the revert-window check
    pub fn last_status_change(&self) -> Option<&HistoryEntry> {
        self.change_history
            .iter()
            .rev()
            .find(|e| e.kind == HistoryKind::StatusChange)
    }

    /// Last Duplicate Mark entry, used to restore the prior status on undo
    pub fn last_duplicate_mark(&self) -> Option<&HistoryEntry> {
        self.change_history
            .iter()
            .rev()
            .find(|e| e.kind == HistoryKind::DuplicateMark)
    }

    /// Last entry that closed the bug (a Status Change or a Reopen Decision
    /// whose new status is Closed), used for the 7-day reopen window
    pub fn last_closing_entry(&self) -> Option<&HistoryEntry> {
        self.change_history.iter().rev().find(|e| {
            matches!(e.kind, HistoryKind::StatusChange | HistoryKind::ReopenDecision)
                && e.new_status == Some(BugStatus::Closed)
        })
    }
}

/// One (application, team, role) grant on a user, carrying the per-role
/// workload ledger fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleGrant {
    pub application: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<Team>,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seniority: Option<Seniority>,
    #[serde(default)]
    pub workload_hours: f64,
    #[serde(default)]
    pub over_loaded: bool,
}

/// A user known to the tracker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub roles: Vec<RoleGrant>,
}

impl User {
    /// True if the user holds the role anywhere (used for admin)
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.iter().any(|g| g.role == role)
    }

    /// True if the user holds the role for this application and team
    pub fn has_role_for(&self, role: Role, application: &str, team: Team) -> bool {
        self.roles
            .iter()
            .any(|g| g.role == role && g.application == application && g.team == Some(team))
    }

    /// The grant for (application, team, role), if any
    pub fn grant(&self, application: &str, team: Team, role: Role) -> Option<&RoleGrant> {
        self.roles
            .iter()
            .find(|g| g.role == role && g.application == application && g.team == Some(team))
    }

    pub fn grant_mut(&mut self, application: &str, team: Team, role: Role) -> Option<&mut RoleGrant> {
        self.roles
            .iter_mut()
            .find(|g| g.role == role && g.application == application && g.team == Some(team))
    }
}

/// Collection of all bugs and users
#[derive(Debug, Serialize, Deserialize)]
pub struct BugStore {
    #[serde(default)]
    pub bugs: Vec<Bug>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default = "default_next_bug_number")]
    pub next_bug_number: u32,
}

fn default_next_bug_number() -> u32 {
    1
}

impl BugStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self {
            bugs: Vec::new(),
            users: Vec::new(),
            next_bug_number: 1,
        }
    }

    /// Adds a bug, assigning the next BUG-N id. Returns the assigned id.
    pub fn add_bug(&mut self, mut bug: Bug) -> String {
        let id = format!("BUG-{}", self.next_bug_number);
        self.next_bug_number += 1;
        bug.bug_id = id.clone();
        self.bugs.push(bug);
        id
    }

    pub fn get_bug(&self, bug_id: &str) -> Option<&Bug> {
        self.bugs.iter().find(|b| b.bug_id == bug_id)
    }

    pub fn get_bug_mut(&mut self, bug_id: &str) -> Option<&mut Bug> {
        self.bugs.iter_mut().find(|b| b.bug_id == bug_id)
    }

    pub fn get_user(&self, email: &str) -> Option<&User> {
        self.users.iter().find(|u| u.email == email)
    }

    pub fn get_user_mut(&mut self, email: &str) -> Option<&mut User> {
        self.users.iter_mut().find(|u| u.email == email)
    }

    pub fn add_user(&mut self, user: User) {
        self.users.push(user);
    }

    /// All users holding (application, team, role), used by the assignment
    /// engine to build its candidate pool
    pub fn users_with_role(&self, application: &str, team: Team, role: Role) -> Vec<&User> {
        self.users
            .iter()
            .filter(|u| u.grant(application, team, role).is_some())
            .collect()
    }

    /// Email of the team lead for (application, team), if one exists
    pub fn team_lead(&self, application: &str, team: Team) -> Option<&User> {
        self.users
            .iter()
            .find(|u| u.has_role_for(Role::TeamLead, application, team))
    }
}

impl Default for BugStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bug() -> Bug {
        Bug::new(
            "AppX",
            "Login button unresponsive",
            "Clicking login does nothing on the second attempt",
            Reporter {
                name: "Rita".into(),
                email: "rita@example.com".into(),
            },
            BugStatus::Open,
            Utc::now(),
        )
    }

    #[test]
    fn test_add_bug_assigns_monotonic_ids() {
        let mut store = BugStore::new();
        let first = store.add_bug(sample_bug());
        let second = store.add_bug(sample_bug());

        assert_eq!(first, "BUG-1");
        assert_eq!(second, "BUG-2");
        assert_eq!(store.next_bug_number, 3);
        assert!(store.get_bug("BUG-2").is_some());
        assert!(store.get_bug("BUG-3").is_none());
    }

    #[test]
    fn test_last_status_change_skips_other_kinds() {
        let mut bug = sample_bug();
        let now = Utc::now();

        let mut change = HistoryEntry::new(HistoryKind::StatusChange, "dev@x.com", Role::Developer, now);
        change.previous_status = Some(BugStatus::Assigned);
        change.new_status = Some(BugStatus::FixInProgress);
        bug.change_history.push(change);
        bug.change_history.push(HistoryEntry::new(
            HistoryKind::ReallocationRequest,
            "dev@x.com",
            Role::Developer,
            now,
        ));

        let last = bug.last_status_change().unwrap();
        assert_eq!(last.new_status, Some(BugStatus::FixInProgress));
    }

    #[test]
    fn test_last_closing_entry_matches_reopen_decision() {
        let mut bug = sample_bug();
        let now = Utc::now();

        let mut decision = HistoryEntry::new(HistoryKind::ReopenDecision, "lead@x.com", Role::TeamLead, now);
        decision.new_status = Some(BugStatus::Closed);
        decision.decision = Some(RequestDecision::Rejected);
        bug.change_history.push(decision);

        assert!(bug.last_closing_entry().is_some());
    }

    #[test]
    fn test_user_grant_lookup_is_scoped() {
        let user = User {
            full_name: "Dana".into(),
            email: "dana@example.com".into(),
            roles: vec![RoleGrant {
                application: "AppX".into(),
                team: Some(Team::Frontend),
                role: Role::Developer,
                seniority: Some(Seniority::Senior),
                workload_hours: 12.0,
                over_loaded: false,
            }],
        };

        assert!(user.grant("AppX", Team::Frontend, Role::Developer).is_some());
        assert!(user.grant("AppX", Team::Backend, Role::Developer).is_none());
        assert!(user.grant("AppY", Team::Frontend, Role::Developer).is_none());
        assert!(!user.has_role(Role::Admin));
    }

    #[test]
    fn test_status_parse_round_trip() {
        for status in [
            BugStatus::Open,
            BugStatus::FixedTestingPending,
            BugStatus::TestedVerified,
            BugStatus::ReadyForClosure,
        ] {
            assert_eq!(BugStatus::parse(&status.to_string()), Some(status));
        }
        assert_eq!(BugStatus::parse("Reassigned"), None);
    }
}
