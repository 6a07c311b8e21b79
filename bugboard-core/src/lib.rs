//! Core library for bugboard defect tracking.
//!
//! Tracks bugs through a multi-role lifecycle (reporter, team, developer,
//! tester, closure) with a capacity-aware assignment engine, a per-role
//! workload ledger, and bounded reallocation/reopen sub-workflows. All
//! domain operations take the acting user's email and an explicit `now`
//! timestamp, mutate an in-memory [`models::BugStore`], and return the
//! notification events they produced; persistence and locking live in
//! [`storage::Storage`].

pub mod assignment;
pub mod auth;
pub mod error;
pub mod models;
pub mod notify;
pub mod ops;
pub mod storage;
pub mod workload;

pub use assignment::{AssignmentConfig, AssignmentPick};
pub use error::{BugError, Result};
pub use models::{
    Bug, BugStatus, BugStore, HistoryEntry, HistoryKind, Priority, RequestDecision, Role,
    RoleGrant, Seniority, Team, User,
};
pub use notify::{LogNotifier, NotificationEvent, Notifier};
pub use storage::Storage;
