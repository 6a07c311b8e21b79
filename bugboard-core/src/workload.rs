//! Workload ledger: per (user, application, team, role) committed-hour
//! totals with a sticky overload flag.
//!
//! This module performs no independent validation. Callers (the assignment
//! engine and the lifecycle state machine) invoke `adjust` exactly once per
//! real-world commitment or release.

use crate::error::{BugError, Result};
use crate::models::{BugStore, Role, Team};

/// Hard capacity cap for strict-phase assignment and manual assignment
pub const WORKLOAD_CAP: f64 = 40.0;

/// Adds `delta` hours (positive or negative) to the matching role grant.
///
/// The total floors at zero. `over_loaded` is set whenever the resulting
/// total exceeds 40 and is never cleared here; only an explicit future
/// correction may clear it. Returns the new total.
pub fn adjust(
    store: &mut BugStore,
    email: &str,
    application: &str,
    team: Team,
    role: Role,
    delta: f64,
) -> Result<f64> {
    let user = store
        .get_user_mut(email)
        .ok_or_else(|| BugError::NotFound(format!("user {} not found", email)))?;
    let grant = user.grant_mut(application, team, role).ok_or_else(|| {
        BugError::NotFound(format!(
            "user {} holds no {} role for {}/{}",
            email, role, application, team
        ))
    })?;

    let total = (grant.workload_hours + delta).max(0.0);
    grant.workload_hours = total;
    if total > WORKLOAD_CAP {
        grant.over_loaded = true;
    }
    Ok(total)
}

/// Current committed hours for the matching role grant
pub fn current_hours(
    store: &BugStore,
    email: &str,
    application: &str,
    team: Team,
    role: Role,
) -> Result<f64> {
    let user = store
        .get_user(email)
        .ok_or_else(|| BugError::NotFound(format!("user {} not found", email)))?;
    let grant = user.grant(application, team, role).ok_or_else(|| {
        BugError::NotFound(format!(
            "user {} holds no {} role for {}/{}",
            email, role, application, team
        ))
    })?;
    Ok(grant.workload_hours)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RoleGrant, Seniority, User};

    fn store_with_dev(hours: f64) -> BugStore {
        let mut store = BugStore::new();
        store.add_user(User {
            full_name: "Dev One".into(),
            email: "dev@example.com".into(),
            roles: vec![RoleGrant {
                application: "AppX".into(),
                team: Some(Team::Frontend),
                role: Role::Developer,
                seniority: Some(Seniority::Mid),
                workload_hours: hours,
                over_loaded: false,
            }],
        });
        store
    }

    #[test]
    fn test_adjust_adds_and_releases() {
        let mut store = store_with_dev(10.0);
        let total = adjust(&mut store, "dev@example.com", "AppX", Team::Frontend, Role::Developer, 6.0).unwrap();
        assert_eq!(total, 16.0);
        let total = adjust(&mut store, "dev@example.com", "AppX", Team::Frontend, Role::Developer, -6.0).unwrap();
        assert_eq!(total, 10.0);
    }

    #[test]
    fn test_adjust_floors_at_zero() {
        let mut store = store_with_dev(2.0);
        let total = adjust(&mut store, "dev@example.com", "AppX", Team::Frontend, Role::Developer, -5.0).unwrap();
        assert_eq!(total, 0.0);
    }

    #[test]
    fn test_overload_flag_is_sticky() {
        let mut store = store_with_dev(39.0);
        adjust(&mut store, "dev@example.com", "AppX", Team::Frontend, Role::Developer, 6.0).unwrap();
        let grant = store.get_user("dev@example.com").unwrap().grant("AppX", Team::Frontend, Role::Developer).unwrap();
        assert!(grant.over_loaded);

        // Dropping back under the cap does not clear the flag
        adjust(&mut store, "dev@example.com", "AppX", Team::Frontend, Role::Developer, -20.0).unwrap();
        let grant = store.get_user("dev@example.com").unwrap().grant("AppX", Team::Frontend, Role::Developer).unwrap();
        assert!(grant.over_loaded);
        assert_eq!(grant.workload_hours, 25.0);
    }

    #[test]
    fn test_adjust_unknown_grant_is_not_found() {
        let mut store = store_with_dev(10.0);
        let err = adjust(&mut store, "dev@example.com", "AppX", Team::Backend, Role::Developer, 1.0).unwrap_err();
        assert!(matches!(err, BugError::NotFound(_)));
    }
}
