//! Capacity-aware, seniority-preferring assignment engine.
//!
//! Selection runs in two phases over a priority-dependent seniority order.
//! The strict phase respects the hard 40-hour cap across every seniority
//! level; only after it exhausts does the buffered phase run once, allowing
//! a small over-allocation up to a priority-specific ceiling.

use serde::{Deserialize, Serialize};

use crate::models::{BugStore, Priority, Role, Seniority, Team};
use crate::workload::WORKLOAD_CAP;

/// Estimated hours (or buffer ceilings) keyed by priority
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityHours {
    pub critical: f64,
    pub high: f64,
    pub medium: f64,
    pub low: f64,
}

impl PriorityHours {
    pub fn get(&self, priority: Priority) -> f64 {
        match priority {
            Priority::Critical => self.critical,
            Priority::High => self.high,
            Priority::Medium => self.medium,
            Priority::Low => self.low,
        }
    }
}

/// Injected tuning for the assignment engine. `Default` carries the
/// production constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentConfig {
    pub developer_estimates: PriorityHours,
    pub developer_ceilings: PriorityHours,
    pub tester_estimates: PriorityHours,
    pub tester_ceilings: PriorityHours,
}

impl Default for AssignmentConfig {
    fn default() -> Self {
        Self {
            developer_estimates: PriorityHours {
                critical: 6.0,
                high: 9.0,
                medium: 3.0,
                low: 1.0,
            },
            developer_ceilings: PriorityHours {
                critical: 45.0,
                high: 43.0,
                medium: 42.0,
                low: 40.0,
            },
            tester_estimates: PriorityHours {
                critical: 4.0,
                high: 5.0,
                medium: 2.0,
                low: 1.0,
            },
            tester_ceilings: PriorityHours {
                critical: 43.0,
                high: 42.0,
                medium: 41.0,
                low: 40.0,
            },
        }
    }
}

impl AssignmentConfig {
    /// Estimated hours a bug of this priority commits for the given role
    pub fn estimate(&self, role: Role, priority: Priority) -> f64 {
        match role {
            Role::Tester => self.tester_estimates.get(priority),
            _ => self.developer_estimates.get(priority),
        }
    }

    /// Buffered-phase ceiling for the given role and priority
    pub fn ceiling(&self, role: Role, priority: Priority) -> f64 {
        match role {
            Role::Tester => self.tester_ceilings.get(priority),
            _ => self.developer_ceilings.get(priority),
        }
    }

    /// Seniority preference order: seniors first for urgent work, mid-level
    /// first for Medium, juniors first for Low
    pub fn seniority_order(priority: Priority) -> [Seniority; 3] {
        match priority {
            Priority::Critical | Priority::High => {
                [Seniority::Senior, Seniority::Mid, Seniority::Junior]
            }
            Priority::Medium => [Seniority::Mid, Seniority::Junior, Seniority::Senior],
            Priority::Low => [Seniority::Junior, Seniority::Mid, Seniority::Senior],
        }
    }
}

/// Successful engine selection
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentPick {
    pub email: String,
    pub full_name: String,
    pub seniority: Seniority,
    pub estimated_hours: f64,
    pub total_after_assignment: f64,
    pub over_loaded: bool,
    pub fallback_notice: Option<String>,
}

struct Candidate {
    email: String,
    full_name: String,
    seniority: Seniority,
    workload_hours: f64,
}

/// Selects an eligible developer or tester for (application, team, priority),
/// or `None` when both phases exhaust. The caller owns the commit: setting
/// the assignment field, transitioning status and adding the estimate to the
/// workload ledger.
pub fn select(
    store: &BugStore,
    config: &AssignmentConfig,
    application: &str,
    team: Team,
    role: Role,
    priority: Priority,
) -> Option<AssignmentPick> {
    let estimate = config.estimate(role, priority);
    let ceiling = config.ceiling(role, priority);
    let order = AssignmentConfig::seniority_order(priority);

    // Overloaded users never enter the pool
    let pool: Vec<Candidate> = store
        .users
        .iter()
        .filter_map(|u| {
            let grant = u.grant(application, team, role)?;
            if grant.over_loaded {
                return None;
            }
            Some(Candidate {
                email: u.email.clone(),
                full_name: u.full_name.clone(),
                seniority: grant.seniority?,
                workload_hours: grant.workload_hours,
            })
        })
        .collect();

    // Strict phase: hard cap at every level, lowest current load wins,
    // earlier pool order breaks ties
    for (rank, &level) in order.iter().enumerate() {
        let mut best: Option<&Candidate> = None;
        for c in pool.iter().filter(|c| c.seniority == level) {
            if c.workload_hours + estimate > WORKLOAD_CAP {
                continue;
            }
            if best.map_or(true, |b| c.workload_hours < b.workload_hours) {
                best = Some(c);
            }
        }
        if let Some(c) = best {
            let fallback_notice = (rank > 0).then(|| {
                format!(
                    "no {} available under the {}h cap; assigned {} instead",
                    order[0], WORKLOAD_CAP, level
                )
            });
            return Some(AssignmentPick {
                email: c.email.clone(),
                full_name: c.full_name.clone(),
                seniority: level,
                estimated_hours: estimate,
                total_after_assignment: c.workload_hours + estimate,
                over_loaded: false,
                fallback_notice,
            });
        }
    }

    // Buffered phase: entered once, after the strict phase exhausts every
    // level. Over-allocates up to the priority ceiling.
    for &level in order.iter() {
        let mut best: Option<&Candidate> = None;
        for c in pool.iter().filter(|c| c.seniority == level) {
            let total = c.workload_hours + estimate;
            if total <= WORKLOAD_CAP || total > ceiling {
                continue;
            }
            if best.map_or(true, |b| c.workload_hours < b.workload_hours) {
                best = Some(c);
            }
        }
        if let Some(c) = best {
            let total = c.workload_hours + estimate;
            return Some(AssignmentPick {
                email: c.email.clone(),
                full_name: c.full_name.clone(),
                seniority: level,
                estimated_hours: estimate,
                total_after_assignment: total,
                over_loaded: true,
                fallback_notice: Some(format!(
                    "over-allocated {} to {:.1}h (ceiling {:.1}h for {} priority)",
                    c.email, total, ceiling, priority
                )),
            });
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RoleGrant, User};

    fn dev(email: &str, seniority: Seniority, hours: f64) -> User {
        User {
            full_name: email.split('@').next().unwrap().to_string(),
            email: email.to_string(),
            roles: vec![RoleGrant {
                application: "AppX".into(),
                team: Some(Team::Frontend),
                role: Role::Developer,
                seniority: Some(seniority),
                workload_hours: hours,
                over_loaded: false,
            }],
        }
    }

    fn store_with(users: Vec<User>) -> BugStore {
        let mut store = BugStore::new();
        for u in users {
            store.add_user(u);
        }
        store
    }

    fn pick(store: &BugStore, priority: Priority) -> Option<AssignmentPick> {
        select(
            store,
            &AssignmentConfig::default(),
            "AppX",
            Team::Frontend,
            Role::Developer,
            priority,
        )
    }

    #[test]
    fn test_empty_pool_returns_none() {
        let store = store_with(vec![]);
        assert!(pick(&store, Priority::Critical).is_none());
    }

    #[test]
    fn test_strict_phase_under_cap() {
        let store = store_with(vec![dev("senior@x.com", Seniority::Senior, 32.0)]);
        let p = pick(&store, Priority::Critical).unwrap();
        assert_eq!(p.email, "senior@x.com");
        assert_eq!(p.estimated_hours, 6.0);
        assert_eq!(p.total_after_assignment, 38.0);
        assert!(!p.over_loaded);
        assert!(p.fallback_notice.is_none());
    }

    #[test]
    fn test_buffered_phase_over_allocates_to_ceiling() {
        // 39 + 6 = 45: fails strict, fits the Critical ceiling exactly
        let store = store_with(vec![dev("senior@x.com", Seniority::Senior, 39.0)]);
        let p = pick(&store, Priority::Critical).unwrap();
        assert_eq!(p.email, "senior@x.com");
        assert_eq!(p.total_after_assignment, 45.0);
        assert!(p.over_loaded);
        assert!(p.fallback_notice.is_some());
    }

    #[test]
    fn test_over_ceiling_returns_none() {
        // 46 + 6 = 52 > 45 ceiling
        let store = store_with(vec![dev("senior@x.com", Seniority::Senior, 46.0)]);
        assert!(pick(&store, Priority::Critical).is_none());
    }

    #[test]
    fn test_lowest_workload_wins_within_level() {
        let store = store_with(vec![
            dev("busy@x.com", Seniority::Senior, 20.0),
            dev("idle@x.com", Seniority::Senior, 5.0),
        ]);
        let p = pick(&store, Priority::High).unwrap();
        assert_eq!(p.email, "idle@x.com");
    }

    #[test]
    fn test_seniority_preference_before_load() {
        // An idle junior does not beat an eligible senior on Critical
        let store = store_with(vec![
            dev("junior@x.com", Seniority::Junior, 0.0),
            dev("senior@x.com", Seniority::Senior, 30.0),
        ]);
        let p = pick(&store, Priority::Critical).unwrap();
        assert_eq!(p.email, "senior@x.com");
        assert!(p.fallback_notice.is_none());
    }

    #[test]
    fn test_fallback_notice_on_lower_seniority() {
        let store = store_with(vec![
            dev("senior@x.com", Seniority::Senior, 38.0), // 38+6 > 40
            dev("mid@x.com", Seniority::Mid, 10.0),
        ]);
        let p = pick(&store, Priority::Critical).unwrap();
        assert_eq!(p.email, "mid@x.com");
        assert!(p.fallback_notice.is_some());
        assert!(!p.over_loaded);
    }

    #[test]
    fn test_strict_exhausts_all_levels_before_buffered() {
        // Senior fits only buffered; junior fits strict. Strict must walk
        // down to the junior before any over-allocation happens.
        let store = store_with(vec![
            dev("senior@x.com", Seniority::Senior, 39.0),
            dev("junior@x.com", Seniority::Junior, 10.0),
        ]);
        let p = pick(&store, Priority::Critical).unwrap();
        assert_eq!(p.email, "junior@x.com");
        assert!(!p.over_loaded);
    }

    #[test]
    fn test_overloaded_users_excluded_from_pool() {
        let mut flagged = dev("senior@x.com", Seniority::Senior, 10.0);
        flagged.roles[0].over_loaded = true;
        let store = store_with(vec![flagged]);
        assert!(pick(&store, Priority::Critical).is_none());
    }

    #[test]
    fn test_medium_priority_prefers_mid_level() {
        let store = store_with(vec![
            dev("senior@x.com", Seniority::Senior, 0.0),
            dev("mid@x.com", Seniority::Mid, 10.0),
        ]);
        let p = pick(&store, Priority::Medium).unwrap();
        assert_eq!(p.email, "mid@x.com");
        assert_eq!(p.estimated_hours, 3.0);
    }

    #[test]
    fn test_tester_tables_apply_for_tester_role() {
        let mut tester = dev("tester@x.com", Seniority::Senior, 0.0);
        tester.roles[0].role = Role::Tester;
        let store = store_with(vec![tester]);
        let p = select(
            &store,
            &AssignmentConfig::default(),
            "AppX",
            Team::Frontend,
            Role::Tester,
            Priority::High,
        )
        .unwrap();
        assert_eq!(p.estimated_hours, 5.0);
    }
}
