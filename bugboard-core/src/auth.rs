//! Actor role resolution.
//!
//! The identity collaborator supplies only an actor email; this module
//! resolves what that actor may do for one (application, team) scope. The
//! core trusts the store's role grants as given.

use crate::error::{BugError, Result};
use crate::models::{BugStore, Role, Team};

/// Resolved role flags for one actor against one (application, team) scope
#[derive(Debug, Clone)]
pub struct RoleContext {
    pub email: String,
    pub is_admin: bool,
    pub is_team_lead: bool,
    pub is_developer: bool,
    pub is_tester: bool,
}

impl RoleContext {
    /// Resolves the actor's role flags. Admin is global; teamlead, developer
    /// and tester are scoped to the given application and team.
    pub fn resolve(store: &BugStore, email: &str, application: &str, team: Team) -> Result<Self> {
        let user = store
            .get_user(email)
            .ok_or_else(|| BugError::NotFound(format!("user {} not found", email)))?;

        Ok(Self {
            email: email.to_string(),
            is_admin: user.has_role(Role::Admin),
            is_team_lead: user.has_role_for(Role::TeamLead, application, team),
            is_developer: user.has_role_for(Role::Developer, application, team),
            is_tester: user.has_role_for(Role::Tester, application, team),
        })
    }

    /// Admin or teamlead: may bypass the canonical edge table and perform
    /// assignment/decision operations
    pub fn is_privileged(&self) -> bool {
        self.is_admin || self.is_team_lead
    }

    /// Strongest role, used to stamp history entries
    pub fn primary_role(&self) -> Role {
        if self.is_admin {
            Role::Admin
        } else if self.is_team_lead {
            Role::TeamLead
        } else if self.is_developer {
            Role::Developer
        } else if self.is_tester {
            Role::Tester
        } else {
            Role::User
        }
    }
}
