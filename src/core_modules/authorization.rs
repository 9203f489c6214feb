//! Permission checks for alert transitions.
//!
//! The lifecycle manager never decides who may do what; it asks an `Authorizer`.
//! Identity and session management live outside this crate, so an `Actor` is
//! only the id and role the dashboard already resolved.

use crate::core_modules::alert::AlertAction;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_OPERATOR: &str = "operator";
pub const ROLE_VIEWER: &str = "viewer";

/// The person (or service) requesting a transition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: String,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
        }
    }
}

pub trait Authorizer: Send + Sync {
    fn is_permitted(&self, actor: &Actor, action: AlertAction) -> bool;
}

/// Grants actions per role.
#[derive(Debug, Clone, Default)]
pub struct RoleAuthorizer {
    grants: HashMap<String, HashSet<AlertAction>>,
}

impl RoleAuthorizer {
    /// No role may do anything.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Dashboard defaults: admins and operators acknowledge and dismiss, viewers only look.
    pub fn with_defaults() -> Self {
        Self::empty()
            .grant(ROLE_ADMIN, AlertAction::Acknowledge)
            .grant(ROLE_ADMIN, AlertAction::Dismiss)
            .grant(ROLE_OPERATOR, AlertAction::Acknowledge)
            .grant(ROLE_OPERATOR, AlertAction::Dismiss)
    }

    pub fn grant(mut self, role: impl Into<String>, action: AlertAction) -> Self {
        self.grants.entry(role.into()).or_default().insert(action);
        self
    }

    pub fn revoke(mut self, role: &str, action: AlertAction) -> Self {
        if let Some(actions) = self.grants.get_mut(role) {
            actions.remove(&action);
        }
        self
    }
}

impl Authorizer for RoleAuthorizer {
    fn is_permitted(&self, actor: &Actor, action: AlertAction) -> bool {
        self.grants
            .get(&actor.role)
            .is_some_and(|actions| actions.contains(&action))
    }
}

/// Permits everything. For single-operator deployments and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn is_permitted(&self, _actor: &Actor, _action: AlertAction) -> bool {
        true
    }
}
