//! Role Membership Port
//!
//! Resolving a role change to the users it affects requires the current
//! role assignments. That store lives outside this crate; `RoleMembership`
//! is the port it is reached through.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::domain::types::{RoleId, UserId};
use crate::error::Result;

/// Source of current role assignments
#[async_trait]
pub trait RoleMembership: Send + Sync {
    /// All users currently holding the role. An empty result is a valid
    /// answer, not an error.
    async fn members_of(&self, role_id: &RoleId) -> Result<Vec<UserId>>;
}

/// In-memory membership table for tests and demos
#[derive(Debug, Default)]
pub struct InMemoryRoleMembership {
    roles: DashMap<RoleId, Vec<UserId>>,
}

impl InMemoryRoleMembership {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant a role to a user
    pub fn assign(&self, user_id: impl Into<UserId>, role_id: impl Into<RoleId>) {
        let user_id = user_id.into();
        let mut members = self.roles.entry(role_id.into()).or_default();
        if !members.contains(&user_id) {
            members.push(user_id);
        }
    }

    /// Take a role away from a user
    pub fn remove(&self, user_id: &UserId, role_id: &RoleId) {
        if let Some(mut members) = self.roles.get_mut(role_id) {
            members.retain(|member| member != user_id);
        }
    }
}

#[async_trait]
impl RoleMembership for InMemoryRoleMembership {
    async fn members_of(&self, role_id: &RoleId) -> Result<Vec<UserId>> {
        Ok(self
            .roles
            .get(role_id)
            .map(|members| members.clone())
            .unwrap_or_default())
    }
}
