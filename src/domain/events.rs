//! Authorization Change Events
//!
//! Immutable records of authorization mutations that invalidate cached
//! permission sets. Events are staged while the producing transaction is
//! open and only reach subscribers after it commits, so a consumer never
//! observes a change that was later rolled back.
//!
//! # Example
//!
//! ```ignore
//! let mut staged = bus.begin();
//! staged.stage(InvalidationEvent::role_permission_changed("admin"));
//! // ... commit the surrounding transaction ...
//! staged.commit().await;
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::{RoleId, UserId};

/// Authorization change that requires cached permission sets to be evicted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InvalidationEvent {
    /// The permissions attached to a role changed; every user holding the
    /// role is affected.
    RolePermissionChanged {
        event_id: Uuid,
        role_id: RoleId,
        timestamp: DateTime<Utc>,
    },

    /// A user was granted a role; only that user is affected.
    UserRoleAssigned {
        event_id: Uuid,
        user_id: UserId,
        role_id: RoleId,
        timestamp: DateTime<Utc>,
    },

    /// A role was taken away from a user; only that user is affected.
    UserRoleRemoved {
        event_id: Uuid,
        user_id: UserId,
        role_id: RoleId,
        timestamp: DateTime<Utc>,
    },
}

impl InvalidationEvent {
    /// Get the unique ID assigned when the event was built
    pub fn event_id(&self) -> Uuid {
        match self {
            InvalidationEvent::RolePermissionChanged { event_id, .. }
            | InvalidationEvent::UserRoleAssigned { event_id, .. }
            | InvalidationEvent::UserRoleRemoved { event_id, .. } => *event_id,
        }
    }

    /// Get the timestamp of the event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            InvalidationEvent::RolePermissionChanged { timestamp, .. }
            | InvalidationEvent::UserRoleAssigned { timestamp, .. }
            | InvalidationEvent::UserRoleRemoved { timestamp, .. } => *timestamp,
        }
    }

    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            InvalidationEvent::RolePermissionChanged { .. } => "RolePermissionChanged",
            InvalidationEvent::UserRoleAssigned { .. } => "UserRoleAssigned",
            InvalidationEvent::UserRoleRemoved { .. } => "UserRoleRemoved",
        }
    }

    /// Get the role involved in the change
    pub fn role_id(&self) -> &RoleId {
        match self {
            InvalidationEvent::RolePermissionChanged { role_id, .. }
            | InvalidationEvent::UserRoleAssigned { role_id, .. }
            | InvalidationEvent::UserRoleRemoved { role_id, .. } => role_id,
        }
    }

    /// Get the directly named user, if the change targets a single user
    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            InvalidationEvent::RolePermissionChanged { .. } => None,
            InvalidationEvent::UserRoleAssigned { user_id, .. }
            | InvalidationEvent::UserRoleRemoved { user_id, .. } => Some(user_id),
        }
    }

    /// Human-readable description used as the context of eviction reports
    pub fn describe(&self) -> String {
        match self {
            InvalidationEvent::RolePermissionChanged { role_id, .. } => {
                format!("RolePermissionChanged role={}", role_id)
            }
            InvalidationEvent::UserRoleAssigned {
                user_id, role_id, ..
            } => {
                format!("UserRoleAssigned user={} role={}", user_id, role_id)
            }
            InvalidationEvent::UserRoleRemoved {
                user_id, role_id, ..
            } => {
                format!("UserRoleRemoved user={} role={}", user_id, role_id)
            }
        }
    }
}

// =============================================================================
// Event Builders
// =============================================================================

impl InvalidationEvent {
    /// Create a RolePermissionChanged event
    pub fn role_permission_changed(role_id: impl Into<RoleId>) -> Self {
        InvalidationEvent::RolePermissionChanged {
            event_id: Uuid::new_v4(),
            role_id: role_id.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a UserRoleAssigned event
    pub fn user_role_assigned(user_id: impl Into<UserId>, role_id: impl Into<RoleId>) -> Self {
        InvalidationEvent::UserRoleAssigned {
            event_id: Uuid::new_v4(),
            user_id: user_id.into(),
            role_id: role_id.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a UserRoleRemoved event
    pub fn user_role_removed(user_id: impl Into<UserId>, role_id: impl Into<RoleId>) -> Self {
        InvalidationEvent::UserRoleRemoved {
            event_id: Uuid::new_v4(),
            user_id: user_id.into(),
            role_id: role_id.into(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_builders_fill_metadata() {
        let before = Utc::now();
        let event = InvalidationEvent::role_permission_changed("admin");
        let after = Utc::now();

        assert_eq!(event.event_type(), "RolePermissionChanged");
        assert_eq!(event.role_id(), &RoleId::new("admin"));
        assert!(event.user_id().is_none());
        assert!(event.timestamp() >= before && event.timestamp() <= after);
    }

    #[test]
    fn test_user_scoped_events_name_the_user() {
        let assigned = InvalidationEvent::user_role_assigned("u1", "editor");
        assert_eq!(assigned.user_id(), Some(&UserId::new("u1")));
        assert_eq!(assigned.role_id(), &RoleId::new("editor"));

        let removed = InvalidationEvent::user_role_removed("u1", "editor");
        assert_eq!(removed.event_type(), "UserRoleRemoved");
        assert_eq!(removed.user_id(), Some(&UserId::new("u1")));
    }

    #[test]
    fn test_event_ids_are_unique() {
        let a = InvalidationEvent::role_permission_changed("admin");
        let b = InvalidationEvent::role_permission_changed("admin");
        assert_ne!(a.event_id(), b.event_id());
    }

    #[test]
    fn test_event_serialization() {
        let event = InvalidationEvent::user_role_assigned("u1", "admin");
        let json = serde_json::to_string(&event).unwrap();

        assert!(json.contains("\"type\":\"UserRoleAssigned\""));
        assert!(json.contains("\"user_id\":\"u1\""));

        let restored: InvalidationEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.event_id(), event.event_id());
        assert_eq!(restored.event_type(), event.event_type());
    }

    #[test]
    fn test_describe_names_the_subjects() {
        let event = InvalidationEvent::user_role_removed("u7", "viewer");
        assert_eq!(event.describe(), "UserRoleRemoved user=u7 role=viewer");

        let event = InvalidationEvent::role_permission_changed("admin");
        assert_eq!(event.describe(), "RolePermissionChanged role=admin");
    }
}
