//! Domain Value Objects
//!
//! Identifier newtypes and the permission-set aggregate cached per user.
//! Identifiers are thin wrappers around strings so callers keep whatever
//! ID scheme their directory uses; the types exist to stop a role ID from
//! being passed where a user ID belongs.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Identifiers
// =============================================================================

/// Unique identifier for a user
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unique identifier for a role
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(pub String);

impl RoleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RoleId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RoleId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// =============================================================================
// Permission Set
// =============================================================================

/// Resolved permissions for one user, as computed from their role grants.
///
/// This is the value cached under the user's ID in the permissions region.
/// The set is ordered so serialized snapshots of the same grants compare
/// equal byte-for-byte.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionSet {
    /// User these permissions belong to
    pub user_id: UserId,
    /// Granted permission strings, e.g. "project:create"
    pub permissions: BTreeSet<String>,
    /// When this set was computed from the role store
    pub computed_at: DateTime<Utc>,
}

impl PermissionSet {
    pub fn new<I, S>(user_id: impl Into<UserId>, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            user_id: user_id.into(),
            permissions: permissions.into_iter().map(Into::into).collect(),
            computed_at: Utc::now(),
        }
    }

    /// Check whether a specific permission was granted
    pub fn contains(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_display_and_conversions() {
        let id = UserId::new("user-42");
        assert_eq!(id.as_str(), "user-42");
        assert_eq!(format!("{}", id), "user-42");
        assert_eq!(UserId::from("user-42"), id);
        assert_eq!(UserId::from("user-42".to_string()), id);
    }

    #[test]
    fn test_role_id_equality_and_hash() {
        use std::collections::HashSet;

        let a = RoleId::new("admin");
        let b = RoleId::from("admin");
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_permission_set_contains() {
        let set = PermissionSet::new("user-1", ["project:create", "project:delete"]);
        assert_eq!(set.user_id, UserId::new("user-1"));
        assert_eq!(set.len(), 2);
        assert!(set.contains("project:create"));
        assert!(!set.contains("billing:read"));
    }

    #[test]
    fn test_permission_set_deduplicates() {
        let set = PermissionSet::new("user-1", ["a", "a", "b"]);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_permission_set_serialization_round_trip() {
        let set = PermissionSet::new("user-1", ["project:create"]);
        let json = serde_json::to_string(&set).unwrap();
        let restored: PermissionSet = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, set);
    }

    #[test]
    fn test_identifier_serializes_as_plain_string() {
        let json = serde_json::to_string(&UserId::new("u1")).unwrap();
        assert_eq!(json, "\"u1\"");
    }
}
