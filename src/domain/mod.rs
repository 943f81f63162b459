//! Domain Layer
//!
//! Core vocabulary of the entitlement cache, free of tier and transport
//! concerns.
//!
//! - **Types** (`types.rs`) - Identifier newtypes and the cached permission set
//! - **Events** (`events.rs`) - Authorization changes that drive invalidation

pub mod events;
pub mod types;

// Re-export commonly used types
pub use events::InvalidationEvent;
pub use types::{PermissionSet, RoleId, UserId};
