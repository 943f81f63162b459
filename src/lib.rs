//! GrantCache - Two-Tier Entitlement Cache
//!
//! Caching layer for authorization-sensitive reads, pairing a bounded
//! in-process tier with a shared remote tier and keeping both honest
//! through event-driven invalidation. Built for the permission-check
//! hot path: most lookups are memory reads, authorization changes take
//! effect across the fleet without waiting for TTLs, and a change that
//! rolls back never evicts anything.
//!
//! # Architecture
//!
//! ```text
//! read path:   local tier ──miss──▶ remote tier ──miss──▶ loader
//!                  ▲ backfill          ▲ write-through
//!
//! write path:  role mutation ──commit──▶ EventBus ──▶ InvalidationListener
//!                                           │               │
//!                                       peer relay     evict affected
//!                                      (transport)     users, report
//! ```
//!
//! # Modules
//!
//! - [`bus`] - After-commit event delivery, staging, and the peer relay
//! - [`cache`] - Tiers, regions, and the registry that owns them
//! - [`domain`] - Identifier newtypes, permission sets, and events
//! - [`error`] - Error types
//! - [`invalidation`] - Listener, worker pool, and eviction reporting
//!
//! # Example
//!
//! ```ignore
//! let registry = Arc::new(CacheRegistry::in_memory());
//! let bus = Arc::new(EventBus::new());
//! let listener = Arc::new(InvalidationListener::new(
//!     registry.clone(),
//!     membership,
//! )?);
//! bus.subscribe(listener.clone());
//!
//! let perms = registry.region(USER_PERMISSIONS);
//! let value = perms.get_with("user-42", || load_permissions("user-42")).await?;
//! ```

pub mod bus;
pub mod cache;
pub mod domain;
pub mod error;
pub mod invalidation;

// Re-export commonly used types
pub use bus::{EventBus, EventEnvelope, EventSubscriber, InvalidationTransport, StagedEvents};
pub use cache::{CacheRegistry, RegistryConfig, TieredCache, USER_PERMISSIONS};
pub use domain::{InvalidationEvent, PermissionSet, RoleId, UserId};
pub use error::{Error, Result};
pub use invalidation::{EvictionReport, InvalidationListener, ReportSink, RoleMembership};
