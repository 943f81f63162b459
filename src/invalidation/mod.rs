//! Event-Driven Cache Invalidation
//!
//! Keeps cached permission sets honest after authorization writes:
//!
//! ```text
//! committed event
//!      │
//!      ▼
//! InvalidationListener ──▶ InvalidationPool (bounded queue + workers)
//!      │                        │
//!      │ resolve via            ▼
//!      │ RoleMembership    evict each affected user (both tiers)
//!      │                        │
//!      ▼                        ▼
//!  affected users         EvictionReport ──▶ ReportSink
//! ```
//!
//! Everything here is best-effort by contract: a failed eviction leaves a
//! stale entry to expire by TTL, and no failure propagates back to the
//! operation that committed the change.

mod listener;
mod membership;
mod pool;
mod report;

pub use listener::{InvalidationListener, ListenerConfig, ListenerStats};
pub use membership::{InMemoryRoleMembership, RoleMembership};
pub use pool::{InvalidationPool, InvalidationPoolConfig, PoolStats};
pub use report::{CollectingReportSink, EvictionReport, LoggingReportSink, ReportSink};
