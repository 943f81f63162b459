//! Invalidation Listener
//!
//! Subscribes to committed authorization changes and turns each one into
//! per-user cache evictions:
//!
//! ```text
//!   event ──▶ resolve affected users ──▶ evict each ──▶ report
//! ```
//!
//! Processing happens off the committing task on the worker pool. Each
//! user's eviction is independent; one failure never stops the rest of the
//! fan-out, and nothing here ever propagates back to the operation that
//! produced the event.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, instrument, warn};

use super::membership::RoleMembership;
use super::pool::{InvalidationPool, InvalidationPoolConfig, PoolStats};
use super::report::{EvictionReport, LoggingReportSink, ReportSink};
use crate::bus::EventSubscriber;
use crate::cache::{CacheRegistry, USER_PERMISSIONS};
use crate::domain::events::InvalidationEvent;
use crate::domain::types::UserId;
use crate::error::Result;

/// Listener configuration
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Region holding per-user entries keyed by user ID
    pub region: String,
    /// Worker pool settings
    pub pool: InvalidationPoolConfig,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            region: USER_PERMISSIONS.to_string(),
            pool: InvalidationPoolConfig::default(),
        }
    }
}

/// Listener statistics snapshot
#[derive(Debug, Clone)]
pub struct ListenerStats {
    pub events_received: u64,
    pub resolutions_failed: u64,
    pub evictions_succeeded: u64,
    pub evictions_failed: u64,
    pub skipped_unmaterialized: u64,
    pub pool: PoolStats,
}

/// State shared between the listener and the pool workers
struct ListenerCore {
    region: String,
    registry: Arc<CacheRegistry>,
    membership: Arc<dyn RoleMembership>,
    sink: Arc<dyn ReportSink>,
    events_received: AtomicU64,
    resolutions_failed: AtomicU64,
    evictions_succeeded: AtomicU64,
    evictions_failed: AtomicU64,
    skipped_unmaterialized: AtomicU64,
}

impl ListenerCore {
    #[instrument(
        skip(self, event),
        fields(event_type = event.event_type(), event_id = %event.event_id())
    )]
    async fn process(self: Arc<Self>, event: InvalidationEvent) {
        info!(role = %event.role_id(), "processing authorization change");

        let affected = match self.resolve(&event).await {
            Ok(affected) => affected,
            Err(e) => {
                self.resolutions_failed.fetch_add(1, Ordering::Relaxed);
                error!(
                    role = %event.role_id(),
                    error = %e,
                    "failed to resolve affected users, cached entries expire by TTL"
                );
                return;
            }
        };

        if affected.is_empty() {
            debug!(role = %event.role_id(), "no users hold the role, nothing to evict");
            return;
        }

        // A region nobody has read from holds no entries to evict
        let Some(region) = self.registry.peek(&self.region) else {
            self.skipped_unmaterialized.fetch_add(1, Ordering::Relaxed);
            warn!(region = %self.region, "cache region not materialized, skipping invalidation");
            return;
        };

        let mut success_count = 0usize;
        let mut failure_count = 0usize;
        for user in &affected {
            match region.evict(user.as_str()).await {
                Ok(()) => {
                    success_count += 1;
                    self.evictions_succeeded.fetch_add(1, Ordering::Relaxed);
                    debug!(user = %user, "evicted cached permissions");
                }
                Err(e) => {
                    failure_count += 1;
                    self.evictions_failed.fetch_add(1, Ordering::Relaxed);
                    warn!(user = %user, error = %e, "failed to evict cached permissions");
                }
            }
        }

        self.sink
            .record(EvictionReport::new(event.describe(), success_count, failure_count));
    }

    /// Affected users: the role's current members for a role-wide change,
    /// or exactly the named user for a user-scoped one
    async fn resolve(&self, event: &InvalidationEvent) -> Result<Vec<UserId>> {
        match event {
            InvalidationEvent::RolePermissionChanged { role_id, .. } => {
                self.membership.members_of(role_id).await
            }
            InvalidationEvent::UserRoleAssigned { user_id, .. }
            | InvalidationEvent::UserRoleRemoved { user_id, .. } => Ok(vec![user_id.clone()]),
        }
    }
}

/// Bridges the event bus to eviction fan-out on the worker pool
pub struct InvalidationListener {
    core: Arc<ListenerCore>,
    pool: InvalidationPool,
}

impl InvalidationListener {
    /// Listener with default config, reporting through the logging sink
    pub fn new(
        registry: Arc<CacheRegistry>,
        membership: Arc<dyn RoleMembership>,
    ) -> Result<Self> {
        Self::with_config(
            ListenerConfig::default(),
            registry,
            membership,
            Arc::new(LoggingReportSink::new()),
        )
    }

    /// Listener with explicit config and report sink. Must be called from
    /// within a Tokio runtime; the pool workers are spawned here.
    pub fn with_config(
        config: ListenerConfig,
        registry: Arc<CacheRegistry>,
        membership: Arc<dyn RoleMembership>,
        sink: Arc<dyn ReportSink>,
    ) -> Result<Self> {
        let core = Arc::new(ListenerCore {
            region: config.region,
            registry,
            membership,
            sink,
            events_received: AtomicU64::new(0),
            resolutions_failed: AtomicU64::new(0),
            evictions_succeeded: AtomicU64::new(0),
            evictions_failed: AtomicU64::new(0),
            skipped_unmaterialized: AtomicU64::new(0),
        });

        let worker_core = Arc::clone(&core);
        let pool = InvalidationPool::new(config.pool, move |event| {
            Arc::clone(&worker_core).process(event)
        })?;

        Ok(Self { core, pool })
    }

    pub fn stats(&self) -> ListenerStats {
        ListenerStats {
            events_received: self.core.events_received.load(Ordering::Relaxed),
            resolutions_failed: self.core.resolutions_failed.load(Ordering::Relaxed),
            evictions_succeeded: self.core.evictions_succeeded.load(Ordering::Relaxed),
            evictions_failed: self.core.evictions_failed.load(Ordering::Relaxed),
            skipped_unmaterialized: self.core.skipped_unmaterialized.load(Ordering::Relaxed),
            pool: self.pool.stats(),
        }
    }

    /// Drain in-flight work and stop the pool. Events delivered afterwards
    /// are processed inline on the delivering task.
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }
}

#[async_trait]
impl EventSubscriber for InvalidationListener {
    async fn on_event(&self, event: &InvalidationEvent) {
        self.core.events_received.fetch_add(1, Ordering::Relaxed);
        self.pool.dispatch(event.clone()).await;
    }
}
