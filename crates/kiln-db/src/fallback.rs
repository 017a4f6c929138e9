//! Connectivity-aware store selection.
//!
//! The backend is chosen for every call on its own: when the durable store
//! is considered reachable the call goes there, otherwise it goes to the
//! in-memory store. A single build's writes can therefore be split across
//! backends when connectivity changes mid-run.
//!
//! Reachability is a cached check result. A check runs at most once per
//! `check_interval` and never waits longer than `check_timeout`, so callers
//! holding a build lock are not stalled by an unreachable database. A failed
//! durable call marks the store unreachable at once and is retried in memory.

use crate::memory::MemoryBuildStore;
use async_trait::async_trait;
use kiln_core::build::Build;
use kiln_core::ids::BuildId;
use kiln_core::ports::BuildStore;
use kiln_core::{Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Default time a check result is trusted.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(2);

/// Default bound on a single check.
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy)]
struct Reachability {
    checked_at: Instant,
    reachable: bool,
}

pub struct FallbackBuildStore {
    durable: Option<Arc<dyn BuildStore>>,
    memory: MemoryBuildStore,
    check: Mutex<Option<Reachability>>,
    check_interval: Duration,
    check_timeout: Duration,
    degraded: AtomicBool,
}

impl FallbackBuildStore {
    pub fn new(durable: Arc<dyn BuildStore>) -> Self {
        Self {
            durable: Some(durable),
            ..Self::memory_only()
        }
    }

    /// A store with no durable backend. Every call goes to memory.
    pub fn memory_only() -> Self {
        Self {
            durable: None,
            memory: MemoryBuildStore::new(),
            check: Mutex::new(None),
            check_interval: DEFAULT_CHECK_INTERVAL,
            check_timeout: DEFAULT_CHECK_TIMEOUT,
            degraded: AtomicBool::new(false),
        }
    }

    /// How long a check result is trusted. Zero checks on every call.
    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    /// Upper bound on one check; a check that takes longer counts as
    /// unreachable.
    pub fn with_check_timeout(mut self, timeout: Duration) -> Self {
        self.check_timeout = timeout;
        self
    }

    /// Whether calls are currently routed to memory because the durable
    /// store was found unreachable.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    /// The durable store, if it is considered reachable right now.
    async fn durable(&self) -> Option<&dyn BuildStore> {
        let durable = self.durable.as_deref()?;

        let mut check = self.check.lock().await;
        let cached = (*check)
            .filter(|p| p.checked_at.elapsed() < self.check_interval)
            .map(|p| p.reachable);

        let reachable = match cached {
            Some(reachable) => reachable,
            None => {
                let reachable =
                    match tokio::time::timeout(self.check_timeout, durable.health_check()).await {
                        Ok(Ok(())) => true,
                        Ok(Err(e)) => {
                            debug!(error = %e, "Durable build store check failed");
                            false
                        }
                        Err(_) => {
                            debug!(timeout = ?self.check_timeout, "Durable build store check timed out");
                            false
                        }
                    };
                *check = Some(Reachability {
                    checked_at: Instant::now(),
                    reachable,
                });
                reachable
            }
        };
        drop(check);

        if reachable {
            if self.degraded.swap(false, Ordering::Relaxed) {
                info!("Durable build store reachable again");
            }
            Some(durable)
        } else {
            if !self.degraded.swap(true, Ordering::Relaxed) {
                warn!("Durable build store unreachable, using in-memory store");
            }
            None
        }
    }

    async fn mark_unreachable(&self, error: &Error) {
        *self.check.lock().await = Some(Reachability {
            checked_at: Instant::now(),
            reachable: false,
        });
        if !self.degraded.swap(true, Ordering::Relaxed) {
            warn!(error = %error, "Durable build store call failed, using in-memory store");
        }
    }
}

#[async_trait]
impl BuildStore for FallbackBuildStore {
    async fn create(&self, build: &Build) -> Result<Build> {
        if let Some(durable) = self.durable().await {
            match durable.create(build).await {
                Ok(created) => return Ok(created),
                Err(e) => self.mark_unreachable(&e).await,
            }
        }
        self.memory.create(build).await
    }

    async fn save(&self, build: &Build) -> Result<()> {
        if let Some(durable) = self.durable().await {
            match durable.save(build).await {
                Ok(()) => return Ok(()),
                Err(e) => self.mark_unreachable(&e).await,
            }
        }
        self.memory.save(build).await
    }

    async fn get(&self, id: BuildId) -> Result<Option<Build>> {
        if let Some(durable) = self.durable().await {
            match durable.get(id).await {
                Ok(build) => return Ok(build),
                Err(e) => self.mark_unreachable(&e).await,
            }
        }
        self.memory.get(id).await
    }

    async fn list(&self, limit: u32) -> Result<Vec<Build>> {
        if let Some(durable) = self.durable().await {
            match durable.list(limit).await {
                Ok(builds) => return Ok(builds),
                Err(e) => self.mark_unreachable(&e).await,
            }
        }
        self.memory.list(limit).await
    }

    async fn health_check(&self) -> Result<()> {
        // Memory is always there, so the store as a whole stays usable.
        Ok(())
    }
}
