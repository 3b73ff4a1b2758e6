//! Tenant directory cache
//!
//! In-process projection of `custom hostname → tenant subdomain`, rebuilt
//! wholesale from a [`DirectorySource`]. The snapshot is an `Arc` swapped under
//! a short lock, so readers always see a complete map. A failed refresh keeps
//! the previous snapshot and does not move the staleness clock.

use crate::error::DirectoryError;
use crate::source::DirectorySource;
use inscribe_log::{debug, info, warn};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Default age after which a snapshot is refreshed before use
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(600);

/// Default bound on a single refresh fetch
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

pub type DirectorySnapshot = HashMap<String, String>;

struct CacheState {
    snapshot: Arc<DirectorySnapshot>,
    refreshed_at: Option<Instant>,
}

pub struct DirectoryCache {
    source: Arc<dyn DirectorySource>,
    state: RwLock<CacheState>,
    max_age: Duration,
    fetch_timeout: Duration,
}

impl DirectoryCache {
    pub fn new(source: Arc<dyn DirectorySource>) -> Self {
        Self {
            source,
            state: RwLock::new(CacheState {
                snapshot: Arc::new(HashMap::new()),
                refreshed_at: None,
            }),
            max_age: DEFAULT_REFRESH_INTERVAL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Fetch the full mapping and replace the snapshot.
    ///
    /// Returns the new entry count. On error the current snapshot stays in
    /// place and the error is returned to the caller.
    pub async fn refresh(&self) -> Result<usize, DirectoryError> {
        let fetched = tokio::time::timeout(self.fetch_timeout, self.source.fetch_mappings())
            .await
            .map_err(|_| DirectoryError::Timeout)
            .and_then(|r| r);

        let mappings = match fetched {
            Ok(mappings) => mappings,
            Err(err) => {
                warn!(error = %err, "Directory refresh failed, keeping stale snapshot");
                return Err(err);
            }
        };

        let snapshot: DirectorySnapshot = mappings
            .into_iter()
            .map(|(host, tenant)| (host.trim_end_matches('.').to_ascii_lowercase(), tenant))
            .collect();
        let count = snapshot.len();

        {
            let mut state = self.state.write();
            state.snapshot = Arc::new(snapshot);
            state.refreshed_at = Some(Instant::now());
        }

        debug!(entries = count, "Directory snapshot replaced");
        Ok(count)
    }

    /// Look `host` up in the current snapshot without refreshing
    pub fn lookup(&self, host: &str) -> Option<String> {
        self.snapshot().get(host).cloned()
    }

    /// Request-path lookup: refresh first when the snapshot is stale.
    /// Refresh failures are swallowed; the stale snapshot answers.
    pub async fn resolve(&self, host: &str) -> Option<String> {
        if self.is_stale() {
            let _ = self.refresh().await;
        }
        self.lookup(host)
    }

    /// No successful refresh yet, or the last one is older than `max_age`
    pub fn is_stale(&self) -> bool {
        match self.state.read().refreshed_at {
            Some(at) => at.elapsed() >= self.max_age,
            None => true,
        }
    }

    pub fn snapshot(&self) -> Arc<DirectorySnapshot> {
        Arc::clone(&self.state.read().snapshot)
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Time of the last successful refresh
    pub fn last_refreshed(&self) -> Option<Instant> {
        self.state.read().refreshed_at
    }

    /// Refresh on a fixed interval until the cache is dropped
    pub fn spawn_refresher(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        info!(interval_secs = interval.as_secs(), "Starting directory refresher");

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(cache) = weak.upgrade() else {
                    debug!("Directory cache dropped, stopping refresher");
                    break;
                };
                let _ = cache.refresh().await;
            }
        })
    }
}
