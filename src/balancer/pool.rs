//! Refresh-on-expiry proxy pool cache
//!
//! The list is replaced wholesale on every successful refresh and swapped
//! atomically by reference, so readers always observe a complete list. The
//! refresh gate makes the refresh single-flight: concurrent callers are
//! served the stale list when one exists, or suspend on the gate until the
//! in-flight refresh finishes, instead of triggering a second discovery
//! call.

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::discovery::ProxySource;
use crate::models::ProxyAddress;

pub struct PoolCache {
    source: Arc<dyn ProxySource>,
    current: ArcSwap<Vec<ProxyAddress>>,
    last_refresh: RwLock<Option<Instant>>,
    refresh_gate: Mutex<()>,
    expiry: Duration,
}

impl PoolCache {
    pub fn new(source: Arc<dyn ProxySource>, expiry: Duration) -> Self {
        Self {
            source,
            current: ArcSwap::from_pointee(Vec::new()),
            last_refresh: RwLock::new(None),
            refresh_gate: Mutex::new(()),
            expiry,
        }
    }

    /// Current list without triggering a refresh
    pub fn current(&self) -> Arc<Vec<ProxyAddress>> {
        self.current.load_full()
    }

    /// Whether the next `get` would attempt a refresh
    pub fn is_expired(&self) -> bool {
        if self.current.load().is_empty() {
            return true;
        }
        match *self.last_refresh.read() {
            None => true,
            Some(at) => at.elapsed() > self.expiry,
        }
    }

    /// Current pool, refreshing first when stale.
    ///
    /// Never errors: a failed discovery call is logged and the previous
    /// list (possibly empty) keeps serving. Empty results are returned
    /// as-is; selection downstream turns them into `EmptyPool`.
    pub async fn get(&self) -> Arc<Vec<ProxyAddress>> {
        if !self.is_expired() {
            return self.current.load_full();
        }

        match self.refresh_gate.try_lock() {
            Ok(_guard) => {
                // re-check: a refresh may have completed while we raced for
                // the gate
                if self.is_expired() {
                    self.refresh().await;
                }
            }
            Err(_) => {
                let stale = self.current.load_full();
                if !stale.is_empty() {
                    // serve stale data rather than blocking behind a slow
                    // discovery call
                    return stale;
                }
                // nothing to serve; wait out the in-flight refresh
                let _guard = self.refresh_gate.lock().await;
            }
        }

        self.current.load_full()
    }

    /// Run one discovery call and replace the list wholesale.
    ///
    /// Caller must hold the refresh gate. The refresh timestamp advances on
    /// failure too, so a flapping source is retried at the normal cadence
    /// instead of on every request (an empty pool still short-circuits
    /// `is_expired` and retries immediately).
    async fn refresh(&self) {
        debug!("refreshing proxy pool");

        match self.source.fetch().await {
            Ok(addresses) => {
                info!(count = addresses.len(), "proxy pool refreshed");
                self.current.store(Arc::new(addresses));
            }
            Err(e) => {
                error!("proxy discovery failed: {}", e);
            }
        }

        *self.last_refresh.write() = Some(Instant::now());
    }
}
