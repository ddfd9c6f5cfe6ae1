//! Heartbeat-based liveness registry backed by a Redis hash: field = node
//! address, value = unix-second timestamp. A node refreshes its own entry
//! every 30s; any reader treats an entry whose timestamp is within 40s of
//! now as live. Both live and dead sets are retained so an admin monitor
//! can display dead nodes (§4.11).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use arc_swap::ArcSwap;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::task::JoinHandle;
use tracing::{error, warn};

use crate::core::error::{Error, Result};

pub const INDEXER_HASH: &str = "indexer.addr";
pub const CRAWLER_HASH: &str = "crawler.addr";

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const LIVENESS_THRESHOLD_SECS: u64 = 40;

fn now_unix() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

/// Live and dead addresses as of the last refresh.
#[derive(Debug, Clone, Default)]
pub struct AddrSnapshot {
    pub live: Vec<String>,
    pub dead: Vec<String>,
}

/// Self-registration plus address-list reads against one registry hash key.
pub struct Registry {
    conn: ConnectionManager,
    hash_key: &'static str,
}

impl Registry {
    pub fn new(conn: ConnectionManager, hash_key: &'static str) -> Self {
        Registry { conn, hash_key }
    }

    pub async fn heartbeat_once(&self, addr: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.hset(self.hash_key, addr, now_unix().to_string()).await.map_err(Error::from)?;
        Ok(())
    }

    /// Removes this node's own entry; called on clean shutdown.
    pub async fn unregister(&self, addr: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.hdel(self.hash_key, addr).await.map_err(Error::from)?;
        Ok(())
    }

    /// Spawns a task that heartbeats every 30s until the handle is aborted.
    pub fn spawn_heartbeat(self: Arc<Self>, addr: String) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                if let Err(err) = self.heartbeat_once(&addr).await {
                    error!(error = %err, addr = %addr, "registry heartbeat failed");
                }
                tokio::time::sleep(HEARTBEAT_INTERVAL).await;
            }
        })
    }

    /// Reads the full hash and splits entries into live/dead by the 40s
    /// threshold.
    pub async fn snapshot(&self) -> Result<AddrSnapshot> {
        let mut conn = self.conn.clone();
        let entries: HashMap<String, String> = conn.hgetall(self.hash_key).await.map_err(Error::from)?;

        let now = now_unix();
        let mut snapshot = AddrSnapshot::default();
        for (addr, ts) in entries {
            let Ok(ts) = ts.parse::<u64>() else { continue };
            if now.saturating_sub(ts) < LIVENESS_THRESHOLD_SECS {
                snapshot.live.push(addr);
            } else {
                snapshot.dead.push(addr);
            }
        }
        Ok(snapshot)
    }
}

/// Lock-free, periodically refreshed view of one registry hash's live/dead
/// split. Crawler and gateway fan-out code read this without ever taking a
/// lock (§5: "stored in an atomic pointer-sized slot").
pub struct AddrList {
    current: ArcSwap<AddrSnapshot>,
}

impl AddrList {
    pub fn new() -> Self {
        AddrList { current: ArcSwap::from_pointee(AddrSnapshot::default()) }
    }

    pub fn load(&self) -> Arc<AddrSnapshot> {
        self.current.load_full()
    }

    fn store(&self, snapshot: AddrSnapshot) {
        self.current.store(Arc::new(snapshot));
    }

    /// Spawns a task refreshing from `registry` every 30s. A failed refresh
    /// logs and keeps the previous snapshot (spec §7: "address list retains
    /// last known value").
    pub fn spawn_refresh(self: Arc<Self>, registry: Arc<Registry>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match registry.snapshot().await {
                    Ok(snapshot) => self.store(snapshot),
                    Err(err) => warn!(error = %err, "registry refresh failed, keeping last known address list"),
                }
                tokio::time::sleep(HEARTBEAT_INTERVAL).await;
            }
        })
    }
}

impl Default for AddrList {
    fn default() -> Self {
        AddrList::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_addr_list_has_no_live_or_dead_entries() {
        let list = AddrList::new();
        let snapshot = list.load();
        assert!(snapshot.live.is_empty());
        assert!(snapshot.dead.is_empty());
    }

    #[test]
    fn store_replaces_the_readable_snapshot() {
        let list = AddrList::new();
        list.store(AddrSnapshot { live: vec!["127.0.0.1:9000".to_string()], dead: vec![] });
        let snapshot = list.load();
        assert_eq!(snapshot.live, vec!["127.0.0.1:9000".to_string()]);
    }
}
