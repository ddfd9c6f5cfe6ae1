//! Three interchangeable URL-queue disciplines behind one tagged-variant
//! interface (spec §9 design note: "strategies are tagged variants chosen
//! at startup by config").

use std::collections::{BTreeSet, HashMap, VecDeque};

use parking_lot::Mutex;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::warn;

use crate::core::error::{Error, Result};

/// A leader URL plus the URLs extracted from its document.
#[derive(Debug, Clone)]
pub struct UrlGroup {
    pub leader: String,
    pub members: Vec<String>,
}

/// FIFO queue. `offer` appends members in insertion order; `poll` pops the
/// head.
pub struct BfsScheduler {
    queue: Mutex<VecDeque<String>>,
}

impl BfsScheduler {
    pub fn new() -> Self {
        BfsScheduler { queue: Mutex::new(VecDeque::new()) }
    }

    pub fn offer(&self, group: UrlGroup) {
        self.queue.lock().extend(group.members);
    }

    pub fn poll(&self) -> Option<String> {
        self.queue.lock().pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    pub fn add_seed_urls(&self, seeds: Vec<String>) {
        self.queue.lock().extend(seeds);
    }
}

impl Default for BfsScheduler {
    fn default() -> Self {
        BfsScheduler::new()
    }
}

/// Online Page Importance Computation: a priority queue over `url -> cash`.
/// `poll` returns the smallest-cash url unless `maximize_cash` is set, which
/// selects the largest — the source orders by smallest (§9 Open Question:
/// canonical OPIC maximizes; kept explicit rather than silently "corrected").
pub struct OpicScheduler {
    maximize_cash: bool,
    state: Mutex<OpicState>,
}

#[derive(Default)]
struct OpicState {
    cash: HashMap<String, f32>,
    // sort key is derived from `cash`'s bit pattern, which orders correctly
    // for non-negative floats; ties broken by url so entries never collide.
    order: BTreeSet<(u32, String)>,
}

impl OpicScheduler {
    pub fn new(maximize_cash: bool) -> Self {
        OpicScheduler { maximize_cash, state: Mutex::new(OpicState::default()) }
    }

    fn sort_key(&self, cash: f32) -> u32 {
        let bits = cash.max(0.0).to_bits();
        if self.maximize_cash {
            u32::MAX - bits
        } else {
            bits
        }
    }

    fn reinsert(&self, state: &mut OpicState, url: &str, cash: f32) {
        if let Some(old) = state.cash.get(url).copied() {
            state.order.remove(&(self.sort_key(old), url.to_string()));
        }
        state.cash.insert(url.to_string(), cash);
        state.order.insert((self.sort_key(cash), url.to_string()));
    }

    pub fn offer(&self, group: UrlGroup) {
        if group.members.is_empty() {
            return;
        }
        let mut state = self.state.lock();
        let leader_cash = state.cash.remove(&group.leader).unwrap_or(0.0);
        state.order.remove(&(self.sort_key(leader_cash), group.leader.clone()));

        let share = leader_cash / group.members.len() as f32;
        for member in &group.members {
            let current = state.cash.get(member).copied().unwrap_or(1.0);
            let updated = current + share;
            self.reinsert(&mut state, member, updated);
        }
    }

    pub fn poll(&self) -> Option<String> {
        let mut state = self.state.lock();
        let entry = state.order.iter().next().cloned()?;
        state.order.remove(&entry);
        state.cash.remove(&entry.1);
        Some(entry.1)
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().order.is_empty()
    }

    pub fn add_seed_urls(&self, seeds: Vec<String>) {
        let mut state = self.state.lock();
        for seed in seeds {
            self.reinsert(&mut state, &seed, 1.0);
        }
    }
}

/// Shared Redis list `dist_url_queue`. A local dequeue buffer is refilled in
/// batches of up to 100 via pipelined `LPOP`.
pub struct DistributedScheduler {
    conn: ConnectionManager,
    key: String,
    buffer: Mutex<VecDeque<String>>,
}

const REFILL_BATCH: usize = 100;

impl DistributedScheduler {
    pub fn new(conn: ConnectionManager, key: impl Into<String>) -> Self {
        DistributedScheduler { conn, key: key.into(), buffer: Mutex::new(VecDeque::new()) }
    }

    async fn refill(&self) -> Result<usize> {
        let mut pipe = redis::pipe();
        for _ in 0..REFILL_BATCH {
            pipe.cmd("LPOP").arg(&self.key);
        }
        let mut conn = self.conn.clone();
        let results: Vec<Option<String>> = pipe.query_async(&mut conn).await.map_err(Error::from)?;

        let mut buffer = self.buffer.lock();
        let mut filled = 0usize;
        for item in results.into_iter().flatten() {
            buffer.push_back(item);
            filled += 1;
        }
        Ok(filled)
    }

    pub async fn poll(&self) -> Option<String> {
        if let Some(url) = self.buffer.lock().pop_front() {
            return Some(url);
        }
        match self.refill().await {
            Ok(0) | Err(_) => None,
            Ok(_) => self.buffer.lock().pop_front(),
        }
    }

    pub async fn offer(&self, group: UrlGroup) -> Result<()> {
        if group.members.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let _: () = conn.rpush(&self.key, &group.members).await.map_err(Error::from)?;
        Ok(())
    }

    pub async fn add_seed_urls(&self, seeds: Vec<String>) -> Result<()> {
        if seeds.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let _: () = conn.rpush(&self.key, &seeds).await.map_err(Error::from)?;
        Ok(())
    }

    /// Local buffer and one refill attempt both empty.
    pub async fn is_empty(&self) -> bool {
        if !self.buffer.lock().is_empty() {
            return false;
        }
        matches!(self.refill().await, Ok(0) | Err(_))
    }
}

/// Tagged-variant scheduler selected at startup by config.
pub enum Scheduler {
    Bfs(BfsScheduler),
    Opic(OpicScheduler),
    Distributed(DistributedScheduler),
}

impl Scheduler {
    pub async fn offer(&self, group: UrlGroup) {
        match self {
            Scheduler::Bfs(s) => s.offer(group),
            Scheduler::Opic(s) => s.offer(group),
            Scheduler::Distributed(s) => {
                if let Err(err) = s.offer(group).await {
                    warn!(error = %err, "distributed scheduler offer failed");
                }
            }
        }
    }

    pub async fn poll(&self) -> Option<String> {
        match self {
            Scheduler::Bfs(s) => s.poll(),
            Scheduler::Opic(s) => s.poll(),
            Scheduler::Distributed(s) => s.poll().await,
        }
    }

    pub async fn is_empty(&self) -> bool {
        match self {
            Scheduler::Bfs(s) => s.is_empty(),
            Scheduler::Opic(s) => s.is_empty(),
            Scheduler::Distributed(s) => s.is_empty().await,
        }
    }

    pub async fn add_seed_urls(&self, seeds: Vec<String>) {
        match self {
            Scheduler::Bfs(s) => s.add_seed_urls(seeds),
            Scheduler::Opic(s) => s.add_seed_urls(seeds),
            Scheduler::Distributed(s) => {
                if let Err(err) = s.add_seed_urls(seeds).await {
                    warn!(error = %err, "distributed scheduler add_seed_urls failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bfs_polls_in_fifo_order() {
        let scheduler = BfsScheduler::new();
        scheduler.offer(UrlGroup { leader: "l".to_string(), members: vec!["a".to_string(), "b".to_string()] });
        assert_eq!(scheduler.poll(), Some("a".to_string()));
        assert_eq!(scheduler.poll(), Some("b".to_string()));
        assert!(scheduler.is_empty());
    }

    #[test]
    fn opic_seed_cash_starts_at_one_and_poll_drains_smallest_by_default() {
        let scheduler = OpicScheduler::new(false);
        scheduler.add_seed_urls(vec!["a".to_string()]);
        scheduler.offer(UrlGroup { leader: "a".to_string(), members: vec!["b".to_string(), "c".to_string()] });
        // a's cash (1.0) is split 0.5/0.5 onto b and c, each starting at 1.0:
        // both end at 1.5, a is removed. With a tie, lexicographic order wins.
        let first = scheduler.poll();
        assert!(first == Some("b".to_string()) || first == Some("c".to_string()));
        assert!(!scheduler.is_empty());
        scheduler.poll();
        assert!(scheduler.is_empty());
    }

    #[test]
    fn opic_maximize_cash_prefers_the_largest_value() {
        let scheduler = OpicScheduler::new(true);
        scheduler.add_seed_urls(vec!["a".to_string(), "b".to_string()]);
        scheduler.offer(UrlGroup { leader: "a".to_string(), members: vec!["a".to_string()] });
        assert_eq!(scheduler.poll(), Some("a".to_string()));
        assert_eq!(scheduler.poll(), Some("b".to_string()));
    }

    #[test]
    fn opic_minimize_cash_prefers_the_smallest_value() {
        let scheduler = OpicScheduler::new(false);
        scheduler.add_seed_urls(vec!["a".to_string(), "b".to_string()]);
        scheduler.offer(UrlGroup { leader: "a".to_string(), members: vec!["a".to_string()] });
        assert_eq!(scheduler.poll(), Some("b".to_string()));
    }
}
