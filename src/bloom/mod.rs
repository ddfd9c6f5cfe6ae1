pub mod local;
pub mod distributed;

use redis::aio::ConnectionManager;
use tokio::sync::Mutex as AsyncMutex;

use local::LocalBloomFilter;
use distributed::DistributedBloomFilter;

/// Hash seeds shared by the local and distributed variants.
pub const SEEDS: [u64; 5] = [31, 37, 61, 17, 13];

/// `h = h*seed + codepoint` over `url`, modulo `bit_count`.
pub fn hash_bit(url: &str, seed: u64, bit_count: u64) -> u64 {
    let mut h: u64 = 0;
    for c in url.chars() {
        h = h.wrapping_mul(seed).wrapping_add(c as u64);
    }
    h % bit_count
}

/// Tagged-variant seen-set selected at startup by `bloom_distributed` (§9
/// design note, same shape as [`crate::crawl::scheduler::Scheduler`]): a
/// single-process crawler keeps the in-memory filter, a multi-crawler
/// deployment shares one Redis bit string so no two crawlers fetch the same
/// URL twice.
pub enum BloomFilter {
    Local(LocalBloomFilter),
    Distributed { filter: DistributedBloomFilter, conn: AsyncMutex<ConnectionManager> },
}

impl BloomFilter {
    pub async fn has(&self, url: &str) -> bool {
        match self {
            BloomFilter::Local(f) => f.has(url),
            BloomFilter::Distributed { filter, conn } => {
                let mut conn = conn.lock().await;
                filter.has(&mut conn, url).await
            }
        }
    }

    pub async fn add(&self, url: &str) {
        match self {
            BloomFilter::Local(f) => f.add(url),
            BloomFilter::Distributed { filter, conn } => {
                let mut conn = conn.lock().await;
                filter.add(&mut conn, url).await
            }
        }
    }
}
