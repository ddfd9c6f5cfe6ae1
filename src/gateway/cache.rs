//! Redis-backed paged result cache: `query -> [json item, ...]`, a 12h TTL
//! refreshed on every store (spec §4.11).

use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::core::error::{Error, Result};
use crate::gateway::fanout::ResultItem;

const PAGE_SIZE: usize = 10;

pub struct ResultCache {
    conn: ConnectionManager,
    ttl_secs: u64,
}

impl ResultCache {
    pub fn new(conn: ConnectionManager, ttl_secs: u64) -> Self {
        ResultCache { conn, ttl_secs }
    }

    /// `EXISTS query && LRANGE query start..end && LLEN query`, as one
    /// logical read. Returns `None` on a cache miss.
    pub async fn get_page(&self, query: &str, page: usize) -> Result<Option<(Vec<ResultItem>, usize)>> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(query).await.map_err(Error::from)?;
        if !exists {
            return Ok(None);
        }

        let start = (page.saturating_sub(1) * PAGE_SIZE) as isize;
        let end = start + PAGE_SIZE as isize - 1;
        let raw: Vec<String> = conn.lrange(query, start, end).await.map_err(Error::from)?;
        let total: usize = conn.llen(query).await.map_err(Error::from)?;

        let items = raw.iter().filter_map(|s| serde_json::from_str(s).ok()).collect();
        Ok(Some((items, total)))
    }

    /// `RPUSH query items... ; EXPIRE query 12h`. A no-op for an empty
    /// result set so a miss never pins an empty list key for 12 hours.
    pub async fn store(&self, query: &str, items: &[ResultItem]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        let encoded: Vec<String> = items.iter().filter_map(|item| serde_json::to_string(item).ok()).collect();
        let mut conn = self.conn.clone();
        let _: () = conn.rpush(query, &encoded).await.map_err(Error::from)?;
        let _: () = conn.expire(query, self.ttl_secs as i64).await.map_err(Error::from)?;
        Ok(())
    }

    pub fn max_page(total: usize) -> usize {
        if total == 0 {
            1
        } else {
            total.div_ceil(PAGE_SIZE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_page_rounds_up() {
        assert_eq!(ResultCache::max_page(0), 1);
        assert_eq!(ResultCache::max_page(1), 1);
        assert_eq!(ResultCache::max_page(10), 1);
        assert_eq!(ResultCache::max_page(11), 2);
        assert_eq!(ResultCache::max_page(20), 2);
    }
}
