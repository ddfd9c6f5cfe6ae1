//! Ties the illegal-keyword gate, the Redis result cache, and the indexer
//! fan-out together into the gateway's single `/search` operation (§4.11).

use std::sync::Arc;

use tracing::warn;

use crate::core::error::Result;
use crate::gateway::cache::ResultCache;
use crate::gateway::fanout::{FanoutClient, ResultItem};
use crate::gateway::illegal::IllegalKeywordGate;
use crate::registry::AddrList;

const PAGE_SIZE: usize = 10;

pub enum SearchOutcome {
    IllegalKeyword,
    NoIndexerAvailable,
    Results { items: Vec<ResultItem>, page: usize, max_page: usize },
}

pub struct GatewaySearch {
    illegal: Arc<IllegalKeywordGate>,
    cache: Arc<ResultCache>,
    fanout: Arc<FanoutClient>,
    indexer_addrs: Arc<AddrList>,
}

impl GatewaySearch {
    pub fn new(
        illegal: Arc<IllegalKeywordGate>,
        cache: Arc<ResultCache>,
        fanout: Arc<FanoutClient>,
        indexer_addrs: Arc<AddrList>,
    ) -> Self {
        GatewaySearch { illegal, cache, fanout, indexer_addrs }
    }

    pub async fn search(&self, query: &str, page: usize) -> Result<SearchOutcome> {
        let page = page.max(1);
        if self.illegal.contains_illegal(query) {
            return Ok(SearchOutcome::IllegalKeyword);
        }

        if let Some((items, total)) = self.cache.get_page(query, page).await? {
            return Ok(SearchOutcome::Results { items, page, max_page: ResultCache::max_page(total) });
        }

        if self.indexer_addrs.load().live.is_empty() {
            return Ok(SearchOutcome::NoIndexerAvailable);
        }

        let mut merged = self.fanout.search(&self.indexer_addrs, query).await;
        merged.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        let cache = self.cache.clone();
        let store_query = query.to_string();
        let store_items = merged.clone();
        tokio::spawn(async move {
            if let Err(err) = cache.store(&store_query, &store_items).await {
                warn!(query = %store_query, error = %err, "failed to cache search results");
            }
        });

        let total = merged.len();
        let start = (page - 1) * PAGE_SIZE;
        let page_items = merged.into_iter().skip(start).take(PAGE_SIZE).collect();

        Ok(SearchOutcome::Results { items: page_items, page, max_page: ResultCache::max_page(total) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_is_clamped_to_at_least_one() {
        assert_eq!(0usize.max(1), 1);
        assert_eq!(3usize.max(1), 3);
    }

    #[test]
    fn results_rank_by_score_descending() {
        let mut items = vec![
            ResultItem { url: "a".into(), title: "a".into(), abstract_text: String::new(), score: 0.2 },
            ResultItem { url: "b".into(), title: "b".into(), abstract_text: String::new(), score: 0.9 },
            ResultItem { url: "c".into(), title: "c".into(), abstract_text: String::new(), score: 0.5 },
        ];
        items.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        let urls: Vec<&str> = items.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(urls, vec!["b", "c", "a"]);
    }
}
