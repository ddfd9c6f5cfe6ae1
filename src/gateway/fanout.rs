//! Scatter/gather fan-out to live indexers under one wall-clock deadline;
//! indexers that don't answer in time are simply absent from the merge,
//! not retried or waited on further (spec §4.11, §5).

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::debug;

use crate::registry::AddrList;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultItem {
    pub url: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub score: f64,
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    code: i32,
    data: Option<SearchData>,
}

#[derive(Debug, Deserialize)]
struct SearchData {
    items: Vec<ResultItem>,
}

pub struct FanoutClient {
    http: reqwest::Client,
    deadline: Duration,
}

impl FanoutClient {
    pub fn new(deadline: Duration) -> Self {
        FanoutClient { http: reqwest::Client::new(), deadline }
    }

    /// Issues `GET /search?query=` to every live indexer in parallel, each
    /// bounded by the same deadline so the call returns within `deadline + ε`
    /// overall; indexers that don't answer in time are simply absent from
    /// the merge rather than discarding everyone else's already-gathered
    /// results (spec §7: "OverloadTimeout ... partial results returned").
    pub async fn search(&self, indexer_addrs: &Arc<AddrList>, query: &str) -> Vec<ResultItem> {
        let snapshot = indexer_addrs.load();
        if snapshot.live.is_empty() {
            return Vec::new();
        }

        let requests = snapshot.live.iter().map(|addr| self.fetch_one_bounded(addr, query));
        join_all(requests).await.into_iter().flatten().flatten().collect()
    }

    async fn fetch_one_bounded(&self, addr: &str, query: &str) -> Option<Vec<ResultItem>> {
        match timeout(self.deadline, self.fetch_one(addr, query)).await {
            Ok(result) => result,
            Err(_) => {
                debug!(addr, query, "indexer fan-out request timed out, dropping its results");
                None
            }
        }
    }

    async fn fetch_one(&self, addr: &str, query: &str) -> Option<Vec<ResultItem>> {
        let url = format!("http://{addr}/search");
        let response = self.http.get(&url).query(&[("query", query)]).send().await.ok()?;
        let envelope: SearchEnvelope = response.json().await.ok()?;
        if envelope.code != 0 {
            return None;
        }
        envelope.data.map(|d| d.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_live_indexers_returns_empty_without_a_network_call() {
        let client = FanoutClient::new(Duration::from_secs(3));
        let addrs = Arc::new(AddrList::new());
        let results = client.search(&addrs, "hello").await;
        assert!(results.is_empty());
    }
}
