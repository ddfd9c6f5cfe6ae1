//! Illegal-keyword gate: substring match against a list refreshed every
//! minute from the admin DB (spec §1: "out of scope" external collaborator,
//! abstracted here behind a trait so the refresh source is swappable in
//! tests).

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::core::error::Result;

pub trait IllegalKeywordSource: Send + Sync {
    fn fetch(&self) -> Result<Vec<String>>;
}

/// Default source when no admin backend is configured: the keyword list
/// never changes from empty.
pub struct NullIllegalKeywordSource;

impl IllegalKeywordSource for NullIllegalKeywordSource {
    fn fetch(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

pub struct IllegalKeywordGate {
    keywords: ArcSwap<Vec<String>>,
}

impl IllegalKeywordGate {
    pub fn new() -> Self {
        IllegalKeywordGate { keywords: ArcSwap::from_pointee(Vec::new()) }
    }

    pub fn contains_illegal(&self, query: &str) -> bool {
        self.keywords.load().iter().any(|kw| query.contains(kw.as_str()))
    }

    pub fn spawn_refresh(self: Arc<Self>, source: Arc<dyn IllegalKeywordSource>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match source.fetch() {
                    Ok(keywords) => self.keywords.store(Arc::new(keywords)),
                    Err(err) => warn!(error = %err, "illegal keyword refresh failed, keeping last known list"),
                }
                tokio::time::sleep(interval).await;
            }
        })
    }
}

impl Default for IllegalKeywordGate {
    fn default() -> Self {
        IllegalKeywordGate::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_substring_match_and_ignores_clean_queries() {
        let gate = IllegalKeywordGate::new();
        gate.keywords.store(Arc::new(vec!["badword".to_string()]));
        assert!(gate.contains_illegal("this has badword in it"));
        assert!(!gate.contains_illegal("this is clean"));
    }

    #[test]
    fn null_source_always_yields_an_empty_list() {
        let source = NullIllegalKeywordSource;
        assert!(source.fetch().unwrap().is_empty());
    }
}
