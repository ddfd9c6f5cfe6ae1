//! The three-stage indexer pipeline: `/index` hands a job to a pool of K
//! indexer workers, each pushes a per-document token map to a single
//! merger, which accumulates an in-memory buffer and hands it to a pool of
//! M flush workers once it crosses the configured threshold.
//!
//! ```text
//! HTTP /index -> indexChannel -> [K indexer workers] -> mergeChannel -> [1 merger] -> flushChannel -> [M flush workers] -> store
//! ```
//!
//! The merger is exactly one task so buffer merges are total-ordered and no
//! lock is needed between concurrently arriving per-document indexes
//! (spec §4.9, §5).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::analysis::ngram;
use crate::core::config::IndexerConfig;
use crate::core::error::{Error, ErrorKind, Result};
use crate::index::inverted::{InvertedIndex, TokenIndexItem};
use crate::index::posting::Posting;
use crate::net::extract;
use crate::store::document_store::DocumentStore;
use crate::store::postings_store::PostingsStore;

/// A raw `/index` submission: the crawled URL plus its fetched HTML body.
pub struct IndexJob {
    pub url: String,
    pub html: String,
}

/// The per-document token map an indexer worker hands to the merger.
struct PerDocIndex {
    tokens: HashMap<String, TokenIndexItem>,
}

/// Owns the channel senders and background tasks of one indexer node's
/// pipeline. Dropping the pipeline (or closing `submit`) drains every
/// stage: each task exits once its receiver sees the channel close, and
/// the merger flushes its final partial buffer before exiting.
pub struct IndexingPipeline {
    index_tx: mpsc::Sender<IndexJob>,
    workers: Vec<JoinHandle<()>>,
}

impl IndexingPipeline {
    pub fn spawn(document_store: Arc<DocumentStore>, postings_store: Arc<PostingsStore>, config: &IndexerConfig) -> Self {
        let (index_tx, index_rx) = mpsc::channel(config.index_channel_capacity);
        let (merge_tx, merge_rx) = mpsc::channel(config.merge_channel_capacity);
        let (flush_tx, flush_rx) = mpsc::channel(config.flush_channel_capacity);

        let index_rx = Arc::new(Mutex::new(index_rx));
        let mut workers = Vec::new();

        for worker_id in 0..config.indexer_workers.max(1) {
            let index_rx = index_rx.clone();
            let merge_tx = merge_tx.clone();
            let document_store = document_store.clone();
            let ngram_n = config.ngram_n;
            workers.push(tokio::spawn(async move {
                run_indexer_worker(worker_id, index_rx, merge_tx, document_store, ngram_n).await;
            }));
        }
        // the pipeline's own merge_tx clone above keeps the channel open past
        // worker spawn; drop the original so the merger sees EOF once every
        // worker's clone is dropped.
        drop(merge_tx);

        let flush_threshold = config.buffer_flush_threshold;
        workers.push(tokio::spawn(async move {
            run_merger(merge_rx, flush_tx, flush_threshold).await;
        }));

        let flush_rx = Arc::new(Mutex::new(flush_rx));
        for worker_id in 0..config.flush_workers.max(1) {
            let flush_rx = flush_rx.clone();
            let postings_store = postings_store.clone();
            workers.push(tokio::spawn(async move {
                run_flush_worker(worker_id, flush_rx, postings_store).await;
            }));
        }

        IndexingPipeline { index_tx, workers }
    }

    /// Submits a fetched page to the pipeline; backpressures (awaits) if
    /// the index channel is full rather than dropping the document.
    pub async fn submit(&self, job: IndexJob) -> Result<()> {
        self.index_tx
            .send(job)
            .await
            .map_err(|_| Error::new(ErrorKind::Internal, "index pipeline is shut down".to_string()))
    }

    /// Closes the submission channel and waits for every stage to drain.
    pub async fn shutdown(self) {
        drop(self.index_tx);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

async fn run_indexer_worker(
    worker_id: usize,
    index_rx: Arc<Mutex<mpsc::Receiver<IndexJob>>>,
    merge_tx: mpsc::Sender<PerDocIndex>,
    document_store: Arc<DocumentStore>,
    ngram_n: usize,
) {
    loop {
        let job = {
            let mut rx = index_rx.lock().await;
            rx.recv().await
        };
        let Some(job) = job else { break };

        match index_one_document(&job, &document_store, ngram_n) {
            Ok(per_doc) => {
                if merge_tx.send(per_doc).await.is_err() {
                    break;
                }
            }
            Err(err) => {
                error!(worker_id, url = %job.url, error = %err, "failed to index document");
            }
        }
    }
    info!(worker_id, "indexer worker stopped");
}

fn index_one_document(job: &IndexJob, document_store: &DocumentStore, ngram_n: usize) -> Result<PerDocIndex> {
    let title = extract::extract_title(&job.html);
    let body = extract::extract_body_text(&job.html);
    let doc_id = document_store.insert(&job.url, &title, &body)?;

    let mut title_positions: HashMap<String, Vec<u32>> = HashMap::new();
    for (token, pos) in ngram::split_ngrams(&title, ngram_n) {
        title_positions.entry(token).or_default().push(pos as u32);
    }
    let mut body_positions: HashMap<String, Vec<u32>> = HashMap::new();
    for (token, pos) in ngram::split_ngrams(&body, ngram_n) {
        body_positions.entry(token).or_default().push(pos as u32);
    }

    let all_tokens: HashSet<&String> = title_positions.keys().chain(body_positions.keys()).collect();
    let mut tokens = HashMap::with_capacity(all_tokens.len());
    for token in all_tokens {
        let title_pos = title_positions.get(token).cloned().unwrap_or_default();
        let title_end = title_pos.len();
        let mut positions = title_pos;
        if let Some(body_pos) = body_positions.get(token) {
            positions.extend_from_slice(body_pos);
        }
        let posting = Posting::new(doc_id, title_end, positions);
        tokens.insert(token.clone(), TokenIndexItem::single(posting));
    }

    Ok(PerDocIndex { tokens })
}

async fn run_merger(mut merge_rx: mpsc::Receiver<PerDocIndex>, flush_tx: mpsc::Sender<InvertedIndex>, flush_threshold: usize) {
    let mut buffer = InvertedIndex::new();

    while let Some(per_doc) = merge_rx.recv().await {
        buffer.merge_document(per_doc.tokens);
        if buffer.index_count() as usize >= flush_threshold {
            let detached = buffer.detach();
            if flush_tx.send(detached).await.is_err() {
                return;
            }
        }
    }

    if !buffer.is_empty() {
        let _ = flush_tx.send(buffer).await;
    }
    info!("merger stopped");
}

async fn run_flush_worker(worker_id: usize, flush_rx: Arc<Mutex<mpsc::Receiver<InvertedIndex>>>, postings_store: Arc<PostingsStore>) {
    loop {
        let batch = {
            let mut rx = flush_rx.lock().await;
            rx.recv().await
        };
        let Some(batch) = batch else { break };

        for (token, item) in batch.tokens() {
            if let Err(err) = postings_store.merge_and_store(token, &item.postings, item.document_count) {
                warn!(worker_id, token = %token, error = %err, "flush failed, buffer contents are lost for this token");
            }
        }
    }
    info!(worker_id, "flush worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn index_one_document_splits_title_and_body_tokens() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::open(dir.path()).unwrap();
        let job = IndexJob {
            url: "http://example.com".to_string(),
            html: "<html><head><title>he</title></head><body>wo</body></html>".to_string(),
        };
        let per_doc = index_one_document(&job, &store, 2).unwrap();
        let item = per_doc.tokens.get("he").expect("title token present");
        assert_eq!(item.postings.0[0].title_end, 1);
        let item = per_doc.tokens.get("wo").expect("body token present");
        assert_eq!(item.postings.0[0].title_end, 0);
    }
}
