pub mod core;
pub mod compression;
pub mod analysis;
pub mod index;
pub mod cache;
pub mod bloom;
pub mod robots;
pub mod net;
pub mod store;
pub mod indexing;
pub mod scoring;
pub mod query;
pub mod crawl;
pub mod registry;
pub mod gateway;

/*
┌────────────────────────────────────────────────────────────────────────────────────────────┐
│                               MERIDIAN CRATE ARCHITECTURE                                    │
└────────────────────────────────────────────────────────────────────────────────────────────┘

Three binaries (src/bin/{crawler,indexer,gateway}.rs) wire the modules below
into the three cooperating roles:

  crawler : crawl::scheduler + crawl::engine + net::downloader + bloom + robots
            → PUT /index to a random live indexer (registry::live_addrs)

  indexer : indexing::pipeline (parse -> merge -> flush)
            → store::{document_store, postings_store}
            → query::{parser, executor} + scoring + cache::LruTtlCache

  gateway : registry (fan-out targets) + gateway::fanout + gateway::cache
            + gateway::illegal -> renders /search

core/            config loading, error kinds, doc id + document types
analysis/        n-gram token splitter
compression/     variable-byte integer codec
index/           Posting/PostingsList, the on-disk postings codec, the
                 in-memory InvertedIndex merge buffer
cache/           generic LRU+TTL cache, shared by postings/doc/query caches
bloom/           local bitset + Redis-backed distributed variant
robots/          per-host robots.txt rule cache
net/             HTTP downloader + link extraction
store/           bucketed append-log KV engine, document + postings stores
indexing/        the three-stage indexer pipeline (worker/merger/flush)
scoring/         TF-IDF + title/phrase boosted scorer
query/           query string parsing, intersection + phrase + highlight
crawl/           BFS/OPIC/distributed scheduling strategies, worker pool
registry/        heartbeat-based liveness registry (Redis hash)
gateway/         scatter/gather fan-out, Redis result cache, illegal-keyword gate
*/
