use std::collections::HashMap;
use std::path::Path;

use crate::core::error::{Error, ErrorKind, Result};

/// A parsed `key=value` properties file. `#`-prefixed lines and blank lines are skipped; trailing `\r` is
/// stripped so Windows-authored files parse cleanly.
#[derive(Debug, Clone, Default)]
pub struct PropertiesFile {
    values: HashMap<String, String>,
}

impl PropertiesFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::new(
                ErrorKind::ConfigMissing,
                format!("cannot read {}: {e}", path.as_ref().display()),
            )
        })?;
        Ok(Self::parse(&text))
    }

    pub fn parse(text: &str) -> Self {
        let mut values = HashMap::new();
        for line in text.lines() {
            let line = line.trim_end_matches('\r').trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(eq) = line.find('=') {
                let key = line[..eq].trim().to_string();
                let value = line[eq + 1..].trim().to_string();
                values.insert(key, value);
            }
        }
        PropertiesFile { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn get_required(&self, key: &str) -> Result<&str> {
        self.get(key).ok_or_else(|| {
            Error::new(ErrorKind::ConfigMissing, format!("missing required key `{key}`"))
        })
    }

    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or(default).to_string()
    }

    pub fn get_usize(&self, key: &str, default: usize) -> Result<usize> {
        match self.get(key) {
            None => Ok(default),
            Some(v) => v.parse().map_err(|_| {
                Error::new(ErrorKind::ConfigMalformed, format!("`{key}` = `{v}` is not a usize"))
            }),
        }
    }

    pub fn get_u64(&self, key: &str, default: u64) -> Result<u64> {
        match self.get(key) {
            None => Ok(default),
            Some(v) => v.parse().map_err(|_| {
                Error::new(ErrorKind::ConfigMalformed, format!("`{key}` = `{v}` is not a u64"))
            }),
        }
    }

    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key) {
            None => Ok(default),
            Some(v) => v.parse().map_err(|_| {
                Error::new(ErrorKind::ConfigMalformed, format!("`{key}` = `{v}` is not a bool"))
            }),
        }
    }
}

/// Settings shared by every role: where the registry lives and where this
/// node listens for HTTP requests.
#[derive(Debug, Clone)]
pub struct NodeAddr {
    pub registry_addr: String,
    pub listen_addr: String,
    pub log_level: String,
}

impl NodeAddr {
    fn from_properties(props: &PropertiesFile) -> Result<Self> {
        Ok(NodeAddr {
            registry_addr: props.get_required("registry.addr")?.to_string(),
            listen_addr: props.get_required("listen.addr")?.to_string(),
            log_level: props.get_or("log_level", "info"),
        })
    }
}

#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    pub node: NodeAddr,
    pub worker_count: usize,
    pub worker_channel_capacity: usize,
    pub seed_channel_capacity: usize,
    pub bloom_local_size: usize,
    pub bloom_distributed: bool,
    pub bloom_distributed_key: String,
    pub user_agent: String,
    pub interval_ms: u64,
    pub timeout_ms: u64,
    pub retry_count: u32,
    pub suspend: bool,
    pub random_interval: bool,
    pub scheduler_strategy: String,
    /// §9 Open Question: the source orders OPIC by smallest cash, while
    /// canonical OPIC prioritizes largest. Left explicit rather than guessed;
    /// defaults to the source's behavior.
    pub opic_maximize_cash: bool,
    pub distributed_queue_key: String,
}

impl CrawlerConfig {
    pub fn from_properties(props: &PropertiesFile) -> Result<Self> {
        Ok(CrawlerConfig {
            node: NodeAddr::from_properties(props)?,
            worker_count: props.get_usize("crawler.worker_count", num_cpus::get())?,
            worker_channel_capacity: props.get_usize("crawler.worker_channel_capacity", 10_000)?,
            seed_channel_capacity: props.get_usize("crawler.seed_channel_capacity", 1_000)?,
            bloom_local_size: props.get_usize("crawler.bloom_size", 8_000_000)?,
            bloom_distributed: props.get_bool("crawler.bloom_distributed", false)?,
            bloom_distributed_key: props.get_or("crawler.bloom_distributed_key", "crawler_bloom"),
            user_agent: props.get_or("crawler.useragent", "MeridianBot/1.0"),
            interval_ms: props.get_u64("crawler.interval_ms", 1_000)?,
            timeout_ms: props.get_u64("crawler.timeout_ms", 10_000)?,
            retry_count: props.get_usize("crawler.retry_count", 2)? as u32,
            suspend: props.get_bool("crawler.suspend", false)?,
            random_interval: props.get_bool("crawler.random_interval", false)?,
            scheduler_strategy: props.get_or("crawler.scheduler_strategy", "bfs"),
            opic_maximize_cash: props.get_bool("crawler.opic_maximize_cash", false)?,
            distributed_queue_key: props.get_or("crawler.distributed_queue_key", "dist_url_queue"),
        })
    }
}

#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub node: NodeAddr,
    pub document_store_path: String,
    pub index_store_path: String,
    pub doc_cache_size: usize,
    pub doc_cache_ttl_secs: u64,
    pub postings_cache_size: usize,
    pub postings_cache_ttl_secs: u64,
    pub indexer_workers: usize,
    pub flush_workers: usize,
    pub index_channel_capacity: usize,
    pub merge_channel_capacity: usize,
    pub flush_channel_capacity: usize,
    pub buffer_flush_threshold: usize,
    pub ngram_n: usize,
}

impl IndexerConfig {
    pub fn from_properties(props: &PropertiesFile) -> Result<Self> {
        Ok(IndexerConfig {
            node: NodeAddr::from_properties(props)?,
            document_store_path: props.get_required("indexer.document_store_path")?.to_string(),
            index_store_path: props.get_required("indexer.index_store_path")?.to_string(),
            doc_cache_size: props.get_usize("indexer.doc_cache_size", 10_000)?,
            doc_cache_ttl_secs: props.get_u64("indexer.doc_cache_ttl_secs", 300)?,
            postings_cache_size: props.get_usize("indexer.postings_cache_size", 10_000)?,
            postings_cache_ttl_secs: props.get_u64("indexer.postings_cache_ttl_secs", 300)?,
            indexer_workers: props.get_usize("indexer.workers", num_cpus::get())?,
            flush_workers: props.get_usize("indexer.flush_workers", 2)?,
            index_channel_capacity: props.get_usize("indexer.index_channel_capacity", 1_000)?,
            merge_channel_capacity: props.get_usize("indexer.merge_channel_capacity", 1_000)?,
            flush_channel_capacity: props.get_usize("indexer.flush_channel_capacity", 16)?,
            buffer_flush_threshold: props.get_usize("indexer.buffer_flush_threshold", 5_000)?,
            ngram_n: props.get_usize("indexer.ngram_n", 2)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub node: NodeAddr,
    pub query_cache_addr: String,
    pub fanout_timeout_ms: u64,
    pub illegal_keyword_refresh_secs: u64,
    pub page_size: usize,
    pub cache_ttl_secs: u64,
}

impl GatewayConfig {
    pub fn from_properties(props: &PropertiesFile) -> Result<Self> {
        Ok(GatewayConfig {
            node: NodeAddr::from_properties(props)?,
            query_cache_addr: props.get_or("gateway.query_cache_addr", "redis://127.0.0.1/"),
            fanout_timeout_ms: props.get_u64("gateway.fanout_timeout_ms", 3_000)?,
            illegal_keyword_refresh_secs: props.get_u64("gateway.illegal_keyword_refresh_secs", 60)?,
            page_size: props.get_usize("gateway.page_size", 10)?,
            cache_ttl_secs: props.get_u64("gateway.cache_ttl_secs", 12 * 3600)?,
        })
    }
}

/// Runtime-mutable crawler settings (`interval`, `timeout`, `retry_count`,
/// `useragent`, `suspend`, `random_interval`, `log_level`), polled from an
/// external admin source every second. This trait is the seam a test can
/// substitute a fixed map for instead of polling anything real.
pub trait DynamicConfigSource: Send + Sync {
    fn poll(&self) -> Result<HashMap<String, String>>;
}

/// Default source used when no admin backend is configured: always reports
/// no changes, so dynamic settings simply keep their last value.
pub struct NullConfigSource;

impl DynamicConfigSource for NullConfigSource {
    fn poll(&self) -> Result<HashMap<String, String>> {
        Ok(HashMap::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_value_lines_skipping_comments() {
        let props = PropertiesFile::parse(
            "# comment\n\nregistry.addr=127.0.0.1:6379\nlisten.addr = 0.0.0.0:8080\r\n",
        );
        assert_eq!(props.get("registry.addr"), Some("127.0.0.1:6379"));
        assert_eq!(props.get("listen.addr"), Some("0.0.0.0:8080"));
    }

    #[test]
    fn missing_required_key_is_config_missing() {
        let props = PropertiesFile::parse("listen.addr=0.0.0.0:8080\n");
        let err = props.get_required("registry.addr").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::ConfigMissing));
    }

    #[test]
    fn malformed_numeric_value_is_config_malformed() {
        let props = PropertiesFile::parse("crawler.worker_count=not-a-number\n");
        let err = props.get_usize("crawler.worker_count", 4).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::ConfigMalformed));
    }

    #[test]
    fn default_is_used_when_key_absent() {
        let props = PropertiesFile::parse("");
        assert_eq!(props.get_usize("crawler.worker_count", 4).unwrap(), 4);
    }
}
