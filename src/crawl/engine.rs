//! Crawler engine: a fixed-size worker pool with host-IP affinity so every
//! URL whose host resolves to the same IP lands on the same worker,
//! enforcing per-origin politeness with a per-worker sleep between fetches.
//!
//! Workers call `scheduler.offer()` directly rather than relaying discovered
//! `UrlGroup`s through an extra channel to a separate scheduler task — the
//! scheduler is already a single mutex (or one Redis connection), so nothing
//! is gained by the indirection. A lone scheduler task still exists: it
//! drains the strategy and routes each url to its affinity worker.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};
use url::Url;

use crate::bloom::BloomFilter;
use crate::core::config::{CrawlerConfig, DynamicConfigSource};
use crate::crawl::scheduler::{Scheduler, UrlGroup};
use crate::net::downloader::Downloader;
use crate::net::extract;
use crate::registry::AddrList;
use crate::robots::policy::RobotsPolicy;

/// Settings the admin DB can change at runtime without a restart (§6).
pub struct DynamicSettings {
    pub suspend: AtomicBool,
    pub random_interval: AtomicBool,
    pub interval_ms: AtomicU64,
    pub timeout_ms: AtomicU64,
    pub retry_count: AtomicU32,
}

pub struct CrawlerEngine {
    scheduler: Arc<Scheduler>,
    downloader: Arc<Downloader>,
    bloom: Arc<BloomFilter>,
    robots: Arc<RobotsPolicy>,
    indexer_addrs: Arc<AddrList>,
    http: reqwest::Client,
    worker_senders: Vec<mpsc::Sender<String>>,
    seed_tx: mpsc::Sender<String>,
    pub dynamic: DynamicSettings,
    pub crawled_count: AtomicU64,
    pub failure_count: AtomicU64,
}

pub struct MonitorSnapshot {
    pub crawled_count: u64,
    pub failure_count: u64,
    pub failure_rate: f64,
}

impl CrawlerEngine {
    pub fn spawn(
        scheduler: Arc<Scheduler>,
        downloader: Arc<Downloader>,
        bloom: Arc<BloomFilter>,
        robots: Arc<RobotsPolicy>,
        indexer_addrs: Arc<AddrList>,
        config: &CrawlerConfig,
    ) -> (Arc<CrawlerEngine>, Vec<JoinHandle<()>>) {
        let worker_count = config.worker_count.max(1);
        let mut worker_senders = Vec::with_capacity(worker_count);
        let mut worker_receivers = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let (tx, rx) = mpsc::channel(config.worker_channel_capacity.max(1));
            worker_senders.push(tx);
            worker_receivers.push(rx);
        }
        let (seed_tx, seed_rx) = mpsc::channel(config.seed_channel_capacity.max(1));
        let seed_rx = Arc::new(AsyncMutex::new(seed_rx));

        let engine = Arc::new(CrawlerEngine {
            scheduler,
            downloader,
            bloom,
            robots,
            indexer_addrs,
            http: reqwest::Client::new(),
            worker_senders,
            seed_tx,
            dynamic: DynamicSettings {
                suspend: AtomicBool::new(config.suspend),
                random_interval: AtomicBool::new(config.random_interval),
                interval_ms: AtomicU64::new(config.interval_ms),
                timeout_ms: AtomicU64::new(config.timeout_ms),
                retry_count: AtomicU32::new(config.retry_count),
            },
            crawled_count: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
        });

        let mut handles = Vec::with_capacity(worker_count + 1);
        for (worker_id, rx) in worker_receivers.into_iter().enumerate() {
            let engine = engine.clone();
            let seed_rx = seed_rx.clone();
            handles.push(tokio::spawn(async move { run_worker(engine, worker_id, rx, seed_rx).await }));
        }
        handles.push(tokio::spawn(run_scheduler_task(engine.clone())));

        (engine, handles)
    }

    /// Feeds seed URLs onto the shared, non-blocking-preferred seed channel.
    pub async fn seed(&self, urls: Vec<String>) {
        for url in urls {
            if self.seed_tx.send(url).await.is_err() {
                break;
            }
        }
    }

    pub fn monitor(&self) -> MonitorSnapshot {
        let crawled = self.crawled_count.load(Ordering::Relaxed);
        let failed = self.failure_count.load(Ordering::Relaxed);
        let total = crawled + failed;
        let failure_rate = if total == 0 { 0.0 } else { failed as f64 / total as f64 };
        MonitorSnapshot { crawled_count: crawled, failure_count: failed, failure_rate }
    }

    /// Polls `source` once a second and applies any of `interval`, `timeout`,
    /// `retry_count`, `useragent`, `suspend`, `random_interval` present in the
    /// returned map. Unparsable or absent keys leave the current value in
    /// place (§6).
    pub fn spawn_dynamic_config_poll(self: Arc<Self>, downloader: Arc<Downloader>, source: Arc<dyn DynamicConfigSource>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            loop {
                ticker.tick().await;
                let settings = match source.poll() {
                    Ok(settings) => settings,
                    Err(err) => {
                        warn!(error = %err, "dynamic config poll failed, keeping previous settings");
                        continue;
                    }
                };
                if let Some(v) = settings.get("interval").and_then(|v| v.parse::<u64>().ok()) {
                    self.dynamic.interval_ms.store(v, Ordering::Relaxed);
                }
                if let Some(v) = settings.get("timeout").and_then(|v| v.parse::<u64>().ok()) {
                    self.dynamic.timeout_ms.store(v, Ordering::Relaxed);
                    downloader.set_timeout_ms(v);
                }
                if let Some(v) = settings.get("retry_count").and_then(|v| v.parse::<u32>().ok()) {
                    self.dynamic.retry_count.store(v, Ordering::Relaxed);
                    downloader.set_retry_count(v);
                }
                if let Some(v) = settings.get("useragent") {
                    downloader.set_user_agent(v.clone());
                }
                if let Some(v) = settings.get("suspend").and_then(|v| v.parse::<bool>().ok()) {
                    self.dynamic.suspend.store(v, Ordering::Relaxed);
                }
                if let Some(v) = settings.get("random_interval").and_then(|v| v.parse::<bool>().ok()) {
                    self.dynamic.random_interval.store(v, Ordering::Relaxed);
                }
            }
        })
    }

    async fn filter_url(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else { return false };
        let Some(host) = parsed.host_str().map(str::to_string) else { return false };

        if !self.robots.is_cached(&host) {
            let robots_url = format!("{}://{}/robots.txt", parsed.scheme(), host);
            let body = self.downloader.download_text(&robots_url).await.ok();
            self.robots.ingest(&host, body.as_deref());
        }
        if !self.robots.allow(&host, parsed.path()) {
            return false;
        }

        if self.bloom.has(url).await {
            return false;
        }
        self.bloom.add(url).await;
        true
    }

    /// JSON `{url, document}` PUT to a random live indexer; best-effort, no
    /// queue backing.
    async fn send_document(&self, url: &str, document: &str) {
        let snapshot = self.indexer_addrs.load();
        if snapshot.live.is_empty() {
            warn!(url, "no live indexer available, dropping document");
            return;
        }
        let addr = snapshot.live[rand::thread_rng().gen_range(0..snapshot.live.len())].clone();
        let endpoint = format!("http://{addr}/index");
        let body = serde_json::json!({ "url": url, "document": document });

        let retry_count = self.dynamic.retry_count.load(Ordering::Relaxed);
        for attempt in 0..=retry_count {
            match self.http.put(&endpoint).json(&body).send().await {
                Ok(resp) if resp.status().is_success() => return,
                Ok(resp) => warn!(url, addr = %addr, status = %resp.status(), attempt, "indexer rejected document"),
                Err(err) => warn!(url, addr = %addr, error = %err, attempt, "failed to send document"),
            }
        }
    }

    async fn route_worker(&self, url: &str) -> usize {
        let host = Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_string)).unwrap_or_default();
        let affinity_key = resolve_ip(&host).await.unwrap_or(host);
        let mut hasher = DefaultHasher::new();
        affinity_key.hash(&mut hasher);
        (hasher.finish() as usize) % self.worker_senders.len().max(1)
    }
}

async fn resolve_ip(host: &str) -> Option<String> {
    use tokio::net::lookup_host;
    let mut addrs = lookup_host((host, 80)).await.ok()?;
    addrs.next().map(|addr| addr.ip().to_string())
}

async fn run_worker(
    engine: Arc<CrawlerEngine>,
    worker_id: usize,
    mut my_rx: mpsc::Receiver<String>,
    seed_rx: Arc<AsyncMutex<mpsc::Receiver<String>>>,
) {
    loop {
        if engine.dynamic.suspend.load(Ordering::Relaxed) {
            tokio::time::sleep(Duration::from_secs(1)).await;
            continue;
        }

        let seeded = {
            let mut guard = seed_rx.lock().await;
            guard.try_recv().ok()
        };
        let url = match seeded {
            Some(url) => url,
            None => match my_rx.recv().await {
                Some(url) => url,
                None => break,
            },
        };

        match engine.downloader.download_text(&url).await {
            Err(err) => {
                engine.failure_count.fetch_add(1, Ordering::Relaxed);
                debug!(worker_id, url = %url, error = %err, "download failed");
            }
            Ok(body) => {
                engine.crawled_count.fetch_add(1, Ordering::Relaxed);

                let send_engine = engine.clone();
                let send_url = url.clone();
                let send_body = body.clone();
                tokio::spawn(async move { send_engine.send_document(&send_url, &send_body).await });

                let links = extract::extract_urls(&url, &body);
                let mut members = Vec::with_capacity(links.len());
                for link in links {
                    if engine.filter_url(&link).await {
                        members.push(link);
                    }
                }
                shuffle(&mut members);

                engine.scheduler.offer(UrlGroup { leader: url.clone(), members }).await;
            }
        }

        sleep_interval(&engine.dynamic).await;
    }
}

fn shuffle(members: &mut [String]) {
    let mut rng = rand::thread_rng();
    for i in (1..members.len()).rev() {
        members.swap(i, rng.gen_range(0..=i));
    }
}

async fn sleep_interval(dynamic: &DynamicSettings) {
    let base = dynamic.interval_ms.load(Ordering::Relaxed);
    let millis = if dynamic.random_interval.load(Ordering::Relaxed) {
        rand::thread_rng().gen_range(0..base.max(1)) + 2
    } else {
        base
    };
    tokio::time::sleep(Duration::from_millis(millis)).await;
}

/// Drains the strategy into worker channels by host-IP affinity. A send that
/// would block past `interval + timeout` is abandoned for this cycle rather
/// than stalling the whole scheduler (spec §5 cancellation rule).
async fn run_scheduler_task(engine: Arc<CrawlerEngine>) {
    loop {
        if engine.scheduler.is_empty().await {
            let idle = engine.dynamic.interval_ms.load(Ordering::Relaxed).max(50);
            tokio::time::sleep(Duration::from_millis(idle)).await;
            continue;
        }
        let Some(url) = engine.scheduler.poll().await else { continue };

        let worker_id = engine.route_worker(&url).await;
        let deadline = Duration::from_millis(
            engine.dynamic.interval_ms.load(Ordering::Relaxed) + engine.dynamic.timeout_ms.load(Ordering::Relaxed),
        );
        if timeout(deadline, engine.worker_senders[worker_id].send(url.clone())).await.is_err() {
            warn!(url = %url, worker_id, "worker channel send timed out, url dropped for this cycle");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::NodeAddr;
    use crate::crawl::scheduler::BfsScheduler;
    use crate::net::downloader::Downloader;
    use crate::robots::policy::RobotsPolicy;

    fn test_config() -> CrawlerConfig {
        CrawlerConfig {
            node: NodeAddr { registry_addr: "127.0.0.1:6379".to_string(), listen_addr: "127.0.0.1:8081".to_string(), log_level: "info".to_string() },
            worker_count: 2,
            worker_channel_capacity: 8,
            seed_channel_capacity: 8,
            bloom_local_size: 1_000,
            bloom_distributed: false,
            bloom_distributed_key: "crawler_bloom".to_string(),
            user_agent: "test-bot".to_string(),
            interval_ms: 10,
            timeout_ms: 100,
            retry_count: 0,
            suspend: true,
            random_interval: false,
            scheduler_strategy: "bfs".to_string(),
            opic_maximize_cash: false,
            distributed_queue_key: "dist_url_queue".to_string(),
        }
    }

    #[tokio::test]
    async fn fresh_engine_reports_zero_counts() {
        let config = test_config();
        let scheduler = Arc::new(Scheduler::Bfs(BfsScheduler::new()));
        let downloader = Arc::new(Downloader::new("test-bot", Duration::from_millis(100), 0).unwrap());
        let bloom = Arc::new(BloomFilter::Local(crate::bloom::local::LocalBloomFilter::new(config.bloom_local_size)));
        let robots = Arc::new(RobotsPolicy::new(&config.user_agent));
        let indexer_addrs = Arc::new(AddrList::new());

        let (engine, handles) = CrawlerEngine::spawn(scheduler, downloader, bloom, robots, indexer_addrs, &config);
        let snapshot = engine.monitor();
        assert_eq!(snapshot.crawled_count, 0);
        assert_eq!(snapshot.failure_count, 0);
        assert_eq!(snapshot.failure_rate, 0.0);

        for handle in handles {
            handle.abort();
        }
    }

    #[test]
    fn shuffle_preserves_the_member_set() {
        let mut members: Vec<String> = (0..20).map(|i| i.to_string()).collect();
        let original: std::collections::HashSet<String> = members.iter().cloned().collect();
        shuffle(&mut members);
        let shuffled: std::collections::HashSet<String> = members.into_iter().collect();
        assert_eq!(original, shuffled);
    }
}
