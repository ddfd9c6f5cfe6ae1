//! Crawler node: scheduler + worker pool + bloom/robots filtering, wired to
//! HTTP `POST /seedurl` and `GET /monitor` (§6).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use meridian::bloom::distributed::DistributedBloomFilter;
use meridian::bloom::local::LocalBloomFilter;
use meridian::bloom::BloomFilter;
use meridian::core::config::{CrawlerConfig, NullConfigSource, PropertiesFile};
use meridian::crawl::engine::CrawlerEngine;
use meridian::crawl::scheduler::{DistributedScheduler, OpicScheduler, Scheduler};
use meridian::net::downloader::Downloader;
use meridian::registry::{AddrList, Registry, CRAWLER_HASH, INDEXER_HASH};
use meridian::robots::policy::RobotsPolicy;

struct AppState {
    engine: Arc<CrawlerEngine>,
    listen_addr: String,
}

#[derive(Deserialize)]
struct SeedUrlRequest {
    seed_urls: Vec<String>,
}

#[derive(Serialize)]
struct Envelope<T> {
    code: i32,
    data: T,
}

#[derive(Serialize)]
struct MonitorData {
    addr: String,
    crawled_count: u64,
    failure_count: u64,
    failure_rate: f64,
}

async fn seed_url(State(state): State<Arc<AppState>>, Json(req): Json<SeedUrlRequest>) -> Json<Envelope<()>> {
    state.engine.seed(req.seed_urls).await;
    Json(Envelope { code: 0, data: () })
}

async fn monitor(State(state): State<Arc<AppState>>) -> Json<Envelope<MonitorData>> {
    let snapshot = state.engine.monitor();
    Json(Envelope {
        code: 0,
        data: MonitorData {
            addr: state.listen_addr.clone(),
            crawled_count: snapshot.crawled_count,
            failure_count: snapshot.failure_count,
            failure_rate: snapshot.failure_rate,
        },
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "crawler.properties".to_string());
    let props = PropertiesFile::load(&config_path)?;
    let config = CrawlerConfig::from_properties(&props)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.node.log_level.clone()));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let redis_client = redis::Client::open(config.node.registry_addr.as_str())?;
    let conn = ConnectionManager::new(redis_client).await?;

    let scheduler = Arc::new(build_scheduler(&config, conn.clone()));
    let downloader = Arc::new(Downloader::new(config.user_agent.clone(), Duration::from_millis(config.timeout_ms), config.retry_count)?);
    let bloom = Arc::new(build_bloom_filter(&config, conn.clone()));
    let robots = Arc::new(RobotsPolicy::new(config.user_agent.clone()));

    let indexer_registry = Registry::new(conn.clone(), INDEXER_HASH);
    let indexer_addrs = Arc::new(AddrList::new());
    indexer_addrs.clone().spawn_refresh(Arc::new(indexer_registry));

    let (engine, _workers) = CrawlerEngine::spawn(scheduler, downloader.clone(), bloom, robots, indexer_addrs, &config);
    let _dynamic_config_poll = engine.clone().spawn_dynamic_config_poll(downloader, Arc::new(NullConfigSource));

    let self_registry = Arc::new(Registry::new(conn, CRAWLER_HASH));
    self_registry.heartbeat_once(&config.node.listen_addr).await?;
    self_registry.clone().spawn_heartbeat(config.node.listen_addr.clone());

    let listen_addr = config.node.listen_addr.clone();
    let state = Arc::new(AppState { engine, listen_addr: listen_addr.clone() });
    let app = Router::new()
        .route("/seedurl", post(seed_url))
        .route("/monitor", get(monitor))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr: SocketAddr = listen_addr.parse()?;
    info!(%addr, "crawler listening");

    let server = axum::Server::bind(&addr).serve(app.into_make_service());
    tokio::select! {
        result = server => {
            if let Err(err) = result {
                warn!(error = %err, "crawler server exited with error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down crawler");
            let _ = self_registry.unregister(&listen_addr).await;
        }
    }

    Ok(())
}

/// Local by default; `crawler.bloom_distributed=true` shares one Redis bit
/// string across every crawler node so none of them re-fetches a URL another
/// one already claimed.
fn build_bloom_filter(config: &CrawlerConfig, conn: ConnectionManager) -> BloomFilter {
    if config.bloom_distributed {
        BloomFilter::Distributed {
            filter: DistributedBloomFilter::new(config.bloom_distributed_key.clone(), (config.bloom_local_size as u64 * 8).max(64)),
            conn: tokio::sync::Mutex::new(conn),
        }
    } else {
        BloomFilter::Local(LocalBloomFilter::new(config.bloom_local_size))
    }
}

fn build_scheduler(config: &CrawlerConfig, conn: ConnectionManager) -> Scheduler {
    match config.scheduler_strategy.as_str() {
        "opic" => Scheduler::Opic(OpicScheduler::new(config.opic_maximize_cash)),
        "distributed" => Scheduler::Distributed(DistributedScheduler::new(conn, config.distributed_queue_key.clone())),
        _ => Scheduler::Bfs(meridian::crawl::scheduler::BfsScheduler::new()),
    }
}
