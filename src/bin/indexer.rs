//! Indexer node: the three-stage indexing pipeline plus the query executor,
//! wired to HTTP `PUT /index`, `GET /search`, `GET /monitor` (§6).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use meridian::cache::lru_ttl::LruTtlCache;
use meridian::core::config::{IndexerConfig, PropertiesFile};
use meridian::core::types::DocId;
use meridian::index::posting::PostingsList;
use meridian::indexing::pipeline::{IndexJob, IndexingPipeline};
use meridian::query::{executor, parser};
use meridian::registry::{Registry, INDEXER_HASH};
use meridian::store::document_store::DocumentStore;
use meridian::store::postings_store::PostingsStore;

struct AppState {
    pipeline: IndexingPipeline,
    document_store: Arc<DocumentStore>,
    postings_store: Arc<PostingsStore>,
    postings_cache: LruTtlCache<String, PostingsList>,
    doc_count_cache: LruTtlCache<String, u64>,
    doc_url_cache: LruTtlCache<DocId, String>,
    ngram_n: usize,
    listen_addr: String,
}

#[derive(Serialize)]
struct Envelope<T> {
    code: i32,
    data: T,
}

#[derive(Deserialize)]
struct IndexRequest {
    url: String,
    document: String,
}

#[derive(Deserialize)]
struct SearchParams {
    query: Option<String>,
}

#[derive(Serialize)]
struct ResultItem {
    url: String,
    title: String,
    #[serde(rename = "abstract")]
    abstract_text: String,
    score: f64,
}

#[derive(Serialize)]
struct SearchData {
    items: Vec<ResultItem>,
    duration: u128,
}

#[derive(Serialize)]
struct MonitorData {
    addr: String,
    index_size: usize,
    indexed_doc_count: u64,
    token_count: usize,
    postings_buffer_hit_rate: f64,
    token_docs_count_buffer_hit_rate: f64,
    doc_url_buffer_hit_rate: f64,
}

async fn index_document(State(state): State<Arc<AppState>>, Json(req): Json<IndexRequest>) -> StatusCode {
    let job = IndexJob { url: req.url, html: req.document };
    match state.pipeline.submit(job).await {
        Ok(()) => StatusCode::OK,
        Err(err) => {
            warn!(error = %err, "index submission rejected");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

async fn search(State(state): State<Arc<AppState>>, Query(params): Query<SearchParams>) -> Result<Json<Envelope<SearchData>>, StatusCode> {
    let query = params.query.unwrap_or_default();
    if query.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let parsed = parser::parse(&query);
    let exec = executor::SearchExecutor::new(
        &state.postings_store,
        &state.document_store,
        &state.postings_cache,
        &state.doc_count_cache,
        &state.doc_url_cache,
        state.ngram_n,
    );

    let result = exec.search(&parsed).map_err(|err| {
        warn!(error = %err, query = %query, "search failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let items = result
        .items
        .into_iter()
        .map(|hit| ResultItem { url: hit.url, title: hit.title, abstract_text: hit.abstract_text, score: hit.score })
        .collect();

    Ok(Json(Envelope { code: 0, data: SearchData { items, duration: result.duration.as_millis() } }))
}

async fn monitor(State(state): State<Arc<AppState>>) -> Json<Envelope<MonitorData>> {
    Json(Envelope {
        code: 0,
        data: MonitorData {
            addr: state.listen_addr.clone(),
            index_size: state.postings_store.token_count(),
            indexed_doc_count: state.document_store.indexed_doc_count(),
            token_count: state.postings_store.token_count(),
            postings_buffer_hit_rate: state.postings_cache.hit_rate(),
            token_docs_count_buffer_hit_rate: state.doc_count_cache.hit_rate(),
            doc_url_buffer_hit_rate: state.doc_url_cache.hit_rate(),
        },
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "indexer.properties".to_string());
    let props = PropertiesFile::load(&config_path)?;
    let config = IndexerConfig::from_properties(&props)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.node.log_level.clone()));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let document_store = Arc::new(DocumentStore::open(&config.document_store_path)?);
    let postings_store = Arc::new(PostingsStore::open(&config.index_store_path)?);
    let pipeline = IndexingPipeline::spawn(document_store.clone(), postings_store.clone(), &config);

    let postings_cache = LruTtlCache::new(config.postings_cache_size, Duration::from_secs(config.postings_cache_ttl_secs));
    let doc_count_cache = LruTtlCache::new(config.postings_cache_size, Duration::from_secs(config.postings_cache_ttl_secs));
    let doc_url_cache = LruTtlCache::new(config.doc_cache_size, Duration::from_secs(config.doc_cache_ttl_secs));

    let redis_client = redis::Client::open(config.node.registry_addr.as_str())?;
    let conn = ConnectionManager::new(redis_client).await?;
    let self_registry = Arc::new(Registry::new(conn, INDEXER_HASH));
    self_registry.heartbeat_once(&config.node.listen_addr).await?;
    self_registry.clone().spawn_heartbeat(config.node.listen_addr.clone());

    let listen_addr = config.node.listen_addr.clone();
    let ngram_n = config.ngram_n;
    let state = Arc::new(AppState {
        pipeline,
        document_store,
        postings_store,
        postings_cache,
        doc_count_cache,
        doc_url_cache,
        ngram_n,
        listen_addr: listen_addr.clone(),
    });

    let app = Router::new()
        .route("/index", put(index_document))
        .route("/search", get(search))
        .route("/monitor", get(monitor))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr: SocketAddr = listen_addr.parse()?;
    info!(%addr, "indexer listening");

    let server = axum::Server::bind(&addr).serve(app.into_make_service());
    tokio::select! {
        result = server => {
            if let Err(err) = result {
                warn!(error = %err, "indexer server exited with error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down indexer");
            let _ = self_registry.unregister(&listen_addr).await;
        }
    }

    Ok(())
}
