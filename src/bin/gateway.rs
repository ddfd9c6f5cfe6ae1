//! Query gateway: illegal-keyword gate + Redis result cache + scatter/gather
//! fan-out to live indexers, rendered as an HTML results page (§4.11, §6).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use redis::aio::ConnectionManager;
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use meridian::core::config::{GatewayConfig, PropertiesFile};
use meridian::gateway::cache::ResultCache;
use meridian::gateway::fanout::FanoutClient;
use meridian::gateway::illegal::{IllegalKeywordGate, NullIllegalKeywordSource};
use meridian::gateway::{GatewaySearch, SearchOutcome};
use meridian::registry::{AddrList, Registry, INDEXER_HASH};

struct AppState {
    search: GatewaySearch,
}

#[derive(Deserialize)]
struct SearchParams {
    query: Option<String>,
    pn: Option<usize>,
}

/// Renders the results page. Error conditions surface as a populated `Info`
/// string rather than an HTTP error, per spec §7: "search UI always renders
/// a page".
fn render(query: &str, info: Option<&str>, items: &[(String, String, String, f64)], page: usize, max_page: usize) -> String {
    let mut body = String::new();
    body.push_str("<!doctype html><html><head><meta charset=\"utf-8\"><title>meridian search</title></head><body>");
    body.push_str(&format!(
        "<form action=\"/search\" method=\"get\"><input type=\"text\" name=\"query\" value=\"{}\"><button type=\"submit\">search</button></form>",
        html_escape(query)
    ));
    if let Some(info) = info {
        body.push_str(&format!("<p class=\"info\">{}</p>", html_escape(info)));
    }
    body.push_str("<ol>");
    for (url, title, abstract_text, score) in items {
        body.push_str(&format!(
            "<li><a href=\"{url}\">{title}</a><div class=\"abstract\">{abstract_text}</div><span class=\"score\">{score:.4}</span></li>",
            url = html_escape(url),
            title = title,
            abstract_text = abstract_text,
            score = score,
        ));
    }
    body.push_str("</ol>");
    body.push_str(&format!("<p class=\"paging\">page {page} of {max_page}</p>"));
    body.push_str("</body></html>");
    body
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

async fn search(State(state): State<Arc<AppState>>, Query(params): Query<SearchParams>) -> Html<String> {
    let query = params.query.unwrap_or_default();
    let page = params.pn.unwrap_or(1).max(1);

    if query.trim().is_empty() {
        return Html(render("", Some("enter a search query"), &[], 1, 1));
    }

    let outcome = match state.search.search(&query, page).await {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!(error = %err, query = %query, "gateway search failed");
            return Html(render(&query, Some("search temporarily unavailable"), &[], 1, 1));
        }
    };

    match outcome {
        SearchOutcome::IllegalKeyword => Html(render(&query, Some("query contains illegal keyword"), &[], 1, 1)),
        SearchOutcome::NoIndexerAvailable => Html(render(&query, Some("no indexer available"), &[], 1, 1)),
        SearchOutcome::Results { items, page, max_page } => {
            if items.is_empty() {
                Html(render(&query, Some("no results"), &[], page, max_page))
            } else {
                let rows: Vec<(String, String, String, f64)> = items
                    .into_iter()
                    .map(|item| (item.url, item.title, item.abstract_text, item.score))
                    .collect();
                Html(render(&query, None, &rows, page, max_page))
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "gateway.properties".to_string());
    let props = PropertiesFile::load(&config_path)?;
    let config = GatewayConfig::from_properties(&props)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.node.log_level.clone()));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let registry_client = redis::Client::open(config.node.registry_addr.as_str())?;
    let registry_conn = ConnectionManager::new(registry_client).await?;

    let indexer_registry = Arc::new(Registry::new(registry_conn.clone(), INDEXER_HASH));
    let indexer_addrs = Arc::new(AddrList::new());
    indexer_addrs.clone().spawn_refresh(indexer_registry);

    let cache_client = redis::Client::open(config.query_cache_addr.as_str())?;
    let cache_conn = ConnectionManager::new(cache_client).await?;
    let cache = Arc::new(ResultCache::new(cache_conn, config.cache_ttl_secs));

    let fanout = Arc::new(FanoutClient::new(Duration::from_millis(config.fanout_timeout_ms)));

    let illegal = Arc::new(IllegalKeywordGate::new());
    illegal.clone().spawn_refresh(
        Arc::new(NullIllegalKeywordSource),
        Duration::from_secs(config.illegal_keyword_refresh_secs),
    );

    let gateway_search = GatewaySearch::new(illegal, cache, fanout, indexer_addrs);
    let state = Arc::new(AppState { search: gateway_search });

    let app = Router::new()
        .route("/search", get(search))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr: SocketAddr = config.node.listen_addr.parse()?;
    info!(%addr, "gateway listening");

    let server = axum::Server::bind(&addr).serve(app.into_make_service());
    tokio::select! {
        result = server => {
            if let Err(err) = result {
                warn!(error = %err, "gateway server exited with error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down gateway");
        }
    }

    Ok(())
}
