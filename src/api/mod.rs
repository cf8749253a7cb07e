use crate::engine::{DecisionService, Item, Verdict};
use crate::stats::StatsCollector;
use axum::{
    extract::{Json as AxumJson, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use rustc_hash::FxHashMap;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc::Sender;

struct ApiState {
    service: DecisionService,
    stats: Arc<StatsCollector>,
    reload_sender: Sender<()>,
}

#[derive(Deserialize)]
struct VideoQuery {
    id: String,
}

#[derive(Deserialize)]
struct IdsRequest {
    #[serde(default)]
    ids: Vec<String>,
}

#[derive(Deserialize)]
struct ItemsRequest {
    #[serde(default)]
    items: Vec<Item>,
}

#[derive(Deserialize)]
struct UrlsRequest {
    #[serde(default)]
    urls: Vec<String>,
}

pub fn router(
    service: DecisionService,
    stats: Arc<StatsCollector>,
    reload_sender: Sender<()>,
) -> Router {
    let state = Arc::new(ApiState {
        service,
        stats,
        reload_sender,
    });

    Router::new()
        .route("/api/check", post(check_items))
        .route("/api/check/video", get(check_video))
        .route("/api/check/videos", post(check_videos))
        .route("/api/check/playlists", post(check_playlists))
        .route("/api/check/urls", post(check_urls))
        .route("/api/stats", get(get_stats))
        .route("/api/status", get(get_status))
        .route("/api/settings/reload", post(trigger_reload))
        .with_state(state)
}

pub async fn start_api_server(
    service: DecisionService,
    stats: Arc<StatsCollector>,
    reload_sender: Sender<()>,
    addr: SocketAddr,
) -> anyhow::Result<()> {
    let app = router(service, stats, reload_sender);
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("API Server listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn check_video(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<VideoQuery>,
) -> Json<Verdict> {
    Json(state.service.check_video(&query.id).await)
}

async fn check_videos(
    State(state): State<Arc<ApiState>>,
    AxumJson(payload): AxumJson<IdsRequest>,
) -> Json<FxHashMap<String, Verdict>> {
    Json(state.service.check_videos(&payload.ids).await)
}

async fn check_playlists(
    State(state): State<Arc<ApiState>>,
    AxumJson(payload): AxumJson<IdsRequest>,
) -> Json<FxHashMap<String, Verdict>> {
    Json(state.service.check_playlists(&payload.ids).await)
}

async fn check_items(
    State(state): State<Arc<ApiState>>,
    AxumJson(payload): AxumJson<ItemsRequest>,
) -> Json<FxHashMap<String, Verdict>> {
    Json(state.service.check_items(&payload.items).await)
}

async fn check_urls(
    State(state): State<Arc<ApiState>>,
    AxumJson(payload): AxumJson<UrlsRequest>,
) -> Json<FxHashMap<String, Verdict>> {
    Json(state.service.check_urls(&payload.urls).await)
}

async fn get_stats(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    Json(state.stats.get_snapshot())
}

async fn get_status(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let settings = state.service.settings().snapshot();
    let mut blocked: Vec<&String> = settings.blocked_countries.iter().collect();
    blocked.sort();
    Json(serde_json::json!({
        "credential_configured": settings.has_credential(),
        "relay_enabled": settings.relay_enabled(),
        "block_if_no_country": settings.block_if_no_country,
        "playlist_policy": settings.playlist_policy,
        "sample_size": settings.sample_size(),
        "blocked_countries": blocked,
    }))
}

async fn trigger_reload(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let _ = state.reload_sender.send(()).await;
    Json(serde_json::json!({ "status": "reload_triggered" }))
}
