mod common;

use common::{service, settings, MockFetcher};
use geo_nope::api::router;
use geo_nope::config::PlaylistPolicy;
use geo_nope::stats::StatsCollector;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

struct TestApi {
    addr: SocketAddr,
    reload_rx: mpsc::Receiver<()>,
    client: reqwest::Client,
}

impl TestApi {
    async fn start() -> Self {
        let fetcher = Arc::new(
            MockFetcher::default()
                .channel("UC1", Some("US"))
                .channel("UC2", Some("DE"))
                .video("dQw4w9WgXcQ", "UC1")
                .video("v2", "UC2")
                .playlist("PL1", "UC1", &["v2"]),
        );
        let svc = service(fetcher, settings(&["US"], false, PlaylistPolicy::Owner));
        let (reload_tx, reload_rx) = mpsc::channel(1);
        let app = router(svc, StatsCollector::new(), reload_tx);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            reload_rx,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn post(&self, path: &str, body: Value) -> Value {
        self.client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    async fn get(&self, path: &str) -> Value {
        self.client
            .get(self.url(path))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn test_check_single_video() {
    let api = TestApi::start().await;

    let body = api.get("/api/check/video?id=dQw4w9WgXcQ").await;
    assert_eq!(
        body,
        json!({"blocked": true, "reason": "blocked-country", "country": "US"})
    );
}

#[tokio::test]
async fn test_check_mixed_items() {
    let api = TestApi::start().await;

    let body = api
        .post(
            "/api/check",
            json!({"items": [
                {"kind": "video", "id": "v2"},
                {"kind": "channel", "id": "UC1"},
                {"kind": "playlist", "id": "PL1"}
            ]}),
        )
        .await;
    assert_eq!(body["v2"], json!({"blocked": false, "reason": "allowed", "country": "DE"}));
    assert_eq!(body["UC1"]["blocked"], json!(true));
    assert_eq!(body["PL1"]["reason"], json!("playlist-owner-blocked"));
}

#[tokio::test]
async fn test_check_videos_and_urls() {
    let api = TestApi::start().await;

    let body = api
        .post("/api/check/videos", json!({"ids": ["v2", "unknown"]}))
        .await;
    assert_eq!(body["v2"]["blocked"], json!(false));
    assert_eq!(body["unknown"], json!({"blocked": false, "reason": "not-found"}));

    let body = api
        .post(
            "/api/check/urls",
            json!({"urls": ["https://youtu.be/dQw4w9WgXcQ"]}),
        )
        .await;
    assert_eq!(body["https://youtu.be/dQw4w9WgXcQ"]["blocked"], json!(true));
}

#[tokio::test]
async fn test_status_hides_credential() {
    let api = TestApi::start().await;

    let body = api.get("/api/status").await;
    assert_eq!(body["credential_configured"], json!(true));
    assert_eq!(body["playlist_policy"], json!("owner"));
    assert_eq!(body["blocked_countries"], json!(["US"]));
    assert!(!body.to_string().contains("test-key"));
}

#[tokio::test]
async fn test_stats_and_reload() {
    let mut api = TestApi::start().await;

    api.post("/api/check/videos", json!({"ids": ["dQw4w9WgXcQ"]}))
        .await;
    let stats = api.get("/api/stats").await;
    assert!(stats["decisions"].is_u64());

    let body = api.post("/api/settings/reload", json!({})).await;
    assert_eq!(body["status"], json!("reload_triggered"));
    assert!(api.reload_rx.recv().await.is_some());
}
