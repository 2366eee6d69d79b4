//! End-to-end tests for the downloads service
//!
//! A mock file server stands in for the remote CDN; the downloads service is
//! bound on a random port and driven over real HTTP and websocket clients:
//! 1. Register a progress listener over `/ws/download-progress`
//! 2. Submit a batch over `POST /downloads/batch`
//! 3. The download actor fetches every file (with retries) and uploads it
//! 4. Progress arrives per file; the socket is closed after the last one

use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    routing::get,
};
use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::time::{Duration, sleep, timeout};
use tokio_tungstenite::tungstenite::{self, Message};

use herald::api::downloads_router;
use herald::api::state::DownloadsState;
use herald::auth::{TokenVerifier, sign};
use herald::config::Config;
use herald::downloads::{Cluster, DownloadManager, ProgressMessage};
use herald::ledger::{DownloadsRepository, FjallStore};
use herald::observability::Metrics;
use herald::storage::StorageClient;
use herald::worker::{HttpConfig, HttpFetcher};

const DOMAIN_SECRET: &str = "domain-secret";
const FLAKY_FAILURES: u32 = 2;

/// What the mock file server saw: hit count per path and every User-Agent
#[derive(Clone, Default)]
struct Remote {
    hits: Arc<Mutex<HashMap<String, u32>>>,
    user_agents: Arc<Mutex<Vec<String>>>,
}

impl Remote {
    fn record(&self, headers: &HeaderMap, path: String) -> u32 {
        let agent = headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        self.user_agents.lock().push(agent);

        let mut hits = self.hits.lock();
        let count = hits.entry(path).or_default();
        *count += 1;
        *count
    }
}

/// Test context holding the running services
struct E2EContext {
    service_url: String,
    files_url: String,
    remote: Remote,
    storage: StorageClient,
    state: DownloadsState,
    _temp_dir: TempDir,
}

impl E2EContext {
    async fn setup() -> Self {
        let remote = Remote::default();
        let files_url = start_mock_server(remote.clone()).await;

        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.downloads.user_agent = "herald-e2e/1".to_string();
        config.downloads.retry_backoff_ms = 10;
        config.downloads.listener_write_timeout_ms = 1000;

        let ledger = Arc::new(FjallStore::open(temp_dir.path().join("ledger")).unwrap());
        let storage = StorageClient::in_memory();
        let fetcher = HttpFetcher::new(HttpConfig::from(&config.downloads)).unwrap();
        let metrics = Arc::new(Metrics::new());

        let manager = DownloadManager::spawn(
            &config.downloads,
            Arc::new(fetcher),
            Arc::new(storage.clone()),
            ledger.clone(),
            metrics.clone(),
        );

        let state = DownloadsState {
            config: Arc::new(config),
            manager: Arc::new(manager),
            ledger,
            cluster_tokens: Arc::new(TokenVerifier::new(DOMAIN_SECRET)),
            metrics,
        };

        let service_addr = serve(downloads_router(state.clone())).await;

        Self {
            service_url: format!("http://{service_addr}"),
            files_url,
            remote,
            storage,
            state,
            _temp_dir: temp_dir,
        }
    }

    fn progress_url(&self, download_id: &str) -> String {
        format!(
            "{}/ws/download-progress?download_uuid={download_id}",
            self.service_url.replacen("http://", "ws://", 1)
        )
    }

    fn file(&self, path: &str) -> String {
        format!("{}/{path}", self.files_url)
    }

    fn hits(&self, path: &str) -> u32 {
        self.remote.hits.lock().get(path).copied().unwrap_or(0)
    }

    /// Connect a progress client and wait until the service has registered it
    async fn listen(
        &self,
        download_id: &str,
    ) -> tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>> {
        let (ws, _) = tokio_tungstenite::connect_async(self.progress_url(download_id))
            .await
            .unwrap();

        timeout(Duration::from_secs(5), async {
            while !self.state.manager.has_listener(download_id) {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("listener was not registered");

        ws
    }

    async fn submit(&self, download_id: &str, urls: &[String]) -> serde_json::Value {
        let token = sign(
            DOMAIN_SECRET,
            &Cluster {
                uuid: "cluster-1".to_string(),
                fs_path: "clusters/main".to_string(),
                ..Cluster::default()
            },
        )
        .unwrap();

        let body = json!({
            "cluster_token": token,
            "category_id": "cat-1",
            "urls": urls,
            "download_uuid": download_id,
        });

        let response = reqwest::Client::new()
            .post(format!("{}/downloads/batch", self.service_url))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);

        serde_json::from_slice(&response.bytes().await.unwrap()).unwrap()
    }
}

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// `/files/*` always succeeds, `/flaky/*` fails twice first, `/missing/*` never succeeds
async fn start_mock_server(remote: Remote) -> String {
    let app = Router::new()
        .route("/files/{name}", get(serve_file))
        .route("/flaky/{name}", get(serve_flaky))
        .route("/missing/{name}", get(serve_missing))
        .with_state(remote);

    format!("http://{}", serve(app).await)
}

async fn serve_file(
    State(remote): State<Remote>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> String {
    remote.record(&headers, format!("files/{name}"));
    format!("content of {name}")
}

async fn serve_flaky(
    State(remote): State<Remote>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Result<String, StatusCode> {
    if remote.record(&headers, format!("flaky/{name}")) <= FLAKY_FAILURES {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    Ok(format!("content of {name}"))
}

async fn serve_missing(
    State(remote): State<Remote>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> StatusCode {
    remote.record(&headers, format!("missing/{name}"));
    StatusCode::NOT_FOUND
}

async fn next_message<S>(ws: &mut S) -> Option<Message>
where
    S: futures::Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    timeout(Duration::from_secs(10), ws.next())
        .await
        .expect("timed out waiting for a websocket message")
        .and_then(|m| m.ok())
}

async fn next_progress<S>(ws: &mut S) -> ProgressMessage
where
    S: futures::Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    match next_message(ws).await {
        Some(Message::Text(text)) => serde_json::from_str(text.as_str()).unwrap(),
        other => panic!("expected a progress message, got {other:?}"),
    }
}

/// Test: progress for every file, then the server closes the socket
#[tokio::test]
async fn test_progress_reported_per_file_then_closed() {
    let ctx = E2EContext::setup().await;
    let mut ws = ctx.listen("d1").await;

    let urls = vec![
        ctx.file("files/a.jpg"),
        ctx.file("files/b.jpg"),
        ctx.file("files/c.jpg"),
    ];
    let accepted = ctx.submit("d1", &urls).await;
    assert_eq!(accepted["download_uuid"], "d1");

    for position in 1..=3 {
        let progress = next_progress(&mut ws).await;
        assert_eq!(progress.download_uuid, "d1");
        assert_eq!(progress.total_files, 3);
        assert_eq!(progress.downloaded_files, position);
        assert_eq!(progress.completed, position == 3);
    }

    match next_message(&mut ws).await {
        Some(Message::Close(_)) | None => {}
        other => panic!("expected the server to close, got {other:?}"),
    }

    ctx.state.manager.actor().wait_processed(1).await;
    let stored = ctx.storage.get("clusters/main/cat-1/b.jpg").await.unwrap();
    assert_eq!(&stored[..], b"content of b.jpg");

    let agents = ctx.remote.user_agents.lock().clone();
    assert_eq!(agents.len(), 3);
    assert!(agents.iter().all(|agent| *agent == ctx.state.config.downloads.user_agent));
    assert!(!ctx.state.manager.has_listener("d1"));
}

/// Test: a flaky file succeeds on the third attempt, a missing one fails after three
#[tokio::test]
async fn test_retry_then_settle() {
    let ctx = E2EContext::setup().await;
    let mut ws = ctx.listen("d2").await;

    let flaky = ctx.file("flaky/x.jpg");
    let missing = ctx.file("missing/y.jpg");
    ctx.submit("d2", &[flaky.clone(), missing.clone()]).await;

    let first = next_progress(&mut ws).await;
    assert_eq!(first.failed_files, 0);
    let last = next_progress(&mut ws).await;
    assert!(last.completed);
    assert_eq!(last.failed_files, 1);

    ctx.state.manager.actor().wait_processed(1).await;
    assert_eq!(ctx.hits("flaky/x.jpg"), FLAKY_FAILURES + 1);
    assert_eq!(ctx.hits("missing/y.jpg"), 3);

    let record = ctx.state.ledger.get("d2").unwrap().unwrap();
    let downloaded = record.downloaded_urls();
    assert!(downloaded.contains(flaky.as_str()));
    assert!(!downloaded.contains(missing.as_str()));
    assert_eq!(record.files.len(), 2);
}

/// Test: resubmitting under the same id only fetches what is not downloaded yet
#[tokio::test]
async fn test_resubmission_skips_downloaded_files() {
    let ctx = E2EContext::setup().await;

    let done = ctx.file("files/a.jpg");
    let missing = ctx.file("missing/b.jpg");
    ctx.submit("d3", &[done.clone(), missing.clone()]).await;
    ctx.state.manager.actor().wait_processed(1).await;

    let accepted = ctx.submit("d3", &[done, missing]).await;
    assert_eq!(accepted["queued_files"], 1);
    ctx.state.manager.actor().wait_processed(2).await;

    assert_eq!(ctx.hits("files/a.jpg"), 1);
    assert_eq!(ctx.hits("missing/b.jpg"), 6);

    let response = reqwest::get(format!(
        "{}/download-history/download?download_uuid=d3",
        ctx.service_url
    ))
    .await
    .unwrap();
    let history: serde_json::Value =
        serde_json::from_slice(&response.bytes().await.unwrap()).unwrap();
    assert_eq!(history["exists"], true);
    assert_eq!(history["download_count"], 2);
}

/// Test: one progress listener per download
#[tokio::test]
async fn test_second_progress_listener_is_refused() {
    let ctx = E2EContext::setup().await;
    let _first = ctx.listen("d4").await;

    match tokio_tungstenite::connect_async(ctx.progress_url("d4")).await {
        Err(tungstenite::Error::Http(response)) => {
            assert_eq!(response.status(), StatusCode::CONFLICT)
        }
        other => panic!("expected 409, got {:?}", other.map(|(_, r)| r.status())),
    }

    let missing_param = ctx
        .progress_url("")
        .replace("?download_uuid=", "");
    match tokio_tungstenite::connect_async(missing_param).await {
        Err(tungstenite::Error::Http(response)) => {
            assert_eq!(response.status(), StatusCode::BAD_REQUEST)
        }
        other => panic!("expected 400, got {:?}", other.map(|(_, r)| r.status())),
    }

    assert!(ctx.state.manager.has_listener("d4"));
}

/// Test: a client that hangs up before its download runs frees the slot
#[tokio::test]
async fn test_listener_released_on_client_close() {
    let ctx = E2EContext::setup().await;
    let mut ws = ctx.listen("d5").await;

    futures::SinkExt::close(&mut ws).await.unwrap();

    timeout(Duration::from_secs(5), async {
        while ctx.state.manager.has_listener("d5") {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("listener was not released");

    let _again = ctx.listen("d5").await;
}
