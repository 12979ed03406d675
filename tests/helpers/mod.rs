#![allow(dead_code)]

use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

use imgbatch::app_state::AppState;
use imgbatch::db;
use imgbatch::models::task::Task;
use imgbatch::routes;
use imgbatch::services::dispatch::JobDispatcher;
use imgbatch::services::processor::ImageProcessor;
use imgbatch::services::webhook::WebhookNotifier;

pub const BOUNDARY: &str = "imgbatch-test-boundary";

/// Fully wired application over a temp-dir SQLite database and output
/// directory. Dropping it removes the temp dir.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub db: SqlitePool,
    pub output_dir: PathBuf,
    _tmp: TempDir,
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with_concurrency(4).await
}

pub async fn spawn_app_with_concurrency(worker_concurrency: usize) -> TestApp {
    let tmp = TempDir::new().expect("Failed to create temp dir");

    let db_path = tmp.path().join("test.db");
    let database_url = format!("sqlite://{}", db_path.display());
    let pool = db::init_pool(&database_url)
        .await
        .expect("Failed to open test database");
    db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    let output_dir = tmp.path().join("static");
    std::fs::create_dir_all(&output_dir).expect("Failed to create output dir");

    let notifier =
        WebhookNotifier::new(Duration::from_secs(2)).expect("Failed to build webhook client");
    let processor = ImageProcessor::new(
        pool.clone(),
        notifier,
        &output_dir,
        Duration::from_secs(5),
        50,
    )
    .expect("Failed to build processor");
    let dispatcher = JobDispatcher::new(pool.clone(), processor, worker_concurrency);

    let state = AppState::new(pool.clone(), dispatcher);

    TestApp {
        router: routes::router(state.clone()),
        state,
        db: pool,
        output_dir,
        _tmp: tmp,
    }
}

/// Bare storage setup for tests that bypass the HTTP layer entirely.
pub async fn setup_db() -> (SqlitePool, TempDir) {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let database_url = format!("sqlite://{}", tmp.path().join("test.db").display());
    let pool = db::init_pool(&database_url)
        .await
        .expect("Failed to open test database");
    db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    (pool, tmp)
}

/// Build a multipart upload body with a CSV `file` part and an optional
/// `webhook_url` part.
pub fn multipart_csv_body(csv: &str, webhook_url: Option<&str>) -> Vec<u8> {
    multipart_file_body(csv, "products.csv", "text/csv", webhook_url)
}

pub fn multipart_file_body(
    data: &str,
    filename: &str,
    content_type: &str,
    webhook_url: Option<&str>,
) -> Vec<u8> {
    let mut body = String::new();
    body.push_str(&format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n{data}\r\n"
    ));
    if let Some(url) = webhook_url {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"webhook_url\"\r\n\r\n{url}\r\n"
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));
    body.into_bytes()
}

pub fn upload_request(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("Failed to build request")
}

/// Send a request through the router and collect status + body bytes.
pub async fn send_request(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("Request failed");
    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    (status, body.to_vec())
}

pub async fn get_json(router: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("Failed to build request");
    let (status, body) = send_request(router, request).await;
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

/// A small PNG for the mock image server to hand out.
pub fn sample_png() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(16, 16, image::Rgb([180, 60, 20]));
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, image::ImageFormat::Png)
        .expect("Failed to encode test PNG");
    buf.into_inner()
}

/// Local HTTP server serving test images:
/// - `GET /img/{name}` returns a valid PNG
/// - `GET /missing` returns 404
/// - `GET /empty` returns 200 with an empty body
/// - `GET /garbage` returns bytes that do not decode as an image
pub struct MockImageServer {
    pub base_url: String,
}

impl MockImageServer {
    pub fn img_url(&self, name: &str) -> String {
        format!("{}/img/{}", self.base_url, name)
    }
}

pub async fn spawn_image_server() -> MockImageServer {
    let app = Router::new()
        .route("/img/{name}", get(|| async { sample_png() }))
        .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
        .route("/empty", get(|| async { Vec::<u8>::new() }))
        .route("/garbage", get(|| async { b"not an image".to_vec() }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind mock image server");
    let addr = listener.local_addr().expect("No local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Mock server died");
    });

    MockImageServer {
        base_url: format!("http://{addr}"),
    }
}

/// Local webhook endpoint recording every delivery it receives.
pub struct WebhookReceiver {
    pub url: String,
    pub hits: Arc<AtomicUsize>,
    pub payloads: Arc<Mutex<Vec<serde_json::Value>>>,
}

impl WebhookReceiver {
    pub fn hit_count(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

pub async fn spawn_webhook_receiver() -> WebhookReceiver {
    let hits = Arc::new(AtomicUsize::new(0));
    let payloads: Arc<Mutex<Vec<serde_json::Value>>> = Arc::new(Mutex::new(Vec::new()));

    let hits_handler = Arc::clone(&hits);
    let payloads_handler = Arc::clone(&payloads);
    let app = Router::new().route(
        "/hook",
        post(move |axum::Json(body): axum::Json<serde_json::Value>| {
            let hits = Arc::clone(&hits_handler);
            let payloads = Arc::clone(&payloads_handler);
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                payloads.lock().expect("poisoned").push(body);
                StatusCode::OK
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind webhook receiver");
    let addr = listener.local_addr().expect("No local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Webhook receiver died");
    });

    WebhookReceiver {
        url: format!("http://{addr}/hook"),
        hits,
        payloads,
    }
}

/// Poll the task row until it reports complete or the timeout elapses.
pub async fn wait_for_complete(pool: &SqlitePool, request_id: Uuid, timeout: Duration) -> Task {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let task = imgbatch::db::queries::get_task_by_request_id(pool, request_id)
            .await
            .expect("Status query failed")
            .expect("Task vanished");
        if task.is_complete() {
            return task;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!(
                "Batch {request_id} never completed (progress {})",
                task.progress()
            );
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// Percent-encode a URL for use inside a query-string value.
pub fn query_encode(raw: &str) -> String {
    let mut out = String::new();
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
