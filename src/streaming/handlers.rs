use super::generator::{frame_stream, MJPEG_CONTENT_TYPE};
use super::server::AppState;
use crate::capture::CaptureTrigger;
use crate::sample::{LastSample, Requester};
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Optional body of `POST /capture`
#[derive(Debug, Default, Deserialize)]
pub struct CaptureRequest {
    pub user_name: Option<String>,
    pub device_id: Option<String>,
}

impl CaptureRequest {
    /// Parse a request body; anything unreadable counts as an empty request
    pub fn from_body(body: &[u8]) -> Self {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Self::default();
        }
        serde_json::from_slice(body).unwrap_or_else(|e| {
            debug!("Ignoring unreadable capture request body: {}", e);
            Self::default()
        })
    }
}

#[derive(Debug, Serialize)]
pub struct CaptureResponse {
    pub status: &'static str,
    pub user_name: String,
    pub device_id: String,
}

/// Viewer page: live stream, capture button and last-sample panel
pub async fn index_handler() -> Html<&'static str> {
    Html(INDEX_PAGE)
}

/// MJPEG stream; one generator per connection
pub async fn video_feed_handler(State(state): State<AppState>) -> impl IntoResponse {
    info!("New stream viewer connected");

    let stream = frame_stream(
        Arc::clone(&state.monitor),
        state.stream.clone(),
        state.shutdown.clone(),
    );

    (
        [
            (header::CONTENT_TYPE, MJPEG_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache, private"),
            (header::PRAGMA, "no-cache"),
        ],
        Body::from_stream(stream),
    )
}

/// Start a capture in the background and answer immediately
pub async fn capture_handler(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let request = CaptureRequest::from_body(&body);
    let requester = Requester::from_optional(request.user_name, request.device_id);

    let started = state
        .coordinator
        .spawn_capture(CaptureTrigger::from_request(requester.clone()));
    let status = if started { "capturing" } else { "busy" };
    info!(
        "Capture requested by {}/{}: {}",
        requester.user_name, requester.device_id, status
    );

    Json(CaptureResponse {
        status,
        user_name: requester.user_name,
        device_id: requester.device_id,
    })
}

pub async fn last_sample_handler(State(state): State<AppState>) -> Json<LastSample> {
    Json(LastSample::from(state.monitor.samples.snapshot()))
}

pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let health_info = serde_json::json!({
        "status": "healthy",
        "capture_in_progress": state.coordinator.is_capturing(),
        "frozen": state.monitor.freeze.is_active(),
        "sample_id": state.monitor.samples.current_id(),
    });

    (StatusCode::OK, Json(health_info))
}

const INDEX_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>Egg Counter</title>
    <style>
        :root { color-scheme: dark; }
        body {
            margin: 0;
            padding: 1rem;
            background: #111;
            color: #eee;
            font-family: sans-serif;
            display: flex;
            flex-wrap: wrap;
            gap: 1rem;
            justify-content: center;
        }
        img.stream {
            max-width: 100%;
            border: 1px solid #333;
            background: #000;
        }
        .panel {
            min-width: 18rem;
            display: flex;
            flex-direction: column;
            gap: 0.5rem;
        }
        .panel img { max-width: 18rem; }
        button { font-size: 1.1rem; padding: 0.5rem 1rem; }
        dt { color: #999; }
    </style>
</head>
<body>
    <img class="stream" src="/video_feed" alt="Live camera stream">
    <div class="panel">
        <button id="capture">Capture sample</button>
        <span id="capture-status"></span>
        <h2>Last sample</h2>
        <dl>
            <dt>Time</dt><dd id="timestamp">-</dd>
            <dt>Eggs</dt><dd id="egg-count">-</dd>
            <dt>Requested by</dt><dd id="requester">-</dd>
        </dl>
        <img id="sample" alt="">
    </div>
    <script>
        const $ = (id) => document.getElementById(id);

        $("capture").addEventListener("click", async () => {
            const response = await fetch("/capture", {
                method: "POST",
                headers: { "Content-Type": "application/json" },
                body: JSON.stringify({ user_name: "web_viewer", device_id: "web" }),
            });
            const body = await response.json();
            $("capture-status").textContent = body.status;
        });

        async function refresh() {
            try {
                const sample = await (await fetch("/last_sample")).json();
                $("timestamp").textContent = sample.timestamp || "-";
                $("egg-count").textContent = sample.egg_count === "" ? "pending" : sample.egg_count;
                $("requester").textContent = sample.user_name + " / " + sample.device_id;
                if (sample.sample_image_url && $("sample").dataset.src !== sample.sample_image_url) {
                    $("sample").dataset.src = sample.sample_image_url;
                    $("sample").src = sample.sample_image_url;
                }
            } catch (e) {
                $("capture-status").textContent = "offline";
            }
        }

        refresh();
        setInterval(refresh, 2000);
    </script>
</body>
</html>
"#;
