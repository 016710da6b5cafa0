use super::*;
use crate::camera::CameraHandle;
use crate::capture::{CaptureCoordinator, CaptureSettings};
use crate::frame::Frame;
use crate::monitor::MonitorState;
use crate::testing::{solid_frame, wait_until, ControlledSource, SourceControl};
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use futures::{pin_mut, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

const QUALITY: u8 = 80;

struct TestApp {
    dir: TempDir,
    control: SourceControl,
    state: AppState,
}

impl TestApp {
    fn new(frame: Option<Frame>, dwell: Duration) -> Self {
        let dir = TempDir::new().unwrap();
        let (source, control) = ControlledSource::new(frame);
        let monitor = Arc::new(MonitorState::new(CameraHandle::new(
            Box::new(source),
            (64, 48),
        )));
        let shutdown = CancellationToken::new();
        let coordinator = Arc::new(CaptureCoordinator::new(
            Arc::clone(&monitor),
            CaptureSettings {
                samples_dir: dir.path().to_path_buf(),
                default_prefix: "sample".to_string(),
                freeze_dwell: dwell,
                jpeg_quality: 90,
            },
            shutdown.clone(),
        ));

        Self {
            dir,
            control,
            state: AppState {
                monitor,
                coordinator,
                stream: StreamSettings {
                    frame_delay: Duration::from_millis(1),
                    jpeg_quality: QUALITY,
                },
                shutdown,
            },
        }
    }

    fn router(&self) -> Router {
        build_router(self.state.clone(), self.dir.path())
    }

    async fn get(&self, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = self
            .router()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    async fn post_capture(&self, body: &str) -> serde_json::Value {
        let response = self
            .router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/capture")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    async fn wait_idle(&self) {
        let coordinator = Arc::clone(&self.state.coordinator);
        assert!(wait_until(|| !coordinator.is_capturing(), Duration::from_secs(2)).await);
    }
}

fn part_for(frame: &Frame) -> bytes::Bytes {
    frame_part(&frame.encode_jpeg(QUALITY).unwrap())
}

#[test]
fn test_frame_part_layout() {
    let part = frame_part(&[0xFF, 0xD8, 0xFF, 0xD9]);

    let mut expected = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n".to_vec();
    expected.extend_from_slice(&[0xFF, 0xD8, 0xFF, 0xD9]);
    expected.extend_from_slice(b"\r\n");
    assert_eq!(part.as_ref(), expected.as_slice());
}

#[test]
fn test_capture_request_parsing() {
    let request = CaptureRequest::from_body(br#"{"user_name": "bob", "device_id": "barn2"}"#);
    assert_eq!(request.user_name.as_deref(), Some("bob"));
    assert_eq!(request.device_id.as_deref(), Some("barn2"));

    let partial = CaptureRequest::from_body(br#"{"device_id": "barn2"}"#);
    assert_eq!(partial.user_name, None);

    assert!(CaptureRequest::from_body(b"").device_id.is_none());
    assert!(CaptureRequest::from_body(b"  \n").device_id.is_none());
    assert!(CaptureRequest::from_body(b"{not json").device_id.is_none());
    assert!(CaptureRequest::from_body(b"[1, 2]").device_id.is_none());
}

#[tokio::test]
async fn test_stream_serves_live_frames() {
    let app = TestApp::new(Some(solid_frame(10)), Duration::from_millis(10));
    let stream = frame_stream(
        Arc::clone(&app.state.monitor),
        app.state.stream.clone(),
        app.state.shutdown.clone(),
    );
    pin_mut!(stream);

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first, part_for(&solid_frame(10)));

    app.control.set_frame(Some(solid_frame(20)));
    let second = stream.next().await.unwrap().unwrap();
    assert_eq!(second, part_for(&solid_frame(20)));
}

#[tokio::test]
async fn test_stream_substitutes_blank_frame() {
    let app = TestApp::new(None, Duration::from_millis(10));
    let stream = frame_stream(
        Arc::clone(&app.state.monitor),
        app.state.stream.clone(),
        app.state.shutdown.clone(),
    );
    pin_mut!(stream);

    let part = stream.next().await.unwrap().unwrap();

    assert_eq!(part, part_for(&Frame::blank(64, 48)));
}

#[tokio::test]
async fn test_stream_holds_frozen_frame() {
    let app = TestApp::new(Some(solid_frame(10)), Duration::from_millis(10));
    app.state.monitor.freeze.freeze(solid_frame(99));
    let stream = frame_stream(
        Arc::clone(&app.state.monitor),
        app.state.stream.clone(),
        app.state.shutdown.clone(),
    );
    pin_mut!(stream);

    let frozen = part_for(&solid_frame(99));
    for _ in 0..3 {
        assert_eq!(stream.next().await.unwrap().unwrap(), frozen);
    }

    app.state.monitor.freeze.thaw();
    assert_eq!(
        stream.next().await.unwrap().unwrap(),
        part_for(&solid_frame(10))
    );
}

#[tokio::test]
async fn test_stream_ends_on_shutdown() {
    let app = TestApp::new(Some(solid_frame(10)), Duration::from_millis(10));
    let stream = frame_stream(
        Arc::clone(&app.state.monitor),
        StreamSettings {
            frame_delay: Duration::from_secs(30),
            jpeg_quality: QUALITY,
        },
        app.state.shutdown.clone(),
    );
    pin_mut!(stream);

    assert!(stream.next().await.is_some());
    app.state.shutdown.cancel();

    let end = tokio::time::timeout(Duration::from_secs(2), stream.next())
        .await
        .unwrap();
    assert!(end.is_none());
}

#[tokio::test]
async fn test_video_feed_response() {
    let app = TestApp::new(Some(solid_frame(10)), Duration::from_millis(10));

    let response = app
        .router()
        .oneshot(
            Request::builder()
                .uri("/video_feed")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "multipart/x-mixed-replace; boundary=frame"
    );

    let mut body = response.into_body().into_data_stream();
    let first = body.next().await.unwrap().unwrap();
    assert!(first.starts_with(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n\xFF\xD8"));
    assert!(first.ends_with(b"\r\n"));
}

#[tokio::test]
async fn test_index_page_links_endpoints() {
    let app = TestApp::new(None, Duration::from_millis(10));

    let (status, body) = app.get("/").await;
    let html = String::from_utf8(body).unwrap();

    assert_eq!(status, StatusCode::OK);
    assert!(html.contains(r#"src="/video_feed""#));
    assert!(html.contains("/capture"));
    assert!(html.contains("/last_sample"));
}

#[tokio::test]
async fn test_last_sample_before_any_capture() {
    let app = TestApp::new(None, Duration::from_millis(10));

    let (status, body) = app.get("/last_sample").await;
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["egg_count"], "");
    assert_eq!(json["sample_image_filename"], "");
    assert!(json["sample_image_url"].is_null());
}

#[tokio::test]
async fn test_capture_endpoint_records_requester() {
    let app = TestApp::new(Some(solid_frame(10)), Duration::from_millis(10));

    let json = app
        .post_capture(r#"{"user_name": "alice", "device_id": "device1"}"#)
        .await;
    assert_eq!(json["status"], "capturing");
    assert_eq!(json["user_name"], "alice");
    assert_eq!(json["device_id"], "device1");

    app.wait_idle().await;
    let (_, body) = app.get("/last_sample").await;
    let sample: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let filename = sample["sample_image_filename"].as_str().unwrap().to_string();

    assert!(filename.starts_with("device1_"));
    assert_eq!(sample["user_name"], "alice");
    assert_eq!(sample["egg_count"], "");
    assert_eq!(sample["sample_image_url"], format!("/samples/{}", filename));

    let (status, image) = app.get(&format!("/samples/{}", filename)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&image[..2], &[0xFF, 0xD8]);
}

#[tokio::test]
async fn test_capture_endpoint_defaults_metadata() {
    let app = TestApp::new(Some(solid_frame(10)), Duration::from_millis(10));

    let json = app.post_capture("this is not json").await;

    assert_eq!(json["status"], "capturing");
    assert_eq!(json["user_name"], "unknown_user");
    assert_eq!(json["device_id"], "unknown_device");
    app.wait_idle().await;
}

#[tokio::test]
async fn test_capture_endpoint_reports_busy() {
    let app = TestApp::new(Some(solid_frame(10)), Duration::from_millis(500));

    assert_eq!(app.post_capture("").await["status"], "capturing");
    assert_eq!(app.post_capture("").await["status"], "busy");

    let (_, body) = app.get("/health").await;
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["capture_in_progress"], true);

    app.wait_idle().await;
}

#[tokio::test]
async fn test_capture_without_frame_still_answers() {
    let app = TestApp::new(None, Duration::from_millis(10));

    assert_eq!(app.post_capture("").await["status"], "capturing");
    app.wait_idle().await;

    let (_, body) = app.get("/last_sample").await;
    let sample: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(sample["sample_image_filename"], "");
}

#[tokio::test]
async fn test_samples_route_serves_files() {
    let app = TestApp::new(None, Duration::from_millis(10));
    std::fs::write(app.dir.path().join("x_20240101-000000.jpg"), [1u8, 2, 3]).unwrap();

    let (status, body) = app.get("/samples/x_20240101-000000.jpg").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, vec![1, 2, 3]);

    let (status, _) = app.get("/samples/missing.jpg").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_samples_route_hides_partial_writes() {
    let app = TestApp::new(None, Duration::from_millis(10));
    std::fs::write(
        app.dir.path().join("x_20240101-000000.jpg.partial"),
        [1u8, 2],
    )
    .unwrap();

    let (status, _) = app.get("/samples/x_20240101-000000.jpg.partial").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get("/samples/x_20240101-000000.jpg%2Epartial").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_reports_state() {
    let app = TestApp::new(None, Duration::from_millis(10));

    let (status, body) = app.get("/health").await;
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["capture_in_progress"], false);
    assert_eq!(health["frozen"], false);
    assert_eq!(health["sample_id"], 0);
}

#[tokio::test]
async fn test_server_serves_until_shutdown() {
    let app = TestApp::new(None, Duration::from_millis(10));
    let server = HttpServer::bind("127.0.0.1:0", app.router()).await.unwrap();
    let addr = server.local_addr().unwrap();
    let shutdown = app.state.shutdown.clone();
    let handle = tokio::spawn(server.serve(shutdown.clone()));

    let response = reqwest::get(format!("http://{}/last_sample", addr))
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_bind_failure_is_reported() {
    let app = TestApp::new(None, Duration::from_millis(10));
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let address = taken.local_addr().unwrap().to_string();

    let result = HttpServer::bind(&address, app.router()).await;

    assert!(matches!(
        result,
        Err(crate::error::EggcamError::Stream(
            crate::error::StreamError::BindFailed { .. }
        ))
    ));
}
