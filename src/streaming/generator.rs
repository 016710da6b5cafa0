use crate::config::StreamConfig;
use crate::frame::Frame;
use crate::monitor::MonitorState;
use bytes::{Bytes, BytesMut};
use futures::Stream;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Parts are separated by the `frame` boundary
pub const MJPEG_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

const PART_HEADER: &[u8] = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n";

#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub frame_delay: Duration,
    pub jpeg_quality: u8,
}

impl From<&StreamConfig> for StreamSettings {
    fn from(config: &StreamConfig) -> Self {
        Self {
            frame_delay: Duration::from_millis(config.frame_delay_ms),
            jpeg_quality: config.jpeg_quality,
        }
    }
}

/// Wrap one JPEG as a multipart part
pub fn frame_part(jpeg: &[u8]) -> Bytes {
    let mut part = BytesMut::with_capacity(PART_HEADER.len() + jpeg.len() + 2);
    part.extend_from_slice(PART_HEADER);
    part.extend_from_slice(jpeg);
    part.extend_from_slice(b"\r\n");
    part.freeze()
}

/// The frozen frame while a capture dwell is active, otherwise a live one
pub async fn next_frame(state: &MonitorState) -> Frame {
    match state.freeze.frozen_frame() {
        Some(frame) => frame,
        None => state.camera.read_or_blank().await,
    }
}

/// Endless MJPEG part stream for one viewer.
///
/// Ends when the consumer drops it or `shutdown` fires. Frames are encoded
/// inside the poll, so nothing keeps running once the stream is gone.
pub fn frame_stream(
    state: Arc<MonitorState>,
    settings: StreamSettings,
    shutdown: CancellationToken,
) -> impl Stream<Item = Result<Bytes, Infallible>> {
    async_stream::stream! {
        let mut frames_streamed = 0u64;
        let mut bytes_streamed = 0u64;

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let frame = next_frame(&state).await;
            match frame.encode_jpeg(settings.jpeg_quality) {
                Ok(jpeg) => {
                    frames_streamed += 1;
                    bytes_streamed += jpeg.len() as u64;
                    trace!("Streaming frame {} ({} bytes)", frames_streamed, jpeg.len());
                    yield Ok::<_, Infallible>(frame_part(&jpeg));
                }
                Err(e) => {
                    warn!("Failed to encode stream frame: {}", e);
                }
            }

            if frames_streamed > 0 && frames_streamed % 1000 == 0 {
                debug!(
                    "Streamed {} frames, {:.1} MB total",
                    frames_streamed,
                    bytes_streamed as f64 / 1_048_576.0
                );
            }

            tokio::select! {
                _ = tokio::time::sleep(settings.frame_delay) => {}
                _ = shutdown.cancelled() => break,
            }
        }

        info!("Stream stopped for shutdown after {} frames", frames_streamed);
    }
}
