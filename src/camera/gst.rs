use super::source::FrameSource;
use crate::config::CameraConfig;
use crate::error::{CameraError, Result};
use crate::frame::{Frame, PixelLayout};
use async_trait::async_trait;
use gstreamer::prelude::*;
use gstreamer::Pipeline;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Consecutive failed pulls before the pipeline is cycled
const RESTART_AFTER_FAILURES: u32 = 3;

/// GStreamer-backed source for V4L2 devices and network streams
pub struct GstFrameSource {
    config: CameraConfig,
    pipeline: Pipeline,
    appsink: AppSink,
    consecutive_failures: u32,
}

impl GstFrameSource {
    /// Build and start the capture pipeline
    pub fn open(config: CameraConfig) -> Result<Self> {
        info!(
            "Initializing GStreamer frame source {} ({}x{} @ {}fps)",
            config.source, config.resolution.0, config.resolution.1, config.fps
        );

        gstreamer::init().map_err(|e| CameraError::Configuration {
            details: format!("Failed to initialize GStreamer: {}", e),
        })?;

        let pipeline_desc = build_pipeline_string(&config);
        info!("Creating GStreamer pipeline: {}", pipeline_desc);

        let pipeline = gstreamer::parse::launch(&pipeline_desc)
            .map_err(|e| CameraError::Configuration {
                details: format!("Failed to create pipeline: {}", e),
            })?
            .downcast::<Pipeline>()
            .map_err(|_| CameraError::Configuration {
                details: "Failed to downcast to Pipeline".to_string(),
            })?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| CameraError::Configuration {
                details: "Pipeline has no appsink named 'sink'".to_string(),
            })?
            .downcast::<AppSink>()
            .map_err(|_| CameraError::Configuration {
                details: "Failed to downcast to AppSink".to_string(),
            })?;

        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| CameraError::Configuration {
                details: format!("Failed to start pipeline: {}", e),
            })?;

        info!("GStreamer pipeline started successfully");

        Ok(Self {
            config,
            pipeline,
            appsink,
            consecutive_failures: 0,
        })
    }

    fn restart_pipeline(&mut self) {
        warn!(
            "Frame source {} stalled; restarting pipeline",
            self.config.source
        );
        let _ = self.pipeline.set_state(gstreamer::State::Null);
        if let Err(e) = self.pipeline.set_state(gstreamer::State::Playing) {
            error!("Failed to restart GStreamer pipeline: {}", e);
        }
        self.consecutive_failures = 0;
    }

    fn record_failure(&mut self) {
        self.consecutive_failures += 1;
        if self.appsink.is_eos() || self.consecutive_failures >= RESTART_AFTER_FAILURES {
            self.restart_pipeline();
        }
    }
}

#[async_trait]
impl FrameSource for GstFrameSource {
    async fn read_frame(&mut self) -> Result<Frame> {
        let appsink = self.appsink.clone();
        let timeout = Duration::from_millis(self.config.read_timeout_ms);

        let pulled = tokio::task::spawn_blocking(move || {
            appsink.try_pull_sample(gstreamer::ClockTime::from_mseconds(
                timeout.as_millis() as u64,
            ))
        })
        .await
        .map_err(|e| CameraError::Unavailable {
            details: format!("Frame pull task failed: {}", e),
        })?;

        let Some(sample) = pulled else {
            self.record_failure();
            return Err(CameraError::Unavailable {
                details: format!("No frame from {} within {:?}", self.config.source, timeout),
            }
            .into());
        };

        match sample_to_frame(&sample) {
            Ok(frame) => {
                self.consecutive_failures = 0;
                trace!("Pulled {}x{} frame", frame.width, frame.height);
                Ok(frame)
            }
            Err(e) => {
                self.record_failure();
                Err(e)
            }
        }
    }

    fn describe(&self) -> String {
        format!("gstreamer {}", self.config.source)
    }

    async fn release(&mut self) {
        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            warn!("Failed to stop GStreamer pipeline: {}", e);
        } else {
            debug!("GStreamer pipeline stopped");
        }
    }
}

/// Build the pipeline description for a device index, device path or URI
fn build_pipeline_string(config: &CameraConfig) -> String {
    let (width, height) = config.resolution;
    let input = if let Ok(index) = config.source.parse::<u32>() {
        format!("v4l2src device=/dev/video{}", index)
    } else if config.source.starts_with("/dev/") {
        format!("v4l2src device={}", config.source)
    } else {
        format!("uridecodebin uri={}", config.source)
    };

    format!(
        "{} ! videorate ! videoconvert ! videoscale ! \
         video/x-raw,format=RGB,width={},height={},framerate={}/1 ! \
         appsink name=sink sync=false max-buffers=1 drop=true enable-last-sample=false",
        input, width, height, config.fps
    )
}

/// Copy an RGB sample into a tightly packed frame
fn sample_to_frame(sample: &gstreamer::Sample) -> Result<Frame> {
    let buffer = sample.buffer().ok_or_else(|| CameraError::Unavailable {
        details: "No buffer in sample".to_string(),
    })?;

    let caps = sample.caps().ok_or_else(|| CameraError::Unavailable {
        details: "No caps in sample".to_string(),
    })?;

    let video_info = VideoInfo::from_caps(caps).map_err(|e| CameraError::Unavailable {
        details: format!("Failed to get video info: {}", e),
    })?;

    let width = video_info.width();
    let height = video_info.height();
    let stride = video_info.stride()[0] as usize;
    let row_bytes = width as usize * PixelLayout::Rgb24.channels();

    let map = buffer
        .map_readable()
        .map_err(|e| CameraError::Unavailable {
            details: format!("Failed to map buffer: {}", e),
        })?;

    let needed = stride * (height as usize).saturating_sub(1) + row_bytes;
    if map.len() < needed {
        return Err(CameraError::Unavailable {
            details: format!("Short buffer: {} bytes, need {}", map.len(), needed),
        }
        .into());
    }

    let mut data = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        data.extend_from_slice(&map[start..start + row_bytes]);
    }

    Frame::new(width, height, PixelLayout::Rgb24, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera_config(source: &str) -> CameraConfig {
        CameraConfig {
            source: source.to_string(),
            resolution: (640, 480),
            fps: 15,
            read_timeout_ms: 500,
        }
    }

    #[test]
    fn test_pipeline_for_device_index() {
        let desc = build_pipeline_string(&camera_config("2"));

        assert!(desc.starts_with("v4l2src device=/dev/video2 !"));
        assert!(desc.contains("width=640,height=480,framerate=15/1"));
        assert!(desc.contains("appsink name=sink"));
    }

    #[test]
    fn test_pipeline_for_device_path() {
        let desc = build_pipeline_string(&camera_config("/dev/video7"));

        assert!(desc.starts_with("v4l2src device=/dev/video7 !"));
    }

    #[test]
    fn test_pipeline_for_network_stream() {
        let desc = build_pipeline_string(&camera_config("rtsp://10.0.0.5/stream1"));

        assert!(desc.starts_with("uridecodebin uri=rtsp://10.0.0.5/stream1 !"));
    }
}
