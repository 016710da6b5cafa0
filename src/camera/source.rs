use crate::error::Result;
use crate::frame::Frame;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, trace};

/// A camera that can hand out one frame at a time.
///
/// Implementations own their reconnect logic: a failed read returns
/// `CameraError::Unavailable` and the next call is expected to try again.
#[async_trait]
pub trait FrameSource: Send {
    /// Read the most recent frame from the device
    async fn read_frame(&mut self) -> Result<Frame>;

    /// Human-readable description for logging
    fn describe(&self) -> String;

    /// Release the underlying device
    async fn release(&mut self) {}
}

/// Serialises access to a single frame source.
///
/// The stream generator and the capture coordinator both read through this
/// handle so the device never sees concurrent reads.
pub struct CameraHandle {
    source: Mutex<Box<dyn FrameSource>>,
    fallback_resolution: (u32, u32),
}

impl CameraHandle {
    pub fn new(source: Box<dyn FrameSource>, fallback_resolution: (u32, u32)) -> Self {
        Self {
            source: Mutex::new(source),
            fallback_resolution,
        }
    }

    /// Read one frame, propagating unavailability
    pub async fn read_frame(&self) -> Result<Frame> {
        let mut source = self.source.lock().await;
        source.read_frame().await
    }

    /// Read one frame, substituting a blank frame when the device has none
    pub async fn read_or_blank(&self) -> Frame {
        match self.read_frame().await {
            Ok(frame) => frame,
            Err(e) => {
                trace!("Substituting blank frame: {}", e);
                self.blank_frame()
            }
        }
    }

    pub fn blank_frame(&self) -> Frame {
        Frame::blank(self.fallback_resolution.0, self.fallback_resolution.1)
    }

    pub async fn describe(&self) -> String {
        self.source.lock().await.describe()
    }

    /// Release the device; later reads are up to the source to handle
    pub async fn release(&self) {
        let mut source = self.source.lock().await;
        debug!("Releasing frame source {}", source.describe());
        source.release().await;
    }
}

