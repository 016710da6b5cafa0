use super::pattern::TestPatternSource;
use super::source::{CameraHandle, FrameSource};
use crate::config::CameraConfig;
use crate::error::Result;
use tracing::info;

/// Source name that selects the synthetic test pattern
pub const TEST_PATTERN_SOURCE: &str = "test";

/// Open the frame source described by the camera configuration
pub fn open_frame_source(config: &CameraConfig) -> Result<Box<dyn FrameSource>> {
    let (width, height) = config.resolution;

    if config.source == TEST_PATTERN_SOURCE {
        info!("Using test pattern frame source ({}x{})", width, height);
        return Ok(Box::new(TestPatternSource::new(width, height)));
    }

    #[cfg(all(target_os = "linux", feature = "camera"))]
    {
        let source = super::gst::GstFrameSource::open(config.clone())?;
        Ok(Box::new(source))
    }

    #[cfg(not(all(target_os = "linux", feature = "camera")))]
    {
        tracing::warn!(
            "Camera backend not available on this build; serving test pattern instead of {}",
            config.source
        );
        Ok(Box::new(TestPatternSource::new(width, height)))
    }
}

/// Open the configured source and wrap it in a shared handle
pub fn open_camera(config: &CameraConfig) -> Result<CameraHandle> {
    let source = open_frame_source(config)?;
    Ok(CameraHandle::new(source, config.resolution))
}
