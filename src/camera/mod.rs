mod builder;
#[cfg(all(target_os = "linux", feature = "camera"))]
mod gst;
mod pattern;
mod source;

pub use builder::{open_camera, open_frame_source, TEST_PATTERN_SOURCE};
#[cfg(all(target_os = "linux", feature = "camera"))]
pub use gst::GstFrameSource;
pub use pattern::TestPatternSource;
pub use source::{CameraHandle, FrameSource};
