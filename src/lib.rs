pub mod app;
pub mod camera;
pub mod capture;
pub mod config;
pub mod error;
pub mod frame;
pub mod freeze;
pub mod indicator;
pub mod monitor;
pub mod sample;
pub mod streaming;
pub mod upload;

#[cfg(test)]
mod testing;

pub use app::{ComponentState, EggcamOrchestrator, ShutdownReason};
pub use camera::{CameraHandle, FrameSource, TestPatternSource};
pub use capture::{CaptureCoordinator, CaptureOutcome, CaptureSettings, CaptureTrigger};
pub use config::EggcamConfig;
pub use error::{EggcamError, Result};
pub use frame::{Frame, PixelLayout};
pub use freeze::{FreezeCell, FreezeState};
pub use indicator::{GpioIndicator, Indicator};
pub use monitor::MonitorState;
pub use sample::{LastSample, Requester, SampleId, SampleRecord, SampleStore};
pub use streaming::{build_router, AppState, HttpServer, StreamSettings};
pub use upload::{HttpTransport, UploadOutcome, UploadPolicy, UploadTransport};
