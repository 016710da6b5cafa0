mod coordinator;
mod scheduler;
mod storage;

pub use coordinator::{
    CaptureCoordinator, CaptureGuard, CaptureOutcome, CaptureSettings, CaptureTrigger,
};
pub use scheduler::run_capture_schedule;
pub use storage::{ensure_samples_dir, write_sample};
