/// Component lifecycle states
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
}

/// System shutdown reason
#[derive(Debug, Clone)]
pub enum ShutdownReason {
    Signal(String),
    Error(String),
}

/// Components tracked by the orchestrator, in start order
pub(super) const CAMERA: &str = "camera";
pub(super) const HTTP: &str = "http";
pub(super) const SCHEDULER: &str = "scheduler";
pub(super) const BACKGROUND: &str = "background";
