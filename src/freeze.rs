use crate::frame::Frame;
use parking_lot::Mutex;

/// Whether the live stream is showing camera output or a captured frame.
///
/// A frozen state always carries its frame.
#[derive(Debug, Clone, Default)]
pub enum FreezeState {
    #[default]
    Live,
    Frozen(Frame),
}

impl FreezeState {
    pub fn is_active(&self) -> bool {
        matches!(self, FreezeState::Frozen(_))
    }

    pub fn frame(&self) -> Option<&Frame> {
        match self {
            FreezeState::Frozen(frame) => Some(frame),
            FreezeState::Live => None,
        }
    }
}

/// Freeze-mode cell shared by the capture coordinator and stream readers
#[derive(Debug, Default)]
pub struct FreezeCell {
    state: Mutex<FreezeState>,
}

impl FreezeCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `frame` to stream readers until `thaw` is called
    pub fn freeze(&self, frame: Frame) {
        *self.state.lock() = FreezeState::Frozen(frame);
    }

    /// Return to live output, releasing the frozen frame. Returns whether
    /// the cell was frozen.
    pub fn thaw(&self) -> bool {
        let previous = std::mem::take(&mut *self.state.lock());
        previous.is_active()
    }

    /// Handle to the frozen frame, if any
    pub fn frozen_frame(&self) -> Option<Frame> {
        self.state.lock().frame().cloned()
    }

    pub fn snapshot(&self) -> FreezeState {
        self.state.lock().clone()
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().is_active()
    }
}
