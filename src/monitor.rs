use crate::camera::CameraHandle;
use crate::freeze::FreezeCell;
use crate::sample::SampleStore;

/// State shared by the capture path and the HTTP handlers.
///
/// Each cell is guarded independently; no lock covers more than one of them.
pub struct MonitorState {
    pub camera: CameraHandle,
    pub freeze: FreezeCell,
    pub samples: SampleStore,
}

impl MonitorState {
    pub fn new(camera: CameraHandle) -> Self {
        Self {
            camera,
            freeze: FreezeCell::new(),
            samples: SampleStore::new(),
        }
    }
}
