//! Test doubles for the camera, the inference endpoint and the indicator.

use crate::camera::FrameSource;
use crate::error::{CameraError, EggcamError, Result, UploadError};
use crate::frame::{Frame, PixelLayout};
use crate::indicator::Indicator;
use crate::upload::{TransportResponse, UploadTransport};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Small RGB frame filled with one value
pub fn solid_frame(value: u8) -> Frame {
    Frame::new(8, 6, PixelLayout::Rgb24, vec![value; 8 * 6 * 3]).unwrap()
}

/// Poll `condition` until it holds or `timeout` elapses
pub async fn wait_until<F: Fn() -> bool>(condition: F, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

#[derive(Default)]
struct SourceState {
    current: Option<Frame>,
    reads: usize,
}

/// Frame source whose output is switched by the test through a `SourceControl`
pub struct ControlledSource {
    state: Arc<Mutex<SourceState>>,
}

#[derive(Clone)]
pub struct SourceControl {
    state: Arc<Mutex<SourceState>>,
}

impl ControlledSource {
    pub fn new(initial: Option<Frame>) -> (Self, SourceControl) {
        let state = Arc::new(Mutex::new(SourceState {
            current: initial,
            reads: 0,
        }));
        (
            Self {
                state: Arc::clone(&state),
            },
            SourceControl { state },
        )
    }
}

impl SourceControl {
    pub fn set_frame(&self, frame: Option<Frame>) {
        self.state.lock().current = frame;
    }

    pub fn reads(&self) -> usize {
        self.state.lock().reads
    }
}

#[async_trait]
impl FrameSource for ControlledSource {
    async fn read_frame(&mut self) -> Result<Frame> {
        let mut state = self.state.lock();
        state.reads += 1;
        state.current.clone().ok_or_else(|| {
            EggcamError::from(CameraError::Unavailable {
                details: "scripted outage".to_string(),
            })
        })
    }

    fn describe(&self) -> String {
        "controlled test source".to_string()
    }
}

/// A recorded call to the scripted transport
#[derive(Debug, Clone)]
pub struct RecordedAttempt {
    pub at: Instant,
    pub file_name: String,
    pub bytes: usize,
}

/// Inference endpoint double that replays scripted responses.
///
/// Once the script runs out every call answers HTTP 500.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<std::result::Result<TransportResponse, UploadError>>>,
    attempts: Mutex<Vec<RecordedAttempt>>,
    gate: Option<Arc<Notify>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<std::result::Result<TransportResponse, UploadError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            attempts: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    /// Hold every call until the returned `Notify` is signalled
    pub fn gated(
        script: Vec<std::result::Result<TransportResponse, UploadError>>,
    ) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let mut transport = Self::new(script);
        transport.gate = Some(Arc::clone(&gate));
        (transport, gate)
    }

    pub fn attempts(&self) -> Vec<RecordedAttempt> {
        self.attempts.lock().clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().len()
    }
}

pub fn ok_json(body: &str) -> std::result::Result<TransportResponse, UploadError> {
    Ok(TransportResponse {
        status: 200,
        body: Bytes::from(body.to_string()),
    })
}

pub fn status(code: u16) -> std::result::Result<TransportResponse, UploadError> {
    Ok(TransportResponse {
        status: code,
        body: Bytes::from_static(b"{}"),
    })
}

#[async_trait]
impl UploadTransport for ScriptedTransport {
    async fn post_image(
        &self,
        file_name: &str,
        jpeg: Bytes,
    ) -> std::result::Result<TransportResponse, UploadError> {
        self.attempts.lock().push(RecordedAttempt {
            at: Instant::now(),
            file_name: file_name.to_string(),
            bytes: jpeg.len(),
        });

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let next = self.script.lock().pop_front();
        next.unwrap_or_else(|| status(500))
    }
}

/// Indicator double that counts pulses and can be told to fail
pub struct RecordingIndicator {
    pulses: AtomicUsize,
    fail: bool,
}

impl RecordingIndicator {
    pub fn new(fail: bool) -> Self {
        Self {
            pulses: AtomicUsize::new(0),
            fail,
        }
    }

    pub fn pulses(&self) -> usize {
        self.pulses.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Indicator for RecordingIndicator {
    async fn pulse(&self, _shutdown: &CancellationToken) -> Result<()> {
        self.pulses.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(EggcamError::component("indicator", "scripted failure"));
        }
        Ok(())
    }
}
