use super::storage::write_sample;
use crate::config::CaptureConfig;
use crate::error::{CaptureError, Result};
use crate::indicator::Indicator;
use crate::monitor::MonitorState;
use crate::sample::{sample_filename, sanitize_prefix, Requester, SampleId};
use crate::upload::{upload_sample, UploadOutcome, UploadPolicy, UploadTransport};
use chrono::{Local, NaiveDateTime};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// Capture parameters taken from `[capture]`
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub samples_dir: PathBuf,
    pub default_prefix: String,
    pub freeze_dwell: Duration,
    pub jpeg_quality: u8,
}

impl From<&CaptureConfig> for CaptureSettings {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            samples_dir: PathBuf::from(&config.samples_dir),
            default_prefix: config.default_prefix.clone(),
            freeze_dwell: config.freeze_dwell(),
            jpeg_quality: config.jpeg_quality,
        }
    }
}

/// What started a capture and who it is attributed to
#[derive(Debug, Clone)]
pub struct CaptureTrigger {
    pub requester: Requester,
    /// File name prefix; the configured default is used when absent
    pub prefix: Option<String>,
}

impl CaptureTrigger {
    /// Timer-driven capture with default metadata
    pub fn scheduled() -> Self {
        Self {
            requester: Requester::default(),
            prefix: None,
        }
    }

    /// Explicit request; the device id names the stored file
    pub fn from_request(requester: Requester) -> Self {
        Self {
            prefix: Some(requester.device_id.clone()),
            requester,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    Captured { id: SampleId, filename: String },
    /// Another capture had not finished yet
    Busy,
    /// The camera had no frame; nothing was changed
    FrameUnavailable,
}

/// Marks a capture in progress; clears the flag when dropped
pub struct CaptureGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

struct Uploader {
    transport: Arc<dyn UploadTransport>,
    policy: UploadPolicy,
}

/// Runs one capture at a time: read, store, record, freeze, upload, thaw.
pub struct CaptureCoordinator {
    state: Arc<MonitorState>,
    settings: CaptureSettings,
    uploader: Option<Uploader>,
    indicator: Option<Arc<dyn Indicator>>,
    in_progress: Arc<AtomicBool>,
    /// Background captures, uploads and indicator pulses
    tasks: TaskTracker,
    shutdown: CancellationToken,
}

impl CaptureCoordinator {
    pub fn new(
        state: Arc<MonitorState>,
        settings: CaptureSettings,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            state,
            settings,
            uploader: None,
            indicator: None,
            in_progress: Arc::new(AtomicBool::new(false)),
            tasks: TaskTracker::new(),
            shutdown,
        }
    }

    pub fn with_upload(mut self, transport: Arc<dyn UploadTransport>, policy: UploadPolicy) -> Self {
        self.uploader = Some(Uploader { transport, policy });
        self
    }

    pub fn with_indicator(mut self, indicator: Arc<dyn Indicator>) -> Self {
        self.indicator = Some(indicator);
        self
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    pub fn is_capturing(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    /// Claim the coordinator, or `None` when a capture is already running
    pub fn try_begin(&self) -> Option<CaptureGuard> {
        self.in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| CaptureGuard {
                flag: Arc::clone(&self.in_progress),
            })
    }

    /// Run a full capture, including the freeze dwell
    pub async fn capture_sample(&self, trigger: CaptureTrigger) -> Result<CaptureOutcome> {
        match self.try_begin() {
            Some(guard) => self.run_capture(guard, trigger).await,
            None => {
                info!("Capture already in progress; rejecting new request");
                Ok(CaptureOutcome::Busy)
            }
        }
    }

    /// Start a capture in the background. Returns false if one is already
    /// running.
    pub fn spawn_capture(self: &Arc<Self>, trigger: CaptureTrigger) -> bool {
        let Some(guard) = self.try_begin() else {
            info!("Capture already in progress; rejecting new request");
            return false;
        };

        let coordinator = Arc::clone(self);
        self.tasks.spawn(async move {
            if let Err(e) = coordinator.run_capture(guard, trigger).await {
                error!("Capture failed: {}", e);
            }
        });
        true
    }

    /// Wait for background captures, uploads and indicator pulses to
    /// finish or give up
    pub async fn settle_tasks(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }

    async fn run_capture(&self, guard: CaptureGuard, trigger: CaptureTrigger) -> Result<CaptureOutcome> {
        self.run_capture_at(guard, trigger, Local::now().naive_local())
            .await
    }

    pub(crate) async fn run_capture_at(
        &self,
        _guard: CaptureGuard,
        trigger: CaptureTrigger,
        captured_at: NaiveDateTime,
    ) -> Result<CaptureOutcome> {
        let frame = match self.state.camera.read_frame().await {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Capture skipped: {}", e);
                return Ok(CaptureOutcome::FrameUnavailable);
            }
        };

        let prefix = sanitize_prefix(
            trigger
                .prefix
                .as_deref()
                .unwrap_or(&self.settings.default_prefix),
            &self.settings.default_prefix,
        );
        let filename = sample_filename(&prefix, captured_at);

        let quality = self.settings.jpeg_quality;
        let to_encode = frame.clone();
        let jpeg = tokio::task::spawn_blocking(move || to_encode.encode_jpeg(quality))
            .await
            .map_err(|e| CaptureError::Encode {
                details: format!("Encoder task failed: {}", e),
            })??;

        let path = write_sample(&self.settings.samples_dir, &filename, &jpeg).await?;

        let id = self
            .state
            .samples
            .replace(captured_at, filename.clone(), trigger.requester.clone());
        info!(
            "Captured sample {} as {} for {}/{}",
            id, filename, trigger.requester.user_name, trigger.requester.device_id
        );

        self.state.freeze.freeze(frame);

        self.spawn_upload(id, path);
        self.spawn_indicator_pulse();

        tokio::select! {
            _ = tokio::time::sleep(self.settings.freeze_dwell) => {}
            _ = self.shutdown.cancelled() => {
                debug!("Freeze dwell for sample {} cut short by shutdown", id);
            }
        }
        self.state.freeze.thaw();
        debug!("Stream resumed after sample {}", id);

        Ok(CaptureOutcome::Captured { id, filename })
    }

    fn spawn_upload(&self, id: SampleId, path: PathBuf) {
        let Some(uploader) = &self.uploader else {
            debug!("Uploads disabled; egg count for sample {} stays unset", id);
            return;
        };

        let state = Arc::clone(&self.state);
        let transport = Arc::clone(&uploader.transport);
        let policy = uploader.policy.clone();
        let shutdown = self.shutdown.clone();

        self.tasks.spawn(async move {
            tokio::select! {
                outcome = upload_sample(&path, &policy, transport.as_ref()) => {
                    if let UploadOutcome::Counted { egg_count, .. } = outcome {
                        if state.samples.set_egg_count(id, egg_count) {
                            info!("Sample {} contains {} eggs", id, egg_count);
                        } else {
                            warn!(
                                "Discarding egg count {} for sample {}: a newer capture replaced it",
                                egg_count, id
                            );
                        }
                    }
                }
                _ = shutdown.cancelled() => {
                    warn!("Abandoning upload of {} on shutdown", path.display());
                }
            }
        });
    }

    fn spawn_indicator_pulse(&self) {
        if let Some(indicator) = &self.indicator {
            let indicator = Arc::clone(indicator);
            let shutdown = self.shutdown.clone();
            self.tasks.spawn(async move {
                if let Err(e) = indicator.pulse(&shutdown).await {
                    debug!("Indicator pulse failed: {}", e);
                }
            });
        }
    }
}
