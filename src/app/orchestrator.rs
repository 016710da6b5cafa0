use super::types::{ComponentState, ShutdownReason};
use crate::camera::{open_camera, CameraHandle};
use crate::capture::{CaptureCoordinator, CaptureSettings};
use crate::config::EggcamConfig;
use crate::error::Result;
use crate::indicator::GpioIndicator;
use crate::monitor::MonitorState;
use crate::upload::{HttpTransport, UploadPolicy};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Main application coordinator that owns every long-running task
pub struct EggcamOrchestrator {
    pub(super) config: EggcamConfig,
    pub(super) monitor: Arc<MonitorState>,
    pub(super) coordinator: Arc<CaptureCoordinator>,

    // Background tasks
    pub(super) scheduler_task: Option<JoinHandle<()>>,
    pub(super) server_task: Option<JoinHandle<Result<()>>>,
    pub(super) server_addr: Option<SocketAddr>,

    // Lifecycle management
    pub(super) component_states: Arc<Mutex<HashMap<String, ComponentState>>>,
    pub(super) shutdown_sender: Option<oneshot::Sender<ShutdownReason>>,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
}

impl EggcamOrchestrator {
    /// Validate the configuration and open the configured camera
    pub fn new(config: EggcamConfig) -> Result<Self> {
        config.validate()?;
        let camera = open_camera(&config.camera)?;
        Self::with_camera(config, camera)
    }

    /// Build the remaining components around an already opened camera
    pub fn with_camera(config: EggcamConfig, camera: CameraHandle) -> Result<Self> {
        let cancellation_token = CancellationToken::new();
        let monitor = Arc::new(MonitorState::new(camera));

        let mut coordinator = CaptureCoordinator::new(
            Arc::clone(&monitor),
            CaptureSettings::from(&config.capture),
            cancellation_token.clone(),
        );

        if config.upload.enabled {
            let transport = HttpTransport::new(&config.upload)?;
            coordinator = coordinator
                .with_upload(Arc::new(transport), UploadPolicy::from(&config.upload));
        } else {
            info!("Uploads disabled; egg counts will not be requested");
        }

        if config.indicator.enabled {
            coordinator =
                coordinator.with_indicator(Arc::new(GpioIndicator::new(&config.indicator)));
        }

        let (shutdown_sender, shutdown_receiver) = oneshot::channel();

        Ok(Self {
            config,
            monitor,
            coordinator: Arc::new(coordinator),
            scheduler_task: None,
            server_task: None,
            server_addr: None,
            component_states: Arc::new(Mutex::new(HashMap::new())),
            shutdown_sender: Some(shutdown_sender),
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token,
        })
    }

    pub fn monitor(&self) -> Arc<MonitorState> {
        Arc::clone(&self.monitor)
    }

    pub fn coordinator(&self) -> Arc<CaptureCoordinator> {
        Arc::clone(&self.coordinator)
    }

    /// Address the HTTP server is listening on, once started
    pub fn server_addr(&self) -> Option<SocketAddr> {
        self.server_addr
    }

    /// Token that stops every background task when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }
}
