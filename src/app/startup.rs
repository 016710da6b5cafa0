use super::types::{CAMERA, HTTP, SCHEDULER, BACKGROUND};
use super::{ComponentState, EggcamOrchestrator};
use crate::capture::{ensure_samples_dir, run_capture_schedule};
use crate::error::Result;
use crate::streaming::{build_router, AppState, HttpServer, StreamSettings};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

impl EggcamOrchestrator {
    /// Prepare the samples directory and register components
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Initializing eggcam components");

        ensure_samples_dir(Path::new(&self.config.capture.samples_dir)).await?;

        let mut states = self.component_states.lock().await;
        for component in [CAMERA, HTTP, SCHEDULER, BACKGROUND] {
            states.insert(component.to_string(), ComponentState::Stopped);
        }
        drop(states);

        info!(
            "Camera source: {}",
            self.monitor.camera.describe().await
        );
        info!("All components initialized successfully");
        Ok(())
    }

    /// Start the HTTP server and, when an interval is configured, the
    /// capture schedule
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting eggcam");

        // The camera is opened in `new`; reads start with the first viewer
        self.set_component_state(CAMERA, ComponentState::Running)
            .await;
        self.set_component_state(BACKGROUND, ComponentState::Running)
            .await;

        self.set_component_state(HTTP, ComponentState::Starting)
            .await;
        let state = AppState {
            monitor: Arc::clone(&self.monitor),
            coordinator: Arc::clone(&self.coordinator),
            stream: StreamSettings::from(&self.config.stream),
            shutdown: self.cancellation_token.clone(),
        };
        let router = build_router(state, Path::new(&self.config.capture.samples_dir));
        let address = format!("{}:{}", self.config.stream.ip, self.config.stream.port);

        let server = match HttpServer::bind(&address, router).await {
            Ok(server) => server,
            Err(e) => {
                error!("Failed to start HTTP server: {}", e);
                self.set_component_state(HTTP, ComponentState::Failed)
                    .await;
                return Err(e);
            }
        };
        self.server_addr = Some(server.local_addr()?);

        let token = self.cancellation_token.clone();
        self.server_task = Some(tokio::spawn(async move {
            let result = server.serve(token.clone()).await;
            if let Err(e) = &result {
                error!("HTTP server error: {}", e);
                // Nothing is reachable without the server
                token.cancel();
            }
            result
        }));
        self.set_component_state(HTTP, ComponentState::Running)
            .await;

        match self.config.capture.interval() {
            Some(every) => {
                self.scheduler_task = Some(tokio::spawn(run_capture_schedule(
                    Arc::clone(&self.coordinator),
                    every,
                    self.cancellation_token.clone(),
                )));
                self.set_component_state(SCHEDULER, ComponentState::Running)
                    .await;
            }
            None => {
                info!("Capture interval is 0; capturing on request only");
            }
        }

        info!("Eggcam started successfully");
        Ok(())
    }
}
