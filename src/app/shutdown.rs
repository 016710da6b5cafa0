use super::types::{CAMERA, HTTP, SCHEDULER, BACKGROUND};
use super::{ComponentState, EggcamOrchestrator};
use crate::error::{EggcamError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info};

impl EggcamOrchestrator {
    /// Stop every component and report the process exit code
    pub async fn shutdown(&mut self) -> Result<i32> {
        info!("Beginning graceful shutdown");

        // Ends the schedule, open streams, the server and background tasks
        self.cancellation_token.cancel();

        let mut exit_code = 0;

        let scheduler = self.scheduler_task.take();
        if let Err(e) = self
            .stop_component(SCHEDULER, Duration::from_secs(5), async move {
                join_task(scheduler).await.map(|_| ())
            })
            .await
        {
            error!("Error stopping {}: {}", SCHEDULER, e);
            exit_code = 1;
        }

        let server = self.server_task.take();
        if let Err(e) = self
            .stop_component(HTTP, Duration::from_secs(10), async move {
                join_task(server).await?.unwrap_or(Ok(()))
            })
            .await
        {
            error!("Error stopping {}: {}", HTTP, e);
            exit_code = 1;
        }

        let coordinator = self.coordinator();
        if let Err(e) = self
            .stop_component(BACKGROUND, Duration::from_secs(5), async move {
                coordinator.settle_tasks().await;
                Ok(())
            })
            .await
        {
            error!("Error stopping {}: {}", BACKGROUND, e);
            exit_code = 1;
        }

        let monitor = self.monitor();
        if let Err(e) = self
            .stop_component(CAMERA, Duration::from_secs(10), async move {
                monitor.camera.release().await;
                Ok(())
            })
            .await
        {
            error!("Error stopping {}: {}", CAMERA, e);
            exit_code = 1;
        }

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }

    /// Run `stop` under a deadline and record the resulting state
    async fn stop_component<F>(&self, component: &str, limit: Duration, stop: F) -> Result<()>
    where
        F: Future<Output = Result<()>>,
    {
        info!("Stopping {} component", component);
        self.set_component_state(component, ComponentState::Stopping)
            .await;

        match timeout(limit, stop).await {
            Ok(Ok(())) => {
                self.set_component_state(component, ComponentState::Stopped)
                    .await;
                info!("{} component stopped", component);
                Ok(())
            }
            Ok(Err(e)) => {
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                Err(e)
            }
            Err(_) => {
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                Err(EggcamError::system(format!(
                    "{} component stop timeout",
                    component
                )))
            }
        }
    }
}

/// Await a background task, treating a missing task as already stopped
async fn join_task<T>(task: Option<JoinHandle<T>>) -> Result<Option<T>> {
    match task {
        Some(task) => task
            .await
            .map(Some)
            .map_err(|e| EggcamError::system(format!("Task failed: {}", e))),
        None => Ok(None),
    }
}
