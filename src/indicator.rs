use crate::config::IndicatorConfig;
use crate::error::{EggcamError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// A binary hardware output pulsed after each capture
#[async_trait]
pub trait Indicator: Send + Sync {
    /// Blink the output; returns once the pulse is over or `shutdown` fires
    async fn pulse(&self, shutdown: &CancellationToken) -> Result<()>;
}

/// Indicator driven through a sysfs GPIO `value` file
pub struct GpioIndicator {
    value_path: PathBuf,
    blink_interval: Duration,
    duration: Duration,
}

impl GpioIndicator {
    pub fn new(config: &IndicatorConfig) -> Self {
        info!(
            "GPIO indicator on {} ({} ms blink for {} ms)",
            config.value_path, config.blink_interval_ms, config.duration_ms
        );

        Self {
            value_path: PathBuf::from(&config.value_path),
            blink_interval: Duration::from_millis(config.blink_interval_ms.max(1)),
            duration: Duration::from_millis(config.duration_ms),
        }
    }

    async fn set_level(&self, on: bool) -> Result<()> {
        tokio::fs::write(&self.value_path, if on { "1" } else { "0" })
            .await
            .map_err(|e| {
                EggcamError::component(
                    "indicator".to_string(),
                    format!("Failed to write {}: {}", self.value_path.display(), e),
                )
            })
    }
}

#[async_trait]
impl Indicator for GpioIndicator {
    async fn pulse(&self, shutdown: &CancellationToken) -> Result<()> {
        let deadline = Instant::now() + self.duration;
        let mut ticker = interval(self.blink_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut on = false;

        let blinked = loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.cancelled() => {
                    debug!("Indicator pulse interrupted by shutdown");
                    break Ok(());
                }
            }
            if Instant::now() >= deadline {
                break Ok(());
            }
            on = !on;
            if let Err(e) = self.set_level(on).await {
                break Err(e);
            }
        };

        // Always leave the line low
        self.set_level(false).await?;
        debug!("Indicator pulse finished");
        blinked
    }
}
