use super::coordinator::{CaptureCoordinator, CaptureOutcome, CaptureTrigger};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Trigger a capture every `every` until `shutdown` fires.
///
/// The first capture happens one full interval after start. A tick that
/// lands while a request-driven capture is running is skipped.
pub async fn run_capture_schedule(
    coordinator: Arc<CaptureCoordinator>,
    every: Duration,
    shutdown: CancellationToken,
) {
    info!("Capturing a sample every {:?}", every);

    let mut ticker = interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match coordinator.capture_sample(CaptureTrigger::scheduled()).await {
                    Ok(CaptureOutcome::Busy) => info!("Scheduled capture skipped; another capture is running"),
                    Ok(_) => {}
                    Err(e) => error!("Scheduled capture failed: {}", e),
                }
            }
            _ = shutdown.cancelled() => {
                info!("Capture schedule stopped");
                break;
            }
        }
    }
}
