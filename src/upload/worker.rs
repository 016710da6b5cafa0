use super::transport::UploadTransport;
use crate::config::UploadConfig;
use crate::error::UploadError;
use bytes::Bytes;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Attempt budget and fixed backoff for one sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    pub retries: u32,
    pub backoff: Duration,
}

impl From<&UploadConfig> for UploadPolicy {
    fn from(config: &UploadConfig) -> Self {
        Self {
            retries: config.retries,
            backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

/// Final result of uploading one sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Counted { egg_count: u32, attempts: u32 },
    Exhausted { attempts: u32, last_error: String },
}

#[derive(Deserialize)]
struct PredictResponse {
    egg_count: u32,
}

/// Extract `egg_count` from a prediction response body
pub fn parse_egg_count(body: &[u8]) -> Result<u32, UploadError> {
    serde_json::from_slice::<PredictResponse>(body)
        .map(|response| response.egg_count)
        .map_err(|e| UploadError::InvalidResponse {
            details: e.to_string(),
        })
}

async fn attempt_upload(
    file_name: &str,
    jpeg: Bytes,
    transport: &dyn UploadTransport,
) -> Result<u32, UploadError> {
    let response = transport.post_image(file_name, jpeg).await?;
    if response.status != 200 {
        return Err(UploadError::Status {
            status: response.status,
        });
    }
    parse_egg_count(&response.body)
}

/// Post `jpeg` until the endpoint returns a count or the attempts run out.
///
/// Waits `policy.backoff` between attempts, never after the last one.
pub async fn upload_with_retry(
    file_name: &str,
    jpeg: Bytes,
    policy: &UploadPolicy,
    transport: &dyn UploadTransport,
) -> UploadOutcome {
    let max_attempts = policy.retries.max(1);
    let mut last_error = String::new();

    for attempt in 1..=max_attempts {
        match attempt_upload(file_name, jpeg.clone(), transport).await {
            Ok(egg_count) => {
                info!(
                    "Endpoint counted {} eggs for {} (attempt {})",
                    egg_count, file_name, attempt
                );
                return UploadOutcome::Counted {
                    egg_count,
                    attempts: attempt,
                };
            }
            Err(e) => {
                warn!(
                    "Upload of {} failed (attempt {}/{}): {}",
                    file_name, attempt, max_attempts, e
                );
                last_error = e.to_string();
            }
        }

        if attempt < max_attempts {
            debug!("Retrying {} in {:?}", file_name, policy.backoff);
            tokio::time::sleep(policy.backoff).await;
        }
    }

    error!(
        "Could not upload {} after {} attempts",
        file_name, max_attempts
    );
    UploadOutcome::Exhausted {
        attempts: max_attempts,
        last_error,
    }
}

/// Read a stored sample and upload it
pub async fn upload_sample(
    path: &Path,
    policy: &UploadPolicy,
    transport: &dyn UploadTransport,
) -> UploadOutcome {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let jpeg = match tokio::fs::read(path).await {
        Ok(data) => Bytes::from(data),
        Err(e) => {
            let err = UploadError::SampleRead {
                path: path.display().to_string(),
                source: e,
            };
            error!("{}", err);
            return UploadOutcome::Exhausted {
                attempts: 0,
                last_error: err.to_string(),
            };
        }
    };

    upload_with_retry(&file_name, jpeg, policy, transport).await
}
