use crate::config::UploadConfig;
use crate::error::UploadError;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use tracing::{debug, info};

/// Raw answer from the inference endpoint
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Bytes,
}

/// Delivers one sample image to the inference endpoint
#[async_trait]
pub trait UploadTransport: Send + Sync {
    async fn post_image(&self, file_name: &str, jpeg: Bytes)
        -> Result<TransportResponse, UploadError>;
}

/// Multipart HTTP transport backed by `reqwest`
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpTransport {
    pub fn new(config: &UploadConfig) -> Result<Self, UploadError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| UploadError::Transport {
                details: format!("Failed to build HTTP client: {}", e),
            })?;

        let url = config.predict_url();
        info!("Inference endpoint: {}", url);

        Ok(Self { client, url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl UploadTransport for HttpTransport {
    async fn post_image(
        &self,
        file_name: &str,
        jpeg: Bytes,
    ) -> Result<TransportResponse, UploadError> {
        let part = Part::bytes(jpeg.to_vec())
            .file_name(file_name.to_string())
            .mime_str("image/jpeg")
            .map_err(|e| UploadError::Transport {
                details: e.to_string(),
            })?;
        let form = Form::new().part("file", part);

        debug!("POST {} ({} bytes)", self.url, jpeg.len());

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| UploadError::Transport {
                details: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| UploadError::Transport {
            details: format!("Failed to read response body: {}", e),
        })?;

        Ok(TransportResponse { status, body })
    }
}
