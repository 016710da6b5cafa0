use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EggcamConfig {
    pub camera: CameraConfig,
    pub capture: CaptureConfig,
    pub upload: UploadConfig,
    pub stream: StreamConfig,
    pub indicator: IndicatorConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Device index (e.g. "0" for /dev/video0), a stream URI, or "test"
    #[serde(default = "default_camera_source")]
    pub source: String,

    /// Capture resolution (width, height); also the blank fallback frame size
    #[serde(default = "default_camera_resolution")]
    pub resolution: (u32, u32),

    /// Frames per second requested from the device
    #[serde(default = "default_camera_fps")]
    pub fps: u32,

    /// How long a single read waits for a frame before reporting it unavailable
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CaptureConfig {
    /// Directory stored samples are written to
    #[serde(default = "default_samples_dir")]
    pub samples_dir: String,

    /// Filename prefix used when the trigger supplies none
    #[serde(default = "default_prefix")]
    pub default_prefix: String,

    /// Automatic capture interval; 0 disables the timer
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,

    /// How long the live stream stays frozen on a captured frame
    #[serde(default = "default_freeze_dwell_ms")]
    pub freeze_dwell_ms: u64,

    /// JPEG quality for stored samples
    #[serde(default = "default_sample_jpeg_quality")]
    pub jpeg_quality: u8,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UploadConfig {
    /// Send samples to the inference endpoint
    #[serde(default = "default_upload_enabled")]
    pub enabled: bool,

    /// Base URL of the inference service
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Path appended to the endpoint
    #[serde(default = "default_predict_path")]
    pub predict_path: String,

    /// Maximum number of attempts per sample
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Fixed wait between attempts
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Per-attempt HTTP timeout
    #[serde(default = "default_upload_timeout_seconds")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StreamConfig {
    /// IP address to bind to
    #[serde(default = "default_stream_ip")]
    pub ip: String,

    /// Port to listen on
    #[serde(default = "default_stream_port")]
    pub port: u16,

    /// Delay between live stream frames
    #[serde(default = "default_frame_delay_ms")]
    pub frame_delay_ms: u64,

    /// JPEG quality for streamed frames
    #[serde(default = "default_stream_jpeg_quality")]
    pub jpeg_quality: u8,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndicatorConfig {
    /// Pulse a GPIO output after each capture
    #[serde(default = "default_indicator_enabled")]
    pub enabled: bool,

    /// sysfs value file of the exported GPIO line
    #[serde(default = "default_indicator_value_path")]
    pub value_path: String,

    /// Time between on/off toggles
    #[serde(default = "default_blink_interval_ms")]
    pub blink_interval_ms: u64,

    /// Total pulse duration
    #[serde(default = "default_indicator_duration_ms")]
    pub duration_ms: u64,
}

impl EggcamConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("eggcam.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("camera.source", default_camera_source())?
            .set_default(
                "camera.resolution",
                vec![default_camera_resolution().0, default_camera_resolution().1],
            )?
            .set_default("camera.fps", default_camera_fps())?
            .set_default("camera.read_timeout_ms", default_read_timeout_ms())?
            .set_default("capture.samples_dir", default_samples_dir())?
            .set_default("capture.default_prefix", default_prefix())?
            .set_default("capture.interval_seconds", default_interval_seconds())?
            .set_default("capture.freeze_dwell_ms", default_freeze_dwell_ms())?
            .set_default("capture.jpeg_quality", default_sample_jpeg_quality() as u64)?
            .set_default("upload.enabled", default_upload_enabled())?
            .set_default("upload.endpoint", default_endpoint())?
            .set_default("upload.predict_path", default_predict_path())?
            .set_default("upload.retries", default_retries())?
            .set_default("upload.retry_backoff_ms", default_retry_backoff_ms())?
            .set_default("upload.timeout_seconds", default_upload_timeout_seconds())?
            .set_default("stream.ip", default_stream_ip())?
            .set_default("stream.port", default_stream_port())?
            .set_default("stream.frame_delay_ms", default_frame_delay_ms())?
            .set_default("stream.jpeg_quality", default_stream_jpeg_quality() as u64)?
            .set_default("indicator.enabled", default_indicator_enabled())?
            .set_default("indicator.value_path", default_indicator_value_path())?
            .set_default("indicator.blink_interval_ms", default_blink_interval_ms())?
            .set_default("indicator.duration_ms", default_indicator_duration_ms())?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Add environment variables with EGGCAM_ prefix
            .add_source(
                Environment::with_prefix("EGGCAM")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: EggcamConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.resolution.0 == 0 || self.camera.resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }

        if self.camera.fps == 0 {
            return Err(ConfigError::Message(
                "Camera fps must be greater than 0".to_string(),
            ));
        }

        if self.capture.freeze_dwell_ms == 0 {
            return Err(ConfigError::Message(
                "Capture freeze_dwell_ms must be greater than 0".to_string(),
            ));
        }

        for (name, quality) in [
            ("capture.jpeg_quality", self.capture.jpeg_quality),
            ("stream.jpeg_quality", self.stream.jpeg_quality),
        ] {
            if !(1..=100).contains(&quality) {
                return Err(ConfigError::Message(format!(
                    "{} must be between 1 and 100",
                    name
                )));
            }
        }

        if self.upload.enabled {
            if self.upload.endpoint.trim().is_empty() {
                return Err(ConfigError::Message(
                    "Upload endpoint must be set when uploads are enabled".to_string(),
                ));
            }

            if self.upload.retries == 0 {
                return Err(ConfigError::Message(
                    "Upload retries must be greater than 0".to_string(),
                ));
            }
        }

        if self.stream.frame_delay_ms == 0 {
            return Err(ConfigError::Message(
                "Stream frame_delay_ms must be greater than 0".to_string(),
            ));
        }

        if !(30..=50).contains(&self.stream.frame_delay_ms) {
            warn!(
                "Stream frame_delay_ms {} is outside the recommended 30-50 ms range",
                self.stream.frame_delay_ms
            );
        }

        if self.indicator.enabled && self.indicator.blink_interval_ms == 0 {
            return Err(ConfigError::Message(
                "Indicator blink_interval_ms must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> crate::error::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

impl CaptureConfig {
    pub fn freeze_dwell(&self) -> Duration {
        Duration::from_millis(self.freeze_dwell_ms)
    }

    pub fn interval(&self) -> Option<Duration> {
        (self.interval_seconds > 0).then(|| Duration::from_secs(self.interval_seconds))
    }
}

impl UploadConfig {
    /// Full URL of the prediction endpoint
    pub fn predict_url(&self) -> String {
        let base = self.endpoint.trim_end_matches('/');
        let path = self.predict_path.trim_start_matches('/');
        if path.is_empty() {
            base.to_string()
        } else {
            format!("{}/{}", base, path)
        }
    }
}

impl Default for EggcamConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                source: default_camera_source(),
                resolution: default_camera_resolution(),
                fps: default_camera_fps(),
                read_timeout_ms: default_read_timeout_ms(),
            },
            capture: CaptureConfig {
                samples_dir: default_samples_dir(),
                default_prefix: default_prefix(),
                interval_seconds: default_interval_seconds(),
                freeze_dwell_ms: default_freeze_dwell_ms(),
                jpeg_quality: default_sample_jpeg_quality(),
            },
            upload: UploadConfig {
                enabled: default_upload_enabled(),
                endpoint: default_endpoint(),
                predict_path: default_predict_path(),
                retries: default_retries(),
                retry_backoff_ms: default_retry_backoff_ms(),
                timeout_seconds: default_upload_timeout_seconds(),
            },
            stream: StreamConfig {
                ip: default_stream_ip(),
                port: default_stream_port(),
                frame_delay_ms: default_frame_delay_ms(),
                jpeg_quality: default_stream_jpeg_quality(),
            },
            indicator: IndicatorConfig {
                enabled: default_indicator_enabled(),
                value_path: default_indicator_value_path(),
                blink_interval_ms: default_blink_interval_ms(),
                duration_ms: default_indicator_duration_ms(),
            },
        }
    }
}

// Default value functions
fn default_camera_source() -> String {
    "0".to_string()
}
fn default_camera_resolution() -> (u32, u32) {
    (640, 480)
}
fn default_camera_fps() -> u32 {
    30
}
fn default_read_timeout_ms() -> u64 {
    1000
}

fn default_samples_dir() -> String {
    "data/samples".to_string()
}
fn default_prefix() -> String {
    "sample".to_string()
}
fn default_interval_seconds() -> u64 {
    120
}
fn default_freeze_dwell_ms() -> u64 {
    3000
}
fn default_sample_jpeg_quality() -> u8 {
    90
}

fn default_upload_enabled() -> bool {
    true
}
fn default_endpoint() -> String {
    "http://127.0.0.1:8000".to_string()
}
fn default_predict_path() -> String {
    "/predict".to_string()
}
fn default_retries() -> u32 {
    3
}
fn default_retry_backoff_ms() -> u64 {
    2000
}
fn default_upload_timeout_seconds() -> u64 {
    10
}

fn default_stream_ip() -> String {
    "0.0.0.0".to_string()
}
fn default_stream_port() -> u16 {
    5000
}
fn default_frame_delay_ms() -> u64 {
    30
}
fn default_stream_jpeg_quality() -> u8 {
    80
}

fn default_indicator_enabled() -> bool {
    false
}
fn default_indicator_value_path() -> String {
    "/sys/class/gpio/gpio17/value".to_string()
}
fn default_blink_interval_ms() -> u64 {
    250
}
fn default_indicator_duration_ms() -> u64 {
    3000
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = EggcamConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.upload.retries, 3);
        assert_eq!(config.capture.freeze_dwell(), Duration::from_secs(3));
        assert_eq!(config.capture.interval(), Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_config_validation() {
        let mut config = EggcamConfig::default();
        config.camera.resolution = (0, 0);

        // Should fail validation due to invalid resolution
        assert!(config.validate().is_err());

        config.camera.resolution = (640, 480);
        assert!(config.validate().is_ok());

        config.upload.retries = 0;
        assert!(config.validate().is_err());

        // Retries only matter when uploads are enabled
        config.upload.enabled = false;
        assert!(config.validate().is_ok());

        config.stream.jpeg_quality = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_interval_disables_timer() {
        let mut config = EggcamConfig::default();
        config.capture.interval_seconds = 0;

        assert_eq!(config.capture.interval(), None);
    }

    #[test]
    fn test_predict_url_joins_slashes() {
        let mut config = EggcamConfig::default();
        config.upload.endpoint = "https://infer.example.com/".to_string();
        assert_eq!(
            config.upload.predict_url(),
            "https://infer.example.com/predict"
        );

        config.upload.predict_path = "".to_string();
        assert_eq!(config.upload.predict_url(), "https://infer.example.com");
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[capture]\ninterval_seconds = 0\ndefault_prefix = \"tray\"\n\n[stream]\nport = 9090"
        )
        .unwrap();

        let config = EggcamConfig::load_from_file(file.path()).unwrap();

        assert_eq!(config.capture.interval_seconds, 0);
        assert_eq!(config.capture.default_prefix, "tray");
        assert_eq!(config.stream.port, 9090);
        // Untouched sections keep their defaults
        assert_eq!(config.upload.retry_backoff_ms, 2000);
        assert_eq!(config.camera.resolution, (640, 480));
    }

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let rendered = EggcamConfig::default().to_toml().unwrap();
        let parsed: EggcamConfig = toml::from_str(&rendered).unwrap();

        assert_eq!(parsed.stream.port, 5000);
        assert_eq!(parsed.indicator.value_path, "/sys/class/gpio/gpio17/value");
    }
}
