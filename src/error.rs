use thiserror::Error;

#[derive(Error, Debug)]
pub enum EggcamError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl EggcamError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Frame source failures
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Frame unavailable: {details}")]
    Unavailable { details: String },

    #[error("Camera configuration failed: {details}")]
    Configuration { details: String },
}

/// Capture coordinator failures
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Failed to create samples directory {path}: {source}")]
    DirectoryCreation {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write sample {path}: {source}")]
    SampleWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JPEG encoding failed: {details}")]
    Encode { details: String },
}

/// Inference upload failures; each one consumes a retry
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Request failed: {details}")]
    Transport { details: String },

    #[error("Endpoint returned HTTP {status}")]
    Status { status: u16 },

    #[error("Invalid response body: {details}")]
    InvalidResponse { details: String },

    #[error("Failed to read sample {path}: {source}")]
    SampleRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// HTTP server failures
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Failed to bind {address}: {source}")]
    BindFailed {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server startup failed: {details}")]
    StartupFailed { details: String },
}

pub type Result<T> = std::result::Result<T, EggcamError>;
