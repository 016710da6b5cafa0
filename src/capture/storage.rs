use crate::error::CaptureError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Create the samples directory if it does not exist yet
pub async fn ensure_samples_dir(dir: &Path) -> Result<(), CaptureError> {
    match tokio::fs::metadata(dir).await {
        Ok(metadata) if metadata.is_dir() => return Ok(()),
        Ok(_) => {
            return Err(CaptureError::DirectoryCreation {
                path: dir.display().to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "path exists and is not a directory",
                ),
            })
        }
        Err(_) => {}
    }

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| CaptureError::DirectoryCreation {
            path: dir.display().to_string(),
            source: e,
        })?;
    info!("Created samples directory: {}", dir.display());
    Ok(())
}

/// Suffix of a sample still being written
pub const PARTIAL_SUFFIX: &str = ".partial";

/// Write an encoded sample into `dir`.
///
/// The bytes land in a `.partial` file that is renamed into place, so the
/// final name only ever refers to a complete image.
pub async fn write_sample(dir: &Path, file_name: &str, jpeg: &[u8]) -> Result<PathBuf, CaptureError> {
    let path = dir.join(file_name);
    let partial = dir.join(format!("{}{}", file_name, PARTIAL_SUFFIX));

    let write_err = |source: std::io::Error| CaptureError::SampleWrite {
        path: path.display().to_string(),
        source,
    };

    tokio::fs::write(&partial, jpeg).await.map_err(write_err)?;
    if let Err(e) = tokio::fs::rename(&partial, &path).await {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(write_err(e));
    }

    debug!("Stored sample {} ({} bytes)", path.display(), jpeg.len());
    Ok(path)
}
