//! Local-cache-first installation of model artifacts.
//!
//! The local cache path is always checked before any network fetch; a
//! missing file triggers a one-time blocking download, streamed to disk
//! rather than buffered in memory. Checksums are verified when pinned,
//! and a corrupt file is removed so the next run re-downloads it.

use std::path::{Path, PathBuf};

use crate::error::ModelError;

/// One downloadable model file.
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    /// Human-readable name for logs
    pub name: String,
    /// Remote fetch location
    pub url: String,
    /// Filename inside the model directory
    pub local_name: String,
    /// Expected BLAKE3 hex digest, when pinned
    pub blake3: Option<String>,
}

/// Blocking HTTP installer for model weights.
pub struct HttpInstaller {
    client: reqwest::blocking::Client,
}

impl HttpInstaller {
    pub fn new() -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
        }
    }

    /// Return the local path for an artifact, downloading it first if absent.
    pub fn ensure(&self, artifact: &ModelArtifact, model_dir: &Path) -> Result<PathBuf, ModelError> {
        let dest = model_dir.join(&artifact.local_name);
        if dest.exists() {
            tracing::debug!("{} already cached at {:?}", artifact.name, dest);
            return Ok(dest);
        }

        std::fs::create_dir_all(model_dir)?;

        tracing::info!("Downloading {} from {}", artifact.name, artifact.url);
        let mut response = self
            .client
            .get(&artifact.url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| ModelError::Download {
                url: artifact.url.clone(),
                message: e.to_string(),
            })?;

        // Weight files run to hundreds of MB; stream straight to disk
        // instead of materializing the body in memory. A failed stream
        // removes the partial file so the next run retries cleanly.
        let mut file = std::fs::File::create(&dest)?;
        let written = response.copy_to(&mut file).map_err(|e| {
            let _ = std::fs::remove_file(&dest);
            ModelError::Download {
                url: artifact.url.clone(),
                message: e.to_string(),
            }
        })?;

        if let Some(expected) = &artifact.blake3 {
            verify_blake3(&dest, expected)?;
        }

        tracing::info!(
            "{} downloaded to {:?} ({:.1} MB)",
            artifact.name,
            dest,
            written as f64 / (1024.0 * 1024.0)
        );
        Ok(dest)
    }
}

impl Default for HttpInstaller {
    fn default() -> Self {
        Self::new()
    }
}

/// Verify a file's BLAKE3 checksum.
///
/// On mismatch, removes the corrupt file so the next run re-downloads.
pub fn verify_blake3(path: &Path, expected: &str) -> Result<(), ModelError> {
    let bytes = std::fs::read(path)?;
    let actual = blake3::hash(&bytes).to_hex().to_string();

    if actual != expected {
        let _ = std::fs::remove_file(path);
        return Err(ModelError::Checksum {
            path: path.to_path_buf(),
            expected: expected.to_string(),
            actual,
        });
    }

    tracing::debug!("Checksum verified: {}…", &actual[..16]);
    Ok(())
}
