//! ONNX session construction and execution-provider selection.
//!
//! A [`SessionSlot`] holds a model graph that can move between the device
//! tier (a committed session on the preferred execution provider) and the
//! host tier (raw model bytes only). Re-promotion re-commits the session
//! from the retained bytes without touching disk or network.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::Session;

use crate::error::ModelError;

static ACCELERATOR: OnceLock<bool> = OnceLock::new();

/// Whether a device-tier execution provider is available on this host.
///
/// Detected once per process; the answer drives the precision policy.
pub fn accelerator_available() -> bool {
    *ACCELERATOR.get_or_init(detect_accelerator)
}

fn detect_accelerator() -> bool {
    #[cfg(feature = "cuda")]
    {
        use ort::ep::{ExecutionProvider, CUDA};
        if CUDA::default().is_available().unwrap_or(false) {
            return true;
        }
    }
    #[cfg(target_os = "macos")]
    {
        use ort::ep::{CoreML, ExecutionProvider};
        if CoreML::default().is_available().unwrap_or(false) {
            return true;
        }
    }
    false
}

fn register_execution_providers(builder: &mut SessionBuilder) {
    #[cfg(feature = "cuda")]
    {
        use ort::ep::{ExecutionProvider, CUDA};
        let cuda = CUDA::default();
        if cuda.is_available().unwrap_or(false) {
            match cuda.register(builder) {
                Ok(_) => {
                    tracing::debug!("Using CUDA execution provider");
                    return;
                }
                Err(e) => tracing::warn!("CUDA registration failed: {e}"),
            }
        }
    }
    #[cfg(target_os = "macos")]
    {
        use ort::ep::{CoreML, ExecutionProvider};
        let coreml = CoreML::default();
        if coreml.is_available().unwrap_or(false) {
            match coreml.register(builder) {
                Ok(_) => {
                    tracing::debug!("Using CoreML execution provider");
                    return;
                }
                Err(e) => tracing::warn!("CoreML registration failed: {e}"),
            }
        }
    }
    let _ = builder;
    tracing::debug!("Using CPU execution provider");
}

/// A model graph with explicit device/host tier placement.
pub struct SessionSlot {
    path: PathBuf,
    bytes: Vec<u8>,
    session: Option<Session>,
}

impl SessionSlot {
    /// Read model bytes into host memory without committing a session.
    pub fn open(path: &Path) -> Result<Self, ModelError> {
        let bytes = std::fs::read(path).map_err(|e| ModelError::Load {
            path: path.to_path_buf(),
            message: format!("Failed to read model file: {e}"),
        })?;
        tracing::debug!(
            "Read {:.1} MB of model bytes from {:?}",
            bytes.len() as f64 / (1024.0 * 1024.0),
            path
        );
        Ok(Self {
            path: path.to_path_buf(),
            bytes,
            session: None,
        })
    }

    /// Commit a session on the device tier. No-op if already committed.
    pub fn commit(&mut self) -> Result<(), ModelError> {
        if self.session.is_some() {
            return Ok(());
        }
        let mut builder = Session::builder().map_err(|e| ModelError::Load {
            path: self.path.clone(),
            message: format!("Failed to create session builder: {e}"),
        })?;
        register_execution_providers(&mut builder);
        let session = builder
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| ModelError::Load {
                path: self.path.clone(),
                message: format!("Failed to set optimization level: {e}"),
            })?
            .commit_from_memory(&self.bytes)
            .map_err(|e| ModelError::Load {
                path: self.path.clone(),
                message: format!("Failed to commit ONNX session: {e}"),
            })?;
        tracing::debug!("Committed ONNX session for {:?}", self.path);
        self.session = Some(session);
        Ok(())
    }

    /// Drop the committed session, keeping model bytes resident on the host.
    pub fn release(&mut self) {
        if self.session.take().is_some() {
            tracing::debug!("Released ONNX session for {:?}", self.path);
        }
    }

    pub fn is_committed(&self) -> bool {
        self.session.is_some()
    }

    /// The committed session, committing first if needed.
    pub fn session(&mut self) -> Result<&mut Session, ModelError> {
        self.commit()?;
        match &mut self.session {
            Some(session) => Ok(session),
            None => Err(ModelError::Load {
                path: self.path.clone(),
                message: "Session missing after commit".to_string(),
            }),
        }
    }
}

/// First input tensor name from model metadata, with a fallback.
pub fn input_name(session: &Session, fallback: &str) -> String {
    session
        .inputs()
        .first()
        .map(|i| i.name().to_string())
        .unwrap_or_else(|| fallback.to_string())
}
