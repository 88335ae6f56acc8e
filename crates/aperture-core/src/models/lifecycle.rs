//! Model lifecycle: lazy load, tier placement, and guaranteed eviction.
//!
//! At most one instance of each model kind exists, owned here as explicit
//! per-instance state. All residency mutations go through this type; the
//! backends only expose the raw tier moves.

use crate::config::{DeviceConfig, InterrogateConfig};
use crate::error::ModelError;

use super::{
    CaptionModel, EmbeddingModel, MemoryPressure, ModelKind, ModelProvider, Precision, Residency,
};

/// Owns the caption and embedding model handles and every tier transition.
pub struct ModelLifecycle {
    provider: Box<dyn ModelProvider>,
    pressure: Box<dyn MemoryPressure>,
    caption: Option<Box<dyn CaptionModel>>,
    embedding: Option<Box<dyn EmbeddingModel>>,
    keep_in_memory: bool,
    force_full_precision: bool,
    low_memory: bool,
}

impl ModelLifecycle {
    pub fn new(
        provider: Box<dyn ModelProvider>,
        pressure: Box<dyn MemoryPressure>,
        device: &DeviceConfig,
        interrogate: &InterrogateConfig,
    ) -> Self {
        Self {
            provider,
            pressure,
            caption: None,
            embedding: None,
            keep_in_memory: interrogate.keep_models_in_memory,
            force_full_precision: device.full_precision,
            low_memory: device.low_memory,
        }
    }

    /// The precision models are loaded with.
    ///
    /// Reduced precision is skipped entirely on accelerator-less hosts: half
    /// floats buy nothing there and risk unsupported-operation failures.
    pub fn precision(&self) -> Precision {
        if self.force_full_precision || !self.provider.has_accelerator() {
            Precision::Full
        } else {
            Precision::Half
        }
    }

    /// Low-memory pre-step: evict all unrelated device-resident state before
    /// loading either model, so a transient double-residency during the model
    /// swap cannot run the device out of memory.
    pub fn preflight(&self) {
        if self.low_memory {
            tracing::debug!("Low-memory preflight: releasing device memory");
            self.pressure.release_device_memory();
            self.pressure.reclaim();
        }
    }

    /// Acquire the caption model on the device tier, loading it first if
    /// needed. Idempotent; re-promotes a host-resident handle.
    pub fn acquire_caption(&mut self) -> Result<&mut dyn CaptionModel, ModelError> {
        let precision = self.precision();
        let model = match &mut self.caption {
            Some(model) => model,
            slot => {
                tracing::info!("Loading caption model ({precision:?})");
                slot.insert(self.provider.load_caption(precision)?)
            }
        };
        if !model.is_on_device() {
            model.to_device()?;
        }
        Ok(model.as_mut())
    }

    /// Acquire the embedding model on the device tier; symmetric contract to
    /// [`Self::acquire_caption`]. The backend owns its companion image
    /// transform, built at load time.
    pub fn acquire_embedding(&mut self) -> Result<&mut dyn EmbeddingModel, ModelError> {
        let precision = self.precision();
        let model = match &mut self.embedding {
            Some(model) => model,
            slot => {
                tracing::info!("Loading embedding model ({precision:?})");
                slot.insert(self.provider.load_embedding(precision)?)
            }
        };
        if !model.is_on_device() {
            model.to_device()?;
        }
        Ok(model.as_mut())
    }

    /// Move a model to the host tier. No-op when the handle is unloaded or
    /// `keep_models_in_memory` is configured.
    pub fn release_to_host(&mut self, kind: ModelKind) {
        if self.keep_in_memory {
            return;
        }
        match kind {
            ModelKind::Caption => {
                if let Some(model) = self.caption.as_mut() {
                    if model.is_on_device() {
                        tracing::debug!("Caption model to host tier");
                        model.to_host();
                    }
                }
            }
            ModelKind::Embedding => {
                if let Some(model) = self.embedding.as_mut() {
                    if model.is_on_device() {
                        tracing::debug!("Embedding model to host tier");
                        model.to_host();
                    }
                }
            }
        }
    }

    /// Release both handles to the host tier and run the global memory
    /// reclaim pass. Safe to call when nothing is loaded.
    pub fn unload_all(&mut self) {
        self.release_to_host(ModelKind::Caption);
        self.release_to_host(ModelKind::Embedding);
        self.pressure.reclaim();
    }

    /// Run the global memory-reclaim pass.
    pub fn reclaim(&self) {
        self.pressure.reclaim();
    }

    /// Observable residency of a model handle.
    pub fn residency(&self, kind: ModelKind) -> Residency {
        let on_device = match kind {
            ModelKind::Caption => self.caption.as_ref().map(|m| m.is_on_device()),
            ModelKind::Embedding => self.embedding.as_ref().map(|m| m.is_on_device()),
        };
        match on_device {
            None => Residency::Unloaded,
            Some(true) => Residency::Device,
            Some(false) => Residency::Host,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::testing::{PressureLog, StubProvider};

    fn make_lifecycle(provider: StubProvider) -> (ModelLifecycle, PressureLog) {
        let log = PressureLog::new();
        let lifecycle = ModelLifecycle::new(
            Box::new(provider),
            Box::new(log.clone()),
            &DeviceConfig::default(),
            &InterrogateConfig::default(),
        );
        (lifecycle, log)
    }

    #[test]
    fn test_acquire_is_lazy_and_idempotent() {
        let provider = StubProvider::default();
        let loads = provider.caption_loads.clone();
        let (mut lifecycle, _log) = make_lifecycle(provider);

        assert_eq!(lifecycle.residency(ModelKind::Caption), Residency::Unloaded);
        lifecycle.acquire_caption().unwrap();
        lifecycle.acquire_caption().unwrap();
        assert_eq!(loads.get(), 1, "second acquire must not reload");
        assert_eq!(lifecycle.residency(ModelKind::Caption), Residency::Device);
    }

    #[test]
    fn test_release_then_acquire_repromotes_without_reload() {
        let provider = StubProvider::default();
        let loads = provider.caption_loads.clone();
        let (mut lifecycle, _log) = make_lifecycle(provider);

        lifecycle.acquire_caption().unwrap();
        lifecycle.release_to_host(ModelKind::Caption);
        assert_eq!(lifecycle.residency(ModelKind::Caption), Residency::Host);

        lifecycle.acquire_caption().unwrap();
        assert_eq!(lifecycle.residency(ModelKind::Caption), Residency::Device);
        assert_eq!(loads.get(), 1);
    }

    #[test]
    fn test_release_is_noop_when_unloaded() {
        let (mut lifecycle, _log) = make_lifecycle(StubProvider::default());
        lifecycle.release_to_host(ModelKind::Embedding);
        assert_eq!(
            lifecycle.residency(ModelKind::Embedding),
            Residency::Unloaded
        );
    }

    #[test]
    fn test_keep_in_memory_skips_release() {
        let log = PressureLog::new();
        let mut interrogate = InterrogateConfig::default();
        interrogate.keep_models_in_memory = true;
        let mut lifecycle = ModelLifecycle::new(
            Box::new(StubProvider::default()),
            Box::new(log),
            &DeviceConfig::default(),
            &interrogate,
        );

        lifecycle.acquire_caption().unwrap();
        lifecycle.release_to_host(ModelKind::Caption);
        assert_eq!(lifecycle.residency(ModelKind::Caption), Residency::Device);
    }

    #[test]
    fn test_unload_all_when_nothing_loaded() {
        let (mut lifecycle, log) = make_lifecycle(StubProvider::default());
        lifecycle.unload_all();
        assert_eq!(log.events(), vec!["reclaim"]);
    }

    #[test]
    fn test_unload_all_moves_both_to_host_and_reclaims() {
        let (mut lifecycle, log) = make_lifecycle(StubProvider::default());
        lifecycle.acquire_caption().unwrap();
        lifecycle.acquire_embedding().unwrap();
        lifecycle.unload_all();

        assert_eq!(lifecycle.residency(ModelKind::Caption), Residency::Host);
        assert_eq!(lifecycle.residency(ModelKind::Embedding), Residency::Host);
        assert!(log.events().contains(&"reclaim".to_string()));
    }

    #[test]
    fn test_preflight_only_in_low_memory_mode() {
        let (lifecycle, log) = make_lifecycle(StubProvider::default());
        lifecycle.preflight();
        assert!(log.events().is_empty());

        let log = PressureLog::new();
        let mut device = DeviceConfig::default();
        device.low_memory = true;
        let lifecycle = ModelLifecycle::new(
            Box::new(StubProvider::default()),
            Box::new(log.clone()),
            &device,
            &InterrogateConfig::default(),
        );
        lifecycle.preflight();
        assert_eq!(log.events(), vec!["release_device_memory", "reclaim"]);
    }

    #[test]
    fn test_precision_policy() {
        // Accelerator present, no override: half precision.
        let provider = StubProvider {
            accelerator: true,
            ..StubProvider::default()
        };
        let (lifecycle, _log) = make_lifecycle(provider);
        assert_eq!(lifecycle.precision(), Precision::Half);

        // Accelerator present but full precision forced.
        let mut device = DeviceConfig::default();
        device.full_precision = true;
        let lifecycle = ModelLifecycle::new(
            Box::new(StubProvider {
                accelerator: true,
                ..StubProvider::default()
            }),
            Box::new(PressureLog::new()),
            &device,
            &InterrogateConfig::default(),
        );
        assert_eq!(lifecycle.precision(), Precision::Full);

        // CPU-only host: half precision is skipped entirely.
        let provider = StubProvider {
            accelerator: false,
            ..StubProvider::default()
        };
        let (lifecycle, _log) = make_lifecycle(provider);
        assert_eq!(lifecycle.precision(), Precision::Full);
    }

    #[test]
    fn test_load_failure_propagates_and_leaves_slot_empty() {
        let provider = StubProvider {
            fail_caption_load: true,
            ..StubProvider::default()
        };
        let (mut lifecycle, _log) = make_lifecycle(provider);

        assert!(lifecycle.acquire_caption().is_err());
        assert_eq!(lifecycle.residency(ModelKind::Caption), Residency::Unloaded);
    }
}
