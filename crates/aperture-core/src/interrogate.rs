//! The interrogation pipeline: caption, rank, assemble, always evict.
//!
//! One call drives both models through load → caption → swap → embed →
//! per-category ranking, and guarantees both models are off the device tier
//! before returning, whatever happened in between. Failures never propagate
//! past [`Interrogator::interrogate`]; the caller always receives
//! displayable text.

use image::DynamicImage;

use crate::artists::ArtistList;
use crate::config::{CaptionConfig, Config, InterrogateConfig};
use crate::error::ApertureError;
use crate::models::{CaptionParams, MemoryPressure, ModelKind, ModelLifecycle, ModelProvider};
use crate::rank;
use crate::types::Interrogation;
use crate::vocabulary::VocabularyStore;

/// Produces captioned, tag-augmented descriptions of images.
///
/// Not safe for concurrent calls: both model handles are exclusive mutable
/// state, so callers must serialize interrogations externally.
pub struct Interrogator {
    lifecycle: ModelLifecycle,
    store: VocabularyStore,
    artists: ArtistList,
    options: InterrogateConfig,
    caption: CaptionConfig,
}

impl Interrogator {
    /// Build an interrogator from configuration with the given collaborators.
    ///
    /// The vocabulary directory is read once here; categories are immutable
    /// afterward.
    pub fn new(
        config: &Config,
        provider: Box<dyn ModelProvider>,
        pressure: Box<dyn MemoryPressure>,
    ) -> Result<Self, ApertureError> {
        let content_dir = config.vocabulary_dir();
        let store = VocabularyStore::load(&content_dir)?;
        let artists = ArtistList::load(&content_dir);
        let lifecycle = ModelLifecycle::new(provider, pressure, &config.device, &config.interrogate);

        Ok(Self {
            lifecycle,
            store,
            artists,
            options: config.interrogate.clone(),
            caption: config.caption.clone(),
        })
    }

    /// Interrogate one image.
    ///
    /// On failure the partial text assembled so far is returned as
    /// [`Interrogation::Partial`] with the error logged; the models are
    /// released to the host tier in every case.
    pub fn interrogate(&mut self, image: &DynamicImage) -> Interrogation {
        let mut text = String::new();
        let outcome = self.run(image, &mut text);

        // Model residency must never outlive a single call.
        self.lifecycle.unload_all();

        match outcome {
            Ok(()) => Interrogation::Complete(text),
            Err(error) => {
                tracing::error!("Interrogation failed: {error}");
                log_error_chain(&error);
                Interrogation::Partial { text, error }
            }
        }
    }

    fn run(&mut self, image: &DynamicImage, text: &mut String) -> Result<(), ApertureError> {
        self.lifecycle.preflight();

        // Both models come up front so a mid-call load failure surfaces
        // before any output is produced.
        self.lifecycle.acquire_caption()?;
        self.lifecycle.acquire_embedding()?;

        let params = CaptionParams::from(&self.caption);
        let caption = self
            .lifecycle
            .acquire_caption()?
            .generate_caption(image, &params)?;
        text.push_str(caption.trim());

        // The caption model is finished; get it off the device before the
        // larger embedding tensors are materialized.
        self.lifecycle.release_to_host(ModelKind::Caption);
        self.lifecycle.reclaim();

        let model = self.lifecycle.acquire_embedding()?;
        let mut image_embedding = model.encode_image(image)?;
        image_embedding.normalize();

        if self.options.use_builtin_artists && !self.artists.is_empty() {
            let phrases = self.artists.phrases();
            let matches = rank::rank(
                model,
                &image_embedding,
                &phrases,
                1,
                self.options.candidate_limit,
            )?;
            if let Some(top) = matches.first() {
                text.push_str(", ");
                text.push_str(&top.label);
            }
        }

        for category in self.store.categories() {
            let matches = rank::rank(
                model,
                &image_embedding,
                &category.items,
                category.topn,
                self.options.candidate_limit,
            )?;
            for m in &matches {
                append_match(text, &m.label, m.confidence, self.options.return_ranks);
            }
        }

        Ok(())
    }
}

/// Append one match clause: `", <label>"` in plain mode, or
/// `", (<label>:<confidence/100>)"` to three decimals in ranked-score mode.
fn append_match(text: &mut String, label: &str, confidence: f32, return_ranks: bool) {
    if return_ranks {
        text.push_str(&format!(", ({label}:{:.3})", confidence / 100.0));
    } else {
        text.push_str(", ");
        text.push_str(label);
    }
}

fn log_error_chain(error: &ApertureError) {
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        tracing::error!("  caused by: {cause}");
        source = cause.source();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::testing::{PressureLog, StubProvider};
    use crate::models::Residency;

    fn test_image() -> DynamicImage {
        DynamicImage::ImageRgb8(image::RgbImage::new(8, 8))
    }

    /// Vocabulary store: mediums.top2.txt with three candidates.
    fn mediums_store() -> VocabularyStore {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("mediums.top2.txt"),
            "oil painting\nwatercolor\ndigital art\n",
        )
        .unwrap();
        VocabularyStore::load(dir.path()).unwrap()
    }

    /// Embedding table favoring watercolor, then oil painting.
    fn mediums_table() -> Vec<(&'static str, Vec<f32>)> {
        vec![
            ("oil painting", vec![0.8, 0.6, 0.0]),
            ("watercolor", vec![1.0, 0.0, 0.0]),
            ("digital art", vec![0.0, 1.0, 0.0]),
        ]
    }

    fn interrogator(provider: StubProvider, store: VocabularyStore) -> (Interrogator, PressureLog) {
        let log = PressureLog::new();
        let config = Config::default();
        let mut options = config.interrogate.clone();
        options.use_builtin_artists = false;
        let interrogator = Interrogator {
            lifecycle: ModelLifecycle::new(
                Box::new(provider),
                Box::new(log.clone()),
                &config.device,
                &options,
            ),
            store,
            artists: ArtistList::from_names(vec![]),
            options,
            caption: config.caption.clone(),
        };
        (interrogator, log)
    }

    #[test]
    fn test_end_to_end_plain_mode() {
        let provider = StubProvider {
            table: mediums_table(),
            ..StubProvider::default()
        };
        let (mut interrogator, _log) = interrogator(provider, mediums_store());

        let result = interrogator.interrogate(&test_image());
        assert!(!result.is_partial());
        assert_eq!(
            result.into_display_string(),
            "a cat sitting on a table, watercolor, oil painting"
        );
    }

    #[test]
    fn test_end_to_end_ranked_mode() {
        let provider = StubProvider {
            table: mediums_table(),
            ..StubProvider::default()
        };
        let (mut interrogator, _log) = interrogator(provider, mediums_store());
        interrogator.options.return_ranks = true;

        // Softmax at temperature 100 saturates hard on the stub's scores.
        let text = interrogator.interrogate(&test_image()).into_display_string();
        assert!(text.starts_with("a cat sitting on a table, (watercolor:1.000)"));
        assert!(text.contains(", (oil painting:0.000)"));
    }

    #[test]
    fn test_artist_phrase_appended() {
        let provider = StubProvider {
            table: vec![("by Claude Monet", vec![1.0, 0.0, 0.0])],
            ..StubProvider::default()
        };
        let (mut interrogator, _log) = interrogator(provider, VocabularyStore::empty());
        interrogator.options.use_builtin_artists = true;
        interrogator.artists = ArtistList::from_names(vec![
            "Claude Monet".to_string(),
            "Gustav Klimt".to_string(),
        ]);

        let text = interrogator.interrogate(&test_image()).into_display_string();
        assert_eq!(text, "a cat sitting on a table, by Claude Monet");
    }

    #[test]
    fn test_models_evicted_after_success() {
        let provider = StubProvider {
            table: mediums_table(),
            ..StubProvider::default()
        };
        let (mut interrogator, log) = interrogator(provider, mediums_store());

        interrogator.interrogate(&test_image());
        for kind in [ModelKind::Caption, ModelKind::Embedding] {
            let residency = interrogator.lifecycle.residency(kind);
            assert!(
                matches!(residency, Residency::Host | Residency::Unloaded),
                "{kind:?} still on device after success"
            );
        }
        assert!(log.events().contains(&"reclaim".to_string()));
    }

    #[test]
    fn test_models_evicted_after_caption_failure() {
        let provider = StubProvider {
            fail_caption: true,
            ..StubProvider::default()
        };
        let (mut interrogator, _log) = interrogator(provider, mediums_store());

        let result = interrogator.interrogate(&test_image());
        assert!(result.is_partial());
        for kind in [ModelKind::Caption, ModelKind::Embedding] {
            let residency = interrogator.lifecycle.residency(kind);
            assert!(
                matches!(residency, Residency::Host | Residency::Unloaded),
                "{kind:?} still on device after failure"
            );
        }
    }

    #[test]
    fn test_caption_failure_yields_marked_empty_result() {
        let provider = StubProvider {
            fail_caption: true,
            ..StubProvider::default()
        };
        let (mut interrogator, _log) = interrogator(provider, mediums_store());

        let result = interrogator.interrogate(&test_image());
        assert_eq!(result.text(), "");
        assert_eq!(result.into_display_string(), "<error>");
    }

    #[test]
    fn test_load_failure_yields_partial() {
        let provider = StubProvider {
            fail_caption_load: true,
            ..StubProvider::default()
        };
        let (mut interrogator, _log) = interrogator(provider, mediums_store());

        let result = interrogator.interrogate(&test_image());
        assert!(result.is_partial());
        assert!(result.error().is_some());
    }

    #[test]
    fn test_append_match_plain() {
        let mut text = "a cat".to_string();
        append_match(&mut text, "watercolor", 87.654, false);
        assert_eq!(text, "a cat, watercolor");
    }

    #[test]
    fn test_append_match_ranked_formats_three_decimals() {
        let mut text = String::new();
        append_match(&mut text, "watercolor", 87.654, true);
        assert_eq!(text, ", (watercolor:0.877)");
    }

    #[test]
    fn test_low_memory_preflight_runs_before_loads() {
        let log = PressureLog::new();
        let config = Config::default();
        let mut device = config.device.clone();
        device.low_memory = true;
        let mut options = config.interrogate.clone();
        options.use_builtin_artists = false;
        let mut interrogator = Interrogator {
            lifecycle: ModelLifecycle::new(
                Box::new(StubProvider {
                    table: mediums_table(),
                    ..StubProvider::default()
                }),
                Box::new(log.clone()),
                &device,
                &options,
            ),
            store: VocabularyStore::empty(),
            artists: ArtistList::from_names(vec![]),
            options,
            caption: config.caption.clone(),
        };

        interrogator.interrogate(&test_image());
        let events = log.events();
        assert_eq!(events[0], "release_device_memory");
        assert_eq!(events[1], "reclaim");
    }
}
