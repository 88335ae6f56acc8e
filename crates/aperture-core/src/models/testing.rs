//! Stub model implementations for unit tests.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use image::DynamicImage;

use crate::error::ModelError;
use crate::types::EmbeddingBatch;

use super::{
    CaptionModel, CaptionParams, EmbeddingModel, MemoryPressure, ModelProvider, ModelTier,
    Precision,
};

/// Records memory-pressure hook invocations in order.
#[derive(Clone, Default)]
pub struct PressureLog {
    events: Rc<RefCell<Vec<String>>>,
}

impl PressureLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.borrow().clone()
    }
}

impl MemoryPressure for PressureLog {
    fn release_device_memory(&self) {
        self.events.borrow_mut().push("release_device_memory".to_string());
    }

    fn reclaim(&self) {
        self.events.borrow_mut().push("reclaim".to_string());
    }
}

/// Caption model stub with scriptable output and failure.
pub struct StubCaption {
    pub caption: String,
    pub fail: bool,
    pub on_device: bool,
}

impl ModelTier for StubCaption {
    fn to_device(&mut self) -> Result<(), ModelError> {
        self.on_device = true;
        Ok(())
    }

    fn to_host(&mut self) {
        self.on_device = false;
    }

    fn is_on_device(&self) -> bool {
        self.on_device
    }
}

impl CaptionModel for StubCaption {
    fn generate_caption(
        &mut self,
        _image: &DynamicImage,
        _params: &CaptionParams,
    ) -> Result<String, ModelError> {
        if self.fail {
            return Err(ModelError::Inference {
                message: "synthetic caption failure".to_string(),
            });
        }
        Ok(self.caption.clone())
    }
}

/// Embedding model stub that maps known candidate strings to fixed vectors.
///
/// `encode_image` always yields one unit sample along the first axis, so a
/// candidate's ranking score tracks the first component of its table vector.
pub struct StubEmbedding {
    pub table: Vec<(&'static str, Vec<f32>)>,
    pub on_device: bool,
    /// Candidate counts observed by `encode_text`, for cap assertions.
    pub encoded_counts: Rc<RefCell<Vec<usize>>>,
}

impl StubEmbedding {
    pub fn new(table: Vec<(&'static str, Vec<f32>)>) -> Self {
        Self {
            table,
            on_device: false,
            encoded_counts: Rc::new(RefCell::new(Vec::new())),
        }
    }
}

impl ModelTier for StubEmbedding {
    fn to_device(&mut self) -> Result<(), ModelError> {
        self.on_device = true;
        Ok(())
    }

    fn to_host(&mut self) {
        self.on_device = false;
    }

    fn is_on_device(&self) -> bool {
        self.on_device
    }
}

impl EmbeddingModel for StubEmbedding {
    fn encode_image(&mut self, _image: &DynamicImage) -> Result<EmbeddingBatch, ModelError> {
        Ok(EmbeddingBatch::new(vec![vec![1.0, 0.0, 0.0]]))
    }

    fn encode_text(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        self.encoded_counts.borrow_mut().push(texts.len());
        Ok(texts
            .iter()
            .map(|t| {
                self.table
                    .iter()
                    .find(|(label, _)| label == t)
                    .map(|(_, v)| v.clone())
                    .unwrap_or_else(|| vec![0.0, 0.0, 1.0])
            })
            .collect())
    }
}

/// Provider stub that counts loads and can simulate load failure.
pub struct StubProvider {
    pub caption: String,
    pub fail_caption: bool,
    pub fail_caption_load: bool,
    pub table: Vec<(&'static str, Vec<f32>)>,
    pub accelerator: bool,
    pub caption_loads: Rc<Cell<usize>>,
    pub embedding_loads: Rc<Cell<usize>>,
}

impl Default for StubProvider {
    fn default() -> Self {
        Self {
            caption: "a cat sitting on a table".to_string(),
            fail_caption: false,
            fail_caption_load: false,
            table: Vec::new(),
            accelerator: true,
            caption_loads: Rc::new(Cell::new(0)),
            embedding_loads: Rc::new(Cell::new(0)),
        }
    }
}

impl ModelProvider for StubProvider {
    fn load_caption(&self, _precision: Precision) -> Result<Box<dyn CaptionModel>, ModelError> {
        if self.fail_caption_load {
            return Err(ModelError::Load {
                path: "caption.onnx".into(),
                message: "synthetic load failure".to_string(),
            });
        }
        self.caption_loads.set(self.caption_loads.get() + 1);
        Ok(Box::new(StubCaption {
            caption: self.caption.clone(),
            fail: self.fail_caption,
            on_device: false,
        }))
    }

    fn load_embedding(&self, _precision: Precision) -> Result<Box<dyn EmbeddingModel>, ModelError> {
        self.embedding_loads.set(self.embedding_loads.get() + 1);
        Ok(Box::new(StubEmbedding::new(self.table.clone())))
    }

    fn has_accelerator(&self) -> bool {
        self.accelerator
    }
}
