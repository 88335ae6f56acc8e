//! Vocabulary categories for similarity ranking.
//!
//! Each regular file in the vocabulary directory becomes one category. An
//! optional `.top<N>.` infix in the filename sets how many ranked matches
//! that category contributes (default 1). Lines are trimmed but otherwise
//! kept verbatim, so duplicates and empty candidates are possible and left
//! to the ranker.

use std::path::Path;

use crate::error::ApertureError;

/// A named, ranked vocabulary list with a fixed result-count limit.
#[derive(Debug, Clone)]
pub struct Category {
    /// Source filename
    pub name: String,
    /// Number of ranked results to keep for this category
    pub topn: usize,
    /// Candidate tag strings in file order
    pub items: Vec<String>,
}

/// Read-only collection of categories, built once at startup.
pub struct VocabularyStore {
    categories: Vec<Category>,
}

impl VocabularyStore {
    /// Load categories from a directory of vocabulary files.
    ///
    /// A missing directory yields an empty store, not an error. Category
    /// order follows directory iteration order, which is not guaranteed
    /// stable across platforms — callers may rely on set membership only.
    pub fn load(dir: &Path) -> Result<Self, ApertureError> {
        let mut categories = Vec::new();

        if !dir.exists() {
            tracing::debug!("Vocabulary directory {:?} does not exist; starting empty", dir);
            return Ok(Self { categories });
        }

        let entries = std::fs::read_dir(dir).map_err(|e| ApertureError::Vocabulary {
            path: dir.to_path_buf(),
            message: e.to_string(),
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| ApertureError::Vocabulary {
                path: dir.to_path_buf(),
                message: e.to_string(),
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            let topn = parse_topn(&name);

            let content =
                std::fs::read_to_string(&path).map_err(|e| ApertureError::Vocabulary {
                    path: path.clone(),
                    message: e.to_string(),
                })?;
            let items: Vec<String> = content.lines().map(|l| l.trim().to_string()).collect();

            tracing::debug!("Loaded category {:?} (topn {}, {} items)", name, topn, items.len());
            categories.push(Category { name, topn, items });
        }

        tracing::info!(
            "Loaded {} vocabulary categories from {:?}",
            categories.len(),
            dir
        );
        Ok(Self { categories })
    }

    /// Create an empty store.
    pub fn empty() -> Self {
        Self { categories: vec![] }
    }

    /// All categories in load order.
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

/// Parse the `.top<N>.` filename infix; absent or malformed yields 1.
fn parse_topn(filename: &str) -> usize {
    let mut rest = filename;
    while let Some(pos) = rest.find(".top") {
        let tail = &rest[pos + 4..];
        let digits: String = tail.chars().take_while(|c| c.is_ascii_digit()).collect();
        if !digits.is_empty() && tail[digits.len()..].starts_with('.') {
            if let Ok(n) = digits.parse() {
                return n;
            }
        }
        rest = tail;
    }
    1
}
