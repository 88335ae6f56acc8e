//! Built-in artist vocabulary for "by <artist>" ranking.
//!
//! When enabled, the pipeline ranks the image against a synthetic candidate
//! list of `"by <name>"` phrases and appends the single best match to the
//! caption. The list is read from `artists.txt` in the content directory,
//! falling back to an embedded default.

use std::path::Path;

/// Ordered list of known artist names.
pub struct ArtistList {
    names: Vec<String>,
}

impl ArtistList {
    /// Load artist names from `artists.txt` in the given directory, or fall
    /// back to the embedded default list if the file is absent.
    pub fn load(content_dir: &Path) -> Self {
        let path = content_dir.join("artists.txt");
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let list = Self::from_content(&content);
                tracing::debug!("Loaded {} artists from {:?}", list.len(), path);
                list
            }
            Err(_) => {
                tracing::debug!("No artists.txt at {:?}; using embedded list", path);
                Self::embedded()
            }
        }
    }

    /// The embedded default artist list shipped with the binary.
    pub fn embedded() -> Self {
        Self::from_content(include_str!("../../../data/artists.txt"))
    }

    /// Build a list from explicit names (primarily for tests).
    pub fn from_names(names: Vec<String>) -> Self {
        Self { names }
    }

    fn from_content(content: &str) -> Self {
        let names = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(str::to_string)
            .collect();
        Self { names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Synthetic ranking candidates: `"by <name>"` for every artist.
    pub fn phrases(&self) -> Vec<String> {
        self.names.iter().map(|n| format!("by {n}")).collect()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_content_skips_blanks_and_comments() {
        let list = ArtistList::from_content("Claude Monet\n\n# header\n  Gustav Klimt  \n");
        assert_eq!(list.names(), &["Claude Monet", "Gustav Klimt"]);
    }

    #[test]
    fn test_phrases() {
        let list = ArtistList::from_names(vec!["Claude Monet".to_string()]);
        assert_eq!(list.phrases(), vec!["by Claude Monet"]);
    }

    #[test]
    fn test_embedded_list_nonempty() {
        assert!(!ArtistList::embedded().is_empty());
    }

    #[test]
    fn test_load_falls_back_to_embedded() {
        let dir = tempfile::tempdir().unwrap();
        let list = ArtistList::load(dir.path());
        assert_eq!(list.len(), ArtistList::embedded().len());
    }

    #[test]
    fn test_load_prefers_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("artists.txt"), "Hokusai\n").unwrap();
        let list = ArtistList::load(dir.path());
        assert_eq!(list.names(), &["Hokusai"]);
    }
}
