//! The `aperture models` command for managing model files.

use std::path::Path;

use clap::{Args, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use aperture_core::models::installer::{verify_blake3, ModelArtifact};
use aperture_core::models::provider::{caption_artifacts, embedding_artifacts};
use aperture_core::models::Precision;
use aperture_core::Config;

/// Arguments for the `models` command.
#[derive(Args, Debug)]
pub struct ModelsArgs {
    #[command(subcommand)]
    pub command: ModelsCommand,
}

/// Subcommands for model management.
#[derive(Subcommand, Debug)]
pub enum ModelsCommand {
    /// Download required models (caption + embedding weights and tokenizers)
    Download {
        /// Fetch reduced-precision (fp16) weights
        #[arg(long)]
        half: bool,
    },

    /// List installed models and vocabulary files
    List,

    /// Show model directory path
    Path,
}

/// Vocabulary files installed alongside the models.
const VOCABULARY_FILES: &[(&str, &str)] = &[
    ("artists.txt", include_str!("../../../../data/artists.txt")),
    (
        "mediums.txt",
        include_str!("../../../../data/vocabulary/mediums.txt"),
    ),
    (
        "movements.txt",
        include_str!("../../../../data/vocabulary/movements.txt"),
    ),
    (
        "flavors.top3.txt",
        include_str!("../../../../data/vocabulary/flavors.top3.txt"),
    ),
];

fn all_artifacts(precision: Precision) -> Vec<ModelArtifact> {
    let mut artifacts = caption_artifacts(precision);
    artifacts.extend(embedding_artifacts(precision));
    artifacts
}

/// Execute the models command.
pub async fn execute(args: ModelsArgs) -> anyhow::Result<()> {
    let config = Config::load()?;

    match args.command {
        ModelsCommand::Download { half } => {
            let precision = if half {
                Precision::Half
            } else {
                Precision::Full
            };
            let model_dir = config.model_dir();
            std::fs::create_dir_all(&model_dir)?;

            let client = reqwest::Client::new();
            for artifact in all_artifacts(precision) {
                let dest = model_dir.join(&artifact.local_name);
                if dest.exists() {
                    tracing::info!("{} already exists at {:?}", artifact.name, dest);
                    continue;
                }

                tracing::info!("Downloading {}...", artifact.name);
                tracing::info!("  Source: {}", artifact.url);
                tracing::info!("  Destination: {:?}", dest);
                download_file(&client, &artifact.url, &dest).await?;

                if let Some(expected) = &artifact.blake3 {
                    verify_blake3(&dest, expected)?;
                }

                let file_size = std::fs::metadata(&dest)?.len();
                tracing::info!(
                    "  {} complete ({:.1} MB)",
                    artifact.name,
                    file_size as f64 / (1024.0 * 1024.0)
                );
            }

            install_vocabulary(&config)?;
            tracing::info!("All downloads complete.");
        }

        ModelsCommand::List => {
            let model_dir = config.model_dir();

            if !model_dir.exists() {
                println!("No models installed.");
                println!("Run `aperture models download` to download required models.");
                return Ok(());
            }

            println!("Installed models:");
            println!("  Directory: {}\n", model_dir.display());

            for (label, precision) in [("fp32", Precision::Full), ("fp16", Precision::Half)] {
                println!("  Weights ({label}):");
                for artifact in all_artifacts(precision) {
                    let status = if model_dir.join(&artifact.local_name).exists() {
                        "ready"
                    } else {
                        "not installed"
                    };
                    println!("    - {:32} {}", artifact.local_name, status);
                }
                println!();
            }

            let vocab_dir = config.vocabulary_dir();
            println!("  Vocabulary ({}):", vocab_dir.display());
            for (name, _) in VOCABULARY_FILES {
                let status = if vocab_dir.join(name).exists() {
                    "ready"
                } else {
                    "not installed"
                };
                println!("    - {:32} {}", name, status);
            }
        }

        ModelsCommand::Path => {
            let model_dir = config.model_dir();
            println!("{}", model_dir.display());
        }
    }

    Ok(())
}

/// Install embedded vocabulary files to the vocabulary directory.
///
/// Existing files are never overwritten, so local edits survive re-runs.
pub fn install_vocabulary(config: &Config) -> anyhow::Result<()> {
    let vocab_dir = config.vocabulary_dir();
    std::fs::create_dir_all(&vocab_dir)?;

    for (name, content) in VOCABULARY_FILES {
        let path = vocab_dir.join(name);
        if path.exists() {
            continue;
        }
        std::fs::write(&path, content)?;
        tracing::info!("Installed {} to {:?}", name, path);
    }

    Ok(())
}

/// Download a file from a URL to a local path, streaming to disk.
async fn download_file(client: &reqwest::Client, url: &str, dest: &Path) -> anyhow::Result<()> {
    use futures_util::StreamExt;
    use tokio::io::AsyncWriteExt;

    let response = client
        .get(url)
        .send()
        .await?
        .error_for_status()
        .map_err(|e| anyhow::anyhow!("Download failed: {e}"))?;

    let total_size = response.content_length();
    let progress = match total_size {
        Some(size) => {
            let bar = ProgressBar::new(size);
            bar.set_style(
                ProgressStyle::with_template("  {bar:40} {bytes}/{total_bytes} ({eta})")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar
        }
        None => ProgressBar::new_spinner(),
    };

    let mut file = tokio::fs::File::create(dest).await?;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        progress.inc(chunk.len() as u64);
    }

    file.flush().await?;
    progress.finish_and_clear();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_vocabulary_is_nonempty() {
        for (name, content) in VOCABULARY_FILES {
            assert!(!content.trim().is_empty(), "{name} is empty");
        }
    }

    #[test]
    fn test_install_vocabulary_preserves_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.vocabulary.dir = dir.path().to_string_lossy().into_owned();

        std::fs::write(dir.path().join("mediums.txt"), "my custom list\n").unwrap();
        install_vocabulary(&config).unwrap();

        let kept = std::fs::read_to_string(dir.path().join("mediums.txt")).unwrap();
        assert_eq!(kept, "my custom list\n");
        assert!(dir.path().join("movements.txt").exists());
        assert!(dir.path().join("artists.txt").exists());
    }

    #[test]
    fn test_artifact_manifest_covers_both_backends() {
        let artifacts = all_artifacts(Precision::Full);
        assert_eq!(artifacts.len(), 6);
        let names: Vec<&str> = artifacts.iter().map(|a| a.local_name.as_str()).collect();
        assert!(names.contains(&"caption_tokenizer.json"));
        assert!(names.contains(&"embedding_tokenizer.json"));
    }
}
