//! The `aperture interrogate` command.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use aperture_core::models::{NoopMemoryPressure, OnnxModelProvider};
use aperture_core::{Config, Interrogation, Interrogator};

/// Arguments for the `interrogate` command.
#[derive(Args, Debug)]
pub struct InterrogateArgs {
    /// Image files to interrogate
    #[arg(required = true)]
    pub images: Vec<PathBuf>,

    /// Append confidence scores to each tag
    #[arg(long)]
    pub ranks: bool,

    /// Skip the built-in artist list
    #[arg(long)]
    pub no_artists: bool,

    /// Keep models in memory between images (faster for batches)
    #[arg(long)]
    pub keep_models: bool,

    /// Force full-precision weights even when an accelerator is present
    #[arg(long)]
    pub full_precision: bool,

    /// Aggressively evict device memory before each interrogation
    #[arg(long)]
    pub low_memory: bool,

    /// Override beam width for caption generation
    #[arg(long, value_name = "BEAMS")]
    pub best: Option<usize>,

    /// Emit one JSON object per image instead of plain text
    #[arg(long)]
    pub json: bool,
}

/// One interrogation result as emitted in `--json` mode.
#[derive(Serialize)]
struct InterrogateRecord {
    path: String,
    caption: String,
    partial: bool,
}

/// Execute the interrogate command.
pub async fn execute(args: InterrogateArgs) -> anyhow::Result<()> {
    let mut config = Config::load()?;

    // CLI flags layer on top of the config file; flags only tighten.
    config.interrogate.return_ranks |= args.ranks;
    config.interrogate.keep_models_in_memory |= args.keep_models;
    if args.no_artists {
        config.interrogate.use_builtin_artists = false;
    }
    config.device.full_precision |= args.full_precision;
    config.device.low_memory |= args.low_memory;
    if let Some(beams) = args.best {
        config.caption.num_beams = beams;
    }
    config.validate()?;

    let images = args.images.clone();
    let show_progress = !args.json && images.len() > 1;

    // Model inference is synchronous and CPU/GPU bound; keep it off the
    // async runtime.
    let results = tokio::task::spawn_blocking(move || run_all(&config, &images, show_progress))
        .await
        .context("Interrogation task panicked")??;

    let mut failed = 0usize;
    for (path, result) in results {
        if result.is_partial() {
            failed += 1;
        }
        if args.json {
            let record = InterrogateRecord {
                path: path.display().to_string(),
                caption: result.text().to_string(),
                partial: result.is_partial(),
            };
            println!("{}", serde_json::to_string(&record)?);
        } else if args.images.len() > 1 {
            println!("{}: {}", path.display(), result.into_display_string());
        } else {
            println!("{}", result.into_display_string());
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} interrogations failed", args.images.len());
    }
    Ok(())
}

fn run_all(
    config: &Config,
    images: &[PathBuf],
    show_progress: bool,
) -> anyhow::Result<Vec<(PathBuf, Interrogation)>> {
    let provider = OnnxModelProvider::new(config.model_dir());
    let mut interrogator =
        Interrogator::new(config, Box::new(provider), Box::new(NoopMemoryPressure))?;

    let progress = if show_progress {
        let bar = ProgressBar::new(images.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Some(bar)
    } else {
        None
    };

    let mut results = Vec::with_capacity(images.len());
    for path in images {
        if let Some(bar) = &progress {
            bar.set_message(path.display().to_string());
        }
        let image = image::open(path)
            .with_context(|| format!("Failed to open image: {}", path.display()))?;
        results.push((path.clone(), interrogator.interrogate(&image)));
        if let Some(bar) = &progress {
            bar.inc(1);
        }
    }
    if let Some(bar) = progress {
        bar.finish_and_clear();
    }

    Ok(results)
}
