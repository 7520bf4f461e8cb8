//! superres CLI - upscale a random sample image and show it next to the original.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use superres::model::ModelSource;
use superres::{Config, Pipeline, Presentation, Sample, SampleSet};

/// Run a super-resolution model on a randomly picked grayscale sample.
#[derive(Parser, Debug)]
#[command(name = "superres")]
#[command(version, about, long_about = None)]
struct Args {
    /// Sample image path or URL. May be given more than once.
    #[arg(short, long = "sample", value_name = "SOURCE")]
    samples: Vec<String>,

    /// Directory whose image files are added to the samples.
    #[arg(long, value_name = "DIR")]
    samples_dir: Option<PathBuf>,

    /// ONNX model path or URL. Defaults to the ONNX model zoo super-resolution model.
    #[arg(short, long, value_name = "PATH|URL")]
    model: Option<String>,

    /// Width the sample is resized to before inference.
    #[arg(long, default_value = "224", value_name = "INT")]
    width: u32,

    /// Height the sample is resized to before inference.
    #[arg(long, default_value = "224", value_name = "INT")]
    height: u32,

    /// Where to write the side-by-side image.
    #[arg(short, long, value_name = "OUTPUT")]
    output: PathBuf,

    /// Also write the full-resolution upscaled image here.
    #[arg(long, value_name = "PATH")]
    upscaled: Option<PathBuf>,

    /// Output JPEG quality (1-100).
    #[arg(short, long, default_value = "95", value_name = "INT")]
    quality: u8,

    /// Number of intra-op threads for inference.
    #[arg(long, default_value = "1", value_name = "INT")]
    threads: usize,

    /// Random seed for sample selection.
    #[arg(long, value_name = "INT")]
    seed: Option<u64>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("superres={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    if let Err(err) = run(&args) {
        tracing::error!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn run(args: &Args) -> Result<()> {
    let mut samples = SampleSet::new(args.samples.iter().map(|s| Sample::parse(s)).collect());
    if let Some(dir) = &args.samples_dir {
        let found = SampleSet::from_dir(dir)
            .with_context(|| format!("Failed to read samples from {}", dir.display()))?;
        samples.extend(found);
    }
    if samples.is_empty() {
        anyhow::bail!("No sample images given; use --sample or --samples-dir");
    }

    let config = Config {
        width: args.width,
        height: args.height,
        model: args
            .model
            .as_deref()
            .map_or_else(ModelSource::default, ModelSource::parse),
        samples,
        intra_threads: args.threads,
        output_quality: args.quality,
        seed: args.seed,
    };

    let mut pipeline = Pipeline::new(config).context("Failed to initialize pipeline")?;

    let output = pipeline.run_random().context("Failed to run super resolution")?;

    let mut presentation = Presentation::new(args.width, args.height);
    presentation.show(&output);

    pipeline
        .save(&presentation.compose(), &args.output)
        .context("Failed to save presentation")?;

    if let Some(path) = &args.upscaled {
        pipeline
            .save(&output.upscaled, path)
            .context("Failed to save upscaled image")?;
    }

    println!("{}", presentation.status());
    println!(
        "Processed {} -> {}",
        output.sample,
        args.output.display()
    );

    Ok(())
}
