//! `remove-bg` command-line tool
//!
//! With no positional arguments it runs the legacy job: read
//! `temp_uncprocessed_imgs/clr15oo8j005c356d04xhef8b.jpeg`, write
//! `temp_processed_imgs/test.png`, print `yay`.

use super::config::CliConfigBuilder;
use crate::{
    cache::{ModelCache, DEFAULT_MODEL_URL},
    download::{validate_model_url, ModelDownloader},
    error::BgRemovalError,
    job::{run_job, RemovalJob},
    models::{ModelSource, ModelSpec},
    processor::BackgroundRemovalProcessor,
    services::{OutputFormatHandler, ProgressTracker},
    tracing_config::init_cli_tracing,
    utils::ExecutionProviderManager,
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Remove the background from a wardrobe photo
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "remove-bg")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Input image [default: temp_uncprocessed_imgs/clr15oo8j005c356d04xhef8b.jpeg]
    #[arg(value_name = "INPUT")]
    pub input: Option<PathBuf>,

    /// Output file, replaced if it exists; its directory must exist
    /// [default: temp_processed_imgs/test.png]
    #[arg(value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Output format [default: from the output file extension]
    #[arg(short, long, value_enum)]
    pub format: Option<CliOutputFormat>,

    /// Backend and provider as backend:provider (onnx:auto, onnx:cuda, tract:cpu, threshold, threshold:inverted)
    #[arg(short, long, default_value = "onnx:auto")]
    pub execution_provider: String,

    /// JPEG quality (0-100)
    #[arg(long, default_value_t = 90)]
    pub jpeg_quality: u8,

    /// WebP quality (0-100, output is lossless)
    #[arg(long, default_value_t = 85)]
    pub webp_quality: u8,

    /// Number of inference threads (0 = auto-detect)
    #[arg(short, long, default_value_t = 0)]
    pub threads: usize,

    /// Verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log filter directive, overrides -v (e.g. "closet_bgremove=debug,ort=warn")
    #[arg(long, value_name = "FILTER")]
    pub log_filter: Option<String>,

    /// Show backend and execution provider availability and exit
    #[arg(long)]
    pub show_providers: bool,

    /// Model id, HuggingFace URL or model directory, optionally suffixed with :variant
    /// [default: first cached model]
    #[arg(short, long)]
    pub model: Option<String>,

    /// Model variant (fp16, fp32)
    #[arg(long)]
    pub variant: Option<String>,

    /// Download the model given by --model (or the default model) and exit
    #[arg(long)]
    pub only_download: bool,

    /// List cached models and exit
    #[arg(long)]
    pub list_models: bool,

    /// Clear cached models (combine with --model to clear one) and exit
    #[arg(long)]
    pub clear_cache: bool,

    /// Model cache directory [default: $BGREMOVE_CACHE_DIR or the user cache dir]
    #[arg(long, value_name = "PATH")]
    pub cache_dir: Option<PathBuf>,

    /// Print per-stage progress to stderr
    #[arg(long)]
    pub progress: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum CliOutputFormat {
    Png,
    Jpeg,
    Webp,
    Tiff,
    Rgba8,
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_cli_tracing(cli.verbose, cli.log_filter.as_deref())
        .context("Failed to initialize tracing")?;

    run(cli).await
}

/// Execute a parsed command line
pub async fn run(cli: Cli) -> Result<()> {
    if cli.show_providers {
        show_provider_diagnostics();
        return Ok(());
    }

    let cache = open_cache(&cli)?;

    if cli.list_models {
        return list_cached_models(&cache);
    }
    if cli.only_download {
        return download_model_only(&cli, &cache).await;
    }
    if cli.clear_cache {
        return clear_cache_models(&cli, &cache);
    }

    CliConfigBuilder::validate_cli(&cli).context("Invalid CLI arguments")?;

    let job = RemovalJob::from_args(cli.input.clone(), cli.output.clone());
    if cli.input.is_none() {
        info!(
            input = %job.input.display(),
            output = %job.output.display(),
            "No input given, using the default paths"
        );
    }
    // A missing input must fail before any model download
    std::fs::metadata(&job.input)
        .map_err(|e| BgRemovalError::file_io_error("read input image", &job.input, &e))
        .with_context(|| format!("Cannot read input {}", job.input.display()))?;

    let mut config =
        CliConfigBuilder::from_cli(&cli, &job).context("Failed to build configuration")?;
    if config.backend_type.requires_model() {
        config.model_spec = ensure_model_available(&config.model_spec, &cache)
            .await
            .context("Failed to ensure model is available")?;
    }
    OutputFormatHandler::validate_for_background_removal(config.output_format);
    debug!(?config, "Resolved configuration");

    let mut processor = BackgroundRemovalProcessor::new(config)
        .context("Failed to create background removal processor")?;
    if cli.progress {
        processor = processor.with_progress(ProgressTracker::console(cli.verbose > 0));
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let report = run_job(&mut processor, &job, &mut out).with_context(|| {
        format!(
            "Failed to remove background from {} into {}",
            job.input.display(),
            job.output.display()
        )
    })?;

    info!(
        output = %report.output_path.display(),
        width = report.dimensions.0,
        height = report.dimensions.1,
        model = %report.model_name,
        total_ms = report.timings.total_ms,
        "Done"
    );
    Ok(())
}

fn open_cache(cli: &Cli) -> Result<ModelCache> {
    match &cli.cache_dir {
        Some(dir) => ModelCache::with_custom_cache_dir(dir)
            .with_context(|| format!("Failed to open cache directory {}", dir.display())),
        None => ModelCache::new().context("Failed to open model cache"),
    }
}

/// Make sure a cached model exists, downloading the default model if the
/// cache is empty or the default model was asked for
///
/// Returns a `ModelSpec` pointing at the model directory inside `cache`.
async fn ensure_model_available(model_spec: &ModelSpec, cache: &ModelCache) -> Result<ModelSpec> {
    let ModelSource::Downloaded(model_id) = &model_spec.source else {
        return Ok(model_spec.clone());
    };

    let model_id = if model_id.is_empty() {
        match cache.scan_cached_models()?.into_iter().next() {
            Some(model) => {
                info!(model = %model.model_id, "Using first cached model");
                model.model_id
            },
            None => download_default_model(cache).await?,
        }
    } else if cache.is_model_cached(model_id) {
        model_id.clone()
    } else if *model_id == ModelCache::default_model_id() {
        download_default_model(cache).await?
    } else {
        anyhow::bail!(
            "Model '{}' not found in cache. Use --only-download --model <URL> to download it, or --list-models to see cached models.",
            model_id
        );
    };

    Ok(ModelSpec {
        source: ModelSource::External(cache.get_model_path(&model_id)),
        variant: model_spec.variant.clone(),
    })
}

async fn download_default_model(cache: &ModelCache) -> Result<String> {
    warn!("📦 Model not cached, downloading {DEFAULT_MODEL_URL}");
    let downloader = ModelDownloader::with_cache(cache.clone())
        .context("Failed to create model downloader")?;
    downloader
        .download_model(DEFAULT_MODEL_URL, true)
        .await
        .context("Failed to download default model")
}

fn show_provider_diagnostics() {
    let cpu_count = std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1);

    println!("🔍 Backends and execution providers");
    println!("💻 System: {cpu_count} CPU cores detected");
    println!();

    for provider in ExecutionProviderManager::list_all_providers() {
        let status = if provider.available {
            "✅ available"
        } else {
            "❌ not available"
        };
        println!("  • {:<20} {:<16} {}", provider.name, status, provider.description);
    }

    println!();
    println!("💡 Examples:");
    println!("  remove-bg -e onnx:auto shirt.jpg shirt.png");
    println!("  remove-bg -e tract shirt.jpg shirt.png");
    println!("  remove-bg -e threshold:inverted white-shirt.jpg shirt.png");
}

fn list_cached_models(cache: &ModelCache) -> Result<()> {
    let models = cache
        .scan_cached_models()
        .context("Failed to list cached models")?;

    println!("📦 Cached models in {}", cache.get_current_cache_dir().display());
    if models.is_empty() {
        println!("No cached models found.");
        println!("💡 Download the default model with: remove-bg --only-download");
        return Ok(());
    }

    for model in models {
        println!("📁 {}", model.model_id);
        println!("  └─ Variants: {}", model.variants.join(", "));
        println!("  └─ Size: {}", crate::cache::format_size(model.size_bytes));
    }
    Ok(())
}

async fn download_model_only(cli: &Cli, cache: &ModelCache) -> Result<()> {
    let model_url = match &cli.model {
        Some(model) if model.starts_with("http") => model.clone(),
        Some(_) => anyhow::bail!(
            "--only-download requires a URL, e.g. --model {DEFAULT_MODEL_URL}"
        ),
        None => DEFAULT_MODEL_URL.to_string(),
    };
    validate_model_url(&model_url).context("Invalid model URL")?;

    let downloader = ModelDownloader::with_cache(cache.clone())
        .context("Failed to create model downloader")?;
    let model_id = downloader
        .download_model(&model_url, true)
        .await
        .with_context(|| format!("Failed to download model from {model_url}"))?;

    println!("✅ Downloaded model {model_id}");
    println!("   {}", cache.get_model_path(&model_id).display());
    Ok(())
}

fn clear_cache_models(cli: &Cli, cache: &ModelCache) -> Result<()> {
    if let Some(model_id) = &cli.model {
        if cache
            .clear_specific_model(model_id)
            .with_context(|| format!("Failed to clear model '{model_id}'"))?
        {
            println!("✅ Removed model {model_id}");
        } else {
            println!("⚠️  Model '{model_id}' not found in cache");
        }
    } else {
        let removed = cache.clear_all_models().context("Failed to clear cache")?;
        if removed.is_empty() {
            println!("💡 Cache was already empty");
        } else {
            println!("✅ Removed {} model(s): {}", removed.len(), removed.join(", "));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tests::write_fake_model;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("remove-bg").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_parse_positional_paths() {
        let cli = parse(&[]);
        assert!(cli.input.is_none());
        assert!(cli.output.is_none());
        assert_eq!(cli.execution_provider, "onnx:auto");

        let cli = parse(&["a.jpg", "b.png", "-f", "tiff", "-vv"]);
        assert_eq!(cli.input, Some(PathBuf::from("a.jpg")));
        assert_eq!(cli.output, Some(PathBuf::from("b.png")));
        assert_eq!(cli.format, Some(CliOutputFormat::Tiff));
        assert_eq!(cli.verbose, 2);

        assert!(Cli::try_parse_from(["remove-bg", "a", "b", "c"]).is_err());
    }

    #[tokio::test]
    async fn test_run_threshold_job() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("tee.jpeg");
        RgbImage::from_fn(32, 16, |x, _| if x < 16 { Rgb([0, 0, 0]) } else { Rgb([250, 250, 250]) })
            .save(&input)
            .unwrap();
        let output = temp.path().join("tee.png");
        let cache_dir = temp.path().join("cache");

        let cli = parse(&[
            input.to_str().unwrap(),
            output.to_str().unwrap(),
            "-e",
            "threshold",
            "--cache-dir",
            cache_dir.to_str().unwrap(),
        ]);
        run(cli).await.unwrap();

        let written = image::open(&output).unwrap();
        assert_eq!((written.width(), written.height()), (32, 16));
    }

    #[tokio::test]
    async fn test_run_missing_input_fails() {
        let temp = TempDir::new().unwrap();
        let output = temp.path().join("out.png");
        let cache_dir = temp.path().join("cache");
        let cli = parse(&[
            temp.path().join("missing.jpeg").to_str().unwrap(),
            output.to_str().unwrap(),
            "-e",
            "threshold",
            "--cache-dir",
            cache_dir.to_str().unwrap(),
        ]);

        let err = run(cli).await.unwrap_err();
        assert!(format!("{err:#}").contains("missing.jpeg"));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_missing_input_reported_before_model_lookup() {
        let temp = TempDir::new().unwrap();
        let output = temp.path().join("out.png");
        let cache_dir = temp.path().join("empty-cache");
        let cli = parse(&[
            temp.path().join("missing.jpeg").to_str().unwrap(),
            output.to_str().unwrap(),
            "-e",
            "onnx:cpu",
            "--model",
            "acme--not-cached",
            "--cache-dir",
            cache_dir.to_str().unwrap(),
        ]);

        let err = run(cli).await.unwrap_err();
        let cause = err.downcast_ref::<BgRemovalError>().unwrap();
        assert!(cause.is_not_found());
        assert!(!format!("{err:#}").contains("not found in cache"));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_ensure_model_resolves_cached_models() {
        let temp = TempDir::new().unwrap();
        let cache = ModelCache::with_custom_cache_dir(temp.path()).unwrap();
        write_fake_model(cache.get_current_cache_dir(), "acme--shirts", &["fp32"]);

        let spec = ensure_model_available(&ModelSpec::default(), &cache).await.unwrap();
        assert_eq!(
            spec.source,
            ModelSource::External(cache.get_model_path("acme--shirts"))
        );

        let named = ModelSpec {
            source: ModelSource::Downloaded("acme--shirts".to_string()),
            variant: Some("fp32".to_string()),
        };
        let spec = ensure_model_available(&named, &cache).await.unwrap();
        assert_eq!(spec.variant.as_deref(), Some("fp32"));

        let unknown = ModelSpec {
            source: ModelSource::Downloaded("acme--trousers".to_string()),
            variant: None,
        };
        assert!(ensure_model_available(&unknown, &cache).await.is_err());
    }

    #[test]
    fn test_clear_cache_specific_and_all() {
        let temp = TempDir::new().unwrap();
        let cache = ModelCache::with_custom_cache_dir(temp.path()).unwrap();
        write_fake_model(cache.get_current_cache_dir(), "a--one", &["fp16"]);
        write_fake_model(cache.get_current_cache_dir(), "b--two", &["fp16"]);

        clear_cache_models(&parse(&["--clear-cache", "--model", "a--one"]), &cache).unwrap();
        assert!(!cache.is_model_cached("a--one"));
        assert!(cache.is_model_cached("b--two"));

        clear_cache_models(&parse(&["--clear-cache"]), &cache).unwrap();
        assert!(cache.scan_cached_models().unwrap().is_empty());
    }
}
