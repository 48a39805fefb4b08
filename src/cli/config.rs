//! Conversion of command-line arguments into a `RemovalConfig`

use crate::cli::main_impl::{Cli, CliOutputFormat};
use crate::{
    config::{OutputFormat, RemovalConfig},
    job::RemovalJob,
    models::ModelSpec,
    utils::{ExecutionProviderManager, ModelSpecParser},
};
use anyhow::{Context, Result};

impl From<CliOutputFormat> for OutputFormat {
    fn from(format: CliOutputFormat) -> Self {
        match format {
            CliOutputFormat::Png => OutputFormat::Png,
            CliOutputFormat::Jpeg => OutputFormat::Jpeg,
            CliOutputFormat::Webp => OutputFormat::WebP,
            CliOutputFormat::Tiff => OutputFormat::Tiff,
            CliOutputFormat::Rgba8 => OutputFormat::Rgba8,
        }
    }
}

pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build the removal config for `job`
    ///
    /// Without `--format` the output format follows the output file extension.
    /// Without `--model` a model backend uses the first cached model.
    pub(crate) fn from_cli(cli: &Cli, job: &RemovalJob) -> Result<RemovalConfig> {
        let (backend_type, execution_provider) =
            ExecutionProviderManager::parse_provider_string(&cli.execution_provider)
                .context("Invalid execution provider format")?;

        let model_spec = cli
            .model
            .as_deref()
            .map(ModelSpecParser::parse)
            .unwrap_or_default();
        let model_spec = ModelSpec {
            variant: cli.variant.clone().or(model_spec.variant),
            source: model_spec.source,
        };

        let output_format = cli
            .format
            .map_or_else(|| OutputFormat::from_path(&job.output), OutputFormat::from);

        RemovalConfig::builder()
            .backend_type(backend_type)
            .execution_provider(execution_provider)
            .output_format(output_format)
            .jpeg_quality(cli.jpeg_quality)
            .webp_quality(cli.webp_quality)
            .debug(cli.verbose >= 2)
            .num_threads(cli.threads)
            .model_spec(model_spec)
            .build()
            .context("Invalid configuration")
    }

    /// Reject argument combinations before any work is done
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        ExecutionProviderManager::parse_provider_string(&cli.execution_provider)
            .context("Invalid execution provider format")?;

        if cli.jpeg_quality > 100 {
            anyhow::bail!("JPEG quality must be 0-100, got {}", cli.jpeg_quality);
        }
        if cli.webp_quality > 100 {
            anyhow::bail!("WebP quality must be 0-100, got {}", cli.webp_quality);
        }

        if let Some(model_arg) = &cli.model {
            let model_spec = ModelSpecParser::parse(model_arg);
            ModelSpecParser::validate(&model_spec).context("Invalid model specification")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::ExecutionProvider, models::ModelSource, processor::BackendType};
    use clap::Parser;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("remove-bg").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults_follow_output_extension() {
        let cli = parse(&[]);
        let job = RemovalJob::from_args(cli.input.clone(), cli.output.clone());
        let config = CliConfigBuilder::from_cli(&cli, &job).unwrap();

        assert_eq!(job, RemovalJob::legacy());
        assert_eq!(config.backend_type, BackendType::Onnx);
        assert_eq!(config.execution_provider, ExecutionProvider::Auto);
        assert_eq!(config.output_format, OutputFormat::Png);
        assert_eq!(config.model_spec, ModelSpec::default());

        let job = RemovalJob::new("in.png", "out.jpg");
        let config = CliConfigBuilder::from_cli(&cli, &job).unwrap();
        assert_eq!(config.output_format, OutputFormat::Jpeg);
    }

    #[test]
    fn test_explicit_options() {
        let cli = parse(&[
            "in.jpg",
            "out.bin",
            "--format",
            "webp",
            "-e",
            "threshold:inverted",
            "--model",
            "imgly--isnet-general-onnx:fp32",
            "--variant",
            "fp16",
            "--threads",
            "4",
            "-vv",
        ]);
        let job = RemovalJob::from_args(cli.input.clone(), cli.output.clone());
        let config = CliConfigBuilder::from_cli(&cli, &job).unwrap();

        assert_eq!(config.output_format, OutputFormat::WebP);
        assert_eq!(config.backend_type, BackendType::Threshold { inverted: true });
        assert_eq!(
            config.model_spec.source,
            ModelSource::Downloaded("imgly--isnet-general-onnx".to_string())
        );
        assert_eq!(config.model_spec.variant.as_deref(), Some("fp16"));
        assert_eq!((config.intra_threads, config.inter_threads), (4, 2));
        assert!(config.debug);
    }

    #[test]
    fn test_validation() {
        assert!(CliConfigBuilder::validate_cli(&parse(&[])).is_ok());
        assert!(CliConfigBuilder::validate_cli(&parse(&["-e", "invalid:provider"])).is_err());
        assert!(CliConfigBuilder::validate_cli(&parse(&["--jpeg-quality", "150"])).is_err());
        assert!(CliConfigBuilder::validate_cli(&parse(&["--model", "bad name!"])).is_err());
    }
}
