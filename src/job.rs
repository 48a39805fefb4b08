//! File-to-file background removal job
//!
//! Decode the input, remove the background, write the output, then print a
//! confirmation line. The job has no branches beyond error propagation:
//! any failure stops it before the confirmation is printed.

use crate::{
    config::RemovalConfig,
    error::Result,
    processor::BackgroundRemovalProcessor,
    types::ProcessingTimings,
};
use std::io::Write;
use std::path::PathBuf;
use tracing::{info, span, Level};

/// Input of the legacy job
pub const LEGACY_INPUT_PATH: &str = "temp_uncprocessed_imgs/clr15oo8j005c356d04xhef8b.jpeg";

/// Output of the legacy job
pub const LEGACY_OUTPUT_PATH: &str = "temp_processed_imgs/test.png";

/// Line printed after the output file has been written
pub const CONFIRMATION_MESSAGE: &str = "yay";

/// Where to read the image from and where to write the result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalJob {
    pub input: PathBuf,
    pub output: PathBuf,
}

impl RemovalJob {
    #[must_use]
    pub fn new<I: Into<PathBuf>, O: Into<PathBuf>>(input: I, output: O) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }

    /// The fixed locations, relative to the working directory
    #[must_use]
    pub fn legacy() -> Self {
        Self::new(LEGACY_INPUT_PATH, LEGACY_OUTPUT_PATH)
    }

    /// Job from optional command-line paths; each missing path falls back to
    /// its legacy location
    ///
    /// ```rust
    /// use closet_bgremove::RemovalJob;
    ///
    /// assert_eq!(RemovalJob::from_args(None, None), RemovalJob::legacy());
    ///
    /// let job = RemovalJob::from_args(Some("shirt.jpg".into()), None);
    /// assert_eq!(job.output, RemovalJob::legacy().output);
    /// ```
    #[must_use]
    pub fn from_args(input: Option<PathBuf>, output: Option<PathBuf>) -> Self {
        Self {
            input: input.unwrap_or_else(|| PathBuf::from(LEGACY_INPUT_PATH)),
            output: output.unwrap_or_else(|| PathBuf::from(LEGACY_OUTPUT_PATH)),
        }
    }
}

/// What a successful job produced
#[derive(Debug, Clone)]
pub struct RemovalReport {
    pub output_path: PathBuf,
    pub dimensions: (u32, u32),
    pub model_name: String,
    pub timings: ProcessingTimings,
}

/// Run the job and print the confirmation on stdout
///
/// # Errors
/// - Input missing or not decodable
/// - Background removal failure
/// - Output directory missing or not writable
pub fn remove_background(job: &RemovalJob, config: &RemovalConfig) -> Result<RemovalReport> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    remove_background_with_confirmation(job, config, &mut handle)
}

/// Run the job, writing the confirmation line to `out`
///
/// # Errors
/// - See [`remove_background`]
/// - Writing the confirmation fails
pub fn remove_background_with_confirmation<W: Write>(
    job: &RemovalJob,
    config: &RemovalConfig,
    out: &mut W,
) -> Result<RemovalReport> {
    let mut processor = BackgroundRemovalProcessor::new(config.clone())?;
    run_job(&mut processor, job, out)
}

/// Run the job on an existing processor
///
/// Lets callers attach progress reporting or reuse an initialized backend.
///
/// # Errors
/// - See [`remove_background_with_confirmation`]
pub fn run_job<W: Write>(
    processor: &mut BackgroundRemovalProcessor,
    job: &RemovalJob,
    out: &mut W,
) -> Result<RemovalReport> {
    let _span = span!(
        Level::INFO,
        "remove_background",
        input = %job.input.display(),
        output = %job.output.display()
    )
    .entered();

    let mut result = processor.process_file(&job.input)?;

    let format = processor.config().output_format;
    let quality = processor.config().quality_for_output();
    result.save(&job.output, format, quality)?;

    writeln!(out, "{CONFIRMATION_MESSAGE}")?;
    out.flush()?;

    info!(
        output = %job.output.display(),
        timings = %result.timing_summary(),
        "Background removed"
    );

    Ok(RemovalReport {
        output_path: job.output.clone(),
        dimensions: result.dimensions(),
        model_name: result.metadata.model_name.clone(),
        timings: result.metadata.timings,
    })
}
