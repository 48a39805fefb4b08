//! Progress reporting for single-image removals
//!
//! Frontends plug in a [`ProgressReporter`]; the processor drives it through
//! a [`ProgressTracker`].

use crate::types::ProcessingTimings;
use instant::Instant;
use std::sync::{Arc, Mutex};

/// Stages of one background removal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Initializing backend and loading model
    Initialization,
    /// Loading and decoding input image
    ImageLoading,
    /// Letterboxing and tensor conversion
    Preprocessing,
    /// Running backend inference
    Inference,
    /// Mapping the output tensor back to a mask
    MaskGeneration,
    /// Applying mask as alpha
    BackgroundRemoval,
    /// Converting to output format
    FormatConversion,
    /// Writing result to file
    FileSaving,
    Completed,
}

impl ProcessingStage {
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            ProcessingStage::Initialization => "Initializing model and backend",
            ProcessingStage::ImageLoading => "Loading input image",
            ProcessingStage::Preprocessing => "Preprocessing image",
            ProcessingStage::Inference => "Running segmentation",
            ProcessingStage::MaskGeneration => "Generating segmentation mask",
            ProcessingStage::BackgroundRemoval => "Removing background",
            ProcessingStage::FormatConversion => "Converting output format",
            ProcessingStage::FileSaving => "Saving result",
            ProcessingStage::Completed => "Processing completed",
        }
    }

    /// Typical progress percentage once this stage starts
    #[must_use]
    pub fn progress_percentage(self) -> u8 {
        match self {
            ProcessingStage::Initialization => 5,
            ProcessingStage::ImageLoading => 10,
            ProcessingStage::Preprocessing => 25,
            ProcessingStage::Inference => 70,
            ProcessingStage::MaskGeneration => 85,
            ProcessingStage::BackgroundRemoval => 95,
            ProcessingStage::FormatConversion => 98,
            ProcessingStage::FileSaving => 99,
            ProcessingStage::Completed => 100,
        }
    }
}

/// Progress update containing stage and timing information
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub stage: ProcessingStage,
    /// Progress percentage (0-100)
    pub progress: u8,
    pub description: String,
    /// Elapsed time since processing started (milliseconds)
    pub elapsed_ms: u64,
}

impl ProgressUpdate {
    #[must_use]
    pub fn new(stage: ProcessingStage, start_time: Instant) -> Self {
        Self {
            progress: stage.progress_percentage(),
            description: stage.description().to_string(),
            elapsed_ms: start_time.elapsed().as_millis() as u64,
            stage,
        }
    }
}

/// Receiver of progress events
pub trait ProgressReporter: Send + Sync {
    fn report_progress(&self, update: ProgressUpdate);

    fn report_completion(&self, timings: ProcessingTimings);

    fn report_error(&self, stage: ProcessingStage, error: &str);
}

/// Logs progress through the `log` facade
pub struct ConsoleProgressReporter {
    verbose: bool,
}

impl ConsoleProgressReporter {
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for ConsoleProgressReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        if self.verbose {
            log::info!(
                "[{}%] {} ({}ms elapsed)",
                update.progress,
                update.description,
                update.elapsed_ms
            );
        } else {
            log::debug!("[{}%] {}", update.progress, update.description);
        }
    }

    fn report_completion(&self, timings: ProcessingTimings) {
        log::info!("✅ Background removal completed in {}ms", timings.total_ms);

        if self.verbose {
            log::info!("  📊 Detailed timings:");
            log::info!("    • Image decode: {}ms", timings.image_decode_ms);
            log::info!("    • Preprocessing: {}ms", timings.preprocessing_ms);
            log::info!("    • Inference: {}ms", timings.inference_ms);
            log::info!("    • Postprocessing: {}ms", timings.postprocessing_ms);
        }
    }

    fn report_error(&self, stage: ProcessingStage, error: &str) {
        log::error!("❌ Error during {}: {}", stage.description(), error);
    }
}

/// Collects every event; handy for asserting on stage order
#[derive(Default, Clone)]
pub struct RecordingProgressReporter {
    stages: Arc<Mutex<Vec<ProcessingStage>>>,
    completions: Arc<Mutex<Vec<ProcessingTimings>>>,
    errors: Arc<Mutex<Vec<(ProcessingStage, String)>>>,
}

impl RecordingProgressReporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn stages(&self) -> Vec<ProcessingStage> {
        self.stages.lock().map(|s| s.clone()).unwrap_or_default()
    }

    #[must_use]
    pub fn completions(&self) -> usize {
        self.completions.lock().map(|c| c.len()).unwrap_or_default()
    }

    #[must_use]
    pub fn errors(&self) -> Vec<(ProcessingStage, String)> {
        self.errors.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl ProgressReporter for RecordingProgressReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        if let Ok(mut stages) = self.stages.lock() {
            stages.push(update.stage);
        }
    }

    fn report_completion(&self, timings: ProcessingTimings) {
        if let Ok(mut completions) = self.completions.lock() {
            completions.push(timings);
        }
    }

    fn report_error(&self, stage: ProcessingStage, error: &str) {
        if let Ok(mut errors) = self.errors.lock() {
            errors.push((stage, error.to_string()));
        }
    }
}

/// Tracks the current stage and elapsed time for one removal
pub struct ProgressTracker {
    reporter: Box<dyn ProgressReporter>,
    start_time: Instant,
    current_stage: Option<ProcessingStage>,
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("current_stage", &self.current_stage)
            .finish_non_exhaustive()
    }
}

impl ProgressTracker {
    #[must_use]
    pub fn new(reporter: Box<dyn ProgressReporter>) -> Self {
        Self {
            reporter,
            start_time: Instant::now(),
            current_stage: None,
        }
    }

    #[must_use]
    pub fn console(verbose: bool) -> Self {
        Self::new(Box::new(ConsoleProgressReporter::new(verbose)))
    }

    /// Restart the clock for a new removal
    pub fn restart(&mut self) {
        self.start_time = Instant::now();
        self.current_stage = None;
    }

    pub fn report_stage(&mut self, stage: ProcessingStage) {
        self.current_stage = Some(stage);
        self.reporter
            .report_progress(ProgressUpdate::new(stage, self.start_time));
    }

    pub fn report_completion(&self, timings: ProcessingTimings) {
        self.reporter.report_completion(timings);
    }

    /// Report an error against the current stage
    pub fn report_error(&self, error: &str) {
        let stage = self.current_stage.unwrap_or(ProcessingStage::Initialization);
        self.reporter.report_error(stage, error);
    }

    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    #[must_use]
    pub fn current_stage(&self) -> Option<ProcessingStage> {
        self.current_stage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_percentages_increase() {
        let stages = [
            ProcessingStage::Initialization,
            ProcessingStage::ImageLoading,
            ProcessingStage::Preprocessing,
            ProcessingStage::Inference,
            ProcessingStage::MaskGeneration,
            ProcessingStage::BackgroundRemoval,
            ProcessingStage::FormatConversion,
            ProcessingStage::FileSaving,
            ProcessingStage::Completed,
        ];
        for pair in stages.windows(2) {
            assert!(pair[0].progress_percentage() < pair[1].progress_percentage());
        }
        assert_eq!(ProcessingStage::Completed.progress_percentage(), 100);
    }

    #[test]
    fn test_tracker_records_stages_and_errors() {
        let recorder = RecordingProgressReporter::new();
        let mut tracker = ProgressTracker::new(Box::new(recorder.clone()));

        tracker.report_error("early");
        tracker.report_stage(ProcessingStage::Preprocessing);
        tracker.report_stage(ProcessingStage::Inference);
        tracker.report_error("backend failed");
        tracker.report_completion(ProcessingTimings::default());

        assert_eq!(
            recorder.stages(),
            vec![ProcessingStage::Preprocessing, ProcessingStage::Inference]
        );
        assert_eq!(tracker.current_stage(), Some(ProcessingStage::Inference));
        assert_eq!(
            recorder.errors(),
            vec![
                (ProcessingStage::Initialization, "early".to_string()),
                (ProcessingStage::Inference, "backend failed".to_string())
            ]
        );
        assert_eq!(recorder.completions(), 1);

        tracker.restart();
        assert_eq!(tracker.current_stage(), None);
    }
}
