//! Services that keep file I/O, format handling and progress out of the
//! processing pipeline

pub mod format;
pub mod io;
pub mod progress;

pub use format::OutputFormatHandler;
pub use io::ImageIOService;
pub use progress::{
    ConsoleProgressReporter, ProcessingStage, ProgressReporter,
    ProgressTracker, ProgressUpdate, RecordingProgressReporter,
};
