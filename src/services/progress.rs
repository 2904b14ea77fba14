//! Progress reporting service
//!
//! This module separates progress reporting concerns from the compositing
//! pipeline, allowing different frontends to implement their own progress
//! handling.

use crate::types::ProcessingTimings;
use instant::Instant;
use std::sync::Arc;

/// Progress stages of one overlay run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Checking the base image
    Validation,
    /// Decoding masks concurrently
    Decoding,
    /// Thresholding, styling and blending masks
    Compositing,
    /// Drawing numbered markers
    Annotating,
    /// Encoding the result image (reported by the caller after rendering)
    Encoding,
    /// Processing completed
    Completed,
}

impl ProcessingStage {
    /// Get a human-readable description of the processing stage
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            ProcessingStage::Validation => "Validating base image",
            ProcessingStage::Decoding => "Decoding masks",
            ProcessingStage::Compositing => "Compositing masks",
            ProcessingStage::Annotating => "Drawing markers",
            ProcessingStage::Encoding => "Encoding result",
            ProcessingStage::Completed => "Processing completed",
        }
    }

    /// Get the typical progress percentage for this stage
    #[must_use]
    pub fn progress_percentage(&self) -> u8 {
        match self {
            ProcessingStage::Validation => 5,
            ProcessingStage::Decoding => 30,
            ProcessingStage::Compositing => 70,
            ProcessingStage::Annotating => 90,
            ProcessingStage::Encoding => 98,
            ProcessingStage::Completed => 100,
        }
    }
}

/// Progress update containing stage and timing information
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Current processing stage
    pub stage: ProcessingStage,
    /// Progress percentage (0-100)
    pub progress: u8,
    /// Human-readable stage description
    pub description: String,
    /// Elapsed time since processing started (milliseconds)
    pub elapsed_ms: u64,
}

impl ProgressUpdate {
    /// Create a new progress update
    #[must_use]
    pub fn new(stage: ProcessingStage, start_time: Instant) -> Self {
        Self {
            stage,
            progress: stage.progress_percentage(),
            description: stage.description().to_string(),
            elapsed_ms: start_time.elapsed().as_millis() as u64,
        }
    }

    /// Create a progress update with a custom description
    #[must_use]
    pub fn with_description(stage: ProcessingStage, description: String, start_time: Instant) -> Self {
        Self {
            description,
            ..Self::new(stage, start_time)
        }
    }
}

/// Trait for reporting progress during overlay rendering
pub trait ProgressReporter: Send + Sync {
    /// Report a progress update
    fn report_progress(&self, update: ProgressUpdate);

    /// Report processing completion with final timings
    fn report_completion(&self, timings: &ProcessingTimings);

    /// Report an error during processing
    fn report_error(&self, stage: ProcessingStage, error: &str);
}

/// No-op progress reporter that discards all progress updates
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn report_progress(&self, _update: ProgressUpdate) {}

    fn report_completion(&self, _timings: &ProcessingTimings) {}

    fn report_error(&self, _stage: ProcessingStage, _error: &str) {}
}

/// Console progress reporter that logs progress
pub struct ConsoleProgressReporter {
    verbose: bool,
}

impl ConsoleProgressReporter {
    /// Create a new console progress reporter
    ///
    /// # Arguments
    /// * `verbose` - Whether to show detailed progress information
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
            log::info!("[{}%] {}", update.progress, update.description);
        }
    }

    fn report_completion(&self, timings: &ProcessingTimings) {
        log::info!("Overlay rendered in {}ms", timings.total_ms);

        if self.verbose {
            log::info!("  {}", timings.summary());
        }
    }

    fn report_error(&self, stage: ProcessingStage, error: &str) {
        log::error!("Error during {}: {}", stage.description(), error);
    }
}

/// Progress tracker that manages timing and progress reporting for one run
pub struct ProgressTracker {
    reporter: Arc<dyn ProgressReporter>,
    start_time: Instant,
    current_stage: Option<ProcessingStage>,
}

impl ProgressTracker {
    /// Create a new progress tracker with the specified reporter
    #[must_use]
    pub fn new(reporter: Arc<dyn ProgressReporter>) -> Self {
        Self {
            reporter,
            start_time: Instant::now(),
            current_stage: None,
        }
    }

    /// Report progress for a specific stage
    pub fn report_stage(&mut self, stage: ProcessingStage) {
        self.current_stage = Some(stage);
        self.reporter
            .report_progress(ProgressUpdate::new(stage, self.start_time));
    }

    /// Report progress with custom description
    pub fn report_stage_with_description(&mut self, stage: ProcessingStage, description: String) {
        self.current_stage = Some(stage);
        self.reporter.report_progress(ProgressUpdate::with_description(
            stage,
            description,
            self.start_time,
        ));
    }

    /// Report completion with final timings
    pub fn report_completion(&self, timings: &ProcessingTimings) {
        self.reporter.report_completion(timings);
    }

    /// Report an error at the current stage
    pub fn report_error(&self, error: &str) {
        let stage = self.current_stage.unwrap_or(ProcessingStage::Validation);
        self.reporter.report_error(stage, error);
    }

    /// Get the current processing stage
    #[must_use]
    pub fn current_stage(&self) -> Option<ProcessingStage> {
        self.current_stage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Test progress reporter that captures reports for verification
    #[derive(Default)]
    struct TestProgressReporter {
        progress_updates: Mutex<Vec<ProgressUpdate>>,
        completions: Mutex<Vec<ProcessingTimings>>,
        errors: Mutex<Vec<(ProcessingStage, String)>>,
    }

    impl ProgressReporter for TestProgressReporter {
        fn report_progress(&self, update: ProgressUpdate) {
            self.progress_updates.lock().unwrap().push(update);
        }

        fn report_completion(&self, timings: &ProcessingTimings) {
            self.completions.lock().unwrap().push(timings.clone());
        }

        fn report_error(&self, stage: ProcessingStage, error: &str) {
            self.errors.lock().unwrap().push((stage, error.to_string()));
        }
    }

    #[test]
    fn test_processing_stage_descriptions() {
        assert_eq!(ProcessingStage::Decoding.description(), "Decoding masks");
        assert_eq!(
            ProcessingStage::Completed.description(),
            "Processing completed"
        );
    }

    #[test]
    fn test_stage_percentages_increase() {
        let stages = [
            ProcessingStage::Validation,
            ProcessingStage::Decoding,
            ProcessingStage::Compositing,
            ProcessingStage::Annotating,
            ProcessingStage::Encoding,
            ProcessingStage::Completed,
        ];
        for pair in stages.windows(2) {
            assert!(pair[0].progress_percentage() < pair[1].progress_percentage());
        }
    }

    #[test]
    fn test_tracker_forwards_to_reporter() {
        let reporter = Arc::new(TestProgressReporter::default());
        let mut tracker = ProgressTracker::new(reporter.clone());

        tracker.report_stage(ProcessingStage::Decoding);
        tracker.report_stage_with_description(
            ProcessingStage::Compositing,
            "Compositing 3 masks".to_string(),
        );
        tracker.report_error("boom");
        tracker.report_completion(&ProcessingTimings::default());

        let updates = reporter.progress_updates.lock().unwrap();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[1].description, "Compositing 3 masks");
        assert_eq!(tracker.current_stage(), Some(ProcessingStage::Compositing));

        let errors = reporter.errors.lock().unwrap();
        assert_eq!(errors[0], (ProcessingStage::Compositing, "boom".to_string()));
        assert_eq!(reporter.completions.lock().unwrap().len(), 1);
    }
}
