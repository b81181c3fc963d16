//! Progress-callback trait for scan stage events.
//!
//! Inject an [`Arc<dyn ScanProgressCallback>`] via
//! [`crate::config::ScanConfigBuilder::progress_callback`] to hear about each
//! stage as it starts and finishes. The CLI uses this to drive its spinner;
//! a service could forward the events to a log or a websocket instead.
//!
//! # Example
//!
//! ```rust
//! use edgequake_cardscan::{ScanConfig, ScanProgressCallback, Stage};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl ScanProgressCallback for Printer {
//!     fn on_stage_start(&self, stage: Stage, image_count: usize) {
//!         eprintln!("{stage} ({image_count} image(s))…");
//!     }
//! }
//!
//! let config = ScanConfig::builder()
//!     .progress_callback(Arc::new(Printer))
//!     .build()
//!     .unwrap();
//! ```

use crate::output::ProcessingOutcome;
use std::fmt;
use std::sync::Arc;

/// One gateway round trip plus response parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validate,
    Extract,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Stage::Validate => "validate",
            Stage::Extract => "extract",
        })
    }
}

/// Called by the card processor as a request moves through its stages.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Implementations must be `Send + Sync`; independent
/// scans may share one callback.
pub trait ScanProgressCallback: Send + Sync {
    /// Called once before the first stage.
    fn on_scan_start(&self, image_count: usize, skip_validation: bool) {
        let _ = (image_count, skip_validation);
    }

    /// Called just before the gateway request for `stage` is sent.
    fn on_stage_start(&self, stage: Stage, image_count: usize) {
        let _ = (stage, image_count);
    }

    /// Called when `stage` produced a parsed record.
    fn on_stage_complete(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when `stage` failed and was downgraded.
    fn on_stage_error(&self, stage: Stage, error: &str) {
        let _ = (stage, error);
    }

    /// Called once with the final outcome.
    fn on_scan_complete(&self, outcome: &ProcessingOutcome) {
        let _ = outcome;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ScanProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ScanConfig`].
pub type ProgressCallback = Arc<dyn ScanProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{ExtractionResult, ProcessingOutcome};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl ScanProgressCallback for Recorder {
        fn on_stage_start(&self, stage: Stage, image_count: usize) {
            self.events
                .lock()
                .unwrap()
                .push(format!("start {stage} {image_count}"));
        }

        fn on_stage_error(&self, stage: Stage, error: &str) {
            self.events
                .lock()
                .unwrap()
                .push(format!("error {stage}: {error}"));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_scan_start(2, false);
        cb.on_stage_start(Stage::Validate, 1);
        cb.on_stage_complete(Stage::Validate);
        cb.on_stage_error(Stage::Extract, "boom");
        cb.on_scan_complete(&ProcessingOutcome::extracted(None, ExtractionResult::default()));
    }

    #[test]
    fn overridden_methods_receive_events() {
        let rec = Recorder::default();
        let cb: &dyn ScanProgressCallback = &rec;
        cb.on_stage_start(Stage::Extract, 2);
        cb.on_stage_complete(Stage::Extract);
        cb.on_stage_error(Stage::Validate, "timeout");
        assert_eq!(
            *rec.events.lock().unwrap(),
            vec!["start extract 2".to_string(), "error validate: timeout".to_string()]
        );
    }
}
