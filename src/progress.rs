//! Progress-callback trait for batch conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ClientConfigBuilder::progress_callback`] to observe the
//! [`crate::conversion::ConversionOrchestrator`] as it folds stream events into
//! its state. The orchestrator calls these hooks after each state change, in
//! event-arrival order, from the task that drives the stream.
//!
//! # Example
//!
//! ```rust
//! use toolhub_client::{ClientConfig, ConversionProgressCallback, FileItem};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     finished: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_file_complete(&self, item: &FileItem) {
//!         let done = self.finished.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{} finished ({} so far)", item.name, done);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { finished: AtomicUsize::new(0) });
//!
//! let config = ClientConfig::builder()
//!     .base_url("http://127.0.0.1:8000")
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::conversion::{FileItem, Progress, Results};
use std::sync::Arc;

/// Called by the conversion orchestrator as a batch advances.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once when the orchestrator enters `Converting`.
    ///
    /// # Arguments
    /// * `total_files`: number of input files in the request
    fn on_conversion_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called after a `progress` event overwrote the progress snapshot.
    fn on_progress(&self, progress: &Progress) {
        let _ = progress;
    }

    /// Called when the backend announces it is starting a file.
    ///
    /// # Arguments
    /// * `file` : file name as reported by the backend
    /// * `index`: 1-indexed position in the batch
    /// * `total`: batch size
    fn on_file_start(&self, file: &str, index: usize, total: usize) {
        let _ = (file, index, total);
    }

    /// Called after a `file_complete` event appended `item` to the file list.
    fn on_file_complete(&self, item: &FileItem) {
        let _ = item;
    }

    /// Called once on the `complete` terminal event.
    fn on_conversion_complete(&self, results: &Results) {
        let _ = results;
    }

    /// Called once when the batch ends in `Failed`.
    ///
    /// # Arguments
    /// * `message`: the user-facing failure text that was notified
    fn on_conversion_failed(&self, message: &str) {
        let _ = message;
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ClientConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::FileStatus;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        started_total: AtomicUsize,
        files: AtomicUsize,
        last_percent: AtomicUsize,
        failures: Mutex<Vec<String>>,
    }

    impl ConversionProgressCallback for TrackingCallback {
        fn on_conversion_start(&self, total_files: usize) {
            self.started_total.store(total_files, Ordering::SeqCst);
        }

        fn on_progress(&self, progress: &Progress) {
            self.last_percent
                .store(progress.percent as usize, Ordering::SeqCst);
        }

        fn on_file_complete(&self, _item: &FileItem) {
            self.files.fetch_add(1, Ordering::SeqCst);
        }

        fn on_conversion_failed(&self, message: &str) {
            self.failures.lock().unwrap().push(message.to_string());
        }
    }

    fn item(name: &str) -> FileItem {
        FileItem {
            name: name.to_string(),
            status: FileStatus::Success,
            message: String::new(),
            output_path: None,
        }
    }

    #[test]
    fn noop_accepts_every_hook() {
        let cb = NoopProgressCallback;
        cb.on_conversion_start(5);
        cb.on_progress(&Progress::default());
        cb.on_file_start("a.png", 1, 5);
        cb.on_file_complete(&item("a.png"));
        cb.on_conversion_complete(&Results::default());
        cb.on_conversion_failed("boom");
    }

    #[test]
    fn overridden_hooks_observe_the_batch() {
        let tracker = TrackingCallback::default();

        tracker.on_conversion_start(3);
        assert_eq!(tracker.started_total.load(Ordering::SeqCst), 3);

        tracker.on_progress(&Progress {
            current: 2,
            total: 3,
            percent: 66.0,
        });
        tracker.on_file_complete(&item("a.png"));
        tracker.on_file_complete(&item("b.png"));
        tracker.on_conversion_failed("Conversion failed: Network error occurred");

        assert_eq!(tracker.last_percent.load(Ordering::SeqCst), 66);
        assert_eq!(tracker.files.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.failures.lock().unwrap().len(), 1);
    }

    #[test]
    fn callback_works_behind_arc_alias() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_conversion_start(10);
        cb.on_file_start("x.jpg", 1, 10);
    }
}
