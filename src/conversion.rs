//! Conversion Orchestrator: fold a batch conversion's event stream into state.
//!
//! ```text
//!          run()                 complete
//!  Idle ───────────▶ Converting ─────────▶ Completed
//!                        │
//!                        │ error event / transport failure / early close
//!                        ▼
//!                      Failed
//! ```
//!
//! [`ConversionState`] is a plain value: [`ConversionState::begin`] resets it
//! and [`ConversionState::apply`] folds one [`StreamEvent`] into it. Once a
//! terminal state is reached further events are ignored. The
//! [`ConversionOrchestrator`] drives that machine from a live stream and
//! raises notifications and progress callbacks as it goes. Each call to
//! [`ConversionOrchestrator::run`] owns a fresh state, so independent batches
//! never share one.

use crate::cancel::CancelToken;
use crate::client::ApiClient;
use crate::envelope::ToastVariant;
use crate::error::DispatchError;
use crate::notify::{Notification, Notifier, TracingNotifier, ERROR_TITLE};
use crate::progress::{NoopProgressCallback, ProgressCallback};
use crate::stream::{FileStatus, StreamEvent};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default stream endpoint for batch image-to-PDF conversion.
pub const CONVERT_ENDPOINT: &str = "/api/tools/image-to-pdf/convert";

/// Prefix of the notification raised for transport-level failures.
pub const CONVERSION_FAILED_PREFIX: &str = "Conversion failed: ";

/// Title of the notification raised on `complete`.
pub const COMPLETE_TITLE: &str = "Conversion complete";

/// Message recorded when the transport closes before a terminal event.
pub const ENDED_EARLY_MESSAGE: &str = "Stream ended before completion";

/// JSON body of a conversion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRequest {
    pub input_files: Vec<String>,
    /// Directory to scan instead of, or in addition to, `input_files`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_path: Option<String>,
    pub output_path: String,
    pub skip_existing: bool,
    pub combine_pdfs: bool,
}

impl ConversionRequest {
    pub fn new(input_files: Vec<String>, output_path: impl Into<String>) -> Self {
        Self {
            input_files,
            input_path: None,
            output_path: output_path.into(),
            skip_existing: true,
            combine_pdfs: false,
        }
    }

    pub fn input_path(mut self, dir: impl Into<String>) -> Self {
        self.input_path = Some(dir.into());
        self
    }

    pub fn skip_existing(mut self, skip: bool) -> Self {
        self.skip_existing = skip;
        self
    }

    pub fn combine_pdfs(mut self, combine: bool) -> Self {
        self.combine_pdfs = combine;
        self
    }
}

/// Lifecycle phase of one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Idle,
    Converting,
    Completed,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Idle => "idle",
            Phase::Converting => "converting",
            Phase::Completed => "completed",
            Phase::Failed => "failed",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
    pub percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Results {
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// One `file_complete` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileItem {
    pub name: String,
    pub status: FileStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
}

/// What [`ConversionState::apply`] did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The state was not `Converting`, or the event carries no state.
    Ignored,
    Progressed,
    FileStarted,
    FileAppended,
    Completed,
    Failed,
}

/// Progress, results and file list of one batch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConversionState {
    pub phase: Phase,
    pub progress: Progress,
    /// Zero until `complete` arrives.
    pub results: Results,
    /// Arrival order; never reordered or deduplicated.
    pub file_list: Vec<FileItem>,
    /// Failure text once `phase` is `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConversionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_converting(&self) -> bool {
        self.phase == Phase::Converting
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, Phase::Completed | Phase::Failed)
    }

    /// Enter `Converting` with zeroed progress, results and file list.
    pub fn begin(&mut self) {
        *self = Self {
            phase: Phase::Converting,
            ..Self::default()
        };
    }

    /// Fold one event into the state.
    pub fn apply(&mut self, event: &StreamEvent) -> Applied {
        if !self.is_converting() {
            debug!("Ignoring '{}' event in phase {}", event.kind(), self.phase);
            return Applied::Ignored;
        }

        match event {
            StreamEvent::Progress {
                current,
                total,
                percent,
            } => {
                self.set_progress(*current, *total, *percent);
                Applied::Progressed
            }
            StreamEvent::FileStart { .. } => Applied::FileStarted,
            StreamEvent::FileComplete {
                file,
                status,
                message,
                output_path,
                ..
            } => {
                // Only `progress` frames move `progress`; the counters here stay event data.
                self.file_list.push(FileItem {
                    name: file.clone(),
                    status: *status,
                    message: message.clone(),
                    output_path: output_path.clone(),
                });
                Applied::FileAppended
            }
            StreamEvent::Complete {
                successful,
                failed,
                skipped,
                ..
            } => {
                self.results = Results {
                    successful: *successful,
                    failed: *failed,
                    skipped: *skipped,
                };
                self.phase = Phase::Completed;
                Applied::Completed
            }
            StreamEvent::Error { message } => {
                self.fail(if message.is_empty() {
                    "Conversion failed".to_string()
                } else {
                    message.clone()
                });
                Applied::Failed
            }
            StreamEvent::Combining { .. } | StreamEvent::Combined { .. } | StreamEvent::Unknown => {
                Applied::Ignored
            }
        }
    }

    /// Move to `Failed` unless already terminal.
    pub fn fail(&mut self, message: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        self.phase = Phase::Failed;
        self.error = Some(message.into());
    }

    fn set_progress(&mut self, current: usize, total: usize, percent: f64) {
        if current < self.progress.current {
            warn!(
                "Progress went backwards ({} -> {}); taking the newer value",
                self.progress.current, current
            );
        }
        self.progress = Progress {
            current,
            total,
            percent,
        };
    }
}

/// Drives batch conversions over the event stream.
#[derive(Clone)]
pub struct ConversionOrchestrator {
    client: ApiClient,
    endpoint: String,
    notifier: Arc<dyn Notifier>,
    progress: ProgressCallback,
}

impl fmt::Debug for ConversionOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionOrchestrator")
            .field("endpoint", &self.endpoint)
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

impl ConversionOrchestrator {
    /// Orchestrator using the client's configured notifier and progress callback.
    pub fn new(client: ApiClient) -> Self {
        let config = client.config();
        let notifier = config
            .notifier
            .clone()
            .unwrap_or_else(|| Arc::new(TracingNotifier));
        let progress = config
            .progress_callback
            .clone()
            .unwrap_or_else(|| Arc::new(NoopProgressCallback));
        Self {
            client,
            endpoint: CONVERT_ENDPOINT.to_string(),
            notifier,
            progress,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.progress = cb;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Run one batch to a terminal state.
    ///
    /// Never returns `Err`: every failure ends in [`Phase::Failed`] with
    /// `error` set, after the matching notification.
    pub async fn run(&self, request: &ConversionRequest, cancel: Option<CancelToken>) -> ConversionState {
        let mut state = ConversionState::new();
        state.begin();
        info!(
            "Starting conversion of {} file(s) into {}",
            request.input_files.len(),
            request.output_path
        );
        self.progress.on_conversion_start(request.input_files.len());

        let mut events = match self.client.open_stream(&self.endpoint, request, cancel).await {
            Ok(s) => s,
            Err(e) => {
                self.transport_failure(&mut state, &e);
                return state;
            }
        };

        while let Some(item) = events.next().await {
            match item {
                Ok(event) => {
                    self.on_event(&mut state, &event);
                    if state.is_terminal() {
                        break;
                    }
                }
                Err(e) => {
                    self.transport_failure(&mut state, &e);
                    break;
                }
            }
        }

        if state.is_converting() {
            warn!("Conversion stream closed without a terminal event");
            let message = format!("{CONVERSION_FAILED_PREFIX}{ENDED_EARLY_MESSAGE}");
            state.fail(message.clone());
            self.notify_failure(&message);
        }

        info!(
            "Conversion {}: {} ok, {} failed, {} skipped, {} file event(s)",
            state.phase,
            state.results.successful,
            state.results.failed,
            state.results.skipped,
            state.file_list.len()
        );
        state
    }

    fn on_event(&self, state: &mut ConversionState, event: &StreamEvent) {
        match (state.apply(event), event) {
            (Applied::Progressed, _) => self.progress.on_progress(&state.progress),
            (Applied::FileStarted, StreamEvent::FileStart { file, index, total }) => {
                debug!("Converting {} ({}/{})", file, index, total);
                self.progress.on_file_start(file, *index, *total);
            }
            (Applied::FileAppended, _) => {
                if let Some(item) = state.file_list.last() {
                    self.progress.on_file_complete(item);
                }
            }
            (Applied::Completed, _) => {
                self.notifier.notify(&Notification::new(
                    COMPLETE_TITLE,
                    format!("Successfully converted {} file(s)", state.results.successful),
                    ToastVariant::Success,
                ));
                self.progress.on_conversion_complete(&state.results);
            }
            (Applied::Failed, _) => {
                let message = state.error.clone().unwrap_or_default();
                self.notify_failure(&message);
            }
            (_, StreamEvent::Combining { message }) => info!("{}", message),
            (_, StreamEvent::Combined { file, count, .. }) => {
                info!("Combined {} PDF(s) into {}", count, file)
            }
            _ => {}
        }
    }

    fn transport_failure(&self, state: &mut ConversionState, e: &DispatchError) {
        let message = format!("{CONVERSION_FAILED_PREFIX}{}", e.message);
        state.fail(message.clone());
        if e.is_cancelled() {
            info!("Conversion cancelled");
            self.progress.on_conversion_failed(&message);
            return;
        }
        self.notify_failure(&message);
    }

    fn notify_failure(&self, message: &str) {
        self.notifier.notify(&Notification::new(
            ERROR_TITLE,
            message,
            ToastVariant::Destructive,
        ));
        self.progress.on_conversion_failed(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(current: usize, total: usize, percent: f64) -> StreamEvent {
        StreamEvent::Progress {
            current,
            total,
            percent,
        }
    }

    fn file_complete(file: &str, status: FileStatus, message: &str) -> StreamEvent {
        StreamEvent::FileComplete {
            file: file.into(),
            status,
            message: message.into(),
            output_path: None,
            output_file: None,
            current: 0,
            total: 0,
            percent: 0.0,
        }
    }

    fn complete(successful: usize, failed: usize, skipped: usize) -> StreamEvent {
        StreamEvent::Complete {
            successful,
            failed,
            skipped,
            total: 0,
        }
    }

    #[test]
    fn request_defaults_and_body_shape() {
        let req = ConversionRequest::new(vec!["/in/a.png".into()], "/out");
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "input_files": ["/in/a.png"],
                "output_path": "/out",
                "skip_existing": true,
                "combine_pdfs": false
            })
        );
        let req = req.input_path("/in").combine_pdfs(true).skip_existing(false);
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(body["input_path"], "/in");
        assert_eq!(body["combine_pdfs"], true);
        assert_eq!(body["skip_existing"], false);
    }

    #[test]
    fn fold_ordered_batch() {
        let mut state = ConversionState::new();
        state.begin();
        let events = [
            progress(1, 2, 50.0),
            file_complete("x.png", FileStatus::Success, ""),
            file_complete("y.png", FileStatus::Failed, "corrupt"),
            complete(1, 1, 0),
        ];
        for e in &events {
            state.apply(e);
        }
        assert_eq!(state.progress.percent, 50.0);
        assert_eq!(state.file_list.len(), 2);
        assert_eq!(state.file_list[0].name, "x.png");
        assert_eq!(state.file_list[1].status, FileStatus::Failed);
        assert_eq!(state.file_list[1].message, "corrupt");
        assert_eq!(
            state.results,
            Results {
                successful: 1,
                failed: 1,
                skipped: 0
            }
        );
        assert!(!state.is_converting());
        assert_eq!(state.phase, Phase::Completed);
    }

    #[test]
    fn results_stay_zero_until_complete() {
        let mut state = ConversionState::new();
        state.begin();
        state.apply(&progress(1, 3, 33.0));
        state.apply(&file_complete("a", FileStatus::Skipped, "exists"));
        assert_eq!(state.results, Results::default());
    }

    #[test]
    fn duplicates_are_kept_in_order() {
        let mut state = ConversionState::new();
        state.begin();
        state.apply(&file_complete("a", FileStatus::Success, ""));
        state.apply(&file_complete("a", FileStatus::Failed, "again"));
        let names: Vec<_> = state.file_list.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["a", "a"]);
    }

    #[test]
    fn terminal_state_is_frozen() {
        let mut state = ConversionState::new();
        state.begin();
        assert_eq!(
            state.apply(&StreamEvent::Error {
                message: "No supported files found".into()
            }),
            Applied::Failed
        );
        assert_eq!(state.error.as_deref(), Some("No supported files found"));

        assert_eq!(state.apply(&file_complete("late", FileStatus::Success, "")), Applied::Ignored);
        assert_eq!(state.apply(&complete(3, 0, 0)), Applied::Ignored);
        state.fail("other");
        assert!(state.file_list.is_empty());
        assert_eq!(state.phase, Phase::Failed);
        assert_eq!(state.error.as_deref(), Some("No supported files found"));
    }

    #[test]
    fn begin_resets_after_failure() {
        let mut state = ConversionState::new();
        state.begin();
        state.apply(&file_complete("a", FileStatus::Success, ""));
        state.apply(&StreamEvent::Error { message: String::new() });
        assert_eq!(state.error.as_deref(), Some("Conversion failed"));

        state.begin();
        assert!(state.is_converting());
        assert!(state.file_list.is_empty());
        assert_eq!(state.results, Results::default());
        assert_eq!(state.progress, Progress::default());
        assert_eq!(state.error, None);
    }

    #[test]
    fn idle_state_ignores_events() {
        let mut state = ConversionState::new();
        assert_eq!(state.apply(&progress(1, 1, 100.0)), Applied::Ignored);
        assert_eq!(state.phase, Phase::Idle);
    }

    #[test]
    fn file_complete_counters_leave_progress_alone() {
        let mut state = ConversionState::new();
        state.begin();
        state.apply(&progress(0, 2, 0.0));
        state.apply(&StreamEvent::FileComplete {
            file: "a.png".into(),
            status: FileStatus::Success,
            message: "Converted".into(),
            output_path: Some("/out/a.pdf".into()),
            output_file: Some("a.pdf".into()),
            current: 1,
            total: 2,
            percent: 50.0,
        });
        assert_eq!(
            state.progress,
            Progress {
                current: 0,
                total: 2,
                percent: 0.0
            }
        );
        assert_eq!(state.file_list.len(), 1);
        assert_eq!(state.file_list[0].output_path.as_deref(), Some("/out/a.pdf"));
    }

    #[test]
    fn regression_overwrites() {
        let mut state = ConversionState::new();
        state.begin();
        state.apply(&progress(2, 4, 50.0));
        state.apply(&progress(1, 4, 25.0));
        assert_eq!(state.progress.current, 1);
    }

    #[test]
    fn informational_events_leave_state_alone() {
        let mut state = ConversionState::new();
        state.begin();
        let before = state.clone();
        state.apply(&StreamEvent::Combining {
            message: "Combining 2 PDFs...".into(),
        });
        state.apply(&StreamEvent::FileStart {
            file: "a".into(),
            index: 1,
            total: 1,
        });
        assert_eq!(state, before);
    }
}
