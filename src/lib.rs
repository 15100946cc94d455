//! # toolhub-client
//!
//! Client-side communication layer for the ToolHub processing service.
//!
//! The backend does the heavy lifting (OCR, PDF rendering, format
//! conversion, palette extraction). This crate is everything between an
//! application and that backend: the response envelope, request dispatch,
//! file upload and download, and the streamed progress protocol used by
//! long-running batch conversions.
//!
//! ## Layers
//!
//! ```text
//!  application / CLI
//!   │
//!   ├─ services      typed wrappers per tool (tools, image-to-pdf, md-to-pdf, …)
//!   ├─ notify        Notification Bridge: envelope messages → toasts
//!   ├─ conversion    Orchestrator: Idle → Converting → Completed | Failed
//!   ├─ stream        `data: ` frame decoder → StreamEvent
//!   ├─ transfer      multipart upload, binary download
//!   ├─ client        Request Dispatcher (Content-Type, cancellation, timeouts)
//!   └─ envelope      {code, message, data, toast_variant} → payload | DispatchError
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use toolhub_client::{ApiClient, ClientConfig, ConversionOrchestrator, ConversionRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Base URL from TOOLHUB_API_URL, falling back to http://127.0.0.1:8000
//!     let client = ApiClient::new(ClientConfig::default())?;
//!
//!     let health = client.health().await?;
//!     eprintln!("backend: {}", health.status);
//!
//!     let request = ConversionRequest::new(vec!["/scans/page1.jpg".into()], "/scans/pdf");
//!     let state = ConversionOrchestrator::new(client).run(&request, None).await;
//!     println!("{}: {} converted", state.phase, state.results.successful);
//!     Ok(())
//! }
//! ```
//!
//! ## Errors
//!
//! Every operation fails with the same [`DispatchError`]. Its `message` is the
//! server's own wording whenever the server provided one; transport failures
//! read `"Network error occurred"` and never leak the underlying error text.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `toolhub` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! toolhub-client = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod cancel;
pub mod client;
pub mod config;
pub mod conversion;
pub mod envelope;
pub mod error;
pub mod notify;
pub mod progress;
pub mod services;
pub mod stream;
pub mod transfer;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use cancel::CancelToken;
pub use client::{Annotated, ApiClient, Dispatched, RequestBody, RequestOptions};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use conversion::{
    ConversionOrchestrator, ConversionRequest, ConversionState, FileItem, Phase, Progress, Results,
};
pub use envelope::{Envelope, ToastVariant};
pub use error::{ConfigError, DispatchError, ErrorKind};
pub use notify::{
    MemoryNotifier, Notification, NotificationBridge, Notifier, ToastOptions, TracingNotifier,
};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{EventStream, FileStatus, FrameDecoder, StreamEvent};
pub use transfer::Downloaded;
