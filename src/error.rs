//! Error types for the toolhub-client library.
//!
//! Two distinct error types reflect two distinct failure surfaces:
//!
//! * [`DispatchError`]: the **single** failure shape handed to callers of the
//!   request, upload, download and stream operations. Network exceptions,
//!   malformed bodies, API-level envelopes and in-band stream failures are all
//!   normalised into it before they reach application code.
//!
//! * [`ConfigError`]: returned only by
//!   [`crate::config::ClientConfigBuilder::build`] when the client itself is
//!   misconfigured. It never crosses the wire boundary.

use crate::envelope::ToastVariant;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Message used for every transport-level failure.
///
/// The underlying exception text is logged, never shown.
pub const NETWORK_ERROR_MESSAGE: &str = "Network error occurred";

/// Message used when a [`crate::cancel::CancelToken`] fires mid-call.
pub const CANCELLED_MESSAGE: &str = "Request cancelled";

/// Which failure path produced a [`DispatchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// DNS, connection refused, timeout, broken body read.
    Network,
    /// The response arrived but its body was not JSON.
    MalformedBody,
    /// Well-formed envelope whose code or HTTP status signals failure.
    Api,
    /// The backend refused to open an event stream (non-OK initial response).
    Stream,
    /// The caller cancelled the operation.
    Cancelled,
    /// The request could not be built locally (bad URL, unserialisable body).
    InvalidRequest,
    /// Reading an upload source or writing a download target failed.
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Network => "network",
            ErrorKind::MalformedBody => "malformed-body",
            ErrorKind::Api => "api",
            ErrorKind::Stream => "stream",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::InvalidRequest => "invalid-request",
            ErrorKind::Io => "io",
        };
        f.write_str(s)
    }
}

/// The normalised error surfaced by every dispatch operation.
///
/// `message` is user-facing and, whenever the server authored one, is the
/// server's wording verbatim.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct DispatchError {
    pub kind: ErrorKind,
    /// User-facing message.
    pub message: String,
    /// Machine-readable code, e.g. `"VALIDATION_ERROR"`. Absent for network failures.
    pub code: Option<String>,
    /// HTTP status, absent when no response was received.
    pub status: Option<u16>,
    /// Styling hint for the notification layer.
    pub toast_variant: ToastVariant,
    /// Technical detail from the envelope's optional `error` field.
    pub detail: Option<String>,
}

impl DispatchError {
    /// Transport failure: the original error is deliberately dropped.
    pub fn network() -> Self {
        Self::bare(ErrorKind::Network, NETWORK_ERROR_MESSAGE)
    }

    pub fn cancelled() -> Self {
        Self::bare(ErrorKind::Cancelled, CANCELLED_MESSAGE)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::bare(ErrorKind::InvalidRequest, message)
    }

    /// Re-tag a decoded failure as a rejected stream request.
    ///
    /// Message, code, status and detail are kept as the codec produced them.
    pub fn into_stream_error(mut self) -> Self {
        self.kind = ErrorKind::Stream;
        self
    }

    /// Local file failure around a transfer.
    pub fn io(action: &str, path: &Path, source: &std::io::Error) -> Self {
        Self::bare(
            ErrorKind::Io,
            format!("Failed to {} '{}': {}", action, path.display(), source),
        )
    }

    fn bare(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
            status: None,
            toast_variant: ToastVariant::Destructive,
            detail: None,
        }
    }

    pub fn is_network(&self) -> bool {
        self.kind == ErrorKind::Network
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::Cancelled
    }
}

/// Client misconfiguration, reported by the config builder.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The base URL is not an absolute HTTP(S) origin.
    #[error("Invalid base URL '{url}': must start with http:// or https://")]
    InvalidBaseUrl { url: String },

    /// A timeout of zero seconds would fail every request.
    #[error("Invalid {field}: must be at least 1 second")]
    ZeroTimeout { field: &'static str },

    /// reqwest refused the client settings.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}
