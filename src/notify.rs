//! Notification Bridge: turn envelope metadata and dispatch errors into
//! user-facing notifications without touching control flow.
//!
//! The bridge wraps the dispatcher's metadata mode. On success it shows the
//! server-authored `message` (if any); on failure it shows the
//! [`DispatchError`] message and then returns the same error to the caller.
//! Rendering is delegated to a [`Notifier`]: the CLI and library default is
//! [`TracingNotifier`], a UI host plugs in its own toast sink.

use crate::client::{Annotated, ApiClient, RequestOptions};
use crate::envelope::ToastVariant;
use crate::error::DispatchError;
use serde::de::DeserializeOwned;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Default success title.
pub const SUCCESS_TITLE: &str = "Success";

/// Default error title.
pub const ERROR_TITLE: &str = "Error";

/// A user-facing toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub variant: ToastVariant,
}

impl Notification {
    pub fn new(title: impl Into<String>, description: impl Into<String>, variant: ToastVariant) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            variant,
        }
    }
}

/// Sink for notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification);
}

/// Renders notifications as tracing events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, n: &Notification) {
        match n.variant {
            ToastVariant::Destructive => warn!(title = %n.title, "{}", n.description),
            _ => info!(title = %n.title, variant = %n.variant, "{}", n.description),
        }
    }
}

/// Keeps every notification in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything notified so far.
    pub fn snapshot(&self) -> Vec<Notification> {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Drain everything notified so far.
    pub fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.seen.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, notification: &Notification) {
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(notification.clone());
    }
}

/// Per-call notification switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToastOptions {
    pub show_success: bool,
    pub show_error: bool,
    pub success_title: String,
    pub error_title: String,
}

impl Default for ToastOptions {
    fn default() -> Self {
        Self {
            show_success: true,
            show_error: true,
            success_title: SUCCESS_TITLE.to_string(),
            error_title: ERROR_TITLE.to_string(),
        }
    }
}

impl ToastOptions {
    /// Errors only.
    pub fn errors_only() -> Self {
        Self {
            show_success: false,
            ..Self::default()
        }
    }

    pub fn success_title(mut self, title: impl Into<String>) -> Self {
        self.success_title = title.into();
        self
    }

    pub fn error_title(mut self, title: impl Into<String>) -> Self {
        self.error_title = title.into();
        self
    }
}

/// Dispatcher wrapper that notifies alongside every call.
#[derive(Clone)]
pub struct NotificationBridge {
    client: ApiClient,
    notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for NotificationBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationBridge")
            .field("client", &self.client)
            .field("notifier", &"<dyn Notifier>")
            .finish()
    }
}

impl NotificationBridge {
    /// Bridge using the client's configured notifier, or [`TracingNotifier`].
    pub fn new(client: ApiClient) -> Self {
        let notifier = client
            .config()
            .notifier
            .clone()
            .unwrap_or_else(|| Arc::new(TracingNotifier));
        Self { client, notifier }
    }

    pub fn with_notifier(client: ApiClient, notifier: Arc<dyn Notifier>) -> Self {
        Self { client, notifier }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Dispatch in metadata mode, notify, and hand back the payload or error.
    pub async fn call<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
        toast: &ToastOptions,
    ) -> Result<T, DispatchError> {
        let result = self.client.request_with_metadata::<T>(endpoint, options).await;
        self.announce(result, toast)
    }

    /// Notify for a result that was already dispatched.
    ///
    /// The result passes through unchanged apart from dropping the metadata.
    pub fn announce<T>(
        &self,
        result: Result<Annotated<T>, DispatchError>,
        toast: &ToastOptions,
    ) -> Result<T, DispatchError> {
        match result {
            Ok(annotated) => {
                if toast.show_success && !annotated.message.is_empty() {
                    self.notifier.notify(&Notification::new(
                        toast.success_title.clone(),
                        annotated.message,
                        annotated.toast_variant,
                    ));
                }
                Ok(annotated.data)
            }
            Err(e) => {
                if toast.show_error {
                    self.notifier.notify(&Notification::new(
                        toast.error_title.clone(),
                        e.message.clone(),
                        e.toast_variant,
                    ));
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;

    fn bridge() -> (NotificationBridge, Arc<MemoryNotifier>) {
        let config = ClientConfig::builder()
            .base_url("http://127.0.0.1:9")
            .build()
            .unwrap();
        let sink = Arc::new(MemoryNotifier::new());
        let bridge = NotificationBridge::with_notifier(ApiClient::new(config).unwrap(), sink.clone());
        (bridge, sink)
    }

    fn annotated(message: &str, variant: ToastVariant) -> Annotated<u32> {
        Annotated {
            data: 7,
            message: message.into(),
            code: "SUCCESS".into(),
            toast_variant: variant,
        }
    }

    #[test]
    fn success_with_message_notifies() {
        let (bridge, sink) = bridge();
        let out = bridge.announce(Ok(annotated("Formatted JSON", ToastVariant::Success)), &ToastOptions::default());
        assert_eq!(out.unwrap(), 7);
        assert_eq!(
            sink.take(),
            vec![Notification::new("Success", "Formatted JSON", ToastVariant::Success)]
        );
    }

    #[test]
    fn success_without_message_is_silent() {
        let (bridge, sink) = bridge();
        bridge
            .announce(Ok(annotated("", ToastVariant::Success)), &ToastOptions::default())
            .unwrap();
        assert!(sink.snapshot().is_empty());
    }

    #[test]
    fn success_title_override_and_server_variant() {
        let (bridge, sink) = bridge();
        let opts = ToastOptions::default().success_title("Saved");
        bridge
            .announce(Ok(annotated("done", ToastVariant::Default)), &opts)
            .unwrap();
        let n = &sink.take()[0];
        assert_eq!(n.title, "Saved");
        assert_eq!(n.variant, ToastVariant::Default);
    }

    #[test]
    fn error_is_notified_then_returned() {
        let (bridge, sink) = bridge();
        let err = DispatchError::network();
        let out: Result<u32, _> = bridge.announce(Err(err.clone()), &ToastOptions::default());
        assert_eq!(out.unwrap_err(), err);
        assert_eq!(
            sink.take(),
            vec![Notification::new("Error", "Network error occurred", ToastVariant::Destructive)]
        );
    }

    #[test]
    fn switches_suppress_notifications() {
        let (bridge, sink) = bridge();
        let opts = ToastOptions {
            show_error: false,
            ..ToastOptions::errors_only()
        };
        bridge
            .announce(Ok(annotated("hidden", ToastVariant::Success)), &opts)
            .unwrap();
        let _ = bridge.announce::<u32>(Err(DispatchError::cancelled()), &opts);
        assert!(sink.snapshot().is_empty());
    }

    #[test]
    fn tracing_notifier_accepts_every_variant() {
        let n = TracingNotifier;
        for v in [ToastVariant::Success, ToastVariant::Destructive, ToastVariant::Default] {
            n.notify(&Notification::new("t", "d", v));
        }
    }
}
