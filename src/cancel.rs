//! Cooperative cancellation for in-flight requests and streams.
//!
//! A [`CancelToken`] is cheap to clone; every clone observes the same flag.
//! Pass one into [`crate::client::RequestOptions::cancel`] or
//! [`crate::client::ApiClient::open_stream`] and call [`CancelToken::cancel`]
//! when the caller abandons the operation (a view is torn down, the user hits
//! Ctrl-C). The pending call resolves with
//! [`crate::error::ErrorKind::Cancelled`] instead of running to completion in
//! the background.

use std::sync::Arc;
use tokio::sync::watch;

/// Shared cancellation flag.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called on any clone.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so `wait_for` cannot observe a closed channel.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Await `cancel` if present, otherwise never resolve.
pub(crate) async fn cancelled_or_pending(cancel: Option<&CancelToken>) {
    match cancel {
        Some(token) => token.cancelled().await,
        None => std::future::pending::<()>().await,
    }
}
