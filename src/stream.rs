//! Stream Parser: progressive conversion events over a chunked response.
//!
//! A stream request is a single `POST` with a JSON body. The response body is a
//! sequence of newline-delimited lines; only lines starting with `data: ` carry
//! a payload, which is one JSON-encoded [`StreamEvent`]:
//!
//! ```text
//! data: {"type": "progress", "current": 0, "total": 2, "percent": 0}
//!
//! data: {"type": "file_complete", "file": "a.png", "status": "success", ...}
//!
//! data: {"type": "complete", "successful": 2, "failed": 0, "skipped": 0}
//! ```
//!
//! There is no in-band end marker. The stream ends after a terminal event
//! (`complete` / `error`) or when the transport closes.
//!
//! [`ApiClient::open_stream`] returns a pull-based [`EventStream`]: consume it
//! with `while let Some(ev) = stream.next().await`, drop it to abort the
//! transfer. [`ApiClient::stream`] keeps the callback shape on top of it.

use crate::cancel::{cancelled_or_pending, CancelToken};
use crate::client::{read_response, ApiClient, RequestBody, RequestOptions};
use crate::error::DispatchError;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::pin::Pin;
use tokio_stream::Stream;
use tracing::{debug, info, warn};

/// Prefix of a payload-carrying line.
pub const DATA_PREFIX: &[u8] = b"data: ";

/// Outcome of a single file in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    #[default]
    Success,
    Failed,
    Skipped,
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FileStatus::Success => "success",
            FileStatus::Failed => "failed",
            FileStatus::Skipped => "skipped",
        })
    }
}

/// One decoded frame of a progressive conversion.
///
/// Absent numeric fields decode as 0, an absent `status` as `success` and an
/// absent `message` as the empty string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Progress {
        #[serde(default)]
        current: usize,
        #[serde(default)]
        total: usize,
        #[serde(default)]
        percent: f64,
    },
    FileStart {
        #[serde(default)]
        file: String,
        #[serde(default)]
        index: usize,
        #[serde(default)]
        total: usize,
    },
    FileComplete {
        #[serde(default)]
        file: String,
        #[serde(default)]
        status: FileStatus,
        #[serde(default)]
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output_path: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output_file: Option<String>,
        #[serde(default)]
        current: usize,
        #[serde(default)]
        total: usize,
        #[serde(default)]
        percent: f64,
    },
    Combining {
        #[serde(default)]
        message: String,
    },
    Combined {
        #[serde(default)]
        file: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output_path: Option<String>,
        #[serde(default)]
        count: usize,
    },
    Complete {
        #[serde(default)]
        successful: usize,
        #[serde(default)]
        failed: usize,
        #[serde(default)]
        skipped: usize,
        #[serde(default)]
        total: usize,
    },
    /// In-band failure. The backend writes the text under `error`.
    Error {
        #[serde(default, alias = "error")]
        message: String,
    },
    /// Any `type` this client does not know. Never yielded by [`FrameDecoder`].
    #[serde(other)]
    Unknown,
}

impl StreamEvent {
    /// `complete` and `error` end the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Complete { .. } | StreamEvent::Error { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Progress { .. } => "progress",
            StreamEvent::FileStart { .. } => "file_start",
            StreamEvent::FileComplete { .. } => "file_complete",
            StreamEvent::Combining { .. } => "combining",
            StreamEvent::Combined { .. } => "combined",
            StreamEvent::Complete { .. } => "complete",
            StreamEvent::Error { .. } => "error",
            StreamEvent::Unknown => "unknown",
        }
    }
}

/// Decode one complete line (without its `\n`).
///
/// Returns `None` for lines without the `data: ` prefix, for payloads that are
/// not a valid event, and for unknown event types.
pub fn decode_line(line: &[u8]) -> Option<StreamEvent> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let payload = line.strip_prefix(DATA_PREFIX)?;

    let text = match std::str::from_utf8(payload) {
        Ok(t) => t,
        Err(e) => {
            debug!("Discarding non-UTF-8 frame: {}", e);
            return None;
        }
    };

    match serde_json::from_str::<StreamEvent>(text) {
        Ok(StreamEvent::Unknown) => {
            debug!("Discarding frame with unknown event type: {}", text);
            None
        }
        Ok(event) => Some(event),
        Err(e) => {
            debug!("Discarding undecodable frame ({}): {}", e, text);
            None
        }
    }
}

/// Incremental line splitter for the event protocol.
///
/// Bytes are buffered until a full line is available, so a JSON payload or a
/// multi-byte character split across transport chunks is reassembled before
/// decoding.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    /// Prefix of `buf` already searched for `\n`.
    scanned: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk; return the events of every line it completed.
    ///
    /// Only the newly arrived bytes are searched, so a long line delivered in
    /// many small chunks is scanned once.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.buf.extend_from_slice(chunk);
        let mut events = Vec::new();
        let mut start = 0;
        let mut from = self.scanned;
        while let Some(offset) = self.buf[from..].iter().position(|b| *b == b'\n') {
            let end = from + offset;
            events.extend(decode_line(&self.buf[start..end]));
            start = end + 1;
            from = start;
        }
        self.buf.drain(..start);
        self.scanned = self.buf.len();
        events
    }

    /// Decode the unterminated trailing line left at end-of-stream.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        self.scanned = 0;
        let rest = std::mem::take(&mut self.buf);
        if rest.is_empty() {
            return Vec::new();
        }
        decode_line(&rest).into_iter().collect()
    }

    /// Bytes held back waiting for a newline.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

/// A boxed stream of decoded events.
///
/// Yields `Ok` for each event, ends right after a terminal event, and yields
/// at most one `Err` (transport failure or cancellation) before ending.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, DispatchError>> + Send>>;

struct StreamState<S> {
    body: S,
    decoder: FrameDecoder,
    pending: VecDeque<StreamEvent>,
    cancel: Option<CancelToken>,
    exhausted: bool,
    done: bool,
}

enum Pulled<T> {
    Cancelled,
    Chunk(Option<T>),
}

/// Turn a raw byte stream into an [`EventStream`].
pub fn event_stream<S, B, E>(body: S, cancel: Option<CancelToken>) -> EventStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let state = StreamState {
        body: Box::pin(body),
        decoder: FrameDecoder::new(),
        pending: VecDeque::new(),
        cancel,
        exhausted: false,
        done: false,
    };

    Box::pin(stream::unfold(state, |mut st| async move {
        loop {
            if st.done {
                return None;
            }
            if let Some(event) = st.pending.pop_front() {
                if event.is_terminal() {
                    if !st.pending.is_empty() {
                        debug!("Dropping {} frame(s) after terminal event", st.pending.len());
                    }
                    st.pending.clear();
                    st.done = true;
                }
                return Some((Ok(event), st));
            }
            if st.exhausted {
                return None;
            }

            let pulled = tokio::select! {
                biased;
                _ = cancelled_or_pending(st.cancel.as_ref()) => Pulled::Cancelled,
                chunk = st.body.next() => Pulled::Chunk(chunk),
            };

            match pulled {
                Pulled::Cancelled => {
                    st.done = true;
                    return Some((Err(DispatchError::cancelled()), st));
                }
                Pulled::Chunk(Some(Ok(bytes))) => {
                    let events = st.decoder.push(bytes.as_ref());
                    st.pending.extend(events);
                }
                Pulled::Chunk(Some(Err(e))) => {
                    warn!("Event stream read failed: {}", e);
                    st.done = true;
                    return Some((Err(DispatchError::network()), st));
                }
                Pulled::Chunk(None) => {
                    let events = st.decoder.finish();
                    st.pending.extend(events);
                    st.exhausted = true;
                }
            }
        }
    }))
}

impl ApiClient {
    /// Issue a stream request and return its events as a pull-based stream.
    ///
    /// A non-OK initial response is returned as `Err` without reading the
    /// event body; its error text goes through the envelope codec. The
    /// request timeout does not apply: batches may run for minutes.
    pub async fn open_stream<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
        cancel: Option<CancelToken>,
    ) -> Result<EventStream, DispatchError> {
        info!("Opening event stream: {}", endpoint);

        let mut options = RequestOptions::post().body(RequestBody::json(body)?);
        options.cancel = cancel.clone();

        let response = self.send(endpoint, options, None).await?;
        if !response.status().is_success() {
            let raw = read_response(response, cancel.as_ref()).await?;
            let err = raw.error().into_stream_error();
            warn!("Stream request rejected with HTTP {}: {}", raw.status, err.message);
            return Err(err);
        }

        Ok(event_stream(response.bytes_stream(), cancel))
    }

    /// Callback form of [`open_stream`](Self::open_stream).
    ///
    /// `on_event` sees every event in arrival order. On failure `on_error` is
    /// called once and the same error is returned.
    pub async fn stream<B, F, E>(
        &self,
        endpoint: &str,
        body: &B,
        mut on_event: F,
        mut on_error: E,
    ) -> Result<(), DispatchError>
    where
        B: Serialize + ?Sized,
        F: FnMut(StreamEvent),
        E: FnMut(&DispatchError),
    {
        let mut events = match self.open_stream(endpoint, body, None).await {
            Ok(s) => s,
            Err(e) => {
                on_error(&e);
                return Err(e);
            }
        };

        while let Some(item) = events.next().await {
            match item {
                Ok(event) => on_event(event),
                Err(e) => {
                    on_error(&e);
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn chunks(parts: &[&str]) -> impl Stream<Item = Result<Vec<u8>, String>> + Send {
        let owned: Vec<Result<Vec<u8>, String>> = parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect();
        stream::iter(owned)
    }

    async fn collect(s: EventStream) -> Vec<Result<StreamEvent, DispatchError>> {
        s.collect().await
    }

    #[test]
    fn decode_line_requires_prefix() {
        assert!(decode_line(b"event: progress").is_none());
        assert!(decode_line(b"").is_none());
        assert!(decode_line(b"data:{\"type\":\"combining\"}").is_none());
        assert_eq!(
            decode_line(b"data: {\"type\":\"combining\",\"message\":\"Combining 2 PDFs...\"}"),
            Some(StreamEvent::Combining {
                message: "Combining 2 PDFs...".into()
            })
        );
    }

    #[test]
    fn decode_line_strips_carriage_return() {
        let ev = decode_line(b"data: {\"type\":\"progress\",\"current\":1,\"total\":4,\"percent\":25}\r");
        assert_eq!(
            ev,
            Some(StreamEvent::Progress {
                current: 1,
                total: 4,
                percent: 25.0
            })
        );
    }

    #[test]
    fn error_frame_accepts_backend_key() {
        assert_eq!(
            decode_line(b"data: {\"type\":\"error\",\"error\":\"No supported files found\"}"),
            Some(StreamEvent::Error {
                message: "No supported files found".into()
            })
        );
        assert_eq!(
            decode_line(b"data: {\"type\":\"error\",\"message\":\"boom\"}"),
            Some(StreamEvent::Error {
                message: "boom".into()
            })
        );
    }

    #[test]
    fn defaults_fill_missing_fields() {
        let ev = decode_line(b"data: {\"type\":\"file_complete\",\"file\":\"x.png\"}").unwrap();
        match ev {
            StreamEvent::FileComplete {
                status,
                message,
                output_path,
                current,
                ..
            } => {
                assert_eq!(status, FileStatus::Success);
                assert_eq!(message, "");
                assert_eq!(output_path, None);
                assert_eq!(current, 0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_and_invalid_frames_are_discarded() {
        assert!(decode_line(b"data: {\"type\":\"heartbeat\"}").is_none());
        assert!(decode_line(b"data: {\"type\":\"progress\",").is_none());
        assert!(decode_line(b"data: not json").is_none());
        assert!(decode_line(b"data: {\"no_type\":1}").is_none());
    }

    #[test]
    fn decoder_reassembles_split_payloads() {
        let mut d = FrameDecoder::new();
        assert!(d.push(b"data: {\"type\":\"progr").is_empty());
        assert!(d.pending() > 0);
        let events = d.push(b"ess\",\"current\":1,\"total\":2,\"percent\":50}\n\ndata: {\"type\":\"comp");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), "progress");
        let events = d.push(b"lete\",\"successful\":1,\"failed\":0,\"skipped\":1}\n\n");
        assert_eq!(
            events,
            vec![StreamEvent::Complete {
                successful: 1,
                failed: 0,
                skipped: 1,
                total: 0
            }]
        );
        assert_eq!(d.pending(), 0);
    }

    #[test]
    fn decoder_reassembles_split_utf8() {
        let line = "data: {\"type\":\"file_start\",\"file\":\"café.png\",\"index\":1,\"total\":1}\n";
        let bytes = line.as_bytes();
        let split = line.find('é').unwrap() + 1; // inside the two-byte sequence
        let mut d = FrameDecoder::new();
        assert!(d.push(&bytes[..split]).is_empty());
        let events = d.push(&bytes[split..]);
        assert_eq!(
            events,
            vec![StreamEvent::FileStart {
                file: "café.png".into(),
                index: 1,
                total: 1
            }]
        );
    }

    #[test]
    fn decoder_scans_each_byte_once() {
        let line = format!(
            "data: {{\"type\":\"combining\",\"message\":\"{}\"}}\n",
            "x".repeat(4096)
        );
        let mut d = FrameDecoder::new();
        let mut events = Vec::new();
        for byte in line.as_bytes() {
            events.extend(d.push(std::slice::from_ref(byte)));
            // Nothing before the newline is ever searched twice.
            assert_eq!(d.scanned, d.buf.len());
        }
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), "combining");
        assert_eq!(d.pending(), 0);
        assert_eq!(d.scanned, 0);
    }

    #[test]
    fn decoder_splits_many_lines_in_one_chunk() {
        let mut d = FrameDecoder::new();
        let events = d.push(
            b"data: {\"type\":\"progress\",\"current\":0,\"total\":2,\"percent\":0}\n\
              \n\
              data: {\"type\":\"file_start\",\"file\":\"a\",\"index\":1,\"total\":2}\n\
              data: {\"type\":\"comb",
        );
        assert_eq!(events.len(), 2);
        assert_eq!(d.pending(), d.scanned);
        let events = d.push(b"ining\"}\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), "combining");
    }

    #[test]
    fn decoder_flushes_trailing_line() {
        let mut d = FrameDecoder::new();
        assert!(d.push(b"data: {\"type\":\"error\",\"error\":\"late\"}").is_empty());
        assert_eq!(d.finish().len(), 1);
        assert!(d.finish().is_empty());
    }

    #[test]
    fn terminal_kinds() {
        assert!(StreamEvent::Error { message: String::new() }.is_terminal());
        assert!(!StreamEvent::Combining { message: String::new() }.is_terminal());
    }

    #[tokio::test]
    async fn event_stream_stops_after_terminal_event() {
        let body = chunks(&[
            "data: {\"type\":\"progress\",\"current\":0,\"total\":1,\"percent\":0}\n\n",
            "data: {\"type\":\"complete\",\"successful\":1,\"failed\":0,\"skipped\":0}\n\n\
             data: {\"type\":\"progress\",\"current\":9,\"total\":9,\"percent\":100}\n\n",
        ]);
        let items = collect(event_stream(body, None)).await;
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(Result::is_ok));
        assert!(items[1].as_ref().unwrap().is_terminal());
    }

    #[tokio::test]
    async fn event_stream_ends_on_close_without_terminal() {
        let body = chunks(&["data: {\"type\":\"file_start\",\"file\":\"a\",\"index\":1,\"total\":2}\n"]);
        let items = collect(event_stream(body, None)).await;
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn event_stream_surfaces_read_error_once() {
        let body = stream::iter(vec![
            Ok(b"data: {\"type\":\"combining\",\"message\":\"m\"}\n".to_vec()),
            Err("connection reset".to_string()),
            Ok(b"data: {\"type\":\"combining\",\"message\":\"never\"}\n".to_vec()),
        ]);
        let items = collect(event_stream(body, None)).await;
        assert_eq!(items.len(), 2);
        let err = items[1].as_ref().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Network);
        assert_eq!(err.message, "Network error occurred");
    }

    #[tokio::test]
    async fn event_stream_honours_cancellation() {
        let token = CancelToken::new();
        token.cancel();
        let body = chunks(&["data: {\"type\":\"combining\",\"message\":\"m\"}\n"]);
        let items = collect(event_stream(body, Some(token))).await;
        assert_eq!(items.len(), 1);
        assert!(items[0].as_ref().unwrap_err().is_cancelled());
    }
}
