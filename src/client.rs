//! Request Dispatcher: one request/response exchange per call.
//!
//! [`ApiClient`] owns a pooled `reqwest::Client` and the [`ClientConfig`]. Each
//! call resolves the endpoint against the base URL, negotiates the
//! `Content-Type`, sends the request, and hands the response to the
//! [`crate::envelope`] codec. There are no retries and no caching; the only
//! side effect is the network call itself.
//!
//! ## Content-Type negotiation
//!
//! | Body | Header set by this layer |
//! |------|--------------------------|
//! | multipart form | none (the transport writes the boundary) |
//! | anything else | `application/json`, unless the caller set one |

use crate::cancel::{cancelled_or_pending, CancelToken};
use crate::config::ClientConfig;
use crate::envelope::{self, Decoded, Envelope, ToastVariant};
use crate::error::{ConfigError, DispatchError, ErrorKind};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::multipart::Form;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Outgoing request body.
#[derive(Debug, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Text(String),
    /// Multipart form; the transport sets `Content-Type` with the boundary.
    Form(Form),
}

impl RequestBody {
    /// Serialise `value` as a JSON body.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, DispatchError> {
        serde_json::to_value(value)
            .map(RequestBody::Json)
            .map_err(|e| DispatchError::invalid_request(format!("Request body is not serialisable: {e}")))
    }

    pub fn is_form(&self) -> bool {
        matches!(self, RequestBody::Form(_))
    }
}

/// Per-call options: method, body, extra headers, query, cancellation.
#[derive(Debug)]
pub struct RequestOptions {
    pub method: Method,
    pub body: RequestBody,
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    pub cancel: Option<CancelToken>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            body: RequestBody::Empty,
            headers: HeaderMap::new(),
            query: Vec::new(),
            cancel: None,
        }
    }
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post() -> Self {
        Self {
            method: Method::POST,
            ..Self::default()
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    /// Attach a JSON body built from an already-constructed value.
    pub fn json(self, value: Value) -> Self {
        self.body(RequestBody::Json(value))
    }

    pub fn form(self, form: Form) -> Self {
        self.body(RequestBody::Form(form))
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Envelope metadata echoed next to the payload in metadata mode.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotated<T> {
    pub data: T,
    pub message: String,
    pub code: String,
    pub toast_variant: ToastVariant,
}

/// Result of [`ApiClient::dispatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatched {
    /// The payload alone: metadata mode was off, or the envelope had no `data`.
    Bare(Value),
    /// Metadata mode on a response that carried `data`.
    Annotated(Annotated<Value>),
}

impl Dispatched {
    /// The payload, whichever shape was returned.
    pub fn into_payload(self) -> Value {
        match self {
            Dispatched::Bare(v) => v,
            Dispatched::Annotated(a) => a.data,
        }
    }
}

/// Status line and body of a fully-read response.
#[derive(Debug)]
pub(crate) struct RawResponse {
    pub status: u16,
    pub reason: String,
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Any 2xx status.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn decode(&self) -> Result<Decoded, DispatchError> {
        envelope::decode(self.status, &self.reason, &self.body)
    }

    /// Error for a response already known to be a failure.
    ///
    /// The body goes through the envelope codec for a server-authored
    /// message; a 2xx body that decodes cleanly still yields the status line.
    pub fn error(&self) -> DispatchError {
        match self.decode() {
            Err(e) => e,
            Ok(_) => envelope::failure(
                self.status,
                &self.reason,
                Envelope::fallback(self.status, &self.reason),
            ),
        }
    }
}

/// HTTP client for the processing service.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        let http = config.http_client()?;
        Ok(Self { http, config })
    }

    /// Client with the default configuration (`TOOLHUB_API_URL` or the default origin).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::new(ClientConfig::default())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Issue one request and decode its envelope.
    ///
    /// With `emit_metadata` off the payload is returned bare. With it on, a
    /// response carrying `data` is returned as [`Dispatched::Annotated`] so a
    /// notification layer can show the server-authored message.
    pub async fn dispatch(
        &self,
        endpoint: &str,
        options: RequestOptions,
        emit_metadata: bool,
    ) -> Result<Dispatched, DispatchError> {
        let raw = self
            .execute(endpoint, options, Some(self.config.request_timeout()))
            .await?;
        let decoded = raw.decode()?;

        if emit_metadata && decoded.has_data {
            return Ok(Dispatched::Annotated(Annotated {
                data: decoded.payload,
                message: decoded.message,
                code: decoded.code,
                toast_variant: decoded.toast_variant,
            }));
        }
        Ok(Dispatched::Bare(decoded.payload))
    }

    /// Issue a request and deserialise the payload into `T`.
    pub async fn request<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<T, DispatchError> {
        let payload = self.dispatch(endpoint, options, false).await?.into_payload();
        from_payload(payload)
    }

    /// Like [`request`](Self::request) but keeps the envelope metadata.
    ///
    /// When the envelope had no `data`, the whole envelope is the payload and
    /// the metadata is read from it directly.
    pub async fn request_with_metadata<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<Annotated<T>, DispatchError> {
        match self.dispatch(endpoint, options, true).await? {
            Dispatched::Annotated(a) => Ok(Annotated {
                data: from_payload(a.data)?,
                message: a.message,
                code: a.code,
                toast_variant: a.toast_variant,
            }),
            Dispatched::Bare(v) => {
                let text = |key: &str| v.get(key).and_then(Value::as_str).unwrap_or("").to_string();
                let message = text("message");
                let code = text("code");
                let toast_variant = v
                    .get("toast_variant")
                    .and_then(Value::as_str)
                    .map(ToastVariant::from_wire)
                    .unwrap_or(ToastVariant::Success);
                Ok(Annotated {
                    data: from_payload(v)?,
                    message,
                    code,
                    toast_variant,
                })
            }
        }
    }

    // ── Transport ────────────────────────────────────────────────────────

    /// Build and send a request; return the response once headers arrive.
    pub(crate) async fn send(
        &self,
        endpoint: &str,
        options: RequestOptions,
        timeout: Option<Duration>,
    ) -> Result<reqwest::Response, DispatchError> {
        let RequestOptions {
            method,
            body,
            mut headers,
            query,
            cancel,
        } = options;

        if cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Err(DispatchError::cancelled());
        }

        let url = self.config.resolve_url(endpoint);
        debug!("{} {}", method, url);

        negotiate_content_type(&body, &mut headers);

        let mut req = self.http.request(method, &url).headers(headers);
        if !query.is_empty() {
            req = req.query(&query);
        }
        if let Some(t) = timeout {
            req = req.timeout(t);
        }
        req = match body {
            RequestBody::Empty => req,
            RequestBody::Json(v) => req.body(
                serde_json::to_vec(&v)
                    .map_err(|e| DispatchError::invalid_request(format!("Request body is not serialisable: {e}")))?,
            ),
            RequestBody::Text(s) => req.body(s),
            RequestBody::Form(f) => req.multipart(f),
        };

        tokio::select! {
            biased;
            _ = cancelled_or_pending(cancel.as_ref()) => Err(DispatchError::cancelled()),
            res = req.send() => res.map_err(|e| transport_error(&url, e)),
        }
    }

    /// Send and read the whole body.
    pub(crate) async fn execute(
        &self,
        endpoint: &str,
        options: RequestOptions,
        timeout: Option<Duration>,
    ) -> Result<RawResponse, DispatchError> {
        let cancel = options.cancel.clone();
        let response = self.send(endpoint, options, timeout).await?;
        read_response(response, cancel.as_ref()).await
    }
}

/// Apply the Content-Type rule to the outgoing headers.
pub(crate) fn negotiate_content_type(body: &RequestBody, headers: &mut HeaderMap) {
    if body.is_form() {
        headers.remove(CONTENT_TYPE);
    } else if !headers.contains_key(CONTENT_TYPE) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }
}

/// Read status and body of a response, honouring cancellation.
pub(crate) async fn read_response(
    response: reqwest::Response,
    cancel: Option<&CancelToken>,
) -> Result<RawResponse, DispatchError> {
    let status = response.status();
    let header = |name: HeaderName| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let content_type = header(CONTENT_TYPE);
    let content_disposition = header(reqwest::header::CONTENT_DISPOSITION);
    let url = response.url().to_string();

    let body = tokio::select! {
        biased;
        _ = cancelled_or_pending(cancel) => return Err(DispatchError::cancelled()),
        res = response.bytes() => res.map_err(|e| transport_error(&url, e))?,
    };

    Ok(RawResponse {
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or("").to_string(),
        content_type,
        content_disposition,
        body: body.to_vec(),
    })
}

/// Normalise a reqwest failure. The raw text is logged, not surfaced.
pub(crate) fn transport_error(url: &str, e: reqwest::Error) -> DispatchError {
    if e.is_builder() {
        warn!("Could not build request for {}: {}", url, e);
        return DispatchError::invalid_request(format!("Invalid request URL: {url}"));
    }
    warn!("Request to {} failed: {}", url, e);
    DispatchError::network()
}

/// Deserialise a decoded payload into the caller's type.
pub(crate) fn from_payload<T: DeserializeOwned>(payload: Value) -> Result<T, DispatchError> {
    serde_json::from_value(payload).map_err(|e| {
        warn!("Response payload did not match the expected shape: {}", e);
        DispatchError {
            kind: ErrorKind::MalformedBody,
            message: "Unexpected response format".to_string(),
            code: None,
            status: None,
            toast_variant: ToastVariant::Destructive,
            detail: Some(e.to_string()),
        }
    })
}
