//! Envelope Codec: turn a raw HTTP response into a payload or a [`DispatchError`].
//!
//! Every non-streaming endpoint answers with the same JSON wrapper:
//!
//! ```text
//! { "code": "...", "message": "...", "data"?: ..., "toast_variant"?: "..." }
//! ```
//!
//! or, for framework-native errors, the same object nested one level deeper
//! under `detail`. The codec never fails on a malformed body: anything that is
//! not JSON becomes a synthetic `{code: "ERROR", message: "HTTP <status>: <reason>"}`
//! envelope and flows through the normal failure path.
//!
//! Success requires **both** an HTTP status in {200, 201, 202} **and** a code
//! that does not contain the substring `"ERROR"`.

use crate::error::{DispatchError, ErrorKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::debug;

/// Code of the synthetic envelope built from an unparseable body.
pub const FALLBACK_ERROR_CODE: &str = "ERROR";

/// HTTP statuses that may carry a successful envelope.
pub const SUCCESS_STATUSES: [u16; 3] = [200, 201, 202];

/// Styling hint for a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastVariant {
    Success,
    Destructive,
    #[default]
    Default,
}

impl ToastVariant {
    /// Parse a wire value. Unknown hints fall back to [`ToastVariant::Default`].
    pub fn from_wire(s: &str) -> Self {
        match s {
            "success" => ToastVariant::Success,
            "destructive" => ToastVariant::Destructive,
            _ => ToastVariant::Default,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ToastVariant::Success => "success",
            ToastVariant::Destructive => "destructive",
            ToastVariant::Default => "default",
        }
    }
}

impl fmt::Display for ToastVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The effective envelope after fallback synthesis and `detail` unwrapping.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Status token; empty when the body carried none (unwrapped endpoints).
    pub code: String,
    /// Human-readable message; empty when absent.
    pub message: String,
    /// Payload, present only on success.
    pub data: Option<Value>,
    pub toast_variant: Option<ToastVariant>,
    /// The backend's optional technical `error` string.
    pub error: Option<String>,
    /// The effective envelope object as received, for passthrough endpoints.
    pub raw: Value,
}

impl Envelope {
    /// Synthesise the envelope used when the body is not JSON.
    pub fn fallback(status: u16, reason: &str) -> Self {
        let message = status_line(status, reason);
        Self {
            code: FALLBACK_ERROR_CODE.to_string(),
            raw: serde_json::json!({ "code": FALLBACK_ERROR_CODE, "message": message }),
            message,
            data: None,
            toast_variant: None,
            error: None,
        }
    }

    /// Build from an already-parsed JSON value, unwrapping `detail` if present.
    pub fn from_value(value: Value) -> Self {
        let effective = match value {
            Value::Object(mut map) if map.contains_key("detail") => {
                map.remove("detail").unwrap_or(Value::Null)
            }
            other => other,
        };

        match effective {
            Value::Object(map) => {
                let text = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);
                let code = text("code").unwrap_or_default();
                let message = text("message").unwrap_or_default();
                let toast_variant = text("toast_variant").map(|s| ToastVariant::from_wire(&s));
                let error = text("error");
                let data = map.get("data").filter(|d| !d.is_null()).cloned();
                Self {
                    code,
                    message,
                    data,
                    toast_variant,
                    error,
                    raw: Value::Object(map),
                }
            }
            // A framework-native `detail` string is the message itself.
            Value::String(s) => Self {
                code: FALLBACK_ERROR_CODE.to_string(),
                message: s,
                data: None,
                toast_variant: None,
                error: None,
                raw: Value::Null,
            },
            other => Self {
                code: String::new(),
                message: String::new(),
                data: None,
                toast_variant: None,
                error: None,
                raw: other,
            },
        }
    }

    /// Whether the code token signals failure.
    pub fn code_is_error(&self) -> bool {
        self.code.contains("ERROR")
    }
}

/// A successful decode: the payload plus the envelope metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    /// `envelope.data` if present, else the whole effective envelope.
    pub payload: Value,
    /// True when the envelope carried a non-null `data` field.
    pub has_data: bool,
    pub message: String,
    pub code: String,
    pub toast_variant: ToastVariant,
}

/// Apply the success rule to a parsed envelope.
pub fn resolve(status: u16, reason: &str, envelope: Envelope) -> Result<Decoded, DispatchError> {
    let status_ok = SUCCESS_STATUSES.contains(&status);
    if status_ok && !envelope.code_is_error() {
        let has_data = envelope.data.is_some();
        let toast_variant = envelope.toast_variant.unwrap_or(ToastVariant::Success);
        return Ok(Decoded {
            payload: envelope.data.unwrap_or(envelope.raw),
            has_data,
            message: envelope.message,
            code: envelope.code,
            toast_variant,
        });
    }

    Err(failure(status, reason, envelope))
}

/// Decode a response body in one step: parse, unwrap, apply the success rule.
///
/// A body that is not JSON is never an uncaught failure: it becomes the
/// status-line fallback envelope and is reported as [`ErrorKind::MalformedBody`].
pub fn decode(status: u16, reason: &str, body: &[u8]) -> Result<Decoded, DispatchError> {
    match serde_json::from_slice::<Value>(body) {
        Ok(value) => resolve(status, reason, Envelope::from_value(value)),
        Err(e) => {
            debug!("Response body is not JSON ({}); using status-line fallback", e);
            let mut err = failure(status, reason, Envelope::fallback(status, reason));
            err.kind = ErrorKind::MalformedBody;
            Err(err)
        }
    }
}

/// Build the error for a failed envelope.
pub fn failure(status: u16, reason: &str, envelope: Envelope) -> DispatchError {
    let message = if envelope.message.is_empty() {
        status_line(status, reason)
    } else {
        envelope.message
    };
    DispatchError {
        kind: ErrorKind::Api,
        message,
        code: Some(if envelope.code.is_empty() {
            FALLBACK_ERROR_CODE.to_string()
        } else {
            envelope.code
        }),
        status: Some(status),
        toast_variant: envelope.toast_variant.unwrap_or(ToastVariant::Destructive),
        detail: envelope.error,
    }
}

/// `"HTTP <status>: <reason>"`.
pub fn status_line(status: u16, reason: &str) -> String {
    format!("HTTP {}: {}", status, reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(v: Value) -> Vec<u8> {
        serde_json::to_vec(&v).unwrap()
    }

    #[test]
    fn success_returns_data_untouched() {
        let data = json!({ "valid": true, "format": "json", "nested": [1, 2, { "a": null }] });
        let d = decode(
            200,
            "OK",
            &body(json!({ "code": "VALIDATION_SUCCESS", "message": "JSON is valid", "data": data.clone() })),
        )
        .unwrap();
        assert_eq!(d.payload, data);
        assert!(d.has_data);
        assert_eq!(d.message, "JSON is valid");
        assert_eq!(d.toast_variant, ToastVariant::Success);
    }

    #[test]
    fn error_substring_fails_even_on_200() {
        for code in ["VALIDATION_ERROR", "ERRORS", "ERROR", "INTERNAL_ERROR_X"] {
            let e = decode(
                200,
                "OK",
                &body(json!({ "code": code, "message": "nope", "data": { "x": 1 } })),
            )
            .unwrap_err();
            assert_eq!(e.kind, ErrorKind::Api, "code {code}");
            assert_eq!(e.code.as_deref(), Some(code));
            assert_eq!(e.status, Some(200));
            assert_eq!(e.toast_variant, ToastVariant::Destructive);
        }
    }

    #[test]
    fn status_gate_is_independent_of_code() {
        let e = decode(404, "Not Found", &body(json!({ "code": "SUCCESS", "message": "fine" })))
            .unwrap_err();
        assert_eq!(e.status, Some(404));
        assert_eq!(e.message, "fine");

        let e = decode(204, "No Content", &body(json!({ "code": "SUCCESS", "message": "" })))
            .unwrap_err();
        assert_eq!(e.message, "HTTP 204: No Content");
    }

    #[test]
    fn accepted_and_created_are_success() {
        for status in [201, 202] {
            assert!(decode(status, "", &body(json!({ "code": "CREATED", "message": "m" }))).is_ok());
        }
    }

    #[test]
    fn detail_wrapper_is_transparent() {
        let flat = json!({ "code": "FILE_NOT_FOUND", "message": "File not found: a.md", "toast_variant": "destructive" });
        let wrapped = json!({ "detail": flat.clone() });
        let a = decode(404, "Not Found", &body(flat)).unwrap_err();
        let b = decode(404, "Not Found", &body(wrapped)).unwrap_err();
        assert_eq!(a, b);

        let ok_flat = json!({ "code": "SUCCESS", "message": "m", "data": [1] });
        let ok_wrapped = json!({ "detail": ok_flat.clone() });
        assert_eq!(
            decode(200, "OK", &body(ok_flat)).unwrap(),
            decode(200, "OK", &body(ok_wrapped)).unwrap()
        );
    }

    #[test]
    fn string_detail_becomes_message() {
        let e = decode(400, "Bad Request", &body(json!({ "detail": "No files provided" }))).unwrap_err();
        assert_eq!(e.message, "No files provided");
        assert_eq!(e.code.as_deref(), Some("ERROR"));
    }

    #[test]
    fn malformed_body_never_panics() {
        let e = decode(500, "Internal Server Error", b"not json").unwrap_err();
        assert_eq!(e.kind, ErrorKind::MalformedBody);
        assert_eq!(e.status, Some(500));
        assert!(e.message.contains("500"), "got: {}", e.message);
        assert_eq!(e.code.as_deref(), Some("ERROR"));
    }

    #[test]
    fn malformed_body_on_200_still_fails() {
        let e = decode(200, "OK", b"<html>").unwrap_err();
        assert_eq!(e.kind, ErrorKind::MalformedBody);
        assert_eq!(e.message, "HTTP 200: OK");
    }

    #[test]
    fn passthrough_without_data() {
        let raw = json!({ "tesseract_available": true, "tesseract_path": "/usr/bin/tesseract" });
        let d = decode(200, "OK", &body(raw.clone())).unwrap();
        assert_eq!(d.payload, raw);
        assert!(!d.has_data);

        let list = json!([{ "id": "scan2pdf" }]);
        assert_eq!(decode(200, "OK", &body(list.clone())).unwrap().payload, list);
    }

    #[test]
    fn error_detail_and_variant_are_kept() {
        let e = decode(
            400,
            "Bad Request",
            &body(json!({ "detail": {
                "code": "CONVERSION_ERROR",
                "message": "Conversion failed: bad yaml",
                "error": "line 3: unexpected ':'",
                "toast_variant": "default"
            } })),
        )
        .unwrap_err();
        assert_eq!(e.detail.as_deref(), Some("line 3: unexpected ':'"));
        assert_eq!(e.toast_variant, ToastVariant::Default);
    }

    #[test]
    fn unknown_toast_variant_is_default() {
        assert_eq!(ToastVariant::from_wire("warning"), ToastVariant::Default);
        assert_eq!(ToastVariant::from_wire("success"), ToastVariant::Success);
    }
}
