//! Upload and download variants of the dispatcher.
//!
//! * **Upload** always `POST`s a multipart form and decodes the envelope like
//!   [`ApiClient::request`]. It has no metadata mode.
//! * **Download** returns the raw body of a 2xx response untouched. Failures
//!   still go through the envelope codec so a binary endpoint can report a
//!   server-authored message.

use crate::cancel::CancelToken;
use crate::client::{from_payload, ApiClient, RequestBody, RequestOptions};
use crate::error::DispatchError;
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde::de::DeserializeOwned;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info, warn};

/// A successful download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Downloaded {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    /// File name suggested by `Content-Disposition`, if any.
    pub filename: Option<String>,
}

impl Downloaded {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl ApiClient {
    /// `POST` a multipart form and decode the envelope.
    pub async fn upload<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        form: Form,
        cancel: Option<CancelToken>,
    ) -> Result<T, DispatchError> {
        let mut options = RequestOptions::post();
        options.cancel = cancel;
        self.upload_with(endpoint, form, options).await
    }

    /// [`upload`](Self::upload) with extra options (query, headers).
    ///
    /// The method is always `POST` and the body is always `form`.
    pub async fn upload_with<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        form: Form,
        options: RequestOptions,
    ) -> Result<T, DispatchError> {
        let options = options.method(Method::POST).body(RequestBody::Form(form));
        let payload = self.dispatch(endpoint, options, false).await?.into_payload();
        from_payload(payload)
    }

    /// Fetch a binary body.
    pub async fn download(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<Downloaded, DispatchError> {
        let raw = self
            .execute(endpoint, options, Some(self.config().request_timeout()))
            .await?;

        if !raw.is_ok() {
            let err = raw.error();
            warn!("Download of {} failed with HTTP {}: {}", endpoint, raw.status, err.message);
            return Err(err);
        }

        debug!("Downloaded {} bytes from {}", raw.body.len(), endpoint);
        let filename = raw
            .content_disposition
            .as_deref()
            .and_then(filename_from_disposition);
        Ok(Downloaded {
            bytes: raw.body,
            content_type: raw.content_type,
            filename,
        })
    }

    /// Download into `path`.
    ///
    /// The body is written to a temporary file in the target directory and
    /// then renamed over `path`, so a failed transfer never leaves a partial
    /// file behind.
    pub async fn download_to_file(
        &self,
        endpoint: &str,
        options: RequestOptions,
        path: impl AsRef<Path>,
    ) -> Result<Downloaded, DispatchError> {
        let path = path.as_ref().to_path_buf();
        let downloaded = self.download(endpoint, options).await?;

        let target = path.clone();
        let downloaded = tokio::task::spawn_blocking(move || {
            write_atomic(&target, &downloaded.bytes).map(|_| downloaded)
        })
        .await
        .map_err(|e| DispatchError::io("write", &path, &std::io::Error::other(e.to_string())))??;

        info!("Wrote {} bytes to {}", downloaded.len(), path.display());
        Ok(downloaded)
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), DispatchError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| DispatchError::io("create", &dir, &e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| DispatchError::io("write", path, &e))?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.flush())
        .map_err(|e| DispatchError::io("write", path, &e))?;
    tmp.persist(path)
        .map_err(|e| DispatchError::io("write", path, &e.error))?;
    Ok(())
}

/// Build a multipart part from a file on disk.
///
/// The part carries the file name so the backend can keep it.
pub async fn file_part(path: impl AsRef<Path>) -> Result<Part, DispatchError> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| DispatchError::io("read", path, &e))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    Ok(Part::bytes(bytes).file_name(name))
}

/// Extract `filename` from a `Content-Disposition` header value.
pub fn filename_from_disposition(value: &str) -> Option<String> {
    value.split(';').map(str::trim).find_map(|param| {
        let (key, val) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("filename") {
            return None;
        }
        let val = val.trim().trim_matches('"');
        if val.is_empty() {
            None
        } else {
            Some(val.to_string())
        }
    })
}
