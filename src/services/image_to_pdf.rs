//! Image-to-PDF (Scan2PDF) tool: OCR availability, uploads, batch conversion.

use crate::cancel::CancelToken;
use crate::client::{ApiClient, RequestOptions};
use crate::conversion::{ConversionOrchestrator, ConversionRequest, ConversionState};
use crate::error::DispatchError;
use crate::transfer::file_part;
use reqwest::multipart::Form;
use serde::{Deserialize, Serialize};
use std::path::Path;

const BASE: &str = "/api/tools/image-to-pdf";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TesseractStatus {
    pub tesseract_available: bool,
    #[serde(default)]
    pub tesseract_path: Option<String>,
}

/// Server-side paths of uploaded files, usable as `input_files`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFiles {
    #[serde(default)]
    pub success: bool,
    pub files: Vec<String>,
}

/// Accessor returned by [`ApiClient::image_to_pdf`].
#[derive(Debug, Clone, Copy)]
pub struct ImageToPdf<'a> {
    client: &'a ApiClient,
}

impl ApiClient {
    pub fn image_to_pdf(&self) -> ImageToPdf<'_> {
        ImageToPdf { client: self }
    }
}

impl<'a> ImageToPdf<'a> {
    pub async fn status(&self) -> Result<TesseractStatus, DispatchError> {
        self.client
            .request(&format!("{BASE}/status"), RequestOptions::get())
            .await
    }

    /// Upload local images; every file goes under the multipart field `files`.
    pub async fn upload_files<P: AsRef<Path>>(
        &self,
        paths: &[P],
        cancel: Option<CancelToken>,
    ) -> Result<UploadedFiles, DispatchError> {
        if paths.is_empty() {
            return Err(DispatchError::invalid_request("No files provided"));
        }
        let mut form = Form::new();
        for path in paths {
            form = form.part("files", file_part(path).await?);
        }
        self.client
            .upload(&format!("{BASE}/upload-files"), form, cancel)
            .await
    }

    /// Absolute URL that serves a generated PDF for preview.
    pub fn preview_url(&self, file: &str) -> Result<String, DispatchError> {
        let base = self.client.config().resolve_url(&format!("{BASE}/preview-pdf"));
        let mut url = reqwest::Url::parse(&base)
            .map_err(|e| DispatchError::invalid_request(format!("Invalid preview URL '{base}': {e}")))?;
        url.query_pairs_mut().append_pair("file", file);
        Ok(url.into())
    }

    /// Run a batch conversion through the orchestrator.
    pub async fn convert(
        &self,
        request: &ConversionRequest,
        cancel: Option<CancelToken>,
    ) -> ConversionState {
        ConversionOrchestrator::new(self.client.clone())
            .run(request, cancel)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;

    fn client() -> ApiClient {
        ApiClient::new(
            ClientConfig::builder()
                .base_url("http://tools.local:8000")
                .build()
                .unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn preview_url_encodes_path() {
        let url = client()
            .image_to_pdf()
            .preview_url("/out/my scan&1.pdf")
            .unwrap();
        assert!(url.starts_with("http://tools.local:8000/api/tools/image-to-pdf/preview-pdf?file="));
        assert!(!url.contains(' '));
        assert!(url.contains("%2Fout%2Fmy"));
        assert!(url.contains("%261.pdf"));
    }

    #[tokio::test]
    async fn upload_requires_files() {
        let c = client();
        let none: [&str; 0] = [];
        let err = c.image_to_pdf().upload_files(&none, None).await.unwrap_err();
        assert_eq!(err.message, "No files provided");
    }

    #[test]
    fn status_with_missing_path() {
        let s: TesseractStatus = serde_json::from_str(r#"{"tesseract_available":false}"#).unwrap();
        assert!(!s.tesseract_available);
        assert_eq!(s.tesseract_path, None);
    }
}
