//! Markdown-to-PDF (DocuMark) tool.

use crate::client::{ApiClient, RequestOptions};
use crate::error::DispatchError;
use crate::transfer::{file_part, Downloaded};
use reqwest::multipart::Form;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;

const BASE: &str = "/api/tools/md-to-pdf";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocuMarkStatus {
    pub weasyprint_available: bool,
    /// Why the renderer is unavailable.
    #[serde(default)]
    pub error: Option<String>,
}

/// Accessor returned by [`ApiClient::md_to_pdf`].
#[derive(Debug, Clone, Copy)]
pub struct MdToPdf<'a> {
    client: &'a ApiClient,
}

impl ApiClient {
    pub fn md_to_pdf(&self) -> MdToPdf<'_> {
        MdToPdf { client: self }
    }
}

impl<'a> MdToPdf<'a> {
    pub async fn status(&self) -> Result<DocuMarkStatus, DispatchError> {
        self.client
            .request(&format!("{BASE}/status"), RequestOptions::get())
            .await
    }

    /// Render Markdown text; the PDF comes back as a binary body.
    pub async fn convert_text(&self, markdown: &str) -> Result<Downloaded, DispatchError> {
        self.client
            .download(&format!("{BASE}/convert-text"), text_options(markdown))
            .await
    }

    /// Render Markdown text straight into `output`.
    pub async fn convert_text_to_file(
        &self,
        markdown: &str,
        output: impl AsRef<Path>,
    ) -> Result<Downloaded, DispatchError> {
        self.client
            .download_to_file(&format!("{BASE}/convert-text"), text_options(markdown), output)
            .await
    }

    /// Upload a `.md` / `.markdown` / `.txt` file and get the PDF back.
    pub async fn convert_file(&self, path: impl AsRef<Path>) -> Result<Downloaded, DispatchError> {
        let form = Form::new().part("file", file_part(path).await?);
        self.client
            .download(&format!("{BASE}/convert"), RequestOptions::post().form(form))
            .await
    }
}

fn text_options(markdown: &str) -> RequestOptions {
    RequestOptions::post().json(json!({ "content": markdown }))
}
