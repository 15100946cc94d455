//! Tool catalogue and health check.

use crate::client::{ApiClient, RequestOptions};
use crate::error::DispatchError;
use serde::{Deserialize, Serialize};

/// One entry of the tool catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tool {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub route: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    #[serde(default)]
    pub version: Option<String>,
}

impl Health {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

impl ApiClient {
    /// `GET /api/tools`: the catalogue is a bare JSON array.
    pub async fn list_tools(&self) -> Result<Vec<Tool>, DispatchError> {
        self.request("/api/tools", RequestOptions::get()).await
    }

    /// `GET /api/health`.
    pub async fn health(&self) -> Result<Health, DispatchError> {
        self.request("/api/health", RequestOptions::get()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_tolerates_missing_optional_fields() {
        let t: Tool = serde_json::from_str(
            r#"{"id":"scan2pdf","title":"Scan2PDF","features":["OCR"],"route":"/tools/scan2pdf"}"#,
        )
        .unwrap();
        assert_eq!(t.id, "scan2pdf");
        assert!(t.tags.is_empty());
        assert_eq!(t.category, None);
    }

    #[test]
    fn health_status() {
        let h: Health = serde_json::from_str(r#"{"status":"ok","version":"1.0.0"}"#).unwrap();
        assert!(h.is_ok());
        assert_eq!(h.version.as_deref(), Some("1.0.0"));
    }
}
