//! Data validator tool: validate, convert, format and minify structured text.
//!
//! Every call uses metadata mode so callers can show the server's message
//! ("JSON is valid", "Converted YAML to JSON") next to the result.

use crate::client::{Annotated, ApiClient, RequestOptions};
use crate::error::DispatchError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

const BASE: &str = "/api/tools/data-validator";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    Json,
    Xml,
    Yaml,
    Csv,
    Toml,
}

impl DataFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataFormat::Json => "json",
            DataFormat::Xml => "xml",
            DataFormat::Yaml => "yaml",
            DataFormat::Csv => "csv",
            DataFormat::Toml => "toml",
        }
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(DataFormat::Json),
            "xml" => Ok(DataFormat::Xml),
            "yaml" | "yml" => Ok(DataFormat::Yaml),
            "csv" => Ok(DataFormat::Csv),
            "toml" => Ok(DataFormat::Toml),
            other => Err(format!("unknown format '{other}' (expected json, xml, yaml, csv or toml)")),
        }
    }
}

/// Which formats the backend can parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatSupport {
    pub formats: BTreeMap<String, bool>,
}

/// Validation verdict. Invalid content is a successful call with `valid: false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validation {
    pub valid: bool,
    pub format: String,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Converted {
    pub converted: String,
    pub from_format: String,
    pub to_format: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Formatted {
    pub formatted: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Minified {
    pub minified: String,
}

/// Accessor returned by [`ApiClient::data_validator`].
#[derive(Debug, Clone, Copy)]
pub struct DataValidator<'a> {
    client: &'a ApiClient,
}

impl ApiClient {
    pub fn data_validator(&self) -> DataValidator<'_> {
        DataValidator { client: self }
    }
}

impl<'a> DataValidator<'a> {
    pub async fn status(&self) -> Result<FormatSupport, DispatchError> {
        self.client
            .request(&format!("{BASE}/status"), RequestOptions::get())
            .await
    }

    pub async fn validate(
        &self,
        content: &str,
        format: DataFormat,
    ) -> Result<Annotated<Validation>, DispatchError> {
        self.post("validate", json!({ "content": content, "format": format }))
            .await
    }

    /// Convert between formats. `indent` is passed through as `options.indent`.
    pub async fn convert(
        &self,
        content: &str,
        from: DataFormat,
        to: DataFormat,
        indent: Option<u32>,
    ) -> Result<Annotated<Converted>, DispatchError> {
        let options = indent.map_or(Value::Null, |i| json!({ "indent": i }));
        self.post(
            "convert",
            json!({
                "content": content,
                "from_format": from,
                "to_format": to,
                "options": options,
            }),
        )
        .await
    }

    pub async fn format(
        &self,
        content: &str,
        format: DataFormat,
        indent: Option<u32>,
    ) -> Result<Annotated<Formatted>, DispatchError> {
        self.post(
            "format",
            json!({ "content": content, "format": format, "indent": indent }),
        )
        .await
    }

    /// JSON only; the backend rejects other formats.
    pub async fn minify(&self, content: &str) -> Result<Annotated<Minified>, DispatchError> {
        self.post("minify", json!({ "content": content, "format": DataFormat::Json }))
            .await
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        action: &str,
        body: Value,
    ) -> Result<Annotated<T>, DispatchError> {
        self.client
            .request_with_metadata(&format!("{BASE}/{action}"), RequestOptions::post().json(body))
            .await
    }
}
