//! Color palette tool.

use crate::client::{ApiClient, RequestOptions};
use crate::error::DispatchError;
use crate::transfer::file_part;
use reqwest::multipart::Form;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;

const BASE: &str = "/api/tools/color-palette";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub hex: String,
    #[serde(default)]
    pub rgb: Vec<u8>,
    #[serde(default)]
    pub hsl: Vec<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saturation: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    #[default]
    Dominant,
    Vibrant,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::Dominant => "dominant",
            ExtractionMethod::Vibrant => "vibrant",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Harmony {
    #[default]
    Random,
    Complementary,
    Triadic,
    Analogous,
    Monochromatic,
    Tetradic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Palette {
    pub colors: Vec<Color>,
    pub method: String,
    pub num_colors: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AverageColor {
    pub hex: String,
    pub rgb: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub dimensions: Dimensions,
    pub total_pixels: u64,
    pub average_color: AverageColor,
    pub dominant_colors: Vec<Color>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomPalette {
    pub colors: Vec<Color>,
    pub harmony: Harmony,
    pub num_colors: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shades {
    pub shades: Vec<Color>,
    pub base_color: String,
}

/// WCAG 2.x thresholds met by a color pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wcag {
    pub aa_normal: bool,
    pub aa_large: bool,
    pub aaa_normal: bool,
    pub aaa_large: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contrast {
    pub contrast_ratio: f64,
    pub wcag: Wcag,
    pub rating: String,
}

/// Parameters of a harmony-based random palette.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RandomPaletteRequest {
    pub harmony: Harmony,
    pub num_colors: usize,
    pub saturation: f64,
    pub lightness: f64,
}

impl Default for RandomPaletteRequest {
    fn default() -> Self {
        Self {
            harmony: Harmony::Random,
            num_colors: 5,
            saturation: 0.7,
            lightness: 0.5,
        }
    }
}

/// Accessor returned by [`ApiClient::color_palette`].
#[derive(Debug, Clone, Copy)]
pub struct ColorPalette<'a> {
    client: &'a ApiClient,
}

impl ApiClient {
    pub fn color_palette(&self) -> ColorPalette<'_> {
        ColorPalette { client: self }
    }
}

impl<'a> ColorPalette<'a> {
    /// Extract a palette from an image. Parameters travel in the query string.
    pub async fn generate(
        &self,
        image: impl AsRef<Path>,
        num_colors: usize,
        method: ExtractionMethod,
    ) -> Result<Palette, DispatchError> {
        let form = Form::new().part("file", file_part(image).await?);
        let options = RequestOptions::post()
            .query("num_colors", num_colors)
            .query("method", method.as_str());
        self.client
            .upload_with(&format!("{BASE}/generate"), form, options)
            .await
    }

    pub async fn analyze(&self, image: impl AsRef<Path>) -> Result<Analysis, DispatchError> {
        let form = Form::new().part("file", file_part(image).await?);
        self.client
            .upload(&format!("{BASE}/analyze"), form, None)
            .await
    }

    pub async fn random(&self, request: &RandomPaletteRequest) -> Result<RandomPalette, DispatchError> {
        let body = serde_json::to_value(request)
            .map_err(|e| DispatchError::invalid_request(e.to_string()))?;
        self.client
            .request(&format!("{BASE}/random"), RequestOptions::post().json(body))
            .await
    }

    pub async fn shades(&self, hex_color: &str, num_shades: usize) -> Result<Shades, DispatchError> {
        self.client
            .request(
                &format!("{BASE}/shades"),
                RequestOptions::post().json(json!({ "hex_color": hex_color, "num_shades": num_shades })),
            )
            .await
    }

    pub async fn contrast(&self, color1: &str, color2: &str) -> Result<Contrast, DispatchError> {
        self.client
            .request(
                &format!("{BASE}/contrast"),
                RequestOptions::post().json(json!({ "color1": color1, "color2": color2 })),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_request_defaults() {
        let body = serde_json::to_value(RandomPaletteRequest::default()).unwrap();
        assert_eq!(body["harmony"], "random");
        assert_eq!(body["num_colors"], 5);
    }

    #[test]
    fn contrast_shape() {
        let c: Contrast = serde_json::from_str(
            r#"{"success":true,"contrast_ratio":21.0,"wcag":{"aa_normal":true,"aa_large":true,"aaa_normal":true,"aaa_large":true},"rating":"AAA"}"#,
        )
        .unwrap();
        assert!(c.wcag.aaa_normal);
        assert_eq!(c.rating, "AAA");
    }

    #[test]
    fn color_with_partial_fields() {
        let c: Color = serde_json::from_str(r##"{"hex":"#ff0000","rgb":[255,0,0],"percentage":12.5}"##).unwrap();
        assert_eq!(c.rgb, vec![255, 0, 0]);
        assert!(c.hsl.is_empty());
        assert_eq!(c.percentage, Some(12.5));
    }
}
