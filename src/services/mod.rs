//! Typed consumers of the communication layer, one module per backend tool.
//!
//! Each accessor borrows the [`ApiClient`](crate::ApiClient) and adds nothing
//! but endpoint paths, request bodies and response types:
//!
//! ```rust,no_run
//! # async fn demo() -> Result<(), toolhub_client::DispatchError> {
//! use toolhub_client::{ApiClient, services::data_validator::DataFormat};
//!
//! let client = ApiClient::from_env().expect("valid config");
//! let outcome = client
//!     .data_validator()
//!     .validate("{\"a\": 1}", DataFormat::Json)
//!     .await?;
//! println!("{} (valid: {})", outcome.message, outcome.data.valid);
//! # Ok(())
//! # }
//! ```

pub mod color_palette;
pub mod data_validator;
pub mod image_to_pdf;
pub mod md_to_pdf;
pub mod tools;

pub use color_palette::ColorPalette;
pub use data_validator::DataValidator;
pub use image_to_pdf::ImageToPdf;
pub use md_to_pdf::MdToPdf;
pub use tools::{Health, Tool};
