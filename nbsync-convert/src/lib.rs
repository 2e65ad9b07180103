//! # nbsync-convert
//!
//! The `Converter` capability used by the sync engine, the notebook document
//! model, and the Markdown ↔ notebook converter.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use nbsync_convert::{Converter, MarkdownConverter, Notebook};
//!
//! fn convert(text: &str) -> Result<String, nbsync_convert::ConvertError> {
//!     let converter = MarkdownConverter::new("python", true)?;
//!     let notebook: Notebook = converter.to_structured(text)?;
//!     notebook.to_json()
//! }
//! ```

pub mod converter;
pub mod error;
pub mod notebook;

pub use converter::{Converter, MarkdownConverter};
pub use error::ConvertError;
pub use notebook::{Cell, CellSource, Notebook, Output};
