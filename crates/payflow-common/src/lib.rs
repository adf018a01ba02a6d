//! Payflow Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared utilities and error handling for the Payflow workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`PayflowError`] and the crate [`Result`] alias
//! - **Logging**: tracing subscriber setup with console and daily file output
//! - **File I/O**: whole-file read, append, and no-overwrite write primitives
//!
//! # Example
//!
//! ```no_run
//! use payflow_common::{fsio, Result};
//! use std::path::Path;
//!
//! fn copy_once(from: &Path, to: &Path) -> Result<()> {
//!     let text = fsio::read_text(from)?;
//!     fsio::write_new(to, &text)
//! }
//! ```

pub mod error;
pub mod fsio;
pub mod logging;

// Re-export commonly used types
pub use error::{PayflowError, Result};
