//! Structured source files.
//!
//! # Data Flow
//! ```text
//! path
//!     → format.rs (extension → SourceFormat)
//!     → reader.rs
//!         fresh pre-parsed snapshot? → serve it
//!         else parse → store snapshot → serve
//!         parse failed? → serve last good snapshot (logged) or NotParseable
//!     → serde_json::Value (List / Dictionary / Scalar)
//! ```

pub mod format;
pub mod reader;

pub use format::SourceFormat;
pub use reader::{SourceError, SourceReader};
