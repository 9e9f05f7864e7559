//! Fatal farm configuration errors.
//!
//! Everything here aborts the request before any snapshot is written and
//! must be surfaced as a distinct failure status. A tenant that simply does
//! not exist is not an error; see `engine::Resolution::NotFound`.

use thiserror::Error;

/// A farm configuration problem that aborts the request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FarmError {
    /// The farms file is missing, unparseable or empty.
    #[error("no farm definitions could be loaded from {path}: {reason}")]
    NoFarms { path: String, reason: String },

    /// A matched family lacks a key it needs.
    #[error("family '{family}' is missing mandatory key '{key}'")]
    MissingKey { family: String, key: String },

    /// A matched family has contradictory or malformed keys.
    #[error("family '{family}' is invalid: {reason}")]
    InvalidFamily { family: String, reason: String },

    /// A family's server pattern is not a valid regular expression.
    #[error("family '{family}' has an invalid server pattern: {reason}")]
    InvalidPattern { family: String, reason: String },

    /// A declared existence or versions source cannot be used.
    #[error("source {path} is unusable: {reason}")]
    UnparseableSource { path: String, reason: String },

    /// Redirects kept chaining past the hop budget.
    #[error("redirect loop for {host}: more than {max} redirects")]
    RedirectLoop { host: String, max: u32 },

    /// The tenant was explicitly declared but no installed version serves it.
    #[error("tenant '{identifier}' exists but no installed version serves it")]
    MissingVersion { identifier: String },
}

/// Result type for farm operations.
pub type FarmResult<T> = Result<T, FarmError>;
