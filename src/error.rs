//! Error types for the interpreter.
//!
//! Resolution errors carry the (possibly user-configured) text they render as,
//! so the same value can either be returned to the caller or substituted into
//! the reply stream when `Config::throw_exceptions` is off.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the crate's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading, compiling or resolving a script.
#[derive(Error, Debug)]
pub enum Error {
    /// A reply was requested before `sort_replies` built a compiled snapshot.
    #[error("{message}")]
    RepliesNotSorted { message: String },

    /// Neither the session topic nor the default `random` topic exists.
    #[error("{message}")]
    NoDefaultTopic { message: String },

    /// No trigger pattern matched the user message.
    #[error("{message}")]
    ReplyNotMatched { message: String },

    /// A trigger matched but produced no usable reply text.
    #[error("{message}")]
    ReplyNotFound { message: String },

    /// Redirect recursion went past the configured depth.
    #[error("{message}")]
    DeepRecursion { message: String },

    /// A trigger pattern could not be compiled (strict mode only).
    #[error("invalid pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    /// A script line failed its syntax check (strict mode only).
    #[error("syntax error at {filename} line {line}: {message}")]
    Parse { filename: String, line: usize, message: String },

    /// The script declared a language version newer than this parser handles.
    #[error("unsupported script version {found} at {filename} line {line} (supported: {supported})")]
    UnsupportedVersion { filename: String, line: usize, found: String, supported: f64 },

    /// Reading a script file or directory failed.
    #[error("failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Create a pattern compile error.
    pub fn pattern(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Pattern { pattern: pattern.into(), message: message.into() }
    }

    /// Create a parse error for `filename` at `line`.
    pub fn parse(filename: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self::Parse { filename: filename.into(), line, message: message.into() }
    }

    /// Create an I/O error for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    /// Whether this is one of the terminal resolution errors that replace a
    /// whole reply when rendered as text.
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            Self::RepliesNotSorted { .. }
                | Self::NoDefaultTopic { .. }
                | Self::ReplyNotMatched { .. }
                | Self::ReplyNotFound { .. }
                | Self::DeepRecursion { .. }
        )
    }
}
