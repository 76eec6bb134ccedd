//! Error types for stepwright

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use thiserror::Error;

use crate::feature::Keyword;
use crate::registry::StepFuture;

/// Result type alias using the stepwright [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Hook '{name}' failed: {reason}")]
    Hook { name: String, reason: String },

    #[error("No step definition matches: {keyword} {text}")]
    NoMatch { keyword: Keyword, text: String },

    #[error("Ambiguous step: {keyword} {text} matches {}", .patterns.join(", "))]
    AmbiguousMatch {
        keyword: Keyword,
        text: String,
        patterns: Vec<String>,
    },

    #[error("Assertion failed: {0}")]
    Assertion(String),

    #[error("Timeout after {timeout_ms} ms waiting for: {selector}")]
    Timeout { selector: String, timeout_ms: u64 },

    #[error("Context key '{key}': {reason}")]
    ContextKey { key: String, reason: String },

    #[error("Invalid step pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Feature parse error in {}:{line}: {reason}", .path.display())]
    FeatureParse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Automation bridge error: {0}")]
    Bridge(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Shorthand for an assertion failure with a formatted message
    pub fn assertion(message: impl Into<String>) -> Self {
        Error::Assertion(message.into())
    }

    /// Whether this error came from step resolution rather than execution
    pub fn is_resolution(&self) -> bool {
        matches!(self, Error::NoMatch { .. } | Error::AmbiguousMatch { .. })
    }
}

/// Fail with [`Error::Assertion`] unless `condition` holds.
///
/// Step handlers use this the way they would use `assert!`, except the
/// failure travels as a value instead of a panic.
pub fn ensure(condition: bool, message: impl Into<String>) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(Error::Assertion(message.into()))
    }
}

/// Await a handler or hook, turning a panic into [`Error::Assertion`]
pub(crate) async fn catch_panic(future: StepFuture<'_>) -> Result<()> {
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(Error::Assertion(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
