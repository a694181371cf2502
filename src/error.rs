//! Error taxonomy shared by vehicles, fetchers, providers and the rule parser.

use thiserror::Error;

/// Errors raised while loading, parsing or refreshing provider content.
#[derive(Debug, Error)]
pub enum Error {
    /// The vehicle could not deliver bytes (network or file I/O).
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// The payload was malformed. `location` names the offending line or entry.
    #[error("parse error at {location}: {reason}")]
    Parse { location: String, reason: String },

    /// A rule line used a keyword this engine does not know.
    #[error("unsupported rule type: {0}")]
    UnsupportedRuleType(String),

    /// The payload parsed but yielded nothing usable.
    #[error("empty resource: {0}")]
    EmptyResource(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn parse(location: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Error::Parse {
            location: location.into(),
            reason: reason.to_string(),
        }
    }

    /// True for malformed-payload errors, including unknown rule keywords.
    pub fn is_parse(&self) -> bool {
        matches!(self, Error::Parse { .. } | Error::UnsupportedRuleType(_))
    }

    /// Attach a location to a parse error raised without one.
    pub(crate) fn at(self, location: impl Into<String>) -> Self {
        match self {
            Error::Parse { reason, .. } => Error::Parse {
                location: location.into(),
                reason,
            },
            other => other,
        }
    }
}

/// Result type for provider operations.
pub type Result<T> = std::result::Result<T, Error>;
