use crate::types::SectionKey;
use thiserror::Error;

/// Storage-layer error type.
pub type StorageError = Box<dyn std::error::Error + Send + Sync>;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid section key token.
    #[error("invalid section key: {0}")]
    InvalidSectionKey(String),
    /// No matcher is defined for the requested instance.
    #[error("no matcher defined for section key {key}")]
    MissingMatcher { key: SectionKey },
    /// A policy row references a section key with no policy definition.
    #[error("no policy definition for section key {key}")]
    MissingPolicyDefinition { key: SectionKey },
    /// A permission key/value field is absent from a policy record.
    #[error("policy {key} has no field {field}")]
    MissingPermissionField { field: String, key: SectionKey },
    /// An expression backend rejected a matcher or effect source.
    #[error("expression for {key} failed to compile: {reason}")]
    ExpressionCompile { key: SectionKey, reason: String },
    /// Strict-mode model parsing found malformed statements.
    #[error("malformed model line(s): {}", .lines.join("; "))]
    MalformedModel { lines: Vec<String> },
    /// Permission source error wrapper for host producers.
    #[error("permission source error: {0}")]
    Source(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Wraps an arbitrary host error as a permission source failure.
    pub fn source(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Source(Box::new(error))
    }
}
