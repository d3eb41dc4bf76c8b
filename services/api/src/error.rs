//! Typed failures for the analytics engine.
//!
//! Value-level anomalies (unparsable numbers, unmapped geography) are never
//! errors: they are zeroed or dropped inside the reducer. Only request-level
//! and source-level failures surface here.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AnalyticsError {
    /// Caller asked for a dataset label we do not serve.
    #[error("invalid dataset '{0}'")]
    InvalidDataset(String),

    /// No local file and the remote release fetch failed or was non-200.
    #[error("source unavailable for {file}: {detail}")]
    SourceUnavailable { file: String, detail: String },

    /// CSV structurally unparsable (missing columns, ragged records).
    /// Distinct from value-level coercion, which silently zeroes.
    #[error("malformed source: {detail}")]
    MalformedSource { detail: String },

    /// L2 store round-trip failed. Callers swallow this and degrade.
    #[error("cache backend error: {0}")]
    Cache(String),

    /// Worker or serialization failure inside the engine.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AnalyticsError {
    /// Stable machine-readable code returned to HTTP clients in place of
    /// raw error text, so internal paths and URLs never leak.
    pub fn code(&self) -> &'static str {
        match self {
            AnalyticsError::InvalidDataset(_) => "invalid_dataset",
            AnalyticsError::SourceUnavailable { .. } => "source_unavailable",
            AnalyticsError::MalformedSource { .. } => "malformed_source",
            AnalyticsError::Cache(_) => "cache_unavailable",
            AnalyticsError::Internal(_) => "internal_error",
        }
    }
}
