//! Error types
//!
//! Per-annotation problems are not errors (see `ValidationIssue`); everything
//! here concerns a whole provider call or the configuration.

use crate::provider::Vendor;
use crate::util::sanitize_provider_message;
use std::path::PathBuf;

/// How the orchestrator reacts to a provider failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Credentials rejected. Never retried, never falls back.
    Auth,
    /// The model is gone or overloaded; try the next model of the same vendor.
    ModelUnavailable,
    /// Network, rate limit, timeout, malformed envelope; try the fallback vendor once.
    Retryable,
}

/// A typed failure reported by a provider client (or by the timeout around it)
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("{vendor} rejected the credentials: {message}")]
    Auth { vendor: Vendor, message: String },

    #[error("{vendor} model {model} is unavailable: {message}")]
    ModelUnavailable {
        vendor: Vendor,
        model: String,
        message: String,
    },

    #[error("{vendor} rate limited the request: {message}")]
    RateLimited { vendor: Vendor, message: String },

    #[error("network error talking to {vendor}: {message}")]
    Network { vendor: Vendor, message: String },

    #[error("{vendor} returned a malformed response: {message}")]
    MalformedResponse { vendor: Vendor, message: String },

    #[error("{vendor} model {model} timed out after {timeout_ms}ms")]
    Timeout {
        vendor: Vendor,
        model: String,
        timeout_ms: u64,
    },

    #[error("no client is registered for {vendor}")]
    NotConfigured { vendor: Vendor },
}

impl ProviderError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ProviderError::Auth { .. } => FailureKind::Auth,
            ProviderError::ModelUnavailable { .. } => FailureKind::ModelUnavailable,
            ProviderError::RateLimited { .. }
            | ProviderError::Network { .. }
            | ProviderError::MalformedResponse { .. }
            | ProviderError::Timeout { .. }
            | ProviderError::NotConfigured { .. } => FailureKind::Retryable,
        }
    }

    pub fn vendor(&self) -> Vendor {
        match self {
            ProviderError::Auth { vendor, .. }
            | ProviderError::ModelUnavailable { vendor, .. }
            | ProviderError::RateLimited { vendor, .. }
            | ProviderError::Network { vendor, .. }
            | ProviderError::MalformedResponse { vendor, .. }
            | ProviderError::Timeout { vendor, .. }
            | ProviderError::NotConfigured { vendor } => *vendor,
        }
    }

    /// Short label used in attempt diagnostics
    pub fn outcome_label(&self) -> &'static str {
        match self {
            ProviderError::Auth { .. } => "auth",
            ProviderError::ModelUnavailable { .. } => "model_unavailable",
            ProviderError::RateLimited { .. } => "rate_limited",
            ProviderError::Network { .. } => "network_error",
            ProviderError::MalformedResponse { .. } => "malformed_response",
            ProviderError::Timeout { .. } => "timeout",
            ProviderError::NotConfigured { .. } => "not_configured",
        }
    }

    /// Map an HTTP status and body from a vendor API onto the taxonomy.
    ///
    /// For client implementations; the body is sanitized before it is kept.
    pub fn from_status(vendor: Vendor, model: &str, status: u16, body: &str) -> Self {
        let message = sanitize_provider_message(body);
        match status {
            401 | 403 => ProviderError::Auth { vendor, message },
            404 | 410 => ProviderError::ModelUnavailable {
                vendor,
                model: model.to_string(),
                message,
            },
            429 => ProviderError::RateLimited { vendor, message },
            500..=599 => ProviderError::Network {
                vendor,
                message: format!("server error {}: {}", status, message),
            },
            _ => ProviderError::MalformedResponse {
                vendor,
                message: format!("unexpected status {}: {}", status, message),
            },
        }
    }
}

/// Terminal outcome of an orchestrated provider call
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalysisError {
    /// Surfaced as-is: auth failures, or failures with no fallback configured.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("primary provider failed ({primary}); fallback provider failed ({fallback})")]
    FallbackExhausted {
        primary: Box<ProviderError>,
        fallback: Box<ProviderError>,
    },

    #[error("AI analysis is temporarily unavailable after {consecutive_failures} consecutive provider failures")]
    CircuitOpen { consecutive_failures: u32 },
}

impl AnalysisError {
    pub fn is_auth(&self) -> bool {
        matches!(self, AnalysisError::Provider(err) if err.kind() == FailureKind::Auth)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("failed to write config {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid setting: {0}")]
    Invalid(String),

    #[error("invalid citation pattern: {0}")]
    Pattern(#[from] regex::Error),
}
