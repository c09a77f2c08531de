//! AI provider orchestration
//!
//! The HTTP clients for each vendor live outside this crate. They plug in
//! through [`ProviderClient`] and report typed [`ProviderError`]s; this module
//! owns the retry and fallback contract around them.

pub mod circuit;
pub mod orchestrator;
pub mod parse;

pub use circuit::{CircuitBreaker, CircuitPermit};
pub use orchestrator::{AnalysisFailure, AnalysisResponse, ProviderAttempt, ProviderOrchestrator};

use crate::error::ProviderError;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported inference vendors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Vendor {
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "google")]
    Google,
}

impl Vendor {
    pub fn slug(&self) -> &'static str {
        match self {
            Vendor::OpenAi => "openai",
            Vendor::Anthropic => "anthropic",
            Vendor::Google => "google",
        }
    }

    /// Vision-capable models, most capable first, then faster and cheaper.
    pub fn models(&self) -> &'static [&'static str] {
        match self {
            Vendor::OpenAi => &["gpt-4.1", "gpt-4o", "gpt-4o-mini"],
            Vendor::Anthropic => &[
                "claude-3-7-sonnet-latest",
                "claude-3-5-sonnet-latest",
                "claude-3-5-haiku-latest",
            ],
            Vendor::Google => &["gemini-2.5-pro", "gemini-2.0-flash", "gemini-1.5-flash"],
        }
    }

    pub fn default_model(&self) -> &'static str {
        self.models()[0]
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Which vendor and model to call, and where to go when it fails
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub provider: Vendor,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub fallback_provider: Option<Vendor>,
}

impl ProviderConfig {
    pub fn new(provider: Vendor) -> Self {
        Self {
            provider,
            model: None,
            fallback_provider: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_fallback(mut self, fallback: Vendor) -> Self {
        self.fallback_provider = Some(fallback);
        self
    }

    /// Models to try on the primary vendor, in order.
    ///
    /// A requested model that is in the vendor's list starts the chain at that
    /// position; an unknown one is tried first, ahead of the whole list.
    pub fn model_chain(&self) -> Vec<String> {
        let catalog = self.provider.models();
        match self.model.as_deref().map(str::trim) {
            None | Some("") => catalog.iter().map(|m| m.to_string()).collect(),
            Some(requested) => match catalog.iter().position(|m| *m == requested) {
                Some(pos) => catalog[pos..].iter().map(|m| m.to_string()).collect(),
                None => std::iter::once(requested.to_string())
                    .chain(catalog.iter().map(|m| m.to_string()))
                    .collect(),
            },
        }
    }

    /// The fallback vendor, if one is configured and differs from the primary.
    pub fn effective_fallback(&self) -> Option<Vendor> {
        self.fallback_provider.filter(|f| *f != self.provider)
    }
}

/// Screenshot plus prompt; both are opaque to this crate
#[derive(Debug, Clone, Default)]
pub struct AnalysisRequest {
    pub image: Vec<u8>,
    pub prompt: String,
}

impl AnalysisRequest {
    pub fn new(image: Vec<u8>, prompt: impl Into<String>) -> Self {
        Self {
            image,
            prompt: prompt.into(),
        }
    }
}

/// One vendor's inference endpoint.
///
/// Returns the raw text content of the model reply on success.
pub trait ProviderClient: Send + Sync {
    fn complete<'a>(
        &'a self,
        model: &'a str,
        request: &'a AnalysisRequest,
    ) -> BoxFuture<'a, Result<String, ProviderError>>;
}
