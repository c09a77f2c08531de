//! Annotation quality pipeline
//!
//! Validates, scores and filters design-feedback annotations produced by AI
//! vision providers, and orchestrates the provider calls that produce them
//! (model fallback, vendor fallback, circuit breaking). Annotations are never
//! rewritten; the pipeline only attaches verdicts and partitions the batch.

pub mod analysis;
pub mod annotation;
pub mod config;
pub mod error;
pub mod filter;
pub mod pipeline;
pub mod provider;
pub mod util;
pub mod validate;
pub mod vocabulary;

pub use analysis::{analyze_and_process, AnalysisOutcome, AnalysisReport, OutcomeSeverity};
pub use annotation::{Annotation, EvidenceLevel, ValidationIssue, ValidationResult};
pub use config::Settings;
pub use error::{AnalysisError, ConfigError, ProviderError};
pub use pipeline::{ProcessingConfig, ProcessingOrchestrator, ProcessingResult};
pub use vocabulary::Vocabulary;
