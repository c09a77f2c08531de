//! Provider call followed by the quality pipeline
//!
//! The two failure modes a user can see are kept apart: a batch that was
//! filtered down to nothing is not the same as a call that never produced a
//! batch.

use crate::pipeline::{ProcessingOrchestrator, ProcessingResult};
use crate::provider::{
    AnalysisFailure, AnalysisRequest, ProviderAttempt, ProviderConfig, ProviderOrchestrator,
    Vendor,
};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeSeverity {
    Info,
    Warning,
    Error,
}

/// A completed provider call and what the pipeline made of it
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub vendor: Vendor,
    pub model: String,
    pub attempts: Vec<ProviderAttempt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_failure: Option<String>,
    pub result: ProcessingResult,
}

#[derive(Debug)]
pub enum AnalysisOutcome {
    /// At least one annotation survived filtering.
    Annotated(AnalysisReport),
    /// The call succeeded but nothing was trustworthy enough to show.
    NoTrustworthyAnnotations(AnalysisReport),
    /// The provider call itself failed.
    CallFailed(AnalysisFailure),
}

impl AnalysisOutcome {
    pub fn severity(&self) -> OutcomeSeverity {
        match self {
            AnalysisOutcome::Annotated(report) if report.parse_failure.is_none() => {
                OutcomeSeverity::Info
            }
            AnalysisOutcome::Annotated(_) | AnalysisOutcome::NoTrustworthyAnnotations(_) => {
                OutcomeSeverity::Warning
            }
            AnalysisOutcome::CallFailed(_) => OutcomeSeverity::Error,
        }
    }

    pub fn report(&self) -> Option<&AnalysisReport> {
        match self {
            AnalysisOutcome::Annotated(report)
            | AnalysisOutcome::NoTrustworthyAnnotations(report) => Some(report),
            AnalysisOutcome::CallFailed(_) => None,
        }
    }

    /// Short text suitable for showing to the person who asked for the analysis.
    pub fn user_message(&self) -> String {
        match self {
            AnalysisOutcome::Annotated(report) => {
                let kept = report.result.processed_annotations.len();
                format!(
                    "{} annotation{} passed quality checks",
                    kept,
                    if kept == 1 { "" } else { "s" }
                )
            }
            AnalysisOutcome::NoTrustworthyAnnotations(report) => format!(
                "No trustworthy annotations were produced ({} rejected by quality checks)",
                report.result.filtered_annotations.len()
            ),
            AnalysisOutcome::CallFailed(failure) => {
                format!("The analysis could not be completed: {}", failure.error)
            }
        }
    }
}

/// Call the provider, then validate and filter whatever came back.
pub async fn analyze_and_process(
    providers: &ProviderOrchestrator,
    processing: &ProcessingOrchestrator,
    request: &AnalysisRequest,
    config: &ProviderConfig,
) -> AnalysisOutcome {
    let response = match providers.analyze(request, config).await {
        Ok(response) => response,
        Err(failure) => return AnalysisOutcome::CallFailed(failure),
    };

    let result = processing.process(response.annotations);
    let report = AnalysisReport {
        vendor: response.vendor,
        model: response.model,
        attempts: response.attempts,
        parse_failure: response.parse_failure,
        result,
    };
    if report.result.is_empty() {
        tracing::info!(
            vendor = %report.vendor,
            filtered = report.result.filtered_annotations.len(),
            "No annotations survived filtering"
        );
        AnalysisOutcome::NoTrustworthyAnnotations(report)
    } else {
        AnalysisOutcome::Annotated(report)
    }
}
