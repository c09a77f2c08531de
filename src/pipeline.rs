//! Batch processing
//!
//! Validates a batch of raw annotations, attaches the verdicts, filters the
//! batch and reports metrics plus a per-stage decision log. The log is for
//! diagnostics only and is built whether or not detail logging is enabled.

use crate::annotation::{Annotation, EvidenceLevel, ValidationResult};
use crate::error::ConfigError;
use crate::filter::{FilterEngine, FilterItem, DEFAULT_MAX_INVALID_ANNOTATIONS};
use crate::validate::{AnnotationValidator, QualityThresholds};
use crate::vocabulary::Vocabulary;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

pub const DEFAULT_MIN_CONFIDENCE_THRESHOLD: f64 = 0.6;
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 8;

/// Pipeline options. Keys are snake_case in TOML; the camelCase spellings
/// used by JSON callers are accepted too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    #[serde(alias = "enableValidation")]
    pub enable_validation: bool,
    #[serde(alias = "enableFiltering")]
    pub enable_filtering: bool,
    /// Cap on the research-path threshold. It can only lower that threshold:
    /// values above `threshold.research_threshold` have no effect.
    #[serde(alias = "minConfidenceThreshold")]
    pub min_confidence_threshold: f64,
    #[serde(alias = "maxInvalidAnnotations")]
    pub max_invalid_annotations: usize,
    #[serde(alias = "logValidationDetails")]
    pub log_validation_details: bool,
    /// Batches at least this large are validated on the rayon pool
    pub parallel_threshold: usize,
    #[serde(rename = "threshold")]
    pub thresholds: QualityThresholds,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            enable_validation: true,
            enable_filtering: true,
            min_confidence_threshold: DEFAULT_MIN_CONFIDENCE_THRESHOLD,
            max_invalid_annotations: DEFAULT_MAX_INVALID_ANNOTATIONS,
            log_validation_details: false,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            thresholds: QualityThresholds::default(),
        }
    }
}

impl ProcessingConfig {
    /// Thresholds actually applied: the research threshold never exceeds
    /// `min_confidence_threshold`.
    pub fn effective_thresholds(&self) -> QualityThresholds {
        let mut thresholds = self.thresholds.clone();
        thresholds.research_threshold = thresholds
            .research_threshold
            .min(self.min_confidence_threshold);
        thresholds
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut bad = self.thresholds.out_of_range_fields();
        if !(0.0..=1.0).contains(&self.min_confidence_threshold) {
            bad.push("min_confidence_threshold");
        }
        if bad.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(format!(
                "{} must be between 0 and 1",
                bad.join(", ")
            )))
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingMetrics {
    pub total_annotations: usize,
    /// Annotations in the processed (kept) set
    pub valid_count: usize,
    pub average_confidence: f64,
    pub evidence_level_distribution: BTreeMap<String, usize>,
    pub research_backed_count: usize,
    pub preserved_research_count: usize,
    pub restored_count: usize,
}

/// One line of the decision log
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation_id: Option<String>,
    pub stage: String,
    pub message: String,
}

impl LogEntry {
    fn batch(stage: &str, message: String) -> Self {
        Self {
            annotation_id: None,
            stage: stage.to_string(),
            message,
        }
    }

    fn for_annotation(id: &str, stage: &str, message: String) -> Self {
        Self {
            annotation_id: Some(id.to_string()),
            stage: stage.to_string(),
            message,
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.annotation_id {
            Some(id) => write!(f, "[{}] {}: {}", id, self.stage, self.message),
            None => write!(f, "{}: {}", self.stage, self.message),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResult {
    pub processed_annotations: Vec<Annotation>,
    pub filtered_annotations: Vec<Annotation>,
    pub research_preserved: Vec<Annotation>,
    pub metrics: ProcessingMetrics,
    pub processing_log: Vec<LogEntry>,
    pub filter_reasons: BTreeMap<String, String>,
    /// Verdicts in input order; empty when validation is disabled
    pub validation_results: Vec<ValidationResult>,
}

impl ProcessingResult {
    pub fn is_empty(&self) -> bool {
        self.processed_annotations.is_empty()
    }
}

pub struct ProcessingOrchestrator {
    config: ProcessingConfig,
    validator: AnnotationValidator,
    filter: FilterEngine,
}

impl ProcessingOrchestrator {
    pub fn new(config: ProcessingConfig, vocabulary: Vocabulary) -> Result<Self, ConfigError> {
        config.validate()?;
        let thresholds = config.effective_thresholds();
        let validator = AnnotationValidator::new(vocabulary, thresholds.clone())?;
        let filter = FilterEngine::new(thresholds, config.max_invalid_annotations);
        Ok(Self {
            config,
            validator,
            filter,
        })
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    pub fn validator(&self) -> &AnnotationValidator {
        &self.validator
    }

    /// Validate every annotation; results are in input order.
    pub fn validate_batch(&self, annotations: &[Annotation]) -> Vec<ValidationResult> {
        if annotations.len() >= self.config.parallel_threshold.max(1) {
            annotations
                .par_iter()
                .map(|annotation| self.validator.validate(annotation))
                .collect()
        } else {
            annotations
                .iter()
                .map(|annotation| self.validator.validate(annotation))
                .collect()
        }
    }

    pub fn process(&self, annotations: Vec<Annotation>) -> ProcessingResult {
        let start = Instant::now();
        let total = annotations.len();
        let mut log = vec![LogEntry::batch(
            "batch",
            format!("processing {} annotations", total),
        )];

        if !self.config.enable_validation {
            log.push(LogEntry::batch(
                "batch",
                "validation disabled, annotations passed through".to_string(),
            ));
            return ProcessingResult {
                metrics: ProcessingMetrics {
                    total_annotations: total,
                    valid_count: total,
                    evidence_level_distribution: empty_distribution(),
                    ..Default::default()
                },
                processed_annotations: annotations,
                processing_log: log,
                ..Default::default()
            };
        }

        let results = self.validate_batch(&annotations);
        for (annotation, result) in annotations.iter().zip(&results) {
            self.log_stages(annotation, result, &mut log);
        }

        let items: Vec<FilterItem> = annotations
            .into_iter()
            .zip(results.iter().cloned())
            .enumerate()
            .map(|(index, (mut annotation, result))| {
                annotation.attach_validation(&result);
                FilterItem {
                    index,
                    annotation,
                    result,
                }
            })
            .collect();

        let (kept, filtered, preserved, reasons, restored) = if self.config.enable_filtering {
            let outcome = self.filter.filter(items);
            for (_, id, reason) in outcome.reasons_in_order() {
                log.push(LogEntry::for_annotation(id, "filter", reason.to_string()));
            }
            let reasons = outcome.filter_reasons();
            (
                outcome.valid,
                outcome.filtered,
                outcome.research_preserved,
                reasons,
                outcome.restored_ids.len(),
            )
        } else {
            let preserved = items
                .iter()
                .filter(|item| item.result.has_research && item.result.is_valid)
                .cloned()
                .collect();
            (items, Vec::new(), preserved, BTreeMap::new(), 0)
        };

        let metrics = compute_metrics(&results, kept.len(), preserved.len(), restored);
        log.push(LogEntry::batch(
            "batch",
            format!(
                "kept {} of {}, filtered {}, research preserved {}, restored {}",
                kept.len(),
                total,
                filtered.len(),
                preserved.len(),
                restored
            ),
        ));
        tracing::info!(
            total,
            kept = kept.len(),
            filtered = filtered.len(),
            research_preserved = preserved.len(),
            restored,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Annotation batch processed"
        );

        ProcessingResult {
            processed_annotations: kept.into_iter().map(|item| item.annotation).collect(),
            filtered_annotations: filtered.into_iter().map(|item| item.annotation).collect(),
            research_preserved: preserved.into_iter().map(|item| item.annotation).collect(),
            metrics,
            processing_log: log,
            filter_reasons: reasons,
            validation_results: results,
        }
    }

    fn log_stages(&self, annotation: &Annotation, result: &ValidationResult, log: &mut Vec<LogEntry>) {
        for stage in &result.trace {
            if self.config.log_validation_details {
                tracing::debug!(
                    annotation_id = annotation.id.as_str(),
                    stage = stage.stage,
                    evidence = stage.evidence_level.as_str(),
                    confidence = stage.confidence,
                    "{}",
                    stage.reasoning
                );
            }
            log.push(LogEntry::for_annotation(
                &annotation.id,
                stage.stage,
                format!(
                    "{} ({:.2}): {}",
                    stage.evidence_level, stage.confidence, stage.reasoning
                ),
            ));
        }
        if !result.issues.is_empty() {
            let issues: Vec<String> = result.issues.iter().map(|i| i.to_string()).collect();
            log.push(LogEntry::for_annotation(
                &annotation.id,
                "issues",
                issues.join("; "),
            ));
        }
    }
}

fn empty_distribution() -> BTreeMap<String, usize> {
    EvidenceLevel::ALL
        .iter()
        .map(|level| (level.as_str().to_string(), 0))
        .collect()
}

fn compute_metrics(
    results: &[ValidationResult],
    valid_count: usize,
    preserved_research_count: usize,
    restored_count: usize,
) -> ProcessingMetrics {
    let mut distribution = empty_distribution();
    for result in results {
        *distribution
            .entry(result.evidence_level.as_str().to_string())
            .or_insert(0) += 1;
    }
    let average_confidence = if results.is_empty() {
        0.0
    } else {
        results.iter().map(|r| r.confidence).sum::<f64>() / results.len() as f64
    };
    ProcessingMetrics {
        total_annotations: results.len(),
        valid_count,
        average_confidence,
        evidence_level_distribution: distribution,
        research_backed_count: results.iter().filter(|r| r.has_research).count(),
        preserved_research_count,
        restored_count,
    }
}
