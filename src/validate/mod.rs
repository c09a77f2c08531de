//! Per-annotation validation
//!
//! Every stage is a pure function of the annotation and the vocabulary, so a
//! batch can be validated in any order (or in parallel) with identical
//! results. Validation never returns a modified annotation, only a verdict.

pub mod combine;
pub mod coordinates;
pub mod evidence;
pub mod research;
pub mod specificity;

use crate::annotation::{
    Annotation, EvidenceLevel, StageVerdict, ValidationIssue, ValidationMethod, ValidationResult,
};
use crate::vocabulary::Vocabulary;
use coordinates::CoordinateStatus;
use research::ResearchDetector;
use serde::{Deserialize, Serialize};

pub const DEFAULT_STANDARD_THRESHOLD: f64 = 0.7;
pub const DEFAULT_RESEARCH_THRESHOLD: f64 = 0.45;
pub const DEFAULT_HIGH_QUALITY_RESEARCH_THRESHOLD: f64 = 0.3;
pub const DEFAULT_HIGH_QUALITY_RESEARCH_SCORE: f64 = 0.7;
pub const DEFAULT_RESEARCH_CONFIDENCE_CUTOFF: f64 = 0.4;
pub const DEFAULT_RESEARCH_BOOST_FACTOR: f64 = 0.3;

/// Outcome of a single stage
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub is_valid: bool,
    pub evidence_level: EvidenceLevel,
    pub confidence: f64,
    pub reasoning: String,
    pub method: ValidationMethod,
}

impl Verdict {
    fn trace(&self, stage: &'static str) -> StageVerdict {
        StageVerdict {
            stage,
            evidence_level: self.evidence_level,
            confidence: self.confidence,
            reasoning: self.reasoning.clone(),
        }
    }
}

/// Tunable cut-offs shared by the combiner and the filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityThresholds {
    /// Minimum confidence for annotations without research backing
    pub standard_threshold: f64,
    /// Minimum confidence for research-backed annotations
    pub research_threshold: f64,
    /// Minimum confidence once research quality exceeds `high_quality_research_score`
    pub high_quality_research_threshold: f64,
    pub high_quality_research_score: f64,
    /// Research confidence above which `research_threshold` applies
    pub research_confidence_cutoff: f64,
    /// Confidence boost per unit of research quality
    pub research_boost_factor: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            standard_threshold: DEFAULT_STANDARD_THRESHOLD,
            research_threshold: DEFAULT_RESEARCH_THRESHOLD,
            high_quality_research_threshold: DEFAULT_HIGH_QUALITY_RESEARCH_THRESHOLD,
            high_quality_research_score: DEFAULT_HIGH_QUALITY_RESEARCH_SCORE,
            research_confidence_cutoff: DEFAULT_RESEARCH_CONFIDENCE_CUTOFF,
            research_boost_factor: DEFAULT_RESEARCH_BOOST_FACTOR,
        }
    }
}

impl QualityThresholds {
    /// Names of fields that fall outside [0, 1].
    pub fn out_of_range_fields(&self) -> Vec<&'static str> {
        [
            ("standard_threshold", self.standard_threshold),
            ("research_threshold", self.research_threshold),
            (
                "high_quality_research_threshold",
                self.high_quality_research_threshold,
            ),
            (
                "high_quality_research_score",
                self.high_quality_research_score,
            ),
            ("research_confidence_cutoff", self.research_confidence_cutoff),
            ("research_boost_factor", self.research_boost_factor),
        ]
        .into_iter()
        .filter(|(_, value)| !(0.0..=1.0).contains(value))
        .map(|(name, _)| name)
        .collect()
    }
}

/// Runs every validation stage over one annotation.
#[derive(Debug, Clone)]
pub struct AnnotationValidator {
    vocabulary: Vocabulary,
    research: ResearchDetector,
    thresholds: QualityThresholds,
}

impl AnnotationValidator {
    pub fn new(vocabulary: Vocabulary, thresholds: QualityThresholds) -> Result<Self, regex::Error> {
        let vocabulary = vocabulary.normalized();
        let research = ResearchDetector::new(&vocabulary.research)?;
        Ok(Self {
            vocabulary,
            research,
            thresholds,
        })
    }

    pub fn thresholds(&self) -> &QualityThresholds {
        &self.thresholds
    }

    pub fn validate(&self, annotation: &Annotation) -> ValidationResult {
        let text = annotation.analysis_text();
        let signal = self.research.detect(&text);
        let mut trace = Vec::with_capacity(5);
        let mut issues: Vec<ValidationIssue> = Vec::new();

        let coords = coordinates::check_coordinates(
            annotation.x,
            annotation.y,
            &self.vocabulary.suspicious_points,
        );
        trace.push(coords.verdict.trace("coordinates"));
        issues.extend(coords.issues.iter().cloned());

        let finish = |verdict: Verdict,
                      trace: Vec<StageVerdict>,
                      issues: Vec<ValidationIssue>| ValidationResult {
            is_valid: verdict.is_valid,
            confidence: verdict.confidence,
            evidence_level: verdict.evidence_level,
            reasoning: verdict.reasoning,
            validation_method: verdict.method,
            has_research: signal.has_research,
            research_confidence: signal.research_confidence,
            research_indicators: signal.indicators.clone(),
            research_quality_score: signal.quality_score,
            citation_count: signal.citation_count,
            issues,
            trace,
        };

        if coords.status == CoordinateStatus::OutOfRange {
            return finish(coords.verdict, trace, issues);
        }

        let evidence = evidence::classify_evidence(&text, &self.vocabulary.evidence);
        trace.push(evidence.trace("evidence"));
        if evidence.evidence_level == EvidenceLevel::None {
            issues.push(ValidationIssue::NoEvidenceFound);
        }

        let (content, stats) =
            specificity::analyze_specificity(&text, &self.vocabulary.specificity);
        trace.push(content.trace("specificity"));
        if content.evidence_level == EvidenceLevel::Weak {
            issues.push(ValidationIssue::LowSpecificity {
                word_count: stats.word_count,
            });
        }

        let mut base = combine::strongest(evidence, content);
        if coords.status == CoordinateStatus::Suspicious {
            base = combine::cap_with(base, &coords.verdict);
        }

        let research_stage = Verdict {
            is_valid: signal.has_research,
            evidence_level: base.evidence_level,
            confidence: signal.research_confidence,
            reasoning: signal.describe(),
            method: ValidationMethod::ResearchEnhanced,
        };
        trace.push(research_stage.trace("research"));

        let combined = combine::combine(base, &signal, &self.thresholds);
        trace.push(combined.trace("combined"));
        finish(combined, trace, issues)
    }
}
