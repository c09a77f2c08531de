//! Annotation data model
//!
//! Annotations arrive from an AI provider as untrusted data. The pipeline only
//! attaches validation metadata to them; coordinates and text are never
//! rewritten.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Feedback category assigned by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Ux,
    Visual,
    Accessibility,
    Conversion,
    Brand,
    Content,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Ux => "ux",
            Category::Visual => "visual",
            Category::Accessibility => "accessibility",
            Category::Conversion => "conversion",
            Category::Brand => "brand",
            Category::Content => "content",
        }
    }
}

/// How urgent the provider thinks the feedback is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    #[default]
    Suggested,
    Enhancement,
}

/// How directly an annotation references something actually observed.
///
/// Ordered weakest to strongest so levels can be compared with `max`/`min`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceLevel {
    #[default]
    None,
    Weak,
    Moderate,
    Strong,
}

impl EvidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceLevel::None => "none",
            EvidenceLevel::Weak => "weak",
            EvidenceLevel::Moderate => "moderate",
            EvidenceLevel::Strong => "strong",
        }
    }

    /// Weak and absent evidence never validate on their own.
    pub fn is_substantive(&self) -> bool {
        matches!(self, EvidenceLevel::Moderate | EvidenceLevel::Strong)
    }

    pub const ALL: [EvidenceLevel; 4] = [
        EvidenceLevel::None,
        EvidenceLevel::Weak,
        EvidenceLevel::Moderate,
        EvidenceLevel::Strong,
    ];
}

impl fmt::Display for EvidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which stage produced the deciding verdict for an annotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMethod {
    CoordinateRange,
    CoordinatePattern,
    EvidenceClassifier,
    ContentSpecificity,
    ResearchEnhanced,
    #[default]
    Skipped,
}

impl ValidationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationMethod::CoordinateRange => "coordinate_range",
            ValidationMethod::CoordinatePattern => "coordinate_pattern",
            ValidationMethod::EvidenceClassifier => "evidence_classifier",
            ValidationMethod::ContentSpecificity => "content_specificity",
            ValidationMethod::ResearchEnhanced => "research_enhanced",
            ValidationMethod::Skipped => "skipped",
        }
    }
}

impl fmt::Display for ValidationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One piece of design feedback positioned on a screenshot.
///
/// `x` and `y` are percentages of the image size. The validation fields are
/// `None` until the processing pipeline has seen the annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: String,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub implementation_effort: Option<String>,
    #[serde(default)]
    pub business_impact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_index: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_passed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_level: Option<EvidenceLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_method: Option<ValidationMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_reasoning: Option<String>,
}

impl Annotation {
    pub fn new(id: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            id: id.into(),
            x,
            y,
            ..Default::default()
        }
    }

    pub fn with_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.feedback = feedback.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    /// Lower-cased text every classifier reads: title, description, then feedback.
    pub fn analysis_text(&self) -> String {
        [
            self.title.as_str(),
            self.description.as_str(),
            self.feedback.as_str(),
        ]
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
    }

    /// Copy the verdict onto the annotation. Only the validation fields change.
    pub fn attach_validation(&mut self, result: &ValidationResult) {
        self.validation_score = Some(result.confidence);
        self.validation_passed = Some(result.is_valid);
        self.evidence_level = Some(result.evidence_level);
        self.validation_method = Some(result.validation_method);
        self.validation_reasoning = Some(result.reasoning.clone());
    }

    pub fn is_validated(&self) -> bool {
        self.validation_passed.is_some()
    }
}

/// Non-fatal findings recorded while validating one annotation.
///
/// None of these abort a batch; they lower confidence or explain a rejection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationIssue {
    CoordinateOutOfRange { axis: char, value: f64 },
    SuspiciousCoordinatePattern { label: String },
    NoEvidenceFound,
    LowSpecificity { word_count: usize },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::CoordinateOutOfRange { axis, value } => {
                write!(f, "{} coordinate {} is outside 0-100", axis, value)
            }
            ValidationIssue::SuspiciousCoordinatePattern { label } => {
                write!(f, "coordinates match the {} placeholder point", label)
            }
            ValidationIssue::NoEvidenceFound => f.write_str("no observational evidence in text"),
            ValidationIssue::LowSpecificity { word_count } => {
                write!(f, "text is too generic ({} words)", word_count)
            }
        }
    }
}

/// A single stage verdict, kept for the diagnostic decision log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageVerdict {
    pub stage: &'static str,
    pub evidence_level: EvidenceLevel,
    pub confidence: f64,
    pub reasoning: String,
}

/// Per-annotation outcome of the validation stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub confidence: f64,
    pub evidence_level: EvidenceLevel,
    pub reasoning: String,
    pub validation_method: ValidationMethod,
    pub has_research: bool,
    pub research_confidence: f64,
    pub research_indicators: Vec<String>,
    pub research_quality_score: f64,
    pub citation_count: usize,
    #[serde(default)]
    pub issues: Vec<ValidationIssue>,
    #[serde(skip)]
    pub trace: Vec<StageVerdict>,
}

impl ValidationResult {
    /// Coordinates outside the image can never be trusted, whatever the text says.
    pub fn is_terminal(&self) -> bool {
        self.issues
            .iter()
            .any(|issue| matches!(issue, ValidationIssue::CoordinateOutOfRange { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_text_joins_and_lowercases_parts() {
        let annotation = Annotation::new("a1", 10.0, 20.0)
            .with_title("  Button Contrast ")
            .with_feedback("The CTA is hard to read");
        assert_eq!(
            annotation.analysis_text(),
            "button contrast the cta is hard to read"
        );
    }

    #[test]
    fn attach_validation_leaves_coordinates_and_text_alone() {
        let mut annotation = Annotation::new("a1", 130.0, -4.0).with_feedback("Move this");
        let before = annotation.clone();
        let result = ValidationResult {
            is_valid: false,
            confidence: 0.0,
            reasoning: "out of range".to_string(),
            validation_method: ValidationMethod::CoordinateRange,
            ..Default::default()
        };
        annotation.attach_validation(&result);

        assert_eq!(annotation.x.to_bits(), before.x.to_bits());
        assert_eq!(annotation.y.to_bits(), before.y.to_bits());
        assert_eq!(annotation.feedback, before.feedback);
        assert_eq!(annotation.validation_passed, Some(false));
        assert_eq!(annotation.validation_score, Some(0.0));
    }

    #[test]
    fn deserializes_provider_json_with_defaults() {
        let json = r#"{"id":"n1","x":12.5,"y":40,"category":"accessibility","severity":"critical","feedback":"Low contrast","imageIndex":1}"#;
        let annotation: Annotation = serde_json::from_str(json).unwrap();
        assert_eq!(annotation.category, Category::Accessibility);
        assert_eq!(annotation.severity, Severity::Critical);
        assert_eq!(annotation.image_index, Some(1));
        assert!(annotation.validation_score.is_none());
        assert!(!annotation.is_validated());
    }

    #[test]
    fn evidence_levels_order_weakest_first() {
        assert!(EvidenceLevel::None < EvidenceLevel::Weak);
        assert!(EvidenceLevel::Moderate < EvidenceLevel::Strong);
        assert!(!EvidenceLevel::Weak.is_substantive());
        assert!(EvidenceLevel::Moderate.is_substantive());
    }
}
