//! Evidence tier classification
//!
//! Gauges whether feedback describes something the model actually looked at
//! ("I can see the button is cut off") or is a generic suggestion
//! ("consider adding a banner").

use super::Verdict;
use crate::annotation::{EvidenceLevel, ValidationMethod};
use crate::vocabulary::{count_phrase_hits, EvidenceTiers};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvidenceCounts {
    pub strong: usize,
    pub moderate: usize,
    pub weak: usize,
}

impl EvidenceCounts {
    pub fn tally(text: &str, tiers: &EvidenceTiers) -> Self {
        Self {
            strong: count_phrase_hits(text, &tiers.strong),
            moderate: count_phrase_hits(text, &tiers.moderate),
            weak: count_phrase_hits(text, &tiers.weak),
        }
    }

    /// Fixed decision table over the tier counts.
    pub fn decide(&self) -> (EvidenceLevel, f64) {
        match *self {
            EvidenceCounts { strong, .. } if strong >= 1 => (EvidenceLevel::Strong, 0.9),
            EvidenceCounts { moderate, .. } if moderate >= 2 => (EvidenceLevel::Moderate, 0.7),
            EvidenceCounts {
                moderate: 1,
                weak: 0,
                ..
            } => (EvidenceLevel::Moderate, 0.6),
            EvidenceCounts { weak, .. } if weak >= 3 => (EvidenceLevel::Weak, 0.3),
            _ => (EvidenceLevel::None, 0.1),
        }
    }
}

/// Classify lower-cased annotation text by its observational language.
pub fn classify_evidence(text: &str, tiers: &EvidenceTiers) -> Verdict {
    let counts = EvidenceCounts::tally(text, tiers);
    let (evidence_level, confidence) = counts.decide();
    Verdict {
        is_valid: evidence_level.is_substantive(),
        evidence_level,
        confidence,
        reasoning: format!(
            "Evidence phrases: {} strong, {} moderate, {} weak -> {}",
            counts.strong, counts.moderate, counts.weak, evidence_level
        ),
        method: ValidationMethod::EvidenceClassifier,
    }
}
