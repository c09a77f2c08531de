//! Confidence combination
//!
//! Folds the stage verdicts into one decision. Research backing boosts
//! confidence and relaxes the validity rule, so well-sourced feedback is far
//! harder to reject than generic advice.

use super::research::ResearchSignal;
use super::{QualityThresholds, Verdict};
use crate::annotation::{EvidenceLevel, ValidationMethod};

const STRONG_UPGRADE_QUALITY: f64 = 0.8;
const MODERATE_UPGRADE_QUALITY: f64 = 0.6;

/// Keep the higher-confidence verdict; both reasonings are preserved.
///
/// Ties go to `primary`.
pub fn strongest(primary: Verdict, secondary: Verdict) -> Verdict {
    let reasoning = format!("{}; {}", primary.reasoning, secondary.reasoning);
    let winner = if secondary.confidence > primary.confidence {
        secondary
    } else {
        primary
    };
    Verdict {
        reasoning,
        ..winner
    }
}

/// Placeholder coordinates cap whatever the text analysis concluded.
pub fn cap_with(text: Verdict, ceiling: &Verdict) -> Verdict {
    if text.confidence <= ceiling.confidence && text.evidence_level <= ceiling.evidence_level {
        return Verdict {
            reasoning: format!("{}; {}", text.reasoning, ceiling.reasoning),
            ..text
        };
    }
    Verdict {
        is_valid: false,
        evidence_level: text.evidence_level.min(ceiling.evidence_level),
        confidence: text.confidence.min(ceiling.confidence),
        reasoning: format!("{}; {}", text.reasoning, ceiling.reasoning),
        method: ceiling.method,
    }
}

/// Validity without research: a plain confidence threshold.
pub fn passes_standard(confidence: f64, thresholds: &QualityThresholds) -> bool {
    confidence >= thresholds.standard_threshold
}

/// Validity for research-backed annotations, falling back to the standard rule.
pub fn passes_research(
    confidence: f64,
    research: &ResearchSignal,
    thresholds: &QualityThresholds,
) -> bool {
    if research.quality_score > thresholds.high_quality_research_score {
        confidence > thresholds.high_quality_research_threshold
    } else if research.research_confidence > thresholds.research_confidence_cutoff {
        confidence > thresholds.research_threshold
    } else {
        passes_standard(confidence, thresholds)
    }
}

/// Merge the evidence verdict with the research signal into the final verdict.
pub fn combine(base: Verdict, research: &ResearchSignal, thresholds: &QualityThresholds) -> Verdict {
    if !research.has_research {
        let confidence = base.confidence.clamp(0.0, 1.0);
        return Verdict {
            is_valid: passes_standard(confidence, thresholds),
            confidence,
            ..base
        };
    }

    let boost = thresholds.research_boost_factor * research.quality_score;
    let confidence = (base.confidence + boost).clamp(0.0, 1.0);

    let evidence_level = if research.quality_score > STRONG_UPGRADE_QUALITY {
        EvidenceLevel::Strong
    } else if research.quality_score > MODERATE_UPGRADE_QUALITY
        && base.evidence_level == EvidenceLevel::Weak
    {
        EvidenceLevel::Moderate
    } else {
        base.evidence_level
    };

    let method = if boost > 0.0 {
        ValidationMethod::ResearchEnhanced
    } else {
        base.method
    };

    Verdict {
        is_valid: passes_research(confidence, research, thresholds),
        evidence_level,
        confidence,
        reasoning: format!(
            "{}; research boost +{:.2} -> {:.2}",
            base.reasoning, boost, confidence
        ),
        method,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(level: EvidenceLevel, confidence: f64) -> Verdict {
        Verdict {
            is_valid: level.is_substantive(),
            evidence_level: level,
            confidence,
            reasoning: format!("{} at {}", level, confidence),
            method: ValidationMethod::EvidenceClassifier,
        }
    }

    fn research(quality_score: f64, research_confidence: f64) -> ResearchSignal {
        ResearchSignal {
            has_research: true,
            quality_score,
            research_confidence,
            ..Default::default()
        }
    }

    #[test]
    fn strongest_keeps_higher_confidence_and_both_reasons() {
        let merged = strongest(
            verdict(EvidenceLevel::None, 0.1),
            verdict(EvidenceLevel::Moderate, 0.5),
        );
        assert_eq!(merged.confidence, 0.5);
        assert!(merged.reasoning.contains("none at 0.1"));
        assert!(merged.reasoning.contains("moderate at 0.5"));
    }

    #[test]
    fn strongest_prefers_primary_on_tie() {
        let mut primary = verdict(EvidenceLevel::Moderate, 0.6);
        primary.method = ValidationMethod::EvidenceClassifier;
        let mut secondary = verdict(EvidenceLevel::Moderate, 0.6);
        secondary.method = ValidationMethod::ContentSpecificity;
        assert_eq!(
            strongest(primary, secondary).method,
            ValidationMethod::EvidenceClassifier
        );
    }

    #[test]
    fn cap_lowers_confidence_and_level() {
        let mut ceiling = verdict(EvidenceLevel::Weak, 0.3);
        ceiling.method = ValidationMethod::CoordinatePattern;
        let capped = cap_with(verdict(EvidenceLevel::Moderate, 0.5), &ceiling);
        assert_eq!(capped.confidence, 0.3);
        assert_eq!(capped.evidence_level, EvidenceLevel::Weak);
        assert_eq!(capped.method, ValidationMethod::CoordinatePattern);
        assert!(!capped.is_valid);
    }

    #[test]
    fn without_research_standard_threshold_applies() {
        let thresholds = QualityThresholds::default();
        let none = ResearchSignal::default();
        assert!(combine(verdict(EvidenceLevel::Moderate, 0.7), &none, &thresholds).is_valid);
        assert!(!combine(verdict(EvidenceLevel::Moderate, 0.69), &none, &thresholds).is_valid);
    }

    #[test]
    fn high_quality_research_rescues_low_confidence() {
        let thresholds = QualityThresholds::default();
        let combined = combine(
            verdict(EvidenceLevel::Weak, 0.31),
            &research(0.75, 0.2),
            &thresholds,
        );
        assert!(combined.is_valid);
        assert!((combined.confidence - (0.31 + 0.3 * 0.75)).abs() < 1e-9);
        assert_eq!(combined.evidence_level, EvidenceLevel::Moderate);
        assert_eq!(combined.method, ValidationMethod::ResearchEnhanced);
    }

    #[test]
    fn very_high_quality_upgrades_to_strong() {
        let combined = combine(
            verdict(EvidenceLevel::None, 0.1),
            &research(0.9, 0.6),
            &QualityThresholds::default(),
        );
        assert_eq!(combined.evidence_level, EvidenceLevel::Strong);
    }

    #[test]
    fn confident_research_uses_research_threshold() {
        let thresholds = QualityThresholds::default();
        // quality 0.5 -> boost 0.15
        let pass = combine(
            verdict(EvidenceLevel::Moderate, 0.31),
            &research(0.5, 0.5),
            &thresholds,
        );
        assert!(pass.is_valid);
        let fail = combine(
            verdict(EvidenceLevel::Moderate, 0.29),
            &research(0.5, 0.5),
            &thresholds,
        );
        assert!(!fail.is_valid);
    }

    #[test]
    fn weak_research_falls_back_to_standard_rule() {
        let combined = combine(
            verdict(EvidenceLevel::Moderate, 0.5),
            &research(0.5, 0.35),
            &QualityThresholds::default(),
        );
        // 0.5 + 0.15 = 0.65 < 0.7
        assert!(!combined.is_valid);
    }

    #[test]
    fn confidence_never_exceeds_one() {
        let combined = combine(
            verdict(EvidenceLevel::Strong, 0.9),
            &research(1.0, 1.0),
            &QualityThresholds::default(),
        );
        assert_eq!(combined.confidence, 1.0);
    }
}
