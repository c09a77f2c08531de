//! Coordinate sanity checks
//!
//! Returns a verdict only. Out-of-range coordinates are reported, never
//! snapped back into the image.

use super::Verdict;
use crate::annotation::{EvidenceLevel, ValidationIssue, ValidationMethod};
use crate::vocabulary::SuspiciousPoint;

const MIN_COORD: f64 = 0.0;
const MAX_COORD: f64 = 100.0;

const SUSPICIOUS_CONFIDENCE: f64 = 0.3;
const PLAUSIBLE_CONFIDENCE: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateStatus {
    OutOfRange,
    Suspicious,
    Plausible,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateCheck {
    pub status: CoordinateStatus,
    pub verdict: Verdict,
    pub issues: Vec<ValidationIssue>,
}

fn range_violation(axis: char, value: f64) -> Option<(String, ValidationIssue)> {
    if (MIN_COORD..=MAX_COORD).contains(&value) {
        return None;
    }
    let reason = if value.is_nan() {
        format!("{} is not a number", axis)
    } else if value < MIN_COORD {
        format!("{}={} is below the minimum of {}", axis, value, MIN_COORD)
    } else {
        format!("{}={} exceeds the maximum of {}", axis, value, MAX_COORD)
    };
    Some((reason, ValidationIssue::CoordinateOutOfRange { axis, value }))
}

/// Check `(x, y)` against the image bounds, then against known placeholder points.
pub fn check_coordinates(x: f64, y: f64, suspicious_points: &[SuspiciousPoint]) -> CoordinateCheck {
    let violations: Vec<_> = [('x', x), ('y', y)]
        .into_iter()
        .filter_map(|(axis, value)| range_violation(axis, value))
        .collect();

    if !violations.is_empty() {
        let reasons: Vec<&str> = violations.iter().map(|(r, _)| r.as_str()).collect();
        return CoordinateCheck {
            status: CoordinateStatus::OutOfRange,
            verdict: Verdict {
                is_valid: false,
                evidence_level: EvidenceLevel::None,
                confidence: 0.0,
                reasoning: format!("Coordinates out of range: {}", reasons.join("; ")),
                method: ValidationMethod::CoordinateRange,
            },
            issues: violations.into_iter().map(|(_, issue)| issue).collect(),
        };
    }

    if let Some(point) = suspicious_points.iter().find(|p| p.matches(x, y)) {
        return CoordinateCheck {
            status: CoordinateStatus::Suspicious,
            verdict: Verdict {
                is_valid: false,
                evidence_level: EvidenceLevel::Weak,
                confidence: SUSPICIOUS_CONFIDENCE,
                reasoning: format!(
                    "Coordinates ({}, {}) sit on the {} point, likely a placeholder",
                    x, y, point.label
                ),
                method: ValidationMethod::CoordinatePattern,
            },
            issues: vec![ValidationIssue::SuspiciousCoordinatePattern {
                label: point.label.clone(),
            }],
        };
    }

    CoordinateCheck {
        status: CoordinateStatus::Plausible,
        verdict: Verdict {
            is_valid: true,
            evidence_level: EvidenceLevel::Moderate,
            confidence: PLAUSIBLE_CONFIDENCE,
            reasoning: format!("Coordinates ({}, {}) are within range", x, y),
            method: ValidationMethod::CoordinateRange,
        },
        issues: Vec::new(),
    }
}
