//! Content specificity analysis
//!
//! A second evidence signal based on term density: measurements, colour
//! values, interaction states and alignment vocabulary count as specific;
//! hedge words count as generic.

use super::Verdict;
use crate::annotation::{EvidenceLevel, ValidationMethod};
use crate::vocabulary::SpecificityTerms;

const MIN_WORDS: usize = 3;
const MAX_GENERICITY: f64 = 0.3;
const STRONG_SPECIFICITY: f64 = 0.2;
const MODERATE_SPECIFICITY: f64 = 0.1;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpecificityStats {
    pub word_count: usize,
    pub specific_count: usize,
    pub generic_count: usize,
    pub specificity_ratio: f64,
    pub genericity_ratio: f64,
}

fn trim_token(raw: &str) -> &str {
    raw.trim_matches(|c: char| matches!(c, ',' | '.' | ';' | ':' | '!' | '?' | '"' | '\'' | ')'))
}

fn is_hex_color(token: &str) -> bool {
    token
        .strip_prefix('#')
        .is_some_and(|hex| matches!(hex.len(), 3 | 4 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

fn is_measurement(token: &str, unit_suffixes: &[String]) -> bool {
    unit_suffixes.iter().any(|suffix| {
        token
            .strip_suffix(suffix.as_str())
            .is_some_and(|number| !number.is_empty() && number.parse::<f64>().is_ok())
    })
}

fn is_specific(token: &str, terms: &SpecificityTerms) -> bool {
    is_hex_color(token)
        || is_measurement(token, &terms.unit_suffixes)
        || terms.color_functions.iter().any(|f| token.starts_with(f.as_str()))
        || terms.state_terms.iter().any(|t| t == token)
        || terms.alignment_terms.iter().any(|t| t == token)
}

/// Token statistics for lower-cased text.
pub fn specificity_stats(text: &str, terms: &SpecificityTerms) -> SpecificityStats {
    let tokens: Vec<&str> = text
        .split_whitespace()
        .map(trim_token)
        .filter(|t| !t.is_empty())
        .collect();
    let word_count = tokens.len();
    let specific_count = tokens.iter().filter(|t| is_specific(t, terms)).count();
    let generic_count = tokens
        .iter()
        .filter(|t| terms.generic_terms.iter().any(|g| g == *t))
        .count();

    let ratio = |count: usize| {
        if word_count == 0 {
            0.0
        } else {
            count as f64 / word_count as f64
        }
    };

    SpecificityStats {
        word_count,
        specific_count,
        generic_count,
        specificity_ratio: ratio(specific_count),
        genericity_ratio: ratio(generic_count),
    }
}

/// Decision table over the specificity statistics.
pub fn analyze_specificity(text: &str, terms: &SpecificityTerms) -> (Verdict, SpecificityStats) {
    let stats = specificity_stats(text, terms);
    let (evidence_level, confidence, summary) = if stats.word_count < MIN_WORDS {
        (EvidenceLevel::Weak, 0.2, "too short to be specific")
    } else if stats.genericity_ratio > MAX_GENERICITY {
        (EvidenceLevel::Weak, 0.3, "dominated by generic wording")
    } else if stats.specificity_ratio > STRONG_SPECIFICITY {
        (EvidenceLevel::Strong, 0.8, "dense with specific detail")
    } else if stats.specificity_ratio > MODERATE_SPECIFICITY {
        (EvidenceLevel::Moderate, 0.6, "some specific detail")
    } else {
        (EvidenceLevel::Moderate, 0.5, "neutral wording")
    };

    let verdict = Verdict {
        is_valid: evidence_level.is_substantive(),
        evidence_level,
        confidence,
        reasoning: format!(
            "Content {} ({} words, specificity {:.2}, genericity {:.2})",
            summary, stats.word_count, stats.specificity_ratio, stats.genericity_ratio
        ),
        method: ValidationMethod::ContentSpecificity,
    };
    (verdict, stats)
}
