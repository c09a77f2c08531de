//! Phrase tables for the rule-based classifiers
//!
//! Every vocabulary the classifiers consult lives here as data, so the tables
//! can be tuned from `config.toml` without touching control flow:
//! - Evidence tiers (direct observation, element references, generic hedges)
//! - Specificity terms (units, colour notation, states, alignment, hedges)
//! - Weighted research categories and citation patterns
//! - Placeholder coordinate points

use serde::{Deserialize, Serialize};
use std::fmt;

const STRONG_EVIDENCE: &[&str] = &[
    "i can see",
    "i notice",
    "i observe",
    "visible in the",
    "located at",
    "positioned at",
    "shown at",
    "appears at",
    "currently displays",
    "currently shows",
    "in the screenshot",
    "the image shows",
    "overlaps the",
    "is cut off",
    "is truncated",
];

const MODERATE_EVIDENCE: &[&str] = &[
    "the button",
    "the header",
    "the footer",
    "the navigation",
    "navigation menu",
    "the menu",
    "the form",
    "the input",
    "the headline",
    "the heading",
    "the logo",
    "the hero",
    "the sidebar",
    "the card",
    "the modal",
    "the link",
    "the icon",
    "the cta",
    "call-to-action",
    "the font",
    "top left",
    "top right",
    "bottom left",
    "bottom right",
    "above the fold",
    "below the fold",
    "left side",
    "right side",
];

const WEAK_EVIDENCE: &[&str] = &[
    "consider adding",
    "consider using",
    "consider making",
    "might want to",
    "you may want",
    "could be improved",
    "could be better",
    "it would be nice",
    "try to",
    "think about",
    "in general",
    "generally speaking",
    "should probably",
    "may help",
    "could help",
];

const UNIT_SUFFIXES: &[&str] = &["px", "rem", "em", "pt", "%", "vh", "vw", "ms", "dp"];

const COLOR_FUNCTIONS: &[&str] = &["rgb(", "rgba(", "hsl(", "hsla("];

const STATE_TERMS: &[&str] = &[
    "hover", "hovered", "focus", "focused", "active", "disabled", "pressed", "selected",
    "checked", "visited", "loading", "expanded", "collapsed",
];

const ALIGNMENT_TERMS: &[&str] = &[
    "aligned",
    "alignment",
    "misaligned",
    "centered",
    "centred",
    "left-aligned",
    "right-aligned",
    "justified",
    "padding",
    "margin",
    "spacing",
    "gutter",
    "baseline",
    "grid",
    "kerning",
    "indent",
];

const GENERIC_TERMS: &[&str] = &[
    "consider", "maybe", "perhaps", "might", "could", "possibly", "generally", "overall",
    "better", "improve", "nice", "good", "various", "things", "stuff", "should",
];

const ACADEMIC_PHRASES: &[&str] = &[
    "research shows",
    "research indicates",
    "research suggests",
    "studies show",
    "studies have shown",
    "study found",
    "peer-reviewed",
    "peer reviewed",
    "empirical",
    "published in",
    "journal of",
    "meta-analysis",
    "controlled experiment",
    "statistically significant",
];

const AUTHORITY_PHRASES: &[&str] = &[
    "experts agree",
    "expert consensus",
    "widely accepted",
    "best practices",
    "industry standard",
    "guidelines recommend",
    "wcag",
    "w3c",
    "according to",
    "recommended by",
    "fitts's law",
    "hick's law",
    "gestalt",
];

const INDUSTRY_PHRASES: &[&str] = &[
    "nielsen norman",
    "nngroup",
    "baymard",
    "forrester",
    "gartner",
    "mckinsey",
    "industry study",
    "industry report",
    "usability testing",
    "user testing",
    "eye-tracking",
    "eye tracking",
    "user research",
    "ux research",
    "a/b test",
];

const PLATFORM_PHRASES: &[&str] = &[
    "google analytics",
    "hotjar",
    "heatmap",
    "heat map",
    "session recording",
    "click tracking",
    "optimizely",
    "mixpanel",
    "amplitude",
    "fullstory",
    "lighthouse",
];

const COMPETITIVE_PHRASES: &[&str] = &[
    "competitor",
    "competitive analysis",
    "market research",
    "market trend",
    "industry trend",
    "benchmark",
    "market leaders",
    "leading brands",
    "top-performing",
];

const CITATION_PATTERNS: &[&str] = &[
    // Parenthetical year: "(Baymard, 2021)", "(2019)"
    r"\([^()]*\b(?:19|20)\d{2}\b[^()]*\)",
    // Bracketed reference numbers: "[3]", "[1, 4]", "[2-5]"
    r"\[\d+(?:\s*[,\-]\s*\d+)*\]",
    r"(?i)\baccording to\b",
    r"(?i)\bsource:",
    r"(?i)\bstudy from\b",
];

fn owned(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric()
}

/// True when `rest` does not continue the word a match ended on. A plural
/// "s"/"es" tail still counts as the same word.
fn ends_word(rest: &str) -> bool {
    let rest = rest
        .strip_prefix("es")
        .or_else(|| rest.strip_prefix('s'))
        .unwrap_or(rest);
    !rest.starts_with(is_word_char)
}

/// Count non-overlapping whole-word occurrences of `phrase` in already
/// lower-cased text. "the form" matches "the forms" but not "the format".
pub fn count_occurrences(text: &str, phrase: &str) -> usize {
    if phrase.is_empty() {
        return 0;
    }
    let bounded_start = phrase.starts_with(is_word_char);
    let bounded_end = phrase.ends_with(is_word_char);

    let mut count = 0;
    let mut from = 0;
    while let Some(offset) = text[from..].find(phrase) {
        let start = from + offset;
        let end = start + phrase.len();
        let clean_start = !bounded_start || !text[..start].ends_with(is_word_char);
        let clean_end = !bounded_end || ends_word(&text[end..]);
        if clean_start && clean_end {
            count += 1;
            from = end;
        } else {
            from = start + text[start..].chars().next().map_or(1, char::len_utf8);
        }
    }
    count
}

/// Total matches of any phrase in `phrases`.
pub fn count_phrase_hits(text: &str, phrases: &[String]) -> usize {
    phrases
        .iter()
        .map(|phrase| count_occurrences(text, phrase))
        .sum()
}

fn normalize_list(list: &mut Vec<String>) {
    for phrase in list.iter_mut() {
        *phrase = phrase.trim().to_lowercase();
    }
    list.retain(|phrase| !phrase.is_empty());
    list.dedup();
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvidenceTiers {
    pub strong: Vec<String>,
    pub moderate: Vec<String>,
    pub weak: Vec<String>,
}

impl Default for EvidenceTiers {
    fn default() -> Self {
        Self {
            strong: owned(STRONG_EVIDENCE),
            moderate: owned(MODERATE_EVIDENCE),
            weak: owned(WEAK_EVIDENCE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecificityTerms {
    /// Suffixes that turn a number into a measurement ("12px", "150%")
    pub unit_suffixes: Vec<String>,
    /// Colour function prefixes; hex codes are recognised structurally
    pub color_functions: Vec<String>,
    pub state_terms: Vec<String>,
    pub alignment_terms: Vec<String>,
    pub generic_terms: Vec<String>,
}

impl Default for SpecificityTerms {
    fn default() -> Self {
        Self {
            unit_suffixes: owned(UNIT_SUFFIXES),
            color_functions: owned(COLOR_FUNCTIONS),
            state_terms: owned(STATE_TERMS),
            alignment_terms: owned(ALIGNMENT_TERMS),
            generic_terms: owned(GENERIC_TERMS),
        }
    }
}

/// Families of research language, strongest signal first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResearchCategory {
    Academic,
    Authority,
    Industry,
    Platform,
    Competitive,
}

impl ResearchCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResearchCategory::Academic => "academic",
            ResearchCategory::Authority => "authority",
            ResearchCategory::Industry => "industry",
            ResearchCategory::Platform => "platform",
            ResearchCategory::Competitive => "competitive",
        }
    }
}

impl fmt::Display for ResearchCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchCategoryTable {
    pub category: ResearchCategory,
    pub weight: f64,
    pub phrases: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchVocabulary {
    pub categories: Vec<ResearchCategoryTable>,
    /// Regular expressions, each match counts as one citation
    pub citation_patterns: Vec<String>,
}

impl Default for ResearchVocabulary {
    fn default() -> Self {
        let table = |category, weight, phrases: &[&str]| ResearchCategoryTable {
            category,
            weight,
            phrases: owned(phrases),
        };
        Self {
            categories: vec![
                table(ResearchCategory::Academic, 1.0, ACADEMIC_PHRASES),
                table(ResearchCategory::Authority, 0.9, AUTHORITY_PHRASES),
                table(ResearchCategory::Industry, 0.8, INDUSTRY_PHRASES),
                table(ResearchCategory::Platform, 0.7, PLATFORM_PHRASES),
                table(ResearchCategory::Competitive, 0.6, COMPETITIVE_PHRASES),
            ],
            citation_patterns: owned(CITATION_PATTERNS),
        }
    }
}

/// A coordinate a lazy model tends to emit when it has no real location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspiciousPoint {
    pub label: String,
    pub x: f64,
    pub y: f64,
    pub tolerance: f64,
}

impl SuspiciousPoint {
    pub fn matches(&self, x: f64, y: f64) -> bool {
        (x - self.x).abs() <= self.tolerance && (y - self.y).abs() <= self.tolerance
    }
}

fn default_suspicious_points() -> Vec<SuspiciousPoint> {
    let point = |label: &str, x, y, tolerance| SuspiciousPoint {
        label: label.to_string(),
        x,
        y,
        tolerance,
    };
    vec![
        point("center", 50.0, 50.0, 3.0),
        point("top-left corner", 0.0, 0.0, 1.0),
        point("bottom-right corner", 100.0, 100.0, 1.0),
        point("upper quarter", 25.0, 25.0, 2.0),
        point("lower quarter", 75.0, 75.0, 2.0),
    ]
}

/// All classifier tables in one place
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vocabulary {
    pub evidence: EvidenceTiers,
    pub specificity: SpecificityTerms,
    pub research: ResearchVocabulary,
    pub suspicious_points: Vec<SuspiciousPoint>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            evidence: EvidenceTiers::default(),
            specificity: SpecificityTerms::default(),
            research: ResearchVocabulary::default(),
            suspicious_points: default_suspicious_points(),
        }
    }
}

impl Vocabulary {
    /// Lower-case and trim every phrase so matching can use plain substring search.
    pub fn normalized(mut self) -> Self {
        for list in [
            &mut self.evidence.strong,
            &mut self.evidence.moderate,
            &mut self.evidence.weak,
            &mut self.specificity.unit_suffixes,
            &mut self.specificity.color_functions,
            &mut self.specificity.state_terms,
            &mut self.specificity.alignment_terms,
            &mut self.specificity.generic_terms,
        ] {
            normalize_list(list);
        }
        for table in &mut self.research.categories {
            normalize_list(&mut table.phrases);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_occurrences_counts_each_match() {
        assert_eq!(count_occurrences("the button and the button", "the button"), 2);
        assert_eq!(count_occurrences("no match here", "the button"), 0);
        assert_eq!(count_occurrences("anything", ""), 0);
    }

    #[test]
    fn count_occurrences_matches_whole_words_only() {
        assert_eq!(count_occurrences("the format is dated", "the form"), 0);
        assert_eq!(count_occurrences("the iconography feels dated", "the icon"), 0);
        assert_eq!(count_occurrences("the linked page", "the link"), 0);
        assert_eq!(count_occurrences("the entry to checkout", "try to"), 0);
        assert_eq!(count_occurrences("the forms and the boxes", "the form"), 1);
        assert_eq!(count_occurrences("the boxes", "the box"), 1);
        assert_eq!(count_occurrences("(the form)", "the form"), 1);
        // A rejected match does not hide a later valid one
        assert_eq!(count_occurrences("the format, then the form", "the form"), 1);
        // Phrases ending in punctuation need no boundary after them
        assert_eq!(count_occurrences("source:survey", "source:"), 1);
    }

    #[test]
    fn default_research_weights_descend() {
        let vocab = ResearchVocabulary::default();
        let weights: Vec<f64> = vocab.categories.iter().map(|t| t.weight).collect();
        assert_eq!(weights, vec![1.0, 0.9, 0.8, 0.7, 0.6]);
    }

    #[test]
    fn normalized_lowercases_and_drops_blank_phrases() {
        let mut vocab = Vocabulary::default();
        vocab.evidence.strong = vec!["  I Can See ".to_string(), "   ".to_string()];
        let vocab = vocab.normalized();
        assert_eq!(vocab.evidence.strong, vec!["i can see".to_string()]);
    }

    #[test]
    fn suspicious_point_respects_tolerance() {
        let center = &default_suspicious_points()[0];
        assert!(center.matches(52.5, 48.0));
        assert!(!center.matches(54.0, 50.0));
    }

    #[test]
    fn partial_toml_override_keeps_other_tables() {
        let toml_text = r#"
[evidence]
strong = ["pixel perfect"]
"#;
        let vocab: Vocabulary = toml::from_str(toml_text).unwrap();
        assert_eq!(vocab.evidence.strong, vec!["pixel perfect".to_string()]);
        assert_eq!(vocab.evidence.weak, EvidenceTiers::default().weak);
        assert_eq!(vocab.research.categories.len(), 5);
    }
}
