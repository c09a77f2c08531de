//! Research and citation detection
//!
//! Feedback that leans on studies, expert consensus or analytics data is
//! treated as much harder to reject than generic advice. This module scores
//! how strongly a piece of text is backed by such sources.

use crate::vocabulary::{count_occurrences, ResearchCategory, ResearchCategoryTable, ResearchVocabulary};
use regex::Regex;
use std::collections::BTreeMap;

const DISTINCT_CATEGORY_BONUS: f64 = 0.05;
const PER_INDICATOR_CONFIDENCE: f64 = 0.15;
const MAX_INDICATOR_CONFIDENCE: f64 = 0.8;
const AUTHORITATIVE_HIT_CONFIDENCE: f64 = 0.1;
const MAX_LENGTH_CONFIDENCE: f64 = 0.1;
const LENGTH_CONFIDENCE_DIVISOR: f64 = 1000.0;
const MULTI_CATEGORY_CONFIDENCE: f64 = 0.1;
const HAS_RESEARCH_CONFIDENCE: f64 = 0.3;

/// What the detector found in one annotation's text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResearchSignal {
    pub has_research: bool,
    pub research_confidence: f64,
    pub quality_score: f64,
    pub indicators: Vec<String>,
    pub citation_count: usize,
    pub category_hits: BTreeMap<ResearchCategory, usize>,
}

impl ResearchSignal {
    pub fn indicator_count(&self) -> usize {
        self.category_hits.values().sum()
    }

    pub fn distinct_categories(&self) -> usize {
        self.category_hits.len()
    }

    pub fn describe(&self) -> String {
        if !self.has_research {
            return "No research indicators".to_string();
        }
        let categories: Vec<String> = self
            .category_hits
            .iter()
            .map(|(category, hits)| format!("{}x{}", category, hits))
            .collect();
        format!(
            "Research indicators [{}], quality {:.2}, confidence {:.2}, {} citation(s)",
            categories.join(", "),
            self.quality_score,
            self.research_confidence,
            self.citation_count
        )
    }
}

/// Weighted keyword scanner with compiled citation patterns
#[derive(Debug, Clone)]
pub struct ResearchDetector {
    categories: Vec<ResearchCategoryTable>,
    citation_patterns: Vec<Regex>,
}

impl ResearchDetector {
    pub fn new(vocabulary: &ResearchVocabulary) -> Result<Self, regex::Error> {
        let citation_patterns = vocabulary
            .citation_patterns
            .iter()
            .map(|pattern| Regex::new(pattern))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            categories: vocabulary.categories.clone(),
            citation_patterns,
        })
    }

    fn weight_of(&self, category: ResearchCategory) -> f64 {
        self.categories
            .iter()
            .find(|table| table.category == category)
            .map(|table| table.weight)
            .unwrap_or(0.0)
    }

    pub fn count_citations(&self, text: &str) -> usize {
        self.citation_patterns
            .iter()
            .map(|pattern| pattern.find_iter(text).count())
            .sum()
    }

    /// Scan lower-cased text for research language.
    pub fn detect(&self, text: &str) -> ResearchSignal {
        let mut category_hits: BTreeMap<ResearchCategory, usize> = BTreeMap::new();
        let mut indicators: Vec<String> = Vec::new();

        for table in &self.categories {
            for phrase in &table.phrases {
                let hits = count_occurrences(text, phrase);
                if hits == 0 {
                    continue;
                }
                *category_hits.entry(table.category).or_default() += hits;
                if !indicators.iter().any(|existing| existing == phrase) {
                    indicators.push(phrase.clone());
                }
            }
        }

        let indicator_count: usize = category_hits.values().sum();
        let distinct = category_hits.len();

        let quality_score = if indicator_count == 0 {
            0.0
        } else {
            let weighted: f64 = category_hits
                .iter()
                .map(|(category, hits)| self.weight_of(*category) * *hits as f64)
                .sum();
            (weighted / indicator_count as f64 + DISTINCT_CATEGORY_BONUS * distinct as f64)
                .min(1.0)
        };

        let authoritative_hits = category_hits
            .iter()
            .filter(|(category, _)| {
                matches!(
                    category,
                    ResearchCategory::Academic | ResearchCategory::Authority
                )
            })
            .map(|(_, hits)| *hits)
            .sum::<usize>();
        let length_bonus =
            (text.chars().count() as f64 / LENGTH_CONFIDENCE_DIVISOR).min(MAX_LENGTH_CONFIDENCE);
        let multi_category_bonus = if distinct >= 2 {
            MULTI_CATEGORY_CONFIDENCE
        } else {
            0.0
        };
        let research_confidence = ((PER_INDICATOR_CONFIDENCE * indicator_count as f64)
            .min(MAX_INDICATOR_CONFIDENCE)
            + AUTHORITATIVE_HIT_CONFIDENCE * authoritative_hits as f64
            + length_bonus
            + multi_category_bonus)
            .min(1.0);

        ResearchSignal {
            has_research: indicator_count > 0 || research_confidence > HAS_RESEARCH_CONFIDENCE,
            research_confidence,
            quality_score,
            indicators,
            citation_count: self.count_citations(text),
            category_hits,
        }
    }
}
