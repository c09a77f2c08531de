//! Batch filtering
//!
//! Splits validated annotations into kept and filtered sets using two
//! thresholds: a standard one and a more lenient one for research-backed
//! feedback. An over-filtering guard caps how many annotations a batch may
//! lose by restoring the best-ranked rejects.

use crate::annotation::{Annotation, ValidationResult};
use crate::validate::QualityThresholds;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_MAX_INVALID_ANNOTATIONS: usize = 3;

/// An annotation travelling through the filter with its verdict and input position
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterItem {
    pub index: usize,
    pub annotation: Annotation,
    pub result: ValidationResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterPath {
    Standard,
    Research,
    HighQualityResearch,
    Terminal,
}

impl FilterPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterPath::Standard => "standard",
            FilterPath::Research => "research",
            FilterPath::HighQualityResearch => "high-quality research",
            FilterPath::Terminal => "terminal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterDecision {
    pub keep: bool,
    pub path: FilterPath,
    pub threshold: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterOutcome {
    pub valid: Vec<FilterItem>,
    pub filtered: Vec<FilterItem>,
    /// Research-backed annotations that passed on their own merit
    pub research_preserved: Vec<FilterItem>,
    pub restored_ids: Vec<String>,
    /// Decision text keyed by input index
    pub reasons: BTreeMap<usize, String>,
}

impl FilterOutcome {
    /// `(index, id, reason)` for every annotation, in input order.
    pub fn reasons_in_order(&self) -> Vec<(usize, &str, &str)> {
        let ids: BTreeMap<usize, &str> = self
            .valid
            .iter()
            .chain(&self.filtered)
            .map(|item| (item.index, item.annotation.id.as_str()))
            .collect();
        self.reasons
            .iter()
            .filter_map(|(index, reason)| {
                ids.get(index)
                    .map(|id| (*index, *id, reason.as_str()))
            })
            .collect()
    }

    /// Reasons keyed by annotation id. A repeated id keeps its first entry
    /// under the bare id; later ones are keyed `"{id}#{index}"`.
    pub fn filter_reasons(&self) -> BTreeMap<String, String> {
        let mut reasons = BTreeMap::new();
        for (index, id, reason) in self.reasons_in_order() {
            let key = if reasons.contains_key(id) {
                format!("{}#{}", id, index)
            } else {
                id.to_string()
            };
            reasons.insert(key, reason.to_string());
        }
        reasons
    }
}

#[derive(Debug, Clone)]
pub struct FilterEngine {
    thresholds: QualityThresholds,
    max_invalid_annotations: usize,
}

impl FilterEngine {
    pub fn new(thresholds: QualityThresholds, max_invalid_annotations: usize) -> Self {
        Self {
            thresholds,
            max_invalid_annotations,
        }
    }

    /// Which threshold applies to a verdict and whether it clears it.
    pub fn decide(&self, result: &ValidationResult) -> FilterDecision {
        if result.is_terminal() {
            return FilterDecision {
                keep: false,
                path: FilterPath::Terminal,
                threshold: 1.0,
            };
        }
        if !result.has_research {
            let threshold = self.thresholds.standard_threshold;
            return FilterDecision {
                keep: result.confidence >= threshold,
                path: FilterPath::Standard,
                threshold,
            };
        }
        let (path, threshold) =
            if result.research_quality_score > self.thresholds.high_quality_research_score {
                (
                    FilterPath::HighQualityResearch,
                    self.thresholds.high_quality_research_threshold,
                )
            } else {
                (FilterPath::Research, self.thresholds.research_threshold)
            };
        FilterDecision {
            keep: result.confidence > threshold,
            path,
            threshold,
        }
    }

    /// Partition a validated batch. Kept annotations stay in input order.
    pub fn filter(&self, items: Vec<FilterItem>) -> FilterOutcome {
        let mut outcome = FilterOutcome::default();

        for item in items {
            let decision = self.decide(&item.result);
            let verb = if decision.keep { "kept" } else { "filtered" };
            let reason = match decision.path {
                FilterPath::Terminal => format!("filtered: {}", item.result.reasoning),
                path => format!(
                    "{}: confidence {:.2} vs {} threshold {:.2}",
                    verb,
                    item.result.confidence,
                    path.as_str(),
                    decision.threshold
                ),
            };
            outcome.reasons.insert(item.index, reason);

            if decision.keep {
                if item.result.has_research {
                    outcome.research_preserved.push(item.clone());
                }
                outcome.valid.push(item);
            } else {
                outcome.filtered.push(item);
            }
        }

        self.restore_overfiltered(&mut outcome);
        outcome
    }

    /// Move the best rejects back when more than `max_invalid_annotations` were dropped.
    fn restore_overfiltered(&self, outcome: &mut FilterOutcome) {
        let excess = outcome
            .filtered
            .len()
            .saturating_sub(self.max_invalid_annotations);
        if excess == 0 {
            return;
        }

        // Terminal verdicts carry zero confidence and are never eligible.
        let mut ranked: Vec<usize> = (0..outcome.filtered.len())
            .filter(|&i| outcome.filtered[i].result.confidence > 0.0)
            .collect();
        ranked.sort_by(|&a, &b| {
            let (a, b) = (&outcome.filtered[a], &outcome.filtered[b]);
            b.result
                .confidence
                .total_cmp(&a.result.confidence)
                .then(a.index.cmp(&b.index))
        });
        ranked.truncate(excess);
        if ranked.is_empty() {
            return;
        }

        let filtered = std::mem::take(&mut outcome.filtered);
        for (pos, item) in filtered.into_iter().enumerate() {
            if ranked.contains(&pos) {
                outcome.reasons.insert(
                    item.index,
                    format!(
                        "restored: confidence {:.2} ranked among the best {} rejects",
                        item.result.confidence, excess
                    ),
                );
                outcome.restored_ids.push(item.annotation.id.clone());
                outcome.valid.push(item);
            } else {
                outcome.filtered.push(item);
            }
        }
        outcome.valid.sort_by_key(|item| item.index);

        tracing::info!(
            restored = outcome.restored_ids.len(),
            still_filtered = outcome.filtered.len(),
            max_invalid = self.max_invalid_annotations,
            "Over-filtering protection restored annotations"
        );
    }
}
