use annotation_quality::annotation::{Annotation, EvidenceLevel, ValidationResult};
use annotation_quality::error::ProviderError;
use annotation_quality::filter::{FilterEngine, FilterItem};
use annotation_quality::pipeline::{ProcessingConfig, ProcessingOrchestrator};
use annotation_quality::provider::{
    AnalysisRequest, CircuitBreaker, ProviderClient, ProviderConfig, ProviderOrchestrator, Vendor,
};
use annotation_quality::validate::evidence::classify_evidence;
use annotation_quality::validate::QualityThresholds;
use annotation_quality::vocabulary::EvidenceTiers;
use annotation_quality::Vocabulary;
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn pipeline() -> ProcessingOrchestrator {
    ProcessingOrchestrator::new(ProcessingConfig::default(), Vocabulary::default()).unwrap()
}

#[test]
fn out_of_range_coordinates_are_invalid_and_never_corrected() {
    let coords = [
        (-0.5, 20.0),
        (100.01, 20.0),
        (20.0, -30.0),
        (20.0, 250.0),
        (f64::NAN, 10.0),
        (f64::INFINITY, 10.0),
    ];
    let batch: Vec<Annotation> = coords
        .iter()
        .enumerate()
        .map(|(i, (x, y))| {
            Annotation::new(format!("a{i}"), *x, *y).with_feedback(
                "Research shows, according to Nielsen Norman usability testing (2020), I can see the CTA is cut off",
            )
        })
        .collect();

    let result = pipeline().process(batch.clone());
    for verdict in &result.validation_results {
        assert!(!verdict.is_valid);
        assert_eq!(verdict.confidence, 0.0);
    }
    assert!(result.processed_annotations.is_empty());
    for annotation in &result.filtered_annotations {
        let original = batch.iter().find(|a| a.id == annotation.id).unwrap();
        assert_eq!(annotation.x.to_bits(), original.x.to_bits());
        assert_eq!(annotation.y.to_bits(), original.y.to_bits());
    }
}

#[test]
fn any_strong_phrase_yields_strong_evidence() {
    let tiers = EvidenceTiers::default();
    for phrase in &tiers.strong {
        let text = format!("consider adding a banner; {} near the top", phrase);
        let verdict = classify_evidence(&text, &tiers);
        assert_eq!(verdict.evidence_level, EvidenceLevel::Strong, "{phrase}");
        assert!(verdict.confidence >= 0.9, "{phrase}");
    }
}

#[test]
fn high_quality_research_survives_low_confidence() {
    let engine = FilterEngine::new(QualityThresholds::default(), 3);
    let item = FilterItem {
        index: 0,
        annotation: Annotation::new("r", 40.0, 40.0),
        result: ValidationResult {
            confidence: 0.31,
            has_research: true,
            research_quality_score: 0.75,
            ..Default::default()
        },
    };
    let outcome = engine.filter(vec![item]);
    assert_eq!(outcome.valid.len(), 1);
    assert_eq!(outcome.research_preserved.len(), 1);
}

#[test]
fn restoration_caps_filtered_count() {
    for max_invalid in 0..5 {
        for batch_size in 0..12 {
            let engine = FilterEngine::new(QualityThresholds::default(), max_invalid);
            let items = (0..batch_size)
                .map(|i| FilterItem {
                    index: i,
                    annotation: Annotation::new(format!("a{i}"), 10.0, 10.0),
                    result: ValidationResult {
                        confidence: 0.05 + (i % 6) as f64 * 0.1,
                        ..Default::default()
                    },
                })
                .collect();
            let outcome = engine.filter(items);
            assert!(
                outcome.filtered.len() <= max_invalid,
                "max {max_invalid}, batch {batch_size}: {} filtered",
                outcome.filtered.len()
            );
            assert_eq!(outcome.valid.len() + outcome.filtered.len(), batch_size);
            let order: Vec<usize> = outcome.valid.iter().map(|item| item.index).collect();
            let mut sorted = order.clone();
            sorted.sort_unstable();
            assert_eq!(order, sorted);
        }
    }
}

#[test]
fn processing_is_idempotent() {
    let batch = vec![
        Annotation::new("a", 50.0, 50.0).with_feedback("Consider adding a button"),
        Annotation::new("b", 12.0, 88.0).with_feedback("The footer link is 10px and hard to tap"),
        Annotation::new("c", 64.0, 20.0)
            .with_feedback("According to WCAG guidelines the contrast ratio of the heading is too low"),
    ];
    let orchestrator = pipeline();
    let first = orchestrator.process(batch.clone());
    let second = orchestrator.process(batch);
    assert_eq!(first.validation_results.len(), second.validation_results.len());
    for (a, b) in first.validation_results.iter().zip(&second.validation_results) {
        assert_eq!(a.confidence, b.confidence);
        assert_eq!(a.is_valid, b.is_valid);
    }
}

#[test]
fn placeholder_coordinates_with_generic_text_are_filtered() {
    let result = pipeline().process(vec![
        Annotation::new("generic", 50.0, 50.0).with_feedback("Consider adding a button")
    ]);
    let verdict = &result.validation_results[0];
    assert!(verdict.confidence <= 0.3);
    assert!(!verdict.is_valid);
    assert_eq!(result.filtered_annotations.len(), 1);
    assert!(result.processed_annotations.is_empty());
}

#[test]
fn research_backed_feedback_is_preserved() {
    let result = pipeline().process(vec![Annotation::new("research", 30.0, 62.0).with_feedback(
        "Research shows the navigation menu at this position increases engagement (Industry Study, 2022)",
    )]);
    let verdict = &result.validation_results[0];
    assert!(verdict.is_valid);
    assert!(verdict.has_research);
    assert!(verdict.confidence > 0.45);
    assert_eq!(result.research_preserved.len(), 1);
    assert_eq!(result.research_preserved[0].id, "research");
}

struct CountingClient {
    calls: AtomicUsize,
    reply: Result<String, ProviderError>,
}

impl CountingClient {
    fn new(reply: Result<String, ProviderError>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            reply,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ProviderClient for CountingClient {
    fn complete<'a>(
        &'a self,
        _model: &'a str,
        _request: &'a AnalysisRequest,
    ) -> BoxFuture<'a, Result<String, ProviderError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.reply.clone();
        Box::pin(async move { reply })
    }
}

#[tokio::test]
async fn auth_failure_never_calls_fallback() {
    let primary = CountingClient::new(Err(ProviderError::Auth {
        vendor: Vendor::OpenAi,
        message: "invalid key".into(),
    }));
    let fallback = CountingClient::new(Ok("[]".into()));
    let orchestrator = ProviderOrchestrator::new(CircuitBreaker::shared(3, None))
        .with_client(Vendor::OpenAi, primary.clone())
        .with_client(Vendor::Google, fallback.clone());
    let config = ProviderConfig::new(Vendor::OpenAi).with_fallback(Vendor::Google);

    let failure = orchestrator
        .analyze(&AnalysisRequest::default(), &config)
        .await
        .unwrap_err();
    assert!(failure.error.is_auth());
    assert_eq!(primary.calls(), 1);
    assert_eq!(fallback.calls(), 0);
}

#[tokio::test]
async fn network_failure_calls_fallback_once_and_keeps_breaker_closed() {
    let primary = CountingClient::new(Err(ProviderError::Network {
        vendor: Vendor::OpenAi,
        message: "connection refused".into(),
    }));
    let fallback = CountingClient::new(Ok(r#"[{"id":"f","x":10,"y":10}]"#.into()));
    let breaker = CircuitBreaker::shared(3, None);
    let orchestrator = ProviderOrchestrator::new(Arc::clone(&breaker))
        .with_client(Vendor::OpenAi, primary.clone())
        .with_client(Vendor::Google, fallback.clone());
    let config = ProviderConfig::new(Vendor::OpenAi).with_fallback(Vendor::Google);

    let response = orchestrator
        .analyze(&AnalysisRequest::default(), &config)
        .await
        .unwrap();
    assert_eq!(response.annotations.len(), 1);
    assert_eq!(primary.calls(), 1);
    assert_eq!(fallback.calls(), 1);
    assert_eq!(breaker.consecutive_failures(), 0);
}
