//! Retry and fallback around provider clients
//!
//! One analysis call walks the primary vendor's model chain while models
//! report themselves unavailable, then tries the fallback vendor once on any
//! retryable failure. Authentication failures stop everything. Terminal
//! failures feed the shared circuit breaker.

use super::circuit::{CircuitBreaker, CircuitPermit};
use super::parse::parse_annotations;
use super::{AnalysisRequest, ProviderClient, ProviderConfig, Vendor};
use crate::annotation::Annotation;
use crate::error::{AnalysisError, FailureKind, ProviderError};
use crate::util::{sanitize_provider_message, truncate_str};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(45);
const ERROR_TAIL_CHARS: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptRole {
    Primary,
    Fallback,
}

/// Diagnostics for one network attempt
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderAttempt {
    pub vendor: Vendor,
    pub model: String,
    pub role: AttemptRole,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub outcome_kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_tail: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    pub annotations: Vec<Annotation>,
    pub vendor: Vendor,
    pub model: String,
    pub attempts: Vec<ProviderAttempt>,
    /// Set when the reply was unreadable and `annotations` holds a placeholder
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_failure: Option<String>,
}

impl AnalysisResponse {
    pub fn used_fallback(&self) -> bool {
        self.attempts
            .last()
            .is_some_and(|attempt| attempt.role == AttemptRole::Fallback)
    }
}

/// A failed analysis call with the attempts made before giving up
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct AnalysisFailure {
    pub error: AnalysisError,
    pub attempts: Vec<ProviderAttempt>,
}

pub struct ProviderOrchestrator {
    clients: HashMap<Vendor, Arc<dyn ProviderClient>>,
    circuit: Arc<CircuitBreaker>,
    attempt_timeout: Duration,
}

impl ProviderOrchestrator {
    pub fn new(circuit: Arc<CircuitBreaker>) -> Self {
        Self {
            clients: HashMap::new(),
            circuit,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }

    pub fn with_client(mut self, vendor: Vendor, client: Arc<dyn ProviderClient>) -> Self {
        self.clients.insert(vendor, client);
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn circuit(&self) -> &Arc<CircuitBreaker> {
        &self.circuit
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    async fn attempt(
        &self,
        vendor: Vendor,
        model: &str,
        role: AttemptRole,
        request: &AnalysisRequest,
        attempts: &mut Vec<ProviderAttempt>,
    ) -> Result<String, ProviderError> {
        let started_at = Utc::now();
        let start = Instant::now();
        let result = match self.clients.get(&vendor) {
            None => Err(ProviderError::NotConfigured { vendor }),
            Some(client) => {
                match tokio::time::timeout(self.attempt_timeout, client.complete(model, request))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Timeout {
                        vendor,
                        model: model.to_string(),
                        timeout_ms: self.attempt_timeout.as_millis() as u64,
                    }),
                }
            }
        };
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let (outcome_kind, error_tail) = match &result {
            Ok(_) => ("ok".to_string(), None),
            Err(err) => {
                let message = sanitize_provider_message(&err.to_string());
                (
                    err.outcome_label().to_string(),
                    Some(truncate_str(&message, ERROR_TAIL_CHARS).to_string()),
                )
            }
        };
        match &result {
            Ok(_) => tracing::debug!(%vendor, model, elapsed_ms, "Provider attempt succeeded"),
            Err(_) => tracing::warn!(
                %vendor,
                model,
                elapsed_ms,
                outcome = outcome_kind.as_str(),
                "Provider attempt failed"
            ),
        }
        attempts.push(ProviderAttempt {
            vendor,
            model: model.to_string(),
            role,
            started_at,
            elapsed_ms,
            outcome_kind,
            error_tail,
        });
        result
    }

    /// Walk the primary chain. `Err` is the failure that ends the primary phase.
    async fn call_primary(
        &self,
        request: &AnalysisRequest,
        config: &ProviderConfig,
        attempts: &mut Vec<ProviderAttempt>,
    ) -> Result<(String, String), ProviderError> {
        let vendor = config.provider;
        let mut last_err = None;
        for model in config.model_chain() {
            match self
                .attempt(vendor, &model, AttemptRole::Primary, request, attempts)
                .await
            {
                Ok(content) => return Ok((content, model)),
                Err(err) if err.kind() == FailureKind::ModelUnavailable => {
                    tracing::info!(%vendor, model = model.as_str(), "Model unavailable, trying next model");
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_err.unwrap_or(ProviderError::NotConfigured { vendor }))
    }

    /// Run one analysis call through the retry and fallback contract.
    pub async fn analyze(
        &self,
        request: &AnalysisRequest,
        config: &ProviderConfig,
    ) -> Result<AnalysisResponse, AnalysisFailure> {
        let mut attempts = Vec::new();

        match self.circuit.try_acquire() {
            Ok(CircuitPermit::Closed) => {}
            Ok(CircuitPermit::Probe) => {
                tracing::info!(provider = %config.provider, "Circuit breaker cooled down, probing provider");
            }
            Err(consecutive_failures) => {
                tracing::warn!(consecutive_failures, "Circuit breaker open, skipping provider call");
                return Err(AnalysisFailure {
                    error: AnalysisError::CircuitOpen {
                        consecutive_failures,
                    },
                    attempts,
                });
            }
        }

        let primary_err = match self.call_primary(request, config, &mut attempts).await {
            Ok((content, model)) => {
                return Ok(self.succeed(config.provider, model, &content, attempts));
            }
            Err(err) => err,
        };

        if primary_err.kind() == FailureKind::Auth {
            return Err(self.fail(AnalysisError::Provider(primary_err), attempts));
        }

        let Some(fallback) = config.effective_fallback() else {
            return Err(self.fail(AnalysisError::Provider(primary_err), attempts));
        };

        tracing::info!(
            primary = %config.provider,
            fallback = %fallback,
            error = %primary_err,
            "Primary provider failed, calling fallback"
        );
        let model = fallback.default_model();
        match self
            .attempt(fallback, model, AttemptRole::Fallback, request, &mut attempts)
            .await
        {
            Ok(content) => Ok(self.succeed(fallback, model.to_string(), &content, attempts)),
            Err(fallback_err) => Err(self.fail(
                AnalysisError::FallbackExhausted {
                    primary: Box::new(primary_err),
                    fallback: Box::new(fallback_err),
                },
                attempts,
            )),
        }
    }

    fn succeed(
        &self,
        vendor: Vendor,
        model: String,
        content: &str,
        attempts: Vec<ProviderAttempt>,
    ) -> AnalysisResponse {
        self.circuit.record_success();
        let parsed = parse_annotations(content);
        tracing::info!(
            %vendor,
            model = model.as_str(),
            annotations = parsed.annotations.len(),
            skipped = parsed.skipped,
            attempts = attempts.len(),
            "Provider analysis complete"
        );
        AnalysisResponse {
            annotations: parsed.annotations,
            vendor,
            model,
            attempts,
            parse_failure: parsed.failure,
        }
    }

    fn fail(&self, error: AnalysisError, attempts: Vec<ProviderAttempt>) -> AnalysisFailure {
        let consecutive_failures = self.circuit.record_failure();
        tracing::warn!(
            consecutive_failures,
            attempts = attempts.len(),
            error = %error,
            "Provider analysis failed"
        );
        AnalysisFailure { error, attempts }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const REPLY: &str = r#"[{"id":"a1","x":30,"y":40,"feedback":"Increase the button padding"}]"#;

    #[derive(Default)]
    struct ScriptedClient {
        replies: Mutex<VecDeque<Result<String, ProviderError>>>,
        models: Mutex<Vec<String>>,
        calls: AtomicUsize,
        delay: Option<Duration>,
    }

    impl ScriptedClient {
        fn new(replies: Vec<Result<String, ProviderError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                ..Default::default()
            })
        }

        fn slow(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                delay: Some(delay),
                ..Default::default()
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ProviderClient for ScriptedClient {
        fn complete<'a>(
            &'a self,
            model: &'a str,
            _request: &'a AnalysisRequest,
        ) -> BoxFuture<'a, Result<String, ProviderError>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                self.models.lock().unwrap().push(model.to_string());
                if let Some(delay) = self.delay {
                    tokio::time::sleep(delay).await;
                }
                let next = self.replies.lock().unwrap().pop_front();
                next.unwrap_or_else(|| Ok(REPLY.to_string()))
            })
        }
    }

    fn network(vendor: Vendor) -> ProviderError {
        ProviderError::Network {
            vendor,
            message: "connection reset".into(),
        }
    }

    fn orchestrator(
        primary: Arc<ScriptedClient>,
        fallback: Arc<ScriptedClient>,
    ) -> ProviderOrchestrator {
        ProviderOrchestrator::new(CircuitBreaker::shared(3, None))
            .with_client(Vendor::Anthropic, primary)
            .with_client(Vendor::OpenAi, fallback)
    }

    fn request() -> AnalysisRequest {
        AnalysisRequest::new(vec![0u8; 4], "review this screen")
    }

    #[tokio::test]
    async fn success_returns_parsed_annotations() {
        let primary = ScriptedClient::new(vec![]);
        let orch = orchestrator(primary.clone(), ScriptedClient::new(vec![]));
        let response = orch
            .analyze(&request(), &ProviderConfig::new(Vendor::Anthropic))
            .await
            .unwrap();
        assert_eq!(response.annotations.len(), 1);
        assert_eq!(response.annotations[0].id, "a1");
        assert_eq!(response.model, "claude-3-7-sonnet-latest");
        assert!(!response.used_fallback());
        assert_eq!(primary.calls(), 1);
    }

    #[tokio::test]
    async fn auth_failure_never_reaches_fallback() {
        let primary = ScriptedClient::new(vec![Err(ProviderError::Auth {
            vendor: Vendor::Anthropic,
            message: "invalid x-api-key".into(),
        })]);
        let fallback = ScriptedClient::new(vec![]);
        let orch = orchestrator(primary.clone(), fallback.clone());
        let config = ProviderConfig::new(Vendor::Anthropic).with_fallback(Vendor::OpenAi);

        let failure = orch.analyze(&request(), &config).await.unwrap_err();
        assert!(failure.error.is_auth());
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 0);
        assert_eq!(orch.circuit().consecutive_failures(), 1);
    }

    #[tokio::test]
    async fn network_failure_calls_fallback_exactly_once() {
        let primary = ScriptedClient::new(vec![Err(network(Vendor::Anthropic))]);
        let fallback = ScriptedClient::new(vec![]);
        let orch = orchestrator(primary.clone(), fallback.clone());
        let config = ProviderConfig::new(Vendor::Anthropic).with_fallback(Vendor::OpenAi);

        let response = orch.analyze(&request(), &config).await.unwrap();
        assert_eq!(fallback.calls(), 1);
        assert_eq!(response.vendor, Vendor::OpenAi);
        assert_eq!(response.model, "gpt-4.1");
        assert!(response.used_fallback());
        assert_eq!(orch.circuit().consecutive_failures(), 0);
    }

    #[tokio::test]
    async fn both_failures_are_aggregated() {
        let primary = ScriptedClient::new(vec![Err(network(Vendor::Anthropic))]);
        let fallback = ScriptedClient::new(vec![Err(ProviderError::RateLimited {
            vendor: Vendor::OpenAi,
            message: "slow down".into(),
        })]);
        let orch = orchestrator(primary, fallback.clone());
        let config = ProviderConfig::new(Vendor::Anthropic).with_fallback(Vendor::OpenAi);

        let failure = orch.analyze(&request(), &config).await.unwrap_err();
        assert!(matches!(
            failure.error,
            AnalysisError::FallbackExhausted { .. }
        ));
        assert_eq!(failure.attempts.len(), 2);
        assert_eq!(fallback.calls(), 1);
    }

    #[tokio::test]
    async fn no_fallback_surfaces_original_error() {
        let primary = ScriptedClient::new(vec![Err(network(Vendor::Anthropic))]);
        let orch = orchestrator(primary, ScriptedClient::new(vec![]));
        let failure = orch
            .analyze(&request(), &ProviderConfig::new(Vendor::Anthropic))
            .await
            .unwrap_err();
        assert_eq!(
            failure.error,
            AnalysisError::Provider(network(Vendor::Anthropic))
        );
    }

    #[tokio::test]
    async fn unavailable_model_advances_within_vendor() {
        let primary = ScriptedClient::new(vec![Err(ProviderError::ModelUnavailable {
            vendor: Vendor::Anthropic,
            model: "claude-3-7-sonnet-latest".into(),
            message: "overloaded".into(),
        })]);
        let fallback = ScriptedClient::new(vec![]);
        let orch = orchestrator(primary.clone(), fallback.clone());
        let config = ProviderConfig::new(Vendor::Anthropic).with_fallback(Vendor::OpenAi);

        let response = orch.analyze(&request(), &config).await.unwrap();
        assert_eq!(response.model, "claude-3-5-sonnet-latest");
        assert_eq!(
            *primary.models.lock().unwrap(),
            vec!["claude-3-7-sonnet-latest", "claude-3-5-sonnet-latest"]
        );
        assert_eq!(fallback.calls(), 0);
    }

    #[tokio::test]
    async fn exhausted_model_chain_falls_through_to_vendor_fallback() {
        let unavailable = |model: &str| -> Result<String, ProviderError> {
            Err(ProviderError::ModelUnavailable {
                vendor: Vendor::Anthropic,
                model: model.into(),
                message: "gone".into(),
            })
        };
        let primary = ScriptedClient::new(
            Vendor::Anthropic
                .models()
                .iter()
                .map(|m| unavailable(*m))
                .collect(),
        );
        let fallback = ScriptedClient::new(vec![]);
        let orch = orchestrator(primary.clone(), fallback.clone());
        let config = ProviderConfig::new(Vendor::Anthropic).with_fallback(Vendor::OpenAi);

        let response = orch.analyze(&request(), &config).await.unwrap();
        assert_eq!(primary.calls(), 3);
        assert_eq!(fallback.calls(), 1);
        assert_eq!(response.vendor, Vendor::OpenAi);
    }

    #[tokio::test]
    async fn open_circuit_short_circuits_without_calls() {
        let primary = ScriptedClient::new((0..3).map(|_| Err(network(Vendor::Anthropic))).collect());
        let orch = orchestrator(primary.clone(), ScriptedClient::new(vec![]));
        let config = ProviderConfig::new(Vendor::Anthropic);

        for _ in 0..3 {
            assert!(orch.analyze(&request(), &config).await.is_err());
        }
        assert_eq!(primary.calls(), 3);

        let failure = orch.analyze(&request(), &config).await.unwrap_err();
        assert_eq!(
            failure.error,
            AnalysisError::CircuitOpen {
                consecutive_failures: 3
            }
        );
        assert!(failure.attempts.is_empty());
        assert_eq!(primary.calls(), 3);

        orch.circuit().reset();
        assert!(orch.analyze(&request(), &config).await.is_ok());
    }

    #[tokio::test]
    async fn timeout_is_retryable() {
        let primary = ScriptedClient::slow(Duration::from_secs(5));
        let fallback = ScriptedClient::new(vec![]);
        let orch = orchestrator(primary, fallback.clone())
            .with_attempt_timeout(Duration::from_millis(20));
        let config = ProviderConfig::new(Vendor::Anthropic).with_fallback(Vendor::OpenAi);

        let response = orch.analyze(&request(), &config).await.unwrap();
        assert_eq!(fallback.calls(), 1);
        assert_eq!(response.attempts[0].outcome_kind, "timeout");
    }

    #[tokio::test]
    async fn unreadable_reply_yields_placeholder_and_counts_as_success() {
        let primary = ScriptedClient::new(vec![Ok("Sorry, I cannot help with that.".into())]);
        let orch = orchestrator(primary, ScriptedClient::new(vec![]));
        orch.circuit().record_failure();

        let response = orch
            .analyze(&request(), &ProviderConfig::new(Vendor::Anthropic))
            .await
            .unwrap();
        assert!(response.parse_failure.is_some());
        assert_eq!(response.annotations.len(), 1);
        assert!(response.annotations[0].id.starts_with("parse-failure-"));
        assert_eq!(orch.circuit().consecutive_failures(), 0);
    }

    #[tokio::test]
    async fn missing_client_is_retryable() {
        let fallback = ScriptedClient::new(vec![]);
        let orch = ProviderOrchestrator::new(CircuitBreaker::shared(3, None))
            .with_client(Vendor::OpenAi, fallback.clone());
        let config = ProviderConfig::new(Vendor::Google).with_fallback(Vendor::OpenAi);

        let response = orch.analyze(&request(), &config).await.unwrap();
        assert_eq!(response.attempts[0].outcome_kind, "not_configured");
        assert_eq!(fallback.calls(), 1);
    }
}
