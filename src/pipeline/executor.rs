//! Single-step execution with timeout and retry.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use super::context::StepContext;
use crate::config::RequestConfig;
use crate::error::CapabilityError;
use crate::model::{ResearchStep, StepResult, DEFAULT_CONFIDENCE};
use crate::research::{AnswerWithSources, ResearchCapability};

/// Retry policy for transient capability failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl RetryPolicy {
    /// Backoff before retry number `retry` (1-based): `delay * 2^(retry-1)`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2_u64.saturating_pow(retry.saturating_sub(1));
        Duration::from_millis(self.retry_delay_ms.saturating_mul(factor))
    }
}

impl From<&RequestConfig> for RetryPolicy {
    fn from(config: &RequestConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_delay_ms: config.retry_delay_ms,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        (&RequestConfig::default()).into()
    }
}

/// Runs one research step against the capability.
///
/// Never returns an error: every outcome becomes a [`StepResult`].
#[derive(Clone)]
pub struct StepExecutor {
    capability: Arc<dyn ResearchCapability>,
    retry: RetryPolicy,
}

impl StepExecutor {
    pub fn new(capability: Arc<dyn ResearchCapability>, retry: RetryPolicy) -> Self {
        Self { capability, retry }
    }

    /// Execute a step. Transient failures are retried with backoff; permanent
    /// ones fail immediately with the raw diagnostic kept as the error.
    pub async fn execute(&self, step: &ResearchStep, context: &StepContext) -> StepResult {
        let start = Instant::now();
        let (outcome, attempts) = self.ask_with_retry(step, context).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(answer) => {
                info!(
                    step_id = %step.step_id,
                    attempts,
                    duration_ms,
                    sources = answer.sources.len(),
                    "Research step completed"
                );
                build_completed(step, context, answer).with_timing(duration_ms, attempts)
            }
            Err(e) => {
                error!(
                    step_id = %step.step_id,
                    error = %e,
                    attempts,
                    duration_ms,
                    "Research step failed"
                );
                StepResult::failed(&step.step_id, &context.question, e.to_string())
                    .with_timing(duration_ms, attempts)
            }
        }
    }

    async fn ask_with_retry(
        &self,
        step: &ResearchStep,
        context: &StepContext,
    ) -> (Result<AnswerWithSources, CapabilityError>, u32) {
        let mut attempts = 0;

        loop {
            if attempts > 0 {
                let delay = self.retry.delay_for(attempts);
                warn!(
                    step_id = %step.step_id,
                    retry = attempts,
                    delay_ms = delay.as_millis(),
                    "Retrying research step"
                );
                tokio::time::sleep(delay).await;
            }
            attempts += 1;

            // The capability is told the budget, but a misbehaving one is
            // still cut off here.
            let call = self
                .capability
                .ask(&context.question, &context.background, context.timeout);
            let result = match tokio::time::timeout(context.timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(CapabilityError::Timeout {
                    timeout_ms: context.timeout.as_millis() as u64,
                }),
            };

            match result {
                Ok(answer) => return (Ok(answer), attempts),
                Err(e) if e.is_transient() && attempts <= self.retry.max_retries => {
                    warn!(
                        step_id = %step.step_id,
                        error = %e,
                        attempt = attempts,
                        "Transient capability failure"
                    );
                }
                Err(e) => return (Err(e), attempts),
            }
        }
    }
}

fn build_completed(
    step: &ResearchStep,
    context: &StepContext,
    answer: AnswerWithSources,
) -> StepResult {
    let confidence = answer.confidence.unwrap_or(DEFAULT_CONFIDENCE);
    let answer_is_empty = answer.answer.trim().is_empty();
    let result = StepResult::completed(
        &step.step_id,
        &context.question,
        answer.answer,
        confidence,
        answer.sources,
    );

    if answer_is_empty {
        result.with_validation(
            "empty_answer",
            Some("capability returned an empty answer".to_string()),
        )
    } else if answer.confidence.is_none() {
        result.with_validation(
            "unverified",
            Some(format!(
                "confidence not reported; defaulted to {}",
                DEFAULT_CONFIDENCE
            )),
        )
    } else {
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConfidenceLevel, StepStatus};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replays a fixed sequence of outcomes, one per call.
    struct Scripted {
        outcomes: Mutex<Vec<Result<AnswerWithSources, CapabilityError>>>,
        calls: Mutex<u32>,
    }

    impl Scripted {
        fn new(mut outcomes: Vec<Result<AnswerWithSources, CapabilityError>>) -> Arc<Self> {
            outcomes.reverse();
            Arc::new(Self {
                outcomes: Mutex::new(outcomes),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl ResearchCapability for Scripted {
        async fn ask(
            &self,
            _question: &str,
            _context: &str,
            _timeout: Duration,
        ) -> Result<AnswerWithSources, CapabilityError> {
            *self.calls.lock().unwrap() += 1;
            self.outcomes
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(AnswerWithSources::new("fallback")))
        }
    }

    struct Stalls;

    #[async_trait]
    impl ResearchCapability for Stalls {
        async fn ask(
            &self,
            _question: &str,
            _context: &str,
            _timeout: Duration,
        ) -> Result<AnswerWithSources, CapabilityError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(AnswerWithSources::new("too late"))
        }
    }

    fn step() -> ResearchStep {
        ResearchStep::new("overview", "Describe {company_name}")
    }

    fn context() -> StepContext {
        StepContext {
            question: "Describe Acme Co".to_string(),
            background: String::new(),
            timeout: Duration::from_millis(200),
        }
    }

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            retry_delay_ms: 1,
        }
    }

    #[test]
    fn test_backoff_doubles() {
        let p = RetryPolicy {
            max_retries: 3,
            retry_delay_ms: 100,
        };
        assert_eq!(p.delay_for(1), Duration::from_millis(100));
        assert_eq!(p.delay_for(2), Duration::from_millis(200));
        assert_eq!(p.delay_for(3), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_success_with_confidence() {
        let cap = Scripted::new(vec![Ok(AnswerWithSources::new("Acme makes anvils")
            .with_sources(vec!["https://acme.test".to_string()])
            .with_confidence(0.8))]);
        let executor = StepExecutor::new(cap.clone(), policy(2));

        let result = executor.execute(&step(), &context()).await;
        assert_eq!(result.status, StepStatus::Completed);
        assert_eq!(result.question, "Describe Acme Co");
        assert_eq!(result.confidence, 0.8);
        assert_eq!(result.confidence_level, ConfidenceLevel::High);
        assert_eq!(result.sources.len(), 1);
        assert_eq!(result.attempts, 1);
        assert!(result.validation_status.is_none());
        assert_eq!(cap.calls(), 1);
    }

    #[tokio::test]
    async fn test_missing_confidence_defaults_to_neutral() {
        let cap = Scripted::new(vec![Ok(AnswerWithSources::new("text"))]);
        let executor = StepExecutor::new(cap, policy(0));

        let result = executor.execute(&step(), &context()).await;
        assert_eq!(result.confidence, 0.5);
        assert_eq!(result.confidence_level, ConfidenceLevel::Medium);
        assert_eq!(result.validation_status.as_deref(), Some("unverified"));
    }

    #[tokio::test]
    async fn test_empty_answer_is_flagged() {
        let cap = Scripted::new(vec![Ok(AnswerWithSources::new("  ").with_confidence(0.9))]);
        let executor = StepExecutor::new(cap, policy(0));

        let result = executor.execute(&step(), &context()).await;
        assert_eq!(result.status, StepStatus::Completed);
        assert_eq!(result.validation_status.as_deref(), Some("empty_answer"));
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let cap = Scripted::new(vec![
            Err(CapabilityError::Transient {
                message: "429".to_string(),
            }),
            Err(CapabilityError::Timeout { timeout_ms: 200 }),
            Ok(AnswerWithSources::new("third time").with_confidence(0.3)),
        ]);
        let executor = StepExecutor::new(cap.clone(), policy(2));

        let result = executor.execute(&step(), &context()).await;
        assert_eq!(result.status, StepStatus::Completed);
        assert_eq!(result.answer, "third time");
        assert_eq!(result.attempts, 3);
        assert_eq!(cap.calls(), 3);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let transient = || {
            Err(CapabilityError::Transient {
                message: "503 - unavailable".to_string(),
            })
        };
        let cap = Scripted::new(vec![transient(), transient(), transient(), transient()]);
        let executor = StepExecutor::new(cap.clone(), policy(1));

        let result = executor.execute(&step(), &context()).await;
        assert_eq!(result.status, StepStatus::Failed);
        assert_eq!(result.attempts, 2);
        assert_eq!(cap.calls(), 2);
        assert!(result.error.unwrap().contains("503 - unavailable"));
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let raw = "Error: prompt is too long: 210000 tokens > 200000 maximum";
        let cap = Scripted::new(vec![Err(CapabilityError::Permanent {
            message: raw.to_string(),
        })]);
        let executor = StepExecutor::new(cap.clone(), policy(3));

        let result = executor.execute(&step(), &context()).await;
        assert_eq!(result.status, StepStatus::Failed);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.confidence_level, ConfidenceLevel::Unknown);
        assert_eq!(result.error.as_deref(), Some(raw));
        assert_eq!(cap.calls(), 1);
    }

    #[tokio::test]
    async fn test_stalled_capability_times_out() {
        let executor = StepExecutor::new(Arc::new(Stalls), policy(0));

        let result = executor.execute(&step(), &context()).await;
        assert_eq!(result.status, StepStatus::Failed);
        assert_eq!(result.confidence_level, ConfidenceLevel::Unknown);
        assert!(result.error.unwrap().contains("timed out"));
    }
}
