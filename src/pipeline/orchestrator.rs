//! End-to-end research runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::context::ProspectContext;
use super::executor::{RetryPolicy, StepExecutor};
use crate::analysis::{
    FitScorer, InsightSynthesizer, ReportAssembler, ReportParts, SignalMatcher,
    TextSignalMatcher,
};
use crate::config::Config;
use crate::error::{AppResult, ConfigurationError};
use crate::model::{
    elapsed_seconds, MatchedSignal, OverallStatus, ProspectReport, ResearchStep, RunClock,
    SellingProduct, StepKind, StepMap, TargetCompany,
};
use crate::research::ResearchCapability;

/// Cooperative cancellation shared between a run and its caller.
///
/// Checked before each step; a step already in flight is allowed to finish.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs the research steps in order and turns the results into a report.
///
/// Holds only shared, stateless collaborators, so one orchestrator can serve
/// many concurrent runs.
#[derive(Clone)]
pub struct PipelineOrchestrator {
    executor: StepExecutor,
    matcher: Arc<dyn SignalMatcher>,
    scorer: FitScorer,
    synthesizer: InsightSynthesizer,
    assembler: ReportAssembler,
    step_timeout: Duration,
}

impl PipelineOrchestrator {
    pub fn new(
        executor: StepExecutor,
        matcher: Arc<dyn SignalMatcher>,
        scorer: FitScorer,
        synthesizer: InsightSynthesizer,
        step_timeout: Duration,
    ) -> Self {
        Self {
            executor,
            matcher,
            scorer,
            synthesizer,
            assembler: ReportAssembler::new(),
            step_timeout,
        }
    }

    /// Wire the pipeline from configuration.
    ///
    /// `research` answers the steps; `insights` generates sales insights.
    pub fn from_config(
        config: &Config,
        research: Arc<dyn ResearchCapability>,
        insights: Arc<dyn ResearchCapability>,
    ) -> Self {
        let step_timeout = Duration::from_millis(config.pipeline.step_timeout_ms);
        Self::new(
            StepExecutor::new(research, RetryPolicy::from(&config.request)),
            Arc::new(TextSignalMatcher::new(config.scoring.include_potential)),
            FitScorer::new(config.scoring.clone()),
            InsightSynthesizer::new(insights, step_timeout),
            step_timeout,
        )
    }

    /// Run every step and build the report.
    ///
    /// Invalid input yields a report with status `failed` and no steps. An
    /// `Err` means the finished report broke an invariant.
    pub async fn run(
        &self,
        target: TargetCompany,
        product: SellingProduct,
        steps: &[ResearchStep],
    ) -> AppResult<ProspectReport> {
        self.run_with_cancel(target, product, steps, &CancelFlag::new())
            .await
    }

    /// [`run`](Self::run) with cooperative cancellation.
    pub async fn run_with_cancel(
        &self,
        target: TargetCompany,
        product: SellingProduct,
        steps: &[ResearchStep],
        cancel: &CancelFlag,
    ) -> AppResult<ProspectReport> {
        let context = ProspectContext::new(target, product);
        if let Err(e) = preflight(&context, steps) {
            warn!(target = %context.target().name, error = %e, "Research could not start");
            return Ok(failed_report(&context, &e));
        }
        self.execute(context, steps, cancel).await
    }

    /// Like [`run`](Self::run), but invalid input is returned as an error.
    pub async fn try_run(
        &self,
        target: TargetCompany,
        product: SellingProduct,
        steps: &[ResearchStep],
    ) -> AppResult<ProspectReport> {
        let context = ProspectContext::new(target, product);
        preflight(&context, steps)?;
        self.execute(context, steps, &CancelFlag::new()).await
    }

    async fn execute(
        &self,
        context: ProspectContext,
        steps: &[ResearchStep],
        cancel: &CancelFlag,
    ) -> AppResult<ProspectReport> {
        let clock = RunClock::start();
        info!(
            target = %context.target().name,
            product = %context.product().name,
            steps = steps.len(),
            signals = context.signals().len(),
            "Starting prospect research"
        );

        let mut results = StepMap::new();
        let mut executed = Vec::with_capacity(steps.len());
        for step in steps {
            if cancel.is_cancelled() {
                warn!(
                    target = %context.target().name,
                    completed = executed.len(),
                    skipped = steps.len() - executed.len(),
                    "Research cancelled; remaining steps skipped"
                );
                break;
            }

            let step_context = context.step_context(step, &results, self.step_timeout);
            let mut result = self.executor.execute(step, &step_context).await;
            result.timestamp = clock.now();
            executed.push(step.step_id.clone());
            results.insert(result);
        }

        let matched = self.match_signals(&context, steps, &results);
        let assessment = self.scorer.score(&matched, context.signals());
        let insights = self
            .synthesizer
            .synthesize(context.target(), context.product(), &matched)
            .await;

        let parts = ReportParts {
            target: context.target().clone(),
            selling_product: context.product().clone(),
            executed,
            steps: results,
            matched_signals: matched,
            assessment,
            insights,
            started_at: clock.started_at(),
            completed_at: clock.now(),
        };
        Ok(self.assembler.assemble(parts)?)
    }

    /// Extract matches from every qualification step that ran, keeping the
    /// first match per signal and definition order.
    fn match_signals(
        &self,
        context: &ProspectContext,
        steps: &[ResearchStep],
        results: &StepMap,
    ) -> Vec<MatchedSignal> {
        let defined = context.signals();
        let found: Vec<MatchedSignal> = steps
            .iter()
            .filter(|s| s.kind == StepKind::QualificationSignals)
            .filter_map(|s| results.get(&s.step_id))
            .flat_map(|result| self.matcher.extract(result, defined))
            .collect();

        defined
            .iter()
            .filter_map(|signal| found.iter().find(|m| m.name == signal.name).cloned())
            .collect()
    }
}

fn preflight(context: &ProspectContext, steps: &[ResearchStep]) -> Result<(), ConfigurationError> {
    context.validate()?;
    ProspectContext::validate_steps(steps)
}

fn failed_report(context: &ProspectContext, error: &ConfigurationError) -> ProspectReport {
    let mut report = ProspectReport::start(context.target().clone(), context.product().clone());
    let completed_at = RunClock::starting_at(report.started_at).now();
    report.fit_explanation = format!("Research could not start: {}", error);
    report.overall_status = OverallStatus::Failed;
    report.completed_at = Some(completed_at);
    report.total_time_seconds = elapsed_seconds(report.started_at, completed_at);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoringConfig;
    use crate::error::{AppError, CapabilityError};
    use crate::model::{FitLevel, QualificationSignal};
    use crate::research::AnswerWithSources;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Echoes the question; cancels the shared flag after the first call.
    struct CancelsAfterFirst {
        flag: CancelFlag,
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl ResearchCapability for CancelsAfterFirst {
        async fn ask(
            &self,
            question: &str,
            _context: &str,
            _timeout: Duration,
        ) -> Result<AnswerWithSources, CapabilityError> {
            *self.calls.lock().unwrap() += 1;
            self.flag.cancel();
            Ok(AnswerWithSources::new(format!("answer to {}", question)).with_confidence(0.7))
        }
    }

    fn orchestrator(capability: Arc<dyn ResearchCapability>) -> PipelineOrchestrator {
        PipelineOrchestrator::new(
            StepExecutor::new(
                capability.clone(),
                RetryPolicy {
                    max_retries: 0,
                    retry_delay_ms: 1,
                },
            ),
            Arc::new(TextSignalMatcher::default()),
            FitScorer::new(ScoringConfig::default()),
            InsightSynthesizer::new(capability, Duration::from_secs(1)),
            Duration::from_secs(1),
        )
    }

    fn target() -> TargetCompany {
        TargetCompany {
            name: "Acme Co".to_string(),
            ..Default::default()
        }
    }

    fn product() -> SellingProduct {
        SellingProduct {
            name: "MeterFlow".to_string(),
            qualification_signals: vec![QualificationSignal::new("Usage-based pricing", 5)],
            ..Default::default()
        }
    }

    #[test]
    fn test_cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let other = flag.clone();
        assert!(!flag.is_cancelled());
        other.cancel();
        assert!(flag.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancellation_stops_before_next_step() {
        let flag = CancelFlag::new();
        let cap = Arc::new(CancelsAfterFirst {
            flag: flag.clone(),
            calls: Mutex::new(0),
        });
        let steps = vec![ResearchStep::new("one", "q1"), ResearchStep::new("two", "q2")];

        let report = orchestrator(cap.clone())
            .run_with_cancel(target(), product(), &steps, &flag)
            .await
            .unwrap();

        assert_eq!(*cap.calls.lock().unwrap(), 1);
        assert_eq!(report.overall_status, OverallStatus::Completed);
        assert_eq!(report.steps.keys().collect::<Vec<_>>(), vec!["one"]);
        assert_eq!(report.fit_level, FitLevel::Poor);
    }

    #[tokio::test]
    async fn test_step_timestamps_follow_the_run_clock() {
        let cap = Arc::new(CancelsAfterFirst {
            flag: CancelFlag::new(),
            calls: Mutex::new(0),
        });
        let steps = vec![
            ResearchStep::new("one", "q1"),
            ResearchStep::new("two", "q2"),
            ResearchStep::new("three", "q3"),
        ];

        let report = orchestrator(cap).run(target(), product(), &steps).await.unwrap();

        let completed_at = report.completed_at.unwrap();
        let stamps: Vec<_> = report.steps.values().map(|r| r.timestamp).collect();
        assert_eq!(stamps.len(), 3);
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
        assert!(stamps[0] >= report.started_at);
        assert!(stamps[2] <= completed_at);
        assert_eq!(
            report.total_time_seconds,
            elapsed_seconds(report.started_at, completed_at)
        );
    }

    #[tokio::test]
    async fn test_invalid_input_yields_failed_report() {
        let cap = Arc::new(CancelsAfterFirst {
            flag: CancelFlag::new(),
            calls: Mutex::new(0),
        });
        let report = orchestrator(cap.clone())
            .run(target(), product(), &[])
            .await
            .unwrap();

        assert_eq!(report.overall_status, OverallStatus::Failed);
        assert!(report.steps.is_empty());
        assert!(report.completed_at.is_some());
        assert!(report
            .fit_explanation
            .starts_with("Research could not start: No research steps"));
        assert_eq!(*cap.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_try_run_returns_configuration_error() {
        let cap = Arc::new(CancelsAfterFirst {
            flag: CancelFlag::new(),
            calls: Mutex::new(0),
        });
        let steps = vec![ResearchStep::new("a", "q"), ResearchStep::new("a", "q")];
        let err = orchestrator(cap)
            .try_run(target(), product(), &steps)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Configuration(ConfigurationError::DuplicateStep { .. })
        ));
    }
}
