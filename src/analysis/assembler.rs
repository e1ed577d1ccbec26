//! Final report composition and validation.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{error, info};

use super::insights::Insights;
use super::scoring::FitAssessment;
use crate::error::ValidationError;
use crate::model::{
    elapsed_seconds, ConfidenceLevel, MatchedSignal, OverallStatus, ProspectReport,
    SellingProduct, StepMap, StepStatus, TargetCompany,
};

/// Everything a finished run hands to the assembler.
#[derive(Debug, Clone)]
pub struct ReportParts {
    pub target: TargetCompany,
    pub selling_product: SellingProduct,
    /// Step ids in the order they were executed.
    pub executed: Vec<String>,
    pub steps: StepMap,
    pub matched_signals: Vec<MatchedSignal>,
    pub assessment: FitAssessment,
    pub insights: Insights,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// Composes a [`ProspectReport`] and checks its invariants.
///
/// Any breach is a bug upstream, so it is reported rather than repaired.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportAssembler;

impl ReportAssembler {
    pub fn new() -> Self {
        Self
    }

    pub fn assemble(&self, parts: ReportParts) -> Result<ProspectReport, ValidationError> {
        if let Err(e) = Self::check(&parts) {
            error!(target = %parts.target.name, error = %e, "Report failed validation");
            return Err(e);
        }

        let total_time_seconds = elapsed_seconds(parts.started_at, parts.completed_at);
        let report = ProspectReport {
            target: parts.target,
            selling_product: parts.selling_product,
            fit_level: parts.assessment.fit_level,
            fit_score: parts.assessment.fit_score,
            fit_explanation: parts.assessment.fit_explanation,
            pain_points: parts.insights.pain_points,
            value_propositions: parts.insights.value_propositions,
            objection_handling: parts.insights.objection_handling,
            key_decision_makers: parts.insights.key_decision_makers,
            matched_signals: parts.matched_signals,
            steps: parts.steps,
            started_at: parts.started_at,
            completed_at: Some(parts.completed_at),
            overall_status: OverallStatus::Completed,
            total_time_seconds,
        };

        info!(
            target = %report.target.name,
            fit_level = %report.fit_level,
            fit_score = report.fit_score,
            steps = report.steps.len(),
            failed_steps = report.failed_step_count(),
            total_time_seconds,
            "Report assembled"
        );
        Ok(report)
    }

    fn check(parts: &ReportParts) -> Result<(), ValidationError> {
        let defined: HashSet<&str> = parts
            .selling_product
            .qualification_signals
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        let mut seen = HashSet::new();
        for m in &parts.matched_signals {
            if !defined.contains(m.name.as_str()) {
                return Err(ValidationError::UndefinedSignal {
                    name: m.name.clone(),
                });
            }
            if !seen.insert(m.name.as_str()) {
                return Err(ValidationError::DuplicateMatch {
                    name: m.name.clone(),
                });
            }
        }

        let mut executed = HashSet::new();
        for step_id in &parts.executed {
            if !executed.insert(step_id.as_str()) {
                return Err(ValidationError::DuplicateStep {
                    step_id: step_id.clone(),
                });
            }
        }
        let recorded: Vec<String> = parts.steps.keys().map(str::to_string).collect();
        if recorded != parts.executed {
            return Err(ValidationError::StepOrder {
                expected: parts.executed.clone(),
                actual: recorded,
            });
        }

        for (step_id, result) in parts.steps.iter() {
            if result.step_id != step_id {
                return Err(ValidationError::StepKeyMismatch {
                    step_id: step_id.to_string(),
                    result_step_id: result.step_id.clone(),
                });
            }
            if result.status == StepStatus::Failed
                && (result.confidence != 0.0
                    || result.confidence_level != ConfidenceLevel::Unknown)
            {
                return Err(ValidationError::InconsistentStep {
                    step_id: step_id.to_string(),
                    message: "failed step carries a confidence".to_string(),
                });
            }
            if result.timestamp < parts.started_at || result.timestamp > parts.completed_at {
                return Err(ValidationError::Timing {
                    message: format!("step {} finished outside the run window", step_id),
                });
            }
        }

        let score = parts.assessment.fit_score;
        if !(0.0..=1.0).contains(&score) {
            return Err(ValidationError::ScoreOutOfRange { score });
        }

        if parts.completed_at < parts.started_at {
            return Err(ValidationError::Timing {
                message: format!(
                    "completed_at {} precedes started_at {}",
                    parts.completed_at, parts.started_at
                ),
            });
        }
        Ok(())
    }
}
