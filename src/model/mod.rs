//! Data model for prospect research.
//!
//! Inputs ([`TargetCompany`], [`SellingProduct`], [`QualificationSignal`],
//! [`ResearchStep`]) are immutable once a run starts. Outputs
//! ([`StepResult`], [`MatchedSignal`], [`ProspectReport`]) are created once
//! and never mutated after the report is finalized.

mod steps;

#[cfg(test)]
#[path = "types_tests.rs"]
mod types_tests;

pub use steps::StepMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Confidence assumed when the research capability does not report one.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

// ============================================================================
// Inputs
// ============================================================================

/// The prospect company being evaluated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetCompany {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub founded_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revenue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub funding: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub technologies: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
}

/// The vendor product used to qualify the target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SellingProduct {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_proposition: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_industries: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ideal_customer_profile: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub competitor_alternatives: Vec<String>,
    /// Ordered signal definitions; order is preserved in matched output.
    #[serde(default)]
    pub qualification_signals: Vec<QualificationSignal>,
}

/// A named, weighted heuristic indicating buying-readiness or fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualificationSignal {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Weight from 1 (nice to have) to 5 (critical).
    pub importance: u8,
    #[serde(default)]
    pub is_confirmed: bool,
    #[serde(default)]
    pub detection_instructions: String,
}

/// Kind of research step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Narrative research.
    #[default]
    General,
    /// Evaluates every qualification signal; feeds signal matching.
    QualificationSignals,
}

/// Definition of one research step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchStep {
    pub step_id: String,
    /// Prompt template. See [`crate::pipeline::ProspectContext::render`].
    pub question: String,
    /// Earlier steps whose answers are embedded in this step's context.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub kind: StepKind,
}

impl QualificationSignal {
    /// Create a signal with the given name and importance.
    pub fn new(name: impl Into<String>, importance: u8) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            importance,
            is_confirmed: false,
            detection_instructions: String::new(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the detection rubric.
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.detection_instructions = instructions.into();
        self
    }

    /// Mark the definition as confirmed.
    pub fn confirmed(mut self) -> Self {
        self.is_confirmed = true;
        self
    }
}

impl ResearchStep {
    /// Create a general step.
    pub fn new(step_id: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            question: question.into(),
            depends_on: Vec::new(),
            timeout_ms: None,
            kind: StepKind::General,
        }
    }

    /// Declare dependencies on earlier steps.
    pub fn depends_on(mut self, step_ids: &[&str]) -> Self {
        self.depends_on = step_ids.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Override the per-step timeout.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Mark this step as the qualification-signal evaluation.
    pub fn qualification(mut self) -> Self {
        self.kind = StepKind::QualificationSignals;
        self
    }
}

/// Input document accepted by the CLI and the worker layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProspectInput {
    pub target: TargetCompany,
    pub selling_product: SellingProduct,
    /// Falls back to the built-in catalogue when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<ResearchStep>>,
}

// ============================================================================
// Step results
// ============================================================================

/// Outcome of a single research step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Completed,
    Failed,
}

/// Coarse bucket of a step's confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
    Unknown,
}

impl ConfidenceLevel {
    /// Bucket a confidence value. Failed steps are always `Unknown`.
    pub fn classify(confidence: f64, status: StepStatus) -> Self {
        if status == StepStatus::Failed || confidence.is_nan() {
            return ConfidenceLevel::Unknown;
        }
        if confidence < 0.34 {
            ConfidenceLevel::Low
        } else if confidence < 0.67 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::High
        }
    }
}

impl std::fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfidenceLevel::Low => write!(f, "low"),
            ConfidenceLevel::Medium => write!(f, "medium"),
            ConfidenceLevel::High => write!(f, "high"),
            ConfidenceLevel::Unknown => write!(f, "unknown"),
        }
    }
}

/// Result of executing one research step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    /// The rendered question that was asked.
    pub question: String,
    pub answer: String,
    pub status: StepStatus,
    /// Confidence in [0, 1]; zero for failed steps.
    pub confidence: f64,
    pub confidence_level: ConfidenceLevel,
    #[serde(default)]
    pub sources: Vec<String>,
    pub validation_status: Option<String>,
    pub validation_notes: Option<String>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub duration_ms: u64,
    /// Capability calls made, including retries.
    #[serde(default)]
    pub attempts: u32,
}

impl StepResult {
    /// A successful step. Confidence is clamped to [0, 1].
    pub fn completed(
        step_id: impl Into<String>,
        question: impl Into<String>,
        answer: impl Into<String>,
        confidence: f64,
        sources: Vec<String>,
    ) -> Self {
        let confidence = if confidence.is_nan() {
            DEFAULT_CONFIDENCE
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            step_id: step_id.into(),
            question: question.into(),
            answer: answer.into(),
            status: StepStatus::Completed,
            confidence,
            confidence_level: ConfidenceLevel::classify(confidence, StepStatus::Completed),
            sources,
            validation_status: None,
            validation_notes: None,
            error: None,
            timestamp: Utc::now(),
            duration_ms: 0,
            attempts: 1,
        }
    }

    /// A failed step. `error` is kept verbatim.
    pub fn failed(
        step_id: impl Into<String>,
        question: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        let step_id = step_id.into();
        let error = error.into();
        Self {
            answer: format!("Research step '{}' failed: {}", step_id, error),
            step_id,
            question: question.into(),
            status: StepStatus::Failed,
            confidence: 0.0,
            confidence_level: ConfidenceLevel::Unknown,
            sources: Vec::new(),
            validation_status: Some("failed".to_string()),
            validation_notes: None,
            error: Some(error),
            timestamp: Utc::now(),
            duration_ms: 0,
            attempts: 0,
        }
    }

    /// Record how long the step took and how many calls it made.
    pub fn with_timing(mut self, duration_ms: u64, attempts: u32) -> Self {
        self.duration_ms = duration_ms;
        self.attempts = attempts;
        self
    }

    /// Attach validation metadata.
    pub fn with_validation(
        mut self,
        status: impl Into<String>,
        notes: Option<String>,
    ) -> Self {
        self.validation_status = Some(status.into());
        self.validation_notes = notes;
        self
    }

    /// Whether the step produced an answer.
    pub fn is_completed(&self) -> bool {
        self.status == StepStatus::Completed
    }
}

// ============================================================================
// Derived outputs
// ============================================================================

/// Strength of a signal verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrength {
    PotentiallyMatches,
    Matches,
}

/// A qualification signal the research found evidence for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedSignal {
    pub name: String,
    pub description: String,
    pub importance: u8,
    pub evidence: String,
    pub match_strength: MatchStrength,
    pub confidence: f64,
}

impl MatchedSignal {
    /// Build a match from its definition.
    pub fn from_definition(
        signal: &QualificationSignal,
        evidence: impl Into<String>,
        match_strength: MatchStrength,
        confidence: f64,
    ) -> Self {
        Self {
            name: signal.name.clone(),
            description: signal.description.clone(),
            importance: signal.importance,
            evidence: evidence.into(),
            match_strength,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// Categorical fit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitLevel {
    #[default]
    Poor,
    Fair,
    Good,
    Excellent,
}

impl std::fmt::Display for FitLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FitLevel::Poor => write!(f, "poor"),
            FitLevel::Fair => write!(f, "fair"),
            FitLevel::Good => write!(f, "good"),
            FitLevel::Excellent => write!(f, "excellent"),
        }
    }
}

impl std::str::FromStr for FitLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "poor" => Ok(FitLevel::Poor),
            "fair" => Ok(FitLevel::Fair),
            "good" => Ok(FitLevel::Good),
            "excellent" => Ok(FitLevel::Excellent),
            _ => Err(format!("Unknown fit level: {}", s)),
        }
    }
}

/// A pain point tied to the matched signal that evidences it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PainPoint {
    pub id: String,
    pub text: String,
    pub signal: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueProposition {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectionHandling {
    pub objection: String,
    pub response: String,
}

/// A role (and optionally a person) worth engaging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionMaker {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

// ============================================================================
// Report
// ============================================================================

/// Lifecycle state of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverallStatus::Running => write!(f, "running"),
            OverallStatus::Completed => write!(f, "completed"),
            OverallStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for OverallStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "running" => Ok(OverallStatus::Running),
            "completed" => Ok(OverallStatus::Completed),
            "failed" => Ok(OverallStatus::Failed),
            _ => Err(format!("Unknown report status: {}", s)),
        }
    }
}

/// Aggregate root of a research run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProspectReport {
    pub target: TargetCompany,
    pub selling_product: SellingProduct,
    pub fit_level: FitLevel,
    pub fit_score: f64,
    pub fit_explanation: String,
    pub pain_points: Vec<PainPoint>,
    pub value_propositions: Vec<ValueProposition>,
    pub objection_handling: Vec<ObjectionHandling>,
    pub key_decision_makers: Vec<DecisionMaker>,
    pub matched_signals: Vec<MatchedSignal>,
    pub steps: StepMap,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub overall_status: OverallStatus,
    pub total_time_seconds: f64,
}

impl ProspectReport {
    /// A fresh report in the running state with no steps.
    pub fn start(target: TargetCompany, selling_product: SellingProduct) -> Self {
        Self {
            target,
            selling_product,
            fit_level: FitLevel::Poor,
            fit_score: 0.0,
            fit_explanation: String::new(),
            pain_points: Vec::new(),
            value_propositions: Vec::new(),
            objection_handling: Vec::new(),
            key_decision_makers: Vec::new(),
            matched_signals: Vec::new(),
            steps: StepMap::new(),
            started_at: Utc::now(),
            completed_at: None,
            overall_status: OverallStatus::Running,
            total_time_seconds: 0.0,
        }
    }

    /// Number of steps that failed.
    pub fn failed_step_count(&self) -> usize {
        self.steps.values().filter(|r| !r.is_completed()).count()
    }
}

/// Seconds between two timestamps at microsecond precision.
pub fn elapsed_seconds(started_at: DateTime<Utc>, completed_at: DateTime<Utc>) -> f64 {
    let micros = (completed_at - started_at).num_microseconds().unwrap_or(i64::MAX);
    micros as f64 / 1_000_000.0
}

/// Run timestamps anchored at a wall-clock start and advanced by a
/// monotonic clock.
///
/// Readings never precede `started_at` and never go backwards, even when the
/// system clock is stepped during a run.
#[derive(Debug, Clone, Copy)]
pub struct RunClock {
    started_at: DateTime<Utc>,
    origin: Instant,
}

impl RunClock {
    pub fn start() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            origin: Instant::now(),
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn now(&self) -> DateTime<Utc> {
        chrono::Duration::from_std(self.origin.elapsed())
            .ok()
            .and_then(|elapsed| self.started_at.checked_add_signed(elapsed))
            .unwrap_or(self.started_at)
    }
}
