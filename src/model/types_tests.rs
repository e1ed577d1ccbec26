//! Unit tests for the research data model.

use super::*;
use serde_json::json;

// ============================================================================
// ConfidenceLevel
// ============================================================================

#[test]
fn test_confidence_buckets() {
    let completed = StepStatus::Completed;
    assert_eq!(ConfidenceLevel::classify(0.0, completed), ConfidenceLevel::Low);
    assert_eq!(ConfidenceLevel::classify(0.339, completed), ConfidenceLevel::Low);
    assert_eq!(ConfidenceLevel::classify(0.34, completed), ConfidenceLevel::Medium);
    assert_eq!(ConfidenceLevel::classify(0.5, completed), ConfidenceLevel::Medium);
    assert_eq!(ConfidenceLevel::classify(0.669, completed), ConfidenceLevel::Medium);
    assert_eq!(ConfidenceLevel::classify(0.67, completed), ConfidenceLevel::High);
    assert_eq!(ConfidenceLevel::classify(1.0, completed), ConfidenceLevel::High);
}

#[test]
fn test_failed_status_is_unknown() {
    assert_eq!(
        ConfidenceLevel::classify(0.9, StepStatus::Failed),
        ConfidenceLevel::Unknown
    );
}

// ============================================================================
// StepResult
// ============================================================================

#[test]
fn test_completed_step_clamps_confidence() {
    let high = StepResult::completed("s", "q", "a", 1.7, vec![]);
    assert_eq!(high.confidence, 1.0);
    assert_eq!(high.confidence_level, ConfidenceLevel::High);

    let low = StepResult::completed("s", "q", "a", -0.3, vec![]);
    assert_eq!(low.confidence, 0.0);
    assert_eq!(low.confidence_level, ConfidenceLevel::Low);
}

#[test]
fn test_failed_step_shape() {
    let result = StepResult::failed("step_1", "What?", "context_length_exceeded");
    assert_eq!(result.status, StepStatus::Failed);
    assert_eq!(result.confidence, 0.0);
    assert_eq!(result.confidence_level, ConfidenceLevel::Unknown);
    assert_eq!(result.error.as_deref(), Some("context_length_exceeded"));
    assert!(result.answer.contains("step_1"));
    assert!(result.answer.contains("context_length_exceeded"));
}

#[test]
fn test_step_result_serialized_fields() {
    let result = StepResult::completed("overview", "q", "a", 0.5, vec!["s1".to_string()])
        .with_timing(120, 2)
        .with_validation("ok", Some("note".to_string()));
    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["status"], "completed");
    assert_eq!(value["confidence_level"], "medium");
    assert_eq!(value["validation_status"], "ok");
    assert_eq!(value["duration_ms"], 120);
    assert_eq!(value["attempts"], 2);
    assert!(value["error"].is_null());
}

// ============================================================================
// Inputs
// ============================================================================

#[test]
fn test_target_company_minimal_deserialize() {
    let target: TargetCompany = serde_json::from_value(json!({"name": "Acme Co"})).unwrap();
    assert_eq!(target.name, "Acme Co");
    assert!(target.website.is_none());
    assert!(target.technologies.is_empty());
}

#[test]
fn test_selling_product_with_signals() {
    let product: SellingProduct = serde_json::from_value(json!({
        "name": "MeterFlow",
        "qualification_signals": [
            {"name": "Usage pricing", "importance": 5, "detection_instructions": "Look at the pricing page"},
            {"name": "Finance team", "importance": 3, "is_confirmed": true}
        ]
    }))
    .unwrap();
    assert_eq!(product.qualification_signals.len(), 2);
    assert_eq!(product.qualification_signals[0].importance, 5);
    assert!(!product.qualification_signals[0].is_confirmed);
    assert!(product.qualification_signals[1].is_confirmed);
}

#[test]
fn test_research_step_builder() {
    let step = ResearchStep::new("signals", "Evaluate {signals}")
        .depends_on(&["overview", "news"])
        .with_timeout_ms(5000)
        .qualification();
    assert_eq!(step.depends_on, vec!["overview".to_string(), "news".to_string()]);
    assert_eq!(step.timeout_ms, Some(5000));
    assert_eq!(step.kind, StepKind::QualificationSignals);
}

#[test]
fn test_research_step_kind_defaults_to_general() {
    let step: ResearchStep =
        serde_json::from_value(json!({"step_id": "a", "question": "q"})).unwrap();
    assert_eq!(step.kind, StepKind::General);
    assert!(step.depends_on.is_empty());
}

// ============================================================================
// Report
// ============================================================================

#[test]
fn test_report_start_is_running_and_empty() {
    let report = ProspectReport::start(
        TargetCompany {
            name: "Acme Co".to_string(),
            ..Default::default()
        },
        SellingProduct::default(),
    );
    assert_eq!(report.overall_status, OverallStatus::Running);
    assert!(report.steps.is_empty());
    assert!(report.completed_at.is_none());
}

#[test]
fn test_report_has_exact_keys() {
    let report = ProspectReport::start(TargetCompany::default(), SellingProduct::default());
    let value = serde_json::to_value(&report).unwrap();
    let mut keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
    keys.sort();
    let mut expected = vec![
        "target",
        "selling_product",
        "fit_level",
        "fit_score",
        "fit_explanation",
        "pain_points",
        "value_propositions",
        "objection_handling",
        "key_decision_makers",
        "matched_signals",
        "steps",
        "started_at",
        "completed_at",
        "overall_status",
        "total_time_seconds",
    ];
    expected.sort();
    assert_eq!(keys, expected);
}

#[test]
fn test_fit_level_ordering_and_parse() {
    assert!(FitLevel::Excellent > FitLevel::Good);
    assert!(FitLevel::Fair > FitLevel::Poor);
    assert_eq!("GOOD".parse::<FitLevel>(), Ok(FitLevel::Good));
    assert!("great".parse::<FitLevel>().is_err());
}

#[test]
fn test_elapsed_seconds() {
    let start = Utc::now();
    let end = start + chrono::Duration::milliseconds(1500);
    assert_eq!(elapsed_seconds(start, end), 1.5);
}

#[test]
fn test_run_clock_ignores_wall_clock_steps() {
    // A start recorded before the system clock was stepped back an hour.
    let started_at = Utc::now() + chrono::Duration::hours(1);
    let clock = RunClock::starting_at(started_at);

    let first = clock.now();
    std::thread::sleep(std::time::Duration::from_millis(5));
    let second = clock.now();

    assert_eq!(clock.started_at(), started_at);
    assert!(first >= started_at);
    assert!(second > first);
    assert!(elapsed_seconds(started_at, second) >= 0.005);
}
