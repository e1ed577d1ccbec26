//! Report storage tests against an on-disk SQLite database

use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use prospect_research::config::DatabaseConfig;
use prospect_research::error::StorageError;
use prospect_research::model::{
    elapsed_seconds, FitLevel, MatchStrength, MatchedSignal, OverallStatus, ProspectReport,
    QualificationSignal, SellingProduct, StepResult, TargetCompany,
};
use prospect_research::storage::{ReportStore, SqliteReportStore};

async fn open(dir: &TempDir) -> SqliteReportStore {
    let config = DatabaseConfig {
        path: dir.path().join("nested").join("prospects.db"),
        max_connections: 2,
    };
    SqliteReportStore::new(&config)
        .await
        .expect("Failed to open store")
}

fn finished_report() -> ProspectReport {
    let signal = QualificationSignal::new("Usage-based pricing", 5);
    let mut report = ProspectReport::start(
        TargetCompany {
            name: "Acme Co".to_string(),
            ..Default::default()
        },
        SellingProduct {
            name: "MeterFlow".to_string(),
            qualification_signals: vec![signal.clone(), QualificationSignal::new("Finance", 3)],
            ..Default::default()
        },
    );
    report.started_at = Utc::now() - Duration::milliseconds(1_234_567);
    report
        .steps
        .insert(StepResult::completed("zeta", "q", "first by order", 0.91, vec![]));
    report
        .steps
        .insert(StepResult::failed("alpha", "q", "Capability call timed out after 50ms"));
    report.matched_signals = vec![MatchedSignal::from_definition(
        &signal,
        "pricing page",
        MatchStrength::Matches,
        0.9,
    )];
    report.fit_score = 0.625;
    report.fit_level = FitLevel::Good;
    report.overall_status = OverallStatus::Completed;
    let completed_at = Utc::now();
    report.completed_at = Some(completed_at);
    report.total_time_seconds = elapsed_seconds(report.started_at, completed_at);
    report
}

#[tokio::test]
async fn test_round_trip_preserves_order_timing_and_matches() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir).await;
    let report = finished_report();

    let id = store.save(&report).await.unwrap();
    let loaded = store.get(&id).await.unwrap().expect("report exists");

    assert_eq!(loaded, report);
    assert_eq!(loaded.steps.keys().collect::<Vec<_>>(), vec!["zeta", "alpha"]);
    assert_eq!(loaded.total_time_seconds, report.total_time_seconds);
    assert_eq!(loaded.matched_signals, report.matched_signals);
}

#[tokio::test]
async fn test_reports_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let id = {
        let store = open(&dir).await;
        store.save(&finished_report()).await.unwrap()
    };

    let store = open(&dir).await;
    let summaries = store.list(10).await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].id, id);
    assert_eq!(summaries[0].target_name, "Acme Co");
    assert_eq!(summaries[0].product_name, "MeterFlow");
    assert_eq!(summaries[0].fit_level, FitLevel::Good);
    assert_eq!(summaries[0].overall_status, OverallStatus::Completed);
}

#[tokio::test]
async fn test_delete_missing_report() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir).await;
    match store.delete("does-not-exist").await {
        Err(StorageError::ReportNotFound { report_id }) => assert_eq!(report_id, "does-not-exist"),
        other => panic!("expected ReportNotFound, got {:?}", other),
    }
}
