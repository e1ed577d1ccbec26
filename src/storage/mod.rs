//! Persistence for finished prospect reports.
//!
//! Reports are stored as their JSON document so a read returns exactly what
//! was written: step order, timing and matched signals included.

mod sqlite;

pub use sqlite::SqliteReportStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StorageResult;
use crate::model::{FitLevel, OverallStatus, ProspectReport};

/// Listing entry for a stored report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub id: String,
    pub target_name: String,
    pub product_name: String,
    pub fit_level: FitLevel,
    pub fit_score: f64,
    pub overall_status: OverallStatus,
    pub created_at: DateTime<Utc>,
}

/// New report id.
pub fn new_report_id() -> String {
    Uuid::new_v4().to_string()
}

/// Report persistence.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Persist a report and return its new id.
    async fn save(&self, report: &ProspectReport) -> StorageResult<String>;
    /// Load a report by id.
    async fn get(&self, id: &str) -> StorageResult<Option<ProspectReport>>;
    /// Most recent reports first.
    async fn list(&self, limit: u32) -> StorageResult<Vec<ReportSummary>>;
    /// Remove a report. Fails with `ReportNotFound` if it does not exist.
    async fn delete(&self, id: &str) -> StorageResult<()>;
}
