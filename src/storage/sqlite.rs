use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info};

use super::{new_report_id, ReportStore, ReportSummary};
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};
use crate::model::ProspectReport;

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed report store
#[derive(Clone)]
pub struct SqliteReportStore {
    pool: SqlitePool,
}

impl SqliteReportStore {
    /// Open (creating if needed) the database at `config.path`.
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// A private in-memory database.
    pub async fn new_in_memory() -> StorageResult<Self> {
        // Every in-memory connection is its own database, so keep exactly one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to open in-memory database: {}", e),
            })?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> StorageResult<()> {
        info!("Running database migrations...");

        MIGRATOR.run(&self.pool).await.map_err(|e| StorageError::Migration {
            message: format!("Failed to run migrations: {}", e),
        })?;

        info!("Database migrations completed successfully");
        Ok(())
    }
}

#[async_trait]
impl ReportStore for SqliteReportStore {
    async fn save(&self, report: &ProspectReport) -> StorageResult<String> {
        let id = new_report_id();
        let report_json = serde_json::to_string(report)?;

        sqlx::query(
            r#"
            INSERT INTO reports (
                id, target_name, product_name, fit_level, fit_score, overall_status,
                started_at, completed_at, total_time_seconds, report_json, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&report.target.name)
        .bind(&report.selling_product.name)
        .bind(report.fit_level.to_string())
        .bind(report.fit_score)
        .bind(report.overall_status.to_string())
        .bind(report.started_at.to_rfc3339())
        .bind(report.completed_at.map(|t| t.to_rfc3339()))
        .bind(report.total_time_seconds)
        .bind(&report_json)
        .bind(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(&self.pool)
        .await?;

        debug!(report_id = %id, target = %report.target.name, "Report saved");
        Ok(id)
    }

    async fn get(&self, id: &str) -> StorageResult<Option<ProspectReport>> {
        let json: Option<(String,)> =
            sqlx::query_as("SELECT report_json FROM reports WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        match json {
            Some((json,)) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, limit: u32) -> StorageResult<Vec<ReportSummary>> {
        let rows: Vec<SummaryRow> = sqlx::query_as(
            r#"
            SELECT id, target_name, product_name, fit_level, fit_score, overall_status, created_at
            FROM reports
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ReportSummary::try_from).collect()
    }

    async fn delete(&self, id: &str) -> StorageResult<()> {
        let result = sqlx::query("DELETE FROM reports WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::ReportNotFound {
                report_id: id.to_string(),
            });
        }
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    id: String,
    target_name: String,
    product_name: String,
    fit_level: String,
    fit_score: f64,
    overall_status: String,
    created_at: String,
}

impl TryFrom<SummaryRow> for ReportSummary {
    type Error = StorageError;

    fn try_from(row: SummaryRow) -> Result<Self, Self::Error> {
        let invalid = |message: String| StorageError::Query { message };
        Ok(Self {
            fit_level: row.fit_level.parse().map_err(invalid)?,
            overall_status: row.overall_status.parse().map_err(invalid)?,
            created_at: DateTime::parse_from_rfc3339(&row.created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| StorageError::Query {
                    message: format!("Invalid created_at for report {}: {}", row.id, e),
                })?,
            id: row.id,
            target_name: row.target_name,
            product_name: row.product_name,
            fit_score: row.fit_score,
        })
    }
}
