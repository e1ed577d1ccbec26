//! # Prospect Research
//!
//! A multi-step research pipeline that evaluates a target company against a
//! vendor's product. Research questions are answered by Langbase Pipes; the
//! answers are matched against weighted qualification signals, scored into a
//! fit level, and turned into sales insights.
//!
//! ## Architecture
//!
//! ```text
//! ProspectContext → PipelineOrchestrator ─┬→ StepExecutor → Langbase Pipes (HTTP)
//!                                         ├→ SignalMatcher → FitScorer
//!                                         ├→ InsightSynthesizer → Langbase Pipes
//!                                         └→ ReportAssembler → ProspectReport
//!                                                                   ↓
//!                                                          SQLite (CLI only)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use prospect_research::config::Config;
//! use prospect_research::langbase::LangbaseClient;
//! use prospect_research::pipeline::{default_steps, PipelineOrchestrator};
//! use prospect_research::research::LangbaseResearcher;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let client = LangbaseClient::new(&config.langbase, config.request.clone())?;
//!     let research = Arc::new(LangbaseResearcher::new(client.clone(), &config.pipes.research));
//!     let insights = Arc::new(LangbaseResearcher::new(client, &config.pipes.insights));
//!     let pipeline = PipelineOrchestrator::from_config(&config, research, insights);
//!     let report = pipeline.run(target, product, &default_steps()).await?;
//!     println!("{}", serde_json::to_string_pretty(&report)?);
//!     Ok(())
//! }
//! ```

/// Signal matching, fit scoring, insight synthesis and report assembly.
pub mod analysis;
/// Command-line interface.
pub mod cli;
/// Configuration management.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// Langbase API client and types for pipe communication.
pub mod langbase;
/// Inputs, step results and the prospect report.
pub mod model;
/// Step rendering, execution and orchestration.
pub mod pipeline;
/// System prompts for Langbase pipes.
pub mod prompts;
/// The research capability seam and its Langbase implementation.
pub mod research;
/// Report persistence.
pub mod storage;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use model::{ProspectInput, ProspectReport};
pub use pipeline::PipelineOrchestrator;
