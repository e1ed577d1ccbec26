//! Research pipeline: step rendering, execution and orchestration.
//!
//! A run validates its input, executes each [`ResearchStep`] in declared order
//! through the [`StepExecutor`], and hands the collected results to the
//! analysis stages. Step failures never abort a run.
//!
//! [`ResearchStep`]: crate::model::ResearchStep

mod catalog;
mod context;
mod executor;
mod orchestrator;

pub use catalog::{default_steps, QUALIFICATION_STEP_ID};
pub use context::{ProspectContext, StepContext};
pub use executor::{RetryPolicy, StepExecutor};
pub use orchestrator::{CancelFlag, PipelineOrchestrator};
