//! Post-research analysis: signal matching, fit scoring, insight synthesis
//! and report assembly.
//!
//! Matching, scoring and assembly are pure. Only [`InsightSynthesizer`] talks
//! to the outside world, through the same [`crate::research::ResearchCapability`]
//! seam the step executor uses.

mod assembler;
mod insights;
mod scoring;
mod signals;

pub use assembler::{ReportAssembler, ReportParts};
pub use insights::{InsightSynthesizer, Insights};
pub use scoring::{FitAssessment, FitScorer, POTENTIAL_MATCH_WEIGHT};
pub use signals::{SignalMatcher, TextSignalMatcher, Verdict, POTENTIAL_MATCH_CONFIDENCE};
