//! Built-in research step catalogue.

use crate::model::ResearchStep;
use crate::prompts::SIGNAL_EVALUATION_INSTRUCTIONS;

/// Step id of the built-in qualification-signal evaluation.
pub const QUALIFICATION_STEP_ID: &str = "qualification_signals";

/// The default research plan.
///
/// Steps:
/// 1. Company overview
/// 2. Recent news and events
/// 3. Technology stack and tooling
/// 4. Leadership and buying committee (uses the overview)
/// 5. Qualification signal evaluation (uses everything above)
pub fn default_steps() -> Vec<ResearchStep> {
    let mut qualification = String::from(
        "Evaluate {company_name} against each of the following qualification signals for {product_name}.\n\n{signals}\n\n",
    );
    qualification.push_str(SIGNAL_EVALUATION_INSTRUCTIONS);

    vec![
        ResearchStep::new(
            "company_overview",
            "Give an overview of {company_name} ({company_website}): what they sell, to whom, \
             business model, size, growth stage and recent trajectory.",
        ),
        ResearchStep::new(
            "recent_news",
            "Summarize notable news about {company_name} from the last 12 months: funding, \
             launches, leadership changes, partnerships, layoffs or expansions.",
        ),
        ResearchStep::new(
            "technology_stack",
            "What technologies, vendors and internal tooling does {company_name} use? \
             Note anything relevant to {product_name}: {product_description}",
        ),
        ResearchStep::new(
            "leadership",
            "Who are the executives and likely buyers at {company_name} for {product_name}? \
             Include titles and recent hires where known.",
        )
        .depends_on(&["company_overview"]),
        ResearchStep::new(QUALIFICATION_STEP_ID, qualification)
            .depends_on(&[
                "company_overview",
                "recent_news",
                "technology_stack",
                "leadership",
            ])
            .qualification(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StepKind;
    use crate::pipeline::ProspectContext;

    #[test]
    fn test_default_steps_are_valid() {
        let steps = default_steps();
        assert!(ProspectContext::validate_steps(&steps).is_ok());
    }

    #[test]
    fn test_exactly_one_qualification_step_last() {
        let steps = default_steps();
        let qualification: Vec<_> = steps
            .iter()
            .filter(|s| s.kind == StepKind::QualificationSignals)
            .collect();
        assert_eq!(qualification.len(), 1);
        assert_eq!(steps.last().unwrap().step_id, QUALIFICATION_STEP_ID);
        assert!(qualification[0].question.contains("{signals}"));
    }
}
