//! Immutable run input and prompt rendering.

use regex::Regex;
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::error::ConfigurationError;
use crate::model::{QualificationSignal, ResearchStep, SellingProduct, StepMap, TargetCompany};

fn step_placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{step:([A-Za-z0-9_.\-]+)\}").expect("valid step placeholder regex"))
}

fn template_placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\{(company_name|company_website|company_industry|product_name|product_description|signals|step:([A-Za-z0-9_.\-]+))\}",
        )
        .expect("valid template placeholder regex")
    })
}

/// What one step sends to the research capability.
#[derive(Debug, Clone, PartialEq)]
pub struct StepContext {
    /// Rendered question.
    pub question: String,
    /// Company and product profile plus dependency answers.
    pub background: String,
    pub timeout: Duration,
}

/// The immutable input of a run: target, selling product and its signals.
///
/// Cheap to clone; runs never share mutable state through it.
#[derive(Debug, Clone)]
pub struct ProspectContext {
    target: Arc<TargetCompany>,
    product: Arc<SellingProduct>,
}

impl ProspectContext {
    pub fn new(target: TargetCompany, product: SellingProduct) -> Self {
        Self {
            target: Arc::new(target),
            product: Arc::new(product),
        }
    }

    pub fn target(&self) -> &TargetCompany {
        &self.target
    }

    pub fn product(&self) -> &SellingProduct {
        &self.product
    }

    pub fn signals(&self) -> &[QualificationSignal] {
        &self.product.qualification_signals
    }

    /// Check the target and the signal definitions.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.target.name.trim().is_empty() {
            return Err(ConfigurationError::MissingField {
                field: "target.name".to_string(),
            });
        }
        if self.product.name.trim().is_empty() {
            return Err(ConfigurationError::MissingField {
                field: "selling_product.name".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for signal in self.signals() {
            if signal.name.trim().is_empty() {
                return Err(ConfigurationError::InvalidSignal {
                    name: signal.name.clone(),
                    reason: "name is empty".to_string(),
                });
            }
            if !(1..=5).contains(&signal.importance) {
                return Err(ConfigurationError::InvalidSignal {
                    name: signal.name.clone(),
                    reason: format!("importance {} is outside 1..=5", signal.importance),
                });
            }
            if !seen.insert(signal.name.trim().to_lowercase()) {
                return Err(ConfigurationError::DuplicateSignal {
                    name: signal.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Check that steps are non-empty, uniquely named, and only depend on
    /// earlier steps.
    pub fn validate_steps(steps: &[ResearchStep]) -> Result<(), ConfigurationError> {
        if steps.is_empty() {
            return Err(ConfigurationError::NoSteps);
        }

        let mut earlier: HashSet<&str> = HashSet::new();
        for step in steps {
            if step.step_id.trim().is_empty() {
                return Err(ConfigurationError::MissingField {
                    field: "step_id".to_string(),
                });
            }
            if step.question.trim().is_empty() {
                return Err(ConfigurationError::EmptyQuestion {
                    step_id: step.step_id.clone(),
                });
            }
            if earlier.contains(step.step_id.as_str()) {
                return Err(ConfigurationError::DuplicateStep {
                    step_id: step.step_id.clone(),
                });
            }

            let referenced = step_placeholder()
                .captures_iter(&step.question)
                .filter_map(|c| c.get(1).map(|m| m.as_str()));
            for dependency in step.depends_on.iter().map(String::as_str).chain(referenced) {
                if !earlier.contains(dependency) {
                    return Err(ConfigurationError::UnknownDependency {
                        step_id: step.step_id.clone(),
                        dependency: dependency.to_string(),
                    });
                }
            }
            earlier.insert(step.step_id.as_str());
        }
        Ok(())
    }

    /// Render a question template.
    ///
    /// Placeholders: `{company_name}`, `{company_website}`, `{company_industry}`,
    /// `{product_name}`, `{product_description}`, `{signals}` and
    /// `{step:<id>}` for the answer of an earlier step.
    pub fn render(&self, template: &str, prior: &StepMap) -> String {
        // One pass, so substituted values are never re-scanned for placeholders.
        template_placeholder()
            .replace_all(template, |caps: &regex::Captures| {
                if let Some(step_id) = caps.get(2) {
                    return prior_answer(prior, step_id.as_str());
                }
                match &caps[1] {
                    "company_name" => self.target.name.clone(),
                    "company_website" => or_unknown(&self.target.website).to_string(),
                    "company_industry" => or_unknown(&self.target.industry).to_string(),
                    "product_name" => self.product.name.clone(),
                    "product_description" => or_unknown(&self.product.description).to_string(),
                    "signals" => self.signals_block(),
                    _ => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    /// Build everything a step sends alongside its question.
    pub fn step_context(
        &self,
        step: &ResearchStep,
        prior: &StepMap,
        default_timeout: Duration,
    ) -> StepContext {
        let mut background = self.profile();
        for dependency in &step.depends_on {
            background.push_str(&format!(
                "\n\n## Findings from {}\n{}",
                dependency,
                prior_answer(prior, dependency)
            ));
        }

        StepContext {
            question: self.render(&step.question, prior),
            background,
            timeout: step
                .timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(default_timeout),
        }
    }

    /// Company and product profile as prompt text.
    pub fn profile(&self) -> String {
        let t = &*self.target;
        let p = &*self.product;
        let mut out = format!("## Target company\nName: {}\n", t.name);
        push_opt(&mut out, "Website", &t.website);
        push_opt(&mut out, "Industry", &t.industry);
        push_opt(&mut out, "Description", &t.description);
        if let Some(year) = t.founded_year {
            out.push_str(&format!("Founded: {}\n", year));
        }
        push_opt(&mut out, "Location", &t.location);
        if let Some(count) = t.employee_count {
            out.push_str(&format!("Employees: {}\n", count));
        }
        push_opt(&mut out, "Revenue", &t.revenue);
        push_opt(&mut out, "Funding", &t.funding);
        push_list(&mut out, "Technologies", &t.technologies);
        push_list(&mut out, "Keywords", &t.keywords);

        out.push_str(&format!("\n## Selling product\nName: {}\n", p.name));
        push_opt(&mut out, "Website", &p.website);
        push_opt(&mut out, "Description", &p.description);
        push_opt(&mut out, "Value proposition", &p.value_proposition);
        push_list(&mut out, "Features", &p.features);
        push_list(&mut out, "Target industries", &p.target_industries);
        push_opt(&mut out, "Ideal customer profile", &p.ideal_customer_profile);
        push_list(&mut out, "Competitor alternatives", &p.competitor_alternatives);
        out
    }

    /// Qualification signals as a bulleted list with their rubrics.
    pub fn signals_block(&self) -> String {
        self.signals()
            .iter()
            .map(|s| {
                let mut line = format!("- {} (importance {}/5)", s.name, s.importance);
                if !s.description.is_empty() {
                    line.push_str(&format!(": {}", s.description));
                }
                if !s.detection_instructions.is_empty() {
                    line.push_str(&format!("\n  How to detect: {}", s.detection_instructions));
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn prior_answer(prior: &StepMap, step_id: &str) -> String {
    match prior.get(step_id) {
        Some(result) if result.is_completed() => result.answer.clone(),
        Some(_) => format!("(no answer available: step {} failed)", step_id),
        None => format!("(no answer available: step {} did not run)", step_id),
    }
}

fn or_unknown(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("unknown")
}

fn push_opt(out: &mut String, label: &str, value: &Option<String>) {
    if let Some(v) = value.as_deref().filter(|v| !v.trim().is_empty()) {
        out.push_str(&format!("{}: {}\n", label, v));
    }
}

fn push_list(out: &mut String, label: &str, values: &[String]) {
    if !values.is_empty() {
        out.push_str(&format!("{}: {}\n", label, values.join(", ")));
    }
}
