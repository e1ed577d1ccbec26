//! Sales insight synthesis.
//!
//! One generation call per category, run concurrently. Every failure is
//! contained: a category that cannot be produced comes back empty.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::ExtractionError;
use crate::langbase::extract_json_from_completion;
use crate::model::{
    DecisionMaker, MatchedSignal, ObjectionHandling, PainPoint, SellingProduct, TargetCompany,
    ValueProposition,
};
use crate::prompts::{
    DECISION_MAKERS_PROMPT, OBJECTION_HANDLING_PROMPT, PAIN_POINTS_PROMPT,
    VALUE_PROPOSITIONS_PROMPT,
};
use crate::research::ResearchCapability;

/// Derived sales insights for a report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Insights {
    pub pain_points: Vec<PainPoint>,
    pub value_propositions: Vec<ValueProposition>,
    pub objection_handling: Vec<ObjectionHandling>,
    pub key_decision_makers: Vec<DecisionMaker>,
}

/// Produces [`Insights`] from the matched signals.
#[derive(Clone)]
pub struct InsightSynthesizer {
    capability: Arc<dyn ResearchCapability>,
    timeout: Duration,
}

impl InsightSynthesizer {
    pub fn new(capability: Arc<dyn ResearchCapability>, timeout: Duration) -> Self {
        Self {
            capability,
            timeout,
        }
    }

    /// Generate insights. No call is made when nothing matched.
    pub async fn synthesize(
        &self,
        target: &TargetCompany,
        product: &SellingProduct,
        matched: &[MatchedSignal],
    ) -> Insights {
        if matched.is_empty() {
            debug!(target = %target.name, "No matched signals; skipping insight synthesis");
            return Insights::default();
        }

        let background = background(target, product, matched);

        let (pain, value, objections, makers) = tokio::join!(
            self.generate("pain_points", PAIN_POINTS_PROMPT, &background),
            self.generate("value_propositions", VALUE_PROPOSITIONS_PROMPT, &background),
            self.generate("objection_handling", OBJECTION_HANDLING_PROMPT, &background),
            self.generate("key_decision_makers", DECISION_MAKERS_PROMPT, &background),
        );

        let matched_names: HashSet<&str> = matched.iter().map(|m| m.name.as_str()).collect();
        let pain_points: Vec<PainPoint> = parse_list::<RawPainPoint>("pain_points", pain)
            .into_iter()
            .filter_map(|p| {
                let signal = matched_names
                    .iter()
                    .find(|name| name.eq_ignore_ascii_case(p.signal.trim()))
                    .map(|name| name.to_string());
                if signal.is_none() {
                    warn!(signal = %p.signal, "Dropping pain point tied to an unmatched signal");
                }
                signal.map(|signal| (p, signal))
            })
            .enumerate()
            .map(|(i, (p, signal))| PainPoint {
                id: p.id.unwrap_or_else(|| format!("pp-{}", i + 1)),
                text: p.text,
                signal,
            })
            .collect();

        let value_propositions = parse_list::<RawValueProposition>("value_propositions", value)
            .into_iter()
            .enumerate()
            .map(|(i, v)| ValueProposition {
                id: v.id.unwrap_or_else(|| format!("vp-{}", i + 1)),
                text: v.text,
                context: v.context.unwrap_or_default(),
            })
            .collect::<Vec<_>>();

        let objection_handling =
            parse_list::<ObjectionHandling>("objection_handling", objections);
        let key_decision_makers = parse_list::<DecisionMaker>("key_decision_makers", makers);

        info!(
            target = %target.name,
            pain_points = pain_points.len(),
            value_propositions = value_propositions.len(),
            objections = objection_handling.len(),
            decision_makers = key_decision_makers.len(),
            "Insights synthesized"
        );

        Insights {
            pain_points,
            value_propositions,
            objection_handling,
            key_decision_makers,
        }
    }

    async fn generate(&self, category: &str, prompt: &str, background: &str) -> Option<String> {
        match self.capability.ask(prompt, background, self.timeout).await {
            Ok(answer) => Some(answer.answer),
            Err(e) => {
                warn!(category, error = %e, "Insight generation failed");
                None
            }
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct RawPainPoint {
    #[serde(default)]
    id: Option<String>,
    text: String,
    signal: String,
}

#[derive(Debug, serde::Deserialize)]
struct RawValueProposition {
    #[serde(default)]
    id: Option<String>,
    text: String,
    #[serde(default)]
    context: Option<String>,
}

fn background(target: &TargetCompany, product: &SellingProduct, matched: &[MatchedSignal]) -> String {
    let mut out = format!("Prospect: {}", target.name);
    if let Some(industry) = target.industry.as_deref() {
        out.push_str(&format!(" ({})", industry));
    }
    if let Some(description) = target.description.as_deref() {
        out.push_str(&format!("\n{}", description));
    }
    out.push_str(&format!("\n\nVendor product: {}", product.name));
    if let Some(description) = product.description.as_deref() {
        out.push_str(&format!("\n{}", description));
    }
    if let Some(vp) = product.value_proposition.as_deref() {
        out.push_str(&format!("\nValue proposition: {}", vp));
    }
    out.push_str("\n\nMatched qualification signals:");
    for m in matched {
        out.push_str(&format!(
            "\n- {} (importance {}/5): {}",
            m.name, m.importance, m.evidence
        ));
    }
    out
}

/// Parse a JSON list, keeping every element that deserializes.
fn parse_list<T: DeserializeOwned>(category: &str, completion: Option<String>) -> Vec<T> {
    let Some(completion) = completion else {
        return Vec::new();
    };
    match parse_elements::<T>(&completion) {
        Ok((items, dropped)) => {
            if dropped > 0 {
                warn!(category, dropped, "Dropped malformed insight entries");
            }
            items
        }
        Err(e) => {
            warn!(category, error = %e, "Could not parse insight response");
            Vec::new()
        }
    }
}

fn parse_elements<T: DeserializeOwned>(completion: &str) -> Result<(Vec<T>, usize), ExtractionError> {
    let json = extract_json_from_completion(completion)
        .map_err(|message| ExtractionError::NoContent { message })?;
    let value: Value = serde_json::from_str(json).map_err(|e| ExtractionError::Malformed {
        message: e.to_string(),
    })?;

    let elements = match value {
        Value::Array(items) => items,
        // Tolerate a wrapper object holding the single list.
        Value::Object(map) => map
            .into_iter()
            .find_map(|(_, v)| match v {
                Value::Array(items) => Some(items),
                _ => None,
            })
            .ok_or_else(|| ExtractionError::Malformed {
                message: "object contains no list".to_string(),
            })?,
        other => {
            return Err(ExtractionError::Malformed {
                message: format!("expected a list, got {}", other),
            })
        }
    };

    let total = elements.len();
    let items: Vec<T> = elements
        .into_iter()
        .filter_map(|v| serde_json::from_value(v).ok())
        .collect();
    let dropped = total - items.len();
    Ok((items, dropped))
}
