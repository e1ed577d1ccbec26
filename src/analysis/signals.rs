//! Qualification-signal extraction from research narrative.
//!
//! The qualification step answers in free text (or, sometimes, JSON). Each
//! defined signal gets a verdict of MATCHES, POTENTIALLY MATCHES or no match.
//! Extraction is fuzzy: malformed records are logged and dropped, never
//! raised.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::error::ExtractionError;
use crate::langbase::extract_json_from_completion;
use crate::model::{MatchStrength, MatchedSignal, QualificationSignal, StepResult};

/// Cap on the confidence of POTENTIALLY MATCHES verdicts.
pub const POTENTIAL_MATCH_CONFIDENCE: f64 = 0.5;

/// Strategy for turning a qualification step into matched signals.
pub trait SignalMatcher: Send + Sync {
    /// Extract matched signals. Output is a subset of `defined`, in
    /// definition order, at most one entry per signal.
    fn extract(&self, result: &StepResult, defined: &[QualificationSignal]) -> Vec<MatchedSignal>;
}

/// A verdict parsed from the step answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Matches,
    PotentiallyMatches,
    NoMatch,
}

/// Tokens that turn any verdict phrase into a rejection.
const NEGATIONS: &[&str] = &[
    "NOT", "NO", "NONE", "NEVER", "FALSE", "DOESN'T", "DOESNT", "ISN'T", "ISNT", "DON'T",
    "DONT", "UNLIKELY", "UNMATCHED", "MISMATCH", "MISMATCHES", "MISMATCHED",
];

const MATCH_PHRASES: &[&str] = &[
    "MATCHES", "MATCH", "MATCHED", "FULL MATCH", "STRONG MATCH", "YES", "TRUE",
];

const POTENTIAL_PHRASES: &[&str] = &[
    "POTENTIALLY MATCHES",
    "POTENTIAL MATCH",
    "LIKELY MATCHES",
    "LIKELY MATCH",
    "LIKELY",
    "PARTIALLY MATCHES",
    "PARTIAL MATCH",
    "POSSIBLY MATCHES",
    "POSSIBLE MATCH",
];

impl Verdict {
    /// Classify verdict text such as "MATCHES" or "likely matches".
    ///
    /// Any negation wins. Otherwise the whole phrase must be one of the
    /// accepted verdicts; anything else is unrecognized.
    pub fn parse(text: &str) -> Option<Self> {
        let normalized = text
            .to_uppercase()
            .replace(['_', '-'], " ")
            .replace(['\u{2019}', '\u{2018}', '`'], "'");
        let words: Vec<&str> = normalized
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '\''))
            .filter(|w| !w.is_empty())
            .collect();
        if words.is_empty() {
            return None;
        }
        if words.iter().any(|w| NEGATIONS.contains(w)) {
            return Some(Verdict::NoMatch);
        }

        let phrase = words.join(" ");
        if POTENTIAL_PHRASES.contains(&phrase.as_str()) {
            Some(Verdict::PotentiallyMatches)
        } else if MATCH_PHRASES.contains(&phrase.as_str()) {
            Some(Verdict::Matches)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
struct RawVerdict {
    name: String,
    verdict: Verdict,
    evidence: String,
    confidence: Option<f64>,
}

fn verdict_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^\s*(?:[-*•]|\d+[.)])?\s*(?P<name>[^:]+?)\s*:\s*\**\s*(?P<verdict>does\s+not\s+match(?:es)?|doesn['’]?t\s+match(?:es)?|not\s+(?:a\s+match|likely(?:\s+to\s+match)?|matching)|no\s+match|mismatch(?:es|ed)?|unlikely\s+(?:to\s+)?match(?:es)?|potentially\s+matches|likely\s+matches|partially\s+matches|matches)\b\**\s*(?:[-–—:.]\s*)?(?P<evidence>.*)$",
        )
        .expect("valid verdict regex")
    })
}

/// Default matcher over the MATCHES / POTENTIALLY MATCHES line format, with
/// a JSON fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextSignalMatcher {
    include_potential: bool,
}

impl TextSignalMatcher {
    pub fn new(include_potential: bool) -> Self {
        Self { include_potential }
    }

    /// Parse raw verdicts, preferring JSON when the answer contains any.
    fn parse_verdicts(&self, answer: &str) -> Vec<RawVerdict> {
        if let Ok(json) = extract_json_from_completion(answer) {
            match serde_json::from_str::<Value>(json) {
                Ok(value) => {
                    let verdicts = parse_json_verdicts(&value);
                    if !verdicts.is_empty() {
                        return verdicts;
                    }
                }
                Err(e) => debug!(error = %e, "Signal answer is not JSON, parsing as text"),
            }
        }
        parse_text_verdicts(answer)
    }

    fn promote(
        &self,
        raw: &RawVerdict,
        signal: &QualificationSignal,
        step_confidence: f64,
    ) -> Option<MatchedSignal> {
        let confidence = raw.confidence.unwrap_or(step_confidence).clamp(0.0, 1.0);
        let evidence = if raw.evidence.is_empty() {
            format!("{} reported as a match without supporting detail", signal.name)
        } else {
            raw.evidence.clone()
        };

        match raw.verdict {
            Verdict::Matches => Some(MatchedSignal::from_definition(
                signal,
                evidence,
                MatchStrength::Matches,
                confidence,
            )),
            Verdict::PotentiallyMatches if self.include_potential => {
                Some(MatchedSignal::from_definition(
                    signal,
                    evidence,
                    MatchStrength::PotentiallyMatches,
                    confidence.min(POTENTIAL_MATCH_CONFIDENCE),
                ))
            }
            _ => None,
        }
    }
}

impl SignalMatcher for TextSignalMatcher {
    fn extract(&self, result: &StepResult, defined: &[QualificationSignal]) -> Vec<MatchedSignal> {
        if !result.is_completed() || defined.is_empty() {
            return Vec::new();
        }

        let mut best: Vec<Option<MatchedSignal>> = vec![None; defined.len()];

        for raw in self.parse_verdicts(&result.answer) {
            let Some(idx) = resolve_signal(&raw.name, defined) else {
                let err = ExtractionError::UnknownSignal {
                    name: raw.name.clone(),
                };
                warn!(step_id = %result.step_id, error = %err, "Dropping verdict");
                continue;
            };

            let Some(candidate) = self.promote(&raw, &defined[idx], result.confidence) else {
                continue;
            };

            // Keep the strongest verdict per signal; ties keep the first.
            let replace = match &best[idx] {
                None => true,
                Some(existing) => candidate.match_strength > existing.match_strength,
            };
            if replace {
                best[idx] = Some(candidate);
            }
        }

        let matched: Vec<MatchedSignal> = best.into_iter().flatten().collect();
        debug!(
            step_id = %result.step_id,
            matched = matched.len(),
            defined = defined.len(),
            "Extracted qualification signals"
        );
        matched
    }
}

fn normalize_name(name: &str) -> String {
    name.trim()
        .trim_matches(|c: char| c == '*' || c == '"' || c == '\'' || c == '`' || c == '_')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn resolve_signal(name: &str, defined: &[QualificationSignal]) -> Option<usize> {
    let wanted = normalize_name(name);
    if wanted.is_empty() {
        return None;
    }
    defined
        .iter()
        .position(|s| normalize_name(&s.name) == wanted)
}

fn parse_text_verdicts(answer: &str) -> Vec<RawVerdict> {
    let mut verdicts: Vec<RawVerdict> = Vec::new();
    let mut continuing = false;

    for line in answer.lines() {
        if let Some(caps) = verdict_line().captures(line) {
            let Some(verdict) = Verdict::parse(&caps["verdict"]) else {
                continuing = false;
                continue;
            };
            verdicts.push(RawVerdict {
                name: caps["name"].to_string(),
                verdict,
                evidence: clean_evidence(&caps["evidence"]),
                confidence: None,
            });
            continuing = true;
        } else if line.trim().is_empty() {
            continuing = false;
        } else if continuing {
            // Indented or wrapped evidence belongs to the previous verdict.
            if let Some(last) = verdicts.last_mut() {
                let extra = clean_evidence(line);
                let extra = extra
                    .strip_prefix("Evidence:")
                    .or_else(|| extra.strip_prefix("evidence:"))
                    .map(str::trim)
                    .unwrap_or(&extra);
                if !extra.is_empty() {
                    if !last.evidence.is_empty() {
                        last.evidence.push(' ');
                    }
                    last.evidence.push_str(extra);
                }
            }
        }
    }
    verdicts
}

fn clean_evidence(text: &str) -> String {
    text.trim()
        .trim_start_matches(['-', '*', '•'])
        .trim()
        .to_string()
}

fn parse_json_verdicts(value: &Value) -> Vec<RawVerdict> {
    let records = match value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match ["signals", "qualification_signals", "matches", "results"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array))
        {
            Some(items) => items.as_slice(),
            None => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    records
        .iter()
        .filter_map(|record| match parse_json_record(record) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(error = %e, "Dropping malformed signal record");
                None
            }
        })
        .collect()
}

fn parse_json_record(record: &Value) -> Result<RawVerdict, ExtractionError> {
    let obj = record.as_object().ok_or_else(|| ExtractionError::Malformed {
        message: format!("expected object, got {}", record),
    })?;

    let name = ["name", "signal", "signal_name"]
        .iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str))
        .ok_or_else(|| ExtractionError::Malformed {
            message: "record has no signal name".to_string(),
        })?;

    let verdict = match ["status", "verdict", "match", "result"]
        .iter()
        .find_map(|k| obj.get(*k))
    {
        Some(Value::String(s)) => Verdict::parse(s),
        Some(Value::Bool(true)) => Some(Verdict::Matches),
        Some(Value::Bool(false)) => Some(Verdict::NoMatch),
        _ => None,
    }
    .ok_or_else(|| ExtractionError::Malformed {
        message: format!("record for {} has no recognizable verdict", name),
    })?;

    let evidence = obj
        .get("evidence")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();

    let confidence = obj
        .get("confidence")
        .and_then(Value::as_f64)
        .filter(|c| c.is_finite());

    Ok(RawVerdict {
        name: name.to_string(),
        verdict,
        evidence,
        confidence,
    })
}
