//! Fit scoring.
//!
//! [`FitScorer::score`] is pure: same inputs, same assessment, no I/O.

use crate::config::ScoringConfig;
use crate::model::{FitLevel, MatchStrength, MatchedSignal, QualificationSignal};

/// Weight applied to the importance of POTENTIALLY MATCHES signals.
pub const POTENTIAL_MATCH_WEIGHT: f64 = 0.5;

/// Output of fit scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct FitAssessment {
    /// Weighted share of importance matched, in [0, 1].
    pub fit_score: f64,
    pub fit_level: FitLevel,
    pub fit_explanation: String,
}

/// Computes fit score and level from matched signals.
#[derive(Debug, Clone, Default)]
pub struct FitScorer {
    config: ScoringConfig,
}

impl FitScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Score matched signals against the defined ones.
    ///
    /// Matches that do not name a defined signal are ignored, as are repeats.
    pub fn score(&self, matched: &[MatchedSignal], defined: &[QualificationSignal]) -> FitAssessment {
        let total: u32 = defined.iter().map(|s| u32::from(s.importance)).sum();

        // Resolve each defined signal to its strongest match, if any.
        let resolved: Vec<(&QualificationSignal, Option<MatchStrength>)> = defined
            .iter()
            .map(|signal| {
                let strength = matched
                    .iter()
                    .filter(|m| m.name == signal.name)
                    .map(|m| m.match_strength)
                    .max();
                (signal, strength)
            })
            .collect();

        let earned: f64 = resolved
            .iter()
            .filter_map(|(signal, strength)| {
                strength.map(|s| f64::from(signal.importance) * weight(s))
            })
            .sum();

        let fit_score = if total == 0 {
            0.0
        } else {
            round4((earned / f64::from(total)).clamp(0.0, 1.0))
        };

        let high_matches = resolved
            .iter()
            .filter(|(signal, strength)| {
                signal.importance >= self.config.high_importance
                    && *strength == Some(MatchStrength::Matches)
            })
            .count();
        let any_match = resolved.iter().any(|(_, s)| s.is_some());

        let fit_level = self.level(fit_score, high_matches, any_match);
        let fit_explanation = explain(&resolved, earned, total, fit_score, fit_level, &self.config);

        FitAssessment {
            fit_score,
            fit_level,
            fit_explanation,
        }
    }

    fn level(&self, score: f64, high_matches: usize, any_match: bool) -> FitLevel {
        let c = &self.config;
        if !any_match {
            FitLevel::Poor
        } else if high_matches >= c.excellent_high_matches || score >= c.excellent_score {
            FitLevel::Excellent
        } else if high_matches >= c.good_high_matches || score >= c.good_score {
            FitLevel::Good
        } else if high_matches >= 1 || score >= c.fair_score {
            FitLevel::Fair
        } else {
            FitLevel::Poor
        }
    }
}

fn weight(strength: MatchStrength) -> f64 {
    match strength {
        MatchStrength::Matches => 1.0,
        MatchStrength::PotentiallyMatches => POTENTIAL_MATCH_WEIGHT,
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

fn explain(
    resolved: &[(&QualificationSignal, Option<MatchStrength>)],
    earned: f64,
    total: u32,
    score: f64,
    level: FitLevel,
    config: &ScoringConfig,
) -> String {
    let matched_count = resolved.iter().filter(|(_, s)| s.is_some()).count();
    let names = |pred: &dyn Fn(&QualificationSignal, Option<MatchStrength>) -> bool| {
        let list: Vec<&str> = resolved
            .iter()
            .filter(|(sig, s)| pred(sig, *s))
            .map(|(sig, _)| sig.name.as_str())
            .collect();
        if list.is_empty() {
            "none".to_string()
        } else {
            list.join(", ")
        }
    };
    let is_high = |sig: &QualificationSignal| sig.importance >= config.high_importance;

    let mut text = format!(
        "Fit is {}: matched {} of {} qualification signals ({} of {} importance points, score {:.2}).",
        level,
        matched_count,
        resolved.len(),
        format_points(earned),
        total,
        score
    );
    text.push_str(&format!(
        " High-importance signals matched: {}.",
        names(&|sig, s| is_high(sig) && s == Some(MatchStrength::Matches))
    ));
    text.push_str(&format!(
        " High-importance signals not matched: {}.",
        names(&|sig, s| is_high(sig) && s != Some(MatchStrength::Matches))
    ));

    let others = names(&|sig, s| !is_high(sig) && s.is_some());
    if others != "none" {
        text.push_str(&format!(" Other matched signals: {}.", others));
    }
    let potential = names(&|_, s| s == Some(MatchStrength::PotentiallyMatches));
    if potential != "none" {
        text.push_str(&format!(" Potential matches (half weight): {}.", potential));
    }
    text
}

fn format_points(points: f64) -> String {
    if points.fract() == 0.0 {
        format!("{}", points as u32)
    } else {
        format!("{:.1}", points)
    }
}
