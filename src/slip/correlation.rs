//! Correlation classifier.
//!
//! Legs on the same team are not independent: a blowout or a bad game
//! script moves all of them together. Any team with two or more legs is
//! flagged. One flagged pair is MEDIUM risk; a second flagged team, or
//! three or more legs from one team, is HIGH.

use serde::{Deserialize, Serialize};

use crate::types::{Leg, RiskLevel};

/// Legs from one team at or above this count are flagged.
pub const CORRELATED_MIN_LEGS: usize = 2;
/// Legs from one team at or above this count force HIGH risk.
pub const SEVERE_CORRELATION_LEGS: usize = 3;

/// A team with more than one leg in the slip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamCorrelation {
    pub team: String,
    pub count: usize,
}

impl TeamCorrelation {
    pub fn warning(&self) -> String {
        format!(
            "{} legs from {}: outcomes are correlated",
            self.count, self.team
        )
    }
}

/// Output of the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationReport {
    /// Flagged teams, in order of first appearance in the slip.
    pub groups: Vec<TeamCorrelation>,
    pub warnings: Vec<String>,
    /// `Low` when nothing is flagged.
    pub contribution: RiskLevel,
}

impl Default for CorrelationReport {
    fn default() -> Self {
        Self {
            groups: Vec::new(),
            warnings: Vec::new(),
            contribution: RiskLevel::Low,
        }
    }
}

impl CorrelationReport {
    pub fn has_flags(&self) -> bool {
        !self.groups.is_empty()
    }
}

/// Group legs by team (case-insensitive) and flag the shared ones.
pub fn classify(legs: &[Leg]) -> CorrelationReport {
    let mut counts: Vec<(String, String, usize)> = Vec::new();
    for leg in legs {
        let display = leg.team.trim();
        if display.is_empty() {
            continue;
        }
        let norm = display.to_lowercase();
        match counts.iter_mut().find(|(k, _, _)| *k == norm) {
            Some((_, _, n)) => *n += 1,
            None => counts.push((norm, display.to_string(), 1)),
        }
    }

    let groups: Vec<TeamCorrelation> = counts
        .into_iter()
        .filter(|(_, _, n)| *n >= CORRELATED_MIN_LEGS)
        .map(|(_, team, count)| TeamCorrelation { team, count })
        .collect();

    let contribution = if groups.iter().any(|g| g.count >= SEVERE_CORRELATION_LEGS)
        || groups.len() >= 2
    {
        RiskLevel::High
    } else if groups.len() == 1 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    CorrelationReport {
        warnings: groups.iter().map(TeamCorrelation::warning).collect(),
        groups,
        contribution,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
