//! Leg normalizer.
//!
//! Turns a raw player analysis (as returned by the remote analysis
//! service) into a canonical `Leg` whose identity key is comparable
//! for de-duplication.

use serde::Deserialize;
use tracing::debug;

use crate::types::{BetType, Leg, ParlayError};

/// A player analysis as it arrives from the analysis service.
///
/// Field names follow the service's JSON. Confidence may be either a
/// 0–1 fraction or a 0–100 percentage depending on the endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RawAnalysis {
    pub player_name: String,
    #[serde(default)]
    pub team: String,
    #[serde(default)]
    pub position: String,
    pub stat_type: String,
    pub line: f64,
    /// "OVER" / "UNDER", or the shorthand "O" / "U".
    #[serde(alias = "recommendation")]
    pub bet_type: String,
    pub confidence: f64,
    #[serde(default)]
    pub projection: Option<f64>,
}

/// Collapse runs of whitespace into single spaces and trim the ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercase a stat type and join its words with underscores, so
/// "Passing Yards", "passing-yards" and "passing_yards" are one stat.
pub fn canonical_stat_type(s: &str) -> String {
    s.split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|part| !part.is_empty())
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}

/// Bring a confidence value onto the 0–100 scale.
///
/// Values in `[0, 1]` are treated as fractions. Anything else is taken as
/// a percentage and clamped.
pub fn normalize_confidence(raw: f64) -> f64 {
    if !raw.is_finite() {
        return 0.0;
    }
    let pct = if (0.0..=1.0).contains(&raw) { raw * 100.0 } else { raw };
    pct.clamp(0.0, 100.0)
}

/// Build a canonical leg from a raw analysis.
pub fn normalize(raw: &RawAnalysis) -> Result<Leg, ParlayError> {
    let player_name = collapse_whitespace(&raw.player_name);
    if player_name.is_empty() {
        return Err(ParlayError::StepValidation(
            "Analysis has no player name".to_string(),
        ));
    }
    let stat_type = canonical_stat_type(&raw.stat_type);
    if stat_type.is_empty() {
        return Err(ParlayError::StepValidation(format!(
            "Analysis for {player_name} has no stat type"
        )));
    }
    if !raw.line.is_finite() {
        return Err(ParlayError::InvalidLine(format!(
            "{} for {player_name}",
            raw.line
        )));
    }
    let bet_type: BetType = raw
        .bet_type
        .parse()
        .map_err(|e: anyhow::Error| ParlayError::StepValidation(e.to_string()))?;

    let projection = raw.projection.filter(|p| p.is_finite());
    let leg = Leg {
        player_name,
        team: collapse_whitespace(&raw.team).to_uppercase(),
        position: collapse_whitespace(&raw.position).to_uppercase(),
        stat_type,
        bet_type,
        line: raw.line,
        original_line: raw.line,
        adjusted_line: None,
        confidence: normalize_confidence(raw.confidence),
        projection,
        cushion: projection.map(|p| p - raw.line),
    };

    debug!(
        player = %leg.player_name,
        stat = %leg.stat_type,
        confidence = leg.confidence,
        "Analysis normalized into leg"
    );
    Ok(leg)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
