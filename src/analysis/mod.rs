//! Remote analysis service integration.
//!
//! Defines the `AnalysisService` trait, the boundary to the remote
//! models that recompute a leg at a new line, grade a full parlay, and
//! score DFS pick correlation. The core never second-guesses these
//! responses; it only merges them into local state.

pub mod client;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{BetType, Leg, ParlayGrade, RiskLevel};

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Ask the model to re-evaluate a leg at a user-chosen line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineRecomputeRequest {
    pub player_name: String,
    pub stat_type: String,
    pub bet_type: BetType,
    pub original_line: f64,
    pub new_line: f64,
    pub week: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineRecomputeResponse {
    pub adjusted_confidence: f64,
    pub adjusted_cushion: f64,
    #[serde(default)]
    pub projection: Option<f64>,
    #[serde(default)]
    pub recommendation: String,
}

/// A pick as sent to the DFS correlation and flex endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DfsPick {
    pub player_name: String,
    pub team: String,
    pub position: String,
    pub stat_type: String,
    pub line: f64,
    pub confidence: f64,
}

impl From<&Leg> for DfsPick {
    fn from(leg: &Leg) -> Self {
        Self {
            player_name: leg.player_name.clone(),
            team: leg.team.clone(),
            position: leg.position.clone(),
            stat_type: leg.stat_type.clone(),
            line: leg.line,
            confidence: leg.confidence,
        }
    }
}

/// Server-side correlation penalty for a set of DFS picks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationScore {
    #[serde(default)]
    pub total_penalty: f64,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub risk_level: RiskLevel,
    pub adjusted_confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlexCandidate {
    pub player_name: String,
    #[serde(default)]
    pub score: f64,
}

/// Which pick the service recommends as the flex slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlexPick {
    pub flex_pick: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub all_candidates: Option<Vec<FlexCandidate>>,
}

// ---------------------------------------------------------------------------
// Service trait
// ---------------------------------------------------------------------------

/// Abstraction over the remote analysis endpoints.
///
/// Implementors own transport concerns (auth, retries, wire format).
/// Callers decide which failures are fatal: line recompute and grading
/// are, DFS scoring is advisory.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Re-evaluate a single leg at a new line.
    async fn recompute_line(&self, request: &LineRecomputeRequest) -> Result<LineRecomputeResponse>;

    /// Grade an ordered list of legs as one parlay.
    async fn grade_parlay(&self, legs: &[Leg]) -> Result<ParlayGrade>;

    /// Score same-team correlation for DFS picks.
    async fn score_correlation(&self, picks: &[DfsPick]) -> Result<CorrelationScore>;

    /// Recommend the flex pick among DFS picks.
    async fn flex_pick(&self, picks: &[DfsPick]) -> Result<FlexPick>;

    /// Service identifier for logging.
    fn name(&self) -> &'static str;
}
