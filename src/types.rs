//! Shared types for the parlay core.
//!
//! Legs, parlays, lifecycle enums, and the domain error taxonomy. The
//! slip, engine, and storage modules all build on these so they can
//! depend on one another without circular references.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::slip::{self, SlipSummary};

/// Smallest number of legs a parlay may hold.
pub const MIN_LEGS: usize = 2;
/// Largest number of legs a parlay may hold.
pub const MAX_LEGS: usize = 6;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Direction of a player-prop bet relative to its line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BetType {
    #[serde(alias = "over", alias = "Over")]
    Over,
    #[serde(alias = "under", alias = "Under")]
    Under,
}

impl fmt::Display for BetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetType::Over => write!(f, "OVER"),
            BetType::Under => write!(f, "UNDER"),
        }
    }
}

impl std::str::FromStr for BetType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "over" | "o" | "more" => Ok(BetType::Over),
            "under" | "u" | "less" => Ok(BetType::Under),
            _ => Err(anyhow::anyhow!("Unknown bet type: {s}")),
        }
    }
}

/// Parlay-level risk tier. Ordered so that `max` picks the more severe tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    #[serde(alias = "low", alias = "Low")]
    Low,
    #[serde(alias = "medium", alias = "Medium")]
    Medium,
    #[serde(alias = "high", alias = "High")]
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::High => write!(f, "HIGH"),
        }
    }
}

/// Lifecycle status of a persisted parlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParlayStatus {
    Draft,
    Placed,
    Won,
    Lost,
    Pending,
}

impl ParlayStatus {
    pub const ALL: &'static [ParlayStatus] = &[
        ParlayStatus::Draft,
        ParlayStatus::Placed,
        ParlayStatus::Won,
        ParlayStatus::Lost,
        ParlayStatus::Pending,
    ];

    /// Whether the parlay has been graded as a final outcome.
    pub fn is_settled(&self) -> bool {
        matches!(self, ParlayStatus::Won | ParlayStatus::Lost)
    }

    /// Lifecycle moves: draft → placed → pending → won/lost, with placed
    /// allowed to settle directly. Staying put is always allowed; nothing
    /// moves backwards and settled parlays are final.
    pub fn can_transition_to(&self, next: ParlayStatus) -> bool {
        use ParlayStatus::*;
        *self == next
            || matches!(
                (self, next),
                (Draft, Placed) | (Placed, Pending | Won | Lost) | (Pending, Won | Lost)
            )
    }
}

impl fmt::Display for ParlayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParlayStatus::Draft => write!(f, "draft"),
            ParlayStatus::Placed => write!(f, "placed"),
            ParlayStatus::Won => write!(f, "won"),
            ParlayStatus::Lost => write!(f, "lost"),
            ParlayStatus::Pending => write!(f, "pending"),
        }
    }
}

impl std::str::FromStr for ParlayStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Ok(ParlayStatus::Draft),
            "placed" => Ok(ParlayStatus::Placed),
            "won" => Ok(ParlayStatus::Won),
            "lost" => Ok(ParlayStatus::Lost),
            "pending" => Ok(ParlayStatus::Pending),
            _ => Err(anyhow::anyhow!("Unknown parlay status: {s}")),
        }
    }
}

/// Sportsbook a parlay is intended for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sportsbook {
    DraftKings,
    FanDuel,
    BetMgm,
    Caesars,
    PointsBet,
    Bet365,
    PrizePicks,
    Underdog,
}

impl Sportsbook {
    pub const ALL: &'static [Sportsbook] = &[
        Sportsbook::DraftKings,
        Sportsbook::FanDuel,
        Sportsbook::BetMgm,
        Sportsbook::Caesars,
        Sportsbook::PointsBet,
        Sportsbook::Bet365,
        Sportsbook::PrizePicks,
        Sportsbook::Underdog,
    ];
}

impl fmt::Display for Sportsbook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Sportsbook::DraftKings => "DraftKings",
            Sportsbook::FanDuel => "FanDuel",
            Sportsbook::BetMgm => "BetMGM",
            Sportsbook::Caesars => "Caesars",
            Sportsbook::PointsBet => "PointsBet",
            Sportsbook::Bet365 => "bet365",
            Sportsbook::PrizePicks => "PrizePicks",
            Sportsbook::Underdog => "Underdog",
        };
        write!(f, "{name}")
    }
}

/// Case-insensitive parse that ignores spaces, hyphens, and underscores.
impl std::str::FromStr for Sportsbook {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match compact.as_str() {
            "draftkings" | "dk" => Ok(Sportsbook::DraftKings),
            "fanduel" | "fd" => Ok(Sportsbook::FanDuel),
            "betmgm" | "mgm" => Ok(Sportsbook::BetMgm),
            "caesars" => Ok(Sportsbook::Caesars),
            "pointsbet" => Ok(Sportsbook::PointsBet),
            "bet365" => Ok(Sportsbook::Bet365),
            "prizepicks" => Ok(Sportsbook::PrizePicks),
            "underdog" | "underdogfantasy" => Ok(Sportsbook::Underdog),
            _ => Err(anyhow::anyhow!("Unknown sportsbook: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Leg
// ---------------------------------------------------------------------------

/// De-duplication key for a leg: the player and the stat being predicted.
///
/// Both parts are stored trimmed and lowercased, so keys built from
/// differently-formatted inputs for the same prediction compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityKey {
    player: String,
    stat: String,
}

impl IdentityKey {
    pub fn new(player_name: &str, stat_type: &str) -> Self {
        Self {
            player: slip::normalize::collapse_whitespace(player_name).to_lowercase(),
            stat: slip::normalize::canonical_stat_type(stat_type),
        }
    }

    pub fn player(&self) -> &str {
        &self.player
    }

    pub fn stat(&self) -> &str {
        &self.stat
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.player, self.stat)
    }
}

/// One player/stat prediction within a parlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    pub player_name: String,
    pub team: String,
    pub position: String,
    pub stat_type: String,
    pub bet_type: BetType,
    /// Line currently in effect (the adjusted line once the user overrides it).
    pub line: f64,
    /// Line as first offered by the analysis service.
    pub original_line: f64,
    #[serde(default)]
    pub adjusted_line: Option<f64>,
    /// Model confidence, 0–100.
    pub confidence: f64,
    #[serde(default)]
    pub projection: Option<f64>,
    /// Signed distance `projection - line`.
    #[serde(default)]
    pub cushion: Option<f64>,
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} {}) {} {} {} [{:.0}%]",
            self.player_name,
            self.team,
            self.position,
            self.bet_type,
            self.line,
            self.stat_type,
            self.confidence,
        )
    }
}

impl Leg {
    pub fn key(&self) -> IdentityKey {
        IdentityKey::new(&self.player_name, &self.stat_type)
    }

    /// Whether the user has overridden the offered line.
    pub fn is_adjusted(&self) -> bool {
        self.adjusted_line.is_some()
    }

    #[cfg(test)]
    pub fn sample(player: &str, team: &str, confidence: f64) -> Self {
        Leg {
            player_name: player.to_string(),
            team: team.to_string(),
            position: "WR".to_string(),
            stat_type: "receiving_yards".to_string(),
            bet_type: BetType::Over,
            line: 55.5,
            original_line: 55.5,
            adjusted_line: None,
            confidence,
            projection: Some(61.0),
            cushion: Some(5.5),
        }
    }
}

// ---------------------------------------------------------------------------
// Grading & results
// ---------------------------------------------------------------------------

/// Grade returned by the remote grading collaborator.
///
/// Once present, `adjusted_confidence` overrides the locally computed
/// combined confidence for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParlayGrade {
    pub grade: String,
    pub adjusted_confidence: f64,
    #[serde(default)]
    pub recommendation: String,
    #[serde(default)]
    pub analysis: String,
    #[serde(default)]
    pub value_edge: f64,
    #[serde(default)]
    pub risk_factors: Vec<String>,
}

/// Outcome of a settled parlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParlayResult {
    pub won: bool,
    pub legs_hit: u32,
    pub legs_total: u32,
}

impl fmt::Display for ParlayResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = if self.won { "WON" } else { "LOST" };
        write!(f, "{outcome} ({}/{} legs hit)", self.legs_hit, self.legs_total)
    }
}

// ---------------------------------------------------------------------------
// Parlay
// ---------------------------------------------------------------------------

/// A combined bet slip of 2–6 legs.
///
/// `combined_confidence` and `risk_level` are derived from `legs` and have
/// no setters. They are recomputed on construction, on every leg change,
/// and on deserialization, so a stale or hand-edited stored value is never
/// exposed. Deserialization also rejects records whose legs break the
/// size or uniqueness rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ParlayRecord")]
pub struct Parlay {
    pub id: String,
    pub name: String,
    pub week: u32,
    legs: Vec<Leg>,
    combined_confidence: u8,
    risk_level: RiskLevel,
    pub sportsbook: Option<Sportsbook>,
    pub status: ParlayStatus,
    pub created_at: DateTime<Utc>,
    pub placed_at: Option<DateTime<Utc>>,
    pub bet_amount: Option<Decimal>,
    pub result: Option<ParlayResult>,
    pub grade: Option<ParlayGrade>,
}

/// Serialized shape of a parlay. Derived fields are accepted but ignored.
#[derive(Deserialize)]
struct ParlayRecord {
    id: String,
    name: String,
    #[serde(default)]
    week: u32,
    legs: Vec<Leg>,
    #[serde(default)]
    sportsbook: Option<Sportsbook>,
    status: ParlayStatus,
    created_at: DateTime<Utc>,
    #[serde(default)]
    placed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    bet_amount: Option<Decimal>,
    #[serde(default)]
    result: Option<ParlayResult>,
    #[serde(default)]
    grade: Option<ParlayGrade>,
}

impl TryFrom<ParlayRecord> for Parlay {
    type Error = ParlayError;

    fn try_from(r: ParlayRecord) -> Result<Self, Self::Error> {
        validate_legs(&r.legs)?;
        let mut parlay = Parlay {
            id: r.id,
            name: r.name,
            week: r.week,
            legs: r.legs,
            combined_confidence: 0,
            risk_level: RiskLevel::High,
            sportsbook: r.sportsbook,
            status: r.status,
            created_at: r.created_at,
            placed_at: r.placed_at,
            bet_amount: r.bet_amount,
            result: r.result,
            grade: r.grade,
        };
        parlay.refresh_derived();
        Ok(parlay)
    }
}

/// Leg count within bounds and identity keys unique.
fn validate_legs(legs: &[Leg]) -> Result<(), ParlayError> {
    if !(MIN_LEGS..=MAX_LEGS).contains(&legs.len()) {
        return Err(ParlayError::StepValidation(format!(
            "A parlay needs between {MIN_LEGS} and {MAX_LEGS} legs, got {}",
            legs.len()
        )));
    }
    let mut seen = std::collections::HashSet::new();
    for leg in legs {
        let key = leg.key();
        if !seen.insert(key.clone()) {
            return Err(ParlayError::DuplicateLeg(key));
        }
    }
    Ok(())
}

impl fmt::Display for Parlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} (week {}) {} legs, {}% confidence, {} risk, {}",
            self.id,
            self.name,
            self.week,
            self.legs.len(),
            self.effective_confidence(),
            self.risk_level,
            self.status,
        )
    }
}

impl Parlay {
    /// Build a new draft parlay, validating leg count and uniqueness.
    pub fn new(
        name: &str,
        week: u32,
        legs: Vec<Leg>,
        sportsbook: Option<Sportsbook>,
    ) -> Result<Self, ParlayError> {
        validate_legs(&legs)?;

        let mut parlay = Parlay {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            week,
            legs,
            combined_confidence: 0,
            risk_level: RiskLevel::High,
            sportsbook,
            status: ParlayStatus::Draft,
            created_at: Utc::now(),
            placed_at: None,
            bet_amount: None,
            result: None,
            grade: None,
        };
        parlay.refresh_derived();
        Ok(parlay)
    }

    pub fn legs(&self) -> &[Leg] {
        &self.legs
    }

    pub fn combined_confidence(&self) -> u8 {
        self.combined_confidence
    }

    pub fn risk_level(&self) -> RiskLevel {
        self.risk_level
    }

    /// Confidence to display: the grader's figure once a grade exists,
    /// otherwise the local mean.
    pub fn effective_confidence(&self) -> u8 {
        match &self.grade {
            Some(g) => slip::confidence::to_percent(g.adjusted_confidence),
            None => self.combined_confidence,
        }
    }

    /// Full derived view including correlation warnings.
    pub fn summary(&self) -> SlipSummary {
        SlipSummary::compute(&self.legs)
    }

    /// Replace the leg at `index` and recompute. Any grade is dropped since
    /// it was computed against the old legs.
    pub(crate) fn replace_leg(&mut self, index: usize, leg: Leg) {
        self.legs[index] = leg;
        self.grade = None;
        self.refresh_derived();
    }

    /// Merge the non-empty fields of a patch. A status change must be a
    /// legal lifecycle move; on rejection nothing is applied.
    pub fn apply_patch(&mut self, patch: ParlayPatch) -> Result<(), ParlayError> {
        if let Some(next) = patch.status {
            if !self.status.can_transition_to(next) {
                return Err(ParlayError::InvalidTransition {
                    from: self.status.to_string(),
                    to: next.to_string(),
                });
            }
        }
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(week) = patch.week {
            self.week = week;
        }
        if let Some(book) = patch.sportsbook {
            self.sportsbook = Some(book);
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(at) = patch.placed_at {
            self.placed_at = Some(at);
        }
        if let Some(amount) = patch.bet_amount {
            self.bet_amount = Some(amount);
        }
        if let Some(result) = patch.result {
            self.result = Some(result);
        }
        if let Some(grade) = patch.grade {
            self.grade = Some(grade);
        }
        Ok(())
    }

    fn refresh_derived(&mut self) {
        let summary = SlipSummary::compute(&self.legs);
        self.combined_confidence = summary.combined_confidence;
        self.risk_level = summary.risk_level;
    }
}

/// Partial update for a persisted parlay. Legs and derived fields are
/// deliberately absent: they cannot be patched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParlayPatch {
    pub name: Option<String>,
    pub week: Option<u32>,
    pub sportsbook: Option<Sportsbook>,
    pub status: Option<ParlayStatus>,
    pub placed_at: Option<DateTime<Utc>>,
    pub bet_amount: Option<Decimal>,
    pub result: Option<ParlayResult>,
    pub grade: Option<ParlayGrade>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain errors surfaced to the UI layer.
#[derive(Debug, thiserror::Error)]
pub enum ParlayError {
    #[error("Leg already in slip: {0}")]
    DuplicateLeg(IdentityKey),

    #[error("Slip is full: at most {max} legs allowed")]
    CapacityExceeded { max: usize },

    #[error("New line {line} is the same as the current line")]
    NoOpAdjustment { line: f64 },

    #[error("Invalid line value: {0}")]
    InvalidLine(String),

    #[error("Line recompute failed: {0}")]
    RecomputeFailed(String),

    #[error("Parlay grading failed: {0}")]
    GradingFailed(String),

    #[error("Free tier limit reached ({limit} saved parlays). Upgrade to Premium for unlimited parlays, or delete one to free a slot.")]
    QuotaExceeded { limit: usize },

    #[error("Storage error: {0}")]
    StorageIo(String),

    #[error("A parlay with id {0} is already saved")]
    DuplicateParlay(String),

    #[error("Parlay not found: {0}")]
    ParlayNotFound(String),

    #[error("Leg not found: {0}")]
    LegNotFound(IdentityKey),

    #[error("Parlay {id} is {status}; legs can only change while it is a draft")]
    ParlayLocked { id: String, status: ParlayStatus },

    #[error("Cannot move from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("{0}")]
    StepValidation(String),

    #[error("A line adjustment is already in progress for {0}")]
    AdjustmentInFlight(IdentityKey),

    #[error("Result discarded: the slip changed while the request was pending")]
    StaleResult,
}

impl ParlayError {
    /// Whether the user can reasonably retry the same action.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ParlayError::RecomputeFailed(_)
                | ParlayError::GradingFailed(_)
                | ParlayError::StorageIo(_)
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
