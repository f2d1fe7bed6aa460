//! Line adjustment coordinator.
//!
//! Sends a user-edited line to the remote recompute endpoint and merges
//! the returned confidence and cushion into the affected leg. A leg is
//! only ever replaced whole, after the service has answered, so a line
//! change without its matching confidence is never observable.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::analysis::{AnalysisService, LineRecomputeRequest, LineRecomputeResponse};
use crate::config::ServiceConfig;
use crate::slip::normalize::normalize_confidence;
use crate::slip::{PickSet, SlipSummary};
use crate::storage::ParlayRepository;
use crate::types::{IdentityKey, Leg, Parlay, ParlayError, ParlayStatus};

/// Lines closer than this are the same line.
const LINE_EPSILON: f64 = 1e-9;

/// A recomputed leg, ready to merge.
#[derive(Debug, Clone, PartialEq)]
pub struct LineAdjustment {
    pub key: IdentityKey,
    pub previous_line: f64,
    pub new_line: f64,
    /// 0–100.
    pub adjusted_confidence: f64,
    pub adjusted_cushion: f64,
    pub recommendation: String,
}

impl LineAdjustment {
    fn from_response(leg: &Leg, new_line: f64, resp: LineRecomputeResponse) -> Self {
        Self {
            key: leg.key(),
            previous_line: leg.line,
            new_line,
            adjusted_confidence: normalize_confidence(resp.adjusted_confidence),
            adjusted_cushion: resp.adjusted_cushion,
            recommendation: resp.recommendation,
        }
    }

    /// The leg with only `line`, `adjusted_line`, `confidence` and
    /// `cushion` replaced.
    pub fn apply_to(&self, leg: &Leg) -> Leg {
        Leg {
            line: self.new_line,
            adjusted_line: Some(self.new_line),
            confidence: self.adjusted_confidence,
            cushion: Some(self.adjusted_cushion),
            ..leg.clone()
        }
    }
}

/// Reject non-finite lines and lines equal to the current one.
pub fn validate_new_line(leg: &Leg, new_line: f64) -> Result<(), ParlayError> {
    if !new_line.is_finite() {
        return Err(ParlayError::InvalidLine(format!(
            "{new_line} for {}",
            leg.player_name
        )));
    }
    if (new_line - leg.line).abs() < LINE_EPSILON {
        return Err(ParlayError::NoOpAdjustment { line: leg.line });
    }
    Ok(())
}

/// Parse a line typed by the user.
pub fn parse_line(input: &str) -> Result<f64, ParlayError> {
    input
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ParlayError::InvalidLine(format!("'{}' is not a number", input.trim())))
}

pub struct LineAdjustmentCoordinator {
    service: Arc<dyn AnalysisService>,
    timeout: Duration,
}

impl LineAdjustmentCoordinator {
    pub fn new(service: Arc<dyn AnalysisService>, timeout: Duration) -> Self {
        Self { service, timeout }
    }

    pub fn from_config(service: Arc<dyn AnalysisService>, config: &ServiceConfig) -> Self {
        Self::new(service, Duration::from_secs(config.timeout_secs))
    }

    /// Validate and ask the service to re-evaluate `leg` at `new_line`.
    ///
    /// Does not touch any slip; the caller merges the result. Service
    /// errors and timeouts both surface as `RecomputeFailed`.
    pub async fn recompute(
        &self,
        leg: &Leg,
        new_line: f64,
        week: u32,
    ) -> Result<LineAdjustment, ParlayError> {
        validate_new_line(leg, new_line)?;

        let request = LineRecomputeRequest {
            player_name: leg.player_name.clone(),
            stat_type: leg.stat_type.clone(),
            bet_type: leg.bet_type,
            original_line: leg.original_line,
            new_line,
            week,
        };

        let response = match tokio::time::timeout(self.timeout, self.service.recompute_line(&request)).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => {
                warn!(
                    player = %leg.player_name,
                    service = self.service.name(),
                    error = %e,
                    "Line recompute failed"
                );
                return Err(ParlayError::RecomputeFailed(format!("{e:#}")));
            }
            Err(_) => {
                warn!(
                    player = %leg.player_name,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Line recompute timed out"
                );
                return Err(ParlayError::RecomputeFailed(format!(
                    "timed out after {:?}",
                    self.timeout
                )));
            }
        };

        if !response.adjusted_confidence.is_finite() || !response.adjusted_cushion.is_finite() {
            return Err(ParlayError::RecomputeFailed(
                "service returned a non-numeric confidence or cushion".to_string(),
            ));
        }

        let adjustment = LineAdjustment::from_response(leg, new_line, response);
        info!(
            player = %leg.player_name,
            stat = %leg.stat_type,
            from = leg.line,
            to = new_line,
            confidence_before = leg.confidence,
            confidence_after = adjustment.adjusted_confidence,
            "Line recomputed"
        );
        Ok(adjustment)
    }

    /// Adjust a leg of an in-memory slip in place.
    pub async fn adjust_pick(
        &self,
        picks: &mut PickSet,
        key: &IdentityKey,
        new_line: f64,
        week: u32,
    ) -> Result<SlipSummary, ParlayError> {
        let leg = picks
            .get(key)
            .cloned()
            .ok_or_else(|| ParlayError::LegNotFound(key.clone()))?;
        let adjustment = self.recompute(&leg, new_line, week).await?;
        Ok(picks.replace(key, adjustment.apply_to(&leg))?.clone())
    }

    /// Adjust a leg of a persisted parlay. Only drafts may change.
    pub async fn adjust_saved_leg(
        &self,
        repo: &ParlayRepository,
        parlay_id: &str,
        key: &IdentityKey,
        new_line: f64,
    ) -> Result<Parlay, ParlayError> {
        let parlay = repo
            .get_parlay(parlay_id)
            .await?
            .ok_or_else(|| ParlayError::ParlayNotFound(parlay_id.to_string()))?;
        if parlay.status != ParlayStatus::Draft {
            warn!(id = parlay_id, status = %parlay.status, "Line adjustment rejected: parlay is not a draft");
            return Err(ParlayError::ParlayLocked {
                id: parlay_id.to_string(),
                status: parlay.status,
            });
        }
        let leg = parlay
            .legs()
            .iter()
            .find(|l| &l.key() == key)
            .cloned()
            .ok_or_else(|| ParlayError::LegNotFound(key.clone()))?;

        let adjustment = self.recompute(&leg, new_line, parlay.week).await?;
        repo.replace_draft_leg(parlay_id, key, leg.line, adjustment.apply_to(&leg))
            .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
