//! Slip construction: leg normalization, the pick set, and the derived
//! confidence and correlation figures.

pub mod confidence;
pub mod correlation;
pub mod normalize;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::types::{IdentityKey, Leg, ParlayError, RiskLevel, MAX_LEGS};
use correlation::CorrelationReport;

// ---------------------------------------------------------------------------
// Derived summary
// ---------------------------------------------------------------------------

/// Everything derived from the current legs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlipSummary {
    pub leg_count: usize,
    /// `round(mean(confidence))`.
    pub combined_confidence: u8,
    /// Unrounded mean, 0 when empty.
    pub average_confidence: f64,
    /// Population standard deviation of leg confidences.
    pub dispersion: f64,
    pub risk_level: RiskLevel,
    pub correlation: CorrelationReport,
}

impl SlipSummary {
    pub fn compute(legs: &[Leg]) -> Self {
        let confidences: Vec<f64> = legs.iter().map(|l| l.confidence).collect();
        let correlation = correlation::classify(legs);
        let combined = confidence::combined_confidence(&confidences);
        Self {
            leg_count: legs.len(),
            combined_confidence: combined,
            average_confidence: confidence::mean(&confidences).unwrap_or(0.0),
            dispersion: confidence::dispersion(&confidences),
            risk_level: confidence::risk_level(combined, correlation.contribution),
            correlation,
        }
    }

    pub fn warnings(&self) -> &[String] {
        &self.correlation.warnings
    }
}

// ---------------------------------------------------------------------------
// Pick set
// ---------------------------------------------------------------------------

/// Ordered, de-duplicated legs of the slip under construction.
///
/// Every successful mutation recomputes the summary before returning, so
/// `summary()` never reflects an earlier set of legs.
#[derive(Debug, Clone)]
pub struct PickSet {
    legs: Vec<Leg>,
    capacity: usize,
    summary: SlipSummary,
}

impl Default for PickSet {
    fn default() -> Self {
        Self::new(MAX_LEGS)
    }
}

impl PickSet {
    /// Create an empty set. Capacity is capped at `MAX_LEGS`.
    pub fn new(capacity: usize) -> Self {
        Self {
            legs: Vec::new(),
            capacity: capacity.clamp(1, MAX_LEGS),
            summary: SlipSummary::compute(&[]),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.legs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.legs.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.legs.len() >= self.capacity
    }

    /// Legs in insertion order (leg numbering shown to the user).
    pub fn legs(&self) -> &[Leg] {
        &self.legs
    }

    pub fn summary(&self) -> &SlipSummary {
        &self.summary
    }

    pub fn contains(&self, key: &IdentityKey) -> bool {
        self.position(key).is_some()
    }

    pub fn position(&self, key: &IdentityKey) -> Option<usize> {
        self.legs.iter().position(|l| &l.key() == key)
    }

    pub fn get(&self, key: &IdentityKey) -> Option<&Leg> {
        self.legs.iter().find(|l| &l.key() == key)
    }

    /// Append a leg. Rejected legs leave the set untouched.
    pub fn add(&mut self, leg: Leg) -> Result<&SlipSummary, ParlayError> {
        let key = leg.key();
        if self.contains(&key) {
            return Err(ParlayError::DuplicateLeg(key));
        }
        if self.is_full() {
            return Err(ParlayError::CapacityExceeded { max: self.capacity });
        }
        info!(leg = %leg, position = self.legs.len() + 1, "Leg added to slip");
        self.legs.push(leg);
        Ok(self.recompute())
    }

    /// Remove the leg with `key`. Returns whether anything was removed.
    pub fn remove(&mut self, key: &IdentityKey) -> bool {
        match self.position(key) {
            Some(idx) => {
                let leg = self.legs.remove(idx);
                info!(leg = %leg, "Leg removed from slip");
                self.recompute();
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        if !self.legs.is_empty() {
            debug!(count = self.legs.len(), "Slip cleared");
        }
        self.legs.clear();
        self.recompute();
    }

    /// Swap in a replacement for the leg with `key`, keeping its position.
    /// The replacement must carry the same identity key.
    pub(crate) fn replace(&mut self, key: &IdentityKey, leg: Leg) -> Result<&SlipSummary, ParlayError> {
        let idx = self
            .position(key)
            .ok_or_else(|| ParlayError::LegNotFound(key.clone()))?;
        debug_assert_eq!(&leg.key(), key);
        self.legs[idx] = leg;
        Ok(self.recompute())
    }

    fn recompute(&mut self) -> &SlipSummary {
        self.summary = SlipSummary::compute(&self.legs);
        debug!(
            legs = self.summary.leg_count,
            combined = self.summary.combined_confidence,
            risk = %self.summary.risk_level,
            warnings = self.summary.correlation.warnings.len(),
            "Slip summary recomputed"
        );
        &self.summary
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
