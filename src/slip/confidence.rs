//! Confidence aggregator.
//!
//! Combines per-leg confidences into one parlay-level figure and maps it
//! to a risk tier. The combined figure is the rounded arithmetic mean of
//! leg confidences; the grader's adjusted confidence is kept separately
//! on the parlay and never feeds back into this calculation.

use crate::types::RiskLevel;

/// Combined confidence at or above this is LOW risk (absent correlation).
pub const LOW_RISK_MIN_CONFIDENCE: u8 = 65;
/// Combined confidence at or above this (and below the LOW floor) is MEDIUM.
pub const MEDIUM_RISK_MIN_CONFIDENCE: u8 = 50;

/// Arithmetic mean of the confidences, or `None` for an empty slice.
pub fn mean(confidences: &[f64]) -> Option<f64> {
    if confidences.is_empty() {
        return None;
    }
    Some(confidences.iter().sum::<f64>() / confidences.len() as f64)
}

/// Population standard deviation of the confidences (0 for fewer than two).
pub fn dispersion(confidences: &[f64]) -> f64 {
    match mean(confidences) {
        Some(m) if confidences.len() > 1 => {
            let var = confidences.iter().map(|c| (c - m).powi(2)).sum::<f64>()
                / confidences.len() as f64;
            var.sqrt()
        }
        _ => 0.0,
    }
}

/// Round a 0–100 value to a whole percentage.
pub fn to_percent(value: f64) -> u8 {
    if !value.is_finite() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u8
}

/// `round(mean(c))`; an empty slip has zero combined confidence.
pub fn combined_confidence(confidences: &[f64]) -> u8 {
    mean(confidences).map(to_percent).unwrap_or(0)
}

/// Risk tier implied by combined confidence alone.
pub fn confidence_tier(combined: u8) -> RiskLevel {
    if combined >= LOW_RISK_MIN_CONFIDENCE {
        RiskLevel::Low
    } else if combined >= MEDIUM_RISK_MIN_CONFIDENCE {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    }
}

/// Final tier: the more severe of the confidence tier and the correlation
/// contribution.
pub fn risk_level(combined: u8, correlation: RiskLevel) -> RiskLevel {
    confidence_tier(combined).max(correlation)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
