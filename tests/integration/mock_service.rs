//! Mock analysis service for integration testing.
//!
//! Deterministic `AnalysisService` implementation with controllable
//! latency and failure, counting every call it receives.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use parlay_core::analysis::{
    AnalysisService, CorrelationScore, DfsPick, FlexCandidate, FlexPick, LineRecomputeRequest,
    LineRecomputeResponse,
};
use parlay_core::slip::normalize::RawAnalysis;
use parlay_core::types::{Leg, ParlayGrade, RiskLevel};

pub struct MockService {
    /// Confidence returned for every recompute.
    adjusted_confidence: f64,
    delay: Mutex<Option<Duration>>,
    /// If set, every call fails with this message.
    force_error: Mutex<Option<String>>,
    recompute_calls: AtomicUsize,
    grade_calls: AtomicUsize,
}

impl MockService {
    pub fn new(adjusted_confidence: f64) -> Self {
        Self {
            adjusted_confidence,
            delay: Mutex::new(None),
            force_error: Mutex::new(None),
            recompute_calls: AtomicUsize::new(0),
            grade_calls: AtomicUsize::new(0),
        }
    }

    /// Delay every response by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn recompute_calls(&self) -> usize {
        self.recompute_calls.load(Ordering::SeqCst)
    }

    pub fn grade_calls(&self) -> usize {
        self.grade_calls.load(Ordering::SeqCst)
    }

    async fn simulate(&self) -> Result<()> {
        let delay = *self.delay.lock().unwrap();
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        let err = self.force_error.lock().unwrap().clone();
        match err {
            Some(msg) => Err(anyhow!(msg)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl AnalysisService for MockService {
    async fn recompute_line(&self, req: &LineRecomputeRequest) -> Result<LineRecomputeResponse> {
        self.recompute_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate().await?;
        Ok(LineRecomputeResponse {
            adjusted_confidence: self.adjusted_confidence,
            adjusted_cushion: req.original_line - req.new_line,
            projection: None,
            recommendation: "OVER".to_string(),
        })
    }

    async fn grade_parlay(&self, legs: &[Leg]) -> Result<ParlayGrade> {
        self.grade_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate().await?;
        Ok(ParlayGrade {
            grade: "C+".to_string(),
            adjusted_confidence: 58.0,
            recommendation: "Consider trimming a leg".to_string(),
            analysis: format!("{} legs graded", legs.len()),
            value_edge: -0.01,
            risk_factors: vec!["Same-team stack".to_string()],
        })
    }

    async fn score_correlation(&self, picks: &[DfsPick]) -> Result<CorrelationScore> {
        self.simulate().await?;
        Ok(CorrelationScore {
            total_penalty: 0.05 * picks.len() as f64,
            warnings: Vec::new(),
            risk_level: RiskLevel::Low,
            adjusted_confidence: 62.0,
        })
    }

    async fn flex_pick(&self, picks: &[DfsPick]) -> Result<FlexPick> {
        self.simulate().await?;
        let first = picks.first().ok_or_else(|| anyhow!("no picks"))?;
        Ok(FlexPick {
            flex_pick: first.player_name.clone(),
            reason: "Highest floor".to_string(),
            all_candidates: Some(vec![FlexCandidate {
                player_name: first.player_name.clone(),
                score: 0.9,
            }]),
        })
    }

    fn name(&self) -> &'static str {
        "mock-analysis"
    }
}

/// A raw analysis result as the service would return it.
pub fn analysis(player: &str, team: &str, confidence: f64) -> RawAnalysis {
    RawAnalysis {
        player_name: player.to_string(),
        team: team.to_string(),
        position: "wr".to_string(),
        stat_type: "Receiving Yards".to_string(),
        line: 55.5,
        bet_type: "OVER".to_string(),
        confidence,
        projection: Some(62.0),
    }
}
