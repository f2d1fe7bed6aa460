//! End-to-end builder flows: setup, selection, review, save.

use std::path::PathBuf;
use std::sync::Arc;

use parlay_core::config::LimitsConfig;
use parlay_core::engine::{ParlayWizard, WizardStep};
use parlay_core::storage::{FileStore, MemoryStore, ParlayRepository};
use parlay_core::types::{IdentityKey, ParlayError, ParlayStatus, RiskLevel, Sportsbook};

use crate::mock_service::{analysis, MockService};

fn temp_dir() -> PathBuf {
    let mut p = std::env::temp_dir();
    p.push(format!("parlay_it_{}", uuid::Uuid::new_v4()));
    p
}

fn wizard_at_selection(name: &str) -> ParlayWizard {
    let mut w = ParlayWizard::new(&LimitsConfig::default());
    w.set_name(name).unwrap();
    w.set_week(7).unwrap();
    w.set_sportsbook(Sportsbook::FanDuel).unwrap();
    assert_eq!(w.advance().unwrap(), WizardStep::Selection);
    w
}

#[tokio::test]
async fn test_same_team_pair_saves_as_medium_risk() {
    let dir = temp_dir();
    let repo = ParlayRepository::new(Arc::new(FileStore::new(&dir)), 3);

    let mut w = wizard_at_selection("TNF stack");
    w.add_analysis(&analysis("Player A", "TeamX", 70.0)).unwrap();
    let summary = w.add_analysis(&analysis("Player B", "TeamX", 0.60)).unwrap();
    assert_eq!(summary.combined_confidence, 65);
    assert_eq!(summary.risk_level, RiskLevel::Medium);
    assert_eq!(summary.warnings().len(), 1);

    w.advance().unwrap();
    let saved = w.save(&repo, false).await.unwrap();
    assert_eq!(w.step(), WizardStep::Saved);

    // A fresh repository over the same directory sees the same record.
    let reopened = ParlayRepository::new(Arc::new(FileStore::new(&dir)), 3);
    let loaded = reopened.get_parlay(&saved.id).await.unwrap().unwrap();
    assert_eq!(loaded.combined_confidence(), 65);
    assert_eq!(loaded.risk_level(), RiskLevel::Medium);
    assert_eq!(loaded.status, ParlayStatus::Draft);
    assert_eq!(loaded.week, 7);
    assert_eq!(loaded.legs()[0].team, "TEAMX");

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_duplicate_pick_rejected_across_formatting() {
    let mut w = wizard_at_selection("Dupes");
    w.add_analysis(&analysis("Travis Kelce", "KC", 70.0)).unwrap();

    let mut again = analysis("  travis   KELCE ", "KC", 80.0);
    again.stat_type = "receiving-yards".to_string();
    let err = w.add_analysis(&again).unwrap_err();
    assert!(matches!(err, ParlayError::DuplicateLeg(_)));
    assert_eq!(w.picks().len(), 1);
    assert_eq!(w.summary().combined_confidence, 70);
}

#[tokio::test]
async fn test_seventh_leg_rejected() {
    let mut w = wizard_at_selection("Max");
    for i in 0..6 {
        w.add_analysis(&analysis(&format!("P{i}"), &format!("T{i}"), 70.0))
            .unwrap();
    }
    let err = w.add_analysis(&analysis("P6", "T6", 70.0)).unwrap_err();
    assert!(matches!(err, ParlayError::CapacityExceeded { max: 6 }));
    assert_eq!(w.picks().len(), 6);
}

#[tokio::test]
async fn test_grade_overrides_displayed_confidence() {
    let service = MockService::new(50.0);
    let repo = ParlayRepository::new(Arc::new(MemoryStore::new()), 3);

    let mut w = wizard_at_selection("Graded");
    w.add_analysis(&analysis("A", "X", 70.0)).unwrap();
    w.add_analysis(&analysis("B", "Y", 60.0)).unwrap();
    w.advance().unwrap();

    w.request_grade(&service).await.unwrap();
    assert_eq!(service.grade_calls(), 1);

    let saved = w.save(&repo, true).await.unwrap();
    assert_eq!(saved.combined_confidence(), 65);
    assert_eq!(saved.effective_confidence(), 58);
    assert_eq!(saved.status, ParlayStatus::Placed);
}

#[tokio::test]
async fn test_grading_outage_does_not_block_save() {
    let service = MockService::new(50.0);
    service.set_error("service unavailable");
    let repo = ParlayRepository::new(Arc::new(MemoryStore::new()), 3);

    let mut w = wizard_at_selection("Offline");
    w.add_analysis(&analysis("A", "X", 70.0)).unwrap();
    w.add_analysis(&analysis("B", "Y", 60.0)).unwrap();
    w.advance().unwrap();

    assert!(matches!(
        w.request_grade(&service).await,
        Err(ParlayError::GradingFailed(_))
    ));
    assert!(w.remote_correlation(&service).await.is_none());
    assert!(w.flex_pick(&service).await.is_none());

    let saved = w.save(&repo, false).await.unwrap();
    assert!(saved.grade.is_none());
    assert_eq!(saved.effective_confidence(), 65);
}

#[tokio::test]
async fn test_advisory_calls_when_service_is_up() {
    let service = MockService::new(50.0);
    let mut w = wizard_at_selection("Advice");
    w.add_analysis(&analysis("A", "X", 70.0)).unwrap();
    w.add_analysis(&analysis("B", "Y", 60.0)).unwrap();
    w.advance().unwrap();

    let score = w.remote_correlation(&service).await.unwrap();
    assert_eq!(score.risk_level, RiskLevel::Low);
    let flex = w.flex_pick(&service).await.unwrap();
    assert_eq!(flex.flex_pick, "A");
}

#[tokio::test]
async fn test_quota_rejection_keeps_slip_for_retry() {
    let repo = ParlayRepository::new(Arc::new(MemoryStore::new()), 3);
    let mut ids = Vec::new();
    for i in 0..3 {
        let mut w = wizard_at_selection(&format!("P{i}"));
        w.add_analysis(&analysis("A", "X", 70.0)).unwrap();
        w.add_analysis(&analysis("B", "Y", 60.0)).unwrap();
        w.advance().unwrap();
        ids.push(w.save(&repo, false).await.unwrap().id);
    }

    let mut w = wizard_at_selection("Fourth");
    w.add_analysis(&analysis("A", "X", 70.0)).unwrap();
    w.add_analysis(&analysis("B", "Y", 60.0)).unwrap();
    w.advance().unwrap();
    assert!(matches!(
        w.save(&repo, false).await,
        Err(ParlayError::QuotaExceeded { limit: 3 })
    ));
    assert_eq!(w.step(), WizardStep::Review);
    assert_eq!(repo.count().await.unwrap(), 3);

    // Freeing a slot lets the same wizard retry.
    assert!(repo.delete_parlay(&ids[0]).await.unwrap());
    let saved = w.save(&repo, false).await.unwrap();
    assert_eq!(saved.name, "Fourth");
    assert_eq!(repo.count().await.unwrap(), 3);
}

#[tokio::test]
async fn test_cancel_midway_persists_nothing() {
    let repo = ParlayRepository::new(Arc::new(MemoryStore::new()), 3);
    let mut w = wizard_at_selection("Abandoned");
    w.add_analysis(&analysis("A", "X", 70.0)).unwrap();
    w.add_analysis(&analysis("B", "Y", 60.0)).unwrap();
    w.advance().unwrap();
    w.cancel();

    assert_eq!(w.step(), WizardStep::Setup);
    assert!(w.picks().is_empty());
    assert_eq!(repo.count().await.unwrap(), 0);
    assert!(!w.picks().contains(&IdentityKey::new("A", "receiving_yards")));
}
