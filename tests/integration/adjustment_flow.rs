//! Line adjustments through the coordinator, in the wizard and on
//! persisted drafts.

use std::sync::Arc;
use std::time::Duration;

use parlay_core::config::LimitsConfig;
use parlay_core::engine::{LineAdjustmentCoordinator, ParlayWizard};
use parlay_core::slip::normalize::normalize;
use parlay_core::slip::PickSet;
use parlay_core::storage::{MemoryStore, ParlayRepository};
use parlay_core::types::{
    IdentityKey, Parlay, ParlayError, ParlayPatch, ParlayResult, ParlayStatus, Sportsbook,
};

use crate::mock_service::{analysis, MockService};

fn key(player: &str) -> IdentityKey {
    IdentityKey::new(player, "receiving_yards")
}

fn coordinator(service: Arc<MockService>, timeout_ms: u64) -> LineAdjustmentCoordinator {
    LineAdjustmentCoordinator::new(service, Duration::from_millis(timeout_ms))
}

async fn review_wizard() -> ParlayWizard {
    let mut w = ParlayWizard::new(&LimitsConfig::default());
    w.set_name("Adjusted").unwrap();
    w.set_sportsbook(Sportsbook::DraftKings).unwrap();
    w.advance().unwrap();
    w.add_analysis(&analysis("A", "X", 70.0)).unwrap();
    w.add_analysis(&analysis("B", "Y", 60.0)).unwrap();
    w.advance().unwrap();
    w
}

#[tokio::test]
async fn test_noop_adjustment_never_calls_service() {
    let service = Arc::new(MockService::new(40.0));
    let coord = coordinator(service.clone(), 1_000);
    let mut w = review_wizard().await;

    let err = w.adjust_line(&coord, &key("A"), 55.5).await.unwrap_err();
    assert!(matches!(err, ParlayError::NoOpAdjustment { .. }));
    assert_eq!(service.recompute_calls(), 0);
    assert_eq!(w.summary().combined_confidence, 65);
}

#[tokio::test]
async fn test_adjustment_updates_leg_and_aggregate() {
    let service = Arc::new(MockService::new(40.0));
    let coord = coordinator(service.clone(), 1_000);
    let mut w = review_wizard().await;

    let summary = w.adjust_line(&coord, &key("A"), 60.5).await.unwrap();
    assert_eq!(summary.combined_confidence, 50);

    let leg = w.picks().get(&key("A")).unwrap();
    assert_eq!(leg.line, 60.5);
    assert_eq!(leg.original_line, 55.5);
    assert_eq!(leg.adjusted_line, Some(60.5));
    assert_eq!(leg.player_name, "A");
    assert_eq!(leg.team, "X");
    assert_eq!(service.recompute_calls(), 1);
}

#[tokio::test]
async fn test_timeout_leaves_slip_unchanged() {
    let service = Arc::new(MockService::new(40.0));
    service.set_delay(Duration::from_millis(500));
    let coord = coordinator(service.clone(), 20);
    let mut w = review_wizard().await;

    let err = w.adjust_line(&coord, &key("A"), 60.5).await.unwrap_err();
    assert!(matches!(err, ParlayError::RecomputeFailed(_)));
    assert!(err.is_retryable());
    assert!(!w.adjustment_in_flight());
    assert_eq!(w.picks().get(&key("A")).unwrap().line, 55.5);
    assert_eq!(w.summary().combined_confidence, 65);
}

#[tokio::test]
async fn test_result_arriving_after_back_is_discarded() {
    let service = Arc::new(MockService::new(10.0));
    let coord = coordinator(service.clone(), 1_000);
    let mut w = review_wizard().await;

    let ticket = w.begin_line_adjustment(&key("A"), 60.5).unwrap();
    w.back().unwrap();
    let outcome = coord
        .recompute(ticket.leg(), ticket.new_line(), ticket.week())
        .await;
    assert!(outcome.is_ok());

    assert!(matches!(
        w.complete_line_adjustment(ticket, outcome),
        Err(ParlayError::StaleResult)
    ));
    assert_eq!(w.picks().get(&key("A")).unwrap().confidence, 70.0);
}

#[tokio::test]
async fn test_adjust_pick_outside_wizard() {
    let service = Arc::new(MockService::new(0.9));
    let coord = coordinator(service, 1_000);
    let mut picks = PickSet::default();
    picks.add(normalize(&analysis("A", "X", 70.0)).unwrap()).unwrap();
    picks.add(normalize(&analysis("B", "Y", 50.0)).unwrap()).unwrap();

    let summary = coord.adjust_pick(&mut picks, &key("B"), 49.5, 3).await.unwrap();
    assert_eq!(summary.combined_confidence, 80);
    assert_eq!(picks.summary(), &summary);

    let missing = coord.adjust_pick(&mut picks, &key("Z"), 49.5, 3).await;
    assert!(matches!(missing, Err(ParlayError::LegNotFound(_))));
}

#[tokio::test]
async fn test_saved_draft_adjustable_until_placed() {
    let service = Arc::new(MockService::new(40.0));
    let coord = coordinator(service.clone(), 1_000);
    let repo = ParlayRepository::new(Arc::new(MemoryStore::new()), 3);

    let legs = vec![
        normalize(&analysis("A", "X", 70.0)).unwrap(),
        normalize(&analysis("B", "Y", 60.0)).unwrap(),
    ];
    let parlay = Parlay::new("Saved draft", 4, legs, Some(Sportsbook::Caesars)).unwrap();
    let id = repo.save_parlay(parlay).await.unwrap().id;

    let updated = coord
        .adjust_saved_leg(&repo, &id, &key("B"), 52.5)
        .await
        .unwrap();
    assert_eq!(updated.combined_confidence(), 55);
    let stored = repo.get_parlay(&id).await.unwrap().unwrap();
    assert_eq!(stored.legs()[1].line, 52.5);
    assert_eq!(stored.combined_confidence(), 55);

    assert!(repo.mark_as_placed(&id, None).await.unwrap());
    let err = coord
        .adjust_saved_leg(&repo, &id, &key("B"), 50.5)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ParlayError::ParlayLocked { status: ParlayStatus::Placed, .. }
    ));
    assert_eq!(service.recompute_calls(), 1);
}

#[tokio::test]
async fn test_settled_parlay_stays_locked() {
    let service = Arc::new(MockService::new(40.0));
    let coord = coordinator(service.clone(), 1_000);
    let repo = ParlayRepository::new(Arc::new(MemoryStore::new()), 3);

    let legs = vec![
        normalize(&analysis("A", "X", 70.0)).unwrap(),
        normalize(&analysis("B", "Y", 60.0)).unwrap(),
    ];
    let parlay = Parlay::new("Settled", 4, legs, None).unwrap();
    let id = repo.save_parlay(parlay).await.unwrap().id;
    repo.mark_as_placed(&id, None).await.unwrap();
    let won = ParlayResult { won: true, legs_hit: 2, legs_total: 2 };
    repo.record_result(&id, won).await.unwrap();

    assert!(repo.mark_as_placed(&id, None).await.is_err());
    let reopen = ParlayPatch {
        status: Some(ParlayStatus::Draft),
        ..Default::default()
    };
    assert!(matches!(
        repo.update_parlay(&id, reopen).await,
        Err(ParlayError::InvalidTransition { .. })
    ));

    let err = coord
        .adjust_saved_leg(&repo, &id, &key("B"), 50.5)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ParlayError::ParlayLocked { status: ParlayStatus::Won, .. }
    ));
    let stored = repo.get_parlay(&id).await.unwrap().unwrap();
    assert_eq!(stored.status, ParlayStatus::Won);
    assert_eq!(stored.result, Some(won));
    assert_eq!(service.recompute_calls(), 0);
}
