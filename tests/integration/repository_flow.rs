//! Repository lifecycle against the file-backed store.

use rust_decimal_macros::dec;
use std::path::PathBuf;
use std::sync::Arc;

use parlay_core::slip::normalize::normalize;
use parlay_core::storage::{FileStore, KeyValueStore, ParlayRepository, Preferences};
use parlay_core::types::{Parlay, ParlayError, ParlayResult, ParlayStatus, Sportsbook};

use crate::mock_service::analysis;

fn temp_dir() -> PathBuf {
    let mut p = std::env::temp_dir();
    p.push(format!("parlay_repo_it_{}", uuid::Uuid::new_v4()));
    p
}

fn parlay(name: &str) -> Parlay {
    let legs = vec![
        normalize(&analysis("A", "X", 70.0)).unwrap(),
        normalize(&analysis("B", "Y", 60.0)).unwrap(),
    ];
    Parlay::new(name, 1, legs, Some(Sportsbook::PrizePicks)).unwrap()
}

#[tokio::test]
async fn test_lifecycle_draft_placed_settled() {
    let dir = temp_dir();
    let repo = ParlayRepository::new(Arc::new(FileStore::new(&dir)), 3);
    let id = repo.save_parlay(parlay("Life")).await.unwrap().id;

    assert!(repo.mark_as_placed(&id, Some(dec!(25.00))).await.unwrap());
    let placed = repo.get_parlay(&id).await.unwrap().unwrap();
    assert_eq!(placed.status, ParlayStatus::Placed);
    assert_eq!(placed.bet_amount, Some(dec!(25.00)));
    assert!(placed.placed_at.is_some());

    let result = ParlayResult { won: false, legs_hit: 1, legs_total: 2 };
    assert!(repo.record_result(&id, result).await.unwrap());
    let settled = repo.get_parlays_by_status(ParlayStatus::Lost).await.unwrap();
    assert_eq!(settled.len(), 1);
    assert_eq!(settled[0].result, Some(result));
    assert_eq!(settled[0].combined_confidence(), 65);

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_unknown_id_changes_nothing() {
    let dir = temp_dir();
    let store = Arc::new(FileStore::new(&dir));
    let repo = ParlayRepository::new(store.clone(), 3);
    repo.save_parlay(parlay("Only")).await.unwrap();
    let before = store.get("parlays").await.unwrap();

    assert!(!repo.mark_as_placed("missing", None).await.unwrap());
    assert!(!repo.delete_parlay("missing").await.unwrap());
    assert_eq!(store.get("parlays").await.unwrap(), before);

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_fourth_save_rejected_then_allowed_after_delete() {
    let dir = temp_dir();
    let repo = ParlayRepository::new(Arc::new(FileStore::new(&dir)), 3);
    let first = repo.save_parlay(parlay("1")).await.unwrap();
    repo.save_parlay(parlay("2")).await.unwrap();
    repo.save_parlay(parlay("3")).await.unwrap();
    assert_eq!(repo.remaining_slots().await.unwrap(), Some(0));

    let err = repo.save_parlay(parlay("4")).await.unwrap_err();
    assert!(matches!(err, ParlayError::QuotaExceeded { limit: 3 }));
    assert_eq!(repo.count().await.unwrap(), 3);

    assert!(repo.delete_parlay(&first.id).await.unwrap());
    assert_eq!(repo.count().await.unwrap(), 2);
    repo.save_parlay(parlay("4")).await.unwrap();
    assert_eq!(repo.count().await.unwrap(), 3);

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_guest_bets_and_preferences_share_store_but_not_quota() {
    let dir = temp_dir();
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(&dir));
    let repo = ParlayRepository::new(store.clone(), 3);
    let guest = ParlayRepository::guest(store.clone());
    let prefs = Preferences::new(store);

    for i in 0..5 {
        guest.save_parlay(parlay(&format!("G{i}"))).await.unwrap();
    }
    prefs
        .set_preferred_sportsbook(Some(Sportsbook::Underdog))
        .await
        .unwrap();

    assert_eq!(guest.count().await.unwrap(), 5);
    assert_eq!(guest.remaining_slots().await.unwrap(), None);
    assert_eq!(repo.count().await.unwrap(), 0);
    assert_eq!(
        prefs.preferred_sportsbook().await.unwrap(),
        Some(Sportsbook::Underdog)
    );

    let _ = std::fs::remove_dir_all(&dir);
}
