//! Parlay repository.
//!
//! Durable collection of finalized parlays stored as one JSON array under
//! a namespace key. Every write reads the full collection, mutates it,
//! and rewrites it as one unit while holding the store's write lock for
//! that key, so two in-flight saves cannot interleave their
//! read-modify-write, even through separate repository values.

use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{KeyValueStore, GUEST_BETS_KEY, PARLAYS_KEY};
use crate::types::{IdentityKey, Leg, Parlay, ParlayError, ParlayPatch, ParlayResult, ParlayStatus};

pub struct ParlayRepository {
    store: Arc<dyn KeyValueStore>,
    key: &'static str,
    /// `None` means unlimited.
    quota: Option<usize>,
}

impl ParlayRepository {
    /// The signed-in user's parlays, capped at `free_tier_limit`.
    pub fn new(store: Arc<dyn KeyValueStore>, free_tier_limit: usize) -> Self {
        Self {
            store,
            key: PARLAYS_KEY,
            quota: Some(free_tier_limit),
        }
    }

    /// Bets recorded while signed out. Same shape, no quota.
    pub fn guest(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            key: GUEST_BETS_KEY,
            quota: None,
        }
    }

    pub fn quota(&self) -> Option<usize> {
        self.quota
    }

    // -- Reads ---------------------------------------------------------------

    pub async fn get_all_parlays(&self) -> Result<Vec<Parlay>, ParlayError> {
        let raw = self
            .store
            .get(self.key)
            .await
            .map_err(|e| ParlayError::StorageIo(format!("{e:#}")))?;
        match raw {
            None => Ok(Vec::new()),
            Some(s) if s.trim().is_empty() => Ok(Vec::new()),
            Some(s) => serde_json::from_str(&s).map_err(|e| {
                ParlayError::StorageIo(format!("Corrupt parlay collection '{}': {e}", self.key))
            }),
        }
    }

    pub async fn get_parlay(&self, id: &str) -> Result<Option<Parlay>, ParlayError> {
        Ok(self.get_all_parlays().await?.into_iter().find(|p| p.id == id))
    }

    pub async fn get_parlays_by_status(
        &self,
        status: ParlayStatus,
    ) -> Result<Vec<Parlay>, ParlayError> {
        Ok(self
            .get_all_parlays()
            .await?
            .into_iter()
            .filter(|p| p.status == status)
            .collect())
    }

    /// Persisted parlays of every status; all of them count toward the quota.
    pub async fn count(&self) -> Result<usize, ParlayError> {
        Ok(self.get_all_parlays().await?.len())
    }

    /// Free slots left, or `None` when unlimited.
    pub async fn remaining_slots(&self) -> Result<Option<usize>, ParlayError> {
        match self.quota {
            Some(limit) => Ok(Some(limit.saturating_sub(self.count().await?))),
            None => Ok(None),
        }
    }

    // -- Writes --------------------------------------------------------------

    /// Append a parlay, enforcing the quota and id uniqueness.
    pub async fn save_parlay(&self, parlay: Parlay) -> Result<Parlay, ParlayError> {
        let quota = self.quota;
        let saved = self
            .mutate(move |all| {
                if all.iter().any(|p| p.id == parlay.id) {
                    warn!(id = %parlay.id, "Save rejected: id already stored");
                    return Err(ParlayError::DuplicateParlay(parlay.id.clone()));
                }
                if let Some(limit) = quota {
                    if all.len() >= limit {
                        warn!(limit, existing = all.len(), "Save rejected: free tier quota reached");
                        return Err(ParlayError::QuotaExceeded { limit });
                    }
                }
                all.push(parlay.clone());
                Ok((parlay, true))
            })
            .await?;

        info!(
            id = %saved.id,
            name = %saved.name,
            legs = saved.legs().len(),
            confidence = saved.combined_confidence(),
            risk = %saved.risk_level(),
            status = %saved.status,
            "Parlay saved"
        );
        Ok(saved)
    }

    /// Merge `patch` into the parlay with `id`. Returns false if not found,
    /// `InvalidTransition` if the patch moves the status backwards.
    pub async fn update_parlay(&self, id: &str, patch: ParlayPatch) -> Result<bool, ParlayError> {
        let updated = self
            .mutate(|all| match all.iter_mut().find(|p| p.id == id) {
                Some(p) => {
                    p.apply_patch(patch)?;
                    Ok((true, true))
                }
                None => Ok((false, false)),
            })
            .await?;
        if updated {
            debug!(id, "Parlay updated");
        } else {
            debug!(id, "Update skipped: parlay not found");
        }
        Ok(updated)
    }

    /// Delete the parlay with `id`, freeing a quota slot. Returns false if not found.
    pub async fn delete_parlay(&self, id: &str) -> Result<bool, ParlayError> {
        let removed = self
            .mutate(|all| {
                let before = all.len();
                all.retain(|p| p.id != id);
                let removed = all.len() != before;
                Ok((removed, removed))
            })
            .await?;
        if removed {
            info!(id, "Parlay deleted");
        }
        Ok(removed)
    }

    /// Mark a parlay as bet. Returns false (and writes nothing) if not found.
    ///
    /// Re-placing keeps the first `placed_at`; a pending or settled parlay
    /// cannot be placed again.
    pub async fn mark_as_placed(
        &self,
        id: &str,
        bet_amount: Option<Decimal>,
    ) -> Result<bool, ParlayError> {
        let placed = self
            .mutate(|all| match all.iter_mut().find(|p| p.id == id) {
                Some(p) => {
                    let placed_at = p.placed_at.unwrap_or_else(Utc::now);
                    p.apply_patch(ParlayPatch {
                        status: Some(ParlayStatus::Placed),
                        placed_at: Some(placed_at),
                        bet_amount,
                        ..Default::default()
                    })?;
                    Ok((true, true))
                }
                None => Ok((false, false)),
            })
            .await?;
        if placed {
            info!(id, amount = ?bet_amount, "Parlay marked as placed");
        }
        Ok(placed)
    }

    /// Manually settle a placed or pending parlay: status becomes won or
    /// lost from `result`. Drafts and already-settled parlays are rejected
    /// with `InvalidTransition` (re-recording the same outcome is allowed).
    pub async fn record_result(&self, id: &str, result: ParlayResult) -> Result<bool, ParlayError> {
        let status = if result.won { ParlayStatus::Won } else { ParlayStatus::Lost };
        let patch = ParlayPatch {
            status: Some(status),
            result: Some(result),
            ..Default::default()
        };
        let settled = self.update_parlay(id, patch).await?;
        if settled {
            info!(id, result = %result, "Parlay settled");
        }
        Ok(settled)
    }

    /// Replace one leg of a persisted draft, keeping its position.
    ///
    /// Fails with `ParlayLocked` once the parlay has left draft, and with
    /// `StaleResult` if the leg's line moved since `expected_line` was read.
    pub(crate) async fn replace_draft_leg(
        &self,
        id: &str,
        key: &IdentityKey,
        expected_line: f64,
        leg: Leg,
    ) -> Result<Parlay, ParlayError> {
        self.mutate(|all| {
            let parlay = all
                .iter_mut()
                .find(|p| p.id == id)
                .ok_or_else(|| ParlayError::ParlayNotFound(id.to_string()))?;
            if parlay.status != ParlayStatus::Draft {
                return Err(ParlayError::ParlayLocked {
                    id: id.to_string(),
                    status: parlay.status,
                });
            }
            let idx = parlay
                .legs()
                .iter()
                .position(|l| &l.key() == key)
                .ok_or_else(|| ParlayError::LegNotFound(key.clone()))?;
            if parlay.legs()[idx].line != expected_line {
                return Err(ParlayError::StaleResult);
            }
            parlay.replace_leg(idx, leg);
            Ok((parlay.clone(), true))
        })
        .await
    }

    /// Remove every parlay in this namespace.
    pub async fn clear(&self) -> Result<(), ParlayError> {
        let lock = self.store.write_lock(self.key);
        let _guard = lock.lock().await;
        self.store
            .remove(self.key)
            .await
            .map_err(|e| ParlayError::StorageIo(format!("{e:#}")))?;
        info!(namespace = self.key, "Parlay collection cleared");
        Ok(())
    }

    /// Read-modify-write under the write lock. `f` returns its output and
    /// whether the collection changed; unchanged collections are not
    /// rewritten. On any error the stored collection is left as it was.
    async fn mutate<T, F>(&self, f: F) -> Result<T, ParlayError>
    where
        F: FnOnce(&mut Vec<Parlay>) -> Result<(T, bool), ParlayError>,
    {
        let lock = self.store.write_lock(self.key);
        let _guard = lock.lock().await;
        let mut all = self.get_all_parlays().await?;
        let (out, changed) = f(&mut all)?;
        if changed {
            let json = serde_json::to_string(&all)
                .map_err(|e| ParlayError::StorageIo(format!("Failed to serialise parlays: {e}")))?;
            self.store
                .set(self.key, &json)
                .await
                .map_err(|e| ParlayError::StorageIo(format!("{e:#}")))?;
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
