//! Scalar user preferences (preferred sportsbook, onboarding flags),
//! stored as one JSON object.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::{KeyValueStore, PREFERENCES_KEY};
use crate::types::Sportsbook;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    #[serde(default)]
    pub preferred_sportsbook: Option<Sportsbook>,
    #[serde(default)]
    pub onboarding_complete: bool,
    #[serde(default)]
    pub tutorial_seen: bool,
}

pub struct Preferences {
    store: Arc<dyn KeyValueStore>,
}

impl Preferences {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Current preferences; defaults when nothing has been stored.
    pub async fn load(&self) -> Result<UserPreferences> {
        match self.store.get(PREFERENCES_KEY).await? {
            Some(raw) => serde_json::from_str(&raw).context("Failed to parse user preferences"),
            None => Ok(UserPreferences::default()),
        }
    }

    pub async fn save(&self, prefs: &UserPreferences) -> Result<()> {
        let json = serde_json::to_string(prefs).context("Failed to serialise user preferences")?;
        self.store.set(PREFERENCES_KEY, &json).await?;
        debug!(?prefs, "Preferences saved");
        Ok(())
    }

    pub async fn preferred_sportsbook(&self) -> Result<Option<Sportsbook>> {
        Ok(self.load().await?.preferred_sportsbook)
    }

    pub async fn set_preferred_sportsbook(&self, book: Option<Sportsbook>) -> Result<()> {
        let mut prefs = self.load().await?;
        prefs.preferred_sportsbook = book;
        self.save(&prefs).await
    }

    pub async fn set_onboarding_complete(&self, done: bool) -> Result<()> {
        let mut prefs = self.load().await?;
        prefs.onboarding_complete = done;
        self.save(&prefs).await
    }

    pub async fn set_tutorial_seen(&self, seen: bool) -> Result<()> {
        let mut prefs = self.load().await?;
        prefs.tutorial_seen = seen;
        self.save(&prefs).await
    }

    /// Forget all preferences.
    pub async fn reset(&self) -> Result<()> {
        self.store.remove(PREFERENCES_KEY).await
    }
}
