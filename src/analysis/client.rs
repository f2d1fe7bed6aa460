//! HTTP client for the remote analysis service.
//!
//! Implements `AnalysisService` over JSON POST endpoints. Retries on
//! 429 and 5xx with exponential backoff; any other non-success status
//! fails immediately.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{
    AnalysisService, CorrelationScore, DfsPick, FlexPick, LineRecomputeRequest,
    LineRecomputeResponse,
};
use crate::config::ServiceConfig;
use crate::types::{Leg, ParlayGrade};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const SERVICE_NAME: &str = "analysis-api";

const ADJUST_LINE_PATH: &str = "/api/parlay/adjust-line";
const GRADE_PARLAY_PATH: &str = "/api/parlay/grade";
const DFS_CORRELATION_PATH: &str = "/api/dfs/correlation";
const DFS_FLEX_PATH: &str = "/api/dfs/flex-pick";

const BASE_BACKOFF_MS: u64 = 500;
const MAX_BACKOFF_MS: u64 = 30_000;

/// Delay before retry `attempt` (1-based): doubling from the base, capped.
fn backoff(attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_millis(BASE_BACKOFF_MS.saturating_mul(factor).min(MAX_BACKOFF_MS))
}

#[derive(Serialize)]
struct GradeRequest<'a> {
    legs: &'a [Leg],
}

#[derive(Serialize)]
struct PicksRequest<'a> {
    picks: &'a [DfsPick],
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct AnalysisClient {
    http: Client,
    base_url: String,
    max_retries: u32,
}

impl AnalysisClient {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("parlay-core/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build analysis HTTP client")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned + Send,
    {
        let url = self.url(path);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(backoff(attempt)).await;
            }

            debug!(url = %url, attempt, "Analysis request");
            let resp = self.http.post(&url).json(body).send().await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return response
                            .json::<R>()
                            .await
                            .with_context(|| format!("Failed to parse response from {path}"));
                    }

                    let error_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        warn!(status = %status, attempt, path, "Retryable analysis error");
                        last_error = Some(format!("HTTP {status}: {error_text}"));
                        continue;
                    }

                    anyhow::bail!("Analysis API error {status} on {path}: {error_text}");
                }
                Err(e) => {
                    warn!(error = %e, attempt, path, "Analysis request failed");
                    last_error = Some(format!("Request error: {e}"));
                    continue;
                }
            }
        }

        anyhow::bail!(
            "Analysis API {path} failed after {} retries: {}",
            self.max_retries,
            last_error.unwrap_or_default()
        )
    }
}

#[async_trait]
impl AnalysisService for AnalysisClient {
    async fn recompute_line(&self, request: &LineRecomputeRequest) -> Result<LineRecomputeResponse> {
        self.post_json(ADJUST_LINE_PATH, request).await
    }

    async fn grade_parlay(&self, legs: &[Leg]) -> Result<ParlayGrade> {
        self.post_json(GRADE_PARLAY_PATH, &GradeRequest { legs }).await
    }

    async fn score_correlation(&self, picks: &[DfsPick]) -> Result<CorrelationScore> {
        self.post_json(DFS_CORRELATION_PATH, &PicksRequest { picks }).await
    }

    async fn flex_pick(&self, picks: &[DfsPick]) -> Result<FlexPick> {
        self.post_json(DFS_FLEX_PATH, &PicksRequest { picks }).await
    }

    fn name(&self) -> &'static str {
        SERVICE_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
