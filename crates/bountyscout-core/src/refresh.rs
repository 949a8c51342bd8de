use std::sync::Arc;
use std::time::{Duration, Instant};

use bountyscout_store::Store;
use serde::Serialize;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::error::Error;
use crate::ranking::RankingEngine;
use crate::source::IssueSource;
use crate::sync::{SyncEngine, SyncReport};

/// How a refresh attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshOutcome {
    /// Fetch, rank, and sync all ran (possibly over an empty result).
    Completed,
    /// Another refresh held the lock; nothing was done.
    Skipped,
    /// The deadline fired mid-run. Upserts that already landed stand.
    TimedOut,
    /// The refresh could not start or aborted with an error.
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub outcome: RefreshOutcome,
    pub fetched: usize,
    pub ranked: usize,
    pub sync: Option<SyncReport>,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RefreshReport {
    fn finished(outcome: RefreshOutcome, started: Instant) -> Self {
        Self {
            outcome,
            fetched: 0,
            ranked: 0,
            sync: None,
            elapsed_ms: started.elapsed().as_millis() as u64,
            error: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RefreshOptions {
    pub per_page: u32,
    pub max_pages: u32,
    pub timeout_secs: u64,
    /// Whether an API token is configured. An unauthenticated refresh would
    /// burn the tiny anonymous quota for nothing, so it fails up front.
    pub token_present: bool,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self {
            per_page: 100,
            max_pages: 5,
            timeout_secs: 120,
            token_present: true,
        }
    }
}

/// Drives one full fetch -> rank -> sync pass, at most one at a time.
pub struct RefreshOrchestrator {
    source: Arc<dyn IssueSource>,
    store: Arc<Store>,
    ranking: RankingEngine,
    sync: SyncEngine,
    in_flight: tokio::sync::Mutex<()>,
    options: RefreshOptions,
}

impl RefreshOrchestrator {
    pub fn new(
        source: Arc<dyn IssueSource>,
        store: Arc<Store>,
        ranking: RankingEngine,
        options: RefreshOptions,
    ) -> Self {
        let sync = SyncEngine::new(store.clone());
        Self {
            source,
            store,
            ranking,
            sync,
            in_flight: tokio::sync::Mutex::new(()),
            options,
        }
    }

    /// Run one refresh pass.
    ///
    /// Overlapping calls are collapsed: whoever holds the in-flight lock
    /// runs, everyone else gets `Skipped` immediately. The whole pass runs
    /// under a deadline; on expiry the store keeps whatever was already
    /// upserted.
    pub async fn refresh(&self) -> RefreshReport {
        let started = Instant::now();

        let Ok(_guard) = self.in_flight.try_lock() else {
            info!("Refresh already in flight, skipping");
            return RefreshReport::finished(RefreshOutcome::Skipped, started);
        };

        if !self.options.token_present {
            let err = Error::MissingToken;
            warn!(%err, "Refusing to refresh");
            let mut report = RefreshReport::finished(RefreshOutcome::Failed, started);
            report.error = Some(err.to_string());
            return report;
        }

        let deadline = Duration::from_secs(self.options.timeout_secs);
        match timeout(deadline, self.run(started)).await {
            Ok(report) => report,
            Err(_) => {
                warn!(
                    timeout_secs = self.options.timeout_secs,
                    "Refresh hit its deadline, partial results kept"
                );
                RefreshReport::finished(RefreshOutcome::TimedOut, started)
            }
        }
    }

    async fn run(&self, started: Instant) -> RefreshReport {
        let query = self.store.search_query();
        info!(%query, "Refreshing bounty issues");

        let issues = self
            .source
            .fetch_issues(
                &query,
                "created",
                "desc",
                self.options.per_page,
                self.options.max_pages,
            )
            .await;
        let fetched = issues.len();

        if issues.is_empty() {
            info!("Search returned nothing, store left untouched");
            return RefreshReport::finished(RefreshOutcome::Completed, started);
        }

        let ranked = self.ranking.rank(issues, self.source.as_ref()).await;
        let ranked_count = ranked.len();

        let sync = self.sync.sync(ranked).await;

        let report = RefreshReport {
            outcome: RefreshOutcome::Completed,
            fetched,
            ranked: ranked_count,
            sync: Some(sync),
            elapsed_ms: started.elapsed().as_millis() as u64,
            error: None,
        };
        info!(
            fetched = report.fetched,
            ranked = report.ranked,
            persisted = sync.persisted(),
            elapsed_ms = report.elapsed_ms,
            "Refresh complete"
        );
        report
    }
}
