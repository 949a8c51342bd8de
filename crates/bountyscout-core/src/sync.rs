use std::time::Duration;

use bountyscout_store::{IssueUpsert, Store, StoreError, UpsertOutcome, MIN_SCORE_THRESHOLD};
use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::models::RankedIssue;

/// Upserts per batch before yielding to the write lock.
const BATCH_SIZE: usize = 50;
const BATCH_DELAY_MS: u64 = 50;

/// What one sync pass did, counted per issue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub inserted: usize,
    pub updated: usize,
    pub errors: usize,
    pub pruned: usize,
    pub skipped_low_score: usize,
}

impl SyncReport {
    pub fn persisted(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Persists a ranked batch into the store and prunes what decayed.
///
/// One bad issue never aborts the pass: failures are counted and logged,
/// the rest of the batch proceeds.
pub struct SyncEngine {
    store: std::sync::Arc<Store>,
}

impl SyncEngine {
    pub fn new(store: std::sync::Arc<Store>) -> Self {
        Self { store }
    }

    pub async fn sync(&self, ranked: Vec<RankedIssue>) -> SyncReport {
        let total = ranked.len();
        info!(total, "Syncing ranked issues");

        let mut report = SyncReport::default();

        for (batch_index, batch) in ranked.chunks(BATCH_SIZE).enumerate() {
            if batch_index > 0 {
                sleep(Duration::from_millis(BATCH_DELAY_MS)).await;
            }

            for issue in batch {
                if issue.score < MIN_SCORE_THRESHOLD {
                    report.skipped_low_score += 1;

                    // A previously stored row must not outlive its re-score:
                    // the stale above-threshold score would dodge the prune
                    match self.store.delete_issue(issue.issue.id) {
                        Ok(true) => {
                            debug!(
                                issue_id = issue.issue.id,
                                score = issue.score,
                                "Removed stored issue re-scored below threshold"
                            );
                            report.pruned += 1;
                        }
                        Ok(false) => {
                            debug!(
                                issue_id = issue.issue.id,
                                score = issue.score,
                                "Skipping issue below storage threshold"
                            );
                        }
                        Err(err) => {
                            warn!(issue_id = issue.issue.id, %err, "Failed to remove re-scored issue");
                            report.errors += 1;
                        }
                    }
                    continue;
                }

                match self.store.upsert_issue(&to_upsert(issue)) {
                    Ok(UpsertOutcome::Inserted) => report.inserted += 1,
                    Ok(UpsertOutcome::Updated) => report.updated += 1,
                    // Scores are pre-filtered, but keep the store's verdict authoritative
                    Err(StoreError::BelowThreshold { .. }) => report.skipped_low_score += 1,
                    Err(err) => {
                        warn!(issue_id = issue.issue.id, %err, "Failed to persist issue");
                        report.errors += 1;
                    }
                }
            }
        }

        // Prune runs even when the batch was empty: previously stored issues
        // may have been re-scored below the bar on an earlier pass.
        match self.store.prune_below(MIN_SCORE_THRESHOLD) {
            Ok(pruned) => report.pruned += pruned,
            Err(err) => {
                warn!(%err, "Prune pass failed");
                report.errors += 1;
            }
        }

        info!(
            inserted = report.inserted,
            updated = report.updated,
            skipped = report.skipped_low_score,
            errors = report.errors,
            pruned = report.pruned,
            "Sync complete"
        );

        report
    }
}

fn to_upsert(issue: &RankedIssue) -> IssueUpsert {
    IssueUpsert {
        github_id: issue.issue.id,
        repository: issue.repository.clone(),
        repository_url: issue.issue.repository_url.clone(),
        language: match issue.language.as_str() {
            "" | "Unknown" => None,
            other => Some(other.to_string()),
        },
        number: issue.issue.number,
        title: issue.issue.title.clone(),
        html_url: issue.issue.html_url.clone(),
        body: issue.issue.body.clone().unwrap_or_default(),
        state: issue.issue.state.clone(),
        comments: issue.comment_count,
        created_at: issue.issue.created_at.clone(),
        updated_at: issue.issue.updated_at.clone(),
        score: issue.score,
        has_bounty_label: issue.has_bounty_label,
        has_bounty_comment: issue.has_bounty_comment,
        has_payout_comment: issue.has_payout_comment,
        has_assignment_comment: issue.has_assignment_comment,
        has_implementation_details: issue.has_implementation_details,
        bounty_value: issue.bounty_value,
        labels: issue.issue.labels.iter().map(|l| l.name.clone()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bountyscout_api::{IssueRecord, Label};
    use std::sync::Arc;

    fn ranked(id: u64, score: u32) -> RankedIssue {
        RankedIssue {
            issue: IssueRecord {
                id,
                number: id,
                title: format!("Issue {}", id),
                html_url: format!("https://github.com/acme/widgets/issues/{}", id),
                body: Some("Steps to reproduce: run it".to_string()),
                state: "open".to_string(),
                comments: 2,
                labels: vec![Label {
                    name: "bounty".to_string(),
                }],
                repository_url: "https://api.github.com/repos/acme/widgets".to_string(),
                created_at: "2024-01-01T00:00:00Z".to_string(),
                updated_at: "2024-01-02T00:00:00Z".to_string(),
                comments_url: format!(
                    "https://api.github.com/repos/acme/widgets/issues/{}/comments",
                    id
                ),
                user: None,
            },
            repository: "acme/widgets".to_string(),
            score,
            has_bounty_label: true,
            has_bounty_comment: false,
            has_payout_comment: false,
            has_assignment_comment: false,
            comment_count: 2,
            has_implementation_details: true,
            bounty_value: 500,
            language: "Rust".to_string(),
        }
    }

    #[tokio::test]
    async fn persists_above_threshold_and_skips_below() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let engine = SyncEngine::new(store.clone());

        let report = engine
            .sync(vec![ranked(1, 75), ranked(2, 100), ranked(3, 10)])
            .await;

        assert_eq!(report.inserted, 2);
        assert_eq!(report.updated, 0);
        assert_eq!(report.skipped_low_score, 1);
        assert_eq!(report.errors, 0);
        assert_eq!(store.issue_count().unwrap(), 2);
        assert!(store.issue_by_github_id(3).unwrap().is_none());
    }

    #[tokio::test]
    async fn second_pass_counts_updates() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let engine = SyncEngine::new(store.clone());

        engine.sync(vec![ranked(1, 75), ranked(2, 80)]).await;
        let report = engine.sync(vec![ranked(1, 75), ranked(2, 95)]).await;

        assert_eq!(report.inserted, 0);
        assert_eq!(report.updated, 2);
        assert_eq!(store.issue_count().unwrap(), 2);
        assert_eq!(store.issue_by_github_id(2).unwrap().unwrap().score, 95);
    }

    #[tokio::test]
    async fn rescored_issue_below_threshold_is_removed() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let engine = SyncEngine::new(store.clone());

        engine.sync(vec![ranked(1, 75), ranked(2, 40)]).await;
        assert_eq!(store.issue_count().unwrap(), 2);

        // Issue 2 got claimed since the last pass: its score collapses and
        // the stored row must go with it, stale score and all
        let mut decayed = ranked(2, 40);
        decayed.score = 10;
        let report = engine.sync(vec![ranked(1, 75), decayed]).await;

        assert_eq!(report.skipped_low_score, 1);
        assert_eq!(report.pruned, 1);
        assert!(store.issue_by_github_id(2).unwrap().is_none());
        assert_eq!(store.issue_by_github_id(1).unwrap().unwrap().score, 75);
    }

    #[tokio::test]
    async fn never_stored_low_scorer_is_only_skipped() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let engine = SyncEngine::new(store.clone());

        let report = engine.sync(vec![ranked(1, 10)]).await;

        assert_eq!(report.skipped_low_score, 1);
        assert_eq!(report.pruned, 0);
        assert_eq!(store.issue_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn empty_batch_still_runs_prune() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let engine = SyncEngine::new(store);

        let report = engine.sync(Vec::new()).await;
        assert_eq!(report, SyncReport::default());
    }

    #[tokio::test]
    async fn unknown_language_is_stored_as_null() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let engine = SyncEngine::new(store.clone());

        let mut issue = ranked(1, 75);
        issue.language = "Unknown".to_string();
        engine.sync(vec![issue]).await;

        let stored = store.issue_by_github_id(1).unwrap().unwrap();
        assert_eq!(stored.language, None);
    }
}
