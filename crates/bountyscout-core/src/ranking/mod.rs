// Per-issue signal extraction and scoring, batch-level orchestration
pub mod assignment;
pub mod language;
pub mod score;
pub mod value;

pub use assignment::AssignmentDetector;
pub use language::LanguageCache;
pub use score::{score, ScoreSignals};
pub use value::BountyValueExtractor;

use std::sync::Arc;
use std::time::Duration;

use bountyscout_api::IssueRecord;
use futures::future::join_all;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::models::{normalize_repository, RankedIssue};
use crate::source::IssueSource;

#[derive(Debug, Clone)]
pub struct RankingConfig {
    /// Fetch and inspect issue comments while ranking.
    ///
    /// Off by default: comment fetching costs one request per issue, which
    /// blows both the latency and the quota budget of a refresh. The
    /// comment-derived signals are simply false in this mode.
    pub fetch_comments: bool,

    /// Delay step between language lookups, scaled by lookup index.
    pub lookup_stagger_ms: u64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            fetch_comments: false,
            lookup_stagger_ms: 250,
        }
    }
}

/// Turns raw issues into a score-sorted list of annotated ones.
///
/// Never fails as a whole: malformed issues are dropped individually, failed
/// language lookups degrade to "Unknown", and the caller always gets a
/// (possibly empty) sorted batch.
pub struct RankingEngine {
    config: RankingConfig,
    languages: Arc<LanguageCache>,
    extractor: BountyValueExtractor,
    detector: AssignmentDetector,
}

impl RankingEngine {
    pub fn new(config: RankingConfig, languages: Arc<LanguageCache>) -> Self {
        Self {
            config,
            languages,
            extractor: BountyValueExtractor::new(),
            detector: AssignmentDetector::new(),
        }
    }

    /// Annotate and score a batch, sorted by score descending.
    pub async fn rank(
        &self,
        issues: Vec<IssueRecord>,
        source: &dyn IssueSource,
    ) -> Vec<RankedIssue> {
        let total = issues.len();
        info!(total, "Ranking issues");

        self.prefetch_languages(&issues, source).await;

        let mut ranked = Vec::with_capacity(total);
        for issue in issues {
            if let Some(annotated) = self.annotate(issue, source).await {
                ranked.push(annotated);
            }
        }

        ranked.sort_by(|a, b| b.score.cmp(&a.score));

        info!(ranked = ranked.len(), total, "Ranking complete");
        if let Some(top) = ranked.first() {
            debug!(score = top.score, title = %top.issue.title, "Top issue");
        }

        ranked
    }

    /// Resolve languages for every distinct repository in the batch.
    ///
    /// Fan-out with index-staggered starts, fan-in before ranking proceeds.
    /// Failures are cached as "Unknown" so they aren't retried this run.
    async fn prefetch_languages(&self, issues: &[IssueRecord], source: &dyn IssueSource) {
        let mut pending: Vec<String> = Vec::new();
        for issue in issues {
            let url = &issue.repository_url;
            if url.is_empty()
                || self.languages.get(url).is_some()
                || pending.iter().any(|seen| seen == url)
            {
                continue;
            }
            pending.push(url.clone());
        }

        if pending.is_empty() {
            return;
        }

        debug!(repositories = pending.len(), "Prefetching repository languages");

        let stagger = self.config.lookup_stagger_ms;
        let lookups = pending.iter().enumerate().map(|(index, url)| async move {
            sleep(Duration::from_millis(stagger * index as u64)).await;

            let language = match source.repository_language(url).await {
                Ok(language) => language,
                Err(err) => {
                    warn!(%url, %err, "Language lookup failed, caching Unknown");
                    "Unknown".to_string()
                }
            };
            (url, language)
        });

        for (url, language) in join_all(lookups).await {
            self.languages.insert(url, &language);
        }
    }

    /// Annotate a single issue, or drop it.
    async fn annotate(&self, issue: IssueRecord, source: &dyn IssueSource) -> Option<RankedIssue> {
        if issue.id == 0 || issue.repository_url.is_empty() || issue.html_url.is_empty() {
            warn!(
                issue_id = issue.id,
                "Skipping issue with missing required fields"
            );
            return None;
        }

        let repository = normalize_repository(&issue.repository_url);

        let has_bounty_label = issue
            .labels
            .iter()
            .any(|label| label.name.to_lowercase().contains("bounty"));

        let mut bounty_value = issue
            .labels
            .iter()
            .map(|label| self.extractor.extract(&label.name))
            .max()
            .unwrap_or(0);
        bounty_value = bounty_value.max(self.extractor.extract(&issue.title));
        if let Some(body) = &issue.body {
            bounty_value = bounty_value.max(self.extractor.extract(body));
        }

        let mut has_bounty_comment = false;
        let mut has_payout_comment = false;
        let mut has_assignment_comment = false;

        if self.config.fetch_comments {
            let comments = match source.issue_comments(&issue.comments_url).await {
                Ok(comments) => comments,
                Err(err) => {
                    warn!(issue_id = issue.id, %err, "Comment fetch failed, ranking without comments");
                    Vec::new()
                }
            };

            for comment in &comments {
                let lowered = comment.body.to_lowercase();
                if lowered.contains("bounty") {
                    has_bounty_comment = true;
                }
                if lowered.contains("payout")
                    || lowered.contains("paid out")
                    || lowered.contains("has been paid")
                    || lowered.contains("rewarded")
                {
                    has_payout_comment = true;
                }
                if self.detector.is_claimed(&comment.body) {
                    has_assignment_comment = true;
                }
                bounty_value = bounty_value.max(self.extractor.extract(&comment.body));
            }
        }

        let has_implementation_details = score::has_implementation_details(issue.body.as_deref());

        let language = self
            .languages
            .get(&issue.repository_url)
            .unwrap_or_else(|| "Unknown".to_string());

        let comment_count = issue.comments;
        let score = score(&ScoreSignals {
            has_bounty_label,
            has_bounty_comment,
            has_implementation_details,
            has_payout_comment,
            has_assignment_comment,
            comment_count,
        });

        debug!(
            issue_id = issue.id,
            score,
            %repository,
            %language,
            bounty = has_bounty_label,
            "Issue scored"
        );

        Some(RankedIssue {
            repository,
            score,
            has_bounty_label,
            has_bounty_comment,
            has_payout_comment,
            has_assignment_comment,
            comment_count,
            has_implementation_details,
            bounty_value,
            language,
            issue,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MockIssueSource;
    use bountyscout_api::{CommentRecord, Label};

    fn test_engine(fetch_comments: bool) -> RankingEngine {
        RankingEngine::new(
            RankingConfig {
                fetch_comments,
                lookup_stagger_ms: 0,
            },
            Arc::new(LanguageCache::new()),
        )
    }

    fn issue(id: u64, title: &str) -> IssueRecord {
        IssueRecord {
            id,
            number: id,
            title: title.to_string(),
            html_url: format!("https://github.com/acme/widgets/issues/{}", id),
            body: Some("Steps to reproduce: open the app".to_string()),
            state: "open".to_string(),
            comments: 2,
            labels: vec![Label {
                name: "bounty".to_string(),
            }],
            repository_url: "https://api.github.com/repos/acme/widgets".to_string(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
            updated_at: "2024-01-02T00:00:00Z".to_string(),
            comments_url: format!("https://api.github.com/repos/acme/widgets/issues/{}/comments", id),
            user: None,
        }
    }

    #[tokio::test]
    async fn malformed_issue_is_dropped_not_fatal() {
        let mut source = MockIssueSource::new();
        source
            .expect_repository_language()
            .returning(|_| Ok("Rust".to_string()));

        let valid = issue(1, "Fix crash [bounty $500]");
        let mut invalid = issue(2, "No detail URL");
        invalid.html_url.clear();

        let engine = test_engine(false);
        let ranked = engine.rank(vec![valid, invalid], &source).await;

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].issue.id, 1);
        assert_eq!(ranked[0].repository, "acme/widgets");
        assert_eq!(ranked[0].language, "Rust");
        assert_eq!(ranked[0].bounty_value, 500);
    }

    #[tokio::test]
    async fn output_is_sorted_by_score_descending() {
        let mut source = MockIssueSource::new();
        source
            .expect_repository_language()
            .returning(|_| Ok("Rust".to_string()));

        let strong = issue(1, "Fix crash");
        let mut weak = issue(2, "Vague ask");
        weak.labels.clear();
        weak.body = None;
        weak.comments = 25;

        let engine = test_engine(false);
        let ranked = engine.rank(vec![weak, strong], &source).await;

        assert_eq!(ranked.len(), 2);
        assert!(ranked[0].score >= ranked[1].score);
        assert_eq!(ranked[0].issue.id, 1);
    }

    #[tokio::test]
    async fn failed_language_lookup_degrades_to_unknown() {
        let mut source = MockIssueSource::new();
        source
            .expect_repository_language()
            .returning(|_| Err(crate::Error::ApiError("boom".to_string())));

        let engine = test_engine(false);
        let ranked = engine.rank(vec![issue(1, "Fix crash")], &source).await;

        assert_eq!(ranked[0].language, "Unknown");
        // The failure is cached so later runs don't retry it immediately
        assert_eq!(
            engine.languages.get("https://api.github.com/repos/acme/widgets"),
            Some("Unknown".to_string())
        );
    }

    #[tokio::test]
    async fn language_cache_skips_repeat_lookups() {
        let cache = Arc::new(LanguageCache::new());
        cache.insert("https://api.github.com/repos/acme/widgets", "Go");

        // No expectation registered: any lookup would panic the mock
        let source = MockIssueSource::new();

        let engine = RankingEngine::new(
            RankingConfig {
                fetch_comments: false,
                lookup_stagger_ms: 0,
            },
            cache,
        );
        let ranked = engine.rank(vec![issue(1, "Fix crash")], &source).await;

        assert_eq!(ranked[0].language, "Go");
    }

    #[tokio::test]
    async fn comment_signals_stay_false_when_fetching_disabled() {
        let mut source = MockIssueSource::new();
        source
            .expect_repository_language()
            .returning(|_| Ok("Rust".to_string()));

        let engine = test_engine(false);
        let ranked = engine.rank(vec![issue(1, "Fix crash")], &source).await;

        assert!(!ranked[0].has_bounty_comment);
        assert!(!ranked[0].has_payout_comment);
        assert!(!ranked[0].has_assignment_comment);
    }

    #[tokio::test]
    async fn comment_fetching_feeds_assignment_detection() {
        let mut source = MockIssueSource::new();
        source
            .expect_repository_language()
            .returning(|_| Ok("Rust".to_string()));
        source.expect_issue_comments().returning(|_| {
            Ok(vec![CommentRecord {
                id: 7,
                body: "I'm working on this, bounty looks fair".to_string(),
                user: None,
                created_at: "2024-01-03T00:00:00Z".to_string(),
            }])
        });

        let engine = test_engine(true);
        let ranked = engine.rank(vec![issue(1, "Fix crash")], &source).await;

        assert!(ranked[0].has_assignment_comment);
        assert!(ranked[0].has_bounty_comment);
        // 30 (bounty) + 25 (details) + 20 (unpaid) + 25 (quiet) - 30 (claimed)
        assert_eq!(ranked[0].score, 70);
    }

    #[tokio::test]
    async fn comment_fetch_failure_keeps_the_issue() {
        let mut source = MockIssueSource::new();
        source
            .expect_repository_language()
            .returning(|_| Ok("Rust".to_string()));
        source
            .expect_issue_comments()
            .returning(|_| Err(crate::Error::ApiError("quota".to_string())));

        let engine = test_engine(true);
        let ranked = engine.rank(vec![issue(1, "Fix crash")], &source).await;

        assert_eq!(ranked.len(), 1);
        assert!(!ranked[0].has_assignment_comment);
    }
}
