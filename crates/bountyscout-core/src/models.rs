use bountyscout_api::IssueRecord;
use serde::Serialize;

/// An issue annotated with everything the scorer derived from it.
///
/// Built by the ranking engine from one raw `IssueRecord`, consumed once by
/// the sync engine; never persisted in this shape.
#[derive(Debug, Clone, Serialize)]
pub struct RankedIssue {
    #[serde(flatten)]
    pub issue: IssueRecord,
    /// Normalized "owner/repo" string.
    pub repository: String,
    pub score: u32,
    pub has_bounty_label: bool,
    pub has_bounty_comment: bool,
    pub has_payout_comment: bool,
    pub has_assignment_comment: bool,
    pub comment_count: u32,
    pub has_implementation_details: bool,
    /// Best-effort currency extraction, 0 when nothing plausible was found.
    pub bounty_value: u64,
    /// Primary repository language, "Unknown" when undeterminable.
    pub language: String,
}

/// Derive "owner/repo" from the last two path segments of a repository URL.
///
/// Anything that doesn't yield two non-empty segments falls back to
/// "unknown/repository" - scoring still works, attribution is just vague.
pub fn normalize_repository(repository_url: &str) -> String {
    let mut segments = repository_url
        .trim_end_matches('/')
        .rsplit('/')
        .filter(|s| !s.is_empty());

    match (segments.next(), segments.next()) {
        (Some(repo), Some(owner)) if !owner.contains(':') => format!("{}/{}", owner, repo),
        _ => "unknown/repository".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_api_repository_url() {
        assert_eq!(
            normalize_repository("https://api.github.com/repos/facebook/react"),
            "facebook/react"
        );
        assert_eq!(
            normalize_repository("https://api.github.com/repos/rust-lang/rust/"),
            "rust-lang/rust"
        );
    }

    #[test]
    fn malformed_url_falls_back() {
        assert_eq!(normalize_repository(""), "unknown/repository");
        assert_eq!(normalize_repository("react"), "unknown/repository");
        assert_eq!(normalize_repository("https://react"), "unknown/repository");
    }
}
