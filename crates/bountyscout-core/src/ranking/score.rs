//! The workability rubric.
//!
//! A linear, interpretable scoring function - not a model. Every weight is
//! visible, auditable, and tunable in one place.

/// The fixed signal tuple the scorer consumes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreSignals {
    pub has_bounty_label: bool,
    pub has_bounty_comment: bool,
    pub has_implementation_details: bool,
    pub has_payout_comment: bool,
    pub has_assignment_comment: bool,
    pub comment_count: u32,
}

/// Issue carries a bounty marker (label or comment).
const BOUNTY_MARKER_POINTS: i32 = 30;
/// Body is substantial enough to start from.
const IMPLEMENTATION_POINTS: i32 = 25;
/// No sign the bounty was already paid out.
const NOT_PAID_OUT_POINTS: i32 = 20;
/// Discussion hasn't ballooned yet.
const LOW_DISCUSSION_POINTS: i32 = 25;
/// Someone already claimed it.
const ASSIGNMENT_PENALTY: i32 = -30;

const LOW_DISCUSSION_LIMIT: u32 = 10;

/// Map the signal tuple to a score. Additive, clamped at zero, no upper cap.
pub fn score(signals: &ScoreSignals) -> u32 {
    let mut score = 0i32;

    if signals.has_bounty_label || signals.has_bounty_comment {
        score += BOUNTY_MARKER_POINTS;
    }

    if signals.has_implementation_details {
        score += IMPLEMENTATION_POINTS;
    }

    if !signals.has_payout_comment {
        score += NOT_PAID_OUT_POINTS;
    }

    if signals.comment_count < LOW_DISCUSSION_LIMIT {
        score += LOW_DISCUSSION_POINTS;
    }

    if signals.has_assignment_comment {
        score += ASSIGNMENT_PENALTY;
    }

    score.max(0) as u32
}

/// Whether a body reads like it contains enough detail to act on:
/// long enough, or mentioning implementation/reproduction structure.
pub fn has_implementation_details(body: Option<&str>) -> bool {
    let Some(body) = body else {
        return false;
    };

    if body.len() > 200 {
        return true;
    }

    let lowered = body.to_lowercase();
    lowered.contains("implementation")
        || lowered.contains("steps to reproduce")
        || lowered.contains("expected behavior")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_house_scores_100() {
        let signals = ScoreSignals {
            has_bounty_label: true,
            has_bounty_comment: false,
            has_implementation_details: true,
            has_payout_comment: false,
            has_assignment_comment: false,
            comment_count: 3,
        };
        assert_eq!(score(&signals), 100);
    }

    #[test]
    fn assignment_penalty_applies() {
        let signals = ScoreSignals {
            comment_count: 3,
            has_assignment_comment: true,
            ..Default::default()
        };
        // 20 (not paid) + 25 (low discussion) - 30 (claimed)
        assert_eq!(score(&signals), 15);
    }

    #[test]
    fn score_clamps_at_zero() {
        let signals = ScoreSignals {
            has_payout_comment: true,
            has_assignment_comment: true,
            comment_count: 50,
            ..Default::default()
        };
        assert_eq!(score(&signals), 0);
    }

    #[test]
    fn bounty_comment_counts_as_marker() {
        let with_label = ScoreSignals {
            has_bounty_label: true,
            comment_count: 3,
            ..Default::default()
        };
        let with_comment = ScoreSignals {
            has_bounty_comment: true,
            comment_count: 3,
            ..Default::default()
        };
        assert_eq!(score(&with_label), score(&with_comment));
    }

    #[test]
    fn comment_volume_boundary() {
        let nine = ScoreSignals {
            comment_count: 9,
            ..Default::default()
        };
        let ten = ScoreSignals {
            comment_count: 10,
            ..Default::default()
        };
        assert_eq!(score(&nine) - score(&ten), LOW_DISCUSSION_POINTS as u32);
    }

    #[test]
    fn implementation_details_predicate() {
        assert!(!has_implementation_details(None));
        assert!(!has_implementation_details(Some("short")));
        assert!(has_implementation_details(Some(
            "Steps To Reproduce: run it twice"
        )));
        assert!(has_implementation_details(Some(
            "The Implementation should use a ring buffer"
        )));
        assert!(has_implementation_details(Some("Expected Behavior: no crash")));

        let long_body = "x".repeat(201);
        assert!(has_implementation_details(Some(&long_body)));
    }
}
