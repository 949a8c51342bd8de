use regex::RegexSet;

/// Detects whether free text indicates an issue is already claimed.
///
/// A fixed battery of phrasings covering direct assignment, active-work
/// claims, requests to be assigned, GitHub-style assignment metadata, and
/// progress markers. One match is enough.
pub struct AssignmentDetector {
    patterns: RegexSet,
}

impl AssignmentDetector {
    pub fn new() -> Self {
        let patterns = RegexSet::new([
            // Direct assignment statements
            r"(?i)i\s+have\s+assigned\s+this\s+ticket",
            r"(?i)this\s+ticket\s+is\s+taken",
            r"(?i)this\s+ticket\s+has\s+been\s+taken",
            r"(?i)this\s+issue\s+is\s+taken",
            r"(?i)this\s+issue\s+has\s+been\s+taken",
            r"(?i)assigned\s+to\s+@?\w+",
            r"(?i)i\s+am\s+assigned\s+to\s+this",
            r"(?i)i\s+have\s+been\s+assigned",
            // Working-on statements
            r"(?i)is\s+working\s+on\s+this\s+ticket",
            r"(?i)is\s+working\s+on\s+this\s+issue",
            r"(?i)working\s+on\s+this\s+now",
            r"(?i)i\s+am\s+working\s+on\s+this",
            r"(?i)i'm\s+working\s+on\s+this",
            r"(?i)currently\s+working\s+on\s+this",
            r"(?i)will\s+work\s+on\s+this",
            r"(?i)i\s+will\s+work\s+on\s+this",
            r"(?i)i'll\s+work\s+on\s+this",
            r"(?i)taking\s+this\s+one",
            r"(?i)i'll\s+take\s+this",
            r"(?i)i\s+will\s+take\s+this",
            // Assignment requests and confirmations
            r"(?i)can\s+i\s+be\s+assigned",
            r"(?i)please\s+assign\s+me",
            r"(?i)assign\s+me\s+to\s+this",
            r"(?i)i\s+would\s+like\s+to\s+work\s+on\s+this",
            r"(?i)i'd\s+like\s+to\s+work\s+on\s+this",
            r"(?i)interested\s+in\s+working\s+on\s+this",
            r"(?i)can\s+i\s+work\s+on\s+this",
            // GitHub-style assignments
            r"(?i)assigned\s+@?\w+",
            r"(?i)@\w+\s+assigned",
            r"(?i)assignee:\s*@?\w+",
            // Progress indicators
            r"(?i)started\s+working\s+on\s+this",
            r"(?i)began\s+working\s+on\s+this",
            r"(?i)in\s+progress",
            r"(?i)work\s+in\s+progress",
            r"(?i)wip",
            // Claim statements
            r"(?i)claiming\s+this\s+issue",
            r"(?i)claiming\s+this\s+ticket",
            r"(?i)i\s+claim\s+this",
            r"(?i)claimed\s+by",
        ])
        .expect("assignment patterns must compile");

        Self { patterns }
    }

    pub fn is_claimed(&self, text: &str) -> bool {
        !text.is_empty() && self.patterns.is_match(text)
    }
}

impl Default for AssignmentDetector {
    fn default() -> Self {
        Self::new()
    }
}
