use regex::Regex;

/// Extracts the best-guess monetary value from free text.
///
/// The battery leans toward recall: every pattern gets a shot at every
/// candidate, and the largest surviving amount wins. The consumer only needs
/// "is there a meaningful bounty here", not an exact invoice.
pub struct BountyValueExtractor {
    patterns: Vec<Regex>,
}

// Amount sub-pattern: thousands separators and optional cents allowed.
const AMOUNT: &str = r"(\d+(?:,\d{3})*(?:\.\d{2})?)";

impl BountyValueExtractor {
    pub fn new() -> Self {
        let raw = [
            // [Bounty $500], [bounty: 1000] - bracket format
            format!(r"(?i)\[bounty[:\s]*\$?{}\]", AMOUNT),
            // (Bounty $500) - parentheses format
            format!(r"(?i)\(bounty[:\s]*\$?{}\)", AMOUNT),
            // bounty: $500, bounty 500
            format!(r"(?i)bounty[:\s]*\$?{}", AMOUNT),
            // reward: $500
            format!(r"(?i)reward[:\s]*\$?{}", AMOUNT),
            // prize: $500
            format!(r"(?i)prize[:\s]*\$?{}", AMOUNT),
            // $500 bounty, $1000 reward
            format!(r"(?i)\${}\s*(?:bounty|reward|prize)", AMOUNT),
            // Bare $500 - most general, so it comes late
            format!(r"(?i)\${}", AMOUNT),
            // 500 USD
            format!(r"(?i){}\s*usd", AMOUNT),
            // 500$
            format!(r"(?i){}\$", AMOUNT),
        ];

        let patterns = raw
            .iter()
            .map(|p| Regex::new(p).expect("bounty value pattern must compile"))
            .collect();

        Self { patterns }
    }

    /// Largest plausible amount mentioned in `text`, 0 if none.
    pub fn extract(&self, text: &str) -> u64 {
        if text.is_empty() {
            return 0;
        }

        let mut best = 0u64;

        for pattern in &self.patterns {
            for captures in pattern.captures_iter(text) {
                let Some(amount) = captures.get(1) else {
                    continue;
                };
                let cleaned = amount.as_str().replace(',', "");
                if let Ok(value) = cleaned.parse::<f64>() {
                    if value > 0.0 {
                        best = best.max(value.floor() as u64);
                    }
                }
            }
        }

        best
    }
}

impl Default for BountyValueExtractor {
    fn default() -> Self {
        Self::new()
    }
}
