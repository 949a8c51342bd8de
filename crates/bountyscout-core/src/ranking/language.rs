use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Process-lifetime cache of repository URL -> primary language.
///
/// Owned by whoever builds the ranking engine and injected into it, so the
/// lifetime and scope are explicit. Failed lookups are cached as "Unknown"
/// too - a transient upstream failure should not trigger re-lookups within
/// the same run.
pub struct LanguageCache {
    entries: Mutex<HashMap<String, CachedLanguage>>,
    ttl: Option<Duration>,
}

struct CachedLanguage {
    language: String,
    cached_at: Instant,
}

impl LanguageCache {
    /// Cache without expiry: entries live as long as the process.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl: None,
        }
    }

    /// Cache whose entries go stale after `ttl`.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl: Some(ttl),
        }
    }

    pub fn get(&self, repository_url: &str) -> Option<String> {
        let mut entries = self.entries.lock().expect("language cache poisoned");

        if let Some(entry) = entries.get(repository_url) {
            match self.ttl {
                Some(ttl) if entry.cached_at.elapsed() > ttl => {
                    entries.remove(repository_url);
                    None
                }
                _ => Some(entry.language.clone()),
            }
        } else {
            None
        }
    }

    pub fn insert(&self, repository_url: &str, language: &str) {
        self.entries.lock().expect("language cache poisoned").insert(
            repository_url.to_string(),
            CachedLanguage {
                language: language.to_string(),
                cached_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("language cache poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LanguageCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caches_across_lookups() {
        let cache = LanguageCache::new();
        assert_eq!(cache.get("repo-a"), None);

        cache.insert("repo-a", "Rust");
        assert_eq!(cache.get("repo-a"), Some("Rust".to_string()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn ttl_expires_entries() {
        let cache = LanguageCache::with_ttl(Duration::from_millis(0));
        cache.insert("repo-a", "Rust");
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(cache.get("repo-a"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn unknown_is_cacheable_too() {
        let cache = LanguageCache::new();
        cache.insert("repo-b", "Unknown");
        assert_eq!(cache.get("repo-b"), Some("Unknown".to_string()));
    }
}
