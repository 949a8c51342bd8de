use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::store::{now, Store, StoreError};
use crate::Result;

/// Query used when the user has not configured one.
pub const DEFAULT_SEARCH_QUERY: &str = "is:issue is:open label:bounty";

pub const SEARCH_QUERY_KEY: &str = "search_query";
pub const HIDDEN_REPOSITORIES_KEY: &str = "hidden_repositories";

/// The closed set of user settings.
///
/// Each known key decodes into exactly one variant; an unrecognized key or
/// value shape is an explicit error rather than an opaque JSON blob passed
/// through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Setting {
    SearchQuery { query: String },
    HiddenRepositories { repositories: Vec<String> },
}

impl Setting {
    pub fn key(&self) -> &'static str {
        match self {
            Setting::SearchQuery { .. } => SEARCH_QUERY_KEY,
            Setting::HiddenRepositories { .. } => HIDDEN_REPOSITORIES_KEY,
        }
    }

    /// Decode a stored JSON value against its key.
    pub fn decode(key: &str, json: &str) -> Result<Setting> {
        let malformed = |e: serde_json::Error| StoreError::MalformedSetting {
            key: key.to_string(),
            reason: e.to_string(),
        };

        match key {
            SEARCH_QUERY_KEY => {
                #[derive(Deserialize)]
                #[serde(deny_unknown_fields)]
                struct Value {
                    query: String,
                }
                let value: Value = serde_json::from_str(json).map_err(malformed)?;
                Ok(Setting::SearchQuery { query: value.query })
            }
            HIDDEN_REPOSITORIES_KEY => {
                #[derive(Deserialize)]
                #[serde(deny_unknown_fields)]
                struct Value {
                    repositories: Vec<String>,
                }
                let value: Value = serde_json::from_str(json).map_err(malformed)?;
                Ok(Setting::HiddenRepositories {
                    repositories: value.repositories,
                })
            }
            other => Err(StoreError::UnknownSettingKey(other.to_string())),
        }
    }
}

impl Store {
    /// Persist a setting.
    ///
    /// Hidden repositories live on the repositories table itself (the flag
    /// is the source of truth for search), so that variant is applied there
    /// instead of being written as JSON.
    pub fn set_setting(&self, setting: &Setting) -> Result<()> {
        match setting {
            Setting::SearchQuery { query } => {
                let json = serde_json::to_string(&serde_json::json!({ "query": query }))?;
                self.conn().execute(
                    "INSERT INTO user_settings (setting_key, setting_value, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?3)
                     ON CONFLICT(setting_key) DO UPDATE SET setting_value = ?2, updated_at = ?3",
                    params![SEARCH_QUERY_KEY, json, now()],
                )?;
                Ok(())
            }
            Setting::HiddenRepositories { repositories } => {
                let conn = self.conn();
                let stamp = now();
                conn.execute(
                    "UPDATE repositories SET is_hidden = 0, updated_at = ?1 WHERE is_hidden = 1",
                    params![stamp],
                )?;
                for name in repositories {
                    conn.execute(
                        "UPDATE repositories SET is_hidden = 1, updated_at = ?1 WHERE name = ?2",
                        params![stamp, name],
                    )?;
                }
                Ok(())
            }
        }
    }

    /// Read one setting by key, `None` when never set.
    pub fn setting(&self, key: &str) -> Result<Option<Setting>> {
        match key {
            HIDDEN_REPOSITORIES_KEY => {
                let repositories = self.hidden_repositories()?;
                Ok(Some(Setting::HiddenRepositories { repositories }))
            }
            SEARCH_QUERY_KEY => {
                let json: Option<String> = self
                    .conn()
                    .query_row(
                        "SELECT setting_value FROM user_settings WHERE setting_key = ?1",
                        params![key],
                        |row| row.get(0),
                    )
                    .optional()?;

                match json {
                    Some(json) => Setting::decode(key, &json).map(Some),
                    None => Ok(None),
                }
            }
            other => Err(StoreError::UnknownSettingKey(other.to_string())),
        }
    }

    /// The configured search query, falling back to the default.
    ///
    /// Storage or decode failures degrade to the default rather than
    /// failing a refresh over a bad setting row.
    pub fn search_query(&self) -> String {
        match self.setting(SEARCH_QUERY_KEY) {
            Ok(Some(Setting::SearchQuery { query })) if !query.trim().is_empty() => query,
            Ok(_) => DEFAULT_SEARCH_QUERY.to_string(),
            Err(err) => {
                warn!(%err, "Failed to read search query setting, using default");
                DEFAULT_SEARCH_QUERY.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_query_defaults_when_unset() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.search_query(), DEFAULT_SEARCH_QUERY);
    }

    #[test]
    fn search_query_round_trips() {
        let store = Store::open_in_memory().unwrap();
        store
            .set_setting(&Setting::SearchQuery {
                query: "is:issue is:open label:\"bounty\" language:rust".to_string(),
            })
            .unwrap();

        assert_eq!(
            store.search_query(),
            "is:issue is:open label:\"bounty\" language:rust"
        );

        // Overwrite, not duplicate
        store
            .set_setting(&Setting::SearchQuery {
                query: "label:help-wanted".to_string(),
            })
            .unwrap();
        assert_eq!(store.search_query(), "label:help-wanted");
    }

    #[test]
    fn decode_rejects_unknown_key() {
        assert!(matches!(
            Setting::decode("favorite_color", "{}"),
            Err(StoreError::UnknownSettingKey(_))
        ));
    }

    #[test]
    fn decode_rejects_malformed_shape() {
        assert!(matches!(
            Setting::decode(SEARCH_QUERY_KEY, r#"{"q": "nope"}"#),
            Err(StoreError::MalformedSetting { .. })
        ));
        assert!(matches!(
            Setting::decode(SEARCH_QUERY_KEY, "not json"),
            Err(StoreError::MalformedSetting { .. })
        ));
    }

    #[test]
    fn hidden_repositories_setting_drives_flags() {
        let store = Store::open_in_memory().unwrap();
        store
            .get_or_create_repository("acme/widgets", "url-a", None)
            .unwrap();
        store
            .get_or_create_repository("acme/gadgets", "url-b", None)
            .unwrap();

        store
            .set_setting(&Setting::HiddenRepositories {
                repositories: vec!["acme/widgets".to_string()],
            })
            .unwrap();

        assert_eq!(
            store.setting(HIDDEN_REPOSITORIES_KEY).unwrap(),
            Some(Setting::HiddenRepositories {
                repositories: vec!["acme/widgets".to_string()]
            })
        );

        // Applying a new list replaces the old flags
        store
            .set_setting(&Setting::HiddenRepositories {
                repositories: vec!["acme/gadgets".to_string()],
            })
            .unwrap();
        assert_eq!(
            store.hidden_repositories().unwrap(),
            vec!["acme/gadgets".to_string()]
        );
    }
}
