// Issue tracker extension: links a room's topic to an issue key and shows
// where a revealed estimate would be exported.
//
// The extension's own backend lives behind the opaque extension-config
// endpoints; this module only carries the narrow contract the client needs:
// the two render slots plus a debounced issue-key search used while editing
// the room topic.

use std::sync::Arc;
use std::time::Duration;

use ratatui::text::Text;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::warn;

use crate::api::{ApiClient, ApiError};
use crate::model::{Room, VoteSummary};
use crate::protocol::ExtensionEvent;
use crate::util::{Debouncer, Memo};

use super::Extension;

/// Registry key, matching the server-side extension key.
pub const KEY: &str = "issuetracker";

/// Quiet period before an issue search fires.
const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Minimum query length worth a round trip.
const MIN_QUERY_LEN: usize = 2;

// ---------------------------------------------------------------------------
// Extension implementation
// ---------------------------------------------------------------------------

pub struct IssueTrackerExtension;

impl IssueTrackerExtension {
    pub fn new() -> Self {
        IssueTrackerExtension
    }
}

impl Default for IssueTrackerExtension {
    fn default() -> Self {
        Self::new()
    }
}

impl Extension for IssueTrackerExtension {
    fn key(&self) -> &'static str {
        KEY
    }

    fn label(&self) -> &'static str {
        "Issue Tracker"
    }

    fn room_panel(&self, room: &Room) -> Text<'static> {
        match linked_issue(room) {
            Some(issue) => Text::raw(format!("Linked issue: {issue}")),
            None => Text::raw("No issue linked. Set the room topic to an issue key."),
        }
    }

    fn submit_panel(&self, room: &Room, summary: Option<&VoteSummary>) -> Text<'static> {
        let estimate = summary
            .and_then(|s| s.nearest_card.as_ref())
            .map(|c| c.name.clone());
        match (linked_issue(room), estimate) {
            (Some(issue), Some(card)) => {
                Text::raw(format!("Estimate {card} ready to export to {issue}"))
            }
            (Some(issue), None) => Text::raw(format!("No estimate to export to {issue}")),
            (None, _) => Text::raw("No issue linked"),
        }
    }
}

/// The issue key a room is linked to, if its topic looks like one.
///
/// Issue keys have the shape `PROJECT-123`: an alphabetic project prefix, a
/// dash, and a numeric part.
pub fn linked_issue(room: &Room) -> Option<&str> {
    let topic = room.topic.as_deref()?;
    is_issue_key(topic).then_some(topic)
}

fn is_issue_key(candidate: &str) -> bool {
    let Some((project, number)) = candidate.split_once('-') else {
        return false;
    };
    !project.is_empty()
        && project.chars().all(|c| c.is_ascii_alphabetic())
        && !number.is_empty()
        && number.chars().all(|c| c.is_ascii_digit())
}

// ---------------------------------------------------------------------------
// Debounced issue search
// ---------------------------------------------------------------------------

/// Search-as-you-type helper for the topic editor.
///
/// Lives on the orchestrator task. Results come back through the extension
/// event channel as [`ExtensionEvent::IssueSuggestions`] and are recorded
/// into the cache by the orchestrator via [`IssueSuggester::record`],
/// keeping the cache single-writer.
pub struct IssueSuggester {
    debouncer: Debouncer,
    cache: Memo<String, Vec<String>>,
}

impl IssueSuggester {
    pub fn new() -> Self {
        IssueSuggester {
            debouncer: Debouncer::new(SEARCH_DEBOUNCE),
            cache: Memo::new(),
        }
    }

    /// React to an edited query: serve from cache when possible, otherwise
    /// schedule a debounced fetch. Queries shorter than the minimum clear
    /// the pending fetch instead.
    pub fn on_input(
        &mut self,
        query: &str,
        api: Arc<ApiClient>,
        ext_tx: mpsc::Sender<ExtensionEvent>,
    ) {
        if query.len() < MIN_QUERY_LEN {
            self.debouncer.cancel();
            return;
        }
        if let Some(suggestions) = self.cache.get(&query.to_string()) {
            let query = query.to_string();
            let _ = ext_tx.try_send(ExtensionEvent::IssueSuggestions { query, suggestions });
            return;
        }
        let query = query.to_string();
        self.debouncer.call(async move {
            match search_issue_keys(&api, &query).await {
                Ok(suggestions) => {
                    let _ = ext_tx
                        .send(ExtensionEvent::IssueSuggestions { query, suggestions })
                        .await;
                }
                Err(e) => warn!("issue search for '{query}' failed: {e}"),
            }
        });
    }

    /// Record a completed search so repeats are served locally.
    pub fn record(&mut self, query: String, suggestions: Vec<String>) {
        self.cache.insert(query, suggestions);
    }
}

impl Default for IssueSuggester {
    fn default() -> Self {
        Self::new()
    }
}

/// Fetch the extension's global config and filter its issue list by the
/// query. The config shape is extension-defined:
/// `{ "issues": [{ "key": "ABC-1", "title": "..." }, ...] }`.
async fn search_issue_keys(api: &ApiClient, query: &str) -> Result<Vec<String>, ApiError> {
    let config = api.get_extension_config(KEY).await?;
    Ok(filter_issue_keys(&config, query))
}

/// Pull the issue keys matching `query` (case-insensitive substring) out of
/// the extension config payload. Entries without a `key` field are skipped.
pub(crate) fn filter_issue_keys(config: &Value, query: &str) -> Vec<String> {
    let needle = query.to_ascii_lowercase();
    config
        .get("issues")
        .and_then(Value::as_array)
        .map(|issues| {
            issues
                .iter()
                .filter_map(|issue| issue.get("key").and_then(Value::as_str))
                .filter(|key| key.to_ascii_lowercase().contains(&needle))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Card, Role, RoomMember};
    use std::collections::BTreeSet;

    fn room(topic: Option<&str>, voting_closed: bool) -> Room {
        Room {
            name: "r".into(),
            topic: topic.map(str::to_string),
            card_set_name: "Fibonacci".into(),
            members: vec![RoomMember {
                username: "alice".into(),
                role: Role::Voter,
                vote: None,
            }],
            voting_closed,
            extensions: BTreeSet::from([KEY.to_string()]),
        }
    }

    fn summary_with_nearest(name: &str) -> VoteSummary {
        VoteSummary {
            average: Some(4.6),
            offset: 1,
            nearest_card: Some(Card {
                name: name.to_string(),
                value: Some(5.0),
                description: None,
            }),
            highest: None,
            lowest: None,
        }
    }

    #[test]
    fn issue_key_detection() {
        assert!(is_issue_key("ABC-123"));
        assert!(is_issue_key("proj-1"));
        assert!(!is_issue_key("checkout flow"));
        assert!(!is_issue_key("ABC-"));
        assert!(!is_issue_key("-123"));
        assert!(!is_issue_key("ABC-12x"));
    }

    #[test]
    fn room_panel_shows_linked_issue() {
        let ext = IssueTrackerExtension::new();
        let text = ext.room_panel(&room(Some("ABC-123"), false));
        assert!(format!("{text:?}").contains("ABC-123"));
    }

    #[test]
    fn room_panel_without_issue_hints_at_topic() {
        let ext = IssueTrackerExtension::new();
        let text = ext.room_panel(&room(Some("checkout flow"), false));
        assert!(format!("{text:?}").contains("No issue linked"));
    }

    #[test]
    fn submit_panel_offers_export_when_estimate_exists() {
        let ext = IssueTrackerExtension::new();
        let summary = summary_with_nearest("5");
        let text = ext.submit_panel(&room(Some("ABC-123"), true), Some(&summary));
        let rendered = format!("{text:?}");
        assert!(rendered.contains("5"));
        assert!(rendered.contains("ABC-123"));
    }

    #[test]
    fn submit_panel_without_votes_has_nothing_to_export() {
        let ext = IssueTrackerExtension::new();
        let text = ext.submit_panel(&room(Some("ABC-123"), true), None);
        assert!(format!("{text:?}").contains("No estimate"));
    }

    #[test]
    fn filter_issue_keys_matches_substring_case_insensitive() {
        let config = serde_json::json!({
            "issues": [
                { "key": "SHOP-101", "title": "Checkout" },
                { "key": "SHOP-102", "title": "Cart" },
                { "key": "OPS-7", "title": "Deploy" },
            ]
        });
        assert_eq!(
            filter_issue_keys(&config, "shop"),
            vec!["SHOP-101".to_string(), "SHOP-102".to_string()]
        );
        assert_eq!(filter_issue_keys(&config, "ops"), vec!["OPS-7".to_string()]);
        assert!(filter_issue_keys(&config, "none").is_empty());
    }

    #[test]
    fn filter_issue_keys_tolerates_odd_shapes() {
        assert!(filter_issue_keys(&serde_json::json!({}), "x").is_empty());
        assert!(filter_issue_keys(&serde_json::json!({ "issues": "nope" }), "x").is_empty());
        let partial = serde_json::json!({ "issues": [{ "title": "no key" }, { "key": "A-1" }] });
        assert_eq!(filter_issue_keys(&partial, "a"), vec!["A-1".to_string()]);
    }
}
