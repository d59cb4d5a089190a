// Pluggable room extensions.
//
// Extensions are compiled into the client and contribute two render slots:
// one shown while voting is open (the room panel) and one shown with the
// revealed summary (the submit panel). The core filters the registry against
// the deployment's globally enabled keys and each room's opt-in set; it
// never looks inside an extension.

pub mod issuetracker;

use ratatui::text::Text;

use crate::model::{Room, VoteSummary};

use issuetracker::IssueTrackerExtension;

// ---------------------------------------------------------------------------
// Extension contract
// ---------------------------------------------------------------------------

/// A pluggable integration contributing UI affordances tied to room and vote
/// state. Stateless from the core's perspective.
pub trait Extension: Send + Sync {
    /// Stable key used for enablement filtering (deployment- and room-level).
    fn key(&self) -> &'static str;

    /// Human-readable name shown in the UI.
    fn label(&self) -> &'static str;

    /// Render slot shown in the room view while voting is open.
    fn room_panel(&self, room: &Room) -> Text<'static>;

    /// Render slot shown alongside the revealed vote summary.
    fn submit_panel(&self, room: &Room, summary: Option<&VoteSummary>) -> Text<'static>;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// The fixed set of extensions compiled into this client build, in
/// registration order.
pub struct ExtensionRegistry {
    entries: Vec<Box<dyn Extension>>,
}

impl ExtensionRegistry {
    /// All extensions this build knows about.
    pub fn builtin() -> Self {
        ExtensionRegistry {
            entries: vec![Box::new(IssueTrackerExtension::new())],
        }
    }

    #[cfg(test)]
    fn with_entries(entries: Vec<Box<dyn Extension>>) -> Self {
        ExtensionRegistry { entries }
    }

    /// Extensions enabled for this deployment, in registry order.
    ///
    /// Keys the build doesn't know are silently ignored so that a newer
    /// server can enable extensions an older client doesn't ship.
    pub fn enabled(&self, global_keys: &[String]) -> Vec<&dyn Extension> {
        self.entries
            .iter()
            .map(|e| e.as_ref())
            .filter(|e| global_keys.iter().any(|k| k == e.key()))
            .collect()
    }

    /// Of the `enabled` extensions, those a specific room has opted into,
    /// preserving `enabled` order. Unknown keys in the room's set are
    /// ignored.
    pub fn active_for_room<'a>(
        enabled: &[&'a dyn Extension],
        room: &Room,
    ) -> Vec<&'a dyn Extension> {
        enabled
            .iter()
            .copied()
            .filter(|e| room.extensions.contains(e.key()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    struct Fake(&'static str);

    impl Extension for Fake {
        fn key(&self) -> &'static str {
            self.0
        }
        fn label(&self) -> &'static str {
            self.0
        }
        fn room_panel(&self, _room: &Room) -> Text<'static> {
            Text::raw(self.0)
        }
        fn submit_panel(&self, _room: &Room, _summary: Option<&VoteSummary>) -> Text<'static> {
            Text::raw(self.0)
        }
    }

    fn registry() -> ExtensionRegistry {
        ExtensionRegistry::with_entries(vec![
            Box::new(Fake("alpha")),
            Box::new(Fake("beta")),
            Box::new(Fake("gamma")),
        ])
    }

    fn room_with_extensions(keys: &[&str]) -> Room {
        Room {
            name: "r".into(),
            topic: None,
            card_set_name: "Fibonacci".into(),
            members: vec![],
            voting_closed: false,
            extensions: keys.iter().map(|k| k.to_string()).collect::<BTreeSet<_>>(),
        }
    }

    #[test]
    fn enabled_preserves_registry_order() {
        let registry = registry();
        let keys = vec!["gamma".to_string(), "alpha".to_string()];
        let enabled = registry.enabled(&keys);
        let names: Vec<_> = enabled.iter().map(|e| e.key()).collect();
        assert_eq!(names, ["alpha", "gamma"]);
    }

    #[test]
    fn enabled_ignores_unknown_keys() {
        let registry = registry();
        let keys = vec!["alpha".to_string(), "from-the-future".to_string()];
        let enabled = registry.enabled(&keys);
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].key(), "alpha");
    }

    #[test]
    fn active_for_room_filters_by_room_opt_in() {
        let registry = registry();
        let all: Vec<String> = ["alpha", "beta", "gamma"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let enabled = registry.enabled(&all);

        let room = room_with_extensions(&["beta", "unknown"]);
        let active = ExtensionRegistry::active_for_room(&enabled, &room);
        let names: Vec<_> = active.iter().map(|e| e.key()).collect();
        assert_eq!(names, ["beta"]);
    }

    #[test]
    fn active_for_room_preserves_enabled_order() {
        let registry = registry();
        let all: Vec<String> = ["alpha", "beta", "gamma"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let enabled = registry.enabled(&all);

        let room = room_with_extensions(&["gamma", "alpha"]);
        let active = ExtensionRegistry::active_for_room(&enabled, &room);
        let names: Vec<_> = active.iter().map(|e| e.key()).collect();
        assert_eq!(names, ["alpha", "gamma"]);
    }

    #[test]
    fn room_not_opted_in_yields_nothing() {
        let registry = registry();
        let all = vec!["alpha".to_string()];
        let enabled = registry.enabled(&all);
        let room = room_with_extensions(&[]);
        assert!(ExtensionRegistry::active_for_room(&enabled, &room).is_empty());
    }

    #[test]
    fn builtin_registry_contains_issuetracker() {
        let registry = ExtensionRegistry::builtin();
        let enabled = registry.enabled(&["issuetracker".to_string()]);
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].label(), "Issue Tracker");
    }
}
