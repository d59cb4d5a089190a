// Action dispatcher: translates user intents into server mutations followed
// by a forced reconciliation pass.
//
// Every action follows the same shape: validate locally where applicable,
// call the server, and on success force a reconciliation so the UI reflects
// the user's own action without waiting for the next poll tick. On failure
// nothing is refreshed; the error propagates to the view's error funnel and
// prior state stays in place (except the optimistic vote, which is rolled
// back).

use std::collections::BTreeSet;

use thiserror::Error;

use crate::api::MemberAction;
use crate::model::{Card, Room, RoomPatch};

use super::engine::{EngineError, ReconcileOutcome, RoomEngine, RoomView};

// ---------------------------------------------------------------------------
// Room name validation
// ---------------------------------------------------------------------------

/// Client-side validation failures, surfaced as form-field state in the
/// create-room prompt. No request is fired for an invalid name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RoomNameError {
    #[error("room name must not be empty")]
    Empty,

    #[error("room name may only contain letters, digits, '-' and '_'")]
    InvalidCharacters,

    #[error("a room with this name already exists")]
    AlreadyExists,
}

/// Validate a candidate room name against the charset rules and the known
/// room list.
pub fn validate_room_name(name: &str, existing: &[Room]) -> Result<(), RoomNameError> {
    if name.is_empty() {
        return Err(RoomNameError::Empty);
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(RoomNameError::InvalidCharacters);
    }
    if existing.iter().any(|r| r.name == name) {
        return Err(RoomNameError::AlreadyExists);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Room edit diffing
// ---------------------------------------------------------------------------

/// The desired state of a room's editable fields after an edit.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomEdit {
    pub topic: Option<String>,
    pub card_set_name: String,
    pub extensions: BTreeSet<String>,
}

impl RoomEdit {
    /// Start from the room's current editable fields.
    pub fn from_room(room: &Room) -> Self {
        RoomEdit {
            topic: room.topic.clone(),
            card_set_name: room.card_set_name.clone(),
            extensions: room.extensions.clone(),
        }
    }
}

/// Compute the partial patch for an edit: only fields that differ from the
/// last-seen room are included, so omitted keys mean "unchanged" on the
/// wire.
pub fn diff_room_edit(current: &Room, edited: &RoomEdit) -> RoomPatch {
    RoomPatch {
        topic: (current.topic != edited.topic)
            .then(|| edited.topic.clone().unwrap_or_default()),
        card_set_name: (current.card_set_name != edited.card_set_name)
            .then(|| edited.card_set_name.clone()),
        extensions: (current.extensions != edited.extensions)
            .then(|| edited.extensions.clone()),
    }
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// A user intent against the currently entered room.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomAction {
    /// Cast (or overwrite) the local member's vote.
    CastVote(Card),
    /// Clear all votes, reopening the round.
    ClearVotes,
    /// Change another member's role or kick them.
    EditMember {
        username: String,
        action: MemberAction,
    },
    /// Apply edited room settings (diffed into a partial patch).
    EditRoom(RoomEdit),
}

/// Result of dispatching an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The mutation went through and the forced pass yielded this outcome.
    Reconciled(ReconcileOutcome),
    /// Nothing to submit (e.g. an edit that changed no fields).
    Noop,
}

/// Dispatch one action through the engine's service and force a
/// reconciliation pass on success.
///
/// `notify` is invoked with the optimistically updated view immediately
/// after a vote preview, before the server call resolves, so the deck can
/// highlight the chosen card without waiting for the round trip.
pub async fn dispatch<F>(
    engine: &mut RoomEngine,
    action: RoomAction,
    mut notify: F,
) -> Result<DispatchOutcome, EngineError>
where
    F: FnMut(&RoomView),
{
    match action {
        RoomAction::CastVote(card) => {
            let previous = engine.preview_vote(card.clone());
            if let Some(view) = engine.view() {
                notify(view);
            }
            let service = engine.service().clone();
            match service.cast_vote(engine.room_name(), &card.name).await {
                Ok(()) => Ok(DispatchOutcome::Reconciled(engine.reconcile().await?)),
                Err(e) => {
                    // Roll back the optimistic value so a failing poll loop
                    // can't pin a vote the server never saw.
                    engine.rollback_vote(previous);
                    Err(e.into())
                }
            }
        }

        RoomAction::ClearVotes => {
            let service = engine.service().clone();
            service.clear_votes(engine.room_name()).await?;
            Ok(DispatchOutcome::Reconciled(engine.reconcile().await?))
        }

        RoomAction::EditMember { username, action } => {
            let service = engine.service().clone();
            service
                .edit_member(engine.room_name(), &username, action)
                .await?;
            Ok(DispatchOutcome::Reconciled(engine.reconcile().await?))
        }

        RoomAction::EditRoom(edited) => {
            let Some(view) = engine.view() else {
                return Ok(DispatchOutcome::Noop);
            };
            let patch = diff_room_edit(&view.room, &edited);
            if patch.is_empty() {
                return Ok(DispatchOutcome::Noop);
            }
            let service = engine.service().clone();
            service.edit_room(engine.room_name(), &patch).await?;
            Ok(DispatchOutcome::Reconciled(engine.reconcile().await?))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn room(name: &str) -> Room {
        Room {
            name: name.to_string(),
            topic: Some("A".to_string()),
            card_set_name: "X".to_string(),
            members: vec![],
            voting_closed: false,
            extensions: BTreeSet::from(["e1".to_string()]),
        }
    }

    // -- name validation --

    #[test]
    fn valid_room_names_pass() {
        assert_eq!(validate_room_name("sprint-42", &[]), Ok(()));
        assert_eq!(validate_room_name("Room_1", &[]), Ok(()));
    }

    #[test]
    fn empty_name_rejected() {
        assert_eq!(validate_room_name("", &[]), Err(RoomNameError::Empty));
    }

    #[test]
    fn disallowed_characters_rejected() {
        assert_eq!(
            validate_room_name("no spaces", &[]),
            Err(RoomNameError::InvalidCharacters)
        );
        assert_eq!(
            validate_room_name("slash/room", &[]),
            Err(RoomNameError::InvalidCharacters)
        );
    }

    #[test]
    fn duplicate_name_rejected_before_any_request() {
        let existing = vec![room("taken")];
        assert_eq!(
            validate_room_name("taken", &existing),
            Err(RoomNameError::AlreadyExists)
        );
        assert_eq!(validate_room_name("free", &existing), Ok(()));
    }

    // -- edit diffing --

    #[test]
    fn diff_includes_only_changed_fields() {
        let current = room("r");
        let mut edited = RoomEdit::from_room(&current);
        edited.topic = Some("B".to_string());

        let patch = diff_room_edit(&current, &edited);
        assert_eq!(patch.topic.as_deref(), Some("B"));
        assert!(patch.card_set_name.is_none());
        assert!(patch.extensions.is_none());
    }

    #[test]
    fn diff_of_unchanged_edit_is_empty() {
        let current = room("r");
        let edited = RoomEdit::from_room(&current);
        assert!(diff_room_edit(&current, &edited).is_empty());
    }

    #[test]
    fn diff_detects_extension_toggle() {
        let current = room("r");
        let mut edited = RoomEdit::from_room(&current);
        edited.extensions.insert("e2".to_string());

        let patch = diff_room_edit(&current, &edited);
        assert!(patch.topic.is_none());
        assert_eq!(
            patch.extensions,
            Some(BTreeSet::from(["e1".to_string(), "e2".to_string()]))
        );
    }

    #[test]
    fn diff_cleared_topic_sends_empty_string() {
        let current = room("r");
        let mut edited = RoomEdit::from_room(&current);
        edited.topic = None;

        let patch = diff_room_edit(&current, &edited);
        assert_eq!(patch.topic.as_deref(), Some(""));
    }
}
