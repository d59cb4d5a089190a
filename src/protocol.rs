// Message types exchanged between the orchestrator, background extension
// tasks, and the TUI.
//
// The TUI never touches domain state directly: it sends `UserCommand`s and
// renders whatever `UiUpdate`s the orchestrator pushes back.

use ratatui::text::Text;

use crate::model::{CardSet, Role, Room};
use crate::room::engine::RoomView;

// ---------------------------------------------------------------------------
// Commands (TUI -> orchestrator)
// ---------------------------------------------------------------------------

/// A user intent raised by the TUI.
#[derive(Debug, Clone, PartialEq)]
pub enum UserCommand {
    Quit,

    // Lobby
    EnterRoom(String),
    CreateRoom { name: String, card_set_name: String },
    DeleteRoom(String),

    // Room view
    LeaveRoom,
    CastVote(String),
    ClearVotes,
    SetMemberRole { username: String, role: Role },
    KickMember(String),
    SetTopic(String),
    SetCardSet(String),
    ToggleExtension(String),
    /// The topic editor's current text changed; drives the debounced issue
    /// search when the issue tracker extension is active.
    IssueQueryChanged(String),
}

// ---------------------------------------------------------------------------
// Extension events (background tasks -> orchestrator)
// ---------------------------------------------------------------------------

/// Results produced by extension background work, routed through the
/// orchestrator so it can update its caches before forwarding to the TUI.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtensionEvent {
    IssueSuggestions {
        query: String,
        suggestions: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Updates (orchestrator -> TUI)
// ---------------------------------------------------------------------------

/// One extension's rendered slot for the current room state.
#[derive(Debug, Clone)]
pub struct ExtensionPanel {
    pub label: String,
    pub body: Text<'static>,
}

/// Everything the TUI needs to draw the room view.
#[derive(Debug, Clone)]
pub struct RoomSnapshotUi {
    pub view: RoomView,
    /// The room's resolved card deck, for rendering the hand.
    pub deck: CardSet,
    /// Active extension slots, in registry order.
    pub panels: Vec<ExtensionPanel>,
    /// The local username, for highlighting the own roster row.
    pub username: String,
}

/// Everything the TUI needs to draw the lobby.
#[derive(Debug, Clone, Default)]
pub struct LobbySnapshot {
    pub rooms: Vec<Room>,
    pub card_set_names: Vec<String>,
}

/// A state push from the orchestrator to the TUI.
#[derive(Debug, Clone)]
pub enum UiUpdate {
    Lobby(Box<LobbySnapshot>),
    Room(Box<RoomSnapshotUi>),
    /// The room view ended (voluntary leave, kick, or a fatal view error).
    /// An optional notice explains why when the user didn't ask for it.
    LeftRoom { notice: Option<String> },
    /// Dismissible error banner. Never blocks interaction.
    Error(String),
    IssueSuggestions {
        query: String,
        suggestions: Vec<String>,
    },
}
