// TUI: layout, input handling, and widget rendering.
//
// The TUI owns a `ViewState` that mirrors what the orchestrator pushes over
// the `UiUpdate` channel; it applies updates, re-renders at ~30 fps, and
// translates key presses into `UserCommand`s. No domain decisions are made
// here.

pub mod input;
pub mod layout;
pub mod widgets;

use std::time::Duration;

use crossterm::event::{Event, EventStream};
use futures_util::StreamExt;
use ratatui::Frame;
use tokio::sync::mpsc;

use crate::protocol::{LobbySnapshot, RoomSnapshotUi, UiUpdate, UserCommand};
use crate::room::actions::RoomNameError;

// ---------------------------------------------------------------------------
// ViewState
// ---------------------------------------------------------------------------

/// In-progress create-room form in the lobby.
#[derive(Debug, Clone, Default)]
pub struct CreatePrompt {
    pub name: String,
    /// Index into the card set name list.
    pub card_set_idx: usize,
    /// Live validation result shown inline; `Some` blocks submission.
    pub error: Option<RoomNameError>,
}

/// In-progress topic editor in the room view.
#[derive(Debug, Clone, Default)]
pub struct TopicPrompt {
    pub text: String,
    /// Issue-key suggestions for the current text (debounced).
    pub suggestions: Vec<String>,
}

/// Lobby screen state.
#[derive(Debug, Clone, Default)]
pub struct LobbyView {
    pub snapshot: LobbySnapshot,
    pub selected: usize,
    pub create_prompt: Option<CreatePrompt>,
}

/// Room screen state.
#[derive(Debug, Clone)]
pub struct RoomScreen {
    pub snapshot: RoomSnapshotUi,
    pub selected_card: usize,
    pub selected_member: usize,
    pub topic_prompt: Option<TopicPrompt>,
}

/// Which screen the TUI is rendering.
pub enum UiScreen {
    Lobby(LobbyView),
    Room(Box<RoomScreen>),
}

/// TUI-local state, updated incrementally via `UiUpdate` messages.
pub struct ViewState {
    pub screen: UiScreen,
    /// Dismissible banner (errors and notices). Never blocks interaction.
    pub banner: Option<String>,
}

impl Default for ViewState {
    fn default() -> Self {
        ViewState {
            screen: UiScreen::Lobby(LobbyView::default()),
            banner: None,
        }
    }
}

// ---------------------------------------------------------------------------
// UiUpdate processing
// ---------------------------------------------------------------------------

/// Apply a single UiUpdate to the ViewState.
pub(crate) fn apply_ui_update(state: &mut ViewState, update: UiUpdate) {
    match update {
        UiUpdate::Lobby(snapshot) => match &mut state.screen {
            UiScreen::Lobby(lobby) => {
                lobby.selected = lobby
                    .selected
                    .min(snapshot.rooms.len().saturating_sub(1));
                lobby.snapshot = *snapshot;
            }
            // A room screen outlives stray lobby refreshes; the orchestrator
            // sends LeftRoom before any lobby snapshot that matters.
            UiScreen::Room(_) => {}
        },
        UiUpdate::Room(snapshot) => match &mut state.screen {
            UiScreen::Room(room) => {
                room.selected_card = room
                    .selected_card
                    .min(snapshot.deck.cards.len().saturating_sub(1));
                room.selected_member = room
                    .selected_member
                    .min(snapshot.view.room.members.len().saturating_sub(1));
                room.snapshot = *snapshot;
            }
            UiScreen::Lobby(_) => {
                state.screen = UiScreen::Room(Box::new(RoomScreen {
                    snapshot: *snapshot,
                    selected_card: 0,
                    selected_member: 0,
                    topic_prompt: None,
                }));
            }
        },
        UiUpdate::LeftRoom { notice } => {
            state.screen = UiScreen::Lobby(LobbyView::default());
            if notice.is_some() {
                state.banner = notice;
            }
        }
        UiUpdate::Error(message) => {
            state.banner = Some(message);
        }
        UiUpdate::IssueSuggestions { query, suggestions } => {
            if let UiScreen::Room(room) = &mut state.screen {
                if let Some(prompt) = &mut room.topic_prompt {
                    // Only accept results for what is currently typed;
                    // superseded queries are stale.
                    if prompt.text == query {
                        prompt.suggestions = suggestions;
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render the complete frame for the current screen.
fn render_frame(frame: &mut Frame, state: &ViewState) {
    match &state.screen {
        UiScreen::Lobby(lobby) => {
            let zones = layout::lobby_layout(frame.area());
            widgets::status_bar::render_lobby(frame, zones.status_bar, lobby);
            widgets::room_list::render(frame, zones.list, lobby);
            widgets::room_list::render_prompt(frame, zones.prompt, lobby);
            widgets::status_bar::render_banner(frame, zones.banner, state.banner.as_deref());
            widgets::status_bar::render_help(frame, zones.help_bar, input::LOBBY_HELP);
        }
        UiScreen::Room(room) => {
            let zones = layout::room_layout(frame.area());
            widgets::status_bar::render_room(frame, zones.status_bar, room);
            widgets::deck::render(frame, zones.deck, room);
            widgets::summary::render(frame, zones.summary, room);
            widgets::roster::render(frame, zones.roster, room);
            widgets::summary::render_extensions(frame, zones.extensions, room);
            widgets::status_bar::render_banner(frame, zones.banner, state.banner.as_deref());
            widgets::status_bar::render_help(frame, zones.help_bar, input::ROOM_HELP);
        }
    }
}

// ---------------------------------------------------------------------------
// Main TUI loop
// ---------------------------------------------------------------------------

/// Run the TUI event loop.
///
/// Initializes the terminal, installs a panic hook that restores it, then
/// selects over orchestrator updates, keyboard input, and a render tick
/// until the user quits or the update channel closes.
pub async fn run(
    mut ui_rx: mpsc::Receiver<UiUpdate>,
    cmd_tx: mpsc::Sender<UserCommand>,
) -> anyhow::Result<()> {
    let mut terminal = ratatui::init();

    // Restore the terminal even when rendering panics.
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = ratatui::restore();
        original_hook(panic_info);
    }));

    let mut view_state = ViewState::default();
    let mut event_stream = EventStream::new();

    let mut render_tick = tokio::time::interval(Duration::from_millis(33));
    render_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            update = ui_rx.recv() => {
                match update {
                    Some(update) => apply_ui_update(&mut view_state, update),
                    // Orchestrator is gone; shut down.
                    None => break,
                }
            }

            maybe_event = event_stream.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key_event))) => {
                        if let Some(cmd) = input::handle_key(key_event, &mut view_state) {
                            let quitting = cmd == UserCommand::Quit;
                            let _ = cmd_tx.send(cmd).await;
                            if quitting {
                                break;
                            }
                        }
                    }
                    Some(Ok(_)) => {
                        // Resize/mouse events need no handling; the next
                        // render tick picks up the new area.
                    }
                    Some(Err(_)) | None => break,
                }
            }

            _ = render_tick.tick() => {
                terminal.draw(|frame| render_frame(frame, &view_state))?;
            }
        }
    }

    ratatui::restore();
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Card, CardSet, Role, Room, RoomMember};
    use crate::room::engine::RoomView;
    use std::collections::BTreeSet;

    fn room_snapshot() -> RoomSnapshotUi {
        RoomSnapshotUi {
            view: RoomView {
                room: Room {
                    name: "R1".into(),
                    topic: None,
                    card_set_name: "Fibonacci".into(),
                    members: vec![RoomMember {
                        username: "alice".into(),
                        role: Role::Voter,
                        vote: None,
                    }],
                    voting_closed: false,
                    extensions: BTreeSet::new(),
                },
                active_vote: None,
                summary: None,
            },
            deck: CardSet {
                name: "Fibonacci".into(),
                cards: vec![
                    Card {
                        name: "1".into(),
                        value: Some(1.0),
                        description: None,
                    },
                    Card {
                        name: "5".into(),
                        value: Some(5.0),
                        description: None,
                    },
                ],
                relevant_fraction_digits: 1,
            },
            panels: vec![],
            username: "alice".into(),
        }
    }

    #[test]
    fn default_state_is_lobby() {
        let state = ViewState::default();
        assert!(matches!(state.screen, UiScreen::Lobby(_)));
        assert!(state.banner.is_none());
    }

    #[test]
    fn room_update_switches_to_room_screen() {
        let mut state = ViewState::default();
        apply_ui_update(&mut state, UiUpdate::Room(Box::new(room_snapshot())));
        assert!(matches!(state.screen, UiScreen::Room(_)));
    }

    #[test]
    fn room_update_preserves_selection() {
        let mut state = ViewState::default();
        apply_ui_update(&mut state, UiUpdate::Room(Box::new(room_snapshot())));
        if let UiScreen::Room(room) = &mut state.screen {
            room.selected_card = 1;
        }
        apply_ui_update(&mut state, UiUpdate::Room(Box::new(room_snapshot())));
        let UiScreen::Room(room) = &state.screen else {
            panic!("expected room screen");
        };
        assert_eq!(room.selected_card, 1);
    }

    #[test]
    fn left_room_returns_to_lobby_with_notice_banner() {
        let mut state = ViewState::default();
        apply_ui_update(&mut state, UiUpdate::Room(Box::new(room_snapshot())));
        apply_ui_update(
            &mut state,
            UiUpdate::LeftRoom {
                notice: Some("You have been removed from this room.".into()),
            },
        );
        assert!(matches!(state.screen, UiScreen::Lobby(_)));
        assert!(state.banner.as_deref().unwrap().contains("removed"));
    }

    #[test]
    fn voluntary_leave_sets_no_banner() {
        let mut state = ViewState::default();
        apply_ui_update(&mut state, UiUpdate::Room(Box::new(room_snapshot())));
        apply_ui_update(&mut state, UiUpdate::LeftRoom { notice: None });
        assert!(matches!(state.screen, UiScreen::Lobby(_)));
        assert!(state.banner.is_none());
    }

    #[test]
    fn error_update_sets_banner() {
        let mut state = ViewState::default();
        apply_ui_update(&mut state, UiUpdate::Error("boom".into()));
        assert_eq!(state.banner.as_deref(), Some("boom"));
    }

    #[test]
    fn stale_suggestions_are_dropped() {
        let mut state = ViewState::default();
        apply_ui_update(&mut state, UiUpdate::Room(Box::new(room_snapshot())));
        if let UiScreen::Room(room) = &mut state.screen {
            room.topic_prompt = Some(TopicPrompt {
                text: "SHOP".into(),
                suggestions: vec![],
            });
        }
        apply_ui_update(
            &mut state,
            UiUpdate::IssueSuggestions {
                query: "SH".into(),
                suggestions: vec!["SHOP-1".into()],
            },
        );
        let UiScreen::Room(room) = &state.screen else {
            panic!("expected room screen");
        };
        assert!(room.topic_prompt.as_ref().unwrap().suggestions.is_empty());

        apply_ui_update(
            &mut state,
            UiUpdate::IssueSuggestions {
                query: "SHOP".into(),
                suggestions: vec!["SHOP-1".into()],
            },
        );
        let UiScreen::Room(room) = &state.screen else {
            panic!("expected room screen");
        };
        assert_eq!(
            room.topic_prompt.as_ref().unwrap().suggestions,
            vec!["SHOP-1".to_string()]
        );
    }
}
