// Keyboard input handling and command dispatch.
//
// Translates crossterm key events into UserCommand messages for the
// orchestrator, or into local ViewState mutations (selection, prompts,
// banner dismissal).

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::extensions::issuetracker;
use crate::model::Role;
use crate::protocol::UserCommand;
use crate::room::actions::validate_room_name;

use super::{CreatePrompt, LobbyView, RoomScreen, TopicPrompt, UiScreen, ViewState};

pub const LOBBY_HELP: &str =
    " Enter:Join | n:New room | d:Delete | Up/Down:Select | q:Quit";
pub const ROOM_HELP: &str =
    " Enter:Vote | c:New round | t:Topic | o:Role | x:Kick | i:Issue ext | Esc:Leave | q:Quit";

/// Handle a keyboard event.
///
/// Returns `Some(UserCommand)` when the key press should be forwarded to
/// the orchestrator; `None` when it was handled locally by mutating
/// `ViewState`.
pub fn handle_key(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    // Windows emits Press and Release for each physical keypress; only act
    // on Press.
    if key_event.kind != KeyEventKind::Press {
        return None;
    }

    // Ctrl+C always quits immediately (escape hatch).
    if key_event.modifiers.contains(KeyModifiers::CONTROL)
        && key_event.code == KeyCode::Char('c')
    {
        return Some(UserCommand::Quit);
    }

    // Esc dismisses an active banner before anything else.
    if view_state.banner.is_some() && key_event.code == KeyCode::Esc {
        view_state.banner = None;
        return None;
    }

    match &mut view_state.screen {
        UiScreen::Lobby(lobby) => handle_lobby_key(key_event, lobby),
        UiScreen::Room(room) => handle_room_key(key_event, room),
    }
}

// ---------------------------------------------------------------------------
// Lobby
// ---------------------------------------------------------------------------

fn handle_lobby_key(key_event: KeyEvent, lobby: &mut LobbyView) -> Option<UserCommand> {
    if lobby.create_prompt.is_some() {
        return handle_create_prompt_key(key_event, lobby);
    }

    let room_count = lobby.snapshot.rooms.len();
    match key_event.code {
        KeyCode::Up | KeyCode::Char('k') => {
            lobby.selected = lobby.selected.saturating_sub(1);
            None
        }
        KeyCode::Down | KeyCode::Char('j') => {
            if room_count > 0 {
                lobby.selected = (lobby.selected + 1).min(room_count - 1);
            }
            None
        }
        KeyCode::Enter => lobby
            .snapshot
            .rooms
            .get(lobby.selected)
            .map(|room| UserCommand::EnterRoom(room.name.clone())),
        KeyCode::Char('n') => {
            lobby.create_prompt = Some(CreatePrompt::default());
            None
        }
        KeyCode::Char('d') => lobby
            .snapshot
            .rooms
            .get(lobby.selected)
            .map(|room| UserCommand::DeleteRoom(room.name.clone())),
        KeyCode::Char('q') => Some(UserCommand::Quit),
        _ => None,
    }
}

/// Create-room prompt: live-validated name entry plus card set selection.
/// Enter submits only while the field is valid, so an invalid or duplicate
/// name never produces a command (and therefore never a request).
fn handle_create_prompt_key(key_event: KeyEvent, lobby: &mut LobbyView) -> Option<UserCommand> {
    let prompt = lobby.create_prompt.as_mut()?;
    match key_event.code {
        KeyCode::Esc => {
            lobby.create_prompt = None;
            None
        }
        KeyCode::Enter => {
            if prompt.error.is_some() || prompt.name.is_empty() {
                return None;
            }
            let card_set_name = lobby
                .snapshot
                .card_set_names
                .get(prompt.card_set_idx)
                .cloned()?;
            let name = prompt.name.clone();
            lobby.create_prompt = None;
            Some(UserCommand::CreateRoom {
                name,
                card_set_name,
            })
        }
        KeyCode::Tab => {
            let count = lobby.snapshot.card_set_names.len();
            if count > 0 {
                prompt.card_set_idx = (prompt.card_set_idx + 1) % count;
            }
            None
        }
        KeyCode::Backspace => {
            prompt.name.pop();
            prompt.error = validate_room_name(&prompt.name, &lobby.snapshot.rooms).err();
            None
        }
        KeyCode::Char(c) => {
            prompt.name.push(c);
            prompt.error = validate_room_name(&prompt.name, &lobby.snapshot.rooms).err();
            None
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Room view
// ---------------------------------------------------------------------------

fn handle_room_key(key_event: KeyEvent, room: &mut RoomScreen) -> Option<UserCommand> {
    if room.topic_prompt.is_some() {
        return handle_topic_prompt_key(key_event, room);
    }

    let card_count = room.snapshot.deck.cards.len();
    let member_count = room.snapshot.view.room.members.len();

    match key_event.code {
        // Card hand navigation
        KeyCode::Left | KeyCode::Char('h') => {
            room.selected_card = room.selected_card.saturating_sub(1);
            None
        }
        KeyCode::Right | KeyCode::Char('l') => {
            if card_count > 0 {
                room.selected_card = (room.selected_card + 1).min(card_count - 1);
            }
            None
        }

        // Cast the selected card. Only voters vote, and only while open.
        KeyCode::Enter | KeyCode::Char(' ') => {
            if room.snapshot.view.room.voting_closed || !local_member_is_voter(room) {
                return None;
            }
            room.snapshot
                .deck
                .cards
                .get(room.selected_card)
                .map(|card| UserCommand::CastVote(card.name.clone()))
        }

        // Reopen the round.
        KeyCode::Char('c') => Some(UserCommand::ClearVotes),

        // Roster navigation
        KeyCode::Up | KeyCode::Char('k') => {
            room.selected_member = room.selected_member.saturating_sub(1);
            None
        }
        KeyCode::Down | KeyCode::Char('j') => {
            if member_count > 0 {
                room.selected_member = (room.selected_member + 1).min(member_count - 1);
            }
            None
        }

        // Toggle the selected member's role.
        KeyCode::Char('o') => {
            let member = room.snapshot.view.room.members.get(room.selected_member)?;
            let role = match member.role {
                Role::Voter => Role::Observer,
                Role::Observer => Role::Voter,
            };
            Some(UserCommand::SetMemberRole {
                username: member.username.clone(),
                role,
            })
        }

        // Kick the selected member.
        KeyCode::Char('x') => room
            .snapshot
            .view
            .room
            .members
            .get(room.selected_member)
            .map(|member| UserCommand::KickMember(member.username.clone())),

        // Topic editor (with issue suggestions while typing).
        KeyCode::Char('t') => {
            room.topic_prompt = Some(TopicPrompt {
                text: room.snapshot.view.room.topic.clone().unwrap_or_default(),
                suggestions: Vec::new(),
            });
            None
        }

        KeyCode::Char('i') => Some(UserCommand::ToggleExtension(
            issuetracker::KEY.to_string(),
        )),

        KeyCode::Esc | KeyCode::Char('b') => Some(UserCommand::LeaveRoom),
        KeyCode::Char('q') => Some(UserCommand::Quit),
        _ => None,
    }
}

fn handle_topic_prompt_key(key_event: KeyEvent, room: &mut RoomScreen) -> Option<UserCommand> {
    let prompt = room.topic_prompt.as_mut()?;
    match key_event.code {
        KeyCode::Esc => {
            room.topic_prompt = None;
            None
        }
        KeyCode::Enter => {
            let text = prompt.text.clone();
            room.topic_prompt = None;
            Some(UserCommand::SetTopic(text))
        }
        // Accept the first suggestion.
        KeyCode::Tab => {
            if let Some(first) = prompt.suggestions.first().cloned() {
                prompt.text = first;
            }
            None
        }
        KeyCode::Backspace => {
            prompt.text.pop();
            Some(UserCommand::IssueQueryChanged(prompt.text.clone()))
        }
        KeyCode::Char(c) => {
            prompt.text.push(c);
            Some(UserCommand::IssueQueryChanged(prompt.text.clone()))
        }
        _ => None,
    }
}

fn local_member_is_voter(room: &RoomScreen) -> bool {
    room.snapshot
        .view
        .room
        .member(&room.snapshot.username)
        .is_some_and(|m| m.role == Role::Voter)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
