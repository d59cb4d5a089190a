// Screen layout: panel arrangement and sizing.
//
// Room view:
// +--------------------------------------------------+
// | Status Bar (1 row)                                |
// +-------------------------+------------------------+
// | Deck (5 rows)            | Roster (fill)          |
// +-------------------------+                        |
// | Summary (fill)           |                        |
// +-------------------------+------------------------+
// | Extensions (4 rows)                               |
// +--------------------------------------------------+
// | Banner (1 row) | Help Bar (1 row)                 |
// +--------------------------------------------------+
//
// The lobby stacks the room list over the create-room prompt.

use ratatui::layout::{Constraint, Direction, Layout, Rect};

/// Resolved screen areas for the room view.
#[derive(Debug, Clone)]
pub struct RoomLayout {
    pub status_bar: Rect,
    /// Card hand for the local member.
    pub deck: Rect,
    /// Revealed summary (or waiting placeholder).
    pub summary: Rect,
    /// Member roster sidebar.
    pub roster: Rect,
    /// Active extension panels.
    pub extensions: Rect,
    pub banner: Rect,
    pub help_bar: Rect,
}

/// Resolved screen areas for the lobby.
#[derive(Debug, Clone)]
pub struct LobbyLayout {
    pub status_bar: Rect,
    pub list: Rect,
    /// Create-room prompt (or hint line when closed).
    pub prompt: Rect,
    pub banner: Rect,
    pub help_bar: Rect,
}

/// Build the room view layout from the available terminal area.
pub fn room_layout(area: Rect) -> RoomLayout {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),  // status bar
            Constraint::Min(8),     // middle section
            Constraint::Length(4),  // extensions
            Constraint::Length(1),  // banner
            Constraint::Length(1),  // help bar
        ])
        .split(area);

    let middle = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(vertical[1]);

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(5), Constraint::Min(3)])
        .split(middle[0]);

    RoomLayout {
        status_bar: vertical[0],
        deck: left[0],
        summary: left[1],
        roster: middle[1],
        extensions: vertical[2],
        banner: vertical[3],
        help_bar: vertical[4],
    }
}

/// Build the lobby layout from the available terminal area.
pub fn lobby_layout(area: Rect) -> LobbyLayout {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),  // status bar
            Constraint::Min(5),     // room list
            Constraint::Length(3),  // create prompt
            Constraint::Length(1),  // banner
            Constraint::Length(1),  // help bar
        ])
        .split(area);

    LobbyLayout {
        status_bar: vertical[0],
        list: vertical[1],
        prompt: vertical[2],
        banner: vertical[3],
        help_bar: vertical[4],
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
