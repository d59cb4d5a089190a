// Status, banner, and help bars shared by both screens.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::tui::{LobbyView, RoomScreen};

/// Lobby status line: room count.
pub fn render_lobby(frame: &mut Frame, area: Rect, lobby: &LobbyView) {
    let text = format!(" pointdeck | {} rooms", lobby.snapshot.rooms.len());
    render_bar(frame, area, text);
}

/// Room status line: room name, topic, round state.
pub fn render_room(frame: &mut Frame, area: Rect, room: &RoomScreen) {
    render_bar(frame, area, room_status_text(room));
}

pub(crate) fn room_status_text(room: &RoomScreen) -> String {
    let snapshot = &room.snapshot;
    let state = if snapshot.view.room.voting_closed {
        "revealed"
    } else {
        "voting"
    };
    let topic = snapshot
        .view
        .room
        .topic
        .as_deref()
        .unwrap_or("(no topic)");
    format!(
        " {} | {} | {} | {} members",
        snapshot.view.room.name,
        topic,
        state,
        snapshot.view.room.members.len()
    )
}

fn render_bar(frame: &mut Frame, area: Rect, text: String) {
    let paragraph = Paragraph::new(Line::from(Span::styled(
        text,
        Style::default().fg(Color::White),
    )))
    .style(Style::default().bg(Color::DarkGray));
    frame.render_widget(paragraph, area);
}

/// Dismissible banner line. Empty when no error or notice is active.
pub fn render_banner(frame: &mut Frame, area: Rect, banner: Option<&str>) {
    let Some(message) = banner else {
        return;
    };
    let paragraph = Paragraph::new(Line::from(vec![
        Span::styled(
            format!(" {message}"),
            Style::default()
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(" (Esc to dismiss)", Style::default().fg(Color::Black)),
    ]))
    .style(Style::default().bg(Color::Yellow));
    frame.render_widget(paragraph, area);
}

/// Keyboard shortcut hints.
pub fn render_help(frame: &mut Frame, area: Rect, text: &str) {
    let paragraph = Paragraph::new(Line::from(Span::styled(
        text.to_string(),
        Style::default().fg(Color::White).add_modifier(Modifier::DIM),
    )))
    .style(Style::default().bg(Color::DarkGray));
    frame.render_widget(paragraph, area);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
