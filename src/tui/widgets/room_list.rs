// Lobby room list and the create-room prompt.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph};
use ratatui::Frame;

use crate::model::Room;
use crate::tui::LobbyView;

/// Render the room list with the current selection highlighted.
pub fn render(frame: &mut Frame, area: Rect, lobby: &LobbyView) {
    let block = Block::default().borders(Borders::ALL).title("Rooms");

    if lobby.snapshot.rooms.is_empty() {
        let paragraph = Paragraph::new("  No rooms yet. Press 'n' to create one.")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    let items: Vec<ListItem> = lobby
        .snapshot
        .rooms
        .iter()
        .enumerate()
        .map(|(idx, room)| {
            let style = if idx == lobby.selected {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            ListItem::new(Line::from(Span::styled(format_room_row(room), style)))
        })
        .collect();

    frame.render_widget(List::new(items).block(block), area);
}

/// One row of the room list.
pub(crate) fn format_room_row(room: &Room) -> String {
    let state = if room.voting_closed { "revealed" } else { "open" };
    format!(
        " {} | {} members | {} | {}",
        room.name,
        room.members.len(),
        state,
        room.card_set_name
    )
}

/// Render the create-room prompt, or the hint line when it is closed.
pub fn render_prompt(frame: &mut Frame, area: Rect, lobby: &LobbyView) {
    let block = Block::default().borders(Borders::ALL).title("New room");

    let Some(prompt) = &lobby.create_prompt else {
        let paragraph = Paragraph::new(" n: create a room")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(paragraph, area);
        return;
    };

    let card_set = lobby
        .snapshot
        .card_set_names
        .get(prompt.card_set_idx)
        .map(String::as_str)
        .unwrap_or("-");

    let mut spans = vec![
        Span::raw(format!(" Name: {}", prompt.name)),
        Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK)),
        Span::raw(format!("  [deck: {card_set}, Tab to cycle]")),
    ];
    if let Some(error) = &prompt.error {
        spans.push(Span::styled(
            format!("  {error}"),
            Style::default().fg(Color::Red),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::LobbySnapshot;
    use crate::tui::CreatePrompt;
    use std::collections::BTreeSet;

    fn room(name: &str, voting_closed: bool) -> Room {
        Room {
            name: name.to_string(),
            topic: None,
            card_set_name: "Fibonacci".into(),
            members: vec![],
            voting_closed,
            extensions: BTreeSet::new(),
        }
    }

    #[test]
    fn room_row_format() {
        assert_eq!(
            format_room_row(&room("sprint-42", false)),
            " sprint-42 | 0 members | open | Fibonacci"
        );
        assert_eq!(
            format_room_row(&room("done", true)),
            " done | 0 members | revealed | Fibonacci"
        );
    }

    #[test]
    fn render_does_not_panic_empty_and_filled() {
        let backend = ratatui::backend::TestBackend::new(60, 12);
        let mut terminal = ratatui::Terminal::new(backend).unwrap();

        let mut lobby = LobbyView::default();
        terminal
            .draw(|frame| {
                render(frame, frame.area(), &lobby);
                render_prompt(frame, frame.area(), &lobby);
            })
            .unwrap();

        lobby.snapshot = LobbySnapshot {
            rooms: vec![room("alpha", false), room("beta", true)],
            card_set_names: vec!["Fibonacci".into()],
        };
        lobby.selected = 1;
        lobby.create_prompt = Some(CreatePrompt {
            name: "alpha".into(),
            card_set_idx: 0,
            error: crate::room::actions::validate_room_name("alpha", &lobby.snapshot.rooms).err(),
        });
        terminal
            .draw(|frame| {
                render(frame, frame.area(), &lobby);
                render_prompt(frame, frame.area(), &lobby);
            })
            .unwrap();
    }
}
