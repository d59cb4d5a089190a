// Card hand: the room's deck with selection and the active vote highlighted.
//
// "[ 1 ] [ 2 ]>[ 3 ]<[ 5 ] [ 8 ]" -- the active vote is marked, the
// selection is bold. Dimmed entirely while voting is closed or the local
// member observes.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::model::Role;
use crate::tui::RoomScreen;

/// Render the card hand for the local member.
pub fn render(frame: &mut Frame, area: Rect, room: &RoomScreen) {
    let snapshot = &room.snapshot;
    let voting_open = !snapshot.view.room.voting_closed;
    let is_voter = snapshot
        .view
        .room
        .member(&snapshot.username)
        .is_some_and(|m| m.role == Role::Voter);

    let title = format!("Your hand ({})", snapshot.deck.name);
    let block = Block::default().borders(Borders::ALL).title(title);

    if !is_voter {
        let paragraph = Paragraph::new("  Observing -- no cards to cast.")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    let active_name = snapshot.view.active_vote.as_ref().map(|c| c.name.as_str());
    let spans: Vec<Span> = snapshot
        .deck
        .cards
        .iter()
        .enumerate()
        .map(|(idx, card)| {
            let selected = idx == room.selected_card;
            let active = active_name == Some(card.name.as_str());
            let mut style = match (active, voting_open) {
                (true, _) => Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
                (false, true) => Style::default().fg(Color::White),
                (false, false) => Style::default().fg(Color::DarkGray),
            };
            if selected {
                style = style.add_modifier(Modifier::BOLD).bg(Color::Blue);
            }
            Span::styled(format_card_label(&card.name, active), style)
        })
        .collect();

    let mut lines = vec![Line::from(spans)];
    if let Some(description) = snapshot
        .deck
        .cards
        .get(room.selected_card)
        .and_then(|c| c.description.clone())
    {
        lines.push(Line::from(Span::styled(
            format!(" {description}"),
            Style::default().fg(Color::DarkGray),
        )));
    }

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// A single card label; the active vote gets angle markers.
pub(crate) fn format_card_label(name: &str, active: bool) -> String {
    if active {
        format!(">[ {name} ]< ")
    } else {
        format!(" [ {name} ]  ")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
