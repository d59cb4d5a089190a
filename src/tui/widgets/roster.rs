// Roster widget: room members with role, vote status, and selection.
//
// While voting is open only the own vote is known; other members show a dot
// until the round is revealed. "alice (you) [VOTER] 5" / "bob [OBSERVER] -"

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem};
use ratatui::Frame;

use crate::model::{Role, RoomMember};
use crate::tui::RoomScreen;

/// Render the member roster sidebar.
pub fn render(frame: &mut Frame, area: Rect, room: &RoomScreen) {
    let snapshot = &room.snapshot;
    let voting_closed = snapshot.view.room.voting_closed;

    let items: Vec<ListItem> = snapshot
        .view
        .room
        .members
        .iter()
        .enumerate()
        .map(|(idx, member)| {
            let is_you = member.username == snapshot.username;
            let text = format_member_row(member, is_you, voting_closed);
            let mut style = match member.role {
                Role::Voter => Style::default().fg(Color::White),
                Role::Observer => Style::default().fg(Color::DarkGray),
            };
            if idx == room.selected_member {
                style = style.add_modifier(Modifier::BOLD).bg(Color::Blue);
            }
            ListItem::new(Line::from(Span::styled(text, style)))
        })
        .collect();

    let title = format!("Members ({})", snapshot.view.room.members.len());
    let list = List::new(items).block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(list, area);
}

/// Format a single roster row.
///
/// Vote column: the card name once known (own vote while open, everyone
/// once revealed), a check for hidden-but-cast votes, a dash otherwise.
pub(crate) fn format_member_row(member: &RoomMember, is_you: bool, voting_closed: bool) -> String {
    let you = if is_you { " (you)" } else { "" };
    let role = match member.role {
        Role::Voter => "VOTER",
        Role::Observer => "OBSERVER",
    };
    let vote = match (&member.vote, voting_closed) {
        (Some(card), true) => card.name.clone(),
        (Some(_), false) => "voted".to_string(),
        (None, _) => "-".to_string(),
    };
    format!(" {}{} [{}] {}", member.username, you, role, vote)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
