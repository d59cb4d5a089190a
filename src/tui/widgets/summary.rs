// Result panel: the revealed vote summary, the waiting state while voting
// is open, the topic editor when it is active, and the extension slots.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::model::{format_average, Agreement, VoteExtreme};
use crate::tui::RoomScreen;

/// Placeholder for absent numeric results.
const EMPTY_RESULT: &str = "-/-";

/// Render the summary panel (or the topic editor while it is open).
pub fn render(frame: &mut Frame, area: Rect, room: &RoomScreen) {
    if room.topic_prompt.is_some() {
        render_topic_prompt(frame, area, room);
        return;
    }

    let block = Block::default().borders(Borders::ALL).title("Result");
    let lines: Vec<Line> = summary_lines(room)
        .into_iter()
        .map(|l| Line::from(Span::raw(l)))
        .collect();
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// The summary panel content as plain lines.
pub(crate) fn summary_lines(room: &RoomScreen) -> Vec<String> {
    let view = &room.snapshot.view;

    if !view.room.voting_closed {
        let cast = view
            .room
            .members
            .iter()
            .filter(|m| m.vote.is_some())
            .count();
        let mut lines = vec![" Voting in progress...".to_string()];
        if view.active_vote.is_some() || cast > 0 {
            lines.push(format!(" {cast} vote(s) cast so far"));
        }
        return lines;
    }

    let Some(votes) = view.summary.as_ref().and_then(|s| s.votes.as_ref()) else {
        // Voting closed with zero votes cast.
        return vec![" No result".to_string()];
    };

    let digits = room.snapshot.deck.relevant_fraction_digits;
    let average = votes
        .average
        .map(|avg| format_average(avg, digits))
        .unwrap_or_else(|| EMPTY_RESULT.to_string());
    let nearest = votes
        .nearest_card
        .as_ref()
        .map(|c| c.name.clone())
        .unwrap_or_else(|| EMPTY_RESULT.to_string());
    let agreement = match votes.agreement() {
        Agreement::High => "high",
        Agreement::Moderate => "moderate",
        Agreement::Low => "low",
    };

    vec![
        format!(" Average: {average}"),
        format!(" Nearest card: {nearest}"),
        format!(" Highest: {}", format_extreme(votes.highest.as_ref())),
        format!(" Lowest: {}", format_extreme(votes.lowest.as_ref())),
        format!(" Agreement: {agreement}"),
    ]
}

fn format_extreme(extreme: Option<&VoteExtreme>) -> String {
    match extreme {
        None => EMPTY_RESULT.to_string(),
        Some(extreme) => {
            let who: Vec<&str> = extreme
                .members
                .iter()
                .map(|m| m.username.as_str())
                .collect();
            format!("{} ({})", extreme.card.name, who.join(", "))
        }
    }
}

/// Topic editor with issue-key suggestions.
fn render_topic_prompt(frame: &mut Frame, area: Rect, room: &RoomScreen) {
    let Some(prompt) = &room.topic_prompt else {
        return;
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Topic (Enter to save, Tab to take suggestion, Esc to cancel)");

    let mut lines = vec![Line::from(vec![
        Span::raw(format!(" {}", prompt.text)),
        Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK)),
    ])];
    for suggestion in &prompt.suggestions {
        lines.push(Line::from(Span::styled(
            format!("   {suggestion}"),
            Style::default().fg(Color::Cyan),
        )));
    }
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// Render the active extension slots.
pub fn render_extensions(frame: &mut Frame, area: Rect, room: &RoomScreen) {
    let block = Block::default().borders(Borders::ALL).title("Extensions");

    if room.snapshot.panels.is_empty() {
        let paragraph = Paragraph::new(" none active")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    let mut text = Text::default();
    for panel in &room.snapshot.panels {
        let mut line = Line::from(Span::styled(
            format!(" {}: ", panel.label),
            Style::default().add_modifier(Modifier::BOLD),
        ));
        for body_line in &panel.body.lines {
            for span in &body_line.spans {
                line.push_span(span.clone());
            }
        }
        text.push_line(line);
    }
    frame.render_widget(Paragraph::new(text).block(block), area);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
