use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
};
use unicode_truncate::UnicodeTruncateStr;

use super::app::SelectorApp;

/// Rows of list content that fit in a frame of `height`
pub fn page_size(height: u16) -> usize {
    // margins, title, filter box, list borders, help
    usize::from(height.saturating_sub(9)).max(1)
}

pub fn draw(frame: &mut Frame, app: &SelectorApp) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(1), // Title
            Constraint::Length(3), // Filter
            Constraint::Min(0),    // List
            Constraint::Length(1), // Help
        ])
        .split(frame.area());

    let title = Paragraph::new(app.prompt.as_str()).style(
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    );
    frame.render_widget(title, chunks[0]);

    let filter = Paragraph::new(Line::from(vec![
        Span::raw(app.filter.as_str()),
        Span::styled("_", Style::default().fg(Color::DarkGray)),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" Filter ({} matches) ", app.match_count())),
    );
    frame.render_widget(filter, chunks[1]);

    let list_area = chunks[2];
    let width = usize::from(list_area.width.saturating_sub(4));
    let page = usize::from(list_area.height.saturating_sub(2)).max(1);

    let items: Vec<ListItem> = app
        .visible()
        .enumerate()
        .skip(app.scroll_offset)
        .take(page)
        .map(|(i, option)| {
            let (label, _) = option.label.unicode_truncate(width);
            if i == app.selected {
                ListItem::new(format!("▶ {}", label)).style(
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                )
            } else if option.is_quit() {
                ListItem::new(format!("  {}", label)).style(Style::default().fg(Color::DarkGray))
            } else {
                ListItem::new(format!("  {}", label))
            }
        })
        .collect();

    let list = if app.match_count() == 0 && !app.filter.is_empty() {
        List::new(items).block(Block::default().borders(Borders::ALL).title(" No matches "))
    } else {
        List::new(items).block(Block::default().borders(Borders::ALL))
    };
    frame.render_widget(list, list_area);

    let help = Paragraph::new("type to filter • ↑/↓ move • Enter select • Esc quit")
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, chunks[3]);
}
