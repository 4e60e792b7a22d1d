use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use super::level_bar;
use crate::models::{ItemWithSrs, StudyPanel};
use crate::srs;
use crate::truncate;
use crate::tui::{App, SelectedSet};

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let Some(selected) = &app.selected else {
        let block = Block::default().borders(Borders::ALL).title(" Set Detail ");
        let paragraph = Paragraph::new("No set selected").block(block);
        f.render_widget(paragraph, area);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // Header info
            Constraint::Length(6), // Study panel
            Constraint::Min(0),    // Items
        ])
        .split(area);

    draw_header(f, selected, chunks[0]);
    draw_panel(f, &selected.panel, chunks[1]);
    draw_items(f, app, selected, chunks[2]);
}

fn draw_header(f: &mut Frame, selected: &SelectedSet, area: Rect) {
    let overview = &selected.overview;
    let set = &overview.set;

    let text = vec![
        Line::from(vec![
            Span::styled("Pool: ", Style::default().fg(Color::Gray)),
            Span::styled(set.pool.as_str(), Style::default().fg(Color::Cyan)),
            Span::raw("  "),
            Span::styled("Owner: ", Style::default().fg(Color::Gray)),
            Span::styled(set.owner.as_str(), Style::default().fg(Color::White)),
            Span::raw("  "),
            Span::styled("SRS: ", Style::default().fg(Color::Gray)),
            if set.srs_enabled {
                Span::styled("on", Style::default().fg(Color::Green))
            } else {
                Span::styled("off", Style::default().fg(Color::Red))
            },
        ]),
        Line::from(vec![
            Span::styled("Items: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{}", overview.total_items),
                Style::default().fg(Color::White),
            ),
            Span::raw("  "),
            Span::styled("In review: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{}", overview.in_review),
                Style::default().fg(Color::White),
            ),
            Span::raw("  "),
            Span::styled("Not started: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{}", overview.learnable),
                Style::default().fg(Color::Magenta),
            ),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} ", set.name))
        .title_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    f.render_widget(Paragraph::new(text).block(block), area);
}

fn draw_panel(f: &mut Frame, panel: &StudyPanel, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Study ")
        .title_style(Style::default().fg(Color::Cyan));

    if let Some(error) = &panel.error {
        let text = Paragraph::new(Span::styled(
            error.as_str(),
            Style::default().fg(Color::Red),
        ))
        .block(block);
        f.render_widget(text, area);
        return;
    }

    let learn_new = &panel.learn_new;
    let learn_line = if learn_new.enabled {
        Line::from(vec![
            Span::styled("Learn new: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{}", learn_new.count),
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled("  (press n)", Style::default().fg(Color::DarkGray)),
        ])
    } else {
        Line::from(vec![
            Span::styled("Learn new: ", Style::default().fg(Color::Gray)),
            Span::styled("0  ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                learn_new.notice.as_deref().unwrap_or(""),
                Style::default().fg(Color::Red),
            ),
        ])
    };

    let text = vec![
        Line::from(vec![
            Span::styled("Due for review: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{}", panel.due_count),
                Style::default().fg(if panel.due_count > 0 {
                    Color::Yellow
                } else {
                    Color::White
                }),
            ),
        ]),
        learn_line,
        Line::from(vec![
            Span::styled("Next review: ", Style::default().fg(Color::Gray)),
            Span::styled(
                panel.next_due.as_deref().unwrap_or("-"),
                Style::default().fg(Color::White),
            ),
        ]),
    ];

    let paragraph = Paragraph::new(text).block(block).wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}

fn item_row<'a>(entry: &'a ItemWithSrs, app: &App) -> ListItem<'a> {
    let item = &entry.item;
    let reading = item
        .reading
        .as_deref()
        .map(|r| format!("【{}】", r))
        .unwrap_or_default();

    let schedule = match &entry.srs {
        Some(record) => {
            let next = match record.due_at() {
                Some(due) if due <= app.now => Span::styled("Due now", Style::default().fg(Color::Red)),
                Some(due) => Span::styled(
                    srs::countdown(due, app.now),
                    Style::default().fg(Color::White),
                ),
                None => Span::styled("-", Style::default().fg(Color::DarkGray)),
            };
            vec![
                Span::styled(level_bar(record.level), Style::default().fg(Color::Green)),
                Span::styled(
                    format!(" {:<12}", record.level_label()),
                    Style::default().fg(Color::Cyan),
                ),
                next,
            ]
        }
        None => vec![Span::styled("new", Style::default().fg(Color::Magenta))],
    };

    let mut spans = vec![
        Span::styled(
            format!("{:<12}", truncate(&item.term, 10)),
            Style::default().fg(Color::White),
        ),
        Span::styled(
            format!("{:<24}", truncate(&format!("{}{}", reading, item.meaning), 22)),
            Style::default().fg(Color::Gray),
        ),
    ];
    spans.extend(schedule);

    ListItem::new(Line::from(spans))
}

fn draw_items(f: &mut Frame, app: &App, selected: &SelectedSet, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" Items ({}) ", selected.items.items.len()))
        .title_style(Style::default().fg(Color::Magenta));

    if selected.items.items.is_empty() {
        let text = Paragraph::new("No items in this set").block(block);
        f.render_widget(text, area);
        return;
    }

    let items: Vec<ListItem> = selected
        .items
        .items
        .iter()
        .map(|entry| item_row(entry, app))
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(selected.items.selected);

    f.render_stateful_widget(list, area, &mut state);
}
