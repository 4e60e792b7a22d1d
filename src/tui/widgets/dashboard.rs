use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame,
};

use super::level_bar;
use crate::admission::LIMIT_REACHED;
use crate::srs;
use crate::truncate;
use crate::tui::App;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(9), // Stats + due items row
            Constraint::Min(0),    // Daily budgets
        ])
        .split(area);

    let top_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[0]);

    draw_stats(f, app, top_chunks[0]);
    draw_due_items(f, app, top_chunks[1]);
    draw_budgets(f, app, chunks[1]);
}

fn stat_line(label: &str, value: String, color: Color) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{}: ", label), Style::default().fg(Color::Gray)),
        Span::styled(value, Style::default().fg(color)),
    ])
}

fn draw_stats(f: &mut Frame, app: &App, area: Rect) {
    let stats = &app.stats;

    let text = vec![
        Line::from(vec![
            Span::styled("Items: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{}", stats.total_items),
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ),
        ]),
        stat_line("In review", format!("{}", stats.in_review), Color::White),
        stat_line("Reviews", format!("{}", stats.total_reviews), Color::White),
        stat_line("Mastered", format!("{}", stats.mastered), Color::Green),
        stat_line(
            "Due",
            format!("{}", stats.due_now),
            if stats.due_now > 0 {
                Color::Yellow
            } else {
                Color::White
            },
        ),
        stat_line(
            "Avg level",
            format!("{:.1}", stats.avg_level),
            Color::Cyan,
        ),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Stats ")
        .title_style(Style::default().fg(Color::Cyan));

    f.render_widget(Paragraph::new(text).block(block), area);
}

fn draw_due_items(f: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .due_items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let level = item.srs.as_ref().map(|r| r.level).unwrap_or(0);
            let style = if level <= 1 {
                Style::default().fg(Color::Red)
            } else {
                Style::default().fg(Color::Yellow)
            };

            ListItem::new(Line::from(vec![
                Span::styled(format!("{}. ", i + 1), Style::default().fg(Color::DarkGray)),
                Span::styled(truncate(&item.item.term, 14), style),
                Span::raw(" "),
                Span::styled(level_bar(level), Style::default().fg(Color::Green)),
            ]))
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Due Items ")
        .title_style(Style::default().fg(Color::Yellow));

    if items.is_empty() {
        let text = Paragraph::new("Nothing due").block(block);
        f.render_widget(text, area);
    } else {
        f.render_widget(List::new(items).block(block), area);
    }
}

fn draw_budgets(f: &mut Frame, app: &App, area: Rect) {
    let reset = srs::countdown(app.next_reset(), app.now);

    let mut lines: Vec<Line> = app
        .stats
        .budgets
        .iter()
        .map(|b| {
            let (text, color) = if b.learn_new_left <= 0 {
                (
                    format!("0/{}  {}", b.limit, LIMIT_REACHED),
                    Color::Red,
                )
            } else {
                (format!("{}/{}", b.learn_new_left, b.limit), Color::Green)
            };
            Line::from(vec![
                Span::styled(format!("{:<12}", b.pool), Style::default().fg(Color::Gray)),
                Span::styled(text, Style::default().fg(color)),
            ])
        })
        .collect();

    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled("Resets in: ", Style::default().fg(Color::Gray)),
        Span::styled(reset, Style::default().fg(Color::White)),
    ]));

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" New Items Today ")
        .title_style(Style::default().fg(Color::Magenta));

    f.render_widget(Paragraph::new(lines).block(block), area);
}
