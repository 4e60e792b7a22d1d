use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};

use crate::models::SetOverview;
use crate::srs;
use crate::truncate;
use crate::tui::App;

fn header_span(text: String) -> Span<'static> {
    Span::styled(
        text,
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
}

fn row<'a>(overview: &'a SetOverview, app: &App) -> ListItem<'a> {
    let set = &overview.set;

    let (srs_text, srs_color) = if set.srs_enabled {
        ("on ", Color::Green)
    } else {
        ("off", Color::DarkGray)
    };

    let due_color = if overview.due_count > 0 {
        Color::Yellow
    } else {
        Color::White
    };

    let next = match overview.next_due {
        Some(due) if set.srs_enabled => srs::countdown(due, app.now),
        _ => "-".to_string(),
    };

    ListItem::new(Line::from(vec![
        Span::styled(
            format!("{:<24}", truncate(&set.name, 22)),
            Style::default().fg(Color::White),
        ),
        Span::styled(format!("{:<12}", set.pool), Style::default().fg(Color::Cyan)),
        Span::styled(format!("{:<5}", srs_text), Style::default().fg(srs_color)),
        Span::styled(
            format!("{:<7}", overview.total_items),
            Style::default().fg(Color::White),
        ),
        Span::styled(
            format!("{:<6}", overview.due_count),
            Style::default().fg(due_color),
        ),
        Span::styled(
            format!("{:<6}", overview.learnable),
            Style::default().fg(Color::Magenta),
        ),
        Span::styled(next, Style::default().fg(Color::White)),
    ]))
}

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" Sets ({}) ", app.sets.items.len()))
        .title_style(Style::default().fg(Color::Cyan));

    if app.sets.items.is_empty() {
        let text = Paragraph::new("No study sets yet. Add one with `kioku set add`").block(block);
        f.render_widget(text, area);
        return;
    }

    let items: Vec<ListItem> = app.sets.items.iter().map(|o| row(o, app)).collect();

    let header = Line::from(vec![
        header_span(format!("{:<24}", "Name")),
        header_span(format!("{:<12}", "Pool")),
        header_span(format!("{:<5}", "SRS")),
        header_span(format!("{:<7}", "Items")),
        header_span(format!("{:<6}", "Due")),
        header_span(format!("{:<6}", "New")),
        header_span("Next Review".to_string()),
    ]);

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(app.sets.selected);

    // Header sits on the first inner row, list starts one row below it
    let header_area = Rect {
        x: area.x + 3,
        y: area.y + 1,
        width: area.width.saturating_sub(4),
        height: 1,
    };
    f.render_widget(Paragraph::new(header), header_area);

    let list_area = Rect {
        x: area.x,
        y: area.y + 1,
        width: area.width,
        height: area.height.saturating_sub(1),
    };

    f.render_stateful_widget(list, list_area, &mut state);
}
