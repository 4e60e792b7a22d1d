use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs},
    Frame,
};

use super::widgets::{dashboard, set_detail, sets};
use super::{App, View};

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Tab bar
            Constraint::Min(0),    // Content
            Constraint::Length(1), // Help bar
        ])
        .split(f.area());

    draw_tabs(f, app, chunks[0]);
    draw_content(f, app, chunks[1]);
    draw_help_bar(f, app, chunks[2]);
}

fn draw_tabs(f: &mut Frame, app: &App, area: Rect) {
    let tab_titles = vec!["Dashboard", "Sets"];
    let selected = match app.view {
        View::Dashboard => 0,
        View::Sets | View::SetDetail => 1,
    };

    let tabs = Tabs::new(tab_titles)
        .block(Block::default().borders(Borders::ALL).title(" 記憶 kioku "))
        .select(selected)
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    f.render_widget(tabs, area);
}

fn draw_content(f: &mut Frame, app: &App, area: Rect) {
    match app.view {
        View::Dashboard => dashboard::draw(f, app, area),
        View::Sets => sets::draw(f, app, area),
        View::SetDetail => set_detail::draw(f, app, area),
    }
}

fn key(k: &str) -> Span<'_> {
    Span::styled(k, Style::default().fg(Color::Cyan))
}

fn draw_help_bar(f: &mut Frame, app: &App, area: Rect) {
    if let Some(status) = &app.status {
        let line = Line::from(Span::styled(
            status.as_str(),
            Style::default().fg(Color::Yellow),
        ));
        f.render_widget(
            Paragraph::new(line).style(Style::default().bg(Color::DarkGray)),
            area,
        );
        return;
    }

    let mut spans = vec![key("h/l"), Span::raw(" Views  ")];

    match app.view {
        View::Dashboard => {
            spans.extend(vec![key("^r"), Span::raw(" Refresh  ")]);
        }
        View::Sets => {
            spans.extend(vec![
                key("j/k"),
                Span::raw(" Nav  "),
                key("g/G"),
                Span::raw(" Top/Bot  "),
                key("l/<CR>"),
                Span::raw(" Open  "),
            ]);
        }
        View::SetDetail => {
            spans.extend(vec![
                key("h/<Esc>"),
                Span::raw(" Back  "),
                key("j/k"),
                Span::raw(" Nav  "),
                key("n"),
                Span::raw(" Learn new  "),
                key("s"),
                Span::raw(" Toggle SRS  "),
                key("^r"),
                Span::raw(" Refresh  "),
            ]);
        }
    }

    spans.extend(vec![key("q"), Span::raw(" Quit")]);

    let help = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));

    f.render_widget(help, area);
}
