mod ui;
mod widgets;

use std::io;
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::config::Config;
use crate::db::Database;
use crate::error::Error;
use crate::models::{ItemWithSrs, SetOverview, Stats, StudyPanel};

const DUE_PREVIEW: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Dashboard,
    Sets,
    SetDetail,
}

impl View {
    fn next(&self) -> Self {
        match self {
            View::Dashboard => View::Sets,
            View::Sets => View::Dashboard,
            View::SetDetail => View::Sets,
        }
    }

    fn prev(&self) -> Self {
        match self {
            View::Dashboard => View::Sets,
            View::Sets => View::Dashboard,
            View::SetDetail => View::Sets,
        }
    }
}

pub struct StatefulList<T> {
    pub items: Vec<T>,
    pub selected: Option<usize>,
}

impl<T> StatefulList<T> {
    fn with_items(items: Vec<T>) -> Self {
        let selected = if items.is_empty() { None } else { Some(0) };
        Self { items, selected }
    }

    fn next(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let i = match self.selected {
            Some(i) if i + 1 < self.items.len() => i + 1,
            _ => 0,
        };
        self.selected = Some(i);
    }

    fn previous(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let i = match self.selected {
            Some(0) | None => self.items.len() - 1,
            Some(i) => i - 1,
        };
        self.selected = Some(i);
    }

    fn first(&mut self) {
        if !self.items.is_empty() {
            self.selected = Some(0);
        }
    }

    fn last(&mut self) {
        if !self.items.is_empty() {
            self.selected = Some(self.items.len() - 1);
        }
    }

    fn selected_item(&self) -> Option<&T> {
        self.selected.and_then(|i| self.items.get(i))
    }
}

pub struct SelectedSet {
    pub overview: SetOverview,
    pub panel: StudyPanel,
    pub items: StatefulList<ItemWithSrs>,
}

pub struct App {
    db: Database,
    config: Config,
    pub view: View,
    pub now: DateTime<Utc>,
    pub stats: Stats,
    pub sets: StatefulList<SetOverview>,
    pub due_items: Vec<ItemWithSrs>,
    pub selected: Option<SelectedSet>,
    pub status: Option<String>,
    pub should_quit: bool,
}

impl App {
    pub fn new(db: Database, config: Config) -> Result<Self, Box<dyn std::error::Error>> {
        let now = Utc::now();
        let stats = db.get_stats(&config.user, now)?;
        let sets = db.list_overviews(now)?;
        let due_items = db.all_due_items(now, DUE_PREVIEW)?;

        Ok(Self {
            db,
            config,
            view: View::Dashboard,
            now,
            stats,
            sets: StatefulList::with_items(sets),
            due_items,
            selected: None,
            status: None,
            should_quit: false,
        })
    }

    pub fn refresh_data(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.now = Utc::now();
        self.stats = self.db.get_stats(&self.config.user, self.now)?;
        let previous = self.sets.selected;
        self.sets = StatefulList::with_items(self.db.list_overviews(self.now)?);
        if let Some(i) = previous.filter(|&i| i < self.sets.items.len()) {
            self.sets.selected = Some(i);
        }
        self.due_items = self.db.all_due_items(self.now, DUE_PREVIEW)?;

        if let Some(id) = self.selected.as_ref().map(|s| s.overview.set.id) {
            self.load_set(id)?;
        }
        Ok(())
    }

    pub fn next_reset(&self) -> DateTime<Utc> {
        self.db.policy().next_reset(self.now)
    }

    fn load_set(&mut self, set_id: i64) -> Result<(), Box<dyn std::error::Error>> {
        let overview = self.db.set_overview(set_id, self.now)?;
        let panel = StudyPanel::from_overview(&overview, self.now);
        let items = self.db.list_items(set_id)?;
        self.selected = Some(SelectedSet {
            overview,
            panel,
            items: StatefulList::with_items(items),
        });
        Ok(())
    }

    fn select_set(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(id) = self.sets.selected_item().map(|o| o.set.id) {
            self.load_set(id)?;
            self.view = View::SetDetail;
        }
        Ok(())
    }

    fn learn_new(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let Some(selected) = &self.selected else {
            return Ok(());
        };
        if !selected.panel.learn_new.enabled {
            self.status = selected.panel.learn_new.notice.clone();
            return Ok(());
        }

        let set_id = selected.overview.set.id;
        match self.db.learn(set_id, self.config.learn_batch, Utc::now()) {
            Ok(result) => {
                self.status = Some(format!(
                    "Learning {} new item(s), {} left today",
                    result.admitted.len(),
                    result.learn_new_left
                ));
            }
            Err(e @ (Error::BudgetExhausted { .. } | Error::SrsDisabled(_))) => {
                self.status = Some(e.to_string());
            }
            Err(e) => return Err(e.into()),
        }
        self.refresh_data()
    }

    fn toggle_srs(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let Some(selected) = &self.selected else {
            return Ok(());
        };
        let set = &selected.overview.set;
        let enabled = !set.srs_enabled;
        self.db.set_srs_enabled(set.id, enabled)?;
        self.status = Some(format!(
            "Spaced repetition {} for '{}'",
            if enabled { "enabled" } else { "disabled" },
            set.name
        ));
        self.refresh_data()
    }

    fn back_to_sets(&mut self) {
        self.view = View::Sets;
        self.selected = None;
    }

    fn handle_key(
        &mut self,
        key: KeyCode,
        modifiers: KeyModifiers,
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.status = None;

        match key {
            KeyCode::Char('q') => self.should_quit = true,

            KeyCode::Char('r') if modifiers.contains(KeyModifiers::CONTROL) => {
                self.refresh_data()?;
            }

            KeyCode::Esc if self.view == View::SetDetail => self.back_to_sets(),

            KeyCode::Char('h') | KeyCode::Left => match self.view {
                View::SetDetail => self.back_to_sets(),
                _ => self.view = self.view.prev(),
            },
            KeyCode::Char('l') | KeyCode::Right => match self.view {
                View::Sets => self.select_set()?,
                View::SetDetail => {}
                _ => self.view = self.view.next(),
            },

            KeyCode::Tab => self.view = self.view.next(),
            KeyCode::BackTab => self.view = self.view.prev(),

            KeyCode::Char('j') | KeyCode::Down => match self.view {
                View::Sets => self.sets.next(),
                View::SetDetail => {
                    if let Some(s) = self.selected.as_mut() {
                        s.items.next();
                    }
                }
                View::Dashboard => {}
            },
            KeyCode::Char('k') | KeyCode::Up => match self.view {
                View::Sets => self.sets.previous(),
                View::SetDetail => {
                    if let Some(s) = self.selected.as_mut() {
                        s.items.previous();
                    }
                }
                View::Dashboard => {}
            },

            KeyCode::Char('g') => match self.view {
                View::Sets => self.sets.first(),
                View::SetDetail => {
                    if let Some(s) = self.selected.as_mut() {
                        s.items.first();
                    }
                }
                View::Dashboard => {}
            },
            KeyCode::Char('G') => match self.view {
                View::Sets => self.sets.last(),
                View::SetDetail => {
                    if let Some(s) = self.selected.as_mut() {
                        s.items.last();
                    }
                }
                View::Dashboard => {}
            },

            KeyCode::Enter if self.view == View::Sets => self.select_set()?,

            KeyCode::Char('n') if self.view == View::SetDetail => self.learn_new()?,
            KeyCode::Char('s') if self.view == View::SetDetail => self.toggle_srs()?,

            _ => {}
        }
        Ok(())
    }
}

pub fn run(db: Database, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = App::new(db, config).and_then(|mut app| run_app(&mut terminal, &mut app));

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        if event::poll(Duration::from_millis(250))? {
            if let Event::Key(key) = event::read()? {
                app.handle_key(key.code, key.modifiers)?;
            }
        } else {
            // Keep countdowns current
            app.now = Utc::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}
