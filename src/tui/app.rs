//! Application state and event loop

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Datelike, Local, NaiveDate};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    widgets::Widget,
    DefaultTerminal, Frame,
};

use crate::config::Config;
use crate::services::grid::{HeatmapLayout, YearSpan, WEEKS};
use crate::services::{
    contribution_label, no_data_label, normalize_username, ContributionsService, DataSource,
    FetchedContributions, FileSecretStore, LinkedAccounts, ProviderStatus, SecretStore,
};
use crate::types::Result;

use super::keymap::{self, Action};
use super::theme::Theme;
use super::widgets::{
    accounts::AccountsView,
    heatmap::{slot_at, CellMode, Heatmap},
    help::HelpPopup,
    legend::Legend,
    spinner::{LoadingStage, Spinner},
    tabs::{Tab, TabBar},
};

/// First year GitHub has contributions for
pub const MIN_YEAR: i32 = 2008;

/// Rows around the heatmap: tabs, header, legend, summary, tooltip, status, footer
const CHROME_ROWS: u16 = 11;

/// Contributions tab state
pub enum HeatmapState {
    /// Fetch in flight, spinner animating
    Loading {
        spinner_frame: usize,
        stage: LoadingStage,
    },
    /// Fetch failed and there is nothing to fall back to
    Failed { message: String },
    /// Fetched fine, but the year has no activity
    NoData { year: i32 },
    Ready {
        layout: Box<HeatmapLayout>,
        /// Year total as reported by the API
        total: u64,
    },
}

/// Accounts tab state
pub enum AccountsPanel {
    Loading,
    Loaded {
        statuses: Vec<ProviderStatus>,
        /// Links whose stored token could not be checked
        warning: Option<String>,
    },
    Failed { message: String },
}

struct LoadRequest {
    generation: u64,
    username: String,
    refresh: bool,
}

struct LoadResult {
    generation: u64,
    result: std::result::Result<FetchedContributions, String>,
}

/// Main application
pub struct App {
    username: String,
    year: i32,
    theme: Theme,
    state: HeatmapState,
    data: Option<FetchedContributions>,
    /// One-line message under the heatmap (refresh failure, bad username)
    notice: Option<String>,
    /// Bumped on every load; results tagged with an older value are dropped
    generation: u64,
    pending_load: Option<LoadRequest>,
    /// (week, day) of the highlighted cell
    cursor: (usize, usize),
    current_tab: Tab,
    accounts: AccountsPanel,
    /// Username being typed after `/`
    input: Option<String>,
    show_help: bool,
    should_quit: bool,
}

impl App {
    /// Create a new app in loading state with the first fetch queued
    pub fn new(username: String, year: i32, theme: Theme) -> Self {
        let year = year.clamp(MIN_YEAR, current_year());
        let mut app = Self {
            username,
            year,
            theme,
            state: HeatmapState::Loading {
                spinner_frame: 0,
                stage: LoadingStage::Fetching,
            },
            data: None,
            notice: None,
            generation: 0,
            pending_load: None,
            cursor: default_cursor(year, Local::now().date_naive()),
            current_tab: Tab::default(),
            accounts: AccountsPanel::Loading,
            input: None,
            show_help: false,
            should_quit: false,
        };
        app.request_load(false);
        app
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    fn request_load(&mut self, refresh: bool) {
        self.generation += 1;
        self.pending_load = Some(LoadRequest {
            generation: self.generation,
            username: self.username.clone(),
            refresh,
        });
        self.state = HeatmapState::Loading {
            spinner_frame: 0,
            stage: if refresh {
                LoadingStage::Refreshing
            } else {
                LoadingStage::Fetching
            },
        };
    }

    fn take_load_request(&mut self) -> Option<LoadRequest> {
        self.pending_load.take()
    }

    /// Apply a finished load. Returns false when the result was stale.
    fn apply_load(&mut self, load: LoadResult) -> bool {
        if load.generation != self.generation {
            tracing::debug!(
                generation = load.generation,
                current = self.generation,
                "dropping stale load result"
            );
            return false;
        }
        match load.result {
            Ok(fetched) => {
                self.notice = None;
                self.data = Some(fetched);
                self.rebuild();
            }
            Err(message) => {
                if self.data.is_some() {
                    // Keep showing what we have
                    self.notice = Some(format!("Refresh failed: {}", message));
                    self.rebuild();
                } else {
                    self.state = HeatmapState::Failed { message };
                }
            }
        }
        true
    }

    /// Recompute the grid for the current year from fetched data
    fn rebuild(&mut self) {
        let Some(fetched) = &self.data else {
            return;
        };
        let total = fetched.data.year_total(self.year);
        self.state = if !fetched.data.has_activity(self.year) {
            HeatmapState::NoData { year: self.year }
        } else {
            HeatmapState::Ready {
                layout: Box::new(HeatmapLayout::build(
                    &fetched.data.contributions,
                    self.year,
                )),
                total,
            }
        };
    }

    fn set_year(&mut self, year: i32) {
        let year = year.clamp(MIN_YEAR, current_year());
        if year == self.year {
            return;
        }
        self.year = year;
        self.cursor = default_cursor(year, Local::now().date_naive());
        // Year changes never refetch
        self.rebuild();
    }

    fn set_username(&mut self, username: String) {
        if username == self.username && self.data.is_some() {
            return;
        }
        self.username = username;
        self.data = None;
        self.notice = None;
        self.request_load(false);
    }

    fn set_accounts(&mut self, result: Result<(Vec<ProviderStatus>, Option<String>)>) {
        self.accounts = match result {
            Ok((statuses, warning)) => AccountsPanel::Loaded { statuses, warning },
            Err(e) => AccountsPanel::Failed {
                message: e.to_string(),
            },
        };
    }

    /// Handle keyboard events
    pub fn handle_event(&mut self, event: Event) {
        if let Event::Key(key) = event {
            if key.kind != KeyEventKind::Press {
                return;
            }
            if self.input.is_some() {
                self.handle_input_key(key.code);
                return;
            }
            if let Some(action) = keymap::action_for(key.code) {
                self.apply_action(action);
            }
        }
    }

    fn apply_action(&mut self, action: Action) {
        let on_grid = self.current_tab == Tab::Contributions;
        match action {
            Action::Quit => self.should_quit = true,
            Action::NextTab => self.current_tab = self.current_tab.next(),
            Action::PrevTab => self.current_tab = self.current_tab.prev(),
            Action::JumpTab(n) => {
                if let Some(tab) = Tab::from_number(n) {
                    self.current_tab = tab;
                }
            }
            Action::ToggleHelp => self.show_help = !self.show_help,
            Action::PrevYear if on_grid => self.set_year(self.year - 1),
            Action::NextYear if on_grid => self.set_year(self.year + 1),
            Action::PrevYear | Action::NextYear => {}
            Action::MoveCursor(dx, dy) => self.move_cursor(dx, dy),
            Action::Refresh => {
                if !matches!(self.state, HeatmapState::Loading { .. }) {
                    self.request_load(true);
                }
            }
            Action::EditUser => self.input = Some(String::new()),
        }
    }

    fn handle_input_key(&mut self, code: KeyCode) {
        let Some(input) = self.input.as_mut() else {
            return;
        };
        match code {
            KeyCode::Esc => self.input = None,
            KeyCode::Backspace => {
                input.pop();
            }
            KeyCode::Char(c) => input.push(c),
            KeyCode::Enter => {
                let typed = self.input.take().unwrap_or_default();
                match normalize_username(&typed) {
                    Ok(username) => self.set_username(username),
                    Err(e) => self.notice = Some(e.to_string()),
                }
            }
            _ => {}
        }
    }

    fn move_cursor(&mut self, dx: i32, dy: i32) {
        if self.current_tab != Tab::Contributions {
            return;
        }
        let (week, day) = self.cursor;
        let week = (week as i32 + dx).clamp(0, WEEKS as i32 - 1);
        let day = (day as i32 + dy).clamp(0, 6);
        self.cursor = (week as usize, day as usize);
    }

    /// Update spinner animation
    pub fn tick(&mut self) {
        if let HeatmapState::Loading {
            spinner_frame,
            stage,
        } = &self.state
        {
            self.state = HeatmapState::Loading {
                spinner_frame: Spinner::next_frame(*spinner_frame),
                stage: *stage,
            };
        }
    }

    /// Check if app should quit
    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Draw the application
    pub fn draw(&self, frame: &mut Frame) {
        frame.render_widget(self, frame.area());
    }

    fn render_contributions(&self, area: Rect, buf: &mut Buffer) {
        let mode = CellMode::for_area(area.width, area.height.saturating_sub(CHROME_ROWS));
        let [tabs, _, header, _, grid, legend, summary, tooltip, status, _, footer] =
            Layout::vertical([
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(mode.height()),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .areas(area);

        TabBar::new(self.current_tab, self.theme).render(tabs, buf);
        self.render_header(header, buf);

        match &self.state {
            HeatmapState::Loading { .. } => {}
            HeatmapState::Failed { message } => {
                let text = format!("Could not load contributions: {}", message);
                render_centered(grid, buf, &text, Style::default().fg(self.theme.error()));
                let hint = "Press r to retry or / to change user";
                render_centered(legend, buf, hint, Style::default().fg(self.theme.muted()));
            }
            HeatmapState::NoData { year } => {
                let text = no_data_label(*year);
                render_centered(grid, buf, &text, Style::default().fg(self.theme.muted()));
            }
            HeatmapState::Ready { layout, total } => {
                let cursor = (!self.show_help).then_some(self.cursor);
                Heatmap::new(layout, self.theme)
                    .with_cursor(cursor)
                    .render(grid, buf);

                let grid_box = centered_width(grid, mode.grid_width());
                Legend::new(self.theme).render(centered_width(legend, mode.grid_width()), buf);

                let text = format!("{} in {}", contribution_label(*total), self.year);
                set_line(
                    buf,
                    Rect { y: summary.y, height: summary.height, ..grid_box },
                    &text,
                    Style::default()
                        .fg(self.theme.text())
                        .add_modifier(Modifier::BOLD),
                );

                if let Some(tip) = slot_at(layout, self.cursor).and_then(|slot| slot.tooltip()) {
                    set_line(
                        buf,
                        Rect { y: tooltip.y, height: tooltip.height, ..grid_box },
                        &tip,
                        Style::default().fg(self.theme.date()),
                    );
                }
            }
        }

        self.render_status(status, buf);
        self.render_footer(footer, buf);
    }

    fn render_header(&self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width < 2 {
            return;
        }
        if let Some(input) = &self.input {
            let text = format!("User: {}_", input);
            buf.set_stringn(
                area.x + 1,
                area.y,
                &text,
                area.width.saturating_sub(1) as usize,
                Style::default().fg(self.theme.accent()),
            );
            return;
        }
        let user = format!("@{}", self.username);
        buf.set_stringn(
            area.x + 1,
            area.y,
            &user,
            area.width.saturating_sub(1) as usize,
            Style::default()
                .fg(self.theme.text())
                .add_modifier(Modifier::BOLD),
        );
        let year = format!("< {} >", self.year);
        let x = area.x + area.width.saturating_sub(year.len() as u16 + 1);
        if x > area.x + user.len() as u16 + 1 {
            buf.set_string(x, area.y, &year, Style::default().fg(self.theme.date()));
        }
    }

    fn render_status(&self, area: Rect, buf: &mut Buffer) {
        let (text, color) = match (&self.notice, &self.data) {
            (Some(notice), _) => (notice.clone(), self.theme.error()),
            (None, Some(fetched)) if !matches!(self.state, HeatmapState::Loading { .. }) => {
                (source_note(fetched), self.theme.muted())
            }
            _ => return,
        };
        render_centered(area, buf, &text, Style::default().fg(color));
    }

    fn render_footer(&self, area: Rect, buf: &mut Buffer) {
        let text = "?: help  q: quit";
        render_centered(area, buf, text, Style::default().fg(self.theme.muted()));
    }

    fn render_accounts(&self, area: Rect, buf: &mut Buffer) {
        let [tabs, _, title, _, body, footer] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .areas(area);

        TabBar::new(self.current_tab, self.theme).render(tabs, buf);
        set_line(
            buf,
            inset(title),
            "Linked accounts",
            Style::default()
                .fg(self.theme.date())
                .add_modifier(Modifier::BOLD),
        );

        let body = inset(body);
        match &self.accounts {
            AccountsPanel::Loading => {
                set_line(
                    buf,
                    body,
                    "Checking linked accounts...",
                    Style::default().fg(self.theme.muted()),
                );
            }
            AccountsPanel::Loaded { statuses, warning } => {
                AccountsView::new(statuses, self.theme)
                    .with_error(warning.as_deref())
                    .render(body, buf);
            }
            AccountsPanel::Failed { message } => {
                AccountsView::new(&[], self.theme)
                    .with_error(Some(message.as_str()))
                    .render(body, buf);
            }
        }
        self.render_footer(footer, buf);
    }
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match (&self.state, self.current_tab) {
            (
                HeatmapState::Loading {
                    spinner_frame,
                    stage,
                },
                Tab::Contributions,
            ) => {
                Spinner::new(*spinner_frame, *stage, &self.username, self.year)
                    .with_theme(self.theme)
                    .render(area, buf);
            }
            (_, Tab::Contributions) => self.render_contributions(area, buf),
            (_, Tab::Accounts) => self.render_accounts(area, buf),
        }

        // Render help popup overlay if active
        if self.show_help {
            let popup_area = HelpPopup::centered_area(area);
            HelpPopup::new(self.theme).render(popup_area, buf);
        }
    }
}

fn current_year() -> i32 {
    Local::now().year()
}

/// Today's cell for the current year, otherwise the last in-year cell
fn default_cursor(year: i32, today: NaiveDate) -> (usize, usize) {
    let Some(span) = YearSpan::new(year) else {
        return (0, 0);
    };
    let target = today.clamp(span.first, span.last);
    let week = span.week_of(target).clamp(0, WEEKS as i64 - 1) as usize;
    let day = target.weekday().num_days_from_sunday() as usize;
    (week, day)
}

fn source_note(fetched: &FetchedContributions) -> String {
    let when = DateTime::from_timestamp(fetched.fetched_at, 0)
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "an unknown time".to_string());
    match fetched.source {
        DataSource::Network => format!("Fetched {}", when),
        DataSource::Cache => format!("Cached {}", when),
        DataSource::StaleCache => format!("Offline: showing data cached {}", when),
    }
}

fn centered_width(area: Rect, width: u16) -> Rect {
    let width = width.min(area.width);
    Rect {
        x: area.x + (area.width - width) / 2,
        width,
        ..area
    }
}

/// One-column margin on both sides
fn inset(area: Rect) -> Rect {
    Rect {
        x: area.x + 1u16.min(area.width),
        width: area.width.saturating_sub(2),
        ..area
    }
}

/// Left-aligned text on the first row of `area`, clipped to its width
fn set_line(buf: &mut Buffer, area: Rect, text: &str, style: Style) {
    if area.height == 0 || area.width == 0 {
        return;
    }
    buf.set_stringn(area.x, area.y, text, area.width as usize, style);
}

fn render_centered(area: Rect, buf: &mut Buffer, text: &str, style: Style) {
    if area.height == 0 || area.width == 0 {
        return;
    }
    let len = (text.chars().count() as u16).min(area.width);
    let x = area.x + (area.width - len) / 2;
    buf.set_stringn(x, area.y, text, len as usize, style);
}

/// Restore every link and summarize it for the accounts tab
fn load_accounts(config: &Config) -> Result<(Vec<ProviderStatus>, Option<String>)> {
    let secrets: Arc<dyn SecretStore> = Arc::new(FileSecretStore::new()?);
    let mut accounts = LinkedAccounts::new(config, secrets)?;
    let failures = accounts.restore_all();
    let warning = (!failures.is_empty()).then(|| {
        let names: Vec<String> = failures
            .iter()
            .map(|(kind, e)| format!("{} ({})", kind, e))
            .collect();
        format!("Could not verify: {}", names.join(", "))
    });
    Ok((accounts.statuses(), warning))
}

/// Run the TUI application
pub fn run(config: Config, username: String, year: i32) -> anyhow::Result<()> {
    // Must happen before raw mode
    let theme = Theme::detect();
    let service = Arc::new(ContributionsService::new(&config)?);
    let mut terminal = ratatui::init();
    let result = run_app(&mut terminal, config, service, App::new(username, year, theme));
    ratatui::restore();
    result
}

fn run_app(
    terminal: &mut DefaultTerminal,
    config: Config,
    service: Arc<ContributionsService>,
    mut app: App,
) -> anyhow::Result<()> {
    let (load_tx, load_rx) = mpsc::channel::<LoadResult>();

    let (accounts_tx, accounts_rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = accounts_tx.send(load_accounts(&config));
    });

    loop {
        if let Some(request) = app.take_load_request() {
            let tx = load_tx.clone();
            let service = Arc::clone(&service);
            thread::spawn(move || {
                let result = if request.refresh {
                    service.refresh(&request.username)
                } else {
                    service.load(&request.username)
                };
                let _ = tx.send(LoadResult {
                    generation: request.generation,
                    result: result.map_err(|e| e.to_string()),
                });
            });
        }

        terminal.draw(|frame| app.draw(frame))?;

        if app.should_quit() {
            break;
        }

        // Check for finished loads (non-blocking)
        while let Ok(result) = load_rx.try_recv() {
            app.apply_load(result);
        }
        if let Ok(result) = accounts_rx.try_recv() {
            app.set_accounts(result);
        }

        // Poll for events with 100ms timeout for spinner animation
        if event::poll(Duration::from_millis(100))? {
            app.handle_event(event::read()?);
        } else {
            app.tick();
        }
    }

    Ok(())
}
