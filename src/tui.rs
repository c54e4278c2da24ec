use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use std::collections::HashSet;
use std::io::stdout;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::db::Database;
use crate::locate::{self, Locator};
use crate::map::{MapSink, MarkerBoard};
use crate::models::Job;
use crate::session::{FeedSession, RadiusState};

const CATEGORIES: [&str; 5] = ["IT", "Finance", "Marketing", "HR", "Other"];
const LOCATIONS: [&str; 4] = ["Lagos", "Abuja", "Remote", "Hybrid"];
const SALARY_BUCKETS: [&str; 4] = ["100k+", "300k+", "500k+", "1M+"];

const RADIUS_STEP_KM: f64 = 5.0;
const RADIUS_MIN_KM: f64 = 5.0;
const RADIUS_MAX_KM: f64 = 200.0;
const IDLE_TICK: Duration = Duration::from_millis(250);

struct AppState {
    session: FeedSession,
    markers: MarkerBoard,
    jobs: Vec<Job>,
    selected: usize,
    scroll_offset: u16,
    radius_input: f64,
    search_mode: bool,
    search_text: String,
    favorites: HashSet<i64>,
    user: String,
    status: Option<String>,
}

impl AppState {
    fn new(config: &Config, favorites: HashSet<i64>) -> Self {
        Self {
            session: FeedSession::from_config(&config.feed),
            markers: MarkerBoard::new(),
            jobs: Vec::new(),
            selected: 0,
            scroll_offset: 0,
            radius_input: config.feed.default_radius_km,
            search_mode: false,
            search_text: String::new(),
            favorites,
            user: config.user.id.clone(),
            status: None,
        }
    }

    fn current_job(&self) -> Option<&Job> {
        self.jobs.get(self.selected)
    }

    /// Re-runs the filter pipeline and keeps the selection in range.
    fn refresh(&mut self, db: &Database) {
        match self.session.refresh(db, &mut self.markers) {
            Ok(jobs) => {
                self.jobs = jobs;
                self.selected = self.selected.min(self.jobs.len().saturating_sub(1));
                self.scroll_offset = 0;
                self.status = None;
            }
            Err(e) => {
                self.status = Some(format!("Error applying filters: {}", e));
            }
        }
    }

    fn next(&mut self) {
        if !self.jobs.is_empty() && self.selected < self.jobs.len() - 1 {
            self.selected += 1;
            self.scroll_offset = 0;
        }
    }

    fn prev(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            self.scroll_offset = 0;
        }
    }

    fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_add(3);
    }

    fn scroll_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(3);
    }

    /// Redraws the center marker without re-running the filters.
    fn sync_center_marker(&mut self) {
        self.markers.sync(&self.jobs, self.session.center_marker());
    }

    fn toggle_favorite(&mut self, db: &Database) {
        let Some(id) = self.current_job().map(|j| j.id) else { return };
        let result = if self.favorites.contains(&id) {
            db.remove_favorite(&self.user, id).map(|_| {
                self.favorites.remove(&id);
            })
        } else {
            db.save_favorite(&self.user, id).map(|_| {
                self.favorites.insert(id);
            })
        };
        if let Err(e) = result {
            self.status = Some(format!("Could not update favorites: {}", e));
        }
    }
}

/// Empty string means "All"; cycling past the last option wraps back to it.
fn cycle(options: &[&str], current: &str) -> String {
    match options.iter().position(|o| *o == current) {
        Some(i) if i + 1 < options.len() => options[i + 1].to_string(),
        Some(_) => String::new(),
        None => options[0].to_string(),
    }
}

pub fn run_browse(db: &Database, config: &Config) -> Result<()> {
    let favorites = db.favorite_job_ids(&config.user.id)?.into_iter().collect();
    let locator = locate::locator_from_config(&config.locate);

    let mut state = AppState::new(config, favorites);
    state.refresh(db);

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut state, db, locator.as_ref());

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut AppState,
    db: &Database,
    locator: &dyn Locator,
) -> Result<()> {
    let mut list_state = ListState::default();
    list_state.select(Some(0));

    loop {
        terminal.draw(|frame| draw(frame, state, &mut list_state))?;

        let timeout = state
            .session
            .search_deadline()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
            .unwrap_or(IDLE_TICK);

        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if state.search_mode {
                    handle_search_key(state, db, key.code);
                } else if !handle_key(state, db, locator, key.code) {
                    break;
                }
            }
        }

        if state.session.poll_search(Instant::now()) {
            state.refresh(db);
        }
        list_state.select(if state.jobs.is_empty() { None } else { Some(state.selected) });
    }
    Ok(())
}

fn handle_search_key(state: &mut AppState, db: &Database, code: KeyCode) {
    match code {
        KeyCode::Char(c) => {
            state.search_text.push(c);
            state.session.type_search(&state.search_text, Instant::now());
        }
        KeyCode::Backspace => {
            state.search_text.pop();
            state.session.type_search(&state.search_text, Instant::now());
        }
        KeyCode::Enter => {
            state.search_mode = false;
            if state.session.flush_search() {
                state.refresh(db);
            }
        }
        KeyCode::Esc => state.search_mode = false,
        _ => {}
    }
}

/// Returns false when the user asked to quit.
fn handle_key(state: &mut AppState, db: &Database, locator: &dyn Locator, code: KeyCode) -> bool {
    match code {
        KeyCode::Char('q') | KeyCode::Esc => return false,
        KeyCode::Down | KeyCode::Char('j') => state.next(),
        KeyCode::Up | KeyCode::Char('k') => state.prev(),
        KeyCode::Char('J') | KeyCode::PageDown => state.scroll_down(),
        KeyCode::Char('K') | KeyCode::PageUp => state.scroll_up(),
        KeyCode::Char('/') => state.search_mode = true,
        KeyCode::Char('c') => {
            let next = cycle(&CATEGORIES, &state.session.inputs().category);
            state.session.set_category(&next);
            state.refresh(db);
        }
        KeyCode::Char('l') => {
            let next = cycle(&LOCATIONS, &state.session.inputs().location);
            state.session.set_location(&next);
            state.refresh(db);
        }
        KeyCode::Char('s') => {
            let next = cycle(&SALARY_BUCKETS, &state.session.inputs().salary);
            state.session.set_salary(&next);
            state.refresh(db);
        }
        KeyCode::Char('g') => {
            if state.session.locate(locator) {
                if state.session.radius_state() == RadiusState::Active {
                    state.refresh(db);
                } else {
                    state.sync_center_marker();
                    state.status = Some("Center set. Press 'a' to apply the radius.".to_string());
                }
            } else {
                state.status = Some("Could not get your location. Keeping the current center.".to_string());
            }
        }
        KeyCode::Char('+') | KeyCode::Char('=') => {
            state.radius_input = (state.radius_input + RADIUS_STEP_KM).min(RADIUS_MAX_KM);
        }
        KeyCode::Char('-') => {
            state.radius_input = (state.radius_input - RADIUS_STEP_KM).max(RADIUS_MIN_KM);
        }
        KeyCode::Char('a') => match state.session.apply_radius(state.radius_input) {
            Ok(()) => state.refresh(db),
            Err(e) => state.status = Some(e.to_string()),
        },
        KeyCode::Char('R') => {
            state.session.reset();
            state.search_text.clear();
            state.radius_input = state.session.geo().radius_km;
            state.selected = 0;
            state.refresh(db);
        }
        KeyCode::Char('f') => state.toggle_favorite(db),
        _ => {}
    }
    true
}

fn radius_label(state: &AppState) -> String {
    let geo = state.session.geo();
    match state.session.radius_state() {
        RadiusState::Inactive => format!("off ({} km)", state.radius_input),
        RadiusState::CenterSet => format!(
            "center {:.4},{:.4} ({} km, not applied)",
            geo.center.lon, geo.center.lat, state.radius_input
        ),
        RadiusState::Active => format!(
            "{} km around {:.4},{:.4}",
            geo.radius_km, geo.center.lon, geo.center.lat
        ),
    }
}

fn or_all<'a>(value: &'a str, all: &'a str) -> &'a str {
    if value.is_empty() { all } else { value }
}

fn draw(frame: &mut Frame, state: &AppState, list_state: &mut ListState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(frame.area());

    // Filter bar
    let inputs = state.session.inputs();
    let search = if state.search_mode {
        format!("{}_", state.search_text)
    } else {
        state.search_text.clone()
    };
    let mut filter_lines = vec![
        Line::from(format!(
            "Search: {}   Category: {}   Location: {}   Salary: {}",
            if search.is_empty() { "-" } else { search.as_str() },
            or_all(&inputs.category, "All"),
            or_all(&inputs.location, "All"),
            or_all(&inputs.salary, "Any"),
        )),
        Line::from(format!(
            "Radius: {}   Markers: {}",
            radius_label(state),
            state.markers.markers().len()
        )),
    ];
    if let Some(status) = &state.status {
        filter_lines.push(Line::from(Span::styled(
            status.as_str(),
            Style::default().fg(Color::Yellow),
        )));
    }
    let filter_bar = Paragraph::new(filter_lines)
        .block(Block::default().borders(Borders::TOP).title(" Filters "));
    frame.render_widget(filter_bar, rows[0]);

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(40),
            Constraint::Percentage(60),
        ])
        .split(rows[1]);

    // Left panel: job list
    let items: Vec<ListItem> = state
        .jobs
        .iter()
        .map(|job| {
            let saved = if state.favorites.contains(&job.id) { "*" } else { " " };
            let title = if job.title.chars().count() > 32 {
                format!("{}...", job.title.chars().take(29).collect::<String>())
            } else {
                job.title.clone()
            };
            ListItem::new(format!("{} #{:<4} {} | {}", saved, job.id, title, job.location))
        })
        .collect();

    let title = if state.jobs.is_empty() {
        " No results match your selected filters ".to_string()
    } else {
        format!(" Jobs ({}) ", state.jobs.len())
    };
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, chunks[0], list_state);

    // Right panel: job detail
    let detail = build_detail(state);
    let detail_widget = Paragraph::new(detail)
        .block(Block::default().borders(Borders::ALL).title(" Detail "))
        .wrap(Wrap { trim: false })
        .scroll((state.scroll_offset, 0));

    frame.render_widget(detail_widget, chunks[1]);

    let help = if state.search_mode {
        " type to search  Enter:done  Esc:leave"
    } else {
        " j/k:nav J/K:scroll /:search c:category l:location s:salary g:locate +/-:radius a:apply R:reset f:save q:quit"
    };
    frame.render_widget(
        Paragraph::new(help).style(Style::default().fg(Color::DarkGray)),
        rows[2],
    );
}

fn build_detail(state: &AppState) -> Text<'_> {
    let Some(job) = state.current_job() else {
        return Text::raw("No job selected");
    };

    let mut lines: Vec<Line> = Vec::new();

    lines.push(Line::from(Span::styled(
        &job.title,
        Style::default().add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(job.company.as_deref().unwrap_or("Confidential").to_string()));

    lines.push(Line::from(format!("Location: {}", job.location)));
    if let Some(km) = state.markers.distance_from_center(job.id) {
        lines.push(Line::from(Span::styled(
            format!("Distance from center: {:.1} km", km),
            Style::default().fg(Color::Cyan),
        )));
    }
    lines.push(Line::from(format!("Category: {}", job.category)));
    lines.push(Line::from(format!(
        "Salary: {}",
        job.salary.as_deref().unwrap_or("Competitive")
    )));
    lines.push(Line::from(format!("Posted: {}", job.posted_date())));
    if state.favorites.contains(&job.id) {
        lines.push(Line::from(Span::styled("Saved", Style::default().fg(Color::Green))));
    }

    if !job.tags.is_empty() {
        lines.push(Line::from(format!("Tags: {}", job.tags.join(", "))));
    }
    if let Some(link) = &job.application_link {
        lines.push(Line::from(format!("Apply: {}", link)));
    }
    if let Some(email) = &job.application_email {
        lines.push(Line::from(format!("Apply by email: {}", email)));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Description",
        Style::default().add_modifier(Modifier::BOLD),
    )));
    for line in textwrap::fill(&job.description, 70).lines() {
        lines.push(Line::from(line.to_string()));
    }

    Text::from(lines)
}
