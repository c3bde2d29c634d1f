// Main TUI application using ratatui
// Wires keys to the queue manager and the audio player, and draws the
// track table, the status line and the player footer.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::catalog::folder::FolderSource;
use crate::catalog::manifest::ManifestSource;
use crate::catalog::source::CatalogSource;
use crate::catalog::ViewSort;
use crate::config::{Config, SourceKind, YouTubeMode};
use crate::error::ResolveError;
use crate::player::audio::{AudioPlayer, PlayerState};
use crate::player::queue::{PlaybackEvent, PlaybackState, QueueManager};
use crate::youtube::extractor::{self, YouTubeExtractor};

const APP_TITLE: &str = "Jukebox";
const STATUS_TTL: Duration = Duration::from_secs(8);
const VOLUME_STEP: u32 = 5;

enum AppMode {
    Normal,
    Filtering,
}

// Result of a background yt-dlp fetch. `request` must still match the
// latest request when it arrives, otherwise the user has moved on.
struct FetchOutcome {
    request: u64,
    index: usize,
    result: Result<PathBuf, ResolveError>,
}

// What a track reference turned into.
enum Playable {
    File(PathBuf),
    Browser(String),
    Fetch(String),
}

pub struct JukeboxApp {
    config: Config,
    config_path: PathBuf,
    source: Box<dyn CatalogSource>,
    manager: QueueManager,
    player: AudioPlayer,
    extractor: YouTubeExtractor,
    view_sort: ViewSort,
    visible: Vec<usize>,
    table_state: TableState,
    filter_input: String,
    mode: AppMode,
    should_quit: bool,
    status: Option<(String, Instant)>,
    fetching: Option<usize>,
    // Some while the sink is silent because a track ended during a fetch:
    // how many more tracks auto-advance may try if that fetch fails.
    resume_after_fetch: Option<usize>,
    request_seq: u64,
    fetch_rx: mpsc::UnboundedReceiver<FetchOutcome>,
    fetch_tx: mpsc::UnboundedSender<FetchOutcome>,
}

pub fn make_source(config: &Config) -> Box<dyn CatalogSource> {
    match config.source {
        SourceKind::Folder => Box::new(FolderSource::new(&config.music_dir)),
        SourceKind::Manifest => Box::new(ManifestSource::new(&config.manifest_path)),
    }
}

/// `--list`: load the catalog once and print the visible tracks.
pub fn print_catalog(config: &Config, filter: Option<&str>) -> Result<()> {
    let source = make_source(config);
    let mut manager = QueueManager::new();

    match source.fetch() {
        Ok(report) => {
            for notice in &report.notices {
                eprintln!("{}", notice);
            }
            let dropped = manager.load(report.records);
            if report.skipped + dropped > 0 {
                eprintln!("Skipped {} unusable entries", report.skipped + dropped);
            }
        }
        Err(e) => {
            warn!(error = %e, "could not load catalog");
            eprintln!("Could not load {}: {}", source.describe(), e);
        }
    }

    for index in manager.set_filter(filter.unwrap_or("")) {
        if let Some(track) = manager.track(index) {
            println!("{} - {}", track.artist, track.title);
        }
    }
    Ok(())
}

impl JukeboxApp {
    pub fn new(config: Config, config_path: PathBuf, initial_filter: Option<&str>) -> Self {
        let (fetch_tx, fetch_rx) = mpsc::unbounded_channel();

        let source = make_source(&config);
        let player = AudioPlayer::new(config.volume);
        if !player.has_output() {
            warn!("starting without audio output");
        }
        let extractor = YouTubeExtractor::new(config.yt_dlp.clone(), config.cache_dir.clone());

        let mut app = JukeboxApp {
            config,
            config_path,
            source,
            manager: QueueManager::new(),
            player,
            extractor,
            view_sort: ViewSort::Catalog,
            visible: Vec::new(),
            table_state: TableState::default(),
            filter_input: initial_filter.unwrap_or("").to_string(),
            mode: AppMode::Normal,
            should_quit: false,
            status: None,
            fetching: None,
            resume_after_fetch: None,
            request_seq: 0,
            fetch_rx,
            fetch_tx,
        };

        app.manager.set_filter(&app.filter_input);
        app.load_catalog();
        if app.config.shuffle {
            app.manager.set_shuffle(true, &app.visible, None);
        }
        app
    }

    pub async fn run(&mut self) -> Result<()> {
        enable_raw_mode().context("Failed to enable raw mode")?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;

        self.save_settings();
        result
    }

    fn event_loop<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        loop {
            terminal.draw(|f| self.draw_ui(f))?;

            while let Ok(outcome) = self.fetch_rx.try_recv() {
                self.finish_fetch(outcome);
            }

            // End-of-track and other sink reports
            self.pump_events();

            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_input(key.code);
                        self.pump_events();
                    }
                }
            }

            if self.should_quit {
                break;
            }
        }
        Ok(())
    }

    // ==========================================
    // CATALOG
    // ==========================================
    fn load_catalog(&mut self) {
        match self.source.fetch() {
            Ok(report) => {
                let dropped = self.manager.load(report.records);
                let skipped = report.skipped + dropped;
                let mut notices = report.notices;
                if skipped > 0 {
                    notices.push(format!("Skipped {} unusable entries", skipped));
                }
                if self.manager.catalog().is_empty() {
                    notices.push(self.empty_catalog_hint());
                }
                if !notices.is_empty() {
                    self.set_status(notices.join(" · "));
                }
                info!(
                    source = %self.source.describe(),
                    tracks = self.manager.catalog().len(),
                    skipped,
                    "catalog ready"
                );
            }
            Err(e) => {
                error!(source = %self.source.describe(), error = %e, "catalog load failed");
                self.manager.load(Vec::new());
                self.set_status(format!("Could not load tracks: {}", e));
            }
        }
        self.refresh_view();
    }

    fn empty_catalog_hint(&self) -> String {
        match self.config.source {
            SourceKind::Folder => format!(
                "No songs found. Put \"Artist - Title.mp3\" files in {}",
                self.source.location().display()
            ),
            SourceKind::Manifest => format!(
                "No tracks found. Add entries to {}",
                self.source.location().display()
            ),
        }
    }

    fn reload(&mut self) {
        self.player.stop();
        self.pump_events();
        self.cancel_fetch();
        self.load_catalog();
        if self.manager.is_shuffle() {
            self.manager.set_shuffle(true, &self.visible, None);
        }
    }

    // Recomputes the display order and keeps the selection on the
    // current track when it is visible.
    fn refresh_view(&mut self) {
        let filtered = self.manager.visible();
        self.visible = self.manager.catalog().sort_view(&filtered, self.view_sort);

        let current_row = self
            .manager
            .current()
            .and_then(|current| self.visible.iter().position(|&i| i == current));

        let selected = match (current_row, self.table_state.selected()) {
            (Some(row), _) => Some(row),
            (None, _) if self.visible.is_empty() => None,
            (None, Some(row)) => Some(row.min(self.visible.len() - 1)),
            (None, None) => Some(0),
        };
        self.table_state.select(selected);
    }

    // ==========================================
    // PLAYBACK
    // ==========================================
    // Nothing changes in the manager until the track has actually started
    // (or its download has been queued). Returns false when the track
    // could not be played; the status line then says why.
    fn play_index(&mut self, index: usize) -> bool {
        let Some(track) = self.manager.track(index).cloned() else {
            return false;
        };
        let name = track.display_name();

        let playable = match self.resolve(&track.playable_ref) {
            Ok(playable) => playable,
            Err(e) => {
                self.playback_failed(&name, e);
                return false;
            }
        };

        match playable {
            Playable::File(path) => self.start_file(index, &path, &name),
            Playable::Browser(url) => match open::that(&url) {
                Ok(()) => {
                    // The browser plays it; we only track the state.
                    self.cancel_fetch();
                    self.player.stop();
                    self.pump_events();
                    self.manager.set_current(index);
                    self.manager.handle_event(PlaybackEvent::Started, &self.visible);
                    self.select_current();
                    self.set_status(format!("Opened in browser: {}", name));
                    true
                }
                Err(e) => {
                    self.set_status(format!("Failed to open browser: {}. Visit: {}", e, url));
                    false
                }
            },
            Playable::Fetch(video_id) => {
                self.spawn_fetch(index, video_id, name);
                true
            }
        }
    }

    fn resolve(&self, playable_ref: &str) -> Result<Playable, ResolveError> {
        if self.config.source == SourceKind::Folder {
            return Ok(Playable::File(PathBuf::from(playable_ref)));
        }

        let video_id = extractor::extract_video_id(playable_ref)?;
        Ok(match self.config.youtube_mode {
            YouTubeMode::Browser => Playable::Browser(extractor::watch_url(&video_id)),
            YouTubeMode::Download => {
                let cached = self.extractor.cached_path(&video_id);
                if cached.is_file() {
                    Playable::File(cached)
                } else {
                    Playable::Fetch(video_id)
                }
            }
        })
    }

    // The current track keeps playing while yt-dlp runs; the new one
    // becomes current only once its audio is here.
    fn spawn_fetch(&mut self, index: usize, video_id: String, name: String) {
        self.request_seq += 1;
        let request = self.request_seq;
        self.fetching = Some(index);
        self.set_status(format!("Fetching {}...", name));

        let extractor = self.extractor.clone();
        let tx = self.fetch_tx.clone();
        tokio::task::spawn_blocking(move || {
            let result = extractor.fetch_audio(&video_id);
            let _ = tx.send(FetchOutcome {
                request,
                index,
                result,
            });
        });
    }

    fn finish_fetch(&mut self, outcome: FetchOutcome) {
        if outcome.request != self.request_seq || self.fetching != Some(outcome.index) {
            debug!(index = outcome.index, "dropping stale fetch result");
            return;
        }
        let resume = self.resume_after_fetch;
        self.cancel_fetch();

        let name = self
            .manager
            .track(outcome.index)
            .map(|t| t.display_name())
            .unwrap_or_default();
        let started = match outcome.result {
            Ok(path) => self.start_file(outcome.index, &path, &name),
            Err(e) => {
                self.playback_failed(&name, e);
                false
            }
        };

        // The previous track ran out while we were waiting
        if let (false, Some(attempts)) = (started, resume) {
            let next = self.manager.advance_from(&self.visible, Some(outcome.index));
            self.continue_after_end(next, attempts);
        }
    }

    fn start_file(&mut self, index: usize, path: &Path, name: &str) -> bool {
        match self.player.play(path) {
            Ok(()) => {
                self.cancel_fetch();
                self.manager.set_current(index);
                self.select_current();
                self.set_status(format!("Now playing: {}", name));
                true
            }
            Err(e) => {
                self.playback_failed(name, e);
                false
            }
        }
    }

    fn playback_failed(&mut self, name: &str, e: ResolveError) {
        warn!(track = name, error = %e, "cannot play track");
        self.set_status(format!("Cannot play {}: {}", name, e));
    }

    fn cancel_fetch(&mut self) {
        self.fetching = None;
        self.resume_after_fetch = None;
    }

    // Feeds sink events to the manager. While a download is pending an
    // Ended is held back, so the track being fetched is not skipped.
    fn pump_events(&mut self) {
        while let Some(event) = self.player.poll_event() {
            if event == PlaybackEvent::Ended && self.fetching.is_some() {
                debug!("track ended while fetching the next one");
                self.resume_after_fetch = Some(self.visible.len());
                continue;
            }
            let next = self.manager.handle_event(event, &self.visible);
            if event != PlaybackEvent::Ended {
                continue;
            }
            if next.is_none() && !self.visible.is_empty() {
                // duplicate end report
                continue;
            }
            self.continue_after_end(next, self.visible.len());
        }
    }

    // Plays what the manager chose after an Ended. Unplayable tracks are
    // stepped over, trying at most `attempts` tracks; when nothing plays
    // the session goes back to Idle.
    fn continue_after_end(&mut self, next: Option<usize>, mut attempts: usize) {
        let mut candidate = next;
        while let Some(index) = candidate {
            if attempts == 0 {
                break;
            }
            attempts -= 1;
            debug!(index, "advancing after end of track");
            if self.play_index(index) {
                if self.fetching == Some(index) {
                    self.resume_after_fetch = Some(attempts);
                }
                return;
            }
            candidate = self.manager.advance_from(&self.visible, Some(index));
        }

        self.player.stop();
        if self.visible.is_empty() {
            self.set_status("Playback finished - nothing visible to play");
        }
    }

    fn toggle_play_pause(&mut self) {
        if self.fetching.is_some() {
            return;
        }
        match self.manager.state() {
            PlaybackState::Playing(_) | PlaybackState::Paused(_)
                if self.player.state() != PlayerState::Stopped =>
            {
                self.player.toggle_pause();
            }
            // Browser playback: nothing to pause locally, just track it.
            PlaybackState::Playing(_) => {
                self.manager.handle_event(PlaybackEvent::Paused, &self.visible);
            }
            PlaybackState::Paused(_) => {
                self.manager.handle_event(PlaybackEvent::Started, &self.visible);
            }
            PlaybackState::Idle => {
                match self.manager.start(&self.visible) {
                    Some(index) => {
                        self.play_index(index);
                    }
                    None => self.set_status("Nothing to play"),
                }
            }
        }
    }

    fn stop(&mut self) {
        self.cancel_fetch();
        self.player.stop();
        self.set_status("Stopped");
    }

    fn play_next(&mut self) {
        match self.manager.advance(&self.visible) {
            Some(index) => {
                self.play_index(index);
            }
            None => self.set_status("Nothing to play"),
        }
    }

    fn toggle_shuffle(&mut self) {
        let enabled = !self.manager.is_shuffle();
        self.manager
            .set_shuffle(enabled, &self.visible, self.manager.current());
        self.set_status(if enabled { "Shuffle on" } else { "Shuffle off" });
    }

    fn change_volume(&mut self, up: bool) {
        let current = self.player.volume();
        let volume = if up {
            (current + VOLUME_STEP).min(100)
        } else {
            current.saturating_sub(VOLUME_STEP)
        };
        self.player.set_volume(volume);
    }

    fn open_location(&mut self) {
        let location = self.source.location();
        if let Err(e) = open::that(&location) {
            self.set_status(format!("Failed to open {}: {}", location.display(), e));
        }
    }

    fn save_settings(&self) {
        let mut persisted = Config::load_from(&self.config_path);
        persisted.volume = self.player.volume();
        persisted.shuffle = self.manager.is_shuffle();
        if let Err(e) = persisted.save_to(&self.config_path) {
            warn!(error = %e, "could not save settings");
        }
    }

    // ==========================================
    // INPUT
    // ==========================================
    fn handle_input(&mut self, key: KeyCode) {
        match self.mode {
            AppMode::Filtering => match key {
                KeyCode::Char(c) => {
                    self.filter_input.push(c);
                    self.apply_filter();
                }
                KeyCode::Backspace => {
                    self.filter_input.pop();
                    self.apply_filter();
                }
                KeyCode::Enter => self.mode = AppMode::Normal,
                KeyCode::Esc => {
                    self.filter_input.clear();
                    self.apply_filter();
                    self.mode = AppMode::Normal;
                }
                _ => {}
            },
            AppMode::Normal => match key {
                KeyCode::Char('q') => self.should_quit = true,
                KeyCode::Char('/') => self.mode = AppMode::Filtering,
                KeyCode::Char(' ') => self.toggle_play_pause(),
                KeyCode::Char('x') => self.stop(),
                KeyCode::Char('n') => self.play_next(),
                KeyCode::Char('r') => self.toggle_shuffle(),
                KeyCode::Char('s') => {
                    self.view_sort = self.view_sort.next();
                    self.refresh_view();
                }
                KeyCode::Char('R') => self.reload(),
                KeyCode::Char('o') => self.open_location(),
                KeyCode::Char('+') | KeyCode::Char('=') => self.change_volume(true),
                KeyCode::Char('-') => self.change_volume(false),
                KeyCode::Char('j') | KeyCode::Down => self.move_selection(1),
                KeyCode::Char('k') | KeyCode::Up => self.move_selection(-1),
                KeyCode::Enter => self.play_selected(),
                _ => {}
            },
        }
    }

    fn apply_filter(&mut self) {
        self.manager.set_filter(&self.filter_input);
        self.refresh_view();
    }

    fn move_selection(&mut self, delta: isize) {
        if self.visible.is_empty() {
            return;
        }
        let len = self.visible.len() as isize;
        let row = self.table_state.selected().unwrap_or(0) as isize;
        let next = (row + delta).rem_euclid(len) as usize;
        self.table_state.select(Some(next));
    }

    fn play_selected(&mut self) {
        let index = self
            .table_state
            .selected()
            .and_then(|row| self.visible.get(row).copied());
        if let Some(index) = index {
            self.play_index(index);
        }
    }

    fn select_current(&mut self) {
        if let Some(row) = self
            .manager
            .current()
            .and_then(|current| self.visible.iter().position(|&i| i == current))
        {
            self.table_state.select(Some(row));
        }
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status = Some((message.into(), Instant::now()));
    }

    fn status_line(&self) -> String {
        if let AppMode::Filtering = self.mode {
            return format!("Filter: {}_", self.filter_input);
        }
        match &self.status {
            Some((message, at)) if at.elapsed() < STATUS_TTL => message.clone(),
            _ => "[/]Filter [Enter]Play [Space]Play/Pause [x]Stop [n]Next [r]Shuffle [s]Sort [+/-]Volume [R]Reload [o]Open [q]Quit".to_string(),
        }
    }

    // ==========================================
    // DRAWING
    // ==========================================
    fn draw_ui(&mut self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(5),
                Constraint::Length(4),
            ])
            .split(frame.size());

        let title = self
            .manager
            .current_track()
            .map(|t| format!("{}  |  {}", t.display_name(), APP_TITLE))
            .unwrap_or_else(|| APP_TITLE.to_string());
        let header = Paragraph::new(self.status_line())
            .block(Block::default().borders(Borders::ALL).title(title));
        frame.render_widget(header, chunks[0]);

        let current = self.manager.current();
        let rows: Vec<Row> = self
            .visible
            .iter()
            .filter_map(|&index| self.manager.track(index).map(|t| (index, t)))
            .map(|(index, track)| {
                let marker = if Some(index) == current { "▶" } else { "" };
                let style = if Some(index) == current {
                    Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                Row::new(vec![
                    Cell::from(marker),
                    Cell::from(track.artist.clone()),
                    Cell::from(track.title.clone()),
                ])
                .style(style)
            })
            .collect();

        let table_title = format!(
            "Tracks {}/{} · sort: {}",
            self.visible.len(),
            self.manager.catalog().len(),
            self.view_sort.label()
        );
        let table = Table::new(
            rows,
            [
                Constraint::Length(2),
                Constraint::Percentage(45),
                Constraint::Percentage(55),
            ],
        )
        .header(
            Row::new(vec!["", "Artist", "Title"])
                .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .block(Block::default().borders(Borders::ALL).title(table_title))
        .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));
        frame.render_stateful_widget(table, chunks[1], &mut self.table_state);

        let state_str = match self.manager.state() {
            _ if self.fetching.is_some() => "… Loading",
            PlaybackState::Playing(_) => "▶ Playing",
            PlaybackState::Paused(_) => "⏸ Paused",
            PlaybackState::Idle => "⏹ Stopped",
        };
        let time_str = match self.player.duration() {
            Some(total) => format!(
                "{} / {}",
                format_time(self.player.time_pos()),
                format_time(total)
            ),
            None => format_time(self.player.time_pos()),
        };
        let shuffle_str = if self.manager.is_shuffle() {
            format!("on ({} queued)", self.manager.pending().len())
        } else {
            "off".to_string()
        };
        let player_info = format!(
            "State: {} | Shuffle: {} | Volume: {}% | Time: {}\nSource: {}",
            state_str,
            shuffle_str,
            self.player.volume(),
            time_str,
            self.source.describe()
        );
        let player_widget =
            Paragraph::new(player_info).block(Block::default().borders(Borders::ALL).title("Player"));
        frame.render_widget(player_widget, chunks[2]);
    }
}

fn format_time(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
