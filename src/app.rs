use crate::artwork::ArtworkWorker;
use crate::audio::{NullTransport, RodioTransport, Transport};
use crate::catalog;
use crate::clock;
use crate::config;
use crate::core::WidgetCore;
use crate::marquee::Marquee;
use crate::media_controls::SouvlakiSessionPublisher;
use crate::model::{SortMode, Track};
use crate::player::{Player, PlayerOptions, TrackListener};
use crate::queue::QueueRow;
use crate::session::{LogSessionPublisher, RemoteAction, SessionPublisher};
use crate::storage::FileStore;
use crate::ui::{self, ViewState};
use anyhow::Result;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MediaKeyCode, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::prelude::Rect;
use std::cell::Cell;
use std::io::stdout;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const VOLUME_STEP: f32 = 0.05;

#[derive(Debug, Clone)]
pub struct AppOptions {
    pub playlist: PathBuf,
    pub no_audio: bool,
    pub gesture_gate: bool,
}

/// Restarts the title scroll whenever a new track lands.
struct MarqueeRestart(Rc<Cell<Instant>>);

impl TrackListener for MarqueeRestart {
    fn on_track_changed(&mut self, _catalog_index: usize, _track: &Track) {
        self.0.set(Instant::now());
    }
}

#[derive(Default)]
struct UiState {
    overlay_open: bool,
    selected_row: usize,
    search_input: Option<String>,
}

pub fn run(options: AppOptions) -> Result<()> {
    config::ensure_config_dir()?;
    let store = FileStore::open(&config::state_path()?)?;
    info!("preferences at {}", store.path().display());
    let prefs = config::load_preferences(&store)?;
    let catalog = catalog::load_catalog(&options.playlist)?;
    let core = WidgetCore::new(catalog, &prefs, Box::new(store));

    let transport: Box<dyn Transport> = if options.no_audio {
        Box::new(NullTransport::new())
    } else {
        match RodioTransport::new() {
            Ok(transport) => Box::new(transport),
            Err(err) => {
                warn!("audio output unavailable, continuing silently: {err:#}");
                Box::new(NullTransport::new())
            }
        }
    };
    let (publisher, remote) = open_session();
    let artwork = ArtworkWorker::spawn(config::artwork_cache_dir()?);

    let mut player = Player::new(
        core,
        transport,
        publisher,
        Some(artwork),
        PlayerOptions {
            gesture_gate: options.gesture_gate,
            volume: prefs.volume,
        },
    );
    let marquee_epoch = Rc::new(Cell::new(Instant::now()));
    player.subscribe(Box::new(MarqueeRestart(Rc::clone(&marquee_epoch))));
    player.load_initial();
    info!("widget started");

    enable_raw_mode()?;
    let mut out = stdout();
    execute!(out, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(out);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let marquee = Marquee::default();
    let mut ui_state = UiState::default();
    let mut last_tick = Instant::now();
    let mut timeline = Rect::default();

    let result: Result<()> = loop {
        player.tick();

        if player.core().dirty || last_tick.elapsed() > Duration::from_millis(100) {
            let view = ViewState {
                now: clock::now(),
                marquee: &marquee,
                marquee_elapsed: marquee_epoch.get().elapsed(),
                overlay_open: ui_state.overlay_open,
                selected_row: ui_state.selected_row,
                search_input: ui_state.search_input.as_deref(),
            };
            terminal.draw(|frame| {
                timeline = ui::timeline_rect(frame.area());
                ui::draw(frame, &player, &view)
            })?;
            player.core_mut().dirty = false;
            last_tick = Instant::now();
        }

        if !event::poll(Duration::from_millis(33))? {
            continue;
        }

        match event::read()? {
            Event::Mouse(mouse) => handle_mouse(&mut player, mouse, timeline),
            Event::Resize(..) => {
                marquee_epoch.set(Instant::now());
                player.core_mut().dirty = true;
            }
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL)
                {
                    break Ok(());
                }
                if ui_state.search_input.is_some() {
                    handle_search_key(&mut player, &mut ui_state, key);
                } else if ui_state.overlay_open {
                    handle_overlay_key(&mut player, &mut ui_state, key);
                } else if handle_main_key(&mut player, &mut ui_state, &remote, key) {
                    break Ok(());
                }
            }
            _ => {}
        }
    };

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    result
}

/// Host media session when one is reachable, otherwise the log-only
/// publisher. Either way terminal media keys feed the returned sender.
fn open_session() -> (Box<dyn SessionPublisher>, Sender<RemoteAction>) {
    match SouvlakiSessionPublisher::new() {
        Ok(publisher) => {
            let remote = publisher.remote();
            let publisher: Box<dyn SessionPublisher> = Box::new(publisher);
            (publisher, remote)
        }
        Err(err) => {
            warn!("media session unavailable, logging metadata instead: {err:#}");
            let publisher = LogSessionPublisher::new();
            let remote = publisher.remote();
            let publisher: Box<dyn SessionPublisher> = Box::new(publisher);
            (publisher, remote)
        }
    }
}

/// Returns `true` when the user asked to quit.
fn handle_main_key(
    player: &mut Player,
    ui_state: &mut UiState,
    remote: &Sender<RemoteAction>,
    key: KeyEvent,
) -> bool {
    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Char(' ') => {
            player.toggle_play();
        }
        KeyCode::Char('n') | KeyCode::Right => player.next(),
        KeyCode::Char('p') | KeyCode::Left => player.previous(),
        KeyCode::Char('f') => {
            player.core_mut().toggle_current_favorite();
        }
        KeyCode::Char('+') | KeyCode::Char('=') => player.step_volume(VOLUME_STEP),
        KeyCode::Char('-') => player.step_volume(-VOLUME_STEP),
        KeyCode::Char('m') => player.toggle_mute(),
        KeyCode::Char('l') | KeyCode::Tab => open_overlay(player, ui_state),
        KeyCode::Media(media) => {
            let action = match media {
                MediaKeyCode::Play => Some(RemoteAction::Play),
                MediaKeyCode::Pause | MediaKeyCode::Stop => Some(RemoteAction::Pause),
                MediaKeyCode::PlayPause if player.is_playing() => Some(RemoteAction::Pause),
                MediaKeyCode::PlayPause => Some(RemoteAction::Play),
                MediaKeyCode::TrackNext => Some(RemoteAction::Next),
                MediaKeyCode::TrackPrevious => Some(RemoteAction::Previous),
                _ => None,
            };
            if let Some(action) = action
                && let Err(err) = remote.send(action)
            {
                warn!("media key dropped: {err}");
            }
        }
        _ => {}
    }
    false
}

fn open_overlay(player: &mut Player, ui_state: &mut UiState) {
    ui_state.overlay_open = true;
    let core = player.core();
    ui_state.selected_row = core
        .current_index()
        .and_then(|current| {
            core.view()
                .rows
                .iter()
                .position(|row| *row == QueueRow::Track(current))
        })
        .unwrap_or(0);
    player.core_mut().dirty = true;
}

fn handle_overlay_key(player: &mut Player, ui_state: &mut UiState, key: KeyEvent) {
    let rows = player.core().view().rows.len();
    match key.code {
        KeyCode::Esc | KeyCode::Char('l') | KeyCode::Tab => ui_state.overlay_open = false,
        KeyCode::Down => {
            if rows > 0 {
                ui_state.selected_row = (ui_state.selected_row + 1).min(rows - 1);
            }
        }
        KeyCode::Up => ui_state.selected_row = ui_state.selected_row.saturating_sub(1),
        KeyCode::Enter => player.activate_row(ui_state.selected_row),
        KeyCode::Char('/') => ui_state.search_input = Some(player.core().query().search.clone()),
        KeyCode::Char('s') => {
            let mode = match player.core().query().sort_mode {
                SortMode::Title => SortMode::Artist,
                SortMode::Artist => SortMode::Title,
            };
            player.core_mut().set_sort_mode(mode);
        }
        KeyCode::Char('o') => player.core_mut().toggle_sort_order(),
        KeyCode::Char('v') => {
            let enabled = !player.core().query().favorites_only;
            player.core_mut().set_favorites_only(enabled);
            ui_state.selected_row = 0;
        }
        KeyCode::Char('f') => {
            if let Some(QueueRow::Track(idx)) =
                player.core().view().rows.get(ui_state.selected_row).cloned()
            {
                player.core_mut().toggle_favorite(idx);
            }
        }
        KeyCode::Char(' ') => {
            player.toggle_play();
        }
        _ => {}
    }

    let rows = player.core().view().rows.len();
    ui_state.selected_row = ui_state.selected_row.min(rows.saturating_sub(1));
    player.core_mut().dirty = true;
}

fn handle_search_key(player: &mut Player, ui_state: &mut UiState, key: KeyEvent) {
    let Some(input) = ui_state.search_input.as_mut() else {
        return;
    };
    match key.code {
        KeyCode::Esc | KeyCode::Enter => ui_state.search_input = None,
        KeyCode::Backspace => {
            input.pop();
        }
        KeyCode::Char(ch) => input.push(ch),
        _ => {}
    }
    if let Some(input) = ui_state.search_input.as_deref() {
        player.core_mut().set_search(input);
    }
    ui_state.selected_row = 0;
    player.core_mut().dirty = true;
}

fn handle_mouse(player: &mut Player, mouse: MouseEvent, timeline: Rect) {
    if mouse.kind != MouseEventKind::Down(MouseButton::Left) {
        return;
    }
    if mouse.row < timeline.y || mouse.row >= timeline.y.saturating_add(timeline.height) {
        return;
    }
    if let Some(ratio) = ui::timeline_ratio(timeline, mouse.column) {
        player.seek_ratio(ratio);
    }
}
