use std::time::Duration;

use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, MouseButton, MouseEvent, MouseEventKind,
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::info;

use crate::app::{App, InputMode, PointerTarget};
use crate::audio::AudioEngine;
use crate::catalog::{CatalogTrack, CatalogWorker, Query, Reply};
use crate::config;
use crate::error::Result;
use crate::player::Player;
use crate::player::store::PlayerState;
use crate::player::transport::Direction;
use crate::ui::{self, PlayerView};

/// State tracked by the runtime event loop across iterations.
pub struct EventLoopState {
    /// Internal two-key prefix state used for `gg` handling.
    pub pending_gg: bool,
    /// Selection serial seen on the previous iteration.
    last_selection_serial: u64,
}

impl EventLoopState {
    pub fn new(player_state: &PlayerState) -> Self {
        Self {
            pending_gg: false,
            last_selection_serial: player_state.selection_serial,
        }
    }
}

/// Main terminal event loop: drives the player, applies catalog replies,
/// draws and dispatches input. Returns `Ok(())` when the user quits.
pub fn run<E: AudioEngine>(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    settings: &config::Settings,
    app: &mut App,
    player: &mut Player<E>,
    catalog: &mut CatalogWorker,
    state: &mut EventLoopState,
) -> Result<()> {
    let frame_interval = Duration::from_millis(settings.ui.frame_interval_ms);
    let idle_poll = Duration::from_millis(settings.ui.idle_poll_ms);

    loop {
        player.pump();
        player.frame();

        if let Some(reply) = catalog.poll() {
            apply_reply(reply, app, player);
        }
        follow_selection(app, player, state);

        let snapshot = player.state();
        let view = PlayerView {
            state: &snapshot,
            progress: player.progress(),
            duration: player.duration_label(),
        };
        let mut hits = app.hits;
        terminal.draw(|f| hits = ui::draw(f, app, &view, &settings.ui, &settings.controls))?;
        app.hits = hits;

        let timeout = if player.is_ticking() {
            frame_interval
        } else {
            idle_poll
        };
        if event::poll(timeout)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if handle_key_event(key, settings, app, player, catalog, state) {
                        break;
                    }
                }
                Event::Mouse(mouse) => handle_mouse_event(mouse, app, player),
                _ => {}
            }
        }
    }

    Ok(())
}

fn apply_reply<E: AudioEngine>(reply: Reply, app: &mut App, player: &mut Player<E>) {
    match reply.result {
        Some(tracks) => {
            info!(query = %reply.query.describe(), count = tracks.len(), "playlist replaced");
            player.load_playlist(tracks.iter().map(CatalogTrack::to_track_info).collect());
            app.set_results(reply.query, tracks);
        }
        // Already logged by the gateway; the old playlist stays.
        None => app.fetch_failed(),
    }
}

/// Move the cursor along when the player changes track on its own.
fn follow_selection<E: AudioEngine>(
    app: &mut App,
    player: &Player<E>,
    state: &mut EventLoopState,
) {
    let snapshot = player.state();
    if snapshot.selection_serial == state.last_selection_serial {
        return;
    }
    state.last_selection_serial = snapshot.selection_serial;
    if !app.follow_playback || snapshot.selection.is_unselected() {
        return;
    }
    if let Some(view) = app.view_index_of(snapshot.selection.index) {
        app.set_cursor(view);
    }
}

fn submit(app: &mut App, catalog: &mut CatalogWorker, query: Query) {
    info!(query = %query.describe(), "catalog request submitted");
    catalog.submit(query.clone());
    app.start_fetch(query);
}

fn handle_key_event<E: AudioEngine>(
    key: KeyEvent,
    settings: &config::Settings,
    app: &mut App,
    player: &mut Player<E>,
    catalog: &mut CatalogWorker,
    state: &mut EventLoopState,
) -> bool {
    if app.input_mode == InputMode::Query {
        state.pending_gg = false;
        match key.code {
            KeyCode::Esc => app.exit_query_mode(),
            KeyCode::Backspace => app.pop_query_char(),
            KeyCode::Enter => {
                if let Some(query) = app.submit_query() {
                    submit(app, catalog, query);
                }
            }
            KeyCode::Char(c) => {
                if !c.is_control() {
                    app.push_query_char(c);
                }
            }
            _ => {}
        }
        return false;
    }

    let scrub = settings.controls.scrub_seconds as f64;
    let step = settings.audio.volume_step;

    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Char('/') => app.enter_query_mode(),
        KeyCode::Esc => app.volume_panel.hide(),
        KeyCode::Char('g') => {
            if state.pending_gg {
                app.follow_playback_off();
                app.first();
            }
            state.pending_gg = !state.pending_gg;
            return false;
        }
        KeyCode::Char('G') => {
            app.follow_playback_off();
            app.last();
        }
        KeyCode::Char('j') | KeyCode::Down => {
            app.follow_playback_off();
            app.next();
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.follow_playback_off();
            app.prev();
        }
        KeyCode::Enter => {
            if let Some(id) = app.cursor_track().map(|t| t.id) {
                app.follow_playback_on();
                player.play_track(id);
            }
        }
        KeyCode::Char('a') => {
            if let Some(query) = app.album_query() {
                submit(app, catalog, query);
            }
        }
        KeyCode::Char('p') | KeyCode::Char(' ') => {
            app.follow_playback_on();
            player.toggle_play();
        }
        KeyCode::Char('l') => {
            app.follow_playback_on();
            player.skip(Direction::Next);
        }
        KeyCode::Char('h') => {
            app.follow_playback_on();
            player.skip(Direction::Prev);
        }
        KeyCode::Char('L') => player.scrub(scrub),
        KeyCode::Char('H') => player.scrub(-scrub),
        KeyCode::Char('+') | KeyCode::Char('=') => player.change_volume(step),
        KeyCode::Char('-') => player.change_volume(-step),
        KeyCode::Char('v') => app.volume_panel.toggle(),
        KeyCode::Char('s') => app.cycle_sort(),
        _ => {}
    }

    // g pending clears on any other key
    state.pending_gg = false;
    false
}

fn handle_mouse_event<E: AudioEngine>(mouse: MouseEvent, app: &mut App, player: &mut Player<E>) {
    // Cell centers, so the last column of a bar maps close to 1.
    let x = f64::from(mouse.column) + 0.5;
    let y = f64::from(mouse.row) + 0.5;

    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            let target = app.pointer_down(x, y);
            match target {
                PointerTarget::VolumeSlider => drag_volume(x, app, player),
                PointerTarget::VolumeToggle => app.volume_panel.toggle(),
                PointerTarget::Progress => {
                    if let Some(bar) = app.hits.progress {
                        player.seek_from_pointer(x, &bar);
                    }
                }
                PointerTarget::Row(index) => {
                    app.follow_playback_off();
                    app.set_cursor(index);
                }
                PointerTarget::Nothing => {}
            }
        }
        MouseEventKind::Drag(MouseButton::Left) => drag_volume(x, app, player),
        MouseEventKind::Up(MouseButton::Left) => app.volume_drag.pointer_up(),
        MouseEventKind::ScrollDown => {
            app.follow_playback_off();
            app.next();
        }
        MouseEventKind::ScrollUp => {
            app.follow_playback_off();
            app.prev();
        }
        _ => {}
    }
}

fn drag_volume<E: AudioEngine>(x: f64, app: &App, player: &mut Player<E>) {
    let Some(slider) = app.hits.volume_slider else {
        return;
    };
    if let Some(volume) = app.volume_drag.pointer_move(x, &slider) {
        player.set_volume(volume);
    }
}
