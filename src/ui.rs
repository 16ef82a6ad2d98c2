//! UI rendering helpers for the terminal user interface.
//!
//! This module contains functions to render the TUI using `ratatui`. `draw`
//! reports where the clickable widgets ended up so the runtime can hit-test
//! mouse input against the frame that is actually on screen.

use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Gauge, LineGauge, List, ListItem, Padding, Paragraph, Wrap},
};
use std::{collections::BTreeMap, sync::LazyLock};

use crate::app::{App, HitAreas, InputMode, SortField};
use crate::catalog::SearchStatus;
use crate::config::{ControlsSettings, UiSettings};
use crate::player::binding::Progress;
use crate::player::format::format_millis;
use crate::player::store::PlayerState;
use crate::player::transport::Bounds;

static CONTROLS_MAP: LazyLock<BTreeMap<String, String>> = LazyLock::new(|| {
    let mut map: BTreeMap<String, String> = BTreeMap::new();
    map.insert("/".to_string(), "search".to_string());
    map.insert("enter".to_string(), "play".to_string());
    map.insert("a".to_string(), "album".to_string());
    map.insert("j/k".to_string(), "up/down".to_string());
    map.insert("gg/G".to_string(), "top/bottom".to_string());
    map.insert("space/p".to_string(), "play/pause".to_string());
    map.insert("h/l".to_string(), "prev/next".to_string());
    // H/L is filled dynamically from config.
    map.insert("+/-".to_string(), "volume".to_string());
    map.insert("v".to_string(), "volume panel".to_string());
    map.insert("s".to_string(), "sort".to_string());
    map.insert("q".to_string(), "quit".to_string());
    map
});

/// Render the controls help text, incorporating scrub seconds.
fn controls_text(scrub_seconds: u64) -> String {
    let order = [
        "/", "enter", "a", "j/k", "gg/G", "space/p", "h/l", "H/L", "+/-", "v", "s", "q",
    ];
    order
        .iter()
        .filter_map(|k| {
            if *k == "H/L" {
                Some(format!("[H/L] scrub -/+{}s", scrub_seconds))
            } else {
                CONTROLS_MAP.get(*k).map(|v| format!("[{}] {}", k, v))
            }
        })
        .collect::<Vec<String>>()
        .join(" | ")
}

/// What the player bar renders.
pub struct PlayerView<'a> {
    pub state: &'a PlayerState,
    pub progress: &'a Progress,
    pub duration: &'a str,
}

fn volume_percent(volume: f32) -> u16 {
    (volume.clamp(0.0, 1.0) * 100.0).round() as u16
}

/// Visible window `[start, end)` of `total` rows keeping `cursor` centered.
fn list_window(total: usize, height: usize, cursor: usize) -> (usize, usize) {
    if total <= height || height == 0 {
        return (0, total);
    }
    let half = height / 2;
    let mut start = cursor.saturating_sub(half);
    if start + height > total {
        start = total - height;
    }
    (start, start + height)
}

fn padded_block(title: &str) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .title(title)
        .padding(Padding {
            left: 1,
            right: 1,
            top: 0,
            bottom: 0,
        })
}

/// Render the entire UI and return the clickable regions.
pub fn draw(
    frame: &mut Frame,
    app: &App,
    player: &PlayerView,
    ui_settings: &UiSettings,
    controls_settings: &ControlsSettings,
) -> HitAreas {
    let mut hits = HitAreas::default();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(5),
            Constraint::Length(4),
        ])
        .split(frame.area());

    draw_search(frame, app, ui_settings, chunks[0]);
    draw_results(frame, app, player.state, chunks[1], &mut hits);
    draw_player(frame, player, chunks[2], &mut hits);

    let footer = Paragraph::new(controls_text(controls_settings.scrub_seconds))
        .block(padded_block(" controls "))
        .wrap(Wrap { trim: true });
    frame.render_widget(footer, chunks[3]);

    if app.volume_panel.is_visible() {
        draw_volume_panel(frame, player.state.volume, chunks[2], &mut hits);
    }

    hits
}

fn draw_search(frame: &mut Frame, app: &App, ui_settings: &UiSettings, area: Rect) {
    let title = match app.status {
        SearchStatus::Loaded(n) => format!(" riffle ({n}) "),
        _ => " riffle ".to_string(),
    };

    let line = match app.input_mode {
        InputMode::Query => Line::from(vec![
            Span::styled("search: ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(app.query.as_str()),
            Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK)),
        ]),
        InputMode::Normal if !app.query.trim().is_empty() => Line::from(vec![
            Span::styled("search: ", Style::default().add_modifier(Modifier::DIM)),
            Span::raw(app.query.as_str()),
        ]),
        InputMode::Normal => Line::from(ui_settings.header_text.as_str()),
    };

    let header = Paragraph::new(line).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .title(title)
            .title_alignment(Alignment::Center),
    );
    frame.render_widget(header, area);
}

fn draw_results(
    frame: &mut Frame,
    app: &App,
    state: &PlayerState,
    area: Rect,
    hits: &mut HitAreas,
) {
    let mut title = vec![Span::raw(match &app.last_query {
        Some(q) => format!(" tracks: {} ", q.describe()),
        None => " tracks ".to_string(),
    })];
    if app.sort != SortField::Catalog {
        title.push(Span::styled(
            format!("[by {}] ", app.sort.label()),
            Style::default().add_modifier(Modifier::DIM),
        ));
    }
    // Old results stay listed after a failure, so say so in the title.
    let stale = app.status == SearchStatus::Failed && !app.results.is_empty();
    if let Some(msg) = app.status.message().filter(|_| stale) {
        title.push(Span::styled(format!("{msg} "), Style::default().fg(Color::Red)));
    }
    let block = Block::default().borders(Borders::ALL).title(Line::from(title));

    if app.results.is_empty() || app.status == SearchStatus::Fetching {
        let text = app
            .status
            .message()
            .unwrap_or("Press / and type a song or artist");
        let msg = Paragraph::new(text)
            .alignment(Alignment::Center)
            .block(block)
            .wrap(Wrap { trim: true });
        frame.render_widget(msg, area);
        return;
    }

    let inner = block.inner(area);
    let total = app.results.len();
    let (start, end) = list_window(total, inner.height as usize, app.cursor);

    let items: Vec<ListItem> = app
        .view()
        .skip(start)
        .take(end - start)
        .enumerate()
        .map(|(offset, (_, track))| {
            let n = start + offset + 1;
            let marker = match state.track(track.id) {
                Some(t) if t.is_playing => "▶ ",
                _ if state.selection.id == Some(track.id) => "⏸ ",
                _ => "  ",
            };
            let album = track
                .album
                .as_deref()
                .map(|a| format!("  ({a})"))
                .unwrap_or_default();
            let length = track
                .track_time_millis
                .map(|ms| format!("  {}", format_millis(Some(ms))))
                .unwrap_or_default();
            ListItem::new(Line::from(vec![
                Span::raw(marker),
                Span::raw(format!("{n}. {}", track.display())),
                Span::styled(album, Style::default().add_modifier(Modifier::DIM)),
                Span::styled(length, Style::default().add_modifier(Modifier::DIM)),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    let mut list_state = ratatui::widgets::ListState::default();
    list_state.select(Some(app.cursor.saturating_sub(start)));
    frame.render_stateful_widget(list, area, &mut list_state);

    hits.list = Some(Bounds::from(inner));
    hits.list_offset = start;
}

fn draw_player(frame: &mut Frame, player: &PlayerView, area: Rect, hits: &mut HitAreas) {
    let state = player.state;
    let block = padded_block(" player ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(inner);

    let now_playing = match state.selected_track() {
        Some(track) => {
            let icon = if state.is_playing { "▶" } else { "⏸" };
            format!("{icon} {}", track.title)
        }
        None if state.is_empty() => "Nothing to play".to_string(),
        None => "Pick a track and press enter".to_string(),
    };
    frame.render_widget(
        Paragraph::new(now_playing).style(Style::default().add_modifier(Modifier::BOLD)),
        rows[0],
    );

    let gauge = LineGauge::default()
        .ratio(player.progress.fraction.clamp(0.0, 1.0))
        .filled_style(Style::default().fg(Color::Cyan))
        .unfilled_style(Style::default().fg(Color::DarkGray));
    frame.render_widget(gauge, rows[1]);
    hits.progress = Some(Bounds::from(rows[1]));

    let volume_label = format!("[vol {}%]", volume_percent(state.volume));
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(volume_label.chars().count() as u16),
        ])
        .split(rows[2]);

    let times = format!("{} / {}", player.progress.elapsed, player.duration);
    frame.render_widget(Paragraph::new(times), cols[0]);
    frame.render_widget(
        Paragraph::new(volume_label).alignment(Alignment::Right),
        cols[1],
    );
    hits.volume_toggle = Some(Bounds::from(cols[1]));
}

fn draw_volume_panel(frame: &mut Frame, volume: f32, player_area: Rect, hits: &mut HitAreas) {
    let width = 32.min(player_area.width);
    let height = 3;
    let panel = Rect {
        x: player_area.x + player_area.width.saturating_sub(width),
        y: player_area.y.saturating_sub(height),
        width,
        height,
    };
    frame.render_widget(Clear, panel);

    let block = Block::default().borders(Borders::ALL).title(" volume ");
    let inner = block.inner(panel);
    frame.render_widget(block, panel);

    let gauge = Gauge::default()
        .ratio(f64::from(volume.clamp(0.0, 1.0)))
        .label(format!("{}%", volume_percent(volume)))
        .gauge_style(Style::default().fg(Color::Cyan));
    frame.render_widget(gauge, inner);

    hits.volume_panel = Some(Bounds::from(panel));
    hits.volume_slider = Some(Bounds::from(inner));
}
