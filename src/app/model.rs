//! Application model: `App` and the input/pointer state around it.
//!
//! The `App` struct holds the current catalog results, the cursor, the query
//! being typed and the on-screen geometry recorded by the last draw. Playback
//! state itself lives in the player store; `App` only mirrors what the UI
//! needs to decide where input goes.

use crate::catalog::{CatalogTrack, Query, SearchStatus};
use crate::player::transport::{Bounds, Popover, VolumeDrag};

/// Where keystrokes go.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Normal,
    /// Typing into the search field.
    Query,
}

/// Screen regions recorded by the last draw, used for mouse hit-testing.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct HitAreas {
    pub progress: Option<Bounds>,
    pub volume_toggle: Option<Bounds>,
    pub volume_panel: Option<Bounds>,
    pub volume_slider: Option<Bounds>,
    /// Inner area of the result list.
    pub list: Option<Bounds>,
    /// Index of the first visible list row.
    pub list_offset: usize,
}

/// Field the result list is ordered by. The player's playlist keeps the
/// catalog order regardless.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum SortField {
    /// As the catalog returned them.
    #[default]
    Catalog,
    Title,
    Artist,
    Album,
    Genre,
}

impl SortField {
    /// Next field in the cycle, wrapping back to catalog order.
    pub fn next(self) -> Self {
        match self {
            SortField::Catalog => SortField::Title,
            SortField::Title => SortField::Artist,
            SortField::Artist => SortField::Album,
            SortField::Album => SortField::Genre,
            SortField::Genre => SortField::Catalog,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortField::Catalog => "catalog",
            SortField::Title => "title",
            SortField::Artist => "artist",
            SortField::Album => "album",
            SortField::Genre => "genre",
        }
    }

    /// Sort key; tracks missing the field go last.
    fn key(self, track: &CatalogTrack) -> (bool, String) {
        let value = match self {
            SortField::Catalog => None,
            SortField::Title => Some(track.title.as_str()),
            SortField::Artist => Some(track.artist.as_str()),
            SortField::Album => track.album.as_deref(),
            SortField::Genre => track.genre.as_deref(),
        }
        .filter(|v| !v.is_empty());
        (value.is_none(), value.unwrap_or_default().to_lowercase())
    }
}

/// What a pointer press landed on.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum PointerTarget {
    Progress,
    VolumeSlider,
    VolumeToggle,
    /// A result row, by position in the sorted view.
    Row(usize),
    Nothing,
}

/// The main application model.
pub struct App {
    /// Playable results, in the same order as the player's playlist.
    pub results: Vec<CatalogTrack>,
    /// View position -> index into `results`.
    order: Vec<usize>,
    pub sort: SortField,
    /// Position in the sorted view.
    pub cursor: usize,
    pub input_mode: InputMode,
    pub query: String,
    /// Query whose results are on screen.
    pub last_query: Option<Query>,
    /// Query in flight.
    pub pending_query: Option<Query>,
    pub status: SearchStatus,

    /// Whether the cursor jumps to the track the player moves to.
    pub follow_playback: bool,

    pub volume_panel: Popover,
    pub volume_drag: VolumeDrag,
    pub hits: HitAreas,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    pub fn new() -> Self {
        Self {
            results: Vec::new(),
            order: Vec::new(),
            sort: SortField::default(),
            cursor: 0,
            input_mode: InputMode::Normal,
            query: String::new(),
            last_query: None,
            pending_query: None,
            status: SearchStatus::Idle,
            follow_playback: true,
            volume_panel: Popover::default(),
            volume_drag: VolumeDrag::default(),
            hits: HitAreas::default(),
        }
    }

    pub fn has_tracks(&self) -> bool {
        !self.results.is_empty()
    }

    pub fn cursor_track(&self) -> Option<&CatalogTrack> {
        self.track_at(self.cursor)
    }

    /// Track at a position of the sorted view.
    pub fn track_at(&self, view: usize) -> Option<&CatalogTrack> {
        self.order.get(view).and_then(|&i| self.results.get(i))
    }

    /// Results in view order, each with its playlist index.
    pub fn view(&self) -> impl Iterator<Item = (usize, &CatalogTrack)> {
        self.order.iter().map(|&i| (i, &self.results[i]))
    }

    /// View position of the track at `playlist_index`.
    pub fn view_index_of(&self, playlist_index: usize) -> Option<usize> {
        self.order.iter().position(|&i| i == playlist_index)
    }

    fn apply_sort(&mut self) {
        let mut order: Vec<usize> = (0..self.results.len()).collect();
        if self.sort != SortField::Catalog {
            let sort = self.sort;
            // Stable, so ties keep catalog order.
            order.sort_by_cached_key(|&i| sort.key(&self.results[i]));
        }
        self.order = order;
    }

    /// Switch to the next sort field, keeping the cursor on the same track.
    pub fn cycle_sort(&mut self) {
        let current = self.order.get(self.cursor).copied();
        self.sort = self.sort.next();
        self.apply_sort();
        self.cursor = current
            .and_then(|i| self.view_index_of(i))
            .unwrap_or(0);
    }

    /// Replace the result list after a successful request for `query`.
    pub fn set_results(&mut self, query: Query, results: Vec<CatalogTrack>) {
        self.status = SearchStatus::from_count(results.len());
        self.results = results;
        self.apply_sort();
        self.last_query = Some(query);
        self.pending_query = None;
        self.cursor = 0;
        self.follow_playback = true;
    }

    /// A request was sent for `query`.
    pub fn start_fetch(&mut self, query: Query) {
        self.pending_query = Some(query);
        self.status = SearchStatus::Fetching;
    }

    /// The latest request failed; results and their query stay as they were.
    pub fn fetch_failed(&mut self) {
        self.pending_query = None;
        self.status = SearchStatus::Failed;
    }

    pub fn next(&mut self) {
        if self.has_tracks() {
            self.cursor = (self.cursor + 1).min(self.results.len() - 1);
        }
    }

    pub fn prev(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn first(&mut self) {
        self.cursor = 0;
    }

    pub fn last(&mut self) {
        self.cursor = self.results.len().saturating_sub(1);
    }

    pub fn set_cursor(&mut self, index: usize) {
        if index < self.results.len() {
            self.cursor = index;
        }
    }

    /// Enable following playback (cursor follows the selected track).
    pub fn follow_playback_on(&mut self) {
        self.follow_playback = true;
    }

    /// Stop moving the cursor along with playback.
    pub fn follow_playback_off(&mut self) {
        self.follow_playback = false;
    }

    pub fn enter_query_mode(&mut self) {
        self.input_mode = InputMode::Query;
    }

    pub fn exit_query_mode(&mut self) {
        self.input_mode = InputMode::Normal;
    }

    pub fn push_query_char(&mut self, c: char) {
        self.query.push(c);
    }

    pub fn pop_query_char(&mut self) {
        self.query.pop();
    }

    /// Leave query mode and return the term to search for, if any.
    pub fn submit_query(&mut self) -> Option<Query> {
        let term = self.query.trim();
        if term.is_empty() {
            return None;
        }
        let query = Query::Search(term.to_string());
        self.exit_query_mode();
        Some(query)
    }

    /// Album lookup for the track under the cursor.
    pub fn album_query(&self) -> Option<Query> {
        self.cursor_track()
            .and_then(|t| t.collection_id)
            .map(Query::Album)
    }

    /// Global pointer-down: resolve the target, dismiss the volume panel when
    /// the press is outside it and start or end a volume drag.
    pub fn pointer_down(&mut self, x: f64, y: f64) -> PointerTarget {
        let target = self.pointer_target(x, y);
        self.dismiss_volume_panel(x, y);
        if target == PointerTarget::VolumeSlider {
            self.volume_drag.pointer_down();
        } else {
            // The release of an earlier drag may have been lost.
            self.volume_drag.pointer_up();
        }
        target
    }

    /// Resolve a pointer press against the last drawn layout.
    ///
    /// The volume panel sits on top of everything else, so it is checked first.
    pub fn pointer_target(&self, x: f64, y: f64) -> PointerTarget {
        let hits = &self.hits;
        if self.volume_panel.is_visible() && hits.volume_slider.is_some_and(|b| b.contains(x, y)) {
            return PointerTarget::VolumeSlider;
        }
        if hits.volume_toggle.is_some_and(|b| b.contains(x, y)) {
            return PointerTarget::VolumeToggle;
        }
        if hits.progress.is_some_and(|b| b.contains(x, y)) {
            return PointerTarget::Progress;
        }
        if let Some(list) = hits.list.filter(|b| b.contains(x, y)) {
            let row = (y - list.top).floor() as usize + hits.list_offset;
            if row < self.results.len() {
                return PointerTarget::Row(row);
            }
        }
        PointerTarget::Nothing
    }

    /// Global pointer-down handling for the volume popover.
    ///
    /// Returns `true` if the press closed the panel.
    pub fn dismiss_volume_panel(&mut self, x: f64, y: f64) -> bool {
        let toggle = self.hits.volume_toggle.unwrap_or_default();
        let panel = self.hits.volume_panel.unwrap_or_default();
        self.volume_panel
            .on_global_pointer_down(x, y, &toggle, &panel)
    }
}
