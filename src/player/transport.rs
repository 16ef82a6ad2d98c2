//! Transport controls: skip arithmetic, pointer geometry, the volume drag
//! state machine and popover dismissal.
//!
//! Nothing here touches the engine. These helpers turn gestures into
//! numbers (an index, a fraction, a volume) that the player then dispatches.

/// Skip direction.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
    Prev,
    Next,
}

/// Target index for a circular skip, or `None` on an empty playlist.
pub fn skip_target(index: usize, len: usize, direction: Direction) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let index = index % len;
    Some(match direction {
        Direction::Next => (index + 1) % len,
        Direction::Prev => (index + len - 1) % len,
    })
}

/// Axis-aligned bounding box of an on-screen element.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Bounds {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.left && x < self.left + self.width && y >= self.top && y < self.top + self.height
    }

    /// Horizontal position of `x` inside the box, clamped to `[0, 1]`.
    ///
    /// Degenerate (zero or negative width) boxes yield `0`.
    pub fn fraction_at(&self, x: f64) -> f64 {
        if !(self.width > 0.0) || !x.is_finite() {
            return 0.0;
        }
        ((x - self.left) / self.width).clamp(0.0, 1.0)
    }
}

impl From<ratatui::layout::Rect> for Bounds {
    fn from(r: ratatui::layout::Rect) -> Self {
        Self::new(
            f64::from(r.x),
            f64::from(r.y),
            f64::from(r.width),
            f64::from(r.height),
        )
    }
}

/// Fraction of the track bar under the pointer.
pub fn seek_fraction_from_pointer(x: f64, bar: &Bounds) -> f64 {
    bar.fraction_at(x)
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging,
}

/// Volume slider drag tracking.
///
/// Moves keep producing values while dragging even when the pointer leaves
/// the slider; the value is clamped to the slider's extent instead.
#[derive(Debug, Default)]
pub struct VolumeDrag {
    state: DragState,
}

impl VolumeDrag {
    pub fn is_dragging(&self) -> bool {
        self.state == DragState::Dragging
    }

    /// Pointer pressed on the slider handle.
    pub fn pointer_down(&mut self) {
        self.state = DragState::Dragging;
    }

    /// Pointer released anywhere.
    pub fn pointer_up(&mut self) {
        self.state = DragState::Idle;
    }

    /// Pointer (or touch) moved. Returns the new volume while dragging.
    pub fn pointer_move(&self, x: f64, slider: &Bounds) -> Option<f32> {
        if !self.is_dragging() {
            return None;
        }
        Some(slider.fraction_at(x) as f32)
    }
}

/// Visibility of a popover panel toggled by a button.
#[derive(Debug, Default)]
pub struct Popover {
    visible: bool,
}

impl Popover {
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn toggle(&mut self) {
        self.visible = !self.visible;
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }

    /// Global pointer-down: close when the press lands outside both the
    /// toggle button and the panel. Returns `true` if it closed.
    pub fn on_global_pointer_down(&mut self, x: f64, y: f64, toggle: &Bounds, panel: &Bounds) -> bool {
        if self.visible && !toggle.contains(x, y) && !panel.contains(x, y) {
            self.visible = false;
            return true;
        }
        false
    }
}
