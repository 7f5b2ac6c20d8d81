//! Text selection inside rendered messages and the branch affordance anchored
//! to it.
//!
//! Positions come in two spaces. Screen [`Position`]s are terminal cells as
//! reported by mouse events. [`CellPos`] values are transcript cells: column
//! from the pane's left edge and row from the top of the whole transcript,
//! so they stay meaningful for rows scrolled out of view.

pub mod affordance;
pub mod bus;
pub mod tracker;

use ratatui::layout::{Position, Rect};

use crate::conversation::Role;

pub use affordance::{AffordanceView, BranchAffordance, Disposition, AFFORDANCE_LABEL};
pub use bus::SelectionBus;
pub use tracker::SelectionTracker;

/// Rows between the affordance and the first selected row.
pub const ANCHOR_GAP: i32 = 1;

/// A caret position: a message and a character offset into its plain text.
///
/// Ordering follows reading order, message first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SelectionPoint {
    pub message: usize,
    pub offset: usize,
}

impl SelectionPoint {
    pub fn new(message: usize, offset: usize) -> Self {
        Self { message, offset }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionRange {
    pub anchor: SelectionPoint,
    pub focus: SelectionPoint,
}

impl SelectionRange {
    pub fn new(anchor: SelectionPoint, focus: SelectionPoint) -> Self {
        Self { anchor, focus }
    }

    pub fn collapsed(point: SelectionPoint) -> Self {
        Self::new(point, point)
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    /// `(start, end)` in reading order regardless of drag direction.
    pub fn normalized(&self) -> (SelectionPoint, SelectionPoint) {
        if self.anchor <= self.focus {
            (self.anchor, self.focus)
        } else {
            (self.focus, self.anchor)
        }
    }

    fn contains_point(&self, point: SelectionPoint) -> bool {
        let (start, end) = self.normalized();
        start <= point && point <= end
    }

    /// Whether `other` lies entirely inside this range.
    pub fn contains_range(&self, other: &SelectionRange) -> bool {
        let (start, end) = other.normalized();
        self.contains_point(start) && self.contains_point(end)
    }
}

/// A transcript cell, see the module docs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CellPos {
    pub x: i32,
    pub y: i32,
}

/// Where the affordance sits, relative to the owning message's box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorPosition {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionContext {
    pub owner: usize,
    pub anchor: AnchorPosition,
    pub selected_text: String,
}

/// What the selection layer needs from whatever draws the messages.
pub trait SelectionHost {
    fn selection(&self) -> Option<SelectionRange>;
    fn set_selection(&mut self, range: Option<SelectionRange>);
    fn selected_text(&self, range: &SelectionRange) -> String;

    /// Caret under `pos` when it lies on a message's text, `None` elsewhere.
    fn hit_test(&self, pos: Position) -> Option<SelectionPoint>;
    /// Caret nearest to `pos`, used while dragging past text edges.
    fn nearest_point(&self, pos: Position) -> Option<SelectionPoint>;

    /// The full range of a message's text.
    fn message_extent(&self, message: usize) -> Option<SelectionRange>;
    /// Top-left cell of a message's text box.
    fn message_origin(&self, message: usize) -> Option<CellPos>;
    /// Cell holding the character at `point`.
    fn point_cell(&self, point: SelectionPoint) -> Option<CellPos>;

    fn message_role(&self, message: usize) -> Option<Role>;
    fn is_pending(&self, message: usize) -> bool;

    fn viewport(&self) -> Rect;
    /// Screen position of a transcript cell, `None` when scrolled out of view.
    fn to_screen(&self, cell: CellPos) -> Option<Position>;
}
