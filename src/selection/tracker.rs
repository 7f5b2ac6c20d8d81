use ratatui::layout::Position;
use tracing::debug;

use super::{AnchorPosition, SelectionBus, SelectionContext, SelectionHost, SelectionRange, ANCHOR_GAP};
use crate::conversation::Role;

/// Turns pointer gestures over one pane into selection contexts.
///
/// The tracker knows nothing about conversations. It asks the host for
/// geometry and roles and publishes a context on its bus when a selection
/// qualifies for branching.
pub struct SelectionTracker {
    bus: SelectionBus,
    branching: bool,
    dragging: bool,
}

impl SelectionTracker {
    /// `branching` is false for panes whose messages may not be branched from.
    pub fn new(bus: SelectionBus, branching: bool) -> Self {
        Self {
            bus,
            branching,
            dragging: false,
        }
    }

    pub fn bus(&self) -> &SelectionBus {
        &self.bus
    }

    pub fn context(&self) -> Option<SelectionContext> {
        self.bus.current()
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Starts a new selection at `pos`. A press outside the context's owner
    /// message clears the context.
    pub fn pointer_down<H: SelectionHost + ?Sized>(&mut self, host: &mut H, pos: Position) {
        let hit = host.hit_test(pos);

        if let Some(context) = self.bus.current() {
            if hit.map(|p| p.message) != Some(context.owner) {
                self.bus.clear();
            }
        }

        self.dragging = hit.is_some();
        host.set_selection(hit.map(SelectionRange::collapsed));
        self.selection_changed(host);
    }

    pub fn pointer_drag<H: SelectionHost + ?Sized>(&mut self, host: &mut H, pos: Position) {
        if !self.dragging {
            return;
        }
        let (Some(point), Some(mut range)) = (host.nearest_point(pos), host.selection()) else {
            return;
        };
        range.focus = point;
        host.set_selection(Some(range));
        self.selection_changed(host);
    }

    /// Ends the gesture and decides whether the result qualifies.
    pub fn pointer_up<H: SelectionHost + ?Sized>(
        &mut self,
        host: &mut H,
        pos: Position,
    ) -> Option<SelectionContext> {
        if !self.dragging {
            return None;
        }
        self.pointer_drag(host, pos);
        self.dragging = false;
        self.evaluate(host)
    }

    /// Re-checks the live context after any change to the host selection.
    pub fn selection_changed<H: SelectionHost + ?Sized>(&mut self, host: &H) {
        let Some(context) = self.bus.current() else {
            return;
        };

        let still_valid = host.selection().is_some_and(|range| {
            host.message_extent(context.owner)
                .is_some_and(|extent| extent.contains_range(&range))
                && !host.selected_text(&range).trim().is_empty()
        });

        if !still_valid {
            self.bus.clear();
        }
    }

    /// Publishes a context for the current host selection, or clears it.
    pub fn evaluate<H: SelectionHost + ?Sized>(&mut self, host: &H) -> Option<SelectionContext> {
        match self.qualify(host) {
            Some(context) => {
                debug!(
                    owner = context.owner,
                    chars = context.selected_text.chars().count(),
                    "selection qualifies for branching"
                );
                self.bus.publish(context.clone());
                Some(context)
            }
            None => {
                self.bus.clear();
                None
            }
        }
    }

    /// Drops the selection and any context.
    pub fn clear<H: SelectionHost + ?Sized>(&mut self, host: &mut H) {
        self.dragging = false;
        host.set_selection(None);
        self.bus.clear();
    }

    fn qualify<H: SelectionHost + ?Sized>(&self, host: &H) -> Option<SelectionContext> {
        if !self.branching {
            return None;
        }

        let range = host.selection()?;
        let (start, _) = range.normalized();
        let owner = start.message;

        if host.message_role(owner)? != Role::Assistant || host.is_pending(owner) {
            return None;
        }
        if !host.message_extent(owner)?.contains_range(&range) {
            return None;
        }

        let selected_text = host.selected_text(&range).trim().to_string();
        if selected_text.is_empty() {
            return None;
        }

        let origin = host.message_origin(owner)?;
        let cell = host.point_cell(start)?;

        Some(SelectionContext {
            owner,
            anchor: AnchorPosition {
                x: cell.x - origin.x,
                y: cell.y - origin.y - ANCHOR_GAP,
            },
            selected_text,
        })
    }
}
