use ratatui::layout::{Position, Rect};
use tokio::sync::watch;
use unicode_width::UnicodeWidthStr;

use super::{CellPos, SelectionBus, SelectionContext, SelectionHost};

pub const AFFORDANCE_LABEL: &str = " ⑂ Branch ";

/// Whether a pointer event was taken by the affordance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Consumed,
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffordanceView {
    pub owner: usize,
    pub area: Rect,
}

/// The "branch from this selection" control.
///
/// It exists on screen only while the bus holds a context. Presses on it are
/// swallowed so the pane's own "press outside clears" handling never sees
/// them, and a completed click confirms the branch.
pub struct BranchAffordance {
    context: watch::Receiver<Option<SelectionContext>>,
    armed: bool,
}

impl BranchAffordance {
    pub fn new(bus: &SelectionBus) -> Self {
        Self {
            context: bus.subscribe(),
            armed: false,
        }
    }

    pub fn context(&self) -> Option<SelectionContext> {
        self.context.borrow().clone()
    }

    /// Screen area of the control, `None` when nothing should be drawn.
    pub fn view<H: SelectionHost + ?Sized>(&self, host: &H) -> Option<AffordanceView> {
        let context = self.context()?;
        let origin = host.message_origin(context.owner)?;
        let cell = CellPos {
            x: origin.x + context.anchor.x,
            y: origin.y + context.anchor.y,
        };

        let viewport = host.viewport();
        let width = (AFFORDANCE_LABEL.width() as u16).min(viewport.width);
        let screen = host.to_screen(cell).or_else(|| {
            // Anchor row scrolled out of view: sit on the selection's own row.
            host.to_screen(CellPos { x: cell.x, y: cell.y + 1 })
        })?;

        let max_x = viewport.x + viewport.width.saturating_sub(width);
        Some(AffordanceView {
            owner: context.owner,
            area: Rect::new(screen.x.min(max_x), screen.y, width, 1),
        })
    }

    pub fn hit<H: SelectionHost + ?Sized>(&self, host: &H, pos: Position) -> bool {
        self.view(host).is_some_and(|view| view.area.contains(pos))
    }

    pub fn pointer_down<H: SelectionHost + ?Sized>(&mut self, host: &H, pos: Position) -> Disposition {
        self.armed = self.hit(host, pos);
        if self.armed {
            Disposition::Consumed
        } else {
            Disposition::Ignored
        }
    }

    /// Completes a click when the press also started on the control.
    pub fn pointer_up<H, F>(&mut self, host: &mut H, pos: Position, on_confirm: F) -> Disposition
    where
        H: SelectionHost + ?Sized,
        F: FnOnce(&str),
    {
        let was_armed = std::mem::take(&mut self.armed);
        if !self.hit(host, pos) {
            return Disposition::Ignored;
        }
        if was_armed {
            self.activate(host, on_confirm);
        }
        Disposition::Consumed
    }

    /// Confirms the branch: hands the selected text to `on_confirm` and puts
    /// back the selection that was live before, so it stays highlighted.
    pub fn activate<H, F>(&self, host: &mut H, on_confirm: F) -> bool
    where
        H: SelectionHost + ?Sized,
        F: FnOnce(&str),
    {
        let Some(context) = self.context() else {
            return false;
        };
        if context.selected_text.trim().is_empty() {
            return false;
        }

        let saved = host.selection();
        on_confirm(&context.selected_text);
        host.set_selection(saved);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Message;
    use crate::layout::ChatSurface;
    use crate::selection::SelectionTracker;

    fn selected() -> (ChatSurface, SelectionTracker, BranchAffordance) {
        let messages = vec![Message::user("q"), Message::assistant("Hello world")];
        let mut surface = ChatSurface::default();
        surface.layout(&messages, Rect::new(2, 1, 40, 20), 0);

        let bus = SelectionBus::new();
        let mut tracker = SelectionTracker::new(bus.clone(), true);
        let affordance = BranchAffordance::new(&bus);

        // Message 1 text starts on transcript row 4, screen row 5.
        tracker.pointer_down(&mut surface, Position::new(8, 5));
        tracker.pointer_up(&mut surface, Position::new(13, 5)).unwrap();
        (surface, tracker, affordance)
    }

    #[test]
    fn test_nothing_rendered_without_context() {
        let messages = vec![Message::assistant("Hello")];
        let mut surface = ChatSurface::default();
        surface.layout(&messages, Rect::new(0, 0, 40, 10), 0);
        let affordance = BranchAffordance::new(&SelectionBus::new());

        assert!(affordance.view(&surface).is_none());
        assert!(!affordance.hit(&surface, Position::new(0, 0)));
    }

    #[test]
    fn test_view_sits_one_row_above_selection_start() {
        let (surface, _tracker, affordance) = selected();
        let view = affordance.view(&surface).unwrap();
        assert_eq!(view.owner, 1);
        assert_eq!(view.area.y, 4);
        assert_eq!(view.area.x, 8);
    }

    #[test]
    fn test_click_confirms_and_restores_selection() {
        let (mut surface, tracker, mut affordance) = selected();
        let before = surface.selection();
        let area = affordance.view(&surface).unwrap().area;
        let pos = Position::new(area.x + 1, area.y);

        assert_eq!(affordance.pointer_down(&surface, pos), Disposition::Consumed);
        assert!(tracker.context().is_some());

        let mut confirmed = Vec::new();
        let disposition = affordance.pointer_up(&mut surface, pos, |text| {
            confirmed.push(text.to_string())
        });

        assert_eq!(disposition, Disposition::Consumed);
        assert_eq!(confirmed, vec!["world".to_string()]);
        assert_eq!(surface.selection(), before);
    }

    #[test]
    fn test_release_without_press_does_not_confirm() {
        let (mut surface, _tracker, mut affordance) = selected();
        let area = affordance.view(&surface).unwrap().area;
        let pos = Position::new(area.x, area.y);

        let mut calls = 0;
        affordance.pointer_up(&mut surface, pos, |_| calls += 1);
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_press_elsewhere_is_ignored() {
        let (surface, _tracker, mut affordance) = selected();
        assert_eq!(
            affordance.pointer_down(&surface, Position::new(39, 18)),
            Disposition::Ignored
        );
    }

    #[test]
    fn test_disappears_when_context_clears() {
        let (mut surface, mut tracker, affordance) = selected();
        tracker.clear(&mut surface);
        assert!(affordance.view(&surface).is_none());
    }
}
