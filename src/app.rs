use std::time::Duration;

use ratatui::layout::{Position, Rect};
use tokio::sync::mpsc;
use tracing::debug;

use crate::conversation::{
    ControllerUpdate, ConversationController, MessageThread, SendRejected, ThreadTarget,
};
use crate::layout::ChatSurface;
use crate::selection::{
    BranchAffordance, Disposition, SelectionBus, SelectionHost, SelectionTracker,
};
use crate::tui::AppEvent;

/// How long a selection restored after branching stays highlighted.
pub const SELECTION_GRACE: Duration = Duration::from_millis(150);

/// Rows moved per mouse wheel notch.
pub const WHEEL_STEP: u16 = 3;

/// One chat pane: its geometry, selection state and scroll position.
pub struct PaneView {
    pub surface: ChatSurface,
    pub tracker: SelectionTracker,
    pub scroll: u16,
    /// Stick to the newest row as content grows.
    pub follow_tail: bool,
    /// Outer (bordered) area, updated during render.
    pub area: Option<Rect>,
}

impl PaneView {
    fn new(bus: SelectionBus, branching: bool) -> Self {
        Self {
            surface: ChatSurface::default(),
            tracker: SelectionTracker::new(bus, branching),
            scroll: 0,
            follow_tail: true,
            area: None,
        }
    }

    pub fn layout(&mut self, thread: &MessageThread, viewport: Rect, animation_frame: u8) {
        self.surface.set_animation_frame(animation_frame);
        let scroll = if self.follow_tail { u16::MAX } else { self.scroll };
        self.surface.layout(thread.messages(), viewport, scroll);
        self.scroll = self.surface.scroll();
        self.tracker.selection_changed(&self.surface);
    }

    pub fn contains(&self, pos: Position) -> bool {
        self.area.is_some_and(|area| area.contains(pos))
    }

    pub fn scroll_up(&mut self, rows: u16) {
        self.scroll = self.scroll.saturating_sub(rows);
        self.follow_tail = false;
    }

    pub fn scroll_down(&mut self, rows: u16) {
        let max = self.surface.max_scroll();
        self.scroll = self.scroll.saturating_add(rows).min(max);
        self.follow_tail = self.scroll >= max;
    }

    pub fn page(&self) -> u16 {
        self.surface.viewport().height.max(1)
    }

    fn reset(&mut self) {
        self.tracker.clear(&mut self.surface);
        self.scroll = 0;
        self.follow_tail = true;
    }
}

pub struct App {
    pub should_quit: bool,
    pub focus: ThreadTarget,

    // Input box
    pub input: String,
    pub input_cursor: usize, // in chars

    pub controller: ConversationController,
    pub model: String,

    pub main_view: PaneView,
    pub branch_view: PaneView,
    pub affordance: BranchAffordance,

    /// Last backend error, shown on the status line until the next success.
    pub status: Option<String>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Button areas for mouse hit-testing (updated during render)
    pub new_chat_area: Option<Rect>,
    pub close_area: Option<Rect>,

    events: mpsc::UnboundedSender<AppEvent>,
    grace_token: u64,
}

impl App {
    pub fn new(
        controller: ConversationController,
        model: impl Into<String>,
        events: mpsc::UnboundedSender<AppEvent>,
    ) -> Self {
        let bus = SelectionBus::new();
        let affordance = BranchAffordance::new(&bus);

        Self {
            should_quit: false,
            focus: ThreadTarget::Main,
            input: String::new(),
            input_cursor: 0,
            controller,
            model: model.into(),
            main_view: PaneView::new(bus, true),
            // Branch replies are read-only context, no nested branching
            branch_view: PaneView::new(SelectionBus::new(), false),
            affordance,
            status: None,
            animation_frame: 0,
            new_chat_area: None,
            close_area: None,
            events,
            grace_token: 0,
        }
    }

    pub fn thread(&self, target: ThreadTarget) -> Option<&MessageThread> {
        self.controller.store().conversation().thread(target)
    }

    pub fn has_branch(&self) -> bool {
        self.controller.store().conversation().branch().is_some()
    }

    pub fn branch_is_open(&self) -> bool {
        self.controller
            .store()
            .conversation()
            .branch()
            .is_some_and(|branch| !branch.is_closing())
    }

    /// The focused thread is waiting on a reply, so the input is locked.
    pub fn input_locked(&self) -> bool {
        self.controller.store().is_loading(self.focus)
    }

    pub fn view_mut(&mut self, target: ThreadTarget) -> &mut PaneView {
        match target {
            ThreadTarget::Main => &mut self.main_view,
            ThreadTarget::Branch => &mut self.branch_view,
        }
    }

    /// Lays both panes out for this frame. `branch` is `None` when no branch
    /// pane is shown.
    pub fn layout_panes(&mut self, main: Rect, branch: Option<Rect>) {
        let frame = self.animation_frame;
        let conversation = self.controller.store().conversation();

        self.main_view.layout(conversation.main(), main, frame);
        if let (Some(area), Some(open)) = (branch, conversation.branch()) {
            self.branch_view.layout(open.thread(), area, frame);
        }
    }

    pub fn submit(&mut self) {
        if self.focus == ThreadTarget::Branch && !self.has_branch() {
            self.focus = ThreadTarget::Main;
        }

        let target = self.focus;
        match self.controller.send_message(target, &self.input) {
            Ok(()) => {
                self.input.clear();
                self.input_cursor = 0;
                self.status = None;
                self.view_mut(target).follow_tail = true;
            }
            Err(SendRejected::EmptyInput) => {}
            Err(reason) => debug!(thread = target.label(), %reason, "send rejected"),
        }
    }

    /// Confirms the visible affordance from the keyboard.
    pub fn confirm_branch(&mut self) -> bool {
        if self.affordance.view(&self.main_view.surface).is_none() {
            return false;
        }

        let mut selected = None;
        let activated = self
            .affordance
            .activate(&mut self.main_view.surface, |text| selected = Some(text.to_string()));

        match selected {
            Some(text) if activated => self.open_branch(&text),
            _ => false,
        }
    }

    fn open_branch(&mut self, selected: &str) -> bool {
        match self.controller.create_branch(selected) {
            Ok(()) => {
                self.branch_view.reset();
                self.focus = ThreadTarget::Branch;
                self.status = None;
                self.schedule_selection_grace();
                true
            }
            Err(reason) => {
                debug!(%reason, "branch rejected");
                false
            }
        }
    }

    pub fn close_branch(&mut self) -> bool {
        let closing = self.controller.close_branch();
        if closing {
            self.focus = ThreadTarget::Main;
        }
        closing
    }

    pub fn new_conversation(&mut self) {
        self.controller.new_conversation();
        self.main_view.reset();
        self.branch_view.reset();
        self.focus = ThreadTarget::Main;
        self.status = None;
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            ThreadTarget::Main if self.branch_is_open() => ThreadTarget::Branch,
            _ => ThreadTarget::Main,
        };
    }

    pub fn apply(&mut self, update: ControllerUpdate) {
        match update {
            ControllerUpdate::Resolved(target) => {
                debug!(thread = target.label(), "reply shown");
            }
            ControllerUpdate::Failed { target, error } => {
                self.status = Some(format!("{} request failed: {error}", target.label()));
            }
            ControllerUpdate::BranchClosed => {
                self.branch_view.reset();
                self.focus = ThreadTarget::Main;
            }
            ControllerUpdate::Discarded => {}
        }
    }

    pub fn tick_animation(&mut self) {
        if self.controller.store().any_loading() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn pointer_down(&mut self, pos: Position) {
        if self.new_chat_area.is_some_and(|area| area.contains(pos)) {
            self.new_conversation();
            return;
        }
        if self.close_area.is_some_and(|area| area.contains(pos)) {
            self.close_branch();
            return;
        }
        if self.affordance.pointer_down(&self.main_view.surface, pos) == Disposition::Consumed {
            return;
        }

        // A new gesture supersedes any pending grace clear
        self.grace_token += 1;

        if self.main_view.contains(pos) {
            self.focus = ThreadTarget::Main;
            self.main_view.tracker.pointer_down(&mut self.main_view.surface, pos);
        } else {
            self.main_view.tracker.clear(&mut self.main_view.surface);
        }

        if self.has_branch() && self.branch_view.contains(pos) {
            if self.branch_is_open() {
                self.focus = ThreadTarget::Branch;
            }
            self.branch_view.tracker.pointer_down(&mut self.branch_view.surface, pos);
        } else {
            self.branch_view.tracker.clear(&mut self.branch_view.surface);
        }
    }

    pub fn pointer_drag(&mut self, pos: Position) {
        self.main_view.tracker.pointer_drag(&mut self.main_view.surface, pos);
        self.branch_view.tracker.pointer_drag(&mut self.branch_view.surface, pos);
    }

    pub fn pointer_up(&mut self, pos: Position) {
        if self.main_view.tracker.is_dragging() || self.branch_view.tracker.is_dragging() {
            self.main_view.tracker.pointer_up(&mut self.main_view.surface, pos);
            self.branch_view.tracker.pointer_up(&mut self.branch_view.surface, pos);
            return;
        }

        let mut selected = None;
        let disposition = self
            .affordance
            .pointer_up(&mut self.main_view.surface, pos, |text| selected = Some(text.to_string()));
        if disposition == Disposition::Consumed {
            if let Some(text) = selected {
                self.open_branch(&text);
            }
        }
    }

    /// Scrolls the pane under `pos`, or the focused pane when the pointer is
    /// elsewhere.
    pub fn wheel(&mut self, pos: Position, up: bool) {
        let target = if self.has_branch() && self.branch_view.contains(pos) {
            ThreadTarget::Branch
        } else if self.main_view.contains(pos) {
            ThreadTarget::Main
        } else {
            self.focus
        };

        let view = self.view_mut(target);
        if up {
            view.scroll_up(WHEEL_STEP);
        } else {
            view.scroll_down(WHEEL_STEP);
        }
    }

    pub fn clear_selection(&mut self) {
        let view = self.view_mut(self.focus);
        view.tracker.clear(&mut view.surface);
    }

    fn schedule_selection_grace(&mut self) {
        self.grace_token += 1;
        let token = self.grace_token;
        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(SELECTION_GRACE).await;
            let _ = events.send(AppEvent::SelectionGrace(token));
        });
    }

    pub fn selection_grace_elapsed(&mut self, token: u64) {
        if token == self.grace_token {
            self.main_view.tracker.clear(&mut self.main_view.surface);
        }
    }
}
