//! Wrapped transcript geometry for one chat pane.
//!
//! [`ChatSurface`] lays a thread's messages out into rows, remembers which
//! characters each row shows, and implements [`SelectionHost`] on top of that
//! so the selection layer can map mouse cells to text and back.

use ratatui::{
    layout::{Position, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
};
use unicode_width::UnicodeWidthChar;

use crate::conversation::{Message, Role};
use crate::render;
use crate::selection::{CellPos, SelectionHost, SelectionPoint, SelectionRange};

fn selected_style() -> Style {
    Style::default().add_modifier(Modifier::REVERSED)
}

/// Terminal cells taken by `c`. Control characters take none.
fn cell_width(c: char) -> usize {
    c.width().unwrap_or(0)
}

#[derive(Debug, Clone)]
struct TextRow {
    message: usize,
    row: i32,
    start: usize,
    end: usize,
    line: Line<'static>,
}

#[derive(Debug, Clone)]
struct MessageBox {
    role: Role,
    pending: bool,
    first_row: i32,
    text: Vec<char>,
}

#[derive(Debug, Clone, Copy)]
enum RowKind {
    Header(usize),
    Text(usize),
    Blank,
}

#[derive(Debug, Clone, Default)]
pub struct ChatSurface {
    viewport: Rect,
    scroll: u16,
    boxes: Vec<MessageBox>,
    text_rows: Vec<TextRow>,
    rows: Vec<RowKind>,
    selection: Option<SelectionRange>,
    animation_frame: u8,
}

impl ChatSurface {
    pub fn set_animation_frame(&mut self, frame: u8) {
        self.animation_frame = frame;
    }

    /// Rebuilds the rows for `messages` inside `viewport`. The selection is
    /// kept as long as it still points at existing text.
    pub fn layout(&mut self, messages: &[Message], viewport: Rect, scroll: u16) {
        let width = usize::from(viewport.width.max(1));
        self.viewport = viewport;
        self.boxes.clear();
        self.text_rows.clear();
        self.rows.clear();

        for (index, message) in messages.iter().enumerate() {
            self.rows.push(RowKind::Header(index));

            let rendered = if message.is_placeholder() {
                vec![Line::from(Span::styled(
                    format!("Thinking{}", ".".repeat(usize::from(self.animation_frame % 3) + 1)),
                    Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                ))]
            } else {
                render::render(&message.content).lines
            };

            let first_row = self.rows.len() as i32;
            let mut text: Vec<char> = Vec::new();

            for (i, line) in rendered.iter().enumerate() {
                if i > 0 {
                    text.push('\n');
                }
                let base = text.len();
                let chars: Vec<char> = line.spans.iter().flat_map(|s| s.content.chars()).collect();

                for (start, end) in wrap_ranges(&chars, width) {
                    self.rows.push(RowKind::Text(self.text_rows.len()));
                    self.text_rows.push(TextRow {
                        message: index,
                        row: self.rows.len() as i32 - 1,
                        start: base + start,
                        end: base + end,
                        line: slice_line(line, start, end, None),
                    });
                }
                text.extend(chars);
            }

            self.boxes.push(MessageBox {
                role: message.role,
                pending: message.is_placeholder(),
                first_row,
                text,
            });
            self.rows.push(RowKind::Blank);
        }

        self.scroll = scroll.min(self.max_scroll());
        self.selection = self.selection.filter(|range| self.is_valid(range));
    }

    pub fn scroll(&self) -> u16 {
        self.scroll
    }

    pub fn total_rows(&self) -> u16 {
        u16::try_from(self.rows.len()).unwrap_or(u16::MAX)
    }

    pub fn max_scroll(&self) -> u16 {
        self.total_rows().saturating_sub(self.viewport.height)
    }

    /// The rows currently inside the viewport, with the selection painted.
    pub fn visible_lines(&self) -> Vec<Line<'static>> {
        self.rows
            .iter()
            .skip(usize::from(self.scroll))
            .take(usize::from(self.viewport.height))
            .map(|kind| match *kind {
                RowKind::Header(index) => header_line(self.boxes[index].role),
                RowKind::Text(index) => {
                    let row = &self.text_rows[index];
                    let highlight = self.highlight_in(row);
                    match highlight {
                        Some(range) => slice_line(&row.line, 0, row.end - row.start, Some(range)),
                        None => row.line.clone(),
                    }
                }
                RowKind::Blank => Line::default(),
            })
            .collect()
    }

    fn is_valid(&self, range: &SelectionRange) -> bool {
        [range.anchor, range.focus].iter().all(|point| {
            self.boxes
                .get(point.message)
                .is_some_and(|b| point.offset <= b.text.len())
        })
    }

    /// Selected characters of `row`, relative to the row start.
    fn highlight_in(&self, row: &TextRow) -> Option<(usize, usize)> {
        let range = self.selection.filter(|r| !r.is_collapsed())?;
        let (start, end) = range.normalized();
        if row.message < start.message || row.message > end.message {
            return None;
        }

        let lo = if row.message == start.message { start.offset } else { 0 };
        let hi = if row.message == end.message { end.offset } else { usize::MAX };
        let lo = lo.max(row.start);
        let hi = hi.min(row.end);
        (lo < hi).then(|| (lo - row.start, hi - row.start))
    }

    fn to_cell(&self, pos: Position) -> Option<CellPos> {
        if !self.viewport.contains(pos) {
            return None;
        }
        Some(CellPos {
            x: i32::from(pos.x - self.viewport.x),
            y: i32::from(pos.y - self.viewport.y) + i32::from(self.scroll),
        })
    }

    fn text_row_at(&self, y: i32) -> Option<&TextRow> {
        match self.rows.get(usize::try_from(y).ok()?)? {
            RowKind::Text(index) => self.text_rows.get(*index),
            _ => None,
        }
    }

    fn row_chars(&self, row: &TextRow) -> &[char] {
        self.boxes
            .get(row.message)
            .and_then(|b| b.text.get(row.start..row.end))
            .unwrap_or(&[])
    }

    /// The character covering cell column `x` of `row`, or the row end when
    /// `x` lies past the last character.
    fn point_in_row(&self, row: &TextRow, x: i32) -> SelectionPoint {
        let target = usize::try_from(x).unwrap_or(0);
        let mut column = 0;
        let mut offset = row.start;
        for &c in self.row_chars(row) {
            let width = cell_width(c);
            if target < column + width {
                break;
            }
            column += width;
            offset += 1;
        }
        SelectionPoint::new(row.message, offset)
    }
}

impl SelectionHost for ChatSurface {
    fn selection(&self) -> Option<SelectionRange> {
        self.selection
    }

    fn set_selection(&mut self, range: Option<SelectionRange>) {
        self.selection = range.filter(|r| self.is_valid(r));
    }

    fn selected_text(&self, range: &SelectionRange) -> String {
        let (start, end) = range.normalized();
        let mut out = String::new();

        for index in start.message..=end.message {
            let Some(message) = self.boxes.get(index) else {
                continue;
            };
            let from = if index == start.message { start.offset } else { 0 };
            let to = if index == end.message { end.offset } else { message.text.len() };
            let to = to.min(message.text.len());
            if from < to {
                out.extend(&message.text[from..to]);
            }
            if index != end.message {
                out.push('\n');
            }
        }
        out
    }

    fn hit_test(&self, pos: Position) -> Option<SelectionPoint> {
        let cell = self.to_cell(pos)?;
        let row = self.text_row_at(cell.y)?;
        Some(self.point_in_row(row, cell.x))
    }

    fn nearest_point(&self, pos: Position) -> Option<SelectionPoint> {
        if self.text_rows.is_empty() || self.viewport.is_empty() {
            return None;
        }

        let clamped = Position::new(
            pos.x
                .clamp(self.viewport.x, self.viewport.right().saturating_sub(1)),
            pos.y
                .clamp(self.viewport.y, self.viewport.bottom().saturating_sub(1)),
        );
        let cell = self.to_cell(clamped)?;

        if let Some(row) = self.text_row_at(cell.y) {
            return Some(self.point_in_row(row, cell.x));
        }

        // Between messages: snap to the end of the text above, or the start of
        // the first text when above everything.
        match self.text_rows.iter().rev().find(|row| row.row < cell.y) {
            Some(row) => Some(SelectionPoint::new(row.message, row.end)),
            None => self
                .text_rows
                .first()
                .map(|row| SelectionPoint::new(row.message, row.start)),
        }
    }

    fn message_extent(&self, message: usize) -> Option<SelectionRange> {
        let b = self.boxes.get(message)?;
        Some(SelectionRange::new(
            SelectionPoint::new(message, 0),
            SelectionPoint::new(message, b.text.len()),
        ))
    }

    fn message_origin(&self, message: usize) -> Option<CellPos> {
        let b = self.boxes.get(message)?;
        Some(CellPos { x: 0, y: b.first_row })
    }

    fn point_cell(&self, point: SelectionPoint) -> Option<CellPos> {
        let mut rows = self
            .text_rows
            .iter()
            .filter(|row| row.message == point.message)
            .peekable();

        while let Some(row) = rows.next() {
            if point.offset < row.end || rows.peek().is_none() {
                let count = point.offset.saturating_sub(row.start);
                let column: usize = self
                    .row_chars(row)
                    .iter()
                    .take(count)
                    .map(|&c| cell_width(c))
                    .sum();
                return Some(CellPos {
                    x: column as i32,
                    y: row.row,
                });
            }
        }
        None
    }

    fn message_role(&self, message: usize) -> Option<Role> {
        self.boxes.get(message).map(|b| b.role)
    }

    fn is_pending(&self, message: usize) -> bool {
        self.boxes.get(message).is_some_and(|b| b.pending)
    }

    fn viewport(&self) -> Rect {
        self.viewport
    }

    fn to_screen(&self, cell: CellPos) -> Option<Position> {
        let y = cell.y - i32::from(self.scroll);
        if cell.x < 0
            || y < 0
            || cell.x >= i32::from(self.viewport.width)
            || y >= i32::from(self.viewport.height)
        {
            return None;
        }
        Some(Position::new(
            self.viewport.x + cell.x as u16,
            self.viewport.y + y as u16,
        ))
    }
}

fn header_line(role: Role) -> Line<'static> {
    let (label, color) = match role {
        Role::User => ("You:", Color::Cyan),
        Role::Assistant => ("AI:", Color::Yellow),
        Role::System => ("System:", Color::Magenta),
    };
    Line::from(Span::styled(
        label,
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    ))
}

/// Row boundaries for `chars` at `width` terminal cells, breaking after
/// spaces where possible. Every character lands in exactly one row, and a
/// row only outgrows `width` when its single character is wider than it.
fn wrap_ranges(chars: &[char], width: usize) -> Vec<(usize, usize)> {
    if chars.is_empty() {
        return vec![(0, 0)];
    }

    let width = width.max(1);
    let mut ranges = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let mut limit = start;
        let mut used = 0;
        while let Some(&c) = chars.get(limit) {
            let w = cell_width(c);
            if limit > start && used + w > width {
                break;
            }
            used += w;
            limit += 1;
        }

        let mut end = limit;
        if limit < chars.len() && chars[limit] != ' ' {
            if let Some(space) = (start + 1..limit).rev().find(|&j| chars[j] == ' ') {
                end = space + 1;
            }
        }
        ranges.push((start, end));
        start = end;
    }
    ranges
}

/// Characters `start..end` of `line`, optionally painting `highlight`
/// (relative to `start`) as selected.
fn slice_line(
    line: &Line<'static>,
    start: usize,
    end: usize,
    highlight: Option<(usize, usize)>,
) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut current = String::new();
    let mut current_style: Option<Style> = None;
    let mut column = 0;

    for span in &line.spans {
        for c in span.content.chars() {
            if column >= start && column < end {
                let relative = column - start;
                let selected = highlight.is_some_and(|(lo, hi)| relative >= lo && relative < hi);
                let style = if selected {
                    span.style.patch(selected_style())
                } else {
                    span.style
                };

                if current_style != Some(style) {
                    if let Some(prev) = current_style {
                        spans.push(Span::styled(std::mem::take(&mut current), prev));
                    }
                    current_style = Some(style);
                }
                current.push(c);
            }
            column += 1;
        }
    }
    if let Some(style) = current_style {
        spans.push(Span::styled(current, style));
    }

    Line::from(spans).style(line.style)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    fn surface(messages: &[Message], width: u16, height: u16) -> ChatSurface {
        let mut surface = ChatSurface::default();
        surface.layout(messages, Rect::new(0, 0, width, height), 0);
        surface
    }

    #[test]
    fn test_wrap_breaks_after_spaces() {
        let chars: Vec<char> = "alpha beta gamma".chars().collect();
        assert_eq!(wrap_ranges(&chars, 11), vec![(0, 11), (11, 16)]);
        assert_eq!(wrap_ranges(&chars, 8), vec![(0, 6), (6, 11), (11, 16)]);
    }

    #[test]
    fn test_wrap_hard_splits_long_words() {
        let chars: Vec<char> = "abcdefghij".chars().collect();
        assert_eq!(wrap_ranges(&chars, 4), vec![(0, 4), (4, 8), (8, 10)]);
    }

    #[test]
    fn test_wrap_measures_display_width() {
        let chars: Vec<char> = "一二三四五六七八九十".chars().collect();
        assert_eq!(wrap_ranges(&chars, 10), vec![(0, 5), (5, 10)]);
        // A wide character never splits across rows, even at width 1.
        assert_eq!(wrap_ranges(&chars[..2], 1), vec![(0, 1), (1, 2)]);
    }

    #[test]
    fn test_wide_rows_fit_the_pane() {
        let s = surface(&[Message::assistant("一二三四五六七八九十")], 10, 10);
        let lines = s.visible_lines();
        assert_eq!(plain(&lines[1]), "一二三四五");
        assert_eq!(plain(&lines[2]), "六七八九十");
        assert!(lines.iter().all(|line| line.width() <= 10));
    }

    #[test]
    fn test_hit_test_counts_cells_for_wide_characters() {
        let s = surface(&[Message::assistant("日本語 text")], 40, 10);
        // Cells 0..6 hold three wide characters, cell 6 the space.
        assert_eq!(s.hit_test(Position::new(7, 1)), Some(SelectionPoint::new(0, 4)));
        assert_eq!(s.hit_test(Position::new(6, 1)), Some(SelectionPoint::new(0, 3)));
        // Right half of a wide character maps to that character.
        assert_eq!(s.hit_test(Position::new(3, 1)), Some(SelectionPoint::new(0, 1)));
        assert_eq!(s.hit_test(Position::new(30, 1)), Some(SelectionPoint::new(0, 8)));

        let start = s.hit_test(Position::new(0, 1)).unwrap();
        let end = s.hit_test(Position::new(7, 1)).unwrap();
        assert_eq!(s.selected_text(&SelectionRange::new(start, end)), "日本語 ");
    }

    #[test]
    fn test_point_cell_returns_cell_columns() {
        let s = surface(&[Message::assistant("日本語 text")], 40, 10);
        assert_eq!(s.point_cell(SelectionPoint::new(0, 4)), Some(CellPos { x: 7, y: 1 }));
        assert_eq!(s.point_cell(SelectionPoint::new(0, 8)), Some(CellPos { x: 11, y: 1 }));

        let wrapped = surface(&[Message::assistant("一二三四五六七八九十")], 10, 10);
        assert_eq!(wrapped.point_cell(SelectionPoint::new(0, 7)), Some(CellPos { x: 4, y: 2 }));
    }

    #[test]
    fn test_rows_include_header_and_spacer() {
        let s = surface(&[Message::assistant("Hello"), Message::user("hi")], 40, 10);
        let lines: Vec<String> = s.visible_lines().iter().map(plain).collect();
        assert_eq!(lines, vec!["AI:", "Hello", "", "You:", "hi", ""]);
    }

    #[test]
    fn test_hit_test_maps_cells_to_offsets() {
        let s = surface(&[Message::assistant("one two\nthree")], 40, 10);
        assert_eq!(s.hit_test(Position::new(4, 1)), Some(SelectionPoint::new(0, 4)));
        // Second paragraph starts after the newline.
        assert_eq!(s.hit_test(Position::new(2, 2)), Some(SelectionPoint::new(0, 10)));
        // Past the end of a row clamps to the row end.
        assert_eq!(s.hit_test(Position::new(30, 1)), Some(SelectionPoint::new(0, 7)));
        // Header rows are not text.
        assert_eq!(s.hit_test(Position::new(0, 0)), None);
    }

    #[test]
    fn test_selected_text_spans_paragraphs() {
        let mut s = surface(&[Message::assistant("one two\nthree")], 40, 10);
        let range = SelectionRange::new(SelectionPoint::new(0, 4), SelectionPoint::new(0, 9));
        s.set_selection(Some(range));
        assert_eq!(s.selected_text(&range), "two\nt");
    }

    #[test]
    fn test_selected_text_uses_rendered_text() {
        let s = surface(&[Message::assistant("is **bold** here")], 40, 10);
        let range = SelectionRange::new(SelectionPoint::new(0, 3), SelectionPoint::new(0, 7));
        assert_eq!(s.selected_text(&range), "bold");
    }

    #[test]
    fn test_visible_lines_paint_selection() {
        let mut s = surface(&[Message::assistant("Hello world")], 40, 10);
        s.set_selection(Some(SelectionRange::new(
            SelectionPoint::new(0, 6),
            SelectionPoint::new(0, 11),
        )));
        let lines = s.visible_lines();
        let row = &lines[1];
        assert_eq!(plain(row), "Hello world");
        let painted: Vec<&str> = row
            .spans
            .iter()
            .filter(|s| s.style.add_modifier.contains(Modifier::REVERSED))
            .map(|s| s.content.as_ref())
            .collect();
        assert_eq!(painted, vec!["world"]);
    }

    #[test]
    fn test_scroll_is_clamped_and_offscreen_cells_have_no_screen_position() {
        let messages: Vec<Message> = (0..5).map(|i| Message::assistant(format!("m{i}"))).collect();
        let mut s = ChatSurface::default();
        s.layout(&messages, Rect::new(0, 0, 20, 4), 100);
        assert_eq!(s.scroll(), s.max_scroll());
        assert_eq!(s.max_scroll(), 15 - 4);

        let top = s.message_origin(0).unwrap();
        assert_eq!(s.to_screen(top), None);
        let last = s.message_origin(4).unwrap();
        assert!(s.to_screen(last).is_some());
    }

    #[test]
    fn test_nearest_point_snaps_between_messages() {
        let s = surface(&[Message::assistant("abc"), Message::assistant("def")], 40, 10);
        // Row 2 is the spacer after the first message.
        assert_eq!(s.nearest_point(Position::new(5, 2)), Some(SelectionPoint::new(0, 3)));
        // Row 0 is the first header, above all text.
        assert_eq!(s.nearest_point(Position::new(5, 0)), Some(SelectionPoint::new(0, 0)));
        // Below the viewport clamps to the last visible row.
        assert_eq!(s.nearest_point(Position::new(1, 50)), Some(SelectionPoint::new(1, 3)));
    }

    #[test]
    fn test_selection_dropped_when_message_disappears() {
        let mut s = surface(&[Message::assistant("abc"), Message::assistant("def")], 40, 10);
        s.set_selection(Some(SelectionRange::new(
            SelectionPoint::new(1, 0),
            SelectionPoint::new(1, 2),
        )));
        s.layout(&[Message::assistant("abc")], Rect::new(0, 0, 40, 10), 0);
        assert!(s.selection().is_none());
    }

    #[test]
    fn test_placeholder_is_pending_and_animated() {
        let mut s = ChatSurface::default();
        s.set_animation_frame(2);
        s.layout(&[Message::placeholder()], Rect::new(0, 0, 40, 5), 0);
        assert!(s.is_pending(0));
        assert_eq!(plain(&s.visible_lines()[1]), "Thinking...");
    }
}
