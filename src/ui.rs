use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
    Frame,
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::app::App;
use crate::conversation::ThreadTarget;
use crate::selection::AFFORDANCE_LABEL;

const SIDEBAR_WIDTH: u16 = 24;
const NEW_CHAT_LABEL: &str = " + New chat ";
const CLOSE_LABEL: &str = "[x]";

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let [header_area, body_area, input_area, status_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .areas(area);

    let [sidebar_area, panes_area] =
        Layout::horizontal([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(0)]).areas(body_area);

    render_header(app, frame, header_area);
    render_sidebar(app, frame, sidebar_area);
    render_panes(app, frame, panes_area);
    render_input(app, frame, input_area);
    render_status(app, frame, status_area);
    render_footer(app, frame, footer_area);

    // Drawn last so it sits over the transcript
    render_affordance(app, frame);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" branchchat ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("{} · {} ", app.controller.backend_label(), app.model),
            Style::default().fg(Color::White),
        ),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_sidebar(app: &mut App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Chats ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.height == 0 {
        app.new_chat_area = None;
        return;
    }

    let button_width = (NEW_CHAT_LABEL.width() as u16).min(inner.width);
    let button = Rect::new(inner.x, inner.y, button_width, 1);
    frame.render_widget(
        Paragraph::new(NEW_CHAT_LABEL).style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        button,
    );
    app.new_chat_area = Some(button);

    // History is not persisted yet, the list is only a placeholder
    if inner.height > 2 {
        let history = Rect::new(inner.x, inner.y + 2, inner.width, inner.height - 2);
        let lines = vec![
            Line::from(Span::styled("History", Style::default().fg(Color::Gray).bold())),
            Line::from(Span::styled(
                "No saved chats",
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )),
        ];
        frame.render_widget(Paragraph::new(lines), history);
    }
}

fn render_panes(app: &mut App, frame: &mut Frame, area: Rect) {
    let (main_area, branch_area) = if app.has_branch() {
        let [main, branch] =
            Layout::horizontal([Constraint::Percentage(55), Constraint::Percentage(45)]).areas(area);
        (main, Some(branch))
    } else {
        (area, None)
    };

    let main_block = pane_block(
        format!(" Main · {} ", app.controller.backend_label()),
        app.focus == ThreadTarget::Main,
        false,
    );
    let main_inner = main_block.inner(main_area);
    frame.render_widget(main_block, main_area);
    app.main_view.area = Some(main_area);

    let branch_inner = branch_area.map(|branch_area| {
        let closing = !app.branch_is_open();
        let title = if closing { " Branch · closing " } else { " Branch " };
        let block = pane_block(
            title.to_string(),
            app.focus == ThreadTarget::Branch && !closing,
            closing,
        );
        let inner = block.inner(branch_area);
        frame.render_widget(block, branch_area);

        app.close_area = (!closing && branch_area.width > 6).then(|| {
            Rect::new(branch_area.right() - 5, branch_area.y, CLOSE_LABEL.len() as u16, 1)
        });
        if let Some(close) = app.close_area {
            frame.render_widget(
                Paragraph::new(CLOSE_LABEL).style(Style::default().fg(Color::Red).bold()),
                close,
            );
        }
        inner
    });
    if branch_inner.is_none() {
        app.close_area = None;
    }
    app.branch_view.area = branch_area;

    app.layout_panes(main_inner, branch_inner);

    render_transcript(frame, main_area, main_inner, &app.main_view);
    if let (Some(outer), Some(inner)) = (branch_area, branch_inner) {
        render_transcript(frame, outer, inner, &app.branch_view);
    }
}

fn pane_block(title: String, focused: bool, closing: bool) -> Block<'static> {
    let border_color = if closing {
        Color::DarkGray
    } else if focused {
        Color::Cyan
    } else {
        Color::Gray
    };
    let title_style = if closing {
        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC)
    } else {
        Style::default()
    };

    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(Span::styled(title, title_style))
}

fn render_transcript(frame: &mut Frame, outer: Rect, inner: Rect, view: &crate::app::PaneView) {
    frame.render_widget(Paragraph::new(view.surface.visible_lines()), inner);

    let max_scroll = view.surface.max_scroll();
    if max_scroll > 0 && outer.height > 2 {
        let mut state = ScrollbarState::new(usize::from(max_scroll)).position(usize::from(view.scroll));
        let track = Rect::new(outer.x, outer.y + 1, outer.width, outer.height - 2);
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            track,
            &mut state,
        );
    }
}

fn render_affordance(app: &App, frame: &mut Frame) {
    let Some(view) = app.affordance.view(&app.main_view.surface) else {
        return;
    };

    frame.render_widget(Clear, view.area);
    frame.render_widget(
        Paragraph::new(AFFORDANCE_LABEL).style(
            Style::default()
                .bg(Color::Magenta)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        view.area,
    );
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let locked = app.input_locked();
    let border_color = if locked { Color::DarkGray } else { Color::Yellow };
    let title = if locked {
        format!(" Message {} (waiting for reply) ", app.focus.label())
    } else {
        format!(" Message {} ", app.focus.label())
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    let inner_width = area.width.saturating_sub(2) as usize;
    let (visible_text, cursor_x) = input_view(&app.input, app.input_cursor, inner_width);

    let text_color = if locked { Color::DarkGray } else { Color::Cyan };
    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(text_color))
        .block(input_block);
    frame.render_widget(input, area);

    if !locked && inner_width > 0 {
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

/// The part of `input` shown in a field `width` cells wide, scrolled
/// horizontally so the cursor (a char index) stays visible, and the cursor's
/// cell column inside the field.
fn input_view(input: &str, cursor: usize, width: usize) -> (String, u16) {
    if width == 0 {
        return (String::new(), 0);
    }

    let chars: Vec<char> = input.chars().collect();
    let widths: Vec<usize> = chars.iter().map(|c| c.width().unwrap_or(0)).collect();
    let cursor = cursor.min(chars.len());

    let mut scroll = 0;
    let mut before: usize = widths[..cursor].iter().sum();
    while before >= width && scroll < cursor {
        before -= widths[scroll];
        scroll += 1;
    }

    let mut used = 0;
    let visible = chars[scroll..]
        .iter()
        .zip(&widths[scroll..])
        .take_while(|&(_, &w)| {
            used += w;
            used <= width
        })
        .map(|(&c, _)| c)
        .collect();

    (visible, before as u16)
}

fn render_status(app: &App, frame: &mut Frame, area: Rect) {
    let line = match &app.status {
        Some(error) => Line::from(Span::styled(
            format!(" ✗ {error}"),
            Style::default().fg(Color::Red),
        )),
        None => Line::default(),
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = match app.focus {
        ThreadTarget::Main => (" MAIN ", Style::default().bg(Color::Blue).fg(Color::White)),
        ThreadTarget::Branch => (" BRANCH ", Style::default().bg(Color::Magenta).fg(Color::White)),
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut hints = vec![
        Span::styled(" Enter ", key_style),
        Span::styled(" send ", label_style),
    ];
    if app.branch_is_open() {
        hints.extend([
            Span::styled(" Tab ", key_style),
            Span::styled(" switch ", label_style),
            Span::styled(" ^W ", key_style),
            Span::styled(" close branch ", label_style),
        ]);
    }
    if app.affordance.view(&app.main_view.surface).is_some() {
        hints.extend([
            Span::styled(" ^B ", key_style),
            Span::styled(" branch ", label_style),
        ]);
    }
    hints.extend([
        Span::styled(" PgUp/PgDn ", key_style),
        Span::styled(" scroll ", label_style),
        Span::styled(" ^N ", key_style),
        Span::styled(" new chat ", label_style),
        Span::styled(" ^C ", key_style),
        Span::styled(" quit ", label_style),
    ]);

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}
