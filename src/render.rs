//! Message text to styled terminal lines.
//!
//! Understands the small subset of markdown assistants lean on: paragraphs,
//! `**bold**`, `*italic*`, `` `code` ``, fenced code blocks, `#` headings
//! and `-` bullets. Everything else is shown as written.

use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
};

const BOLD_MARK: &[char] = &['*', '*'];
const ITALIC_MARK: &[char] = &['*'];
const CODE_MARK: &[char] = &['`'];

fn bold() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn italic() -> Style {
    Style::default().add_modifier(Modifier::ITALIC)
}

fn code() -> Style {
    Style::default().fg(Color::Yellow)
}

pub fn render(content: &str) -> Text<'static> {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut in_fence = false;

    for raw in content.lines() {
        if raw.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            lines.push(Line::from(Span::styled(raw.to_string(), code())));
            continue;
        }
        lines.push(render_line(raw));
    }

    if lines.is_empty() {
        lines.push(Line::default());
    }
    Text::from(lines)
}

fn render_line(raw: &str) -> Line<'static> {
    let trimmed = raw.trim_start();

    let hashes = trimmed.chars().take_while(|c| *c == '#').count();
    if (1..=6).contains(&hashes) && trimmed[hashes..].starts_with(' ') {
        return Line::from(parse_inline(trimmed[hashes..].trim_start()))
            .style(bold().fg(Color::Cyan));
    }

    if let Some(rest) = trimmed
        .strip_prefix("- ")
        .or_else(|| trimmed.strip_prefix("* "))
    {
        let indent = raw.len() - trimmed.len();
        let mut spans = vec![Span::raw(format!("{}• ", " ".repeat(indent)))];
        spans.extend(parse_inline(rest));
        return Line::from(spans);
    }

    let spans = parse_inline(raw);
    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

/// Splits one line into plain and styled spans.
fn parse_inline(text: &str) -> Vec<Span<'static>> {
    let chars: Vec<char> = text.chars().collect();
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut plain = String::new();
    let mut i = 0;

    while i < chars.len() {
        let (marker, style) = match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => (BOLD_MARK, bold()),
            '*' => (ITALIC_MARK, italic()),
            '`' => (CODE_MARK, code()),
            c => {
                plain.push(c);
                i += 1;
                continue;
            }
        };

        let body_start = i + marker.len();
        let opens = chars
            .get(body_start)
            .is_some_and(|c| !c.is_whitespace() || marker == CODE_MARK);

        match find_closing(&chars, body_start, marker) {
            Some(end) if opens && end > body_start => {
                if !plain.is_empty() {
                    spans.push(Span::raw(std::mem::take(&mut plain)));
                }
                let body: String = chars[body_start..end].iter().collect();
                spans.push(Span::styled(body, style));
                i = end + marker.len();
            }
            _ => {
                // No closing marker, treat as literal
                plain.extend(&chars[i..body_start]);
                i = body_start;
            }
        }
    }

    if !plain.is_empty() {
        spans.push(Span::raw(plain));
    }
    spans
}

fn find_closing(chars: &[char], from: usize, marker: &[char]) -> Option<usize> {
    (from..chars.len()).find(|&j| chars[j..].starts_with(marker))
}
