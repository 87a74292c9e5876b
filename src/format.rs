use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
};

/// Format accumulated assistant text into styled lines.
///
/// Called on the whole buffer every frame while a response streams in, so
/// it is a pure function of the text so far: no state survives between
/// calls, and a delimiter whose closing half has not arrived yet renders
/// literally until it does.
pub fn format_text(text: &str) -> Text<'static> {
    Text::from(text.split('\n').map(format_line).collect::<Vec<_>>())
}

/// Convert one line of text into spans, styling **bold**, *italic* and
/// `code` delimiter pairs.
pub fn format_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    // Consume the second *
                    chars.next();

                    // Find closing **
                    let mut inner = String::new();
                    let mut found_close = false;
                    while let Some(c) = chars.next() {
                        if c == '*' && chars.peek() == Some(&'*') {
                            chars.next();
                            found_close = true;
                            break;
                        }
                        inner.push(c);
                    }

                    if found_close && !inner.is_empty() {
                        flush_plain(&mut spans, &mut current_text);
                        spans.push(Span::styled(
                            inner,
                            Style::default().add_modifier(Modifier::BOLD),
                        ));
                    } else {
                        // No closing **, treat as literal
                        current_text.push_str("**");
                        current_text.push_str(&inner);
                    }
                } else {
                    let mut inner = String::new();
                    let mut found_close = false;
                    for c in chars.by_ref() {
                        if c == '*' {
                            found_close = true;
                            break;
                        }
                        inner.push(c);
                    }

                    if found_close && !inner.is_empty() {
                        flush_plain(&mut spans, &mut current_text);
                        spans.push(Span::styled(
                            inner,
                            Style::default().add_modifier(Modifier::ITALIC),
                        ));
                    } else {
                        current_text.push('*');
                        current_text.push_str(&inner);
                    }
                }
            }
            '`' => {
                let mut inner = String::new();
                let mut found_close = false;
                for c in chars.by_ref() {
                    if c == '`' {
                        found_close = true;
                        break;
                    }
                    inner.push(c);
                }

                if found_close && !inner.is_empty() {
                    flush_plain(&mut spans, &mut current_text);
                    spans.push(Span::styled(inner, Style::default().fg(Color::Yellow)));
                } else {
                    current_text.push('`');
                    current_text.push_str(&inner);
                }
            }
            _ => current_text.push(c),
        }
    }

    flush_plain(&mut spans, &mut current_text);

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

fn flush_plain(spans: &mut Vec<Span<'static>>, current_text: &mut String) {
    if !current_text.is_empty() {
        spans.push(Span::raw(std::mem::take(current_text)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bold() -> Style {
        Style::default().add_modifier(Modifier::BOLD)
    }

    fn italic() -> Style {
        Style::default().add_modifier(Modifier::ITALIC)
    }

    fn code() -> Style {
        Style::default().fg(Color::Yellow)
    }

    #[test]
    fn test_plain_text_passes_through() {
        let line = format_line("hello world");
        assert_eq!(line, Line::from(vec![Span::raw("hello world")]));
    }

    #[test]
    fn test_mixed_spans_and_line_break() {
        let text = format_text("**bold** and *italic* and `code` and line1\nline2");
        assert_eq!(text.lines.len(), 2);
        assert_eq!(
            text.lines[0],
            Line::from(vec![
                Span::styled("bold", bold()),
                Span::raw(" and "),
                Span::styled("italic", italic()),
                Span::raw(" and "),
                Span::styled("code", code()),
                Span::raw(" and line1"),
            ])
        );
        assert_eq!(text.lines[1], Line::from(vec![Span::raw("line2")]));
    }

    #[test]
    fn test_unclosed_bold_is_literal() {
        let line = format_line("a **dangling tail");
        assert_eq!(line, Line::from(vec![Span::raw("a **dangling tail")]));
    }

    #[test]
    fn test_unclosed_italic_is_literal() {
        let line = format_line("2 * 3 is 6");
        assert_eq!(line, Line::from(vec![Span::raw("2 * 3 is 6")]));
    }

    #[test]
    fn test_unclosed_code_is_literal() {
        let line = format_line("run `cargo build");
        assert_eq!(line, Line::from(vec![Span::raw("run `cargo build")]));
    }

    #[test]
    fn test_growing_prefix_is_reformatted_cleanly() {
        // The same logical text formatted at two stream positions: the
        // partial form is literal, the complete form is styled.
        let partial = format_line("see **bo");
        assert_eq!(partial, Line::from(vec![Span::raw("see **bo")]));

        let complete = format_line("see **bold**");
        assert_eq!(
            complete,
            Line::from(vec![Span::raw("see "), Span::styled("bold", bold())])
        );
    }

    #[test]
    fn test_empty_line() {
        assert_eq!(format_line(""), Line::default());
        let text = format_text("a\n\nb");
        assert_eq!(text.lines.len(), 3);
        assert_eq!(text.lines[1], Line::default());
    }
}
