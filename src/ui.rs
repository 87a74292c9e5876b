use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Style, Stylize},
    text::{Line, Span},
    widgets::{
        Block, Borders, Clear, List, ListItem, Paragraph, Scrollbar, ScrollbarOrientation,
        ScrollbarState, Wrap,
    },
};
use crate::app::{App, ChatRole, InputMode, MessageContent, SUGGESTIONS};
use crate::format;

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // The input box grows with its line count, up to five rows
    let input_lines = app.input.split('\n').count().clamp(1, 5) as u16;

    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(input_lines + 2),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    if app.messages.is_empty() && !app.streaming {
        render_welcome(frame, chat_area);
    } else {
        render_chat(app, frame, chat_area);
    }

    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);

    if app.show_model_picker {
        render_model_picker(app, frame, area);
    }

    render_notices(app, frame, area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let streaming_indicator = if app.streaming { " streaming " } else { "" };

    let title = Line::from(vec![
        Span::styled(" parley ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!(" {} ", app.selected_model),
            Style::default().fg(Color::White),
        ),
        Span::styled(streaming_indicator, Style::default().fg(Color::Yellow)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_welcome(frame: &mut Frame, area: Rect) {
    let mut lines = vec![
        Line::default(),
        Line::from(Span::styled(
            "Welcome to parley",
            Style::default().fg(Color::Cyan).bold(),
        )),
        Line::from(Span::styled(
            "Chat with the language model behind your backend, straight from the terminal",
            Style::default().fg(Color::DarkGray),
        )),
        Line::default(),
        Line::from(Span::raw("Press a number to send a starter, or just type:")),
        Line::default(),
    ];

    for (i, suggestion) in SUGGESTIONS.iter().enumerate() {
        lines.push(Line::from(vec![
            Span::styled(format!("{} ", i + 1), Style::default().fg(Color::Yellow).bold()),
            Span::raw(*suggestion),
        ]));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let welcome = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(block);

    frame.render_widget(welcome, area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Conversation ");

    let inner_area = block.inner(area);
    app.chat_height = inner_area.height;
    app.chat_width = inner_area.width;

    let lines = transcript_lines(app);
    app.chat_total_lines = lines.len() as u16;

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(paragraph, area);

    // Render scrollbar
    if app.chat_total_lines > app.chat_height {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("^"))
            .end_symbol(Some("v"));

        let mut scrollbar_state =
            ScrollbarState::new(app.chat_total_lines as usize).position(app.chat_scroll as usize);

        frame.render_stateful_widget(
            scrollbar,
            area.inner(ratatui::layout::Margin {
                vertical: 1,
                horizontal: 0,
            }),
            &mut scrollbar_state,
        );
    }
}

fn transcript_lines(app: &App) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();

    for message in &app.messages {
        let (name, name_style) = match message.role {
            ChatRole::User => ("You", Style::default().fg(Color::Green).bold()),
            ChatRole::Assistant => ("Assistant", Style::default().fg(Color::Cyan).bold()),
        };
        lines.push(Line::from(Span::styled(name, name_style)));

        match &message.content {
            MessageContent::Pending => {
                let dots = ".".repeat(app.animation_frame as usize + 1);
                lines.push(Line::from(Span::styled(
                    format!("Thinking{dots}"),
                    Style::default().fg(Color::DarkGray),
                )));
            }
            MessageContent::Text(text) => {
                lines.extend(format::format_text(text).lines);
            }
            MessageContent::Blocked(warning) => {
                for line in warning.lines() {
                    lines.push(Line::from(Span::styled(
                        format!("\u{26a0} {line}"),
                        Style::default().fg(Color::Yellow).bold(),
                    )));
                }
            }
            MessageContent::Failed(error) => {
                lines.push(Line::from(Span::styled(
                    format!("Error: {error}"),
                    Style::default().fg(Color::Red),
                )));
            }
        }

        lines.push(Line::default()); // Blank line between messages
    }

    lines
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let border_color = if app.streaming {
        Color::DarkGray
    } else if app.input_mode == InputMode::Editing {
        Color::Yellow
    } else {
        Color::DarkGray
    };

    let title = if app.streaming {
        " Waiting for reply "
    } else {
        " Message "
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    let input = Paragraph::new(app.input.as_str())
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);

    frame.render_widget(input, area);

    // Show cursor when editing
    if app.input_mode == InputMode::Editing {
        let before: String = app.input.chars().take(app.cursor).collect();
        let row = before.matches('\n').count() as u16;
        let col = before
            .chars()
            .rev()
            .take_while(|&c| c != '\n')
            .count() as u16;
        frame.set_cursor_position((area.x + col + 1, area.y + row + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match app.input_mode {
        InputMode::Normal => " VIEW ",
        InputMode::Editing => " CHAT ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints = match app.input_mode {
        InputMode::Editing => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" send ", label_style),
            Span::styled(" Alt+Enter ", key_style),
            Span::styled(" newline ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" view ", label_style),
            Span::styled(" Ctrl+n ", key_style),
            Span::styled(" new chat ", label_style),
            Span::styled(" Ctrl+c ", key_style),
            Span::styled(" quit ", label_style),
        ],
        InputMode::Normal => vec![
            Span::styled(" i ", key_style),
            Span::styled(" type ", label_style),
            Span::styled(" j/k ", key_style),
            Span::styled(" scroll ", label_style),
            Span::styled(" M ", key_style),
            Span::styled(" model ", label_style),
            Span::styled(" n ", key_style),
            Span::styled(" new chat ", label_style),
            Span::styled(" q ", key_style),
            Span::styled(" quit ", label_style),
        ],
    };

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

fn render_model_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let popup = centered_rect(44, 12, area);
    frame.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Select model ");

    let items: Vec<ListItem> = app
        .available_models
        .iter()
        .map(|m| ListItem::new(format!(" {} ", m)))
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .bold(),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, popup, &mut app.model_picker_state);
}

fn render_notices(app: &App, frame: &mut Frame, area: Rect) {
    for (i, notice) in app.notices.iter().enumerate() {
        let width = (notice.text.chars().count() as u16 + 2).min(area.width);
        let rect = Rect {
            x: area.right().saturating_sub(width + 1),
            y: area.y + 1 + i as u16,
            width,
            height: 1,
        };
        frame.render_widget(Clear, rect);
        let toast = Paragraph::new(format!(" {} ", notice.text))
            .style(Style::default().bg(Color::Blue).fg(Color::White));
        frame.render_widget(toast, rect);
    }
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
