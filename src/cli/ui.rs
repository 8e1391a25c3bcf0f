use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Frame,
};

use crate::cli::state::{
    comparison_view, AppState, CallbackScreen, ComparisonKind, ComparisonView, ConnectScreen, ConnectStatus,
    DashboardScreen, PadKey, PinScreen, Screen, KEYPAD,
};
use crate::clients::ComparisonData;
use crate::formatter::CurrencyFormatter;
use crate::session::BalanceSnapshot;

const PLACEHOLDER: &str = "—";

pub fn render(f: &mut Frame, app: &AppState, money: &CurrencyFormatter) {
    if app.show_help {
        render_help(f);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints(
            [
                Constraint::Length(2),
                Constraint::Min(12),
                Constraint::Length(7),
            ]
            .as_ref(),
        )
        .split(f.size());

    render_title(f, chunks[0], &app.screen);

    match &app.screen {
        Screen::Loading => render_loading(f, chunks[1]),
        Screen::Pin(pin) => render_pin(f, chunks[1], pin),
        Screen::Connect(connect) => render_connect(f, chunks[1], connect),
        Screen::Callback(callback) => render_callback(f, chunks[1], callback),
        Screen::Dashboard(dashboard) => render_dashboard(f, chunks[1], dashboard, money),
    }

    render_activity(f, chunks[2], app);
}

fn instructions(screen: &Screen) -> &'static str {
    match screen {
        Screen::Loading | Screen::Callback(_) => "h help - q quit",
        Screen::Pin(_) => "0-9 enter PIN - Backspace delete - arrows + Enter use keypad - q quit",
        Screen::Connect(connect) if connect.paste.is_some() => "Enter submit - Esc cancel",
        Screen::Connect(_) => "Enter connect - p paste redirect URL - r retry - q quit",
        Screen::Dashboard(_) => "r refresh - h help - q quit",
    }
}

fn render_title(f: &mut Frame, area: Rect, screen: &Screen) {
    let title = Paragraph::new("💶 daybal")
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .alignment(Alignment::Center);

    let hint = Paragraph::new(instructions(screen))
        .style(Style::default().fg(Color::Gray))
        .alignment(Alignment::Center);

    let title_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1)].as_ref())
        .split(area);

    f.render_widget(title, title_chunks[0]);
    f.render_widget(hint, title_chunks[1]);
}

fn render_loading(f: &mut Frame, area: Rect) {
    let loading = Paragraph::new("Loading...")
        .style(Style::default().fg(Color::Gray))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(loading, area);
}

fn render_pin(f: &mut Frame, area: Rect, pin: &PinScreen) {
    let block = Block::default().borders(Borders::ALL).title(" Enter PIN ");
    let inner = block.inner(area);
    f.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints(
            [
                Constraint::Length(2),
                Constraint::Length(KEYPAD.len() as u16 * 2),
                Constraint::Min(2),
            ]
            .as_ref(),
        )
        .split(inner);

    let slots: Vec<Span> = pin
        .buffer
        .slots()
        .iter()
        .map(|filled| {
            if *filled {
                Span::styled(" ● ", Style::default().fg(Color::Cyan))
            } else {
                Span::styled(" ○ ", Style::default().fg(Color::DarkGray))
            }
        })
        .collect();
    f.render_widget(
        Paragraph::new(Line::from(slots)).alignment(Alignment::Center),
        chunks[0],
    );

    let enabled = pin.is_interactive();
    let mut rows = Vec::new();
    for (r, keys) in KEYPAD.iter().enumerate() {
        let spans: Vec<Span> = keys
            .iter()
            .enumerate()
            .map(|(c, key)| {
                let label = match key {
                    PadKey::Digit(d) => format!("  {}  ", d),
                    PadKey::Blank => "     ".to_string(),
                    PadKey::Delete => "  ⌫  ".to_string(),
                };
                let mut style = if enabled {
                    Style::default().fg(Color::White)
                } else {
                    Style::default().fg(Color::DarkGray)
                };
                if enabled && pin.cursor == (r, c) && *key != PadKey::Blank {
                    style = style.add_modifier(Modifier::REVERSED);
                }
                Span::styled(label, style)
            })
            .collect();
        rows.push(Line::from(spans));
        rows.push(Line::from(""));
    }
    f.render_widget(Paragraph::new(rows).alignment(Alignment::Center), chunks[1]);

    let mut status = Vec::new();
    if pin.verifying {
        status.push(Line::from(Span::styled("Verifying...", Style::default().fg(Color::Cyan))));
    }
    if let Some(error) = &pin.error {
        status.push(Line::from(Span::styled(error.clone(), Style::default().fg(Color::Red))));
    }
    if !enabled {
        status.push(Line::from(Span::styled(
            format!("Try again in {}s", pin.lockout.remaining_seconds),
            Style::default().fg(Color::Yellow),
        )));
    }
    f.render_widget(
        Paragraph::new(status).alignment(Alignment::Center).wrap(Wrap { trim: true }),
        chunks[2],
    );
}

fn render_connect(f: &mut Frame, area: Rect, connect: &ConnectScreen) {
    let block = Block::default().borders(Borders::ALL).title(" Connect your bank ");
    let inner = block.inner(area);
    f.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([Constraint::Min(4), Constraint::Length(3)].as_ref())
        .split(inner);

    let mut lines = vec![
        Line::from("Link your bank account to see today's balance."),
        Line::from(""),
    ];

    match &connect.status {
        ConnectStatus::Idle => lines.push(Line::from(Span::styled(
            "Press Enter to connect your bank",
            Style::default().fg(Color::Green),
        ))),
        ConnectStatus::Requesting => lines.push(Line::from(Span::styled(
            "Requesting authorization link...",
            Style::default().fg(Color::Cyan),
        ))),
        ConnectStatus::Redirecting { auth_url } => {
            lines.push(Line::from("Continue in your browser:"));
            lines.push(Line::from(Span::styled(auth_url.clone(), Style::default().fg(Color::Cyan))));
            lines.push(Line::from(""));
            lines.push(Line::from("After approving, press p and paste the URL you were sent back to."));
        }
        ConnectStatus::Failed { message } => {
            lines.push(Line::from(Span::styled(message.clone(), Style::default().fg(Color::Red))));
            lines.push(Line::from("Press r to try again"));
        }
    }

    if let Some(notice) = &connect.notice {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(notice.clone(), Style::default().fg(Color::Yellow))));
    }

    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), chunks[0]);

    if let Some(text) = &connect.paste {
        let input = Paragraph::new(text.clone())
            .style(Style::default().fg(Color::White))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Redirect URL")
                    .style(Style::default().fg(Color::Yellow)),
            );
        f.render_widget(input, chunks[1]);

        let max_x = chunks[1].width.saturating_sub(2);
        f.set_cursor(
            chunks[1].x + 1 + (text.chars().count() as u16).min(max_x),
            chunks[1].y + 1,
        );
    }
}

fn render_callback(f: &mut Frame, area: Rect, callback: &CallbackScreen) {
    let lines = match callback {
        CallbackScreen::Exchanging => vec![Line::from(Span::styled(
            "Connecting to your bank...",
            Style::default().fg(Color::Cyan),
        ))],
        CallbackScreen::Failed { message } => vec![
            Line::from(Span::styled(message.clone(), Style::default().fg(Color::Red))),
            Line::from(""),
            Line::from("Returning to bank connection..."),
        ],
    };

    let paragraph = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title(" Bank authorization "));
    f.render_widget(paragraph, area);
}

/// Text and color of one comparison card.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonCard {
    pub label: &'static str,
    pub value: String,
    pub delta: Option<String>,
    pub color: Color,
}

pub fn comparison_card(kind: ComparisonKind, data: &ComparisonData, money: &CurrencyFormatter) -> ComparisonCard {
    let value = kind.value(data);
    match comparison_view(data.current_balance, value) {
        ComparisonView::Unavailable => ComparisonCard {
            label: kind.label(),
            value: PLACEHOLDER.to_string(),
            delta: None,
            color: Color::DarkGray,
        },
        ComparisonView::Favorable { delta } => ComparisonCard {
            label: kind.label(),
            value: money.format(value.unwrap_or_default(), &data.currency),
            delta: Some(money.format_delta(delta, true, &data.currency)),
            color: Color::Green,
        },
        ComparisonView::Unfavorable { delta } => ComparisonCard {
            label: kind.label(),
            value: money.format(value.unwrap_or_default(), &data.currency),
            delta: Some(money.format_delta(delta, false, &data.currency)),
            color: Color::Red,
        },
    }
}

fn render_dashboard(f: &mut Frame, area: Rect, dashboard: &DashboardScreen, money: &CurrencyFormatter) {
    let block = Block::default().borders(Borders::ALL).title(" Balance ");
    let inner = block.inner(area);
    f.render_widget(block, area);

    let footer = if dashboard.refreshing {
        Line::from(Span::styled("Refreshing...", Style::default().fg(Color::Cyan)))
    } else {
        Line::from(Span::styled(
            format!("Updated {} - press r to refresh", dashboard.updated_at.format("%H:%M:%S")),
            Style::default().fg(Color::Gray),
        ))
    };

    let data = match &dashboard.snapshot {
        BalanceSnapshot::Loaded(data) => data,
        BalanceSnapshot::Failed { detail } => {
            let lines = vec![
                Line::from(Span::styled(
                    format!("Could not load balance: {}", detail),
                    Style::default().fg(Color::Red),
                )),
                Line::from(""),
                footer,
            ];
            f.render_widget(
                Paragraph::new(lines).alignment(Alignment::Center).wrap(Wrap { trim: true }),
                inner,
            );
            return;
        }
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Length(5),
                Constraint::Min(1),
                Constraint::Length(1),
            ]
            .as_ref(),
        )
        .split(inner);

    let mut headline = vec![Line::from(Span::styled(
        money.format(data.current_balance, &data.currency),
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
    ))];
    if let Some(date) = &data.date {
        headline.push(Line::from(Span::styled(
            format!("as of {}", date),
            Style::default().fg(Color::Gray),
        )));
    }
    f.render_widget(Paragraph::new(headline).alignment(Alignment::Center), chunks[0]);

    let cards = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)].as_ref())
        .split(chunks[1]);

    for (slot, kind) in ComparisonKind::ALL.iter().enumerate() {
        let card = comparison_card(*kind, data, money);
        let mut lines = vec![Line::from(Span::styled(card.value, Style::default().fg(Color::White)))];
        if let Some(delta) = card.delta {
            lines.push(Line::from(Span::styled(
                delta,
                Style::default().fg(card.color).add_modifier(Modifier::BOLD),
            )));
        }
        let widget = Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title(format!(" {} ", card.label)));
        f.render_widget(widget, cards[slot]);
    }

    if !data.historical_data_available {
        let notice = data
            .message
            .clone()
            .unwrap_or_else(|| "Not enough history yet to compare against.".to_string());
        f.render_widget(
            Paragraph::new(Span::styled(notice, Style::default().fg(Color::Yellow)))
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true }),
            chunks[2],
        );
    }

    f.render_widget(Paragraph::new(footer).alignment(Alignment::Center), chunks[3]);
}

fn render_activity(f: &mut Frame, area: Rect, app: &AppState) {
    let visible_height = area.height.saturating_sub(2) as usize;

    let items: Vec<ListItem> = if app.activity.is_empty() {
        vec![ListItem::new("No activity yet").style(Style::default().fg(Color::Gray))]
    } else {
        app.activity
            .latest(visible_height)
            .map(|entry| {
                let style = if entry.contains("failed") || entry.contains("Error") {
                    Style::default().fg(Color::Red)
                } else if entry.contains("Locked") {
                    Style::default().fg(Color::Yellow)
                } else {
                    Style::default()
                };
                ListItem::new(entry.clone()).style(style)
            })
            .collect()
    };

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Activity")
            .style(Style::default().fg(Color::Cyan)),
    );
    f.render_widget(list, area);
}

fn render_help(f: &mut Frame) {
    let help_text = vec![
        "💶 daybal - daily balance dashboard",
        "",
        "PIN screen:",
        "  0-9         - Enter a digit",
        "  Backspace   - Delete the last digit",
        "  Arrows      - Move on the keypad",
        "  Enter       - Press the selected key",
        "",
        "Connect screen:",
        "  Enter / c   - Open the bank authorization page",
        "  p           - Paste the URL the bank redirected to",
        "  r           - Retry after an error",
        "",
        "Dashboard:",
        "  r           - Refresh balance",
        "",
        "  h           - Toggle this help screen",
        "  q / Esc     - Quit",
        "  Ctrl+C      - Press twice quickly to exit",
        "",
        "Press 'h' or 'Esc' to return",
    ];

    let help_paragraph = Paragraph::new(help_text.join("\n"))
        .style(Style::default().fg(Color::White))
        .block(Block::default().borders(Borders::ALL).title("📖 Help"))
        .alignment(Alignment::Left);

    f.render_widget(help_paragraph, f.size());
}
