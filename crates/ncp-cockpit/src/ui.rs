use crate::state::{App, Focus, Pane, SyncField};
use crate::theme;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

pub fn render(f: &mut Frame, app: &App) {
    let area = f.size();

    let (main, sidebar) = if app.show_sidebar {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(40), Constraint::Length(42)])
            .split(area);
        (columns[0], Some(columns[1]))
    } else {
        (area, None)
    };

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(4)])
        .split(main);
    render_command_bar(f, app, rows[0]);
    render_results(f, app, rows[1]);

    if let Some(sidebar) = sidebar {
        render_sidebar(f, app, sidebar);
    }
    if app.show_help {
        render_help(f, centered(area, 56, 16));
    }
}

fn render_command_bar(f: &mut Frame, app: &App, area: Rect) {
    let focused = app.focus == Focus::CommandBar;
    let title = match &app.running {
        Some(line) => format!(" Running: {line} "),
        None => " <host> show <args> ".to_string(),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(title, theme::HEADER_STYLE))
        .border_style(theme::border(focused));
    let inner = block.inner(area);
    f.render_widget(Paragraph::new(app.input.as_str()).block(block), area);

    if focused && !app.show_help {
        let offset = app.input.chars().count() as u16;
        f.set_cursor(inner.x + offset.min(inner.width.saturating_sub(1)), inner.y);
    }
}

fn render_results(f: &mut Frame, app: &App, area: Rect) {
    let panes = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let suffix = app
        .last_command
        .as_deref()
        .map(|line| format!(" ({line})"))
        .unwrap_or_default();
    render_pane(
        f,
        panes[0],
        &format!(" Raw{suffix} "),
        &app.raw_output,
        app.raw_scroll,
        app.scroll_pane == Pane::Raw,
    );
    render_pane(
        f,
        panes[1],
        " Parsed ",
        &app.parsed_output,
        app.parsed_scroll,
        app.scroll_pane == Pane::Parsed,
    );
}

fn render_pane(f: &mut Frame, area: Rect, title: &str, body: &str, scroll: u16, active: bool) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(title.to_string(), theme::HEADER_STYLE))
        .border_style(theme::border(active));
    let paragraph = Paragraph::new(body.to_string())
        .block(block)
        .scroll((scroll, 0));
    f.render_widget(paragraph, area);
}

fn render_sidebar(f: &mut Frame, app: &App, area: Rect) {
    let form = &app.sync_form;
    let focused = app.focus == Focus::Sidebar;
    let block = Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(" Inventory ", theme::HEADER_STYLE))
        .border_style(theme::border(focused));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let field_style = |field: SyncField| {
        if focused && form.field == field {
            theme::SELECTED_FIELD
        } else {
            Style::default()
        }
    };
    let submit_label = if app.sync_running() {
        "[ Syncing... ]"
    } else {
        "[ Sync ]"
    };

    let mut lines = vec![
        Line::from(vec![
            Span::styled("Source ", theme::MUTED),
            Span::styled(
                format!("< {} >", form.source.label()),
                field_style(SyncField::Source),
            ),
        ]),
        Line::from(""),
        Line::from(Span::styled("URL", theme::MUTED)),
        Line::from(Span::styled(
            display_or_placeholder(&form.url, "https://..."),
            field_style(SyncField::Url),
        )),
        Line::from(""),
        Line::from(Span::styled("Token", theme::MUTED)),
        Line::from(Span::styled(
            display_or_placeholder(&form.masked_token(), "-"),
            field_style(SyncField::Token),
        )),
        Line::from(""),
        Line::from(Span::styled(submit_label, field_style(SyncField::Submit))),
        Line::from(""),
    ];
    if let Some(status) = &form.status {
        lines.push(Line::from(Span::styled(
            status.clone(),
            theme::sync_status_style(status),
        )));
    }
    lines.push(Line::from(Span::styled(
        form.last_synced_label(),
        theme::MUTED,
    )));
    lines.push(Line::from(Span::styled(
        format!("{} devices", app.inventory.len()),
        theme::MUTED,
    )));

    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);
}

fn display_or_placeholder(value: &str, placeholder: &str) -> String {
    if value.is_empty() {
        placeholder.to_string()
    } else {
        value.to_string()
    }
}

fn render_help(f: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Help")
        .border_style(theme::FOCUSED_BORDER);
    let inner = block.inner(area);
    f.render_widget(Clear, area);
    f.render_widget(block, area);

    let hint = |keys: &'static str, text: &'static str| {
        Line::from(vec![
            Span::styled(format!("{keys:<12}"), theme::KEY_HINT),
            Span::raw(text),
        ])
    };
    let text = vec![
        Line::from(Span::styled(
            "Keyboard Shortcuts",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        hint("Enter", "Run command / next field"),
        hint("Tab", "Complete host and verb"),
        hint("F2 / Ctrl-b", "Toggle inventory sidebar"),
        hint("Left/Right", "Cycle source of truth"),
        hint("F3", "Switch scrolled pane"),
        hint("Up/Down", "Scroll / move field"),
        hint("PgUp/PgDn", "Scroll faster"),
        hint("F1 / ?", "Toggle help"),
        hint("Esc", "Close / quit"),
        hint("Ctrl-c", "Quit"),
    ];
    f.render_widget(Paragraph::new(text).wrap(Wrap { trim: true }), inner);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
