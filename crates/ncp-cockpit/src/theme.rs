use ratatui::style::{Color, Modifier, Style};

pub const HEADER_STYLE: Style = Style::new()
    .fg(Color::Rgb(142, 192, 124))
    .add_modifier(Modifier::BOLD);
pub const FOCUSED_BORDER: Style = Style::new().fg(Color::Rgb(131, 165, 152));
pub const IDLE_BORDER: Style = Style::new().fg(Color::Rgb(102, 92, 84));
pub const SELECTED_FIELD: Style = Style::new()
    .bg(Color::Rgb(131, 165, 152))
    .fg(Color::Black)
    .add_modifier(Modifier::BOLD);
pub const MUTED: Style = Style::new().fg(Color::Rgb(146, 131, 116));
pub const KEY_HINT: Style = Style::new().fg(Color::Cyan);

pub fn sync_status_style(status: &str) -> Style {
    if status == crate::state::SYNC_OK_MESSAGE {
        Style::new().fg(Color::Rgb(184, 187, 38))
    } else {
        Style::new()
            .fg(Color::Rgb(254, 128, 25))
            .add_modifier(Modifier::BOLD)
    }
}

pub fn border(focused: bool) -> Style {
    if focused {
        FOCUSED_BORDER
    } else {
        IDLE_BORDER
    }
}
