use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::widgets::Widget;
use unicode_width::UnicodeWidthStr;

use crate::app::{App, AppMode};
use crate::ui::input::TextInput;
use crate::ui::theme;

const HINT: &str = "enter submit  esc cancel";

/// `:` command or `/` search line under the status bar.
pub struct CommandBar<'a> {
    pub app: &'a App,
}

impl<'a> CommandBar<'a> {
    pub fn new(app: &'a App) -> Self {
        Self { app }
    }
}

impl Widget for CommandBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let (prompt, text) = match self.app.mode {
            AppMode::Command => (":", &self.app.command_input),
            AppMode::Search => ("/", &self.app.search_input),
            AppMode::Normal | AppMode::Compose | AppMode::Login => return,
        };
        buf.set_style(area, theme::base());

        let mut input_area = area;
        if let Some(x) = hint_x(area, prompt, text) {
            buf.set_string(x, area.y, HINT, theme::faint());
            input_area.width = x.saturating_sub(area.x + 1);
        }
        TextInput::new(prompt, text).render(input_area, buf);
    }
}

/// Column for the key hint, or `None` once the input would run into it.
fn hint_x(area: Rect, prompt: &str, text: &str) -> Option<u16> {
    let hint = HINT.width() as u16;
    let typed = (prompt.width() + text.width() + 1) as u16;
    (area.width >= typed + hint + 2).then(|| area.right() - hint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hint_sits_right_aligned_after_short_input() {
        let area = Rect::new(2, 0, 60, 1);
        assert_eq!(hint_x(area, ":", "profile"), Some(62 - HINT.width() as u16));
    }

    #[test]
    fn hint_yields_to_long_input() {
        let area = Rect::new(0, 0, 40, 1);
        let long = "x".repeat(30);
        assert_eq!(hint_x(area, "/", &long), None);
        assert!(hint_x(Rect::new(0, 0, 10, 1), ":", "").is_none());
    }
}
