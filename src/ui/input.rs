use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::widgets::Widget;
use unicode_width::UnicodeWidthChar;

use crate::ui::theme;

/// A simple single-line text input renderer.
///
/// Renders the prompt + text content, with a cursor indicator at the end.
pub struct TextInput<'a> {
    pub prompt: &'a str,
    pub text: &'a str,
    pub style: Style,
}

impl<'a> TextInput<'a> {
    pub fn new(prompt: &'a str, text: &'a str) -> Self {
        Self {
            prompt,
            text,
            style: theme::bright(),
        }
    }

    pub fn style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }
}

/// Rightmost part of `display` that fits in `max_width` columns.
fn visible_tail(display: &str, max_width: usize) -> &str {
    let mut used = 0;
    let mut start = display.len();
    for (idx, ch) in display.char_indices().rev() {
        let w = ch.width().unwrap_or(0);
        if used + w > max_width {
            break;
        }
        used += w;
        start = idx;
    }
    &display[start..]
}

impl Widget for TextInput<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width == 0 {
            return;
        }

        let display = format!("{}{}\u{2588}", self.prompt, self.text);
        let visible = visible_tail(&display, area.width as usize);
        buf.set_string(area.x, area.y, visible, self.style);
    }
}

#[cfg(test)]
mod tests {
    use super::visible_tail;

    #[test]
    fn keeps_the_end_of_long_input() {
        assert_eq!(visible_tail(":search rustaceans", 6), "aceans");
        assert_eq!(visible_tail(":q", 10), ":q");
    }

    #[test]
    fn never_splits_a_character() {
        assert_eq!(visible_tail("caf\u{e9}\u{e9}", 2), "\u{e9}\u{e9}");
        assert_eq!(visible_tail("\u{65e5}\u{672c}", 3), "\u{672c}");
    }
}
