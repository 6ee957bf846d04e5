use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Clear, Paragraph, Widget, Wrap};

use crate::api::records::POST_CHAR_LIMIT;
use crate::app::{ComposeState, ComposeTarget};
use crate::ui::theme;

/// Centered editor for posts, replies and direct messages.
pub struct ComposeView<'a> {
    state: &'a ComposeState,
}

impl<'a> ComposeView<'a> {
    pub fn new(state: &'a ComposeState) -> Self {
        Self { state }
    }
}

/// `N/300` counter and whether it is over the limit. Messages carry no limit.
pub fn counter(state: &ComposeState) -> Option<(String, bool)> {
    if matches!(state.target, ComposeTarget::Message { .. }) {
        return None;
    }
    let used = state.text.chars().count();
    Some((format!("{used}/{POST_CHAR_LIMIT}"), used > POST_CHAR_LIMIT))
}

impl Widget for ComposeView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let width = 64u16.min(area.width.saturating_sub(4));
        let height = 12u16.min(area.height.saturating_sub(2));
        let x = area.x + (area.width.saturating_sub(width)) / 2;
        let y = area.y + (area.height.saturating_sub(height)) / 2;
        let panel = Rect::new(x, y, width, height);

        Clear.render(panel, buf);
        theme::paint_background(panel, buf);

        let title = match &self.state.target {
            ComposeTarget::Post => "New post".to_owned(),
            ComposeTarget::Reply { handle, .. } => format!("Reply to @{handle}"),
            ComposeTarget::Message { handle, .. } => format!("Message @{handle}"),
        };
        let block = theme::panel(&title).border_style(theme::bright());
        let inner = block.inner(panel);
        block.render(panel, buf);

        if inner.height < 3 {
            return;
        }

        let text_area = Rect::new(inner.x, inner.y, inner.width, inner.height - 2);
        let status_area = Rect::new(inner.x, inner.y + inner.height - 2, inner.width, 1);
        let hint_area = Rect::new(inner.x, inner.y + inner.height - 1, inner.width, 1);

        let body = format!("{}\u{2588}", self.state.text);
        Paragraph::new(body)
            .style(theme::base())
            .wrap(Wrap { trim: false })
            .render(text_area, buf);

        // -- Status: error or sending, counter on the right --
        if let Some(err) = &self.state.error {
            buf.set_stringn(status_area.x, status_area.y, err, status_area.width as usize, theme::alert());
        } else if self.state.sending {
            buf.set_string(status_area.x, status_area.y, "sending...", theme::dim());
        }
        if let Some((label, over)) = counter(self.state) {
            let style = if over { theme::alert() } else { theme::dim() };
            let cx = status_area.x + status_area.width.saturating_sub(label.len() as u16);
            buf.set_string(cx, status_area.y, &label, style);
        }

        let hint = Line::from(vec![
            Span::styled("enter", theme::bright()),
            Span::styled(" send  ", theme::dim()),
            Span::styled("alt-enter", theme::bright()),
            Span::styled(" newline  ", theme::dim()),
            Span::styled("esc", theme::bright()),
            Span::styled(" cancel", theme::dim()),
        ]);
        buf.set_line(hint_area.x, hint_area.y, &hint, hint_area.width);
    }
}
