use chrono::Utc;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::Widget;

use crate::api::types::{Notification, relative_age};
use crate::app::App;
use crate::ui::list::{CardList, render_footer, render_placeholder};
use crate::ui::theme;

/// Notifications, one or two lines each: who did what, then the quoted text.
pub struct NotificationsView<'a> {
    pub app: &'a App,
}

impl<'a> NotificationsView<'a> {
    pub fn new(app: &'a App) -> Self {
        Self { app }
    }
}

fn row_height(n: &Notification, _width: u16) -> u16 {
    if n.record.text.as_deref().is_some_and(|t| !t.trim().is_empty()) {
        2
    } else {
        1
    }
}

impl Widget for NotificationsView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = theme::panel("Notifications");
        let inner = block.inner(area);
        block.render(area, buf);

        let list = &self.app.notifications;
        if list.items().is_empty() {
            render_placeholder(inner, buf, list.is_loading(), list.error(), "nothing new");
            return;
        }

        let now = Utc::now();
        let width = inner.width.saturating_sub(1);
        CardList::new(list.items(), self.app.selected_index(), width, row_height).render(
            inner,
            buf,
            |_, n, selected, row, buf| {
                let marker = if n.is_read { "  " } else { "\u{25cf} " };
                let name_style = if selected {
                    theme::selected()
                } else {
                    theme::bright()
                };
                let age = n
                    .indexed_at
                    .as_deref()
                    .map(|ts| relative_age(ts, now))
                    .unwrap_or_default();
                let header = Line::from(vec![
                    Span::styled(marker, theme::bright()),
                    Span::styled(n.author.name().to_owned(), name_style),
                    Span::styled(format!(" {}", n.reason_text()), theme::base()),
                    Span::styled(format!(" \u{b7} {age}"), theme::dim()),
                ]);
                buf.set_line(row.x, row.y, &header, row.width);

                if row.height > 1
                    && let Some(text) = n.record.text.as_deref()
                {
                    let snippet = text.lines().next().unwrap_or_default();
                    buf.set_stringn(
                        row.x + 2,
                        row.y + 1,
                        snippet,
                        row.width.saturating_sub(2) as usize,
                        theme::dim(),
                    );
                }
            },
        );

        render_footer(inner, buf, list.is_loading(), list.error());
    }
}
