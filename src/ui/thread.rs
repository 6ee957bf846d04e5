use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::widgets::Widget;

use crate::api::types::PostThread;
use crate::app::App;
use crate::ui::post::{PostCard, post_card_height};
use crate::ui::theme;

/// Thread view: root post at top, replies below with a connector rail.
///
/// Selection index 0 is the root; replies follow in order.
pub struct ThreadView<'a> {
    pub thread: Option<&'a PostThread>,
    pub selected_index: usize,
    pub app: &'a App,
}

impl<'a> ThreadView<'a> {
    pub fn new(thread: Option<&'a PostThread>, app: &'a App) -> Self {
        Self {
            thread,
            selected_index: app.selected_index(),
            app,
        }
    }
}

impl Widget for ThreadView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = theme::panel("Thread");
        let inner = block.inner(area);
        block.render(area, buf);

        let Some(thread) = self.thread else {
            buf.set_string(inner.x + 1, inner.y, "loading...", theme::dim());
            return;
        };

        let content_width = inner.width.saturating_sub(1);
        let reply_width = content_width.saturating_sub(2);
        let bottom = inner.y + inner.height;

        // Skip replies above the selection so it stays on screen.
        let root_h = post_card_height(&thread.post, content_width) + 1;
        let mut first_reply = 0;
        if self.selected_index > 0 {
            let heights: Vec<u16> = thread
                .replies
                .iter()
                .map(|r| post_card_height(r, reply_width) + 1)
                .collect();
            let selected = self.selected_index - 1;
            first_reply = crate::ui::list::compute_scroll_start(
                &heights,
                selected,
                inner.height.saturating_sub(root_h),
            );
        }

        let mut y = inner.y;

        // Root post
        let render_h = post_card_height(&thread.post, content_width).min(bottom - y);
        if render_h > 0 {
            let root_area = Rect::new(inner.x + 1, y, content_width, render_h);
            PostCard::new(&thread.post, self.app.interaction_for(&thread.post))
                .selected(self.selected_index == 0)
                .render(root_area, buf);
            y += render_h;
        }

        if y < bottom {
            let sep = "\u{2550}".repeat(content_width as usize);
            buf.set_string(inner.x + 1, y, &sep, theme::dim());
            y += 1;
        }

        if thread.replies.is_empty() {
            if y < bottom {
                buf.set_string(inner.x + 2, y, "no replies", theme::dim());
            }
            return;
        }

        for (i, reply) in thread.replies.iter().enumerate().skip(first_reply) {
            if y >= bottom {
                break;
            }

            let card_h = post_card_height(reply, reply_width);
            let render_h = card_h.min(bottom - y);

            for row in y..y + render_h {
                buf.set_string(inner.x + 1, row, "\u{2502}", theme::faint());
            }
            let reply_area = Rect::new(inner.x + 3, y, reply_width, render_h);
            PostCard::new(reply, self.app.interaction_for(reply))
                .selected(i + 1 == self.selected_index)
                .render(reply_area, buf);
            y += render_h;

            if y < bottom && i + 1 < thread.replies.len() {
                buf.set_string(inner.x + 1, y, "\u{251c}", theme::faint());
                let sep = "\u{2500}".repeat(content_width.saturating_sub(1) as usize);
                buf.set_string(inner.x + 2, y, &sep, theme::faint());
                y += 1;
            }
        }
    }
}
