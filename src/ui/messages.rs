use chrono::Utc;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::Widget;

use crate::api::types::{ChatMessage, relative_age};
use crate::app::App;
use crate::ui::list::{CardList, render_footer, render_placeholder};
use crate::ui::post::wrap_text;
use crate::ui::theme;

/// Inbox: the latest message of each conversation.
pub struct MessagesView<'a> {
    pub app: &'a App,
}

impl<'a> MessagesView<'a> {
    pub fn new(app: &'a App) -> Self {
        Self { app }
    }
}

impl Widget for MessagesView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = theme::panel("Messages");
        let inner = block.inner(area);
        block.render(area, buf);

        let list = &self.app.messages;
        let heads = self.app.conversation_list();
        if heads.is_empty() {
            render_placeholder(inner, buf, list.is_loading(), list.error(), "no conversations yet");
            return;
        }

        let me = self.app.me();
        let now = Utc::now();
        let width = inner.width.saturating_sub(1);
        CardList::new(&heads, self.app.selected_index(), width, |_, _| 2).render(
            inner,
            buf,
            |_, msg, selected, row, buf| {
                let Some(peer) = msg.peer(&me) else {
                    return;
                };
                let name_style = if selected {
                    theme::selected()
                } else {
                    theme::bright()
                };
                let age = msg
                    .created_at
                    .as_deref()
                    .map(|ts| relative_age(ts, now))
                    .unwrap_or_default();
                let header = Line::from(vec![
                    Span::styled(peer.name().to_owned(), name_style),
                    Span::styled(format!(" @{}", peer.handle), theme::dim()),
                    Span::styled(format!(" \u{b7} {age}"), theme::dim()),
                ]);
                buf.set_line(row.x, row.y, &header, row.width);

                if row.height > 1 {
                    let prefix = if msg.author.did == me { "you: " } else { "" };
                    let first = msg.text.lines().next().unwrap_or_default();
                    buf.set_stringn(
                        row.x + 2,
                        row.y + 1,
                        format!("{prefix}{first}"),
                        row.width.saturating_sub(2) as usize,
                        theme::base(),
                    );
                }
            },
        );

        render_footer(inner, buf, list.is_loading(), list.error());
    }
}

/// One conversation, oldest message first.
pub struct ConversationView<'a> {
    pub peer: &'a str,
    pub app: &'a App,
}

impl<'a> ConversationView<'a> {
    pub fn new(peer: &'a str, app: &'a App) -> Self {
        Self { peer, app }
    }
}

fn bubble_height(msg: &ChatMessage, width: u16) -> u16 {
    1 + wrap_text(&msg.text, width.saturating_sub(2) as usize).len() as u16
}

impl Widget for ConversationView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let me = self.app.me();
        let title = self
            .app
            .conversation
            .iter()
            .find_map(|m| m.peer(&me).filter(|p| p.did == self.peer))
            .map_or_else(|| self.peer.to_owned(), |p| format!("@{}", p.handle));
        let block = theme::panel(&title);
        let inner = block.inner(area);
        block.render(area, buf);

        if self.app.conversation.is_empty() {
            render_placeholder(inner, buf, self.app.loading, None, "say hello with m");
            return;
        }

        let now = Utc::now();
        let width = inner.width.saturating_sub(1);
        CardList::new(&self.app.conversation, self.app.selected_index(), width, bubble_height)
            .render(inner, buf, |_, msg, selected, row, buf| {
                let mine = msg.author.did == me;
                let who = if mine {
                    "you".to_owned()
                } else {
                    msg.author.name().to_owned()
                };
                let who_style = match (selected, mine) {
                    (true, _) => theme::selected(),
                    (false, true) => theme::dim(),
                    (false, false) => theme::bright(),
                };
                let age = msg
                    .created_at
                    .as_deref()
                    .map(|ts| relative_age(ts, now))
                    .unwrap_or_default();
                let header = Line::from(vec![
                    Span::styled(if mine { "> " } else { "< " }, theme::faint()),
                    Span::styled(who, who_style),
                    Span::styled(format!(" \u{b7} {age}"), theme::dim()),
                ]);
                buf.set_line(row.x, row.y, &header, row.width);

                let text_style = if mine { theme::dim() } else { theme::base() };
                for (i, line) in wrap_text(&msg.text, row.width.saturating_sub(2) as usize)
                    .iter()
                    .enumerate()
                    .take(row.height.saturating_sub(1) as usize)
                {
                    buf.set_string(row.x + 2, row.y + 1 + i as u16, line, text_style);
                }
            });
    }
}
