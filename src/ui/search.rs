use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::Widget;

use crate::api::types::SearchActor;
use crate::app::App;
use crate::ui::list::{CardList, render_footer, render_placeholder};
use crate::ui::theme;

/// Search view: matching accounts with their bio's first line.
pub struct SearchView<'a> {
    pub app: &'a App,
}

impl<'a> SearchView<'a> {
    pub fn new(app: &'a App) -> Self {
        Self { app }
    }
}

fn row_height(actor: &SearchActor, _width: u16) -> u16 {
    if actor.description.as_deref().is_some_and(|d| !d.trim().is_empty()) {
        2
    } else {
        1
    }
}

impl Widget for SearchView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let title = if self.app.search_query.is_empty() {
            "Search (press / to search)".to_string()
        } else {
            format!("Search: {}", self.app.search_query)
        };
        let block = theme::panel(&title);
        let inner = block.inner(area);
        block.render(area, buf);

        let results = &self.app.search_results;
        if results.items().is_empty() {
            let empty = if self.app.search_query.is_empty() {
                "type / and a name or handle"
            } else {
                "no accounts found"
            };
            render_placeholder(inner, buf, results.is_loading(), results.error(), empty);
            return;
        }

        let width = inner.width.saturating_sub(1);
        CardList::new(results.items(), self.app.selected_index(), width, row_height).render(
            inner,
            buf,
            |_, actor, selected, row, buf| {
                let name_style = if selected {
                    theme::selected()
                } else {
                    theme::bright()
                };
                let mut spans = vec![
                    Span::styled(actor.actor().name().to_owned(), name_style),
                    Span::styled(format!(" @{}", actor.handle), theme::dim()),
                ];
                if actor.is_followed() {
                    spans.push(Span::styled(" [following]", theme::faint()));
                }
                buf.set_line(row.x, row.y, &Line::from(spans), row.width);

                if row.height > 1
                    && let Some(bio) = actor.description.as_deref()
                {
                    let first = bio.lines().next().unwrap_or_default();
                    buf.set_stringn(
                        row.x + 2,
                        row.y + 1,
                        first,
                        row.width.saturating_sub(2) as usize,
                        theme::base(),
                    );
                }
            },
        );

        render_footer(inner, buf, results.is_loading(), results.error());
    }
}
