use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::widgets::{Block, Widget};

use crate::api::types::FeedViewPost;
use crate::app::App;
use crate::pagination::Paginator;
use crate::ui::list::{CardList, render_footer, render_placeholder};
use crate::ui::post::{PostCard, post_card_height};
use crate::ui::theme;

/// A scrollable list of posts with selection highlight.
///
/// Used by the home timeline and a profile's posts.
pub struct FeedView<'a> {
    pub title: &'a str,
    pub feed: &'a Paginator<FeedViewPost>,
    pub app: &'a App,
    pub block: Option<Block<'a>>,
}

impl<'a> FeedView<'a> {
    pub fn new(title: &'a str, feed: &'a Paginator<FeedViewPost>, app: &'a App) -> Self {
        Self {
            title,
            feed,
            app,
            block: None,
        }
    }

    /// Replace the default titled panel.
    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = Some(block);
        self
    }
}

impl Widget for FeedView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = self.block.unwrap_or_else(|| theme::panel(self.title));
        let inner = block.inner(area);
        block.render(area, buf);

        let items = self.feed.items();
        if items.is_empty() {
            render_placeholder(
                inner,
                buf,
                self.feed.is_loading(),
                self.feed.error(),
                "no posts to display",
            );
            return;
        }

        let width = inner.width.saturating_sub(1);
        CardList::new(items, self.app.selected_index(), width, |item, w| {
            post_card_height(&item.post, w)
        })
        .render(inner, buf, |_, item, selected, row, buf| {
            PostCard::new(&item.post, self.app.interaction_for(&item.post))
                .selected(selected)
                .render(row, buf);
        });

        render_footer(inner, buf, self.feed.is_loading(), self.feed.error());
    }
}
