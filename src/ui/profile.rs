use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Widget, Wrap};

use crate::api::types::Profile;
use crate::app::{App, ProfileTab};
use crate::interaction::FollowState;
use crate::ui::feed::FeedView;
use crate::ui::post::format_count;
use crate::ui::theme;

/// Profile header (name, counts, follow state, bio) over the author's posts.
pub struct ProfileView<'a> {
    pub profile: &'a Profile,
    pub follow: Option<&'a FollowState>,
    pub app: &'a App,
}

impl<'a> ProfileView<'a> {
    pub fn new(profile: &'a Profile, app: &'a App) -> Self {
        Self {
            profile,
            follow: app.follow_state.as_ref(),
            app,
        }
    }
}

impl Widget for ProfileView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let p = self.profile;
        let handle = format!("@{}", p.handle);
        let block = theme::panel(&handle);
        let inner = block.inner(area);
        block.render(area, buf);

        let bio = p.description.as_deref().unwrap_or_default().trim();
        let bio_lines = if bio.is_empty() { 0 } else { 3 };
        let [info_area, feed_area] =
            Layout::vertical([Constraint::Length(3 + bio_lines), Constraint::Min(1)]).areas(inner);

        // -- Info section --
        let name = p
            .display_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&p.handle);
        let mut title = vec![Span::styled(name, theme::bright())];
        if p.did == self.app.me() {
            title.push(Span::styled("  (you)", theme::dim()));
        } else if let Some(state) = self.follow {
            let label = match (state.is_busy(), state.following) {
                (true, _) => "  [...]",
                (false, true) => "  [following] f to unfollow",
                (false, false) => "  [not following] f to follow",
            };
            title.push(Span::styled(label, theme::dim()));
        }

        let followers = self.follow.map_or(p.followers_count, |s| s.followers_count);
        let counts = |n: u64, label: &'static str| {
            [
                Span::styled(format_count(n), theme::bright()),
                Span::styled(label, theme::dim()),
            ]
        };
        let mut stats = Vec::new();
        stats.extend(counts(followers, " followers  "));
        stats.extend(counts(p.follows_count, " following  "));
        stats.extend(counts(p.posts_count, " posts"));

        let mut lines = vec![
            Line::from(title),
            Line::from(Span::styled(format!("@{}", p.handle), theme::dim())),
            Line::from(stats),
        ];
        if !bio.is_empty() {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(bio, theme::base())));
        }
        Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .render(info_area, buf);

        // -- Posts --
        let feed = &self.app.author_feed;
        let posts_block = Block::default()
            .borders(Borders::TOP)
            .title(tab_strip(feed.tab))
            .border_style(theme::faint());
        FeedView::new(feed.tab.label(), &feed.posts, self.app)
            .block(posts_block)
            .render(feed_area, buf);
    }
}

/// `Posts | Replies | Media` with the active tab lit; Tab cycles.
fn tab_strip(active: ProfileTab) -> Line<'static> {
    let mut spans = vec![Span::raw(" ")];
    for (i, tab) in ProfileTab::ALL.into_iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" | ", theme::faint()));
        }
        let style = if tab == active {
            theme::selected()
        } else {
            theme::dim()
        };
        spans.push(Span::styled(tab.label(), style));
    }
    spans.push(Span::styled("  [tab] ", theme::faint()));
    Line::from(spans)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tab_strip_lights_only_the_active_tab() {
        let line = tab_strip(ProfileTab::Replies);
        let lit: Vec<_> = line
            .spans
            .iter()
            .filter(|s| s.style == theme::selected())
            .map(|s| s.content.as_ref())
            .collect();
        assert_eq!(lit, ["Replies"]);
        let text: String = line.spans.iter().map(|s| s.content.as_ref()).collect();
        assert!(text.contains("Posts | Replies | Media"));
    }
}
