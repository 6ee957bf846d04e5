use chrono::{DateTime, Utc};
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Widget;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::api::types::{Post, relative_age};
use crate::interaction::PostInteraction;
use crate::ui::theme;

/// Renders a single post as a compact card.
///
/// Layout:
///   Display Name @handle · 2h                     [reply]
///   Post text (may wrap) ...
///   ♥ 12  ↻ 3  ↩ 5
pub struct PostCard<'a> {
    pub post: &'a Post,
    pub interaction: PostInteraction,
    pub selected: bool,
    pub now: DateTime<Utc>,
}

impl<'a> PostCard<'a> {
    pub fn new(post: &'a Post, interaction: PostInteraction) -> Self {
        Self {
            post,
            interaction,
            selected: false,
            now: Utc::now(),
        }
    }

    pub fn selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }
}

impl Widget for PostCard<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width == 0 {
            return;
        }

        let name_style = if self.selected {
            theme::selected()
        } else {
            theme::bright()
        };

        let mut y = area.y;

        // -- Line 1: author + age --
        let author = &self.post.author;
        let mut header = vec![
            Span::styled(author.name().to_owned(), name_style),
            Span::styled(format!(" @{}", author.handle), theme::dim()),
        ];
        let age = self
            .post
            .indexed_at
            .as_deref()
            .or(self.post.record.created_at.as_deref())
            .map(|ts| relative_age(ts, self.now))
            .unwrap_or_default();
        if !age.is_empty() {
            header.push(Span::styled(format!(" \u{b7} {age}"), theme::dim()));
        }
        if self.post.record.reply.is_some() {
            header.push(Span::styled(" [reply]", theme::faint()));
        }
        buf.set_line(area.x, y, &Line::from(header), area.width);
        y += 1;

        if y >= area.y + area.height {
            return;
        }

        // -- Line 2+: text --
        let max_text_lines = (area.height - (y - area.y)).saturating_sub(1).max(1) as usize;
        for line in wrap_text(&self.post.record.text, area.width as usize)
            .into_iter()
            .take(max_text_lines)
        {
            if y >= area.y + area.height {
                break;
            }
            buf.set_string(area.x, y, &line, theme::base());
            y += 1;
        }

        if y >= area.y + area.height {
            return;
        }

        // -- Last line: engagement --
        buf.set_line(area.x, y, &metrics_line(&self.interaction, self.post.reply_count), area.width);
    }
}

fn metrics_line(state: &PostInteraction, replies: u64) -> Line<'static> {
    let active = |on: bool| {
        if on {
            theme::bright()
        } else {
            theme::dim()
        }
    };
    let heart = if state.liked { "\u{2665}" } else { "\u{2661}" };
    let mut spans = vec![
        Span::styled(format!("{heart} {}", format_count(state.like_count)), active(state.liked)),
        Span::raw("  "),
        Span::styled(
            format!("\u{21bb} {}", format_count(state.repost_count)),
            active(state.reposted),
        ),
        Span::raw("  "),
        Span::styled(format!("\u{21a9} {}", format_count(replies)), theme::dim()),
    ];
    if state.is_busy() {
        spans.push(Span::styled(
            "  \u{2026}",
            Style::default().add_modifier(Modifier::SLOW_BLINK),
        ));
    }
    Line::from(spans)
}

/// Height in lines needed for a post card.
pub fn post_card_height(post: &Post, width: u16) -> u16 {
    let text_lines = wrap_text(&post.record.text, width as usize).len() as u16;
    // header + text + metrics
    1 + text_lines + 1
}

/// Greedy word wrap by display width. Words wider than `width` are split.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![];
    }
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        if paragraph.trim().is_empty() {
            lines.push(String::new());
            continue;
        }
        let mut current = String::new();
        let mut current_width = 0;
        for word in paragraph.split_whitespace() {
            let word_width = word.width();
            if current.is_empty() && word_width <= width {
                current.push_str(word);
                current_width = word_width;
            } else if current_width + 1 + word_width <= width {
                current.push(' ');
                current.push_str(word);
                current_width += 1 + word_width;
            } else if word_width <= width {
                lines.push(std::mem::take(&mut current));
                current.push_str(word);
                current_width = word_width;
            } else {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                current_width = 0;
                for ch in word.chars() {
                    let w = ch.width().unwrap_or(0);
                    if current_width + w > width {
                        lines.push(std::mem::take(&mut current));
                        current_width = 0;
                    }
                    current.push(ch);
                    current_width += w;
                }
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

pub fn format_count(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_on_word_boundaries() {
        assert_eq!(wrap_text("one two three", 7), ["one two", "three"]);
        assert_eq!(wrap_text("", 10), [""]);
        assert_eq!(wrap_text("a\n\nb", 10), ["a", "", "b"]);
    }

    #[test]
    fn splits_words_longer_than_width() {
        assert_eq!(wrap_text("hi abcdefgh", 4), ["hi", "abcd", "efgh"]);
    }

    #[test]
    fn measures_wide_characters() {
        // Each CJK character is two columns wide.
        assert_eq!(wrap_text("\u{65e5}\u{672c}\u{8a9e}", 4), ["\u{65e5}\u{672c}", "\u{8a9e}"]);
    }

    #[test]
    fn formats_counts() {
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1_500), "1.5K");
        assert_eq!(format_count(2_000_000), "2.0M");
    }

    #[test]
    fn card_height_counts_wrapped_text() {
        let post: Post = serde_json::from_value(crate::api::stub::post_json(1)).unwrap();
        let lines = wrap_text(&post.record.text, 10).len() as u16;
        assert_eq!(post_card_height(&post, 10), lines + 2);
    }
}
