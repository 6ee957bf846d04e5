use ratatui::buffer::Buffer;
use ratatui::layout::Rect;

use crate::ui::theme;

/// Variable-height rows drawn from a scroll offset that keeps the selected
/// row on screen, with a rule between rows.
///
/// Shared by the feed, notification, search, message and thread views.
pub struct CardList<'a, T> {
    items: &'a [T],
    selected: usize,
    heights: Vec<u16>,
}

impl<'a, T> CardList<'a, T> {
    /// `height` gives each row's height at the given content width.
    pub fn new(items: &'a [T], selected: usize, width: u16, height: impl Fn(&T, u16) -> u16) -> Self {
        let heights = items.iter().map(|item| height(item, width)).collect();
        Self {
            items,
            selected,
            heights,
        }
    }

    /// Draw the visible rows into `inner`. The closure paints one row.
    pub fn render(
        self,
        inner: Rect,
        buf: &mut Buffer,
        mut draw: impl FnMut(usize, &T, bool, Rect, &mut Buffer),
    ) {
        if self.items.is_empty() || inner.height == 0 {
            return;
        }

        let content_width = inner.width.saturating_sub(1); // 1 char left margin
        // Each row reserves one extra line for its separator.
        let with_rules: Vec<u16> = self.heights.iter().map(|h| h + 1).collect();
        let scroll_start = compute_scroll_start(&with_rules, self.selected, inner.height);

        let bottom = inner.y + inner.height;
        let mut y = inner.y;
        let mut idx = scroll_start;
        while idx < self.items.len() && y < bottom {
            let render_h = with_rules[idx].min(bottom - y);
            let row = Rect::new(inner.x + 1, y, content_width, render_h.saturating_sub(1).max(1));
            draw(idx, &self.items[idx], idx == self.selected, row, buf);

            y += render_h;

            if y < bottom && idx + 1 < self.items.len() {
                let rule = "\u{2500}".repeat(content_width as usize);
                buf.set_string(inner.x + 1, y.saturating_sub(1), &rule, theme::faint());
            }

            idx += 1;
        }
    }
}

/// Message drawn in place of an empty list.
pub fn render_placeholder(inner: Rect, buf: &mut Buffer, loading: bool, error: Option<&str>, empty: &str) {
    if inner.height == 0 || inner.width < 2 {
        return;
    }
    let (msg, style) = match (loading, error) {
        (true, _) => ("loading...", theme::dim()),
        (false, Some(err)) => (err, theme::alert()),
        (false, None) => (empty, theme::dim()),
    };
    buf.set_stringn(inner.x + 1, inner.y, msg, (inner.width - 1) as usize, style);
    if error.is_some() && !loading && inner.height > 1 {
        buf.set_string(inner.x + 1, inner.y + 1, "press r to retry", theme::faint());
    }
}

/// Footer line for a list that has items and more to fetch, or failed mid-way.
pub fn render_footer(area: Rect, buf: &mut Buffer, loading: bool, error: Option<&str>) {
    if area.height == 0 || area.width < 2 {
        return;
    }
    let y = area.y + area.height - 1;
    let (msg, style) = match (loading, error) {
        (true, _) => ("loading more...".to_owned(), theme::dim()),
        (false, Some(err)) => (format!("{err} (n to retry)"), theme::alert()),
        (false, None) => return,
    };
    buf.set_stringn(area.x + 1, y, msg, (area.width - 1) as usize, style);
}

/// Find the smallest scroll start index so that the selected item fits
/// within the available height.
pub fn compute_scroll_start(heights: &[u16], selected: usize, available: u16) -> usize {
    if heights.is_empty() {
        return 0;
    }

    let selected = selected.min(heights.len() - 1);
    if available == 0 {
        return selected;
    }

    // Pack as many earlier rows above the selection as fit.
    let mut start = selected;
    let mut used = heights[selected];

    while start > 0 {
        let next = used.saturating_add(heights[start - 1]);
        if next > available {
            break;
        }
        start -= 1;
        used = next;
    }

    start
}
