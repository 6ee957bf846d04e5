use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Clear, Paragraph, Widget};

use crate::ui::theme;

/// Help overlay showing keybindings.
#[derive(Default)]
pub struct HelpView;

impl HelpView {
    pub fn new() -> Self {
        Self
    }
}

const SECTIONS: &[(&str, &[(&str, &str)])] = &[
    (
        "Navigation",
        &[
            ("j/Down", "Move down (loads more near the end)"),
            ("k/Up", "Move up"),
            ("Enter", "Open post, profile or conversation"),
            ("Esc/q", "Go back / quit"),
            ("r", "Refresh or retry"),
            ("n", "Load next page"),
        ],
    ),
    (
        "Views",
        &[
            ("1 2 3 4", "Timeline, notifications, search, messages"),
            ("p", "Author's profile"),
            ("?", "This help screen"),
        ],
    ),
    (
        "Actions",
        &[
            ("c", "New post"),
            ("a", "Reply to selected post"),
            ("l / t", "Like / repost"),
            ("f", "Follow or unfollow (profile)"),
            ("Tab", "Profile posts / replies / media"),
            ("m", "Send a message"),
            ("C / S", "Toggle CRT mode / sound"),
        ],
    ),
    (
        "Input",
        &[
            (":", "Command mode (:profile, :open, :post, :logout ...)"),
            ("/", "Search accounts"),
            ("Ctrl-C", "Quit"),
        ],
    ),
];

impl Widget for HelpView {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let rows: u16 = SECTIONS
            .iter()
            .map(|(_, keys)| keys.len() as u16 + 2)
            .sum();
        let width = 64u16.min(area.width.saturating_sub(4));
        let height = (rows + 1).min(area.height.saturating_sub(2));
        let x = area.x + (area.width.saturating_sub(width)) / 2;
        let y = area.y + (area.height.saturating_sub(height)) / 2;
        let panel = Rect::new(x, y, width, height);

        Clear.render(panel, buf);
        theme::paint_background(panel, buf);

        let block = theme::panel("Help - Keybindings").border_style(theme::bright());
        let inner = block.inner(panel);
        block.render(panel, buf);

        let mut lines: Vec<Line<'_>> = Vec::new();
        for (i, (section, keys)) in SECTIONS.iter().enumerate() {
            if i > 0 {
                lines.push(Line::from(""));
            }
            lines.push(Line::from(Span::styled(*section, theme::bright())));
            for (key, desc) in keys.iter() {
                lines.push(binding_line(key, desc, theme::alert(), theme::base()));
            }
        }

        Paragraph::new(lines).render(inner, buf);
    }
}

fn binding_line<'a>(key: &'a str, desc: &'a str, key_style: Style, desc_style: Style) -> Line<'a> {
    Line::from(vec![
        Span::styled(format!("  {key:<12}"), key_style),
        Span::styled(desc, desc_style),
    ])
}
