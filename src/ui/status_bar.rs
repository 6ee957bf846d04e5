use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Widget;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::app::{App, AppMode};
use crate::event::ViewKind;
use crate::ui::theme;

/// Bottom status bar showing mode, current view, and status messages.
pub struct StatusBar<'a> {
    pub app: &'a App,
}

impl<'a> StatusBar<'a> {
    pub fn new(app: &'a App) -> Self {
        Self { app }
    }
}

fn mode_label(mode: &AppMode) -> &'static str {
    match mode {
        AppMode::Normal => " NORMAL ",
        AppMode::Command => " COMMAND ",
        AppMode::Search => " SEARCH ",
        AppMode::Compose => " COMPOSE ",
        AppMode::Login => " LOGIN ",
    }
}

fn view_label(app: &App) -> String {
    match app.current_view() {
        Some(ViewKind::Timeline) => "Timeline".to_string(),
        Some(ViewKind::Notifications) => "Notifications".to_string(),
        Some(ViewKind::Search) => {
            if app.search_query.is_empty() {
                "Search".to_string()
            } else {
                format!("Search: {}", app.search_query)
            }
        }
        Some(ViewKind::Messages) => "Messages".to_string(),
        Some(ViewKind::Conversation(_)) => "Conversation".to_string(),
        Some(ViewKind::Profile(actor)) => format!("@{actor}"),
        Some(ViewKind::Thread(_)) => "Thread".to_string(),
        Some(ViewKind::Login) => "Sign in".to_string(),
        Some(ViewKind::Help) => "Help".to_string(),
        None => "skeetboy".to_string(),
    }
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width == 0 {
            return;
        }

        let bar_style = Style::default()
            .fg(theme::PHOSPHOR)
            .bg(theme::PHOSPHOR_FAINT);
        buf.set_style(Rect::new(area.x, area.y, area.width, 1), bar_style);

        let mode_style = theme::selected().add_modifier(Modifier::BOLD);
        let mut spans = vec![
            Span::styled(mode_label(&self.app.mode), mode_style),
            Span::styled(" ", bar_style),
            Span::styled(view_label(self.app), bar_style),
        ];

        if let Some(handle) = self.app.handle() {
            spans.push(Span::styled(format!("  @{handle}"), bar_style));
        }

        // Preference flags
        let prefs = self.app.preferences;
        let flags = format!(
            "  {}{}",
            if prefs.crt_mode { "[crt]" } else { "" },
            if prefs.sound_enabled { "[bell]" } else { "" },
        );
        spans.push(Span::styled(flags, bar_style));

        if self.app.is_busy() {
            spans.push(Span::styled(
                " [loading...]",
                bar_style.add_modifier(Modifier::BOLD),
            ));
        }

        // Status message (right-aligned)
        if let Some(ref msg) = self.app.status_message {
            let left_width: usize = spans.iter().map(|s| s.width()).sum();
            let room = (area.width as usize).saturating_sub(left_width + 1);
            let msg: String = msg
                .chars()
                .scan(0, |used, ch| {
                    *used += ch.width().unwrap_or(0);
                    (*used <= room).then_some(ch)
                })
                .collect();
            let padding = (area.width as usize).saturating_sub(left_width + msg.width());
            spans.push(Span::styled(" ".repeat(padding), bar_style));
            spans.push(Span::styled(msg, Style::default().fg(theme::ALERT).bg(theme::PHOSPHOR_FAINT)));
        }

        let line = Line::from(spans);
        buf.set_line(area.x, area.y, &line, area.width);
    }
}
