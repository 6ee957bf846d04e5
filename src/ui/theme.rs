//! Green-phosphor palette shared by every widget.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders};

pub const PHOSPHOR: Color = Color::Rgb(0x33, 0xff, 0x66);
pub const PHOSPHOR_DIM: Color = Color::Rgb(0x1f, 0x99, 0x3d);
pub const PHOSPHOR_FAINT: Color = Color::Rgb(0x0f, 0x4d, 0x1f);
pub const BACKGROUND: Color = Color::Rgb(0x03, 0x0a, 0x04);
pub const SCANLINE: Color = Color::Rgb(0x00, 0x00, 0x00);
/// Amber, for errors and the over-limit counter.
pub const ALERT: Color = Color::Rgb(0xff, 0xb0, 0x00);

pub fn base() -> Style {
    Style::default().fg(PHOSPHOR).bg(BACKGROUND)
}

pub fn dim() -> Style {
    Style::default().fg(PHOSPHOR_DIM)
}

pub fn faint() -> Style {
    Style::default().fg(PHOSPHOR_FAINT)
}

pub fn bright() -> Style {
    Style::default().fg(PHOSPHOR).add_modifier(Modifier::BOLD)
}

/// Selected rows render in reverse video.
pub fn selected() -> Style {
    Style::default()
        .fg(BACKGROUND)
        .bg(PHOSPHOR)
        .add_modifier(Modifier::BOLD)
}

pub fn alert() -> Style {
    Style::default().fg(ALERT).add_modifier(Modifier::BOLD)
}

/// Bordered panel with the title in bright phosphor.
pub fn panel(title: &str) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .title(format!(" {title} "))
        .title_style(bright())
        .border_style(dim())
}

pub fn paint_background(area: Rect, buf: &mut Buffer) {
    buf.set_style(area, base());
}

/// Darken every other row, the way a CRT shows its scanlines.
pub fn apply_scanlines(area: Rect, buf: &mut Buffer) {
    for y in (area.y..area.y + area.height).filter(|y| (y - area.y) % 2 == 1) {
        for x in area.x..area.x + area.width {
            let cell = &mut buf[(x, y)];
            if cell.bg == BACKGROUND || cell.bg == Color::Reset {
                cell.set_bg(SCANLINE);
            }
            if cell.fg == PHOSPHOR {
                cell.set_fg(PHOSPHOR_DIM);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scanlines_touch_odd_rows_only() {
        let area = Rect::new(0, 0, 3, 4);
        let mut buf = Buffer::empty(area);
        paint_background(area, &mut buf);

        apply_scanlines(area, &mut buf);

        assert_eq!(buf[(0, 0)].bg, BACKGROUND);
        assert_eq!(buf[(0, 0)].fg, PHOSPHOR);
        assert_eq!(buf[(2, 1)].bg, SCANLINE);
        assert_eq!(buf[(2, 1)].fg, PHOSPHOR_DIM);
        assert_eq!(buf[(1, 2)].bg, BACKGROUND);
        assert_eq!(buf[(1, 3)].bg, SCANLINE);
    }

    #[test]
    fn scanlines_keep_selection_background() {
        let area = Rect::new(0, 0, 2, 2);
        let mut buf = Buffer::empty(area);
        buf.set_style(area, selected());

        apply_scanlines(area, &mut buf);

        assert_eq!(buf[(0, 1)].bg, PHOSPHOR);
    }
}
