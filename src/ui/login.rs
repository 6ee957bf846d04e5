use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Paragraph, Widget};

use crate::app::{LoginField, LoginForm};
use crate::ui::input::TextInput;
use crate::ui::theme;

const BANNER: &[&str] = &[
    " ___ _  _____ ___ _____ ___  _____   __",
    "/ __| |/ / __| __|_   _| _ )/ _ \\ \\ / /",
    "\\__ \\ ' <| _|| _|  | | | _ \\ (_) \\ V / ",
    "|___/_|\\_\\___|___| |_| |___/\\___/ |_|  ",
];

/// Sign-in screen: handle and app password.
pub struct LoginView<'a> {
    form: &'a LoginForm,
}

impl<'a> LoginView<'a> {
    pub fn new(form: &'a LoginForm) -> Self {
        Self { form }
    }
}

impl Widget for LoginView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = theme::panel("Sign in");
        let inner = block.inner(area);
        block.render(area, buf);

        let width = 44u16.min(inner.width);
        let x = inner.x + (inner.width.saturating_sub(width)) / 2;
        let height = BANNER.len() as u16 + 9;
        let mut y = inner.y + inner.height.saturating_sub(height) / 2;
        let bottom = inner.y + inner.height;

        let banner: Vec<Line<'_>> = BANNER
            .iter()
            .map(|l| Line::from(Span::styled(*l, theme::bright())))
            .collect();
        let banner_h = (BANNER.len() as u16).min(bottom.saturating_sub(y));
        Paragraph::new(banner).render(Rect::new(x, y, width, banner_h), buf);
        y += banner_h + 1;

        let fields = [
            (LoginField::Identifier, "handle   ", self.form.identifier.clone()),
            (LoginField::Password, "password ", "*".repeat(self.form.password.chars().count())),
        ];
        for (field, label, value) in fields {
            if y >= bottom {
                return;
            }
            let focused = self.form.focus == field;
            let style = if focused { theme::bright() } else { theme::dim() };
            let row = Rect::new(x, y, width, 1);
            if focused && !self.form.submitting {
                TextInput::new(label, &value).style(style).render(row, buf);
            } else {
                buf.set_stringn(x, y, format!("{label}{value}"), width as usize, style);
            }
            y += 2;
        }

        if y >= bottom {
            return;
        }
        if self.form.submitting {
            buf.set_string(x, y, "signing in...", theme::dim());
        } else if let Some(err) = &self.form.error {
            buf.set_stringn(x, y, err, width as usize, theme::alert());
        }
        y += 2;

        if y < bottom {
            buf.set_stringn(
                x,
                y,
                "tab switch field  enter sign in  esc quit",
                width as usize,
                theme::faint(),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(form: &LoginForm) -> String {
        let area = Rect::new(0, 0, 60, 24);
        let mut buf = Buffer::empty(area);
        LoginView::new(form).render(area, &mut buf);
        buf.content().iter().map(|c| c.symbol()).collect()
    }

    #[test]
    fn password_is_masked() {
        let form = LoginForm {
            identifier: "alice.test".into(),
            password: "hunter2".into(),
            focus: LoginField::Identifier,
            ..LoginForm::default()
        };
        let screen = rendered(&form);
        assert!(screen.contains("alice.test"));
        assert!(screen.contains("*******"));
        assert!(!screen.contains("hunter2"));
    }

    #[test]
    fn shows_login_error() {
        let form = LoginForm {
            error: Some("invalid identifier or password".into()),
            ..LoginForm::default()
        };
        assert!(rendered(&form).contains("invalid identifier or password"));
    }
}
