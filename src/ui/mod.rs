pub mod command_bar;
pub mod compose;
pub mod error_popup;
pub mod feed;
pub mod help;
pub mod input;
pub mod list;
pub mod login;
pub mod messages;
pub mod notifications;
pub mod post;
pub mod profile;
pub mod search;
pub mod status_bar;
pub mod theme;
pub mod thread;

use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};

use crate::app::{App, AppMode};
use crate::event::ViewKind;

use command_bar::CommandBar;
use compose::ComposeView;
use error_popup::ErrorPopup;
use feed::FeedView;
use help::HelpView;
use login::LoginView;
use messages::{ConversationView, MessagesView};
use notifications::NotificationsView;
use profile::ProfileView;
use search::SearchView;
use status_bar::StatusBar;
use thread::ThreadView;

pub fn draw(frame: &mut Frame, app: &App) {
    let area = frame.area();
    theme::paint_background(area, frame.buffer_mut());

    // Layout: main content + status bar + optional input bar
    let has_input_bar = matches!(app.mode, AppMode::Command | AppMode::Search);
    let bottom_height = if has_input_bar { 2 } else { 1 };

    let [main_area, bottom_area] =
        Layout::vertical([Constraint::Min(1), Constraint::Length(bottom_height)]).areas(area);

    if has_input_bar {
        let [status_area, cmd_area] =
            Layout::vertical([Constraint::Length(1), Constraint::Length(1)]).areas(bottom_area);
        frame.render_widget(StatusBar::new(app), status_area);
        frame.render_widget(CommandBar::new(app), cmd_area);
    } else {
        frame.render_widget(StatusBar::new(app), bottom_area);
    }

    match app.current_view() {
        Some(ViewKind::Help) => {
            // Render the view underneath first, then overlay help.
            if let Some(prev) = app.view_stack.iter().rev().nth(1) {
                render_view(frame, app, &prev.kind, main_area);
            }
            frame.render_widget(HelpView::new(), main_area);
        }
        Some(kind) => render_view(frame, app, kind, main_area),
        None => {}
    }

    if let Some(compose) = &app.compose {
        frame.render_widget(ComposeView::new(compose), main_area);
    }

    // Error detail popup overlay (renders on top of everything)
    if let Some(ref detail) = app.error_detail {
        frame.render_widget(ErrorPopup::new(detail), frame.area());
    }

    if app.preferences.crt_mode {
        theme::apply_scanlines(area, frame.buffer_mut());
    }
}

fn render_view(frame: &mut Frame, app: &App, kind: &ViewKind, area: Rect) {
    match kind {
        ViewKind::Timeline => {
            frame.render_widget(FeedView::new("Timeline", &app.timeline, app), area);
        }
        ViewKind::Notifications => {
            frame.render_widget(NotificationsView::new(app), area);
        }
        ViewKind::Search => {
            frame.render_widget(SearchView::new(app), area);
        }
        ViewKind::Messages => {
            frame.render_widget(MessagesView::new(app), area);
        }
        ViewKind::Conversation(peer) => {
            frame.render_widget(ConversationView::new(peer, app), area);
        }
        ViewKind::Profile(_) => match &app.viewed_profile {
            Some(profile) => frame.render_widget(ProfileView::new(profile, app), area),
            None => frame.render_widget(FeedView::new("Profile", &app.author_feed.posts, app), area),
        },
        ViewKind::Thread(_) => {
            frame.render_widget(ThreadView::new(app.thread.as_ref(), app), area);
        }
        ViewKind::Login => {
            frame.render_widget(LoginView::new(&app.login_form), area);
        }
        ViewKind::Help => {}
    }
}
