use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::DefaultTerminal;
use tokio::sync::mpsc::UnboundedSender;

use crate::api::feeds::{AuthorFilter, Endpoint, FeedEnvelope};
use crate::api::records::validate_post_text;
use crate::api::types::{
    Actor, ChatMessage, FeedViewPost, Notification, Post, PostThread, Profile, RecordRef,
    ReplyRef, SearchActor, conversation_heads,
};
use crate::api::{BskyClient, user_message};
use crate::auth::credentials::LoginCredentials;
use crate::auth::session::Preferences;
use crate::command::{self, Command};
use crate::config::{AppConfig, DefaultView};
use crate::event::{ApiResult, AppEvent, Event, EventHandler, ListKind, PageData, ViewKind};
use crate::interaction::{FollowAction, FollowState, PostInteraction};
use crate::pagination::{PageRequest, Paginator};
use crate::ui;

// ---------------------------------------------------------------------------
// App mode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppMode {
    Normal,
    Command,
    Search,
    Compose,
    Login,
}

// ---------------------------------------------------------------------------
// View state
// ---------------------------------------------------------------------------

pub struct ViewState {
    pub kind: ViewKind,
    pub selected_index: usize,
}

// ---------------------------------------------------------------------------
// Profile posts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProfileTab {
    #[default]
    Posts,
    Replies,
    Media,
}

impl ProfileTab {
    pub const ALL: [ProfileTab; 3] = [ProfileTab::Posts, ProfileTab::Replies, ProfileTab::Media];

    pub fn label(self) -> &'static str {
        match self {
            ProfileTab::Posts => "Posts",
            ProfileTab::Replies => "Replies",
            ProfileTab::Media => "Media",
        }
    }

    pub fn filter(self) -> Option<AuthorFilter> {
        match self {
            ProfileTab::Posts => None,
            ProfileTab::Replies => Some(AuthorFilter::Replies),
            ProfileTab::Media => Some(AuthorFilter::Media),
        }
    }

    pub fn next(self) -> Self {
        match self {
            ProfileTab::Posts => ProfileTab::Replies,
            ProfileTab::Replies => ProfileTab::Media,
            ProfileTab::Media => ProfileTab::Posts,
        }
    }
}

/// Posts of the viewed profile under the selected tab.
#[derive(Debug, Default)]
pub struct AuthorFeed {
    pub actor: String,
    pub tab: ProfileTab,
    pub posts: Paginator<FeedViewPost>,
}

impl AuthorFeed {
    /// List key for the current actor and tab; `None` before a profile loads.
    pub fn list(&self) -> Option<ListKind> {
        if self.actor.is_empty() {
            return None;
        }
        Some(ListKind::AuthorFeed {
            actor: self.actor.clone(),
            filter: self.tab.filter(),
        })
    }

    /// Start over on the posts tab of `actor`.
    pub fn open(&mut self, actor: String) -> (ListKind, PageRequest) {
        self.actor = actor;
        self.tab = ProfileTab::Posts;
        let request = self.posts.reset();
        let list = ListKind::AuthorFeed {
            actor: self.actor.clone(),
            filter: None,
        };
        (list, request)
    }

    /// Switch to `tab`, dropping the loaded posts and any in-flight page.
    pub fn select_tab(&mut self, tab: ProfileTab) -> Option<(ListKind, PageRequest)> {
        if self.actor.is_empty() {
            return None;
        }
        self.tab = tab;
        let request = self.posts.reset();
        Some((self.list()?, request))
    }

    /// Whether a page for `list` belongs to what is on screen.
    pub fn accepts(&self, list: &ListKind) -> bool {
        self.list().as_ref() == Some(list)
    }

    fn clear(&mut self) {
        self.posts.clear();
        self.actor.clear();
        self.tab = ProfileTab::Posts;
    }
}

// ---------------------------------------------------------------------------
// Detail views
// ---------------------------------------------------------------------------

/// Which thread, profile and conversation the single-slot detail data belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedDetail {
    pub thread: Option<String>,
    pub profile: Option<String>,
    pub conversation: Option<String>,
}

impl LoadedDetail {
    /// Fetch needed before `kind` can be shown again, when the held data
    /// belongs to a different view.
    pub fn refetch(&self, kind: &ViewKind) -> Option<AppEvent> {
        match kind {
            ViewKind::Thread(uri) if self.thread.as_ref() != Some(uri) => {
                Some(AppEvent::FetchThread { uri: uri.clone() })
            }
            ViewKind::Profile(actor) if self.profile.as_ref() != Some(actor) => {
                Some(AppEvent::FetchProfile {
                    actor: actor.clone(),
                })
            }
            ViewKind::Conversation(did) if self.conversation.as_ref() != Some(did) => {
                Some(AppEvent::FetchConversation { did: did.clone() })
            }
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Compose and login forms
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposeTarget {
    Post,
    Reply {
        parent: RecordRef,
        root: RecordRef,
        handle: String,
    },
    Message {
        did: String,
        handle: String,
    },
}

#[derive(Debug, Clone)]
pub struct ComposeState {
    pub target: ComposeTarget,
    pub text: String,
    pub sending: bool,
    pub error: Option<String>,
}

impl ComposeState {
    fn new(target: ComposeTarget) -> Self {
        Self {
            target,
            text: String::new(),
            sending: false,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoginField {
    #[default]
    Identifier,
    Password,
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub identifier: String,
    pub password: String,
    pub focus: LoginField,
    pub submitting: bool,
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

pub struct App {
    pub running: bool,
    pub events: EventHandler,
    pub config: AppConfig,
    pub client: BskyClient,

    // View system
    pub view_stack: Vec<ViewState>,
    pub mode: AppMode,

    // Paginated lists
    pub timeline: Paginator<FeedViewPost>,
    pub notifications: Paginator<Notification>,
    pub search_results: Paginator<SearchActor>,
    pub search_query: String,
    pub messages: Paginator<ChatMessage>,
    pub author_feed: AuthorFeed,

    // Single-shot views
    pub viewed_profile: Option<Profile>,
    pub follow_state: Option<FollowState>,
    pub thread: Option<PostThread>,
    pub conversation: Vec<ChatMessage>,
    pub loaded: LoadedDetail,

    /// Optimistic like/repost state keyed by post URI.
    pub interactions: HashMap<String, PostInteraction>,
    pub preferences: Preferences,

    // Input state
    pub command_input: String,
    pub search_input: String,
    pub compose: Option<ComposeState>,
    pub login_form: LoginForm,

    // Status
    pub status_message: Option<String>,
    pub error_detail: Option<String>,
    pub loading: bool,
}

impl App {
    pub fn new(config: AppConfig, client: BskyClient) -> Self {
        let session = client.session();
        let preferences = session.preferences();
        let authenticated = session.is_authenticated();

        let (initial_view, mode) = if authenticated {
            (root_view(config.default_view), AppMode::Normal)
        } else {
            (ViewKind::Login, AppMode::Login)
        };

        Self {
            running: true,
            events: EventHandler::new(config.tick_rate_fps),
            config,
            client,
            view_stack: vec![ViewState {
                kind: initial_view,
                selected_index: 0,
            }],
            mode,
            timeline: Paginator::new(),
            notifications: Paginator::new(),
            search_results: Paginator::new(),
            search_query: String::new(),
            messages: Paginator::new(),
            author_feed: AuthorFeed::default(),
            viewed_profile: None,
            follow_state: None,
            thread: None,
            conversation: Vec::new(),
            loaded: LoadedDetail::default(),
            interactions: HashMap::new(),
            preferences,
            command_input: String::new(),
            search_input: String::new(),
            compose: None,
            login_form: LoginForm::default(),
            status_message: None,
            error_detail: None,
            loading: false,
        }
    }

    // -- Main event loop ----------------------------------------------------

    pub async fn run(mut self, mut terminal: DefaultTerminal) -> color_eyre::Result<()> {
        if let Some(kind) = self.current_view().cloned() {
            self.fetch_for_view(&kind);
        }

        while self.running {
            terminal.draw(|frame| self.draw(frame))?;
            match self.events.next().await? {
                Event::Tick => self.tick(),
                Event::Crossterm(event) => {
                    if let crossterm::event::Event::Key(key) = event
                        && key.kind == crossterm::event::KeyEventKind::Press
                    {
                        self.handle_key_event(key);
                    }
                }
                Event::App(app_event) => self.handle_app_event(*app_event),
            }
        }
        Ok(())
    }

    fn draw(&self, frame: &mut ratatui::Frame) {
        ui::draw(frame, self);
    }

    fn tick(&self) {}

    // -- View stack ---------------------------------------------------------

    pub fn current_view(&self) -> Option<&ViewKind> {
        self.view_stack.last().map(|vs| &vs.kind)
    }

    pub fn push_view(&mut self, kind: ViewKind) {
        self.view_stack.push(ViewState {
            kind,
            selected_index: 0,
        });
    }

    pub fn pop_view(&mut self) {
        if self.view_stack.len() > 1 {
            self.view_stack.pop();
        }
        let Some(fetch) = self
            .current_view()
            .and_then(|kind| self.loaded.refetch(kind))
        else {
            return;
        };
        // The slot holds another view's data; drop it until the refetch lands.
        match fetch {
            AppEvent::FetchThread { .. } => {
                self.thread = None;
                self.loaded.thread = None;
            }
            AppEvent::FetchProfile { .. } => {
                self.viewed_profile = None;
                self.follow_state = None;
                self.author_feed.clear();
                self.loaded.profile = None;
            }
            AppEvent::FetchConversation { .. } => {
                self.conversation.clear();
                self.loaded.conversation = None;
            }
            _ => {}
        }
        self.events.send(fetch);
    }

    fn reset_views(&mut self, kind: ViewKind) {
        self.view_stack.clear();
        self.push_view(kind);
    }

    // -- Derived state ------------------------------------------------------

    /// DID of the signed-in account, empty when unknown.
    pub fn me(&self) -> String {
        self.client.session().did().unwrap_or_default()
    }

    pub fn handle(&self) -> Option<String> {
        self.client.session().handle()
    }

    pub fn is_busy(&self) -> bool {
        self.loading
            || self.timeline.is_loading()
            || self.notifications.is_loading()
            || self.search_results.is_loading()
            || self.messages.is_loading()
            || self.author_feed.posts.is_loading()
    }

    pub fn conversation_list(&self) -> Vec<&ChatMessage> {
        conversation_heads(self.messages.items(), &self.me())
    }

    /// Thread root followed by its replies.
    pub fn thread_posts(&self) -> impl Iterator<Item = &Post> {
        self.thread
            .iter()
            .flat_map(|t| std::iter::once(&t.post).chain(t.replies.iter()))
    }

    /// Engagement state to draw for `post`.
    pub fn interaction_for(&self, post: &Post) -> PostInteraction {
        self.interactions
            .get(&post.uri)
            .cloned()
            .unwrap_or_else(|| PostInteraction::from_post(post))
    }

    pub fn selected_index(&self) -> usize {
        self.view_stack.last().map_or(0, |vs| vs.selected_index)
    }

    pub fn selected_post(&self) -> Option<&Post> {
        let idx = self.selected_index();
        match self.current_view()? {
            ViewKind::Timeline => self.timeline.items().get(idx).map(|f| &f.post),
            ViewKind::Profile(_) => self.author_feed.posts.items().get(idx).map(|f| &f.post),
            ViewKind::Thread(_) => self.thread_posts().nth(idx),
            _ => None,
        }
    }

    /// Author of whatever row is selected.
    fn selected_actor(&self) -> Option<Actor> {
        let idx = self.selected_index();
        match self.current_view()? {
            ViewKind::Notifications => self.notifications.items().get(idx).map(|n| n.author.clone()),
            ViewKind::Search => self.search_results.items().get(idx).map(SearchActor::actor),
            ViewKind::Messages => {
                let me = self.me();
                self.conversation_list()
                    .get(idx)
                    .and_then(|m| m.peer(&me).cloned())
            }
            _ => self.selected_post().map(|p| p.author.clone()),
        }
    }

    fn current_item_count(&self) -> usize {
        match self.current_view() {
            Some(ViewKind::Timeline) => self.timeline.items().len(),
            Some(ViewKind::Notifications) => self.notifications.items().len(),
            Some(ViewKind::Search) => self.search_results.items().len(),
            Some(ViewKind::Messages) => self.conversation_list().len(),
            Some(ViewKind::Conversation(_)) => self.conversation.len(),
            Some(ViewKind::Profile(_)) => self.author_feed.posts.items().len(),
            Some(ViewKind::Thread(_)) => self.thread_posts().count(),
            Some(ViewKind::Login | ViewKind::Help) | None => 0,
        }
    }

    fn current_list(&self) -> Option<ListKind> {
        match self.current_view()? {
            ViewKind::Timeline => Some(ListKind::Timeline),
            ViewKind::Notifications => Some(ListKind::Notifications),
            ViewKind::Search => Some(ListKind::Search),
            ViewKind::Messages => Some(ListKind::Messages),
            ViewKind::Profile(_) => self.author_feed.list(),
            _ => None,
        }
    }

    // -- Key event routing --------------------------------------------------

    fn handle_key_event(&mut self, key: KeyEvent) {
        // Ctrl-C always quits.
        if key.modifiers.contains(KeyModifiers::CONTROL)
            && matches!(key.code, KeyCode::Char('c' | 'C'))
        {
            self.events.send(AppEvent::Quit);
            return;
        }

        if self.error_detail.is_some() {
            if matches!(key.code, KeyCode::Esc | KeyCode::Enter) {
                self.error_detail = None;
            }
            return;
        }

        match self.mode {
            AppMode::Normal => self.handle_normal_key(key),
            AppMode::Command => self.handle_command_key(key),
            AppMode::Search => self.handle_search_key(key),
            AppMode::Compose => self.handle_compose_key(key),
            AppMode::Login => self.handle_login_key(key),
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                if self.view_stack.len() > 1 {
                    self.events.send(AppEvent::PopView);
                } else {
                    self.events.send(AppEvent::Quit);
                }
            }
            KeyCode::Char('j') | KeyCode::Down => {
                self.move_selection_down();
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.move_selection_up();
            }
            KeyCode::Enter => {
                self.open_selected();
            }
            KeyCode::Char('/') => {
                self.mode = AppMode::Search;
                self.search_input.clear();
            }
            KeyCode::Char(':') => {
                self.mode = AppMode::Command;
                self.command_input.clear();
            }
            KeyCode::Char('?') => {
                self.events.send(AppEvent::PushView(ViewKind::Help));
            }
            KeyCode::Char('1') => {
                self.events.send(AppEvent::SwitchView(ViewKind::Timeline));
            }
            KeyCode::Char('2') => {
                self.events
                    .send(AppEvent::SwitchView(ViewKind::Notifications));
            }
            KeyCode::Char('3') => {
                self.events.send(AppEvent::SwitchView(ViewKind::Search));
            }
            KeyCode::Char('4') => {
                self.events.send(AppEvent::SwitchView(ViewKind::Messages));
            }
            KeyCode::Char('r') => {
                self.refresh_current();
            }
            KeyCode::Char('n') => {
                if let Some(list) = self.current_list() {
                    self.events.send(AppEvent::LoadMore(list));
                }
            }
            KeyCode::Char('c') => {
                self.open_compose(ComposeTarget::Post);
            }
            KeyCode::Char('a') => {
                if let Some(post) = self.selected_post() {
                    let target = ComposeTarget::Reply {
                        parent: post.record_ref(),
                        root: post.reply_root(),
                        handle: post.author.handle.clone(),
                    };
                    self.open_compose(target);
                }
            }
            KeyCode::Char('l') => {
                self.like_selected();
            }
            KeyCode::Char('t') => {
                self.repost_selected();
            }
            KeyCode::Char('f') => {
                self.toggle_follow();
            }
            KeyCode::Tab => {
                self.cycle_profile_tab();
            }
            KeyCode::Char('m') => {
                if let Some(target) = self.message_target() {
                    self.open_compose(target);
                }
            }
            KeyCode::Char('p') => {
                if let Some(actor) = self.selected_actor() {
                    self.events.send(AppEvent::FetchProfile { actor: actor.did });
                }
            }
            KeyCode::Char('C') => {
                self.preferences.crt_mode = !self.preferences.crt_mode;
                self.save_preferences();
            }
            KeyCode::Char('S') => {
                self.preferences.sound_enabled = !self.preferences.sound_enabled;
                self.save_preferences();
            }
            _ => {}
        }
    }

    fn handle_command_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.mode = AppMode::Normal;
                self.command_input.clear();
            }
            KeyCode::Enter => {
                self.mode = AppMode::Normal;
                self.execute_command();
            }
            KeyCode::Backspace => {
                self.command_input.pop();
            }
            KeyCode::Char(c) => {
                self.command_input.push(c);
            }
            _ => {}
        }
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.mode = AppMode::Normal;
                self.search_input.clear();
            }
            KeyCode::Enter => {
                let query = self.search_input.trim().to_string();
                if !query.is_empty() {
                    self.start_search(query);
                    self.events.send(AppEvent::SwitchView(ViewKind::Search));
                }
                self.mode = AppMode::Normal;
            }
            KeyCode::Backspace => {
                self.search_input.pop();
            }
            KeyCode::Char(c) => {
                self.search_input.push(c);
            }
            _ => {}
        }
    }

    fn handle_compose_key(&mut self, key: KeyEvent) {
        let Some(compose) = self.compose.as_mut() else {
            self.mode = AppMode::Normal;
            return;
        };
        if compose.sending {
            return;
        }
        match key.code {
            KeyCode::Esc => {
                self.compose = None;
                self.mode = AppMode::Normal;
            }
            KeyCode::Enter if key.modifiers.contains(KeyModifiers::ALT) => {
                compose.text.push('\n');
            }
            KeyCode::Enter => {
                self.submit_compose();
            }
            KeyCode::Backspace => {
                compose.text.pop();
                compose.error = None;
            }
            KeyCode::Char(c) => {
                compose.text.push(c);
                compose.error = None;
            }
            _ => {}
        }
    }

    fn handle_login_key(&mut self, key: KeyEvent) {
        let form = &mut self.login_form;
        if form.submitting {
            return;
        }
        match key.code {
            KeyCode::Esc => {
                self.events.send(AppEvent::Quit);
            }
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
                form.focus = match form.focus {
                    LoginField::Identifier => LoginField::Password,
                    LoginField::Password => LoginField::Identifier,
                };
            }
            KeyCode::Enter if form.focus == LoginField::Identifier => {
                form.focus = LoginField::Password;
            }
            KeyCode::Enter => {
                self.submit_login();
            }
            KeyCode::Backspace => {
                field_mut(form).pop();
                form.error = None;
            }
            KeyCode::Char(c) => {
                field_mut(form).push(c);
                form.error = None;
            }
            _ => {}
        }
    }

    // -- Command execution --------------------------------------------------

    fn execute_command(&mut self) {
        let input = self.command_input.clone();
        match command::parse_command(&input) {
            Some(Command::Profile(actor)) => {
                self.events.send(AppEvent::FetchProfile { actor });
            }
            Some(Command::Search(query)) => {
                self.start_search(query);
                self.events.send(AppEvent::SwitchView(ViewKind::Search));
            }
            Some(Command::Open(target)) => {
                if let Some(uri) = command::parse_post_uri(&target) {
                    self.events.send(AppEvent::FetchThread { uri });
                } else {
                    self.status_message = Some(format!("invalid post url or uri: {target}"));
                }
            }
            Some(Command::Chat(did)) => {
                let did = command::strip_at(&did).to_owned();
                self.events.send(AppEvent::FetchConversation { did });
            }
            Some(Command::Post(text)) => match validate_post_text(&text) {
                Ok(()) => self.events.send(AppEvent::SubmitPost { text, reply: None }),
                Err(e) => self.status_message = Some(user_message(&e)),
            },
            Some(Command::Timeline) => {
                self.events.send(AppEvent::SwitchView(ViewKind::Timeline));
            }
            Some(Command::Notifications) => {
                self.events
                    .send(AppEvent::SwitchView(ViewKind::Notifications));
            }
            Some(Command::Messages) => {
                self.events.send(AppEvent::SwitchView(ViewKind::Messages));
            }
            Some(Command::Login) => match self.handle() {
                Some(handle) => self.status_message = Some(format!("already signed in as @{handle}")),
                None => self.events.send(AppEvent::Logout),
            },
            Some(Command::Logout) => {
                self.events.send(AppEvent::Logout);
            }
            Some(Command::Crt) => {
                self.preferences.crt_mode = !self.preferences.crt_mode;
                self.save_preferences();
            }
            Some(Command::Sound) => {
                self.preferences.sound_enabled = !self.preferences.sound_enabled;
                self.save_preferences();
            }
            Some(Command::Help) => {
                self.events.send(AppEvent::PushView(ViewKind::Help));
            }
            Some(Command::Quit) => {
                self.events.send(AppEvent::Quit);
            }
            None => {
                self.status_message = Some(format!("unknown command: {input}"));
            }
        }
        self.command_input.clear();
    }

    // -- Selection helpers --------------------------------------------------

    fn move_selection_down(&mut self) {
        let count = self.current_item_count();
        if let Some(vs) = self.view_stack.last_mut()
            && vs.selected_index + 1 < count
        {
            vs.selected_index += 1;
        }

        let idx = self.selected_index();
        if let Some(list) = self.current_list()
            && self.wants_more(&list, idx)
        {
            self.events.send(AppEvent::LoadMore(list));
        }
    }

    fn move_selection_up(&mut self) {
        if let Some(vs) = self.view_stack.last_mut() {
            vs.selected_index = vs.selected_index.saturating_sub(1);
        }
    }

    /// Whether the selection sits close enough to the tail of `list`.
    fn wants_more(&self, list: &ListKind, idx: usize) -> bool {
        let threshold = self.config.load_more_threshold;
        match list {
            ListKind::Timeline => self.timeline.should_load_more(idx, threshold),
            ListKind::Notifications => self.notifications.should_load_more(idx, threshold),
            ListKind::Search => self.search_results.should_load_more(idx, threshold),
            ListKind::AuthorFeed { .. } => self.author_feed.posts.should_load_more(idx, threshold),
            // Rows are grouped by peer, so compare against the grouped length.
            ListKind::Messages => {
                self.messages.can_load_more()
                    && idx + threshold >= self.conversation_list().len()
            }
        }
    }

    fn open_selected(&mut self) {
        let idx = self.selected_index();
        match self.current_view().cloned() {
            Some(ViewKind::Timeline | ViewKind::Profile(_)) => {
                if let Some(post) = self.selected_post() {
                    let uri = post.uri.clone();
                    self.events.send(AppEvent::FetchThread { uri });
                }
            }
            Some(ViewKind::Thread(current)) => {
                if let Some(post) = self.selected_post()
                    && post.uri != current
                {
                    let uri = post.uri.clone();
                    self.events.send(AppEvent::FetchThread { uri });
                }
            }
            Some(ViewKind::Notifications) => {
                if let Some(n) = self.notifications.items().get(idx) {
                    let event = match n.subject_uri() {
                        Some(uri) => AppEvent::FetchThread {
                            uri: uri.to_owned(),
                        },
                        None => AppEvent::FetchProfile {
                            actor: n.author.did.clone(),
                        },
                    };
                    self.events.send(event);
                }
            }
            Some(ViewKind::Search) => {
                if let Some(actor) = self.search_results.items().get(idx) {
                    let actor = actor.did.clone();
                    self.events.send(AppEvent::FetchProfile { actor });
                }
            }
            Some(ViewKind::Messages) => {
                if let Some(peer) = self.selected_actor() {
                    self.events
                        .send(AppEvent::FetchConversation { did: peer.did });
                }
            }
            _ => {}
        }
    }

    fn refresh_current(&mut self) {
        match self.current_view().cloned() {
            Some(ViewKind::Thread(uri)) => self.events.send(AppEvent::FetchThread { uri }),
            Some(ViewKind::Profile(actor)) => self.events.send(AppEvent::FetchProfile { actor }),
            Some(ViewKind::Conversation(did)) => {
                self.events.send(AppEvent::FetchConversation { did });
            }
            _ => {
                if let Some(list) = self.current_list() {
                    self.events.send(AppEvent::RefreshList(list));
                }
            }
        }
    }

    fn message_target(&self) -> Option<ComposeTarget> {
        match self.current_view()? {
            ViewKind::Profile(_) => self.viewed_profile.as_ref().map(|p| ComposeTarget::Message {
                did: p.did.clone(),
                handle: p.handle.clone(),
            }),
            ViewKind::Conversation(did) => {
                let me = self.me();
                let handle = self
                    .conversation
                    .iter()
                    .find_map(|m| m.peer(&me).filter(|p| p.did == *did))
                    .map_or_else(|| did.clone(), |p| p.handle.clone());
                Some(ComposeTarget::Message {
                    did: did.clone(),
                    handle,
                })
            }
            _ => self.selected_actor().map(|a| ComposeTarget::Message {
                did: a.did,
                handle: a.handle,
            }),
        }
    }

    // -- Writes -------------------------------------------------------------

    fn like_selected(&mut self) {
        let Some(post) = self.selected_post().cloned() else {
            return;
        };
        let state = self
            .interactions
            .entry(post.uri.clone())
            .or_insert_with(|| PostInteraction::from_post(&post));
        if state.begin_like() {
            self.events.send(AppEvent::Like(post.record_ref()));
        }
    }

    fn repost_selected(&mut self) {
        let Some(post) = self.selected_post().cloned() else {
            return;
        };
        let state = self
            .interactions
            .entry(post.uri.clone())
            .or_insert_with(|| PostInteraction::from_post(&post));
        if state.begin_repost() {
            self.events.send(AppEvent::Repost(post.record_ref()));
        }
    }

    fn toggle_follow(&mut self) {
        if !matches!(self.current_view(), Some(ViewKind::Profile(_))) {
            return;
        }
        let (Some(profile), Some(state)) = (&self.viewed_profile, self.follow_state.as_mut())
        else {
            return;
        };
        if let Some(action) = state.begin_toggle() {
            self.events.send(AppEvent::Follow {
                did: profile.did.clone(),
                action,
            });
        }
    }

    fn cycle_profile_tab(&mut self) {
        if !matches!(self.current_view(), Some(ViewKind::Profile(_))) {
            return;
        }
        let tab = self.author_feed.tab.next();
        if let Some((list, request)) = self.author_feed.select_tab(tab) {
            if let Some(vs) = self.view_stack.last_mut() {
                vs.selected_index = 0;
            }
            self.dispatch_list(list, request);
        }
    }

    fn open_compose(&mut self, target: ComposeTarget) {
        self.compose = Some(ComposeState::new(target));
        self.mode = AppMode::Compose;
    }

    fn submit_compose(&mut self) {
        let Some(compose) = self.compose.as_mut() else {
            return;
        };
        let text = compose.text.clone();
        let event = match &compose.target {
            ComposeTarget::Message { did, .. } => {
                if text.trim().is_empty() {
                    return;
                }
                AppEvent::SendMessage {
                    did: did.clone(),
                    text,
                }
            }
            target => {
                if let Err(e) = validate_post_text(&text) {
                    compose.error = Some(user_message(&e));
                    return;
                }
                let reply = match target {
                    ComposeTarget::Reply { parent, root, .. } => Some(ReplyRef {
                        root: root.clone(),
                        parent: parent.clone(),
                    }),
                    _ => None,
                };
                AppEvent::SubmitPost { text, reply }
            }
        };
        compose.sending = true;
        self.events.send(event);
    }

    fn submit_login(&mut self) {
        let form = &mut self.login_form;
        let identifier = command::strip_at(form.identifier.trim()).to_owned();
        if identifier.is_empty() || form.password.is_empty() {
            form.error = Some("enter a handle and an app password".into());
            return;
        }
        form.submitting = true;
        form.error = None;
        let creds = LoginCredentials {
            identifier,
            password: form.password.clone(),
        };
        self.events.send(AppEvent::Login(creds));
    }

    fn save_preferences(&mut self) {
        if let Err(e) = self.client.session().set_preferences(self.preferences) {
            tracing::warn!("failed to save preferences: {e}");
            self.status_message = Some(user_message(&e));
        }
    }

    /// Terminal bell after a successful write, when sound is on.
    fn chime(&self) {
        if self.preferences.sound_enabled {
            let mut out = std::io::stdout();
            let _ = out.write_all(b"\x07").and_then(|()| out.flush());
        }
    }

    fn start_search(&mut self, query: String) {
        self.search_query = query;
        let request = self.search_results.reset();
        self.dispatch_list(ListKind::Search, request);
    }

    // -- App event handling -------------------------------------------------

    fn handle_app_event(&mut self, event: AppEvent) {
        match event {
            // Navigation
            AppEvent::Quit => {
                self.running = false;
            }
            AppEvent::PushView(kind) => {
                self.push_view(kind);
            }
            AppEvent::PopView => {
                self.pop_view();
            }
            AppEvent::SwitchView(kind) => {
                // Replace the root view or push if stack is deeper.
                if self.view_stack.len() <= 1 {
                    self.reset_views(kind.clone());
                } else {
                    self.push_view(kind.clone());
                }
                // Trigger fetch if data is empty.
                self.fetch_for_view(&kind);
            }

            // Paginated lists
            AppEvent::RefreshList(list) => {
                if let Some(request) = self.begin_list_request(&list, true) {
                    self.dispatch_list(list, request);
                }
            }
            AppEvent::LoadMore(list) => {
                if let Some(request) = self.begin_list_request(&list, false) {
                    self.dispatch_list(list, request);
                }
            }
            AppEvent::ListLoaded {
                list,
                request,
                result,
            } => {
                self.apply_page(list, &request, result);
            }

            // Request triggers -> dispatch to async tasks.
            ref evt @ (AppEvent::FetchProfile { .. }
            | AppEvent::FetchThread { .. }
            | AppEvent::FetchConversation { .. }) => {
                self.loading = true;
                self.dispatch_api_request(evt.clone());
            }
            ref evt @ (AppEvent::Like(_)
            | AppEvent::Repost(_)
            | AppEvent::Follow { .. }
            | AppEvent::SubmitPost { .. }
            | AppEvent::SendMessage { .. }
            | AppEvent::Login(_)) => {
                self.dispatch_api_request(evt.clone());
            }
            AppEvent::Logout => {
                self.client.session().logout();
                self.clear_account_state();
                self.status_message = Some("signed out".into());
            }

            // Responses
            AppEvent::ProfileLoaded { actor, result } => {
                self.loading = false;
                match result {
                    Ok((profile, following)) => {
                        self.follow_state = Some(FollowState::new(&profile, following));
                        let (list, request) = self.author_feed.open(profile.did.clone());
                        self.dispatch_list(list, request);
                        self.viewed_profile = Some(profile);
                        self.loaded.profile = Some(actor.clone());
                        let kind = ViewKind::Profile(actor);
                        if self.current_view() != Some(&kind) {
                            self.push_view(kind);
                        }
                    }
                    Err(e) => {
                        self.status_message = Some(format!("error loading profile: {}", user_message(&e)));
                    }
                }
            }
            AppEvent::ThreadLoaded { uri, result } => {
                self.loading = false;
                match result {
                    Ok(thread) => {
                        self.thread = Some(thread);
                        self.loaded.thread = Some(uri.clone());
                        let kind = ViewKind::Thread(uri);
                        if self.current_view() != Some(&kind) {
                            self.push_view(kind);
                        }
                    }
                    Err(e) => {
                        self.status_message = Some(format!("error loading thread: {}", user_message(&e)));
                    }
                }
            }
            AppEvent::ConversationLoaded { did, result } => {
                self.loading = false;
                match result {
                    Ok(mut messages) => {
                        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
                        self.conversation = messages;
                        self.loaded.conversation = Some(did.clone());
                        let kind = ViewKind::Conversation(did);
                        if self.current_view() != Some(&kind) {
                            self.push_view(kind);
                        }
                    }
                    Err(e) => {
                        self.status_message =
                            Some(format!("error loading conversation: {}", user_message(&e)));
                    }
                }
            }
            AppEvent::LikeFinished { uri, result } => {
                let failure = self
                    .interactions
                    .get_mut(&uri)
                    .and_then(|state| state.finish_like(result));
                self.settle_write("like", failure);
            }
            AppEvent::RepostFinished { uri, result } => {
                let failure = self
                    .interactions
                    .get_mut(&uri)
                    .and_then(|state| state.finish_repost(result));
                self.settle_write("repost", failure);
            }
            AppEvent::FollowFinished { did, result } => {
                let is_current = self.viewed_profile.as_ref().is_some_and(|p| p.did == did);
                if let (true, Some(state)) = (is_current, self.follow_state.as_mut()) {
                    let failure = state.finish_toggle(result);
                    self.settle_write("follow", failure);
                }
            }
            AppEvent::PostFinished(result) => match result {
                Ok(uri) => {
                    tracing::debug!(%uri, "post published");
                    self.compose = None;
                    self.mode = AppMode::Normal;
                    self.status_message = Some("posted".into());
                    self.chime();
                    if let Some(ViewKind::Thread(uri)) = self.current_view().cloned() {
                        self.events.send(AppEvent::FetchThread { uri });
                    }
                }
                Err(e) => self.compose_failed(user_message(&e)),
            },
            AppEvent::MessageSent { did, text, result } => match result {
                Ok(()) => {
                    tracing::debug!(chars = text.chars().count(), "message delivered");
                    self.compose = None;
                    self.mode = AppMode::Normal;
                    self.chime();
                    if self.loaded.conversation.as_deref() == Some(did.as_str()) {
                        self.events.send(AppEvent::FetchConversation { did });
                    } else {
                        self.status_message = Some("message sent".into());
                    }
                }
                Err(e) => self.compose_failed(user_message(&e)),
            },
            AppEvent::LoginFinished(result) => match result {
                Ok(handle) => {
                    self.login_form = LoginForm::default();
                    self.mode = AppMode::Normal;
                    self.preferences = self.client.session().preferences();
                    self.status_message = Some(format!("signed in as @{handle}"));
                    let kind = root_view(self.config.default_view);
                    self.reset_views(kind.clone());
                    self.fetch_for_view(&kind);
                }
                Err(e) => {
                    self.login_form.submitting = false;
                    self.login_form.password.clear();
                    self.login_form.error = Some(user_message(&e));
                }
            },
        }
    }

    fn settle_write(&mut self, what: &str, failure: Option<String>) {
        match failure {
            None => self.chime(),
            Some(msg) => {
                self.status_message = Some(format!("{what} failed"));
                self.error_detail = Some(msg);
            }
        }
    }

    fn compose_failed(&mut self, msg: String) {
        if let Some(compose) = self.compose.as_mut() {
            compose.sending = false;
            compose.error = Some(msg);
        } else {
            self.status_message = Some(msg);
        }
    }

    fn clear_account_state(&mut self) {
        self.timeline.clear();
        self.notifications.clear();
        self.search_results.clear();
        self.messages.clear();
        self.author_feed.clear();
        self.search_query.clear();
        self.viewed_profile = None;
        self.follow_state = None;
        self.thread = None;
        self.conversation.clear();
        self.loaded = LoadedDetail::default();
        self.interactions.clear();
        self.compose = None;
        self.login_form = LoginForm::default();
        self.loading = false;
        self.mode = AppMode::Login;
        self.reset_views(ViewKind::Login);
    }

    // -- List plumbing ------------------------------------------------------

    fn begin_list_request(&mut self, list: &ListKind, refresh: bool) -> Option<PageRequest> {
        fn begin<T>(p: &mut Paginator<T>, refresh: bool) -> Option<PageRequest> {
            if refresh { p.refresh() } else { p.next_page() }
        }
        match list {
            ListKind::Timeline => begin(&mut self.timeline, refresh),
            ListKind::Notifications => begin(&mut self.notifications, refresh),
            ListKind::Search if self.search_query.is_empty() => None,
            ListKind::Search => begin(&mut self.search_results, refresh),
            ListKind::Messages => begin(&mut self.messages, refresh),
            ListKind::AuthorFeed { .. } if self.author_feed.accepts(list) => {
                begin(&mut self.author_feed.posts, refresh)
            }
            ListKind::AuthorFeed { .. } => None,
        }
    }

    fn dispatch_list(&self, list: ListKind, request: PageRequest) {
        let endpoint = list_endpoint(&list, &self.search_query, self.config.page_limit);
        let client = self.client.clone();
        let sender = self.events.sender();

        tokio::spawn(async move {
            let cursor = request.cursor.as_deref();
            let result = match &list {
                ListKind::Timeline | ListKind::AuthorFeed { .. } => client
                    .fetch_page(&endpoint, cursor)
                    .await
                    .map(PageData::Posts),
                ListKind::Notifications => client
                    .fetch_page(&endpoint, cursor)
                    .await
                    .map(PageData::Notifications),
                ListKind::Search => client
                    .fetch_page(&endpoint, cursor)
                    .await
                    .map(PageData::Actors),
                ListKind::Messages => client
                    .fetch_page(&endpoint, cursor)
                    .await
                    .map(PageData::Messages),
            };
            let result: ApiResult<_> = result.map_err(|e| Arc::new(e.to_string()));
            emit(
                &sender,
                AppEvent::ListLoaded {
                    list,
                    request,
                    result,
                },
            );
        });
    }

    fn apply_page(&mut self, list: ListKind, request: &PageRequest, result: ApiResult<PageData>) {
        let applied = match list {
            ListKind::Timeline => {
                let page = result.and_then(PageData::into_posts);
                self.track_posts(&page);
                self.timeline.apply(request, page)
            }
            ListKind::AuthorFeed { .. } => {
                if !self.author_feed.accepts(&list) {
                    return;
                }
                let page = result.and_then(PageData::into_posts);
                self.track_posts(&page);
                self.author_feed.posts.apply(request, page)
            }
            ListKind::Notifications => self
                .notifications
                .apply(request, result.and_then(PageData::into_notifications)),
            ListKind::Search => self
                .search_results
                .apply(request, result.and_then(PageData::into_actors)),
            ListKind::Messages => self
                .messages
                .apply(request, result.and_then(PageData::into_messages)),
        };
        if !applied {
            return;
        }
        let error = self.current_list_error();
        if let Some(msg) = error {
            self.status_message = Some(msg);
        }
    }

    fn current_list_error(&self) -> Option<String> {
        let error = match self.current_list()? {
            ListKind::Timeline => self.timeline.error(),
            ListKind::Notifications => self.notifications.error(),
            ListKind::Search => self.search_results.error(),
            ListKind::Messages => self.messages.error(),
            ListKind::AuthorFeed { .. } => self.author_feed.posts.error(),
        };
        error.map(str::to_owned)
    }

    /// Seed optimistic state for posts not seen before.
    fn track_posts(&mut self, page: &ApiResult<FeedEnvelope<FeedViewPost>>) {
        if let Ok(page) = page {
            for item in &page.items {
                self.interactions
                    .entry(item.post.uri.clone())
                    .or_insert_with(|| PostInteraction::from_post(&item.post));
            }
        }
    }

    // -- API dispatch -------------------------------------------------------

    fn dispatch_api_request(&self, event: AppEvent) {
        let client = self.client.clone();
        let sender = self.events.sender();

        tokio::spawn(async move {
            let reply = match event {
                AppEvent::FetchProfile { actor } => {
                    let result = load_profile(&client, &actor).await;
                    AppEvent::ProfileLoaded { actor, result }
                }
                AppEvent::FetchThread { uri } => {
                    let result = client.get_post_thread(&uri).await;
                    let result: ApiResult<_> = result.map_err(|e| Arc::new(e.to_string()));
                    AppEvent::ThreadLoaded { uri, result }
                }
                AppEvent::FetchConversation { did } => {
                    let result = client.conversation(&did).await.map(|page| page.items);
                    let result: ApiResult<_> = result.map_err(|e| Arc::new(e.to_string()));
                    AppEvent::ConversationLoaded { did, result }
                }
                AppEvent::Like(subject) => {
                    let result = client.like(&subject).await.map(|_| ());
                    AppEvent::LikeFinished {
                        uri: subject.uri,
                        result: result.map_err(|e| Arc::new(e.to_string())),
                    }
                }
                AppEvent::Repost(subject) => {
                    let result = client.repost(&subject).await.map(|_| ());
                    AppEvent::RepostFinished {
                        uri: subject.uri,
                        result: result.map_err(|e| Arc::new(e.to_string())),
                    }
                }
                AppEvent::Follow { did, action } => {
                    let result = match action {
                        FollowAction::Follow => client.follow(&did).await,
                        FollowAction::Unfollow => client.unfollow(&did).await,
                    };
                    AppEvent::FollowFinished {
                        did,
                        result: result.map_err(|e| Arc::new(e.to_string())),
                    }
                }
                AppEvent::SubmitPost { text, reply } => {
                    let result = match reply {
                        Some(reply) => client.reply(&text, &reply.parent, &reply.root).await,
                        None => client.create_post(&text).await,
                    };
                    AppEvent::PostFinished(
                        result
                            .map(|created| created.uri)
                            .map_err(|e| Arc::new(e.to_string())),
                    )
                }
                AppEvent::SendMessage { did, text } => {
                    let result = client.send_message(&did, &text).await;
                    AppEvent::MessageSent {
                        did,
                        text,
                        result: result.map_err(|e| Arc::new(e.to_string())),
                    }
                }
                AppEvent::Login(creds) => {
                    let result = client
                        .session()
                        .login(&creds.identifier, &creds.password)
                        .await;
                    AppEvent::LoginFinished(
                        result
                            .map(|session| session.handle)
                            .map_err(|e| Arc::new(e.to_string())),
                    )
                }
                _ => {
                    // Not an API request event -- ignore.
                    return;
                }
            };
            emit(&sender, reply);
        });
    }

    // -- Helpers ------------------------------------------------------------

    fn fetch_for_view(&mut self, kind: &ViewKind) {
        let list = match kind {
            ViewKind::Timeline if self.timeline.items().is_empty() => ListKind::Timeline,
            ViewKind::Notifications if self.notifications.items().is_empty() => {
                ListKind::Notifications
            }
            ViewKind::Messages if self.messages.items().is_empty() => ListKind::Messages,
            _ => return,
        };
        self.events.send(AppEvent::RefreshList(list));
    }
}

fn list_endpoint(list: &ListKind, search_query: &str, page_limit: u32) -> Endpoint {
    match list {
        ListKind::Timeline => Endpoint::timeline(),
        ListKind::Notifications => Endpoint::notifications(),
        ListKind::Search => Endpoint::search_actors(search_query, page_limit),
        ListKind::Messages => Endpoint::direct_messages(),
        ListKind::AuthorFeed { actor, filter } => Endpoint::author_feed(actor, *filter),
    }
}

fn root_view(view: DefaultView) -> ViewKind {
    match view {
        DefaultView::Timeline => ViewKind::Timeline,
        DefaultView::Notifications => ViewKind::Notifications,
        DefaultView::Search => ViewKind::Search,
        DefaultView::Messages => ViewKind::Messages,
    }
}

fn field_mut(form: &mut LoginForm) -> &mut String {
    match form.focus {
        LoginField::Identifier => &mut form.identifier,
        LoginField::Password => &mut form.password,
    }
}

fn emit(sender: &UnboundedSender<Event>, event: AppEvent) {
    let _ = sender.send(Event::App(Box::new(event)));
}

/// Profile plus whether the viewer follows it. A failed follow check is
/// treated as "not following".
async fn load_profile(client: &BskyClient, actor: &str) -> ApiResult<(Profile, bool)> {
    let profile = client
        .get_profile(actor)
        .await
        .map_err(|e| Arc::new(e.to_string()))?;
    let following = match client.is_following(&profile.did).await {
        Ok(following) => following,
        Err(e) => {
            tracing::warn!(actor, "follow check failed: {e}");
            false
        }
    };
    Ok((profile, following))
}

impl PageData {
    fn mismatch(self) -> Arc<String> {
        tracing::error!(page = ?std::mem::discriminant(&self), "page routed to the wrong list");
        Arc::new("unexpected page type".into())
    }

    fn into_posts(self) -> ApiResult<FeedEnvelope<FeedViewPost>> {
        match self {
            PageData::Posts(page) => Ok(page),
            other => Err(other.mismatch()),
        }
    }

    fn into_notifications(self) -> ApiResult<FeedEnvelope<Notification>> {
        match self {
            PageData::Notifications(page) => Ok(page),
            other => Err(other.mismatch()),
        }
    }

    fn into_actors(self) -> ApiResult<FeedEnvelope<SearchActor>> {
        match self {
            PageData::Actors(page) => Ok(page),
            other => Err(other.mismatch()),
        }
    }

    fn into_messages(self) -> ApiResult<FeedEnvelope<ChatMessage>> {
        match self {
            PageData::Messages(page) => Ok(page),
            other => Err(other.mismatch()),
        }
    }
}
