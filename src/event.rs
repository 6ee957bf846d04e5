use color_eyre::eyre::OptionExt;
use crossterm::event::Event as CrosstermEvent;
use futures::{FutureExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::api::feeds::{AuthorFilter, FeedEnvelope};
use crate::api::types::{
    ChatMessage, FeedViewPost, Notification, PostThread, Profile, RecordRef, ReplyRef,
    SearchActor,
};
use crate::auth::credentials::LoginCredentials;
use crate::interaction::FollowAction;
use crate::pagination::PageRequest;

/// Representation of all possible events.
#[derive(Clone, Debug)]
pub enum Event {
    /// An event that is emitted on a regular schedule.
    Tick,
    /// Crossterm events from the terminal.
    Crossterm(CrosstermEvent),
    /// Application-level events.
    App(Box<AppEvent>),
}

/// Application events for navigation, API requests, and API responses.
#[derive(Clone, Debug)]
pub enum AppEvent {
    // -- Navigation --
    Quit,
    PushView(ViewKind),
    PopView,
    SwitchView(ViewKind),

    // -- Request triggers (sent from key handlers) --
    /// First page of `list`, discarding what it holds.
    RefreshList(ListKind),
    /// Next page of `list` from its stored cursor.
    LoadMore(ListKind),
    FetchProfile {
        actor: String,
    },
    FetchThread {
        uri: String,
    },
    FetchConversation {
        did: String,
    },
    Like(RecordRef),
    Repost(RecordRef),
    Follow {
        did: String,
        action: FollowAction,
    },
    SubmitPost {
        text: String,
        reply: Option<ReplyRef>,
    },
    SendMessage {
        did: String,
        text: String,
    },
    Login(LoginCredentials),
    Logout,

    // -- Responses (sent from async tasks back to the event loop) --
    ListLoaded {
        list: ListKind,
        request: PageRequest,
        result: ApiResult<PageData>,
    },
    ProfileLoaded {
        actor: String,
        result: ApiResult<(Profile, bool)>,
    },
    ThreadLoaded {
        uri: String,
        result: ApiResult<PostThread>,
    },
    ConversationLoaded {
        did: String,
        result: ApiResult<Vec<ChatMessage>>,
    },
    LikeFinished {
        uri: String,
        result: ApiResult<()>,
    },
    RepostFinished {
        uri: String,
        result: ApiResult<()>,
    },
    FollowFinished {
        did: String,
        result: ApiResult<()>,
    },
    PostFinished(ApiResult<String>),
    MessageSent {
        did: String,
        text: String,
        result: ApiResult<()>,
    },
    LoginFinished(ApiResult<String>),
}

/// API result type using `Arc<String>` so errors are `Clone`.
pub type ApiResult<T> = Result<T, Arc<String>>;

/// Paginated lists the app keeps state for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ListKind {
    Timeline,
    Notifications,
    Search,
    Messages,
    /// Posts of the profile with this actor, narrowed by the profile tab.
    AuthorFeed {
        actor: String,
        filter: Option<AuthorFilter>,
    },
}

/// One decoded page, tagged by item type.
#[derive(Debug, Clone)]
pub enum PageData {
    Posts(FeedEnvelope<FeedViewPost>),
    Notifications(FeedEnvelope<Notification>),
    Actors(FeedEnvelope<SearchActor>),
    Messages(FeedEnvelope<ChatMessage>),
}

/// Identifies a view for the view-stack navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewKind {
    Timeline,
    Notifications,
    Search,
    Messages,
    Conversation(String), // peer did
    Profile(String),      // handle or did
    Thread(String),       // post uri
    Login,
    Help,
}

/// Terminal event handler.
///
/// Spawns a background task that emits tick and crossterm events, and exposes
/// an unbounded channel for application events.
#[derive(Debug)]
pub struct EventHandler {
    /// Event sender channel.
    sender: mpsc::UnboundedSender<Event>,
    /// Event receiver channel.
    receiver: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
    /// Constructs a new instance of [`EventHandler`] and spawns the event task.
    pub fn new(tick_fps: f64) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let actor = EventTask::new(sender.clone(), tick_fps);
        tokio::spawn(async { actor.run().await });
        Self { sender, receiver }
    }

    /// Receives the next event, blocking until one is available.
    pub async fn next(&mut self) -> color_eyre::Result<Event> {
        self.receiver
            .recv()
            .await
            .ok_or_eyre("Failed to receive event")
    }

    /// Queue an app event to be processed by the event loop.
    pub fn send(&self, app_event: AppEvent) {
        let _ = self.sender.send(Event::App(Box::new(app_event)));
    }

    /// Clone the underlying sender for use in spawned async tasks.
    pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
        self.sender.clone()
    }
}

/// Background task that reads crossterm events and emits ticks.
struct EventTask {
    sender: mpsc::UnboundedSender<Event>,
    tick_fps: f64,
}

impl EventTask {
    fn new(sender: mpsc::UnboundedSender<Event>, tick_fps: f64) -> Self {
        Self { sender, tick_fps }
    }

    async fn run(self) -> color_eyre::Result<()> {
        let fps = if self.tick_fps > 0.0 { self.tick_fps } else { 30.0 };
        let tick_rate = Duration::from_secs_f64(1.0 / fps);
        let mut reader = crossterm::event::EventStream::new();
        let mut tick = tokio::time::interval(tick_rate);
        loop {
            let tick_delay = tick.tick();
            let crossterm_event = reader.next().fuse();
            tokio::select! {
                _ = self.sender.closed() => {
                    break;
                }
                _ = tick_delay => {
                    self.send(Event::Tick);
                }
                Some(Ok(evt)) = crossterm_event => {
                    self.send(Event::Crossterm(evt));
                }
            };
        }
        Ok(())
    }

    fn send(&self, event: Event) {
        let _ = self.sender.send(event);
    }
}
