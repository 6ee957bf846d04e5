use std::io::BufRead;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{self, eyre};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::api::BskyClient;
use crate::api::feeds::{AuthorFilter, Endpoint};
use crate::api::transport::ReqwestTransport;
use crate::api::types::{ChatMessage, FeedViewPost, Notification, RecordRef, SearchActor};
use crate::auth::credentials::{load_env_files, resolve_login};
use crate::auth::session::SessionManager;
use crate::command::{parse_post_uri, strip_at};
use crate::config::{AppConfig, load_config};
use crate::pagination::Paginator;
use crate::store::{FileStore, KeyValueStore, MemoryStore};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "skeetboy", about = "Green-phosphor terminal client for Bluesky")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum CliCommand {
    /// Launch the interactive TUI (default)
    Tui,
    /// Sign in with a handle and app password
    Login {
        /// Handle, DID or email (falls back to SKEETBOY_IDENTIFIER)
        identifier: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Print the signed-in account (JSONL)
    Whoami,
    /// Fetch your home timeline (JSONL)
    Timeline {
        #[arg(long, default_value_t = 1)]
        pages: usize,
    },
    /// Fetch your notifications (JSONL)
    Notifications {
        #[arg(long, default_value_t = 1)]
        pages: usize,
    },
    /// Search accounts (JSONL)
    Search {
        term: String,
        #[arg(long, default_value_t = 1)]
        pages: usize,
    },
    /// Look up a profile (JSONL)
    Profile {
        /// Handle or DID
        actor: String,
    },
    /// Fetch an author's posts (JSONL)
    Posts {
        actor: String,
        #[arg(long, value_enum)]
        filter: Option<FilterArg>,
        #[arg(long, default_value_t = 1)]
        pages: usize,
    },
    /// Fetch a post and its replies (JSONL)
    Thread {
        /// at:// URI or bsky.app post URL
        uri: String,
    },
    /// Publish a post
    Post {
        text: String,
        /// Reply to this post (at:// URI or bsky.app URL)
        #[arg(long)]
        reply_to: Option<String>,
    },
    /// Like a post
    Like { uri: String },
    /// Repost a post
    Repost { uri: String },
    /// Follow an account by DID
    Follow { did: String },
    /// Unfollow an account by DID
    Unfollow { did: String },
    /// List direct messages (JSONL)
    Messages {
        /// Only the conversation with this DID
        #[arg(long = "with")]
        with: Option<String>,
        /// Inbox pages to read; a single conversation is always one request
        #[arg(long, default_value_t = 1, conflicts_with = "with")]
        pages: usize,
    },
    /// Send a direct message
    Send { did: String, text: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum FilterArg {
    Replies,
    Media,
}

impl From<FilterArg> for AuthorFilter {
    fn from(arg: FilterArg) -> Self {
        match arg {
            FilterArg::Replies => AuthorFilter::Replies,
            FilterArg::Media => AuthorFilter::Media,
        }
    }
}

// ---------------------------------------------------------------------------
// Output helpers
// ---------------------------------------------------------------------------

/// Print values as JSONL to stdout.
fn print_jsonl<T: Serialize>(items: &[T]) -> eyre::Result<()> {
    for item in items {
        let line = serde_json::to_string(item)?;
        println!("{line}");
    }
    Ok(())
}

fn print_one<T: Serialize>(item: &T) -> eyre::Result<()> {
    println!("{}", serde_json::to_string(item)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Client construction (shared with main.rs TUI path)
// ---------------------------------------------------------------------------

/// Open the state file, or fall back to an in-memory store for this run.
fn open_store() -> Box<dyn KeyValueStore> {
    match FileStore::open_default() {
        Ok(store) => Box::new(store),
        Err(e) => {
            tracing::warn!("state file unavailable, session will not persist: {e}");
            Box::new(MemoryStore::new())
        }
    }
}

/// Build a client over the persisted session. The session may be signed out.
pub fn build_client(config: &AppConfig) -> BskyClient {
    load_env_files();
    let transport = Arc::new(ReqwestTransport::new());
    let session = Arc::new(SessionManager::new(
        transport.clone(),
        open_store(),
        config.service_url.clone(),
    ));
    if session.restore_session() {
        tracing::info!(handle = ?session.handle(), "session restored");
    }
    BskyClient::new(transport, session, config.service_url.clone())
}

// ---------------------------------------------------------------------------
// Command execution
// ---------------------------------------------------------------------------

/// Fetch up to `pages` pages of `endpoint`, stopping early at the end of the stream.
async fn collect_pages<T: DeserializeOwned>(
    client: &BskyClient,
    endpoint: &Endpoint,
    pages: usize,
) -> eyre::Result<Vec<T>> {
    let mut list = Paginator::new();
    for _ in 0..pages.max(1) {
        let Some(request) = list.next_page() else {
            break;
        };
        let result = client.fetch_page(endpoint, request.cursor.as_deref()).await;
        list.apply(&request, result);
        if let Some(err) = list.error() {
            return Err(eyre!("{err}"));
        }
    }
    Ok(list.into_items())
}

/// Resolve a post URI or URL to the strong reference a write needs.
async fn resolve_post(client: &BskyClient, uri_or_url: &str) -> eyre::Result<(RecordRef, RecordRef)> {
    let uri = parse_post_uri(uri_or_url).ok_or_else(|| eyre!("not a post uri or url: {uri_or_url}"))?;
    let thread = client.get_post_thread(&uri).await.map_err(|e| eyre!("{e}"))?;
    Ok((thread.post.record_ref(), thread.post.reply_root()))
}

fn read_password() -> Option<String> {
    eprint!("app password: ");
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line).ok()?;
    Some(line.trim_end_matches(['\r', '\n']).to_owned())
}

pub async fn run_command(cmd: CliCommand) -> eyre::Result<()> {
    let config = load_config();
    let client = build_client(&config);
    let session = client.session();

    match cmd {
        CliCommand::Tui => unreachable!("tui is handled in main"),

        CliCommand::Login { identifier } => {
            let creds = resolve_login(identifier.map(|i| strip_at(&i).to_owned()), None, read_password)?;
            let signed_in = session
                .login(&creds.identifier, &creds.password)
                .await
                .map_err(|e| eyre!("{e}"))?;
            print_one(&serde_json::json!({ "handle": signed_in.handle, "did": signed_in.did }))?;
        }

        CliCommand::Logout => {
            session.logout();
            eprintln!("signed out");
        }

        CliCommand::Whoami => {
            let (Some(handle), Some(did)) = (session.handle(), session.did()) else {
                return Err(eyre!("not signed in; run `skeetboy login`"));
            };
            print_one(&serde_json::json!({ "handle": handle, "did": did }))?;
        }

        CliCommand::Timeline { pages } => {
            let feed: Vec<FeedViewPost> = collect_pages(&client, &Endpoint::timeline(), pages).await?;
            print_jsonl(&feed)?;
        }

        CliCommand::Notifications { pages } => {
            let items: Vec<Notification> =
                collect_pages(&client, &Endpoint::notifications(), pages).await?;
            print_jsonl(&items)?;
        }

        CliCommand::Search { term, pages } => {
            let endpoint = Endpoint::search_actors(&term, config.page_limit);
            let actors: Vec<SearchActor> = collect_pages(&client, &endpoint, pages).await?;
            print_jsonl(&actors)?;
        }

        CliCommand::Profile { actor } => {
            let profile = client
                .get_profile(strip_at(&actor))
                .await
                .map_err(|e| eyre!("{e}"))?;
            print_one(&profile)?;
        }

        CliCommand::Posts {
            actor,
            filter,
            pages,
        } => {
            let actor = strip_at(&actor);
            let filter = filter.map(AuthorFilter::from);
            let mut cursor: Option<String> = None;
            for _ in 0..pages.max(1) {
                let page = client
                    .author_posts(actor, filter, cursor.as_deref())
                    .await
                    .map_err(|e| eyre!("{e}"))?;
                print_jsonl(&page.items)?;
                match page.cursor {
                    Some(next) => cursor = Some(next),
                    None => break,
                }
            }
        }

        CliCommand::Thread { uri } => {
            let uri = parse_post_uri(&uri).ok_or_else(|| eyre!("not a post uri or url: {uri}"))?;
            let thread = client.get_post_thread(&uri).await.map_err(|e| eyre!("{e}"))?;
            print_one(&thread.post)?;
            print_jsonl(&thread.replies)?;
        }

        CliCommand::Post { text, reply_to } => {
            let created = match reply_to {
                Some(target) => {
                    let (parent, root) = resolve_post(&client, &target).await?;
                    client.reply(&text, &parent, &root).await
                }
                None => client.create_post(&text).await,
            }
            .map_err(|e| eyre!("{e}"))?;
            print_one(&created)?;
        }

        CliCommand::Like { uri } => {
            let (subject, _) = resolve_post(&client, &uri).await?;
            let created = client.like(&subject).await.map_err(|e| eyre!("{e}"))?;
            print_one(&created)?;
        }

        CliCommand::Repost { uri } => {
            let (subject, _) = resolve_post(&client, &uri).await?;
            let created = client.repost(&subject).await.map_err(|e| eyre!("{e}"))?;
            print_one(&created)?;
        }

        CliCommand::Follow { did } => {
            client.follow(&did).await.map_err(|e| eyre!("{e}"))?;
            print_one(&serde_json::json!({ "following": did }))?;
        }

        CliCommand::Unfollow { did } => {
            client.unfollow(&did).await.map_err(|e| eyre!("{e}"))?;
            print_one(&serde_json::json!({ "unfollowed": did }))?;
        }

        CliCommand::Messages { with, pages } => {
            let messages: Vec<ChatMessage> = match with {
                Some(peer) => {
                    client
                        .conversation(&peer)
                        .await
                        .map_err(|e| eyre!("{e}"))?
                        .items
                }
                None => collect_pages(&client, &Endpoint::direct_messages(), pages).await?,
            };
            print_jsonl(&messages)?;
        }

        CliCommand::Send { did, text } => {
            client
                .send_message(&did, &text)
                .await
                .map_err(|e| eyre!("{e}"))?;
            print_one(&serde_json::json!({ "sent": did }))?;
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::api::stub::{StubTransport, ok, post_json, signed_in_client, status};

    #[test]
    fn parses_paged_subcommands() {
        let cli = Cli::try_parse_from(["skeetboy", "search", "rust", "--pages", "3"]).unwrap();
        assert_eq!(
            cli.command,
            Some(CliCommand::Search {
                term: "rust".into(),
                pages: 3
            })
        );

        let cli = Cli::try_parse_from(["skeetboy", "messages", "--with", "did:plc:bob"]).unwrap();
        assert_eq!(
            cli.command,
            Some(CliCommand::Messages {
                with: Some("did:plc:bob".into()),
                pages: 1
            })
        );
    }

    #[test]
    fn pages_is_rejected_for_a_single_conversation() {
        let err = Cli::try_parse_from([
            "skeetboy",
            "messages",
            "--with",
            "did:plc:bob",
            "--pages",
            "3",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);

        let cli = Cli::try_parse_from(["skeetboy", "messages", "--pages", "3"]).unwrap();
        assert_eq!(
            cli.command,
            Some(CliCommand::Messages {
                with: None,
                pages: 3
            })
        );
    }

    #[test]
    fn no_subcommand_means_tui() {
        let cli = Cli::try_parse_from(["skeetboy"]).unwrap();
        assert_eq!(cli.command, None);
    }

    #[test]
    fn parses_reply_and_filter() {
        let cli = Cli::try_parse_from([
            "skeetboy",
            "post",
            "hi there",
            "--reply-to",
            "at://did:plc:bob/app.bsky.feed.post/1",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Some(CliCommand::Post { reply_to: Some(_), .. })
        ));

        let cli = Cli::try_parse_from(["skeetboy", "posts", "bob.test", "--filter", "media"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(CliCommand::Posts {
                filter: Some(FilterArg::Media),
                ..
            })
        ));
    }

    #[tokio::test]
    async fn collect_pages_stops_at_end_of_stream() {
        let stub = StubTransport::new(|call| match call.query("cursor").as_deref() {
            None => ok(json!({ "feed": [{ "post": post_json(1) }], "cursor": "c1" })),
            Some(_) => ok(json!({ "feed": [{ "post": post_json(2) }], "cursor": null })),
        });
        let client = signed_in_client(stub.clone());

        let feed: Vec<FeedViewPost> = collect_pages(&client, &Endpoint::timeline(), 5).await.unwrap();

        assert_eq!(feed.len(), 2);
        assert_eq!(stub.call_count(), 2);
    }

    #[tokio::test]
    async fn collect_pages_surfaces_errors() {
        let stub = StubTransport::new(|_| status(500, json!({ "message": "Upstream Failure" })));
        let client = signed_in_client(stub);

        let err = collect_pages::<FeedViewPost>(&client, &Endpoint::timeline(), 1)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("upstream failure"));
    }

    #[tokio::test]
    async fn resolve_post_uses_thread_reply_root() {
        let stub = StubTransport::new(|_| {
            let mut post = post_json(3);
            post["record"]["reply"] = json!({
                "root": { "uri": "at://root", "cid": "rootcid" },
                "parent": { "uri": "at://parent", "cid": "parentcid" }
            });
            ok(json!({ "thread": { "post": post } }))
        });
        let client = signed_in_client(stub.clone());

        let (parent, root) = resolve_post(&client, "https://bsky.app/profile/bob.test/post/3")
            .await
            .unwrap();

        assert_eq!(parent.cid, "cid3");
        assert_eq!(root.uri, "at://root");
        assert_eq!(
            stub.calls()[0].query("uri").as_deref(),
            Some("at://bob.test/app.bsky.feed.post/3")
        );
    }
}
