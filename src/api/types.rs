use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Actors
// ---------------------------------------------------------------------------

/// Author identity as the server returned it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub did: String,
    pub handle: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl Actor {
    /// Display name, falling back to the handle when it is missing or blank.
    pub fn name(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.handle)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerState {
    #[serde(default)]
    pub muted: Option<bool>,
    #[serde(default)]
    pub blocked_by: Option<bool>,
    /// URI of the viewer's follow record, when following.
    #[serde(default)]
    pub following: Option<String>,
    #[serde(default)]
    pub followed_by: Option<String>,
}

/// Row of `app.bsky.actor.searchActors`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchActor {
    pub did: String,
    pub handle: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub indexed_at: Option<String>,
    #[serde(default)]
    pub viewer: Option<ViewerState>,
}

impl SearchActor {
    pub fn actor(&self) -> Actor {
        Actor {
            did: self.did.clone(),
            handle: self.handle.clone(),
            display_name: self.display_name.clone(),
            avatar: self.avatar.clone(),
        }
    }

    pub fn is_followed(&self) -> bool {
        self.viewer
            .as_ref()
            .is_some_and(|v| v.following.is_some())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub did: String,
    pub handle: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub followers_count: u64,
    #[serde(default)]
    pub follows_count: u64,
    #[serde(default)]
    pub posts_count: u64,
}

// ---------------------------------------------------------------------------
// Posts
// ---------------------------------------------------------------------------

/// Strong reference to a repository record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordRef {
    pub uri: String,
    pub cid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRef {
    pub root: RecordRef,
    pub parent: RecordRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub reply: Option<ReplyRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub uri: String,
    pub cid: String,
    pub author: Actor,
    pub record: PostRecord,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub repost_count: u64,
    #[serde(default)]
    pub reply_count: u64,
    #[serde(default)]
    pub indexed_at: Option<String>,
}

impl Post {
    pub fn record_ref(&self) -> RecordRef {
        RecordRef {
            uri: self.uri.clone(),
            cid: self.cid.clone(),
        }
    }

    /// Thread root to cite when replying to this post.
    pub fn reply_root(&self) -> RecordRef {
        self.record
            .reply
            .as_ref()
            .map(|r| r.root.clone())
            .unwrap_or_else(|| self.record_ref())
    }

    pub fn indexed_time(&self) -> Option<DateTime<Utc>> {
        self.indexed_at.as_deref().and_then(parse_timestamp)
    }
}

/// One entry of a feed (`app.bsky.feed.defs#feedViewPost`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedViewPost {
    pub post: Post,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThreadResponse {
    pub thread: ThreadViewPost,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThreadViewPost {
    pub post: Post,
    #[serde(default)]
    pub replies: Option<Vec<ThreadReply>>,
}

/// Replies may be blocked or deleted stubs without a `post`.
#[derive(Debug, Clone, Deserialize)]
pub struct ThreadReply {
    #[serde(default)]
    pub post: Option<Post>,
}

/// A post with its direct replies, in server order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostThread {
    pub post: Post,
    pub replies: Vec<Post>,
}

impl From<ThreadResponse> for PostThread {
    fn from(resp: ThreadResponse) -> Self {
        let replies = resp
            .thread
            .replies
            .unwrap_or_default()
            .into_iter()
            .filter_map(|r| r.post)
            .collect();
        Self {
            post: resp.thread.post,
            replies,
        }
    }
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(rename = "$type", default)]
    pub type_: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub uri: String,
    pub cid: String,
    pub author: Actor,
    /// like, repost, follow, mention, reply, quote
    pub reason: String,
    #[serde(default)]
    pub reason_subject: Option<String>,
    #[serde(default)]
    pub record: NotificationRecord,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub indexed_at: Option<String>,
}

impl Notification {
    pub fn reason_text(&self) -> &'static str {
        match self.reason.as_str() {
            "like" => "liked your post",
            "repost" => "reposted your post",
            "follow" => "followed you",
            "mention" => "mentioned you",
            "reply" => "replied to your post",
            "quote" => "quoted your post",
            _ => "interacted with you",
        }
    }

    /// Post the notification points at: the subject for likes/reposts,
    /// the notification record itself for replies, mentions and quotes.
    pub fn subject_uri(&self) -> Option<&str> {
        match self.reason.as_str() {
            "like" | "repost" => self.reason_subject.as_deref(),
            "reply" | "mention" | "quote" => Some(&self.uri),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Direct messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub uri: String,
    pub author: Actor,
    #[serde(default)]
    pub recipient: Option<Actor>,
    pub text: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl ChatMessage {
    /// Whether `did` is either side of this message.
    pub fn involves(&self, did: &str) -> bool {
        self.author.did == did || self.recipient.as_ref().is_some_and(|r| r.did == did)
    }

    /// The party that is not `me`.
    pub fn peer(&self, me: &str) -> Option<&Actor> {
        if self.author.did == me {
            self.recipient.as_ref()
        } else {
            Some(&self.author)
        }
    }
}

/// Latest message per peer, newest first. Messages without a known peer are skipped.
pub fn conversation_heads<'a>(messages: &'a [ChatMessage], me: &str) -> Vec<&'a ChatMessage> {
    let mut seen = HashSet::new();
    let mut heads: Vec<&ChatMessage> = messages
        .iter()
        .filter(|m| m.peer(me).is_some_and(|p| seen.insert(p.did.clone())))
        .collect();
    heads.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    heads
}

// ---------------------------------------------------------------------------
// Auth and write responses
// ---------------------------------------------------------------------------

/// Body of a successful `com.atproto.server.createSession`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub access_jwt: String,
    pub refresh_jwt: String,
    pub handle: String,
    pub did: String,
    #[serde(default, alias = "avatarUrl")]
    pub avatar: Option<String>,
}

/// Body of a successful `com.atproto.repo.createRecord`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedRecord {
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub cid: String,
}

/// XRPC error envelope (`{"error": "...", "message": "..."}`).
#[derive(Debug, Clone, Deserialize)]
pub struct XrpcErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

// ---------------------------------------------------------------------------
// Time helpers
// ---------------------------------------------------------------------------

pub fn parse_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Compact age like `5m`, `3h`, `2d`; empty when `ts` does not parse.
pub fn relative_age(ts: &str, now: DateTime<Utc>) -> String {
    let Some(then) = parse_timestamp(ts) else {
        return String::new();
    };
    let diff = now.signed_duration_since(then);
    if diff.num_minutes() < 60 {
        format!("{}m", diff.num_minutes().max(0))
    } else if diff.num_hours() < 24 {
        format!("{}h", diff.num_hours())
    } else {
        format!("{}d", diff.num_days())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn post_decodes_camel_case_fields() {
        let post: Post = serde_json::from_value(crate::api::stub::post_json(7)).unwrap();
        assert_eq!(post.cid, "cid7");
        assert_eq!(post.like_count, 2);
        assert_eq!(post.author.name(), "bob.test");
        assert_eq!(post.reply_root(), post.record_ref());
    }

    #[test]
    fn reply_root_follows_existing_thread() {
        let mut value = crate::api::stub::post_json(2);
        value["record"]["reply"] = serde_json::json!({
            "root": { "uri": "at://root", "cid": "rootcid" },
            "parent": { "uri": "at://parent", "cid": "parentcid" }
        });
        let post: Post = serde_json::from_value(value).unwrap();
        assert_eq!(post.reply_root().uri, "at://root");
    }

    #[test]
    fn notification_reason_text() {
        let mut n: Notification = serde_json::from_value(serde_json::json!({
            "uri": "at://x", "cid": "c", "author": { "did": "d", "handle": "h" },
            "reason": "follow", "record": { "$type": "app.bsky.graph.follow" },
            "isRead": false, "indexedAt": "2024-03-21T12:00:00Z"
        }))
        .unwrap();
        assert_eq!(n.reason_text(), "followed you");
        assert_eq!(n.subject_uri(), None);
        assert_eq!(n.record.type_.as_deref(), Some("app.bsky.graph.follow"));

        n.reason = "boop".into();
        assert_eq!(n.reason_text(), "interacted with you");
    }

    #[test]
    fn thread_skips_replies_without_post() {
        let resp: ThreadResponse = serde_json::from_value(serde_json::json!({
            "thread": {
                "post": crate::api::stub::post_json(1),
                "replies": [
                    { "post": crate::api::stub::post_json(2) },
                    { "notFound": true, "uri": "at://gone" }
                ]
            }
        }))
        .unwrap();
        let thread = PostThread::from(resp);
        assert_eq!(thread.replies.len(), 1);
        assert_eq!(thread.replies[0].cid, "cid2");
    }

    #[test]
    fn chat_message_peer() {
        let msg: ChatMessage = serde_json::from_value(serde_json::json!({
            "uri": "at://m", "text": "hi",
            "author": { "did": "did:me", "handle": "me" },
            "recipient": { "did": "did:you", "handle": "you" }
        }))
        .unwrap();
        assert!(msg.involves("did:you"));
        assert!(!msg.involves("did:other"));
        assert_eq!(msg.peer("did:me").map(|a| a.handle.as_str()), Some("you"));
        assert_eq!(msg.peer("did:you").map(|a| a.handle.as_str()), Some("me"));
    }

    #[test]
    fn conversation_heads_one_per_peer() {
        let msgs: Vec<ChatMessage> = serde_json::from_value(serde_json::json!([
            { "uri": "at://1", "text": "a", "createdAt": "2024-03-21T10:00:00Z",
              "author": { "did": "did:me", "handle": "me" },
              "recipient": { "did": "did:bob", "handle": "bob" } },
            { "uri": "at://2", "text": "b", "createdAt": "2024-03-21T11:00:00Z",
              "author": { "did": "did:carol", "handle": "carol" },
              "recipient": { "did": "did:me", "handle": "me" } },
            { "uri": "at://3", "text": "c", "createdAt": "2024-03-21T09:00:00Z",
              "author": { "did": "did:bob", "handle": "bob" },
              "recipient": { "did": "did:me", "handle": "me" } }
        ]))
        .unwrap();
        let heads = conversation_heads(&msgs, "did:me");
        let uris: Vec<_> = heads.iter().map(|m| m.uri.as_str()).collect();
        assert_eq!(uris, ["at://2", "at://1"]);
    }

    #[test]
    fn relative_age_buckets() {
        let now = Utc.with_ymd_and_hms(2024, 3, 21, 12, 0, 0).unwrap();
        assert_eq!(relative_age("2024-03-21T11:55:00.000Z", now), "5m");
        assert_eq!(relative_age("2024-03-21T09:00:00Z", now), "3h");
        assert_eq!(relative_age("2024-03-19T12:00:00Z", now), "2d");
        assert_eq!(relative_age("yesterday", now), "");
    }
}
