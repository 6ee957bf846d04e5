use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::api::types::{
    ChatMessage, FeedViewPost, Post, PostThread, Profile, SearchActor, ThreadResponse,
};
use crate::api::{BskyClient, RequestError};

/// One page of a cursor-paginated list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEnvelope<T> {
    pub items: Vec<T>,
    /// `None` means the server has nothing further.
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthorFilter {
    Replies,
    Media,
}

impl AuthorFilter {
    pub fn as_param(self) -> &'static str {
        match self {
            Self::Replies => "posts_with_replies",
            Self::Media => "posts_with_media",
        }
    }
}

/// A paginated GET: method, the response field holding the list, fixed params.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub nsid: &'static str,
    pub list_field: &'static str,
    pub params: Vec<(String, String)>,
}

impl Endpoint {
    fn new(nsid: &'static str, list_field: &'static str) -> Self {
        Self {
            nsid,
            list_field,
            params: Vec::new(),
        }
    }

    fn param(mut self, key: &str, value: impl ToString) -> Self {
        self.params.push((key.to_string(), value.to_string()));
        self
    }

    pub fn timeline() -> Self {
        Self::new("app.bsky.feed.getTimeline", "feed")
    }

    pub fn author_feed(actor: &str, filter: Option<AuthorFilter>) -> Self {
        let endpoint = Self::new("app.bsky.feed.getAuthorFeed", "feed").param("actor", actor);
        match filter {
            Some(filter) => endpoint.param("filter", filter.as_param()),
            None => endpoint,
        }
    }

    pub fn notifications() -> Self {
        Self::new("app.bsky.notification.listNotifications", "notifications")
    }

    pub fn search_actors(term: &str, limit: u32) -> Self {
        Self::new("app.bsky.actor.searchActors", "actors")
            .param("term", term)
            .param("limit", limit)
    }

    pub fn direct_messages() -> Self {
        Self::new("app.bsky.feed.getDirectMessages", "messages")
    }

    pub fn follows(actor: &str, limit: u32) -> Self {
        Self::new("app.bsky.graph.getFollows", "follows")
            .param("actor", actor)
            .param("limit", limit)
    }
}

/// Split a page body into its list field and cursor. A missing list field is
/// a decode error; a missing or non-string cursor ends the stream.
pub(crate) fn decode_envelope<T: DeserializeOwned>(
    body: &str,
    list_field: &str,
) -> Result<FeedEnvelope<T>, RequestError> {
    let mut value: Value =
        serde_json::from_str(body).map_err(|e| RequestError::Deserialize(e.to_string()))?;
    let list = value
        .get_mut(list_field)
        .map(Value::take)
        .ok_or_else(|| RequestError::Deserialize(format!("missing field `{list_field}`")))?;
    let items: Vec<T> =
        serde_json::from_value(list).map_err(|e| RequestError::Deserialize(e.to_string()))?;
    let cursor = match value.get("cursor") {
        Some(Value::String(cursor)) => Some(cursor.clone()),
        _ => None,
    };
    Ok(FeedEnvelope { items, cursor })
}

impl BskyClient {
    /// Fetch one page of `endpoint`, passing `cursor` back verbatim.
    pub async fn fetch_page<T: DeserializeOwned>(
        &self,
        endpoint: &Endpoint,
        cursor: Option<&str>,
    ) -> Result<FeedEnvelope<T>, RequestError> {
        let mut params: Vec<(&str, &str)> = endpoint
            .params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor));
        }

        let body = self.xrpc_get_body(endpoint.nsid, &params).await?;
        let page = decode_envelope::<T>(&body, endpoint.list_field)?;
        tracing::debug!(
            nsid = endpoint.nsid,
            items = page.items.len(),
            more = page.cursor.is_some(),
            "page fetched"
        );
        Ok(page)
    }

    pub async fn get_profile(&self, actor: &str) -> Result<Profile, RequestError> {
        self.xrpc_get("app.bsky.actor.getProfile", &[("actor", actor)])
            .await
    }

    /// Root post of `uri` and its direct replies.
    pub async fn get_post_thread(&self, uri: &str) -> Result<PostThread, RequestError> {
        let resp: ThreadResponse = self
            .xrpc_get("app.bsky.feed.getPostThread", &[("uri", uri)])
            .await?;
        Ok(resp.into())
    }

    /// Whether the signed-in account follows `did`, judged from the first
    /// page of its follows.
    pub async fn is_following(&self, did: &str) -> Result<bool, RequestError> {
        let me = self.session().did().ok_or(RequestError::Unauthenticated)?;
        let page: FeedEnvelope<SearchActor> =
            self.fetch_page(&Endpoint::follows(&me, 100), None).await?;
        Ok(page.items.iter().any(|a| a.did == did))
    }

    /// First page of direct messages exchanged with `peer`.
    pub async fn conversation(&self, peer: &str) -> Result<FeedEnvelope<ChatMessage>, RequestError> {
        let page: FeedEnvelope<ChatMessage> =
            self.fetch_page(&Endpoint::direct_messages(), None).await?;
        Ok(FeedEnvelope {
            items: page.items.into_iter().filter(|m| m.involves(peer)).collect(),
            cursor: page.cursor,
        })
    }

    /// One page of an author's posts, unwrapped from their feed entries.
    pub async fn author_posts(
        &self,
        actor: &str,
        filter: Option<AuthorFilter>,
        cursor: Option<&str>,
    ) -> Result<FeedEnvelope<Post>, RequestError> {
        let page: FeedEnvelope<FeedViewPost> = self
            .fetch_page(&Endpoint::author_feed(actor, filter), cursor)
            .await?;
        Ok(FeedEnvelope {
            items: page.items.into_iter().map(|f| f.post).collect(),
            cursor: page.cursor,
        })
    }
}
