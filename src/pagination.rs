//! Cursor-driven list state shared by every paginated view.
//!
//! A [`Paginator`] never performs I/O itself. The caller asks it for a
//! [`PageRequest`], runs the fetch wherever it likes, and hands the result
//! back through [`Paginator::apply`].

use std::fmt::Display;

use crate::api::feeds::FeedEnvelope;
use crate::api::user_message;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadPhase {
    #[default]
    Idle,
    Loading,
    Loaded,
    Error(String),
}

/// Ticket for one outstanding fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub cursor: Option<String>,
    pub generation: u64,
}

#[derive(Debug, Clone)]
pub struct Paginator<T> {
    items: Vec<T>,
    cursor: Option<String>,
    phase: LoadPhase,
    exhausted: bool,
    generation: u64,
}

impl<T> Default for Paginator<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            cursor: None,
            phase: LoadPhase::Idle,
            exhausted: false,
            generation: 0,
        }
    }
}

impl<T> Paginator<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    pub fn phase(&self) -> &LoadPhase {
        &self.phase
    }

    pub fn is_loading(&self) -> bool {
        self.phase == LoadPhase::Loading
    }

    pub fn error(&self) -> Option<&str> {
        match &self.phase {
            LoadPhase::Error(msg) => Some(msg),
            _ => None,
        }
    }

    /// The server returned a null cursor; no further page exists.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    fn start(&mut self) -> PageRequest {
        self.phase = LoadPhase::Loading;
        PageRequest {
            cursor: self.cursor.clone(),
            generation: self.generation,
        }
    }

    /// Start over from the first page. `None` while a fetch is in flight.
    pub fn refresh(&mut self) -> Option<PageRequest> {
        if self.is_loading() {
            return None;
        }
        Some(self.reset())
    }

    /// Start over unconditionally; any in-flight result becomes stale.
    pub fn reset(&mut self) -> PageRequest {
        self.clear();
        self.start()
    }

    /// Drop everything and go back to `Idle`; any in-flight result becomes stale.
    pub fn clear(&mut self) {
        self.items.clear();
        self.cursor = None;
        self.exhausted = false;
        self.phase = LoadPhase::Idle;
        self.generation += 1;
    }

    /// Continue from the stored cursor. `None` while loading or once exhausted.
    pub fn next_page(&mut self) -> Option<PageRequest> {
        if self.is_loading() || self.exhausted {
            return None;
        }
        Some(self.start())
    }

    /// Fold a finished fetch into the list. Returns `false` when the result
    /// belongs to an older generation and was dropped.
    pub fn apply<E: Display>(
        &mut self,
        request: &PageRequest,
        result: Result<FeedEnvelope<T>, E>,
    ) -> bool {
        if request.generation != self.generation {
            tracing::debug!(
                stale = request.generation,
                current = self.generation,
                "dropping stale page"
            );
            return false;
        }
        match result {
            Ok(page) => {
                self.items.extend(page.items);
                self.exhausted = page.cursor.is_none();
                self.cursor = page.cursor;
                self.phase = LoadPhase::Loaded;
            }
            Err(e) => {
                self.phase = LoadPhase::Error(user_message(&e));
            }
        }
        true
    }

    /// Whether a selection at `visible_index` is close enough to the tail to
    /// fetch the next page.
    pub fn should_load_more(&self, visible_index: usize, threshold: usize) -> bool {
        self.can_load_more() && visible_index + threshold >= self.items.len()
    }

    /// A page has landed, the last fetch did not fail, and more exist.
    pub fn can_load_more(&self) -> bool {
        !self.exhausted && self.phase == LoadPhase::Loaded
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use tokio::sync::{Mutex, Notify};

    use super::*;
    use crate::api::BskyClient;
    use crate::api::feeds::Endpoint;
    use crate::api::stub::{StubTransport, ok, post_json, signed_in_client};
    use crate::api::types::FeedViewPost;

    fn page(items: Vec<u32>, cursor: Option<&str>) -> FeedEnvelope<u32> {
        FeedEnvelope {
            items,
            cursor: cursor.map(str::to_string),
        }
    }

    /// Drive one `next_page` round trip against the client.
    async fn load_next(client: &BskyClient, list: &mut Paginator<FeedViewPost>) -> bool {
        let Some(request) = list.next_page() else {
            return false;
        };
        let result = client
            .fetch_page(&Endpoint::timeline(), request.cursor.as_deref())
            .await;
        list.apply(&request, result)
    }

    #[tokio::test]
    async fn two_pages_accumulate_without_repeats() {
        let stub = StubTransport::new(|call| match call.query("cursor").as_deref() {
            None => ok(json!({ "feed": [{ "post": post_json(1) }, { "post": post_json(2) }], "cursor": "c1" })),
            Some("c1") => ok(json!({ "feed": [{ "post": post_json(3) }, { "post": post_json(4) }], "cursor": "c2" })),
            Some(other) => panic!("unexpected cursor {other}"),
        });
        let client = signed_in_client(stub.clone());
        let mut list = Paginator::new();

        assert!(load_next(&client, &mut list).await);
        assert!(load_next(&client, &mut list).await);

        let cids: Vec<_> = list.items().iter().map(|f| f.post.cid.as_str()).collect();
        assert_eq!(cids, ["cid1", "cid2", "cid3", "cid4"]);
        assert_eq!(list.cursor(), Some("c2"));
        assert_eq!(stub.calls()[1].query("cursor").as_deref(), Some("c1"));
    }

    #[tokio::test]
    async fn empty_page_with_cursor_keeps_going() {
        let stub = StubTransport::new(|_| ok(json!({ "feed": [], "cursor": "abc" })));
        let client = signed_in_client(stub.clone());
        let mut list = Paginator::new();

        assert!(load_next(&client, &mut list).await);
        assert!(list.items().is_empty());
        assert!(!list.is_exhausted());

        assert!(load_next(&client, &mut list).await);
        assert_eq!(stub.calls()[1].query("cursor").as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn null_cursor_ends_the_stream() {
        let stub = StubTransport::new(|_| ok(json!({ "feed": [{ "post": post_json(1) }], "cursor": null })));
        let client = signed_in_client(stub.clone());
        let mut list = Paginator::new();

        assert!(load_next(&client, &mut list).await);
        assert!(list.is_exhausted());
        assert!(list.next_page().is_none());
        assert!(!load_next(&client, &mut list).await);
        assert_eq!(stub.call_count(), 1);
        assert_eq!(list.items().len(), 1);
    }

    #[tokio::test]
    async fn page_request_while_pending_is_dropped() {
        let gate = Arc::new(Notify::new());
        let stub = StubTransport::gated(
            |_| ok(json!({ "feed": [{ "post": post_json(1) }], "cursor": "c1" })),
            gate.clone(),
        );
        let client = signed_in_client(stub.clone());
        let list = Arc::new(Mutex::new(Paginator::<FeedViewPost>::new()));

        let request = list.lock().await.next_page().unwrap();
        let task = {
            let client = client.clone();
            let list = list.clone();
            tokio::spawn(async move {
                let result = client
                    .fetch_page(&Endpoint::timeline(), request.cursor.as_deref())
                    .await;
                list.lock().await.apply(&request, result)
            })
        };

        while stub.call_count() == 0 {
            tokio::task::yield_now().await;
        }
        assert!(list.lock().await.next_page().is_none());
        assert!(list.lock().await.refresh().is_none());

        gate.notify_one();
        assert!(task.await.unwrap());
        assert_eq!(stub.call_count(), 1);
        assert_eq!(list.lock().await.items().len(), 1);
    }

    #[test]
    fn error_keeps_items_and_lowercases() {
        let mut list = Paginator::new();
        let req = list.next_page().unwrap();
        list.apply::<String>(&req, Ok(page(vec![1, 2], Some("c1"))));

        let req = list.next_page().unwrap();
        assert_eq!(req.cursor.as_deref(), Some("c1"));
        list.apply(&req, Err("Network Down"));

        assert_eq!(list.items(), [1, 2]);
        assert_eq!(list.error(), Some("network down"));
        assert_eq!(list.cursor(), Some("c1"));

        // Retrying continues from the same cursor.
        let retry = list.next_page().unwrap();
        assert_eq!(retry.cursor.as_deref(), Some("c1"));
    }

    #[test]
    fn refresh_discards_and_drops_stale_results() {
        let mut list = Paginator::new();
        let first = list.next_page().unwrap();
        list.apply::<String>(&first, Ok(page(vec![1], Some("c1"))));

        let stale = list.next_page().unwrap();
        let fresh = list.reset();
        assert_eq!(fresh.cursor, None);
        assert!(list.items().is_empty());

        assert!(!list.apply::<String>(&stale, Ok(page(vec![99], None))));
        assert!(list.is_loading());

        assert!(list.apply::<String>(&fresh, Ok(page(vec![7], None))));
        assert_eq!(list.items(), [7]);
    }

    #[test]
    fn clear_goes_idle_and_invalidates() {
        let mut list = Paginator::<u32>::new();
        let req = list.next_page().unwrap();
        list.clear();
        assert_eq!(list.phase(), &LoadPhase::Idle);
        assert!(!list.apply::<String>(&req, Ok(page(vec![1], None))));
        assert!(list.items().is_empty());
        assert!(list.next_page().is_some());
    }

    #[test]
    fn load_more_near_tail_only_when_idle() {
        let mut list = Paginator::new();
        assert!(!list.should_load_more(0, 3));

        let req = list.next_page().unwrap();
        list.apply::<String>(&req, Ok(page((0..10).collect(), Some("c"))));
        assert!(!list.should_load_more(2, 3));
        assert!(list.should_load_more(7, 3));

        let req = list.next_page().unwrap();
        assert!(!list.should_load_more(9, 3));
        list.apply::<String>(&req, Ok(page(vec![10], None)));
        assert!(!list.should_load_more(10, 3));
    }
}
