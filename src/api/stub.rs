//! In-process transport for unit tests: records every call and answers from a closure.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Notify;

use crate::api::BskyClient;
use crate::api::transport::{HttpResponse, Transport, TransportError};
use crate::auth::session::SessionManager;
use crate::store::MemoryStore;

pub const TEST_SERVICE: &str = "https://pds.test";
pub const TEST_DID: &str = "did:plc:alice";

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: &'static str,
    pub url: String,
    pub bearer: Option<String>,
    pub body: Option<Value>,
}

impl RecordedCall {
    /// The XRPC method name, e.g. `app.bsky.feed.getTimeline`.
    pub fn nsid(&self) -> String {
        let path = self.url.split('?').next().unwrap_or_default();
        path.rsplit('/').next().unwrap_or_default().to_string()
    }

    pub fn query(&self, key: &str) -> Option<String> {
        let url = url::Url::parse(&self.url).ok()?;
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }
}

type Handler = Box<dyn Fn(&RecordedCall) -> Result<HttpResponse, TransportError> + Send + Sync>;

pub struct StubTransport {
    handler: Handler,
    calls: Mutex<Vec<RecordedCall>>,
    gate: Option<Arc<Notify>>,
}

impl StubTransport {
    pub fn new(
        handler: impl Fn(&RecordedCall) -> Result<HttpResponse, TransportError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
            gate: None,
        })
    }

    /// Every call is recorded immediately but only answered after `gate` is notified.
    pub fn gated(
        handler: impl Fn(&RecordedCall) -> Result<HttpResponse, TransportError> + Send + Sync + 'static,
        gate: Arc<Notify>,
    ) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
            gate: Some(gate),
        })
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    async fn respond(&self, call: RecordedCall) -> Result<HttpResponse, TransportError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        (self.handler)(&call)
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn get(&self, url: &str, bearer: Option<&str>) -> Result<HttpResponse, TransportError> {
        self.respond(RecordedCall {
            method: "GET",
            url: url.to_string(),
            bearer: bearer.map(str::to_string),
            body: None,
        })
        .await
    }

    async fn post_json(
        &self,
        url: &str,
        bearer: Option<&str>,
        body: &Value,
    ) -> Result<HttpResponse, TransportError> {
        self.respond(RecordedCall {
            method: "POST",
            url: url.to_string(),
            bearer: bearer.map(str::to_string),
            body: Some(body.clone()),
        })
        .await
    }
}

pub fn ok(body: Value) -> Result<HttpResponse, TransportError> {
    status(200, body)
}

pub fn status(code: u16, body: Value) -> Result<HttpResponse, TransportError> {
    Ok(HttpResponse {
        status: code,
        body: body.to_string(),
    })
}

pub fn signed_in_store() -> MemoryStore {
    MemoryStore::new()
        .with("accessJwt", "access-1")
        .with("refreshJwt", "refresh-1")
        .with("handle", "alice.test")
        .with("userDID", TEST_DID)
}

/// A client whose session was restored from [`signed_in_store`].
pub fn signed_in_client(stub: Arc<StubTransport>) -> BskyClient {
    let session = Arc::new(SessionManager::new(
        stub.clone(),
        Box::new(signed_in_store()),
        TEST_SERVICE,
    ));
    assert!(session.restore_session());
    BskyClient::new(stub, session, TEST_SERVICE)
}

/// A minimal `app.bsky.feed.defs#postView` JSON object.
pub fn post_json(n: u32) -> Value {
    serde_json::json!({
        "uri": format!("at://did:plc:bob/app.bsky.feed.post/{n}"),
        "cid": format!("cid{n}"),
        "author": { "did": "did:plc:bob", "handle": "bob.test" },
        "record": { "text": format!("post {n}"), "createdAt": "2024-03-21T12:00:00.000Z" },
        "likeCount": 2,
        "repostCount": 1,
        "replyCount": 0,
        "indexedAt": "2024-03-21T12:00:00.000Z"
    })
}
