use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value, json};

use crate::api::types::{CreatedRecord, RecordRef, ReplyRef};
use crate::api::{BskyClient, RequestError, decode};

pub const POST_COLLECTION: &str = "app.bsky.feed.post";
pub const LIKE_COLLECTION: &str = "app.bsky.feed.like";
pub const REPOST_COLLECTION: &str = "app.bsky.feed.repost";

/// Maximum post length, in characters.
pub const POST_CHAR_LIMIT: usize = 300;

pub fn validate_post_text(text: &str) -> Result<(), RequestError> {
    if text.trim().is_empty() {
        return Err(RequestError::Invalid("post text is empty".into()));
    }
    let len = text.chars().count();
    if len > POST_CHAR_LIMIT {
        return Err(RequestError::Invalid(format!(
            "post is {len} characters; the limit is {POST_CHAR_LIMIT}"
        )));
    }
    Ok(())
}

/// `createRecord` body: `fields` plus `$type` and a millisecond `createdAt`.
pub(crate) fn record_body(
    repo: &str,
    collection: &str,
    fields: Map<String, Value>,
    created_at: DateTime<Utc>,
) -> Value {
    let mut record = fields;
    record.insert("$type".into(), Value::from(collection));
    record.insert(
        "createdAt".into(),
        Value::from(created_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    json!({
        "repo": repo,
        "collection": collection,
        "record": record,
    })
}

fn fields(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

impl BskyClient {
    async fn create_record(
        &self,
        collection: &str,
        record: Map<String, Value>,
    ) -> Result<CreatedRecord, RequestError> {
        let repo = self.session().did().ok_or(RequestError::Unauthenticated)?;
        let body = record_body(&repo, collection, record, Utc::now());
        let resp = self
            .xrpc_post_body("com.atproto.repo.createRecord", &body)
            .await?;
        let created: CreatedRecord = decode(&resp)?;
        tracing::info!(collection, uri = %created.uri, "record created");
        Ok(created)
    }

    pub async fn create_post(&self, text: &str) -> Result<CreatedRecord, RequestError> {
        validate_post_text(text)?;
        self.create_record(POST_COLLECTION, fields(json!({ "text": text })))
            .await
    }

    /// Post `text` as a reply to `parent` in the thread rooted at `root`.
    pub async fn reply(
        &self,
        text: &str,
        parent: &RecordRef,
        root: &RecordRef,
    ) -> Result<CreatedRecord, RequestError> {
        validate_post_text(text)?;
        let reply = ReplyRef {
            root: root.clone(),
            parent: parent.clone(),
        };
        self.create_record(
            POST_COLLECTION,
            fields(json!({ "text": text, "reply": reply })),
        )
        .await
    }

    pub async fn like(&self, subject: &RecordRef) -> Result<CreatedRecord, RequestError> {
        self.create_record(LIKE_COLLECTION, fields(json!({ "subject": subject })))
            .await
    }

    pub async fn repost(&self, subject: &RecordRef) -> Result<CreatedRecord, RequestError> {
        self.create_record(REPOST_COLLECTION, fields(json!({ "subject": subject })))
            .await
    }

    pub async fn follow(&self, did: &str) -> Result<(), RequestError> {
        self.xrpc_post_body("app.bsky.graph.follow", &json!({ "subject": did }))
            .await?;
        tracing::info!(subject = did, "followed");
        Ok(())
    }

    pub async fn unfollow(&self, did: &str) -> Result<(), RequestError> {
        self.xrpc_post_body("app.bsky.graph.unfollow", &json!({ "subject": did }))
            .await?;
        tracing::info!(subject = did, "unfollowed");
        Ok(())
    }

    pub async fn send_message(&self, recipient_did: &str, text: &str) -> Result<(), RequestError> {
        if text.trim().is_empty() {
            return Err(RequestError::Invalid("message text is empty".into()));
        }
        self.xrpc_post_body(
            "app.bsky.feed.sendDirectMessage",
            &json!({ "recipientDid": recipient_did, "text": text }),
        )
        .await?;
        tracing::info!(recipient = recipient_did, "message sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::stub::{StubTransport, TEST_DID, TEST_SERVICE, ok, signed_in_client, status};
    use crate::auth::session::SessionManager;
    use crate::store::MemoryStore;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn created() -> Result<crate::api::transport::HttpResponse, crate::api::transport::TransportError>
    {
        ok(json!({ "uri": "at://did:plc:alice/app.bsky.feed.post/new", "cid": "newcid" }))
    }

    #[test]
    fn record_body_shape() {
        let at = Utc.with_ymd_and_hms(2024, 3, 21, 12, 0, 5).unwrap();
        let body = record_body(TEST_DID, LIKE_COLLECTION, fields(json!({ "x": 1 })), at);
        assert_eq!(body["repo"], TEST_DID);
        assert_eq!(body["collection"], LIKE_COLLECTION);
        assert_eq!(body["record"]["$type"], LIKE_COLLECTION);
        assert_eq!(body["record"]["createdAt"], "2024-03-21T12:00:05.000Z");
        assert_eq!(body["record"]["x"], 1);
    }

    #[test]
    fn post_text_validation() {
        assert!(validate_post_text("hello").is_ok());
        assert!(validate_post_text(&"é".repeat(POST_CHAR_LIMIT)).is_ok());
        assert!(matches!(
            validate_post_text("   \n"),
            Err(RequestError::Invalid(_))
        ));
        assert!(matches!(
            validate_post_text(&"a".repeat(POST_CHAR_LIMIT + 1)),
            Err(RequestError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn invalid_post_never_hits_network() {
        let stub = StubTransport::new(|_| created());
        let client = signed_in_client(stub.clone());
        assert!(client.create_post("").await.is_err());
        assert_eq!(stub.call_count(), 0);
    }

    #[tokio::test]
    async fn create_post_uses_session_did_as_repo() {
        let stub = StubTransport::new(|_| created());
        let client = signed_in_client(stub.clone());

        let rec = client.create_post("first skeet").await.unwrap();
        assert_eq!(rec.cid, "newcid");

        let call = &stub.calls()[0];
        assert_eq!(call.method, "POST");
        assert_eq!(call.nsid(), "com.atproto.repo.createRecord");
        let body = call.body.as_ref().unwrap();
        assert_eq!(body["repo"], TEST_DID);
        assert_eq!(body["record"]["$type"], POST_COLLECTION);
        assert_eq!(body["record"]["text"], "first skeet");
    }

    #[tokio::test]
    async fn reply_carries_root_and_parent() {
        let stub = StubTransport::new(|_| created());
        let client = signed_in_client(stub.clone());
        let parent = RecordRef {
            uri: "at://parent".into(),
            cid: "pc".into(),
        };
        let root = RecordRef {
            uri: "at://root".into(),
            cid: "rc".into(),
        };

        client.reply("me too", &parent, &root).await.unwrap();

        let body = stub.calls()[0].body.clone().unwrap();
        assert_eq!(body["record"]["reply"]["root"]["uri"], "at://root");
        assert_eq!(body["record"]["reply"]["parent"]["cid"], "pc");
    }

    #[tokio::test]
    async fn write_without_did_is_unauthenticated() {
        let stub = StubTransport::new(|_| created());
        let store = MemoryStore::new()
            .with("accessJwt", "a")
            .with("refreshJwt", "r")
            .with("handle", "alice.test");
        let session = Arc::new(SessionManager::new(
            stub.clone(),
            Box::new(store),
            TEST_SERVICE,
        ));
        assert!(session.restore_session());
        let client = BskyClient::new(stub.clone(), session, TEST_SERVICE);

        let subject = RecordRef {
            uri: "at://x".into(),
            cid: "c".into(),
        };
        let err = client.like(&subject).await.unwrap_err();
        assert!(matches!(err, RequestError::Unauthenticated));
        assert_eq!(stub.call_count(), 0);
    }

    #[tokio::test]
    async fn follow_and_message_bodies() {
        let stub = StubTransport::new(|_| ok(json!({})));
        let client = signed_in_client(stub.clone());

        client.follow("did:plc:bob").await.unwrap();
        client.unfollow("did:plc:bob").await.unwrap();
        client.send_message("did:plc:bob", "yo").await.unwrap();

        let calls = stub.calls();
        assert_eq!(calls[0].nsid(), "app.bsky.graph.follow");
        assert_eq!(calls[0].body.as_ref().unwrap()["subject"], "did:plc:bob");
        assert_eq!(calls[1].nsid(), "app.bsky.graph.unfollow");
        assert_eq!(calls[2].nsid(), "app.bsky.feed.sendDirectMessage");
        assert_eq!(
            calls[2].body.as_ref().unwrap()["recipientDid"],
            "did:plc:bob"
        );
    }

    #[tokio::test]
    async fn empty_message_is_rejected_locally() {
        let stub = StubTransport::new(|_| ok(json!({})));
        let client = signed_in_client(stub.clone());
        assert!(matches!(
            client.send_message("did:plc:bob", " ").await,
            Err(RequestError::Invalid(_))
        ));
        assert_eq!(stub.call_count(), 0);
    }

    #[tokio::test]
    async fn failed_write_surfaces_server_message() {
        let stub = StubTransport::new(|_| {
            status(400, json!({ "error": "InvalidRequest", "message": "Record not found" }))
        });
        let client = signed_in_client(stub);
        let err = client.follow("did:plc:ghost").await.unwrap_err();
        assert!(err.to_string().contains("Record not found"));
    }
}
