pub mod feeds;
pub mod records;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod stub;

use std::fmt::Display;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::auth::session::SessionManager;
use transport::{HttpResponse, Transport, TransportError};
use types::XrpcErrorBody;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("network error: {0}")]
    Transport(#[from] TransportError),
    #[error("API error (status {status}): {detail}")]
    Api { status: u16, detail: String },
    #[error("deserialization error: {0}")]
    Deserialize(String),
    #[error("not signed in")]
    Unauthenticated,
    #[error("{0}")]
    Invalid(String),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

/// Lower-cased text for display in a view.
pub fn user_message(err: &impl Display) -> String {
    err.to_string().to_lowercase()
}

// ---------------------------------------------------------------------------
// URL and body helpers
// ---------------------------------------------------------------------------

pub(crate) fn xrpc_url(service_url: &str, nsid: &str) -> String {
    format!("{}/xrpc/{nsid}", service_url.trim_end_matches('/'))
}

/// Best human-readable reason from an XRPC error body.
pub(crate) fn xrpc_error_detail(resp: &HttpResponse) -> String {
    match serde_json::from_str::<XrpcErrorBody>(&resp.body) {
        Ok(XrpcErrorBody {
            message: Some(message),
            ..
        }) if !message.is_empty() => message,
        Ok(XrpcErrorBody {
            error: Some(error), ..
        }) if !error.is_empty() => error,
        _ => format!("http status {}", resp.status),
    }
}

pub(crate) fn decode<T: DeserializeOwned>(body: &str) -> Result<T, RequestError> {
    serde_json::from_str::<T>(body).map_err(|e| {
        tracing::debug!(body, "failed to decode response");
        RequestError::Deserialize(e.to_string())
    })
}

// ---------------------------------------------------------------------------
// API client
// ---------------------------------------------------------------------------

pub const DEFAULT_SERVICE_URL: &str = "https://bsky.social";

/// Authenticated XRPC client. The bearer token always comes from the shared
/// [`SessionManager`]; this type never stores one.
#[derive(Clone)]
pub struct BskyClient {
    transport: Arc<dyn Transport>,
    session: Arc<SessionManager>,
    service_url: String,
}

impl BskyClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        session: Arc<SessionManager>,
        service_url: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            session,
            service_url: service_url.into(),
        }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    fn bearer(&self) -> Result<String, RequestError> {
        let token = self.session.current_token();
        if token.is_empty() {
            return Err(RequestError::Unauthenticated);
        }
        Ok(token)
    }

    /// Authenticated GET; returns the body of a 200 response.
    pub(crate) async fn xrpc_get_body(
        &self,
        nsid: &str,
        params: &[(&str, &str)],
    ) -> Result<String, RequestError> {
        let token = self.bearer()?;
        let url = url::Url::parse_with_params(&xrpc_url(&self.service_url, nsid), params)?;
        tracing::debug!(nsid, "xrpc get");
        let resp = self.transport.get(url.as_str(), Some(&token)).await?;
        Self::check_status(nsid, resp)
    }

    pub(crate) async fn xrpc_get<T: DeserializeOwned>(
        &self,
        nsid: &str,
        params: &[(&str, &str)],
    ) -> Result<T, RequestError> {
        let body = self.xrpc_get_body(nsid, params).await?;
        decode(&body)
    }

    /// Authenticated POST of a JSON body; returns the body of a 200 response.
    pub(crate) async fn xrpc_post_body(
        &self,
        nsid: &str,
        body: &serde_json::Value,
    ) -> Result<String, RequestError> {
        let token = self.bearer()?;
        let url = xrpc_url(&self.service_url, nsid);
        tracing::debug!(nsid, "xrpc post");
        let resp = self.transport.post_json(&url, Some(&token), body).await?;
        Self::check_status(nsid, resp)
    }

    fn check_status(nsid: &str, resp: HttpResponse) -> Result<String, RequestError> {
        if resp.status != 200 {
            let detail = xrpc_error_detail(&resp);
            tracing::warn!(nsid, status = resp.status, %detail, "xrpc call failed");
            return Err(RequestError::Api {
                status: resp.status,
                detail,
            });
        }
        Ok(resp.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::stub::{StubTransport, TEST_SERVICE, ok, signed_in_client, status};
    use crate::auth::session::SessionManager;
    use crate::store::MemoryStore;

    #[test]
    fn xrpc_url_joins_service_and_method() {
        assert_eq!(
            xrpc_url("https://bsky.social/", "app.bsky.feed.getTimeline"),
            "https://bsky.social/xrpc/app.bsky.feed.getTimeline"
        );
    }

    #[test]
    fn error_detail_prefers_message() {
        let resp = HttpResponse {
            status: 400,
            body: r#"{"error":"InvalidRequest","message":"Record not found"}"#.into(),
        };
        assert_eq!(xrpc_error_detail(&resp), "Record not found");

        let resp = HttpResponse {
            status: 400,
            body: r#"{"error":"InvalidRequest"}"#.into(),
        };
        assert_eq!(xrpc_error_detail(&resp), "InvalidRequest");

        let resp = HttpResponse {
            status: 502,
            body: "<html>bad gateway</html>".into(),
        };
        assert_eq!(xrpc_error_detail(&resp), "http status 502");
    }

    #[tokio::test]
    async fn empty_token_aborts_before_network() {
        let stub = StubTransport::new(|_| ok(serde_json::json!({})));
        let session = Arc::new(SessionManager::new(
            stub.clone(),
            Box::new(MemoryStore::new()),
            TEST_SERVICE,
        ));
        let client = BskyClient::new(stub.clone(), session, TEST_SERVICE);

        let err = client
            .xrpc_get_body("app.bsky.feed.getTimeline", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::Unauthenticated));
        assert_eq!(stub.call_count(), 0);
    }

    #[tokio::test]
    async fn bearer_token_is_attached() {
        let stub = StubTransport::new(|_| ok(serde_json::json!({})));
        let client = signed_in_client(stub.clone());

        client
            .xrpc_get_body("app.bsky.actor.getProfile", &[("actor", "bob.test")])
            .await
            .unwrap();

        let call = &stub.calls()[0];
        assert_eq!(call.bearer.as_deref(), Some("access-1"));
        assert_eq!(call.nsid(), "app.bsky.actor.getProfile");
        assert_eq!(call.query("actor").as_deref(), Some("bob.test"));
    }

    #[tokio::test]
    async fn non_200_is_a_request_error() {
        let stub = StubTransport::new(|_| {
            status(
                401,
                serde_json::json!({"error": "ExpiredToken", "message": "Token has expired"}),
            )
        });
        let client = signed_in_client(stub);

        let err = client
            .xrpc_get_body("app.bsky.feed.getTimeline", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::Api { status: 401, .. }));
        assert_eq!(
            user_message(&err),
            "api error (status 401): token has expired"
        );
    }
}
