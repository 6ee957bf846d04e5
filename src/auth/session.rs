//! The one signed-in session of the process and the store behind it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use serde_json::Value;

use crate::api::transport::Transport;
use crate::api::types::CreateSessionResponse;
use crate::api::{xrpc_error_detail, xrpc_url};
use crate::auth::AuthError;
use crate::store::{KeyValueStore, StoreError};

const CREATE_SESSION: &str = "com.atproto.server.createSession";

const KEY_ACCESS: &str = "accessJwt";
const KEY_REFRESH: &str = "refreshJwt";
const KEY_HANDLE: &str = "handle";
const KEY_DID: &str = "userDID";
const KEY_AVATAR: &str = "userAvatar";
const KEY_SOUND: &str = "isSoundEnabled";
const KEY_CRT: &str = "isCRTModeEnabled";

const SESSION_KEYS: [&str; 5] = [KEY_ACCESS, KEY_REFRESH, KEY_HANDLE, KEY_DID, KEY_AVATAR];

#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub access_jwt: String,
    pub refresh_jwt: String,
    pub handle: String,
    /// Empty when restored from a store that never recorded it.
    pub did: String,
    pub avatar: Option<String>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("handle", &self.handle)
            .field("did", &self.did)
            .field("avatar", &self.avatar)
            .finish_non_exhaustive()
    }
}

impl From<CreateSessionResponse> for Session {
    fn from(resp: CreateSessionResponse) -> Self {
        Self {
            access_jwt: resp.access_jwt,
            refresh_jwt: resp.refresh_jwt,
            handle: resp.handle,
            did: resp.did,
            avatar: resp.avatar,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preferences {
    pub sound_enabled: bool,
    pub crt_mode: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            crt_mode: false,
        }
    }
}

/// Owns credential acquisition, persistence and the bearer token.
///
/// Shared as `Arc<SessionManager>`; only its own methods write the session.
/// Locks are held for plain field access and never across an `.await`.
pub struct SessionManager {
    transport: Arc<dyn Transport>,
    service_url: String,
    session: RwLock<Option<Session>>,
    store: Mutex<Box<dyn KeyValueStore>>,
}

impl SessionManager {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Box<dyn KeyValueStore>,
        service_url: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            service_url: service_url.into(),
            session: RwLock::new(None),
            store: Mutex::new(store),
        }
    }

    fn store(&self) -> MutexGuard<'_, Box<dyn KeyValueStore>> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn replace_session(&self, session: Option<Session>) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = session;
    }

    /// Snapshot of the in-memory session.
    pub fn session(&self) -> Option<Session> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session().is_some_and(|s| !s.access_jwt.is_empty())
    }

    // -- Login / logout -----------------------------------------------------

    /// Exchange an identifier and app password for a session, then persist it.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<Session, AuthError> {
        let url = xrpc_url(&self.service_url, CREATE_SESSION);
        let body = serde_json::json!({
            "identifier": identifier,
            "password": password,
        });

        tracing::info!(identifier, "creating session");
        let resp = self
            .transport
            .post_json(&url, None, &body)
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        if resp.status != 200 {
            let reason = xrpc_error_detail(&resp);
            tracing::warn!(status = resp.status, %reason, "login rejected");
            return Err(AuthError::Rejected {
                status: resp.status,
                reason,
            });
        }

        let created: CreateSessionResponse = serde_json::from_str(&resp.body)
            .map_err(|e| AuthError::MalformedResponse(e.to_string()))?;
        let session = Session::from(created);

        if let Err(e) = self.persist(&session) {
            tracing::warn!("failed to persist session: {e}");
            self.clear_persisted();
            return Err(AuthError::Storage(e));
        }
        self.replace_session(Some(session.clone()));
        tracing::info!(handle = %session.handle, "signed in");
        Ok(session)
    }

    fn persist(&self, session: &Session) -> Result<(), StoreError> {
        let mut store = self.store();
        store.set(KEY_ACCESS, Value::from(session.access_jwt.as_str()))?;
        store.set(KEY_REFRESH, Value::from(session.refresh_jwt.as_str()))?;
        store.set(KEY_HANDLE, Value::from(session.handle.as_str()))?;
        store.set(KEY_DID, Value::from(session.did.as_str()))?;
        match &session.avatar {
            Some(avatar) => store.set(KEY_AVATAR, Value::from(avatar.as_str()))?,
            None => store.remove(KEY_AVATAR)?,
        }
        Ok(())
    }

    /// Forget the session in memory and on disk. Never fails; store errors
    /// are logged.
    pub fn logout(&self) {
        self.clear_persisted();
        self.replace_session(None);
        tracing::info!("signed out");
    }

    fn clear_persisted(&self) {
        let mut store = self.store();
        for key in SESSION_KEYS {
            if let Err(e) = store.remove(key) {
                tracing::warn!(key, "failed to clear persisted session field: {e}");
            }
        }
    }

    /// Rebuild the session from the store without touching the network.
    ///
    /// Requires a non-empty access token, refresh token and handle.
    pub fn restore_session(&self) -> bool {
        let restored = {
            let store = self.store();
            let get = |key: &str| store.get_string(key).filter(|v| !v.is_empty());
            match (get(KEY_ACCESS), get(KEY_REFRESH), get(KEY_HANDLE)) {
                (Some(access_jwt), Some(refresh_jwt), Some(handle)) => Some(Session {
                    access_jwt,
                    refresh_jwt,
                    handle,
                    did: get(KEY_DID).unwrap_or_default(),
                    avatar: get(KEY_AVATAR),
                }),
                _ => None,
            }
        };

        match restored {
            Some(session) => {
                tracing::debug!(handle = %session.handle, "session restored");
                self.replace_session(Some(session));
                true
            }
            None => false,
        }
    }

    // -- Token access -------------------------------------------------------

    /// In-memory token, else the persisted one, else an empty string.
    pub fn current_token(&self) -> String {
        if let Some(session) = self.session()
            && !session.access_jwt.is_empty()
        {
            return session.access_jwt;
        }
        self.store().get_string(KEY_ACCESS).unwrap_or_default()
    }

    /// DID of the signed-in account, used as `repo` for record writes.
    pub fn did(&self) -> Option<String> {
        if let Some(session) = self.session()
            && !session.did.is_empty()
        {
            return Some(session.did);
        }
        self.store().get_string(KEY_DID).filter(|v| !v.is_empty())
    }

    pub fn handle(&self) -> Option<String> {
        self.session().map(|s| s.handle)
    }

    // -- Preferences --------------------------------------------------------

    /// Stored UI preferences; a missing value is written back as its default.
    pub fn preferences(&self) -> Preferences {
        let defaults = Preferences::default();
        let mut store = self.store();
        Preferences {
            sound_enabled: bool_or_default(&mut **store, KEY_SOUND, defaults.sound_enabled),
            crt_mode: bool_or_default(&mut **store, KEY_CRT, defaults.crt_mode),
        }
    }

    pub fn set_preferences(&self, prefs: Preferences) -> Result<(), StoreError> {
        let mut store = self.store();
        store.set(KEY_SOUND, Value::Bool(prefs.sound_enabled))?;
        store.set(KEY_CRT, Value::Bool(prefs.crt_mode))?;
        Ok(())
    }
}

fn bool_or_default(store: &mut dyn KeyValueStore, key: &str, default: bool) -> bool {
    if let Some(value) = store.get_bool(key) {
        return value;
    }
    if let Err(e) = store.set(key, Value::Bool(default)) {
        tracing::warn!(key, "failed to store default preference: {e}");
    }
    default
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::stub::{StubTransport, TEST_SERVICE, ok, signed_in_store, status};
    use crate::store::MemoryStore;

    fn manager(stub: Arc<StubTransport>, store: MemoryStore) -> SessionManager {
        SessionManager::new(stub, Box::new(store), TEST_SERVICE)
    }

    fn unused_transport() -> Arc<StubTransport> {
        StubTransport::new(|call| panic!("unexpected network call to {}", call.url))
    }

    #[test]
    fn restore_with_required_fields_authenticates() {
        let sm = manager(unused_transport(), signed_in_store());
        assert!(sm.restore_session());
        assert!(sm.is_authenticated());
        assert_eq!(sm.handle().as_deref(), Some("alice.test"));
        assert_eq!(sm.did().as_deref(), Some("did:plc:alice"));
    }

    #[test]
    fn restore_without_did_or_avatar_still_authenticates() {
        let store = MemoryStore::new()
            .with("accessJwt", "a")
            .with("refreshJwt", "r")
            .with("handle", "alice.test");
        let sm = manager(unused_transport(), store);
        assert!(sm.restore_session());
        assert_eq!(sm.session().map(|s| s.did), Some(String::new()));
        assert_eq!(sm.did(), None);
    }

    #[test]
    fn restore_missing_any_required_field_stays_signed_out() {
        for missing in [KEY_ACCESS, KEY_REFRESH, KEY_HANDLE] {
            let mut store = signed_in_store();
            store.remove(missing).unwrap();
            let sm = manager(unused_transport(), store);
            assert!(!sm.restore_session(), "restored without {missing}");
            assert!(!sm.is_authenticated());
        }
    }

    #[test]
    fn restore_treats_empty_values_as_missing() {
        let store = signed_in_store().with("handle", "");
        let sm = manager(unused_transport(), store);
        assert!(!sm.restore_session());
    }

    #[test]
    fn current_token_falls_back_to_store_then_empty() {
        let sm = manager(
            unused_transport(),
            MemoryStore::new().with("accessJwt", "stored"),
        );
        assert!(!sm.is_authenticated());
        assert_eq!(sm.current_token(), "stored");

        let sm = manager(unused_transport(), MemoryStore::new());
        assert_eq!(sm.current_token(), "");
    }

    #[tokio::test]
    async fn login_persists_every_field() {
        let stub = StubTransport::new(|call| {
            assert_eq!(call.nsid(), CREATE_SESSION);
            assert!(call.bearer.is_none());
            let body = call.body.as_ref().unwrap();
            assert_eq!(body["identifier"], "alice.test");
            assert_eq!(body["password"], "app-pass");
            ok(serde_json::json!({
                "accessJwt": "acc",
                "refreshJwt": "ref",
                "handle": "alice.test",
                "did": "did:plc:alice",
                "avatar": "https://cdn.test/a.jpg"
            }))
        });
        let sm = manager(stub, MemoryStore::new());

        let session = sm.login("alice.test", "app-pass").await.unwrap();
        assert_eq!(session.did, "did:plc:alice");
        assert!(sm.is_authenticated());
        assert_eq!(sm.current_token(), "acc");

        // A fresh manager over the same store comes back signed in.
        let store = std::mem::replace(&mut *sm.store(), Box::new(MemoryStore::new()));
        let restored = SessionManager::new(unused_transport(), store, TEST_SERVICE);
        assert!(restored.restore_session());
        assert_eq!(
            restored.session().and_then(|s| s.avatar).as_deref(),
            Some("https://cdn.test/a.jpg")
        );
    }

    #[tokio::test]
    async fn failed_login_surfaces_reason_and_stays_signed_out() {
        let stub = StubTransport::new(|_| {
            status(
                401,
                serde_json::json!({
                    "error": "AuthenticationRequired",
                    "message": "Invalid identifier or password"
                }),
            )
        });
        let sm = manager(stub, MemoryStore::new());

        let err = sm.login("alice.test", "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::Rejected { status: 401, .. }));
        assert!(!err.to_string().is_empty());
        assert!(err.to_string().contains("Invalid identifier or password"));
        assert!(!sm.is_authenticated());
        assert_eq!(sm.current_token(), "");
    }

    #[tokio::test]
    async fn malformed_login_body_is_an_auth_error() {
        let stub = StubTransport::new(|_| ok(serde_json::json!({ "handle": "alice.test" })));
        let sm = manager(stub, MemoryStore::new());

        let err = sm.login("alice.test", "pw").await.unwrap_err();
        assert!(matches!(err, AuthError::MalformedResponse(_)));
        assert!(!sm.is_authenticated());
    }

    /// Accepts a fixed number of writes, then fails like a full disk.
    struct FullDiskStore {
        inner: MemoryStore,
        writes_left: usize,
    }

    impl KeyValueStore for FullDiskStore {
        fn get(&self, key: &str) -> Option<Value> {
            self.inner.get(key)
        }

        fn set(&mut self, key: &str, value: Value) -> Result<(), StoreError> {
            if self.writes_left == 0 {
                return Err(std::io::Error::other("disk full").into());
            }
            self.writes_left -= 1;
            self.inner.set(key, value)
        }

        fn remove(&mut self, key: &str) -> Result<(), StoreError> {
            self.inner.remove(key)
        }
    }

    #[tokio::test]
    async fn login_that_cannot_persist_leaves_no_token_behind() {
        let stub = StubTransport::new(|_| {
            ok(serde_json::json!({
                "accessJwt": "acc",
                "refreshJwt": "ref",
                "handle": "alice.test",
                "did": "did:plc:alice"
            }))
        });
        let store = FullDiskStore {
            inner: MemoryStore::new(),
            writes_left: 1,
        };
        let sm = SessionManager::new(stub, Box::new(store), TEST_SERVICE);

        let err = sm.login("alice.test", "app-pass").await.unwrap_err();
        assert!(matches!(err, AuthError::Storage(_)));
        assert!(!sm.is_authenticated());
        assert_eq!(sm.current_token(), "");
        assert_eq!(sm.did(), None);
        assert!(!sm.restore_session());
    }

    #[test]
    fn logout_clears_everything_and_is_idempotent() {
        let sm = manager(unused_transport(), signed_in_store().with("isSoundEnabled", false));
        assert!(sm.restore_session());

        sm.logout();
        sm.logout();

        assert!(!sm.is_authenticated());
        assert_eq!(sm.current_token(), "");
        assert_eq!(sm.did(), None);
        assert!(!sm.restore_session());
        // Preferences outlive the session.
        assert!(!sm.preferences().sound_enabled);
    }

    #[test]
    fn preferences_default_and_persist() {
        let sm = manager(unused_transport(), MemoryStore::new());
        assert_eq!(sm.preferences(), Preferences::default());
        assert_eq!(sm.store().get_bool(KEY_SOUND), Some(true));
        assert_eq!(sm.store().get_bool(KEY_CRT), Some(false));

        sm.set_preferences(Preferences {
            sound_enabled: false,
            crt_mode: true,
        })
        .unwrap();
        assert!(sm.preferences().crt_mode);
        assert!(!sm.preferences().sound_enabled);
    }
}
