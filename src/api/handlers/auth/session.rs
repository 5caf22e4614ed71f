//! Session store and cookie plumbing for the admin back office.
//!
//! Sessions are keyed by a cookie-carried identifier and expire on a sliding
//! window enforced by the store; handlers never see an expired session.

use async_trait::async_trait;
use axum::http::{
    header::{InvalidHeaderValue, COOKIE},
    HeaderMap, HeaderValue,
};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::machine::LoginSession;

pub(crate) const SESSION_COOKIE_NAME: &str = "jollysite_session";

/// Capability used by handlers: get/set/destroy a login session by key.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, id: &str) -> Option<LoginSession>;
    async fn save(&self, id: &str, session: LoginSession);
    async fn destroy(&self, id: &str);
}

struct Entry {
    session: LoginSession,
    last_seen: Instant,
}

/// In-memory store with a sliding time-to-live per session.
pub struct MemorySessionStore {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: &str) -> Option<LoginSession> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        entries.retain(|_, entry| now.saturating_duration_since(entry.last_seen) < self.ttl);
        let entry = entries.get_mut(id)?;
        // Sliding window: touching the session extends it.
        entry.last_seen = now;
        Some(entry.session.clone())
    }

    async fn save(&self, id: &str, session: LoginSession) {
        let mut entries = self.entries.lock().await;
        entries.insert(
            id.to_string(),
            Entry {
                session,
                last_seen: Instant::now(),
            },
        );
    }

    async fn destroy(&self, id: &str) {
        let mut entries = self.entries.lock().await;
        entries.remove(id);
    }
}

pub(crate) fn generate_session_id() -> String {
    Uuid::new_v4().to_string()
}

pub(crate) fn extract_session_id(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == SESSION_COOKIE_NAME {
            return Some(val.to_string());
        }
    }
    None
}

/// Build the `HttpOnly` cookie carrying the session identifier.
pub(crate) fn session_cookie(
    id: &str,
    ttl_seconds: i64,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie =
        format!("{SESSION_COOKIE_NAME}={id}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(crate) fn clear_session_cookie(secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_load_destroy_round_trip() {
        let store = MemorySessionStore::new(Duration::from_secs(60));
        let id = generate_session_id();

        assert!(store.load(&id).await.is_none());

        store.save(&id, LoginSession::new()).await;
        assert!(store.load(&id).await.is_some());

        store.destroy(&id).await;
        assert!(store.load(&id).await.is_none());
    }

    #[tokio::test]
    async fn expired_sessions_are_pruned_on_access() {
        let store = MemorySessionStore::new(Duration::from_millis(20));
        let id = generate_session_id();
        store.save(&id, LoginSession::new()).await;

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(store.load(&id).await.is_none());
    }

    #[tokio::test]
    async fn loading_extends_the_sliding_window() {
        let store = MemorySessionStore::new(Duration::from_millis(80));
        let id = generate_session_id();
        store.save(&id, LoginSession::new()).await;

        for _ in 0..3 {
            tokio::time::sleep(Duration::from_millis(40)).await;
            assert!(store.load(&id).await.is_some());
        }
    }

    #[test]
    fn extract_session_id_reads_the_cookie_pair() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("other=1; jollysite_session=abc-123; theme=light"),
        );
        assert_eq!(extract_session_id(&headers), Some("abc-123".to_string()));
    }

    #[test]
    fn extract_session_id_none_without_cookie() {
        let headers = HeaderMap::new();
        assert_eq!(extract_session_id(&headers), None);
    }

    #[test]
    fn cookies_are_http_only_and_optionally_secure() {
        let cookie = session_cookie("abc", 14400, false).expect("cookie");
        let value = cookie.to_str().expect("ascii");
        assert!(value.contains("jollysite_session=abc"));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("Max-Age=14400"));
        assert!(!value.contains("Secure"));

        let cookie = session_cookie("abc", 14400, true).expect("cookie");
        assert!(cookie.to_str().expect("ascii").contains("Secure"));

        let cleared = clear_session_cookie(true).expect("cookie");
        assert!(cleared.to_str().expect("ascii").contains("Max-Age=0"));
    }
}
