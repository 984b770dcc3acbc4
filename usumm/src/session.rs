//! In-memory browser sessions.
//!
//! A session is identified by a random value in the `usumm_session` cookie and holds the OAuth
//! state for one browser: the credential once signed in, and the pending authorization while a
//! login round-trip is in flight. Nothing is persisted; a restart signs everyone out.

use crate::credential::Credential;
use crate::oauth::PendingAuthorization;
use cookie::{Cookie, SameSite};
use http::HeaderMap;
use http::header::COOKIE;
use oauth2::CsrfToken;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub const COOKIE_NAME: &str = "usumm_session";

/// Sessions untouched for this long are forgotten.
pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Default, Clone)]
struct Session {
    credential: Option<Credential>,
    pending: Option<PendingAuthorization>,
}

#[derive(Debug)]
struct Entry {
    session: Session,
    last_seen: Instant,
}

#[derive(Debug)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Entry>>,
    idle_ttl: Duration,
    secure_cookie: bool,
}

impl SessionStore {
    /// `secure_cookie` should be set when the app is served over https.
    pub fn new(idle_ttl: Duration, secure_cookie: bool) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            idle_ttl,
            secure_cookie,
        }
    }

    /// The credential of session `id`, if it is signed in.
    pub async fn credential(&self, id: &str) -> Option<Credential> {
        let mut sessions = self.sessions.lock().await;
        let entry = self.live_entry(&mut sessions, id)?;
        entry.session.credential.clone()
    }

    /// Replaces the credential of session `id` with `fresh`, e.g. after a token refresh.
    ///
    /// Only takes effect while the session still holds `previous`: a session that was signed out
    /// or dropped in the meantime stays that way. Returns whether the credential was replaced.
    pub async fn store_credential(
        &self,
        id: &str,
        previous: &Credential,
        fresh: Credential,
    ) -> bool {
        let mut sessions = self.sessions.lock().await;
        match self.live_entry(&mut sessions, id) {
            Some(entry) if entry.session.credential.as_ref() == Some(previous) => {
                entry.session.credential = Some(fresh);
                true
            }
            _ => false,
        }
    }

    /// Signs session `id` out. The session itself stays around.
    pub async fn clear_credential(&self, id: &str) {
        let mut sessions = self.sessions.lock().await;
        if let Some(entry) = self.live_entry(&mut sessions, id) {
            entry.session.credential = None;
        }
    }

    /// Records a login in flight and returns the session it belongs to.
    ///
    /// Unknown or missing ids get a fresh session; callers must send the cookie for the
    /// returned id.
    pub async fn begin_login(&self, id: Option<&str>, pending: PendingAuthorization) -> String {
        let mut sessions = self.sessions.lock().await;
        self.prune(&mut sessions);

        let id = match id {
            Some(id) if sessions.contains_key(id) => id.to_string(),
            _ => new_session_id(),
        };
        let entry = sessions.entry(id.clone()).or_insert_with(|| Entry {
            session: Session::default(),
            last_seen: Instant::now(),
        });
        entry.session.pending = Some(pending);
        entry.last_seen = Instant::now();
        id
    }

    /// Removes and returns the login in flight for session `id`.
    ///
    /// A pending authorization can only be redeemed once.
    pub async fn take_pending(&self, id: &str) -> Option<PendingAuthorization> {
        let mut sessions = self.sessions.lock().await;
        let entry = self.live_entry(&mut sessions, id)?;
        entry.session.pending.take()
    }

    /// Finishes a login by moving the session to a new id carrying `credential`.
    ///
    /// Returns the new id; the old one stops working.
    pub async fn complete_login(&self, id: &str, credential: Credential) -> String {
        let mut sessions = self.sessions.lock().await;
        self.prune(&mut sessions);
        sessions.remove(id);

        let id = new_session_id();
        sessions.insert(
            id.clone(),
            Entry {
                session: Session {
                    credential: Some(credential),
                    pending: None,
                },
                last_seen: Instant::now(),
            },
        );
        tracing::debug!(sessions = sessions.len(), "session signed in");
        id
    }

    /// `Set-Cookie` value binding the browser to session `id`.
    pub fn cookie(&self, id: &str) -> String {
        Cookie::build((COOKIE_NAME, id.to_string()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure_cookie)
            .build()
            .to_string()
    }

    /// Looks up `id`, dropping it if it has been idle too long, and marks it as used.
    fn live_entry<'a>(
        &self,
        sessions: &'a mut HashMap<String, Entry>,
        id: &str,
    ) -> Option<&'a mut Entry> {
        let now = Instant::now();
        if sessions
            .get(id)
            .is_some_and(|e| now.duration_since(e.last_seen) > self.idle_ttl)
        {
            sessions.remove(id);
            return None;
        }
        let entry = sessions.get_mut(id)?;
        entry.last_seen = now;
        Some(entry)
    }

    fn prune(&self, sessions: &mut HashMap<String, Entry>) {
        let now = Instant::now();
        let before = sessions.len();
        sessions.retain(|_, e| now.duration_since(e.last_seen) <= self.idle_ttl);
        let pruned = before - sessions.len();
        if pruned > 0 {
            tracing::debug!(pruned, "dropped idle sessions");
        }
    }
}

fn new_session_id() -> String {
    CsrfToken::new_random().secret().clone()
}

/// The session id presented in the request's `Cookie` headers, if any.
pub fn session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| Cookie::split_parse(v))
        .filter_map(Result::ok)
        .find(|c| c.name() == COOKIE_NAME && !c.value().is_empty())
        .map(|c| c.value().to_string())
}
