//! Session Registry (spec §4.3): connection↔session↔name↔identity maps,
//! reconnect-token takeover, and room-set tracking.
//!
//! `conn` in the spec's operation signatures is, in this implementation,
//! the `SessionId` itself: each connection owns exactly one `Session` for
//! its lifetime, so there is no separate raw-socket key to index by —
//! `byWs` and `byId` collapse into the same map (documented in
//! DESIGN.md). All operations are non-throwing; failures come back as
//! typed `Result`s.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashSet;

use crate::error::AuthError;
use crate::metrics;

use super::session::{Identity, Session, SessionId, Transport, generate_session_id, generate_token};

/// Result of a successful `authenticate` call.
#[derive(Debug, Clone)]
pub struct AuthOutcome {
    pub token: String,
    pub reconnected: bool,
    pub restored_rooms: Vec<String>,
    pub rooms: Vec<String>,
}

/// A read-only snapshot of an online session, for `listOnline`/`/users`.
#[derive(Debug, Clone)]
pub struct OnlineUser {
    pub session_id: SessionId,
    pub name: String,
    pub connected_at: chrono::DateTime<chrono::Utc>,
    pub rooms: Vec<String>,
}

pub struct SessionRegistry {
    sessions: DashMap<SessionId, Session>,
    by_name: DashMap<String, SessionId>,
    identities: DashMap<String, Identity>,
    /// Serializes `authenticate`'s check-then-act across `sessions`/
    /// `by_name`/`identities` (spec §5: concurrent `authenticate` calls for
    /// the same name MUST linearize). A coarse lock held for the whole
    /// method body, per §5's strategy (a) — the individual `DashMap`s stay
    /// lock-free for every other operation.
    auth_lock: Mutex<()>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            by_name: DashMap::new(),
            identities: DashMap::new(),
            auth_lock: Mutex::new(()),
        }
    }

    /// Allocate a new session for an inbound connection.
    pub fn register(&self, transport: Transport) -> SessionId {
        let id = generate_session_id();
        self.sessions.insert(id.clone(), Session::new(id.clone(), transport));
        metrics::CONNECTIONS_TOTAL.inc();
        metrics::CONNECTIONS_ACTIVE.inc();
        id
    }

    /// Authenticate (or re-authenticate / reconnect) a session under `name`.
    pub fn authenticate(
        &self,
        session_id: &str,
        name: &str,
        token: Option<&str>,
    ) -> Result<AuthOutcome, AuthError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AuthError::EmptyName);
        }

        // Holds for the whole check-then-act below so two concurrent
        // `authenticate` calls for the same name linearize (spec §5) instead
        // of both observing "no existing owner" and racing on `by_name`.
        let _guard = self.auth_lock.lock();

        // Re-auth on the same connection: only a no-op same-name refresh is
        // allowed (spec §9 Open Question 4 — implementation-defined; we
        // reject anything else).
        if let Some(current) = self.sessions.get(session_id) {
            if current.authenticated && current.name != name {
                return Err(AuthError::NameTaken(name.to_string()));
            }
        }

        let existing = self.by_name.get(name).map(|e| e.value().clone());
        let identity = self.identities.get(name).map(|e| e.value().clone());

        match (existing, identity) {
            // Case 1: takeover — another live connection already owns this name.
            (Some(existing_id), _) if existing_id != session_id => {
                let identity = identity.ok_or_else(|| AuthError::NameTaken(name.to_string()))?;
                let presented = token.ok_or_else(|| AuthError::NameTaken(name.to_string()))?;
                if presented != identity.token {
                    return Err(AuthError::InvalidToken(name.to_string()));
                }
                Ok(self.take_over(session_id, name, existing_id, identity))
            }
            // Case 2: restore — identity exists, no live connection owns the name.
            (None, Some(identity)) => {
                match token {
                    Some(presented) if presented == identity.token => {
                        Ok(self.restore(session_id, name, identity))
                    }
                    Some(_) => Err(AuthError::InvalidToken(name.to_string())),
                    // No token presented: fall through to a fresh assignment.
                    None => Ok(self.fresh_assign(session_id, name)),
                }
            }
            // Case 3/4: no identity yet (or re-auth of the same live session) — fresh assignment.
            _ => Ok(self.fresh_assign(session_id, name)),
        }
    }

    fn take_over(
        &self,
        new_session_id: &str,
        name: &str,
        old_session_id: SessionId,
        mut identity: Identity,
    ) -> AuthOutcome {
        if let Some((_, old)) = self.sessions.remove(&old_session_id) {
            old.close_with_code(4001, "Session taken over by reconnect");
        }

        let restored_rooms: Vec<String> = identity.rooms.iter().cloned().collect();
        if let Some(mut new_session) = self.sessions.get_mut(new_session_id) {
            new_session.name = name.to_string();
            new_session.authenticated = true;
            new_session.token = Some(identity.token.clone());
            new_session.rooms = identity.rooms.clone();
        }

        identity.last_user_id = new_session_id.to_string();
        let token = identity.token.clone();
        self.identities.insert(name.to_string(), identity);
        self.by_name.insert(name.to_string(), new_session_id.to_string());
        metrics::RECONNECT_TAKEOVERS_TOTAL.inc();
        metrics::SESSIONS_AUTHENTICATED.inc();

        AuthOutcome {
            token,
            reconnected: true,
            restored_rooms,
            rooms: vec![],
        }
    }

    fn restore(&self, session_id: &str, name: &str, mut identity: Identity) -> AuthOutcome {
        let rooms = identity.rooms.clone();
        if let Some(mut session) = self.sessions.get_mut(session_id) {
            session.name = name.to_string();
            session.authenticated = true;
            session.token = Some(identity.token.clone());
            session.rooms = rooms.clone();
        }
        identity.last_user_id = session_id.to_string();
        let token = identity.token.clone();
        self.identities.insert(name.to_string(), identity);
        self.by_name.insert(name.to_string(), session_id.to_string());
        metrics::SESSIONS_AUTHENTICATED.inc();

        AuthOutcome {
            token,
            reconnected: true,
            restored_rooms: rooms.into_iter().collect(),
            rooms: vec![],
        }
    }

    fn fresh_assign(&self, session_id: &str, name: &str) -> AuthOutcome {
        let token = generate_token();
        if let Some(mut session) = self.sessions.get_mut(session_id) {
            session.name = name.to_string();
            session.authenticated = true;
            session.token = Some(token.clone());
            session.rooms = HashSet::new();
        }
        self.identities.insert(
            name.to_string(),
            Identity {
                token: token.clone(),
                last_user_id: session_id.to_string(),
                rooms: HashSet::new(),
                created_at: chrono::Utc::now(),
            },
        );
        self.by_name.insert(name.to_string(), session_id.to_string());
        metrics::SESSIONS_AUTHENTICATED.inc();

        AuthOutcome {
            token,
            reconnected: false,
            restored_rooms: vec![],
            rooms: vec![],
        }
    }

    /// Remove a session on disconnect. The identity always survives.
    pub fn remove(&self, session_id: &str) {
        if let Some((_, session)) = self.sessions.remove(session_id) {
            metrics::CONNECTIONS_ACTIVE.dec();
            if session.authenticated {
                metrics::SESSIONS_AUTHENTICATED.dec();
                self.by_name.remove(&session.name);
                if let Some(mut identity) = self.identities.get_mut(&session.name) {
                    identity.rooms = session.rooms.clone();
                }
            }
        }
    }

    pub fn get_by_id(&self, session_id: &str) -> Option<dashmap::mapref::one::Ref<'_, SessionId, Session>> {
        self.sessions.get(session_id)
    }

    pub fn get_by_name(&self, name: &str) -> Option<SessionId> {
        self.by_name.get(name).map(|e| e.value().clone())
    }

    pub fn is_authenticated(&self, session_id: &str) -> bool {
        self.sessions
            .get(session_id)
            .map(|s| s.authenticated)
            .unwrap_or(false)
    }

    pub fn name_of(&self, session_id: &str) -> Option<String> {
        self.sessions.get(session_id).map(|s| s.name.clone())
    }

    /// Add `room_id` to both the session's and (if authenticated) the
    /// identity's room set.
    pub fn join_room(&self, session_id: &str, room_id: &str) {
        if let Some(mut session) = self.sessions.get_mut(session_id) {
            session.rooms.insert(room_id.to_string());
            if session.authenticated {
                if let Some(mut identity) = self.identities.get_mut(&session.name) {
                    identity.rooms.insert(room_id.to_string());
                }
            }
        }
    }

    /// Remove `room_id` from both the session's and the identity's room set.
    pub fn leave_room(&self, session_id: &str, room_id: &str) {
        if let Some(mut session) = self.sessions.get_mut(session_id) {
            session.rooms.remove(room_id);
            if session.authenticated {
                if let Some(mut identity) = self.identities.get_mut(&session.name) {
                    identity.rooms.remove(room_id);
                }
            }
        }
    }

    /// All currently authenticated sessions, for the HTTP `/users` view.
    pub fn list_online(&self) -> Vec<OnlineUser> {
        let mut users: Vec<OnlineUser> = self
            .sessions
            .iter()
            .filter(|s| s.authenticated)
            .map(|s| OnlineUser {
                session_id: s.id.clone(),
                name: s.name.clone(),
                connected_at: s.connected_at,
                rooms: s.rooms.iter().cloned().collect(),
            })
            .collect();
        users.sort_by(|a, b| a.connected_at.cmp(&b.connected_at));
        users
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    pub fn authenticated_count(&self) -> usize {
        self.sessions.iter().filter(|s| s.authenticated).count()
    }

    /// Identify sessions whose transport has closed without having gone
    /// through the normal disconnect path (spec §4.5 zombie sweep). Returns
    /// `(session_id, name)` pairs; the caller is responsible for running
    /// the same cleanup a normal disconnect would (room membership first,
    /// then `remove`), since only it can reach the Room Registry.
    pub fn find_zombies(&self) -> Vec<(SessionId, String)> {
        let zombies: Vec<(SessionId, String)> = self
            .sessions
            .iter()
            .filter(|s| s.is_closed())
            .map(|s| (s.id.clone(), s.name.clone()))
            .collect();
        if !zombies.is_empty() {
            metrics::ZOMBIE_SWEEPS_TOTAL.inc_by(zombies.len() as u64);
        }
        zombies
    }
}
