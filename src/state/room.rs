//! Room state: membership, roles, bounded history (spec §3 "Room").

use crate::protocol::{Envelope, Role, RoomConfig, RoomPermissions};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet, VecDeque};

use super::session::SessionId;

/// Bounded FIFO of recent chat envelopes. Eviction is oldest-first and the
/// buffer never exceeds its configured capacity (spec §3, §4.4, §5).
#[derive(Debug)]
pub struct History {
    capacity: usize,
    entries: VecDeque<Envelope>,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity.min(256)),
        }
    }

    pub fn push(&mut self, envelope: Envelope) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(envelope);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The most recent `count` entries, oldest first.
    pub fn tail(&self, count: usize) -> Vec<&Envelope> {
        let skip = self.entries.len().saturating_sub(count);
        self.entries.iter().skip(skip).collect()
    }
}

/// A named chat room (spec §3).
#[derive(Debug)]
pub struct Room {
    pub id: String,
    pub name: String,
    pub description: String,
    pub members: HashSet<SessionId>,
    /// The creating session's id ("server" for the two seeded default
    /// rooms). Shares `member_roles`' key space so the creator's `OWNER`
    /// assignment below is found, not shadowed, by their first `join`.
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub persistent: bool,
    pub password: Option<String>,
    pub history: History,
    pub member_roles: HashMap<SessionId, Role>,
    pub permissions: RoomPermissions,
    pub config: RoomConfig,
}

/// Default room history capacity (spec §3, §5).
pub const MAX_HISTORY: usize = 100;

/// Default `count` cap for `room.history` sent on join (spec §4.4).
pub const JOIN_HISTORY_PREVIEW: usize = 20;

impl Room {
    pub fn new(
        id: String,
        created_by: String,
        name: Option<String>,
        description: Option<String>,
        persistent: bool,
        password: Option<String>,
    ) -> Self {
        let mut member_roles = HashMap::new();
        member_roles.insert(created_by.clone(), Role::Owner);

        Self {
            name: name.unwrap_or_else(|| id.clone()),
            description: description.unwrap_or_default(),
            id,
            members: HashSet::new(),
            created_by,
            created_at: Utc::now(),
            persistent,
            password,
            history: History::new(MAX_HISTORY),
            member_roles,
            permissions: RoomPermissions::default(),
            config: RoomConfig {
                persistent,
                ..RoomConfig::default()
            },
        }
    }

    pub fn has_password(&self) -> bool {
        self.password.is_some()
    }

    pub fn role_of(&self, session_id: &str) -> Option<Role> {
        self.member_roles.get(session_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_evicts_oldest_when_full() {
        let mut history = History::new(2);
        history.push(Envelope::chat("a", None, Default::default()));
        history.push(Envelope::chat("b", None, Default::default()));
        history.push(Envelope::chat("c", None, Default::default()));
        assert_eq!(history.len(), 2);
        let tail = history.tail(10);
        assert_eq!(tail[0].from, "b");
        assert_eq!(tail[1].from, "c");
    }

    #[test]
    fn creator_is_owner() {
        let room = Room::new("general".into(), "server".into(), None, None, true, None);
        assert_eq!(room.role_of("server"), Some(Role::Owner));
    }
}
