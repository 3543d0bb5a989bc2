//! AgentRoom Service: a real-time chat room server for named clients over a
//! single long-lived connection per client (welcome → auth → room join/chat →
//! disconnect).

pub mod config;
pub mod error;
pub mod metrics;
pub mod network;
pub mod protocol;
pub mod state;
pub mod telemetry;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::state::{RoomRegistry, SessionRegistry};

/// The process-wide core: the two registries plus resolved configuration.
/// Constructed once in `main` and handed to the gateway by reference
/// (spec §9 "Global registries should NOT be process-global singletons").
pub struct Server {
    pub sessions: SessionRegistry,
    pub rooms: RoomRegistry,
    pub config: Config,
    pub started_at: DateTime<Utc>,
}

impl Server {
    pub fn new(config: Config) -> Arc<Self> {
        Arc::new(Self {
            sessions: SessionRegistry::new(),
            rooms: RoomRegistry::new(),
            config,
            started_at: Utc::now(),
        })
    }

    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_server_seeds_default_rooms() {
        let server = Server::new(Config::default());
        assert!(server.rooms.has("general"));
        assert!(server.rooms.has("random"));
        assert_eq!(server.sessions.count(), 0);
    }
}
