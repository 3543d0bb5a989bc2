//! Structured tracing helpers for the dispatcher.
//!
//! Gives every action a correlated span (session, room, action name) and a
//! timer that records its latency on drop, the same shape as the reference
//! daemon's IRC-aware telemetry, retargeted at envelope actions instead of
//! IRC commands.

use std::time::Instant;
use tracing::{Level, Span, span};

/// Structured trace context for one dispatched action.
#[derive(Debug, Clone, Default)]
pub struct ActionTraceContext {
    pub action: Option<String>,
    pub session_id: Option<String>,
    pub name: Option<String>,
    pub room_id: Option<String>,
}

impl ActionTraceContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_room_id(mut self, room_id: impl Into<String>) -> Self {
        self.room_id = Some(room_id.into());
        self
    }

    /// Create a tracing span carrying every attribute that was set.
    pub fn into_span(self) -> Span {
        let action = self.action.as_deref().unwrap_or("unknown");
        span!(
            Level::INFO,
            "action.dispatch",
            action = action,
            session_id = self.session_id.as_deref(),
            name = self.name.as_deref(),
            room_id = self.room_id.as_deref(),
        )
    }
}

/// Guard that records action latency when dropped, regardless of outcome.
pub struct ActionTimer {
    action: String,
    start: Instant,
}

impl ActionTimer {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            start: Instant::now(),
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Drop for ActionTimer {
    fn drop(&mut self) {
        tracing::debug!(action = %self.action, elapsed_secs = self.elapsed_secs(), "action dispatched");
    }
}
