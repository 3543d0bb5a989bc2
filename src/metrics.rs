//! Prometheus metrics collection for the AgentRoom service.
//!
//! Pure observability (§1 Non-goals / §A.4 of SPEC_FULL.md): nothing here
//! is read back to change server behavior. Exposed at `GET /metrics`.

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

lazy_static! {
    /// Global Prometheus registry for all metrics.
    pub static ref REGISTRY: Registry = Registry::new();

    // ------------------------------------------------------------------
    // Counters (monotonic increasing)
    // ------------------------------------------------------------------

    /// Total connections accepted since startup.
    pub static ref CONNECTIONS_TOTAL: IntCounter = IntCounter::new(
        "agentroom_connections_total",
        "Total connections accepted"
    ).unwrap();

    /// Total chat messages broadcast into a room.
    pub static ref MESSAGES_BROADCAST_TOTAL: IntCounter = IntCounter::new(
        "agentroom_messages_broadcast_total",
        "Total chat messages broadcast into a room"
    ).unwrap();

    /// Total recipient deliveries filtered out by the permission model.
    pub static ref MESSAGES_FILTERED_TOTAL: IntCounter = IntCounter::new(
        "agentroom_messages_filtered_total",
        "Total recipient deliveries suppressed by canViewMessage"
    ).unwrap();

    /// Total direct messages delivered.
    pub static ref DM_DELIVERED_TOTAL: IntCounter = IntCounter::new(
        "agentroom_dm_delivered_total",
        "Total direct messages delivered"
    ).unwrap();

    /// Total reconnect-token takeovers performed.
    pub static ref RECONNECT_TAKEOVERS_TOTAL: IntCounter = IntCounter::new(
        "agentroom_reconnect_takeovers_total",
        "Total session takeovers via reconnect token"
    ).unwrap();

    /// Total sessions evicted by the periodic zombie sweep.
    pub static ref ZOMBIE_SWEEPS_TOTAL: IntCounter = IntCounter::new(
        "agentroom_zombie_sweeps_total",
        "Total stale sessions evicted by the zombie sweep"
    ).unwrap();

    // ------------------------------------------------------------------
    // Gauges (can increase/decrease)
    // ------------------------------------------------------------------

    /// Currently open connections.
    pub static ref CONNECTIONS_ACTIVE: IntGauge = IntGauge::new(
        "agentroom_connections_active",
        "Currently open connections"
    ).unwrap();

    /// Currently authenticated sessions.
    pub static ref SESSIONS_AUTHENTICATED: IntGauge = IntGauge::new(
        "agentroom_sessions_authenticated",
        "Currently authenticated sessions"
    ).unwrap();

    /// Currently active rooms.
    pub static ref ROOMS_ACTIVE: IntGauge = IntGauge::new(
        "agentroom_rooms_active",
        "Currently active rooms"
    ).unwrap();
}

/// Register every metric with the global registry. Call once at startup.
pub fn init() {
    REGISTRY.register(Box::new(CONNECTIONS_TOTAL.clone())).unwrap();
    REGISTRY.register(Box::new(MESSAGES_BROADCAST_TOTAL.clone())).unwrap();
    REGISTRY.register(Box::new(MESSAGES_FILTERED_TOTAL.clone())).unwrap();
    REGISTRY.register(Box::new(DM_DELIVERED_TOTAL.clone())).unwrap();
    REGISTRY.register(Box::new(RECONNECT_TAKEOVERS_TOTAL.clone())).unwrap();
    REGISTRY.register(Box::new(ZOMBIE_SWEEPS_TOTAL.clone())).unwrap();
    REGISTRY.register(Box::new(CONNECTIONS_ACTIVE.clone())).unwrap();
    REGISTRY.register(Box::new(SESSIONS_AUTHENTICATED.clone())).unwrap();
    REGISTRY.register(Box::new(ROOMS_ACTIVE.clone())).unwrap();
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}
