//! Connection handling: the per-connection dispatcher and the axum gateway
//! that terminates WebSocket upgrades and the HTTP side-channel.

pub mod actions;
pub mod dispatcher;
pub mod gateway;

pub use gateway::build_router;
