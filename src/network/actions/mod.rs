//! One module per action family in the §4.5 action table.

pub mod auth;
pub mod dm;
pub mod misc;
pub mod permission;
pub mod room;
