//! Session attribution — links browsing events to transactions through the
//! ephemeral session identifier.

pub mod joiner;

pub use joiner::{attribute_sessions, SessionAttribution};
