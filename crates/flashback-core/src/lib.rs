// Shared data model, configuration, and the authoritative draft store.

pub mod clock;
pub mod config;
pub mod data;
pub mod db;
pub mod order;
pub mod participant;
pub mod pool;
pub mod position;
pub mod roster;
pub mod session;
pub mod settings;
pub mod store;

/// Identifier of a draft session (a "room").
pub type SessionId = i64;

/// Identifier of a participant seated in a session.
pub type ParticipantId = i64;

/// Identifier of a weekly pool entry (player id or `DST_<TEAM>`).
pub type EntryId = String;
