// The authoritative draft store contract.
//
// Everything that must be linearizable across clients (pick acceptance, turn
// advancement, deadline autopicks) happens behind this trait. Clients only
// read snapshots and request mutations.

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

use crate::participant::Participant;
use crate::pool::WeeklyPoolEntry;
use crate::position::SlotLabel;
use crate::roster::Pick;
use crate::session::{SessionPhase, SessionState, TurnState};
use crate::settings::GameSettings;
use crate::{ParticipantId, SessionId};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Why the store refused a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    NotYourTurn,
    NotDrafting,
    AlreadyDrafted,
    SlotFilled,
    SlotOutOfRange,
    SlotMismatch,
    IneligiblePosition,
    UnknownEntry,
    NotHost,
    NotInLobby,
    RoomFull,
    NoParticipants,
    InvalidPhaseTransition,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            RejectReason::NotYourTurn => "it is not your turn",
            RejectReason::NotDrafting => "the session is not drafting",
            RejectReason::AlreadyDrafted => "that player has already been drafted",
            RejectReason::SlotFilled => "that roster slot is already filled",
            RejectReason::SlotOutOfRange => "that roster slot does not exist",
            RejectReason::SlotMismatch => "slot label does not match the roster template",
            RejectReason::IneligiblePosition => "that position cannot fill this slot",
            RejectReason::UnknownEntry => "that player is not in this week's pool",
            RejectReason::NotHost => "only the host can do that",
            RejectReason::NotInLobby => "the session is no longer in the lobby",
            RejectReason::RoomFull => "the room is full",
            RejectReason::NoParticipants => "no participants to draft",
            RejectReason::InvalidPhaseTransition => "phases only move forward",
        };
        f.write_str(msg)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// Transient failure: network, lock, or backend. Retry on the next tick.
    #[error("store unavailable: {0:#}")]
    Unavailable(#[from] anyhow::Error),

    /// The store refused the mutation. Do not retry blindly.
    #[error("rejected: {0}")]
    Rejected(RejectReason),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid settings: {0}")]
    InvalidSettings(#[from] crate::config::ConfigError),
}

impl StoreError {
    pub fn is_rejection(&self) -> bool {
        matches!(self, StoreError::Rejected(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A pick request as submitted to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct PickRequest {
    pub participant_id: ParticipantId,
    pub entry_id: String,
    pub slot_index: usize,
    pub slot_label: SlotLabel,
}

#[async_trait]
pub trait DraftStore: Send + Sync {
    // --- draft reads ---

    async fn get_session_state(&self, session_id: SessionId) -> StoreResult<SessionState>;

    async fn list_participants(&self, session_id: SessionId) -> StoreResult<Vec<Participant>>;

    /// All picks in commit order.
    async fn list_picks(&self, session_id: SessionId) -> StoreResult<Vec<Pick>>;

    async fn get_weekly_pool(&self, season: u16, week: u8) -> StoreResult<Vec<WeeklyPoolEntry>>;

    // --- draft mutations ---

    /// Atomically validate and commit a pick, advancing the turn.
    async fn submit_pick(&self, session_id: SessionId, pick: PickRequest) -> StoreResult<TurnState>;

    /// Make the turn holder's pick if the deadline has strictly elapsed.
    /// Returns `None` when nothing was due. Idempotent per pick number.
    async fn autopick_if_due(&self, session_id: SessionId) -> StoreResult<Option<TurnState>>;

    async fn heartbeat(&self, session_id: SessionId, participant_id: ParticipantId) -> StoreResult<()>;

    async fn mark_left(&self, session_id: SessionId, participant_id: ParticipantId) -> StoreResult<()>;

    // --- lobby procedures ---

    /// Open a room with the caller seated as host.
    async fn create_session(
        &self,
        settings: GameSettings,
        host_name: &str,
    ) -> StoreResult<(SessionState, Participant)>;

    async fn join_session(
        &self,
        room_code: &str,
        display_name: &str,
    ) -> StoreResult<(SessionState, Participant)>;

    /// A random season/week with stat data inside the range, if any.
    async fn pick_random_week(&self, year_start: u16, year_end: u16) -> StoreResult<Option<(u16, u8)>>;

    /// Fix the draft order and put the first pick on the clock.
    async fn start_draft(
        &self,
        session_id: SessionId,
        host_id: ParticipantId,
        season: u16,
        week: u8,
    ) -> StoreResult<TurnState>;

    /// Move the session forward to `phase`.
    async fn set_phase(
        &self,
        session_id: SessionId,
        host_id: ParticipantId,
        phase: SessionPhase,
    ) -> StoreResult<()>;
}
