// Authoritative session snapshot and turn/deadline arithmetic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::settings::GameSettings;
use crate::{ParticipantId, SessionId};

/// Phase of a session as recorded by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Lobby,
    Draft,
    Scoring,
    Done,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Lobby => "lobby",
            SessionPhase::Draft => "draft",
            SessionPhase::Scoring => "scoring",
            SessionPhase::Done => "done",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "lobby" => Some(SessionPhase::Lobby),
            "draft" => Some(SessionPhase::Draft),
            "scoring" => Some(SessionPhase::Scoring),
            "done" => Some(SessionPhase::Done),
            _ => None,
        }
    }

    /// Position in the lifecycle; phases only move forward.
    pub fn ordinal(&self) -> u8 {
        match self {
            SessionPhase::Lobby => 0,
            SessionPhase::Draft => 1,
            SessionPhase::Scoring => 2,
            SessionPhase::Done => 3,
        }
    }

    /// The draft is over and picks are final.
    pub fn is_draft_complete(&self) -> bool {
        matches!(self, SessionPhase::Scoring | SessionPhase::Done)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The turn portion of a session: who is on the clock and until when.
///
/// Returned by every accepted pick and every autopick so clients can adopt
/// the next state without another read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnState {
    pub phase: SessionPhase,
    pub turn_holder: Option<ParticipantId>,
    /// 1-based number of the pick currently on the clock.
    pub pick_number: u32,
    pub turn_deadline: Option<DateTime<Utc>>,
}

impl TurnState {
    pub fn is_turn_of(&self, participant: ParticipantId) -> bool {
        self.phase == SessionPhase::Draft && self.turn_holder == Some(participant)
    }

    /// The deadline has strictly passed.
    pub fn deadline_elapsed(&self, now: DateTime<Utc>) -> bool {
        self.turn_deadline.is_some_and(|d| now > d)
    }

    /// Whole seconds left on the clock, rounded up. Zero without a deadline.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        self.turn_deadline
            .map(|d| remaining_secs(d, now))
            .unwrap_or(0)
    }
}

/// Full authoritative snapshot of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: SessionId,
    pub room_code: String,
    pub host_id: ParticipantId,
    pub settings: GameSettings,
    pub season: Option<u16>,
    pub week: Option<u8>,
    pub turn: TurnState,
}

impl SessionState {
    pub fn phase(&self) -> SessionPhase {
        self.turn.phase
    }
}

/// `max(0, ceil((deadline - now) / 1s))`.
pub fn remaining_secs(deadline: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let ms = (deadline - now).num_milliseconds();
    if ms <= 0 {
        0
    } else {
        ((ms + 999) / 1000) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn remaining_rounds_up_and_clamps() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(remaining_secs(now + Duration::milliseconds(29_001), now), 30);
        assert_eq!(remaining_secs(now + Duration::milliseconds(1), now), 1);
        assert_eq!(remaining_secs(now + Duration::seconds(5), now), 5);
        assert_eq!(remaining_secs(now, now), 0);
        assert_eq!(remaining_secs(now - Duration::seconds(3), now), 0);
    }

    #[test]
    fn deadline_elapsed_is_strict() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let turn = TurnState {
            phase: SessionPhase::Draft,
            turn_holder: Some(1),
            pick_number: 1,
            turn_deadline: Some(now),
        };
        assert!(!turn.deadline_elapsed(now));
        assert!(turn.deadline_elapsed(now + Duration::milliseconds(1)));
    }

    #[test]
    fn turn_only_counts_during_draft() {
        let turn = TurnState {
            phase: SessionPhase::Scoring,
            turn_holder: Some(7),
            pick_number: 19,
            turn_deadline: None,
        };
        assert!(!turn.is_turn_of(7));
    }

    #[test]
    fn phase_parse_matches_as_str() {
        for phase in [
            SessionPhase::Lobby,
            SessionPhase::Draft,
            SessionPhase::Scoring,
            SessionPhase::Done,
        ] {
            assert_eq!(SessionPhase::parse(phase.as_str()), Some(phase));
        }
        assert_eq!(SessionPhase::parse("results"), None);
    }
}
