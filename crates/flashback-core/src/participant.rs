// Session participants and presence tracking.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::ParticipantId;

/// Default window after which a silent participant is considered stale.
pub const DEFAULT_STALE_AFTER_SECS: i64 = 90;

/// A participant seated in a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    /// 1-based seat. Seat 1 is the host.
    pub seat: u32,
    pub display_name: String,
    /// 0-based position in the draft order, assigned when the draft starts.
    #[serde(default)]
    pub draft_position: Option<u32>,
    /// Cleared when the participant explicitly leaves.
    pub is_active: bool,
    #[serde(default)]
    pub last_seen_at: Option<DateTime<Utc>>,
}

impl Participant {
    pub fn is_host(&self) -> bool {
        self.seat == 1
    }

    /// No heartbeat within `window`, or never seen at all.
    pub fn is_stale(&self, now: DateTime<Utc>, window: Duration) -> bool {
        match self.last_seen_at {
            Some(seen) => now - seen > window,
            None => true,
        }
    }

    /// Present in the room: not stale and has not left.
    pub fn is_effectively_active(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.is_active && !self.is_stale(now, window)
    }
}

/// Participants that are effectively active, in seat order.
pub fn active_participants(
    participants: &[Participant],
    now: DateTime<Utc>,
    window: Duration,
) -> Vec<&Participant> {
    let mut active: Vec<&Participant> = participants
        .iter()
        .filter(|p| p.is_effectively_active(now, window))
        .collect();
    active.sort_by_key(|p| p.seat);
    active
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn participant(seat: u32, seen: Option<DateTime<Utc>>, active: bool) -> Participant {
        Participant {
            id: seat as i64 * 10,
            seat,
            display_name: format!("P{seat}"),
            draft_position: None,
            is_active: active,
            last_seen_at: seen,
        }
    }

    #[test]
    fn staleness_uses_window() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let window = Duration::seconds(DEFAULT_STALE_AFTER_SECS);
        let fresh = participant(1, Some(now - Duration::seconds(30)), true);
        let old = participant(2, Some(now - Duration::seconds(91)), true);
        let never = participant(3, None, true);
        assert!(!fresh.is_stale(now, window));
        assert!(old.is_stale(now, window));
        assert!(never.is_stale(now, window));
    }

    #[test]
    fn left_participant_is_not_active_even_if_fresh() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let left = participant(2, Some(now), false);
        assert!(!left.is_effectively_active(now, Duration::seconds(90)));
    }

    #[test]
    fn active_participants_sorted_by_seat() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let list = vec![
            participant(3, Some(now), true),
            participant(1, Some(now), true),
            participant(2, None, true),
        ];
        let active = active_participants(&list, now, Duration::seconds(90));
        let seats: Vec<u32> = active.iter().map(|p| p.seat).collect();
        assert_eq!(seats, vec![1, 3]);
    }
}
