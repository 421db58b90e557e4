// Turn order: who holds a given pick number.

use crate::ParticipantId;

/// How picks rotate through the draft order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOrder {
    /// Two participants: strictly alternate.
    Alternating,
    /// Reverse direction every round.
    Snake,
    /// Same ascending order every round.
    Cycle,
}

impl TurnOrder {
    pub fn for_participants(count: usize, snake_enabled: bool) -> Self {
        if count == 2 {
            TurnOrder::Alternating
        } else if count >= 3 && snake_enabled {
            TurnOrder::Snake
        } else {
            TurnOrder::Cycle
        }
    }

    /// Holder of 1-based `pick_number` given the draft order.
    pub fn holder(&self, draft_order: &[ParticipantId], pick_number: u32) -> Option<ParticipantId> {
        let n = draft_order.len();
        if n == 0 || pick_number == 0 {
            return None;
        }
        let index = (pick_number - 1) as usize;
        let round = index / n;
        let within = index % n;
        let seat = match self {
            TurnOrder::Snake if round % 2 == 1 => n - 1 - within,
            _ => within,
        };
        draft_order.get(seat).copied()
    }
}
