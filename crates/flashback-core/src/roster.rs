// Picks and the rosters rebuilt from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::warn;

use crate::position::SlotLabel;
use crate::settings::RosterTemplate;
use crate::{EntryId, ParticipantId, SessionId};

/// A committed pick. Picks are append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pick {
    pub session_id: SessionId,
    /// 1-based commit order within the session.
    pub pick_number: u32,
    pub participant_id: ParticipantId,
    pub slot_index: usize,
    pub slot_label: SlotLabel,
    pub entry_id: EntryId,
    pub picked_at: DateTime<Utc>,
    /// Made by the deadline backstop or a self-autopick rather than by hand.
    #[serde(default)]
    pub auto: bool,
}

/// One participant's roster: an entry id per template slot, `None` if open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    slots: Vec<Option<EntryId>>,
}

impl Roster {
    pub fn empty(size: usize) -> Self {
        Self {
            slots: vec![None; size],
        }
    }

    pub fn slots(&self) -> &[Option<EntryId>] {
        &self.slots
    }

    pub fn get(&self, index: usize) -> Option<&EntryId> {
        self.slots.get(index).and_then(|s| s.as_ref())
    }

    /// In range and not yet filled.
    pub fn is_open(&self, index: usize) -> bool {
        matches!(self.slots.get(index), Some(None))
    }

    /// Indices of open slots in template order.
    pub fn open_slots(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_none())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn filled_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_full(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }
}

/// Every roster in a session plus the set of drafted entries.
#[derive(Debug, Clone, Default)]
pub struct DraftBoard {
    rosters: HashMap<ParticipantId, Roster>,
    drafted: HashSet<EntryId>,
    pick_count: usize,
}

impl DraftBoard {
    /// Rebuild from the full pick list. Picks outside the template are
    /// skipped; the first pick into a slot wins.
    pub fn rebuild(template: &RosterTemplate, picks: &[Pick]) -> Self {
        let mut board = Self::default();
        for pick in picks {
            let roster = board
                .rosters
                .entry(pick.participant_id)
                .or_insert_with(|| Roster::empty(template.len()));
            if !roster.is_open(pick.slot_index) {
                warn!(
                    "ignoring pick #{} for participant {}: slot {} is out of range or already filled",
                    pick.pick_number, pick.participant_id, pick.slot_index
                );
                continue;
            }
            roster.slots[pick.slot_index] = Some(pick.entry_id.clone());
            board.drafted.insert(pick.entry_id.clone());
            board.pick_count += 1;
        }
        board
    }

    /// The roster for `participant`, empty if they have not picked yet.
    pub fn roster_for(&self, participant: ParticipantId, template: &RosterTemplate) -> Roster {
        self.rosters
            .get(&participant)
            .cloned()
            .unwrap_or_else(|| Roster::empty(template.len()))
    }

    pub fn is_drafted(&self, entry_id: &str) -> bool {
        self.drafted.contains(entry_id)
    }

    pub fn drafted(&self) -> &HashSet<EntryId> {
        &self.drafted
    }

    pub fn pick_count(&self) -> usize {
        self.pick_count
    }

    pub fn rosters(&self) -> &HashMap<ParticipantId, Roster> {
        &self.rosters
    }
}
