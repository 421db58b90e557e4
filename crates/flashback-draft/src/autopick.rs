// Pins and the self-autopick heuristic.

use rand::seq::IndexedRandom;
use rand::Rng;
use std::collections::HashMap;

use flashback_core::pool::WeeklyPoolEntry;
use flashback_core::position::{Position, SlotLabel};
use flashback_core::roster::{DraftBoard, Roster};
use flashback_core::settings::RosterTemplate;
use flashback_core::EntryId;

// ---------------------------------------------------------------------------
// Pin board
// ---------------------------------------------------------------------------

/// Per-position favorites, most recently pinned first.
#[derive(Debug, Clone, Default)]
pub struct PinBoard {
    pins: HashMap<Position, Vec<EntryId>>,
}

impl PinBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin or unpin `entry_id`. Returns whether it is pinned afterwards.
    pub fn toggle(&mut self, entry_id: &str, position: Position) -> bool {
        let list = self.pins.entry(position).or_default();
        if let Some(i) = list.iter().position(|id| id == entry_id) {
            list.remove(i);
            false
        } else {
            list.insert(0, entry_id.to_string());
            true
        }
    }

    pub fn is_pinned(&self, entry_id: &str) -> bool {
        self.pins.values().any(|list| list.iter().any(|id| id == entry_id))
    }

    /// Pins at `position` that are still undrafted, in pin order.
    pub fn pins_for<'a>(&'a self, position: Position, board: &'a DraftBoard) -> impl Iterator<Item = &'a EntryId> + 'a {
        self.pins
            .get(&position)
            .into_iter()
            .flatten()
            .filter(move |id| !board.is_drafted(id))
    }

    pub fn len(&self) -> usize {
        self.pins.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Heuristic
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct AutopickChoice {
    pub entry_id: EntryId,
    pub slot_index: usize,
    pub slot_label: SlotLabel,
    /// Came from the pin board rather than the random fallback.
    pub pinned: bool,
}

/// Choose a pick for `roster`.
///
/// Open slots are scanned in template order and each slot's eligible
/// positions are checked against the pin board. Without a usable pin, a
/// random undrafted entry is taken for the first open slot that has any.
pub fn choose_autopick<R: Rng + ?Sized>(
    roster: &Roster,
    template: &RosterTemplate,
    pool: &[WeeklyPoolEntry],
    board: &DraftBoard,
    pins: &PinBoard,
    rng: &mut R,
) -> Option<AutopickChoice> {
    let open: Vec<(usize, SlotLabel)> = roster
        .open_slots()
        .into_iter()
        .filter_map(|i| template.label(i).map(|label| (i, label)))
        .collect();

    for &(slot_index, slot_label) in &open {
        for &position in slot_label.eligible_positions() {
            let pinned = pins.pins_for(position, board).find(|id| {
                pool.iter()
                    .any(|e| &e.id == *id && e.position == position)
            });
            if let Some(entry_id) = pinned {
                return Some(AutopickChoice {
                    entry_id: entry_id.clone(),
                    slot_index,
                    slot_label,
                    pinned: true,
                });
            }
        }
    }

    for &(slot_index, slot_label) in &open {
        let candidates: Vec<&WeeklyPoolEntry> = pool
            .iter()
            .filter(|e| slot_label.accepts(e.position) && !board.is_drafted(&e.id))
            .collect();
        if let Some(entry) = candidates.choose(&mut *rng) {
            return Some(AutopickChoice {
                entry_id: entry.id.clone(),
                slot_index,
                slot_label,
                pinned: false,
            });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use flashback_core::pool::{PlayerWeekStats, StatLine};
    use flashback_core::roster::Pick;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn entry(id: &str, position: Position) -> WeeklyPoolEntry {
        WeeklyPoolEntry {
            id: id.into(),
            name: id.into(),
            position,
            team: "MIA".into(),
            stats: StatLine::Player(PlayerWeekStats::default()),
            matchup: None,
        }
    }

    fn drafted(template: &RosterTemplate, entries: &[&str]) -> DraftBoard {
        let picks: Vec<Pick> = entries
            .iter()
            .enumerate()
            .map(|(i, id)| Pick {
                session_id: 1,
                pick_number: i as u32 + 1,
                participant_id: 99,
                slot_index: i,
                slot_label: template.label(i).unwrap_or(SlotLabel::Flex),
                entry_id: id.to_string(),
                picked_at: Utc::now(),
                auto: false,
            })
            .collect();
        DraftBoard::rebuild(template, &picks)
    }

    #[test]
    fn toggle_prepends_and_removes() {
        let mut pins = PinBoard::new();
        assert!(pins.toggle("a", Position::Wr));
        assert!(pins.toggle("b", Position::Wr));
        let board = DraftBoard::default();
        let order: Vec<&EntryId> = pins.pins_for(Position::Wr, &board).collect();
        assert_eq!(order, vec!["b", "a"]);

        assert!(!pins.toggle("b", Position::Wr));
        assert!(!pins.is_pinned("b"));
        assert!(pins.is_pinned("a"));
        assert_eq!(pins.len(), 1);
    }

    #[test]
    fn pins_for_hides_drafted_entries() {
        let template = RosterTemplate::from_labels(vec![SlotLabel::Wr, SlotLabel::Wr]);
        let mut pins = PinBoard::new();
        pins.toggle("a", Position::Wr);
        pins.toggle("b", Position::Wr);
        let board = drafted(&template, &["b"]);
        let order: Vec<&EntryId> = pins.pins_for(Position::Wr, &board).collect();
        assert_eq!(order, vec!["a"]);
    }

    #[test]
    fn pinned_entry_wins_for_first_open_slot() {
        let template = RosterTemplate::from_labels(vec![SlotLabel::Qb, SlotLabel::Flex]);
        let pool = vec![entry("qb", Position::Qb), entry("te", Position::Te), entry("rb", Position::Rb)];
        let mut roster_board = drafted(&template, &[]);
        let mut pins = PinBoard::new();
        pins.toggle("te", Position::Te);
        let roster = roster_board.roster_for(1, &template);
        let mut rng = StdRng::seed_from_u64(5);

        // No QB pin: the TE pin fills FLEX.
        let choice = choose_autopick(&roster, &template, &pool, &roster_board, &pins, &mut rng).unwrap();
        assert_eq!(choice.entry_id, "te");
        assert_eq!(choice.slot_index, 1);
        assert!(choice.pinned);

        // A QB pin comes first because QB is earlier in the template.
        pins.toggle("qb", Position::Qb);
        let choice = choose_autopick(&roster, &template, &pool, &roster_board, &pins, &mut rng).unwrap();
        assert_eq!(choice.entry_id, "qb");
        assert_eq!(choice.slot_label, SlotLabel::Qb);

        // Drafted pins are skipped.
        roster_board = drafted(&template, &["qb", "te"]);
        let roster = roster_board.roster_for(1, &template);
        let choice = choose_autopick(&roster, &template, &pool, &roster_board, &pins, &mut rng).unwrap();
        assert_eq!(choice.entry_id, "rb");
        assert!(!choice.pinned);
    }

    #[test]
    fn pins_outside_the_pool_are_ignored() {
        let template = RosterTemplate::from_labels(vec![SlotLabel::Rb]);
        let pool = vec![entry("rb", Position::Rb)];
        let board = DraftBoard::default();
        let mut pins = PinBoard::new();
        pins.toggle("ghost", Position::Rb);
        let roster = board.roster_for(1, &template);
        let choice = choose_autopick(&roster, &template, &pool, &board, &pins, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(choice.entry_id, "rb");
        assert!(!choice.pinned);
    }

    #[test]
    fn fallback_skips_slots_without_candidates() {
        let template = RosterTemplate::from_labels(vec![SlotLabel::K, SlotLabel::Wr]);
        let pool = vec![entry("wr1", Position::Wr), entry("wr2", Position::Wr)];
        let board = DraftBoard::default();
        let roster = board.roster_for(1, &template);
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..10 {
            let choice = choose_autopick(&roster, &template, &pool, &board, &PinBoard::new(), &mut rng).unwrap();
            assert_eq!(choice.slot_index, 1);
            assert!(choice.entry_id.starts_with("wr"));
        }
    }

    #[test]
    fn nothing_to_pick_when_pool_exhausted() {
        let template = RosterTemplate::from_labels(vec![SlotLabel::Dst]);
        let pool = vec![entry("rb", Position::Rb)];
        let board = DraftBoard::default();
        let roster = board.roster_for(1, &template);
        assert_eq!(
            choose_autopick(&roster, &template, &pool, &board, &PinBoard::new(), &mut StdRng::seed_from_u64(0)),
            None
        );
    }
}
