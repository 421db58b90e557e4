// Best-possible lineup for a week.
//
// Greedy per slot: exact-position slots claim entries first, then FLEX slots
// take from what is left. A FLEX-eligible player used by an RB/WR/TE slot is
// not available to FLEX.

use serde::{Deserialize, Serialize};

use flashback_core::position::{Position, SlotLabel};
use flashback_core::settings::RosterTemplate;
use flashback_core::EntryId;

use crate::engine::ScoredEntry;
use crate::round2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineupSlot {
    pub slot_index: usize,
    pub label: SlotLabel,
    pub entry_id: EntryId,
    pub name: String,
    /// `None` for an unfilled placeholder.
    pub position: Option<Position>,
    pub points: f64,
}

impl LineupSlot {
    fn placeholder(slot_index: usize, label: SlotLabel) -> Self {
        Self {
            slot_index,
            label,
            entry_id: format!("EMPTY_{}", label.as_str()),
            name: format!("No eligible {}", label.as_str()),
            position: None,
            points: 0.0,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.position.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Lineup {
    pub total: f64,
    /// In template order.
    pub slots: Vec<LineupSlot>,
}

/// Fill `template` from the whole scored pool.
pub fn optimal_lineup(pool: &[ScoredEntry], template: &RosterTemplate) -> Lineup {
    let mut ranked: Vec<&ScoredEntry> = pool.iter().collect();
    // sort_by is stable: equal scores keep pool order.
    ranked.sort_by(|a, b| b.points.total_cmp(&a.points));

    let mut used = vec![false; ranked.len()];
    let mut filled: Vec<Option<LineupSlot>> = vec![None; template.len()];

    let exact_first = template
        .labels()
        .iter()
        .enumerate()
        .filter(|(_, l)| !l.is_flex())
        .chain(template.labels().iter().enumerate().filter(|(_, l)| l.is_flex()));

    for (slot_index, &label) in exact_first {
        let choice = ranked
            .iter()
            .enumerate()
            .find(|(i, e)| !used[*i] && label.accepts(e.entry.position));
        filled[slot_index] = Some(match choice {
            Some((i, e)) => {
                used[i] = true;
                LineupSlot {
                    slot_index,
                    label,
                    entry_id: e.entry.id.clone(),
                    name: e.entry.name.clone(),
                    position: Some(e.entry.position),
                    points: e.points,
                }
            }
            None => LineupSlot::placeholder(slot_index, label),
        });
    }

    let slots: Vec<LineupSlot> = filled.into_iter().flatten().collect();
    let total = round2(slots.iter().map(|s| s.points).sum());
    Lineup { total, slots }
}
