// Weekly positional ranks over the whole pool.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use flashback_core::position::Position;
use flashback_core::EntryId;

use crate::engine::ScoredEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyRank {
    pub position: Position,
    /// 1-based.
    pub rank: usize,
    pub total_at_position: usize,
    /// Shares its point value with another entry at the position.
    pub tied: bool,
}

/// Rank every entry within its position by points, then name.
///
/// Equal points share the rank of the first entry with that value and the
/// next distinct value takes its own 1-based index (1, 1, 3).
pub fn weekly_ranks(pool: &[ScoredEntry]) -> HashMap<EntryId, WeeklyRank> {
    let mut by_position: HashMap<Position, Vec<&ScoredEntry>> = HashMap::new();
    for e in pool {
        by_position.entry(e.entry.position).or_default().push(e);
    }

    let mut ranks = HashMap::with_capacity(pool.len());
    for (position, mut group) in by_position {
        group.sort_by(|a, b| {
            b.points
                .total_cmp(&a.points)
                .then_with(|| a.entry.name.cmp(&b.entry.name))
        });
        let total = group.len();

        let mut rank = 0;
        for (i, e) in group.iter().enumerate() {
            let same_as_prev = i > 0 && group[i - 1].points == e.points;
            let same_as_next = group.get(i + 1).is_some_and(|n| n.points == e.points);
            if !same_as_prev {
                rank = i + 1;
            }
            ranks.insert(
                e.entry.id.clone(),
                WeeklyRank {
                    position,
                    rank,
                    total_at_position: total,
                    tied: same_as_prev || same_as_next,
                },
            );
        }
    }
    ranks
}
