// Per-participant roster results and the final standings.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use flashback_core::participant::Participant;
use flashback_core::pool::placeholder_entry;
use flashback_core::position::{Position, SlotLabel};
use flashback_core::roster::DraftBoard;
use flashback_core::settings::RosterTemplate;
use flashback_core::{EntryId, ParticipantId};

use crate::engine::{Breakdown, ScoredEntry};
use crate::ranks::WeeklyRank;
use crate::round2;

// ---------------------------------------------------------------------------
// Roster results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub slot_index: usize,
    pub label: SlotLabel,
    pub entry_id: EntryId,
    pub name: String,
    pub position: Position,
    pub team: String,
    pub points: f64,
    pub breakdown: Breakdown,
    pub rank: Option<WeeklyRank>,
    /// The drafted id was not in the week's pool; scored as 0.
    pub missing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterResult {
    pub participant_id: ParticipantId,
    pub display_name: String,
    pub total: f64,
    /// Filled slots in template order.
    pub rows: Vec<ResultRow>,
}

/// Participants in draft order; seat order for anyone never seated.
fn draft_ordered(participants: &[Participant]) -> Vec<&Participant> {
    let mut ordered: Vec<&Participant> = participants.iter().collect();
    ordered.sort_by_key(|p| (p.draft_position.unwrap_or(u32::MAX), p.seat));
    ordered
}

/// Score every participant's drafted roster.
///
/// Participants who were never seated and never picked are left out.
pub fn roster_results(
    participants: &[Participant],
    board: &DraftBoard,
    template: &RosterTemplate,
    scored: &[ScoredEntry],
    ranks: &HashMap<EntryId, WeeklyRank>,
) -> Vec<RosterResult> {
    let by_id: HashMap<&str, &ScoredEntry> = scored.iter().map(|e| (e.entry.id.as_str(), e)).collect();

    let mut results = Vec::new();
    for p in draft_ordered(participants) {
        if p.draft_position.is_none() && !board.rosters().contains_key(&p.id) {
            continue;
        }
        let roster = board.roster_for(p.id, template);
        let mut rows = Vec::new();
        for (slot_index, entry_id) in roster.slots().iter().enumerate() {
            let Some(entry_id) = entry_id else { continue };
            let Some(label) = template.label(slot_index) else { continue };
            let row = match by_id.get(entry_id.as_str()) {
                Some(e) => ResultRow {
                    slot_index,
                    label,
                    entry_id: entry_id.clone(),
                    name: e.entry.name.clone(),
                    position: e.entry.position,
                    team: e.entry.team.clone(),
                    points: e.points,
                    breakdown: e.breakdown.clone(),
                    rank: ranks.get(entry_id).copied(),
                    missing: false,
                },
                None => {
                    warn!(
                        "drafted entry {} for participant {} is missing from the pool; scoring 0",
                        entry_id, p.id
                    );
                    let stand_in = placeholder_entry(entry_id, label);
                    ResultRow {
                        slot_index,
                        label,
                        entry_id: entry_id.clone(),
                        name: stand_in.name,
                        position: stand_in.position,
                        team: stand_in.team,
                        points: 0.0,
                        breakdown: Breakdown::default(),
                        rank: None,
                        missing: true,
                    }
                }
            };
            rows.push(row);
        }
        let total = round2(rows.iter().map(|r| r.points).sum());
        results.push(RosterResult {
            participant_id: p.id,
            display_name: p.display_name.clone(),
            total,
            rows,
        });
    }
    results
}

// ---------------------------------------------------------------------------
// Standings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standing {
    pub rank: usize,
    pub participant_id: ParticipantId,
    pub display_name: String,
    pub total: f64,
    pub behind_leader: f64,
    /// Share of the optimal lineup total, in percent.
    pub pct_of_optimal: f64,
}

/// Order results by total, highest first. Equal totals share a rank.
pub fn standings(results: &[RosterResult], optimal_total: f64) -> Vec<Standing> {
    let mut ordered: Vec<&RosterResult> = results.iter().collect();
    ordered.sort_by(|a, b| b.total.total_cmp(&a.total));

    let leader = ordered.first().map(|r| r.total).unwrap_or(0.0);
    let mut out: Vec<Standing> = Vec::with_capacity(ordered.len());
    for (i, r) in ordered.iter().enumerate() {
        let rank = match out.last() {
            Some(prev) if prev.total == r.total => prev.rank,
            _ => i + 1,
        };
        let pct_of_optimal = if optimal_total > 0.0 {
            round2(r.total / optimal_total * 100.0)
        } else {
            0.0
        };
        out.push(Standing {
            rank,
            participant_id: r.participant_id,
            display_name: r.display_name.clone(),
            total: r.total,
            behind_leader: round2(leader - r.total),
            pct_of_optimal,
        });
    }
    out
}
