// Per-entry fantasy scoring.
//
// Pure and deterministic: the same stat line and rules always produce the
// same points and breakdown.

use serde::{Deserialize, Serialize};

use flashback_core::pool::{Matchup, PlayerWeekStats, StatLine, TeamWeekStats, WeeklyPoolEntry};
use flashback_core::position::Position;

use crate::round2;
use crate::rules::ScoringRules;

// ---------------------------------------------------------------------------
// Breakdown
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownLine {
    pub label: String,
    pub points: f64,
}

/// Labeled scoring terms in the order they were applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Breakdown {
    lines: Vec<BreakdownLine>,
}

impl Breakdown {
    pub fn lines(&self) -> &[BreakdownLine] {
        &self.lines
    }

    pub fn get(&self, label: &str) -> Option<f64> {
        self.lines.iter().find(|l| l.label == label).map(|l| l.points)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Accumulates unrounded terms; lines are rounded for display, the total is
/// rounded once from the raw sum.
#[derive(Default)]
struct Tally {
    raw: f64,
    breakdown: Breakdown,
}

impl Tally {
    fn add(&mut self, label: &str, points: f64) {
        self.raw += points;
        self.breakdown.lines.push(BreakdownLine {
            label: label.to_string(),
            points: round2(points),
        });
    }

    fn finish(self, points_allowed: Option<f64>) -> ScoreResult {
        ScoreResult {
            points: round2(self.raw),
            breakdown: self.breakdown,
            points_allowed,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub points: f64,
    pub breakdown: Breakdown,
    /// Points-allowed value used for a defense.
    pub points_allowed: Option<f64>,
}

/// A pool entry with its score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredEntry {
    pub entry: WeeklyPoolEntry,
    pub points: f64,
    pub breakdown: Breakdown,
    pub points_allowed: Option<f64>,
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

fn per(yards: f64, yards_per_point: f64) -> f64 {
    if yards_per_point > 0.0 {
        yards / yards_per_point
    } else {
        0.0
    }
}

fn add_rushing_receiving(t: &mut Tally, s: &PlayerWeekStats, rules: &ScoringRules, receptions: bool) {
    t.add("RUSH_YDS", per(s.rushing_yards, rules.rushing.yards_per_point));
    t.add("RUSH_TD", s.rushing_tds * rules.rushing.touchdown);
    if receptions {
        t.add("REC", s.receptions * rules.reception);
    }
    t.add("REC_YDS", per(s.receiving_yards, rules.receiving.yards_per_point));
    t.add("REC_TD", s.receiving_tds * rules.receiving.touchdown);
    t.add("FUM_L", s.fumbles_lost * rules.fumble_lost);
    t.add("TWO_PT", s.two_point_conversions() * rules.two_point);
}

/// Score an offensive player or kicker line.
pub fn score_player(position: Position, s: &PlayerWeekStats, rules: &ScoringRules) -> ScoreResult {
    let mut t = Tally::default();
    match position {
        Position::Qb => {
            t.add("PASS_YDS", per(s.passing_yards, rules.passing.yards_per_point));
            t.add("PASS_TD", s.passing_tds * rules.passing.touchdown);
            t.add("INT", s.interceptions * rules.passing.interception);
            add_rushing_receiving(&mut t, s, rules, false);
        }
        Position::Rb | Position::Wr | Position::Te => {
            add_rushing_receiving(&mut t, s, rules, true);
        }
        Position::K => {
            let k = &rules.kicker;
            if s.has_tiered_field_goals() {
                t.add("FG_0_39", s.fgm_0_39 * k.fg_0_39);
                t.add("FG_40_49", s.fgm_40_49 * k.fg_40_49);
                t.add("FG_50", s.fgm_50_plus * k.fg_50_plus);
            } else {
                t.add("FG", s.fgm * k.fg_any);
            }
            t.add("XP", s.xpm * k.xp_made);
            t.add("FG_MISS", (s.fga - s.fgm).max(0.0) * k.fg_miss);
            t.add("XP_MISS", (s.xpa - s.xpm).max(0.0) * k.xp_miss);
        }
        Position::Dst => {}
    }
    t.finish(None)
}

/// Matchup opponent score first, then the stored column.
pub fn resolve_points_allowed(stats: &TeamWeekStats, matchup: Option<&Matchup>) -> Option<f64> {
    matchup
        .and_then(|m| m.opp_score)
        .filter(|v| v.is_finite())
        .or_else(|| stats.points_allowed.filter(|v| v.is_finite()))
}

/// Score a team defense. With no points-allowed source the shutout tier
/// applies.
pub fn score_defense(stats: &TeamWeekStats, matchup: Option<&Matchup>, rules: &ScoringRules) -> ScoreResult {
    let d = &rules.dst;
    let points_allowed = resolve_points_allowed(stats, matchup);
    let tier = d.points_allowed_tier(points_allowed.unwrap_or(0.0));

    let mut t = Tally::default();
    t.add("BASE", d.base);
    t.add("PA_ADJ", tier - d.base);
    t.add("SACKS", stats.sacks * d.sack);
    t.add("INT", stats.interceptions * d.interception);
    t.add("FUM_REC", stats.fumbles_recovered * d.fumble_recovered);
    t.add("SAFETY", stats.safeties * d.safety);
    t.add("DEF_TD", stats.def_tds * d.defensive_td);
    t.add("RET_TD", stats.return_tds * d.return_td);
    t.add("BLOCKED_KICK", stats.blocked_kicks * d.blocked_kick);
    t.finish(points_allowed)
}

/// Score one pool entry. A stat line that does not fit the position scores 0.
pub fn score_entry(entry: &WeeklyPoolEntry, rules: &ScoringRules) -> ScoreResult {
    match (&entry.stats, entry.position) {
        (StatLine::Team(stats), Position::Dst) => score_defense(stats, entry.matchup.as_ref(), rules),
        (StatLine::Player(stats), pos) if pos != Position::Dst => score_player(pos, stats, rules),
        _ => ScoreResult::default(),
    }
}

/// Score every entry in the pool, preserving order.
pub fn score_pool(pool: &[WeeklyPoolEntry], rules: &ScoringRules) -> Vec<ScoredEntry> {
    pool.iter()
        .map(|entry| {
            let r = score_entry(entry, rules);
            ScoredEntry {
                entry: entry.clone(),
                points: r.points,
                breakdown: r.breakdown,
                points_allowed: r.points_allowed,
            }
        })
        .collect()
}
