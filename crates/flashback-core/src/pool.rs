// Weekly draft pool: per-player and per-defense stat lines for one week.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::position::{normalize_team, Position, SlotLabel};
use crate::EntryId;

// ---------------------------------------------------------------------------
// Raw stat lines
// ---------------------------------------------------------------------------

/// One player's box-score line for a week. Missing columns read as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerWeekStats {
    pub passing_yards: f64,
    pub passing_tds: f64,
    pub interceptions: f64,
    pub rushing_yards: f64,
    pub rushing_tds: f64,
    pub receptions: f64,
    pub receiving_yards: f64,
    pub receiving_tds: f64,
    pub fumbles_lost: f64,
    pub passing_2pt_conversions: f64,
    pub rushing_2pt_conversions: f64,
    pub receiving_2pt_conversions: f64,
    pub fgm: f64,
    pub fga: f64,
    pub fgm_0_39: f64,
    pub fgm_40_49: f64,
    pub fgm_50_plus: f64,
    pub xpm: f64,
    pub xpa: f64,
}

impl PlayerWeekStats {
    pub fn two_point_conversions(&self) -> f64 {
        self.passing_2pt_conversions + self.rushing_2pt_conversions + self.receiving_2pt_conversions
    }

    /// Whether distance-tiered field goal makes were recorded.
    pub fn has_tiered_field_goals(&self) -> bool {
        self.fgm_0_39 != 0.0 || self.fgm_40_49 != 0.0 || self.fgm_50_plus != 0.0
    }
}

/// A team defense / special teams line for a week.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamWeekStats {
    /// Stored points-allowed column. Unreliable in some sources; the matchup
    /// opponent score takes precedence when present.
    pub points_allowed: Option<f64>,
    pub sacks: f64,
    pub interceptions: f64,
    pub fumbles_recovered: f64,
    pub safeties: f64,
    pub def_tds: f64,
    pub return_tds: f64,
    pub blocked_kicks: f64,
}

/// One side of a scheduled game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matchup {
    pub team: String,
    pub opponent: String,
    pub is_home: bool,
    pub team_score: Option<f64>,
    pub opp_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StatLine {
    Player(PlayerWeekStats),
    Team(TeamWeekStats),
}

/// A draftable unit for the session's week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyPoolEntry {
    pub id: EntryId,
    pub name: String,
    pub position: Position,
    pub team: String,
    pub stats: StatLine,
    #[serde(default)]
    pub matchup: Option<Matchup>,
}

// ---------------------------------------------------------------------------
// Imported records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStatRecord {
    pub season: u16,
    pub week: u8,
    pub player_id: String,
    pub player_name: String,
    pub position: Position,
    pub team: String,
    pub stats: PlayerWeekStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamStatRecord {
    pub season: u16,
    pub week: u8,
    pub team: String,
    pub stats: TeamWeekStats,
}

/// A final score from the schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledGame {
    pub season: u16,
    pub week: u8,
    pub home_team: String,
    pub away_team: String,
    pub home_score: f64,
    pub away_score: f64,
}

impl ScheduledGame {
    /// Split into the home and away perspectives.
    pub fn matchups(&self) -> [Matchup; 2] {
        let home = normalize_team(&self.home_team);
        let away = normalize_team(&self.away_team);
        [
            Matchup {
                team: home.clone(),
                opponent: away.clone(),
                is_home: true,
                team_score: Some(self.home_score),
                opp_score: Some(self.away_score),
            },
            Matchup {
                team: away,
                opponent: home,
                is_home: false,
                team_score: Some(self.away_score),
                opp_score: Some(self.home_score),
            },
        ]
    }
}

// ---------------------------------------------------------------------------
// Pool assembly
// ---------------------------------------------------------------------------

pub fn dst_entry_id(team: &str) -> EntryId {
    format!("DST_{team}")
}

pub fn dst_display_name(team: &str) -> String {
    format!("{team} Defense")
}

/// Join one week's player lines, defense lines, and matchups into the pool.
/// Players come first in input order, then defenses.
pub fn assemble_pool(
    players: Vec<PlayerStatRecord>,
    teams: Vec<TeamStatRecord>,
    matchups: Vec<Matchup>,
) -> Vec<WeeklyPoolEntry> {
    let by_team: HashMap<String, Matchup> = matchups
        .into_iter()
        .map(|m| (m.team.clone(), m))
        .collect();

    let mut pool = Vec::with_capacity(players.len() + teams.len());
    for p in players {
        let team = normalize_team(&p.team);
        pool.push(WeeklyPoolEntry {
            matchup: by_team.get(&team).cloned(),
            id: p.player_id,
            name: p.player_name,
            position: p.position,
            team,
            stats: StatLine::Player(p.stats),
        });
    }
    for t in teams {
        let team = normalize_team(&t.team);
        pool.push(WeeklyPoolEntry {
            id: dst_entry_id(&team),
            name: dst_display_name(&team),
            position: Position::Dst,
            matchup: by_team.get(&team).cloned(),
            team,
            stats: StatLine::Team(t.stats),
        });
    }
    pool
}

/// Stand-in for a drafted id that is missing from the pool.
///
/// `DST_<TEAM>` ids render as that team's defense; anything else shows the
/// raw id at the slot's position.
pub fn placeholder_entry(id: &str, slot: SlotLabel) -> WeeklyPoolEntry {
    if let Some(team) = id.strip_prefix("DST_") {
        return WeeklyPoolEntry {
            id: id.to_string(),
            name: dst_display_name(team),
            position: Position::Dst,
            team: team.to_string(),
            stats: StatLine::Team(TeamWeekStats::default()),
            matchup: None,
        };
    }
    let position = slot
        .eligible_positions()
        .first()
        .copied()
        .unwrap_or(Position::Rb);
    WeeklyPoolEntry {
        id: id.to_string(),
        name: id.to_string(),
        position,
        team: String::new(),
        stats: StatLine::Player(PlayerWeekStats::default()),
        matchup: None,
    }
}
