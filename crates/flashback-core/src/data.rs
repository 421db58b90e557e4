// Weekly stat import from CSV (player lines, defense lines, final scores).
//
// Column names follow the nflverse weekly exports; common alternate spellings
// are accepted via serde aliases. Empty or non-numeric stat cells read as 0.

use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

use crate::config::DataPaths;
use crate::pool::{PlayerStatRecord, PlayerWeekStats, ScheduledGame, TeamStatRecord, TeamWeekStats};
use crate::position::{normalize_team, Position};

/// Weeks eligible for a random draft week.
pub const REGULAR_SEASON_WEEKS: u8 = 17;

/// Everything read from the three stat sources.
#[derive(Debug, Clone, Default)]
pub struct WeeklyStats {
    pub players: Vec<PlayerStatRecord>,
    pub teams: Vec<TeamStatRecord>,
    pub games: Vec<ScheduledGame>,
}

#[derive(Debug, thiserror::Error)]
pub enum StatImportError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("validation error: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Raw CSV rows (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawPlayerRow {
    #[serde(alias = "year")]
    season: u16,
    week: u8,
    #[serde(alias = "gsis_id", alias = "player_gsis_id")]
    player_id: String,
    #[serde(alias = "name", alias = "player_display_name")]
    player_name: String,
    #[serde(alias = "pos")]
    position: String,
    #[serde(default, alias = "recent_team", alias = "posteam")]
    team: String,
    #[serde(default, alias = "pass_yards", deserialize_with = "csv::invalid_option")]
    passing_yards: Option<f64>,
    #[serde(default, alias = "pass_tds", deserialize_with = "csv::invalid_option")]
    passing_tds: Option<f64>,
    #[serde(default, alias = "pass_int", deserialize_with = "csv::invalid_option")]
    interceptions: Option<f64>,
    #[serde(default, alias = "rush_yards", deserialize_with = "csv::invalid_option")]
    rushing_yards: Option<f64>,
    #[serde(default, alias = "rush_tds", deserialize_with = "csv::invalid_option")]
    rushing_tds: Option<f64>,
    #[serde(default, alias = "rec", deserialize_with = "csv::invalid_option")]
    receptions: Option<f64>,
    #[serde(default, alias = "rec_yards", deserialize_with = "csv::invalid_option")]
    receiving_yards: Option<f64>,
    #[serde(default, alias = "rec_tds", deserialize_with = "csv::invalid_option")]
    receiving_tds: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    fumbles_lost: Option<f64>,
    #[serde(
        default,
        alias = "passing_two_point_conversions",
        deserialize_with = "csv::invalid_option"
    )]
    passing_2pt_conversions: Option<f64>,
    #[serde(
        default,
        alias = "rushing_two_point_conversions",
        deserialize_with = "csv::invalid_option"
    )]
    rushing_2pt_conversions: Option<f64>,
    #[serde(
        default,
        alias = "receiving_two_point_conversions",
        deserialize_with = "csv::invalid_option"
    )]
    receiving_2pt_conversions: Option<f64>,
    #[serde(default, alias = "fg_made", alias = "field_goals_made", deserialize_with = "csv::invalid_option")]
    fgm: Option<f64>,
    #[serde(default, alias = "fg_att", alias = "field_goals_attempted", deserialize_with = "csv::invalid_option")]
    fga: Option<f64>,
    #[serde(default, alias = "fg_made_0_39", deserialize_with = "csv::invalid_option")]
    fgm_0_39: Option<f64>,
    #[serde(default, alias = "fg_made_40_49", deserialize_with = "csv::invalid_option")]
    fgm_40_49: Option<f64>,
    #[serde(default, alias = "fg_made_50_plus", alias = "fg_made_50p", deserialize_with = "csv::invalid_option")]
    fgm_50_plus: Option<f64>,
    #[serde(default, alias = "xp_made", alias = "extra_points_made", deserialize_with = "csv::invalid_option")]
    xpm: Option<f64>,
    #[serde(default, alias = "xp_att", alias = "extra_points_attempted", deserialize_with = "csv::invalid_option")]
    xpa: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawTeamRow {
    #[serde(alias = "year")]
    season: u16,
    week: u8,
    #[serde(alias = "posteam")]
    team: String,
    #[serde(default, alias = "opp_points", alias = "points_against", deserialize_with = "csv::invalid_option")]
    points_allowed: Option<f64>,
    #[serde(default, alias = "def_sacks", deserialize_with = "csv::invalid_option")]
    sacks: Option<f64>,
    #[serde(default, alias = "def_int", deserialize_with = "csv::invalid_option")]
    interceptions: Option<f64>,
    #[serde(default, alias = "fumble_recoveries", alias = "def_fumble_rec", deserialize_with = "csv::invalid_option")]
    fumbles_recovered: Option<f64>,
    #[serde(default, alias = "def_safeties", deserialize_with = "csv::invalid_option")]
    safeties: Option<f64>,
    #[serde(default, alias = "defensive_tds", alias = "td_def", deserialize_with = "csv::invalid_option")]
    def_tds: Option<f64>,
    #[serde(default, alias = "td_ret", deserialize_with = "csv::invalid_option")]
    return_tds: Option<f64>,
    #[serde(default, alias = "blocks", alias = "def_blocks", deserialize_with = "csv::invalid_option")]
    blocked_kicks: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawScheduleRow {
    #[serde(alias = "year")]
    season: u16,
    week: u8,
    home_team: String,
    away_team: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    home_score: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    away_score: Option<f64>,
}

/// Finite value or zero.
fn num(v: Option<f64>) -> f64 {
    v.filter(|x| x.is_finite()).unwrap_or(0.0)
}

// ---------------------------------------------------------------------------
// Reader-based loaders
// ---------------------------------------------------------------------------

/// Offensive players and kickers. Other positions are dropped.
pub fn load_player_stats_from_reader<R: Read>(rdr: R) -> Result<Vec<PlayerStatRecord>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut records = Vec::new();
    for result in reader.deserialize::<RawPlayerRow>() {
        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                warn!("skipping malformed player stat row: {}", e);
                continue;
            }
        };
        let position = match Position::parse(&raw.position) {
            Some(Position::Dst) | None => {
                debug!("skipping {} at unsupported position '{}'", raw.player_id, raw.position);
                continue;
            }
            Some(p) => p,
        };
        if raw.player_id.trim().is_empty() || raw.week == 0 {
            warn!("skipping player stat row without id or week: '{}'", raw.player_name.trim());
            continue;
        }
        records.push(PlayerStatRecord {
            season: raw.season,
            week: raw.week,
            player_id: raw.player_id.trim().to_string(),
            player_name: raw.player_name.trim().to_string(),
            position,
            team: normalize_team(&raw.team),
            stats: PlayerWeekStats {
                passing_yards: num(raw.passing_yards),
                passing_tds: num(raw.passing_tds),
                interceptions: num(raw.interceptions),
                rushing_yards: num(raw.rushing_yards),
                rushing_tds: num(raw.rushing_tds),
                receptions: num(raw.receptions),
                receiving_yards: num(raw.receiving_yards),
                receiving_tds: num(raw.receiving_tds),
                fumbles_lost: num(raw.fumbles_lost),
                passing_2pt_conversions: num(raw.passing_2pt_conversions),
                rushing_2pt_conversions: num(raw.rushing_2pt_conversions),
                receiving_2pt_conversions: num(raw.receiving_2pt_conversions),
                fgm: num(raw.fgm),
                fga: num(raw.fga),
                fgm_0_39: num(raw.fgm_0_39),
                fgm_40_49: num(raw.fgm_40_49),
                fgm_50_plus: num(raw.fgm_50_plus),
                xpm: num(raw.xpm),
                xpa: num(raw.xpa),
            },
        });
    }
    Ok(records)
}

pub fn load_team_stats_from_reader<R: Read>(rdr: R) -> Result<Vec<TeamStatRecord>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut records = Vec::new();
    for result in reader.deserialize::<RawTeamRow>() {
        match result {
            Ok(raw) => {
                if raw.team.trim().is_empty() || raw.week == 0 {
                    warn!("skipping team stat row without team or week");
                    continue;
                }
                records.push(TeamStatRecord {
                    season: raw.season,
                    week: raw.week,
                    team: normalize_team(&raw.team),
                    stats: TeamWeekStats {
                        points_allowed: raw.points_allowed.filter(|x| x.is_finite()),
                        sacks: num(raw.sacks),
                        interceptions: num(raw.interceptions),
                        fumbles_recovered: num(raw.fumbles_recovered),
                        safeties: num(raw.safeties),
                        def_tds: num(raw.def_tds),
                        return_tds: num(raw.return_tds),
                        blocked_kicks: num(raw.blocked_kicks),
                    },
                });
            }
            Err(e) => {
                warn!("skipping malformed team stat row: {}", e);
            }
        }
    }
    Ok(records)
}

/// Completed games only: rows without both final scores are dropped.
pub fn load_schedule_from_reader<R: Read>(rdr: R) -> Result<Vec<ScheduledGame>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut games = Vec::new();
    for result in reader.deserialize::<RawScheduleRow>() {
        match result {
            Ok(raw) => {
                let (Some(home_score), Some(away_score)) = (raw.home_score, raw.away_score) else {
                    debug!(
                        "skipping unplayed game {} @ {} ({} wk {})",
                        raw.away_team, raw.home_team, raw.season, raw.week
                    );
                    continue;
                };
                games.push(ScheduledGame {
                    season: raw.season,
                    week: raw.week,
                    home_team: normalize_team(&raw.home_team),
                    away_team: normalize_team(&raw.away_team),
                    home_score,
                    away_score,
                });
            }
            Err(e) => {
                warn!("skipping malformed schedule row: {}", e);
            }
        }
    }
    Ok(games)
}

// ---------------------------------------------------------------------------
// Public path-based loaders
// ---------------------------------------------------------------------------

fn open(path: &Path) -> Result<std::fs::File, StatImportError> {
    std::fs::File::open(path).map_err(|e| StatImportError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

fn csv_err(path: &Path) -> impl FnOnce(csv::Error) -> StatImportError + '_ {
    move |e| StatImportError::Csv {
        path: path.display().to_string(),
        source: e,
    }
}

/// Load all three sources. An empty player file is an error; a missing
/// defense or schedule row only degrades scoring for that team.
pub fn load_all_from_paths(paths: &DataPaths) -> Result<WeeklyStats, StatImportError> {
    let player_path = Path::new(&paths.player_stats);
    let team_path = Path::new(&paths.team_stats);
    let schedule_path = Path::new(&paths.schedule);

    let players = load_player_stats_from_reader(open(player_path)?).map_err(csv_err(player_path))?;
    let teams = load_team_stats_from_reader(open(team_path)?).map_err(csv_err(team_path))?;
    let games = load_schedule_from_reader(open(schedule_path)?).map_err(csv_err(schedule_path))?;

    if players.is_empty() {
        return Err(StatImportError::Validation(
            "player stat CSV produced zero valid rows".into(),
        ));
    }

    Ok(WeeklyStats {
        players,
        teams,
        games,
    })
}
