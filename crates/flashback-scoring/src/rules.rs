// Scoring rule tables.

use serde::{Deserialize, Serialize};

use flashback_core::settings::GameSettings;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassingRules {
    pub yards_per_point: f64,
    pub touchdown: f64,
    pub interception: f64,
}

/// Rushing or receiving.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YardageRules {
    pub yards_per_point: f64,
    pub touchdown: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KickerRules {
    pub fg_0_39: f64,
    pub fg_40_49: f64,
    pub fg_50_plus: f64,
    /// Per make when no distance split is recorded.
    pub fg_any: f64,
    pub fg_miss: f64,
    pub xp_made: f64,
    pub xp_miss: f64,
}

/// Points for allowing at most `max_allowed` points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointsAllowedTier {
    pub max_allowed: f64,
    pub points: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DstRules {
    /// Starting value the points-allowed tier replaces.
    pub base: f64,
    pub sack: f64,
    pub interception: f64,
    pub fumble_recovered: f64,
    pub safety: f64,
    pub defensive_td: f64,
    pub return_td: f64,
    pub blocked_kick: f64,
    /// Ascending by `max_allowed`.
    pub points_allowed_tiers: Vec<PointsAllowedTier>,
    /// Tier value past the last tier.
    pub points_allowed_floor: f64,
}

impl DstRules {
    /// Tier value for `points_allowed`. A negative value matches no tier and
    /// takes the floor.
    pub fn points_allowed_tier(&self, points_allowed: f64) -> f64 {
        if points_allowed < 0.0 {
            return self.points_allowed_floor;
        }
        self.points_allowed_tiers
            .iter()
            .find(|t| points_allowed <= t.max_allowed)
            .map(|t| t.points)
            .unwrap_or(self.points_allowed_floor)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringRules {
    pub passing: PassingRules,
    pub rushing: YardageRules,
    pub receiving: YardageRules,
    /// Per reception for RB/WR/TE; set by the scoring preset.
    pub reception: f64,
    pub fumble_lost: f64,
    pub two_point: f64,
    pub kicker: KickerRules,
    pub dst: DstRules,
}

impl Default for ScoringRules {
    fn default() -> Self {
        let tier = |max_allowed, points| PointsAllowedTier { max_allowed, points };
        Self {
            passing: PassingRules {
                yards_per_point: 25.0,
                touchdown: 4.0,
                interception: -2.0,
            },
            rushing: YardageRules {
                yards_per_point: 10.0,
                touchdown: 6.0,
            },
            receiving: YardageRules {
                yards_per_point: 10.0,
                touchdown: 6.0,
            },
            reception: 0.0,
            fumble_lost: -2.0,
            two_point: 2.0,
            kicker: KickerRules {
                fg_0_39: 3.0,
                fg_40_49: 4.0,
                fg_50_plus: 5.0,
                fg_any: 3.0,
                fg_miss: -1.0,
                xp_made: 1.0,
                xp_miss: -1.0,
            },
            dst: DstRules {
                base: 10.0,
                sack: 1.0,
                interception: 2.0,
                fumble_recovered: 2.0,
                safety: 2.0,
                defensive_td: 6.0,
                return_td: 6.0,
                blocked_kick: 2.0,
                points_allowed_tiers: vec![
                    tier(0.0, 10.0),
                    tier(6.0, 7.0),
                    tier(13.0, 4.0),
                    tier(20.0, 1.0),
                    tier(27.0, 0.0),
                    tier(34.0, -1.0),
                ],
                points_allowed_floor: -4.0,
            },
        }
    }
}

impl ScoringRules {
    /// Defaults with the session's reception preset and passing TD value.
    pub fn for_settings(settings: &GameSettings) -> Self {
        let mut rules = Self::default();
        rules.reception = settings.scoring.reception_points();
        rules.passing.touchdown = settings.pass_td_points;
        rules
    }
}
