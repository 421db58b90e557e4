// Football positions, roster slot labels, and team/position normalization.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A draftable football position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Position {
    Qb,
    Rb,
    Wr,
    Te,
    K,
    Dst,
}

impl Position {
    /// Every position in roster-template order.
    pub const ALL: [Position; 6] = [
        Position::Qb,
        Position::Rb,
        Position::Wr,
        Position::Te,
        Position::K,
        Position::Dst,
    ];

    /// Parse a raw position string.
    ///
    /// Case-insensitive and whitespace-tolerant. `PK` is a kicker, and the
    /// common defense spellings (`DEF`, `D/ST`) map to `DST`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "QB" => Some(Position::Qb),
            "RB" => Some(Position::Rb),
            "WR" => Some(Position::Wr),
            "TE" => Some(Position::Te),
            "K" | "PK" => Some(Position::K),
            "DST" | "DEF" | "D/ST" => Some(Position::Dst),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Position::Qb => "QB",
            Position::Rb => "RB",
            Position::Wr => "WR",
            Position::Te => "TE",
            Position::K => "K",
            Position::Dst => "DST",
        }
    }

    /// Whether a FLEX slot can hold this position.
    pub fn is_flex_eligible(&self) -> bool {
        matches!(self, Position::Rb | Position::Wr | Position::Te)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The label of a roster slot: a concrete position or FLEX.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SlotLabel {
    Qb,
    Rb,
    Wr,
    Te,
    Flex,
    K,
    Dst,
}

const FLEX_POSITIONS: [Position; 3] = [Position::Rb, Position::Wr, Position::Te];

impl SlotLabel {
    /// Slot label for an exact position.
    pub fn exact(position: Position) -> Self {
        match position {
            Position::Qb => SlotLabel::Qb,
            Position::Rb => SlotLabel::Rb,
            Position::Wr => SlotLabel::Wr,
            Position::Te => SlotLabel::Te,
            Position::K => SlotLabel::K,
            Position::Dst => SlotLabel::Dst,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        if s.trim().eq_ignore_ascii_case("FLEX") {
            return Some(SlotLabel::Flex);
        }
        Position::parse(s).map(SlotLabel::exact)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SlotLabel::Qb => "QB",
            SlotLabel::Rb => "RB",
            SlotLabel::Wr => "WR",
            SlotLabel::Te => "TE",
            SlotLabel::Flex => "FLEX",
            SlotLabel::K => "K",
            SlotLabel::Dst => "DST",
        }
    }

    pub fn is_flex(&self) -> bool {
        matches!(self, SlotLabel::Flex)
    }

    /// Positions this slot accepts, in autopick scan order.
    pub fn eligible_positions(&self) -> &'static [Position] {
        match self {
            SlotLabel::Qb => &[Position::Qb],
            SlotLabel::Rb => &[Position::Rb],
            SlotLabel::Wr => &[Position::Wr],
            SlotLabel::Te => &[Position::Te],
            SlotLabel::Flex => &FLEX_POSITIONS,
            SlotLabel::K => &[Position::K],
            SlotLabel::Dst => &[Position::Dst],
        }
    }

    pub fn accepts(&self, position: Position) -> bool {
        self.eligible_positions().contains(&position)
    }
}

impl fmt::Display for SlotLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonicalize a team abbreviation. Historical and vendor-specific codes
/// map onto the current franchise code; anything else is uppercased.
pub fn normalize_team(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    let mapped = match upper.as_str() {
        "LA" => "LAR",
        "JAC" => "JAX",
        "WSH" => "WAS",
        "BLT" => "BAL",
        "ARZ" => "ARI",
        "CLV" => "CLE",
        "HST" => "HOU",
        "SL" => "STL",
        other => return other.to_string(),
    };
    mapped.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_normalizes_kicker_alias() {
        assert_eq!(Position::parse("pk"), Some(Position::K));
        assert_eq!(Position::parse(" k "), Some(Position::K));
        assert_eq!(Position::parse("D/ST"), Some(Position::Dst));
        assert_eq!(Position::parse("LB"), None);
    }

    #[test]
    fn flex_accepts_only_rb_wr_te() {
        assert!(SlotLabel::Flex.accepts(Position::Rb));
        assert!(SlotLabel::Flex.accepts(Position::Wr));
        assert!(SlotLabel::Flex.accepts(Position::Te));
        assert!(!SlotLabel::Flex.accepts(Position::Qb));
        assert!(!SlotLabel::Flex.accepts(Position::K));
        assert!(!SlotLabel::Flex.accepts(Position::Dst));
    }

    #[test]
    fn exact_slot_accepts_only_its_position() {
        assert!(SlotLabel::Qb.accepts(Position::Qb));
        assert!(!SlotLabel::Qb.accepts(Position::Rb));
        assert!(SlotLabel::Dst.accepts(Position::Dst));
    }

    #[test]
    fn slot_label_parse_round_trips_display() {
        for label in [
            SlotLabel::Qb,
            SlotLabel::Rb,
            SlotLabel::Wr,
            SlotLabel::Te,
            SlotLabel::Flex,
            SlotLabel::K,
            SlotLabel::Dst,
        ] {
            assert_eq!(SlotLabel::parse(label.as_str()), Some(label));
        }
    }

    #[test]
    fn normalize_team_maps_legacy_codes() {
        assert_eq!(normalize_team("la"), "LAR");
        assert_eq!(normalize_team("JAC"), "JAX");
        assert_eq!(normalize_team("WSH"), "WAS");
        assert_eq!(normalize_team("BLT"), "BAL");
        assert_eq!(normalize_team("ARZ"), "ARI");
        assert_eq!(normalize_team("CLV"), "CLE");
        assert_eq!(normalize_team("HST"), "HOU");
        assert_eq!(normalize_team("SL"), "STL");
        assert_eq!(normalize_team(" kc "), "KC");
    }

    #[test]
    fn serde_uses_uppercase_codes() {
        let json = serde_json::to_string(&SlotLabel::Flex).unwrap();
        assert_eq!(json, "\"FLEX\"");
        let pos: Position = serde_json::from_str("\"DST\"").unwrap();
        assert_eq!(pos, Position::Dst);
    }
}
