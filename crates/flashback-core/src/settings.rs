// Per-session game settings and the roster template derived from them.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::position::{Position, SlotLabel};

/// Highest participant count a multiplayer room accepts.
pub const MAX_ROOM_SIZE: u8 = 12;

/// Reception bonus preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScoringPreset {
    #[default]
    Standard,
    HalfPpr,
    Ppr,
}

impl ScoringPreset {
    /// Points awarded per reception.
    pub fn reception_points(&self) -> f64 {
        match self {
            ScoringPreset::Standard => 0.0,
            ScoringPreset::HalfPpr => 0.5,
            ScoringPreset::Ppr => 1.0,
        }
    }
}

/// How a room fills before the draft starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LobbyMode {
    /// The room waits for `max_players` participants.
    #[default]
    Fixed,
    /// The host may start at any time with two or more participants.
    Open,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    #[default]
    Multiplayer,
    /// A single participant drafts alone against the clock.
    Solo,
}

/// Immutable settings of one draft session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    pub qb_slots: u8,
    pub rb_slots: u8,
    pub wr_slots: u8,
    pub te_slots: u8,
    pub flex_slots: u8,
    pub k_slots: u8,
    pub dst_slots: u8,
    /// First season (inclusive) a random week may be drawn from.
    pub year_start: u16,
    /// Last season (inclusive) a random week may be drawn from.
    pub year_end: u16,
    pub scoring: ScoringPreset,
    pub pass_td_points: f64,
    /// Seconds each participant has to make a pick.
    pub pick_time_secs: u32,
    pub max_players: u8,
    /// Reverse the order every round. Only takes effect with 3+ participants.
    pub snake_draft: bool,
    pub lobby_mode: LobbyMode,
    pub auto_start_when_full: bool,
    pub mode: GameMode,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            qb_slots: 1,
            rb_slots: 2,
            wr_slots: 2,
            te_slots: 1,
            flex_slots: 1,
            k_slots: 1,
            dst_slots: 1,
            year_start: 2010,
            year_end: 2025,
            scoring: ScoringPreset::Standard,
            pass_td_points: 4.0,
            pick_time_secs: 30,
            max_players: 2,
            snake_draft: true,
            lobby_mode: LobbyMode::Fixed,
            auto_start_when_full: true,
            mode: GameMode::Multiplayer,
        }
    }
}

impl GameSettings {
    /// Room capacity after clamping: 1 in solo mode, otherwise 2..=12.
    pub fn effective_max_players(&self) -> usize {
        match self.mode {
            GameMode::Solo => 1,
            GameMode::Multiplayer => self.max_players.clamp(2, MAX_ROOM_SIZE) as usize,
        }
    }

    /// Snake order needs at least three participants; two always alternate.
    pub fn snake_effective(&self, participant_count: usize) -> bool {
        self.snake_draft && participant_count >= 3
    }

    pub fn roster_template(&self) -> RosterTemplate {
        RosterTemplate::from_settings(self)
    }

    pub fn roster_size(&self) -> usize {
        [
            self.qb_slots,
            self.rb_slots,
            self.wr_slots,
            self.te_slots,
            self.flex_slots,
            self.k_slots,
            self.dst_slots,
        ]
        .iter()
        .map(|&n| n as usize)
        .sum()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.roster_size() == 0 {
            return Err(invalid("game.*_slots", "roster must have at least one slot"));
        }
        if self.year_start > self.year_end {
            return Err(invalid(
                "game.year_start",
                &format!(
                    "must not be after year_end ({} > {})",
                    self.year_start, self.year_end
                ),
            ));
        }
        if self.pick_time_secs == 0 {
            return Err(invalid("game.pick_time_secs", "must be greater than 0"));
        }
        if !self.pass_td_points.is_finite() {
            return Err(invalid("game.pass_td_points", "must be a finite number"));
        }
        if self.max_players == 0 || self.max_players > MAX_ROOM_SIZE {
            return Err(invalid(
                "game.max_players",
                &format!("must be between 1 and {MAX_ROOM_SIZE}, got {}", self.max_players),
            ));
        }
        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Roster template
// ---------------------------------------------------------------------------

/// Ordered slot labels every participant's roster must fill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterTemplate {
    slots: Vec<SlotLabel>,
}

impl RosterTemplate {
    /// Build the template in the fixed order QB, RB, WR, TE, FLEX, K, DST.
    pub fn from_settings(settings: &GameSettings) -> Self {
        let counts = [
            (SlotLabel::Qb, settings.qb_slots),
            (SlotLabel::Rb, settings.rb_slots),
            (SlotLabel::Wr, settings.wr_slots),
            (SlotLabel::Te, settings.te_slots),
            (SlotLabel::Flex, settings.flex_slots),
            (SlotLabel::K, settings.k_slots),
            (SlotLabel::Dst, settings.dst_slots),
        ];
        let slots = counts
            .iter()
            .flat_map(|&(label, n)| std::iter::repeat(label).take(n as usize))
            .collect();
        Self { slots }
    }

    pub fn from_labels(slots: Vec<SlotLabel>) -> Self {
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn labels(&self) -> &[SlotLabel] {
        &self.slots
    }

    pub fn label(&self, index: usize) -> Option<SlotLabel> {
        self.slots.get(index).copied()
    }

    /// First open slot a player at `position` can fill: exact slots are
    /// preferred over FLEX, each scanned in template order.
    pub fn first_open_slot_for(
        &self,
        position: Position,
        is_open: impl Fn(usize) -> bool,
    ) -> Option<usize> {
        let exact = SlotLabel::exact(position);
        self.slots
            .iter()
            .enumerate()
            .find(|&(i, &label)| label == exact && is_open(i))
            .or_else(|| {
                self.slots
                    .iter()
                    .enumerate()
                    .find(|&(i, &label)| label.is_flex() && label.accepts(position) && is_open(i))
            })
            .map(|(i, _)| i)
    }
}
