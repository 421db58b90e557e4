// Client-side draft turn scheduler.
//
// Keeps two slices of state: the authoritative snapshot last read from (or
// returned by) the store, and a local slice derived from it for countdown
// display and turn checks. Every authoritative value replaces the local slice
// wholesale, even when that moves a deadline backward. The scheduler never
// mutates shared state directly; every change is proposed to the store and
// may be rejected.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tracing::{debug, info, warn};

use flashback_core::clock::Clock;
use flashback_core::pool::WeeklyPoolEntry;
use flashback_core::position::{Position, SlotLabel};
use flashback_core::roster::{DraftBoard, Pick, Roster};
use flashback_core::session::{remaining_secs, SessionPhase, SessionState, TurnState};
use flashback_core::settings::RosterTemplate;
use flashback_core::store::{DraftStore, PickRequest, RejectReason, StoreError};
use flashback_core::{EntryId, ParticipantId, SessionId};

use crate::autopick::{choose_autopick, PinBoard};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// A pick that did not go through. Always recoverable: the draft continues.
#[derive(Debug, Error)]
pub enum PickError {
    #[error("it is not your turn")]
    NotYourTurn,

    #[error("the draft has not started or is over")]
    NotDrafting,

    #[error("roster slot {0} does not exist")]
    SlotOutOfRange(usize),

    #[error("roster slot {0} is already filled")]
    SlotFilled(usize),

    #[error("{0} is not in this week's pool")]
    UnknownEntry(EntryId),

    #[error("{0} has already been drafted")]
    AlreadyDrafted(EntryId),

    #[error("a {position} cannot fill a {slot} slot")]
    IneligiblePosition { position: Position, slot: SlotLabel },

    #[error("no open roster slot for a {0}")]
    NoOpenSlot(Position),

    #[error("pick rejected: {0}")]
    Rejected(RejectReason),

    #[error("could not reach the draft store: {0}")]
    Store(StoreError),
}

// ---------------------------------------------------------------------------
// State slices
// ---------------------------------------------------------------------------

/// Turn view derived from the latest authoritative snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalTurn {
    pub phase: Option<SessionPhase>,
    pub turn_holder: Option<ParticipantId>,
    pub pick_number: u32,
    pub deadline: Option<DateTime<Utc>>,
    pub is_my_turn: bool,
    pub remaining_secs: u64,
}

/// What an observation changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observation {
    /// The store answered; `false` means nothing below was refreshed.
    pub fresh: bool,
    pub turn_changed: bool,
    pub new_picks: Vec<Pick>,
    pub phase_changed: Option<SessionPhase>,
}

impl Observation {
    pub fn is_empty(&self) -> bool {
        !self.turn_changed && self.new_picks.is_empty() && self.phase_changed.is_none()
    }
}

type AttemptKey = (SessionId, u32);

// ---------------------------------------------------------------------------
// TurnScheduler
// ---------------------------------------------------------------------------

pub struct TurnScheduler {
    store: Arc<dyn DraftStore>,
    clock: Arc<dyn Clock>,
    session_id: SessionId,
    me: ParticipantId,

    authoritative: Option<SessionState>,
    local: LocalTurn,

    template: RosterTemplate,
    pool: Vec<WeeklyPoolEntry>,
    pool_week: Option<(u16, u8)>,
    picks: Vec<Pick>,
    board: DraftBoard,
    pins: PinBoard,
    rng: StdRng,

    /// Last pick number the store backstop was asked to autopick.
    last_store_autopick: Option<AttemptKey>,
    /// Last pick number this client autopicked for itself.
    last_self_autopick: Option<AttemptKey>,
}

impl TurnScheduler {
    pub fn new(
        store: Arc<dyn DraftStore>,
        clock: Arc<dyn Clock>,
        session_id: SessionId,
        me: ParticipantId,
    ) -> Self {
        Self::with_rng(store, clock, session_id, me, StdRng::from_os_rng())
    }

    /// Deterministic autopick fallback, for tests.
    pub fn seeded(
        store: Arc<dyn DraftStore>,
        clock: Arc<dyn Clock>,
        session_id: SessionId,
        me: ParticipantId,
        seed: u64,
    ) -> Self {
        Self::with_rng(store, clock, session_id, me, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        store: Arc<dyn DraftStore>,
        clock: Arc<dyn Clock>,
        session_id: SessionId,
        me: ParticipantId,
        rng: StdRng,
    ) -> Self {
        Self {
            store,
            clock,
            session_id,
            me,
            authoritative: None,
            local: LocalTurn::default(),
            template: RosterTemplate::from_labels(Vec::new()),
            pool: Vec::new(),
            pool_week: None,
            picks: Vec::new(),
            board: DraftBoard::default(),
            pins: PinBoard::new(),
            rng,
            last_store_autopick: None,
            last_self_autopick: None,
        }
    }

    // --- accessors ---

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn me(&self) -> ParticipantId {
        self.me
    }

    pub fn authoritative(&self) -> Option<&SessionState> {
        self.authoritative.as_ref()
    }

    pub fn local(&self) -> &LocalTurn {
        &self.local
    }

    pub fn template(&self) -> &RosterTemplate {
        &self.template
    }

    pub fn pool(&self) -> &[WeeklyPoolEntry] {
        &self.pool
    }

    pub fn picks(&self) -> &[Pick] {
        &self.picks
    }

    pub fn board(&self) -> &DraftBoard {
        &self.board
    }

    pub fn my_roster(&self) -> Roster {
        self.board.roster_for(self.me, &self.template)
    }

    pub fn pins(&self) -> &PinBoard {
        &self.pins
    }

    pub fn phase(&self) -> Option<SessionPhase> {
        self.local.phase
    }

    /// Undrafted pool entries, in pool order.
    pub fn available(&self) -> impl Iterator<Item = &WeeklyPoolEntry> {
        self.pool.iter().filter(|e| !self.board.is_drafted(&e.id))
    }

    /// Pin or unpin a pool entry. `None` if the id is not in the pool.
    pub fn toggle_pin(&mut self, entry_id: &str) -> Option<bool> {
        let position = self.pool.iter().find(|e| e.id == entry_id)?.position;
        Some(self.pins.toggle(entry_id, position))
    }

    // --- state merging ---

    fn adopt_state(&mut self, state: SessionState) {
        self.template = state.settings.roster_template();
        self.set_local(&state.turn);
        self.authoritative = Some(state);
    }

    fn adopt_turn(&mut self, turn: TurnState) {
        self.set_local(&turn);
        if let Some(state) = self.authoritative.as_mut() {
            state.turn = turn;
        }
    }

    fn set_local(&mut self, turn: &TurnState) {
        let now = self.clock.now();
        self.local = LocalTurn {
            phase: Some(turn.phase),
            turn_holder: turn.turn_holder,
            pick_number: turn.pick_number,
            deadline: turn.turn_deadline,
            is_my_turn: turn.is_turn_of(self.me),
            remaining_secs: turn.remaining_secs(now),
        };
    }

    fn set_picks(&mut self, picks: Vec<Pick>) {
        self.board = DraftBoard::rebuild(&self.template, &picks);
        self.picks = picks;
    }

    /// Recompute the countdown from the local deadline. Returns seconds left.
    pub fn tick(&mut self) -> u64 {
        self.local.remaining_secs = self
            .local
            .deadline
            .map(|d| remaining_secs(d, self.clock.now()))
            .unwrap_or(0);
        self.local.remaining_secs
    }

    // --- operations ---

    /// Pull session state and picks from the store and reconcile.
    ///
    /// Store errors are logged and ignored; the next poll retries.
    pub async fn observe_state(&mut self) -> Observation {
        let state = match self.store.get_session_state(self.session_id).await {
            Ok(s) => s,
            Err(e) => {
                debug!("session {}: observe failed: {}", self.session_id, e);
                return Observation::default();
            }
        };
        let picks = match self.store.list_picks(self.session_id).await {
            Ok(p) => p,
            Err(e) => {
                debug!("session {}: pick list unavailable: {}", self.session_id, e);
                return Observation::default();
            }
        };

        if let (Some(season), Some(week)) = (state.season, state.week) {
            if self.pool_week != Some((season, week)) {
                match self.store.get_weekly_pool(season, week).await {
                    Ok(pool) => {
                        info!("Loaded {} pool entries for {} wk {}", pool.len(), season, week);
                        self.pool = pool;
                        self.pool_week = Some((season, week));
                    }
                    Err(e) => debug!("weekly pool unavailable: {}", e),
                }
            }
        }

        let previous_phase = self.local.phase;
        let previous_turn = (self.local.turn_holder, self.local.pick_number);
        let known = self.picks.last().map(|p| p.pick_number).unwrap_or(0);

        self.adopt_state(state);
        let new_picks: Vec<Pick> = picks.iter().filter(|p| p.pick_number > known).cloned().collect();
        self.set_picks(picks);

        Observation {
            fresh: true,
            turn_changed: previous_turn != (self.local.turn_holder, self.local.pick_number),
            new_picks,
            phase_changed: (previous_phase != self.local.phase).then_some(self.local.phase).flatten(),
        }
    }

    /// Propose a pick of `entry_id` into my roster slot `slot_index`.
    ///
    /// Checked locally first; the store has the final word. Any failure
    /// re-observes so the local view catches up.
    pub async fn submit_pick(&mut self, entry_id: &str, slot_index: usize) -> Result<TurnState, PickError> {
        if let Err(e) = self.check_pick(entry_id, slot_index) {
            debug!("pick of {} into slot {} refused locally: {}", entry_id, slot_index, e);
            return Err(e);
        }
        let Some(slot_label) = self.template.label(slot_index) else {
            return Err(PickError::SlotOutOfRange(slot_index));
        };
        let req = PickRequest {
            participant_id: self.me,
            entry_id: entry_id.to_string(),
            slot_index,
            slot_label,
        };
        let pick_number = self.local.pick_number;

        match self.store.submit_pick(self.session_id, req).await {
            Ok(next) => {
                info!("Pick #{}: {} into {} slot {}", pick_number, entry_id, slot_label, slot_index);
                let mut picks = self.picks.clone();
                picks.push(Pick {
                    session_id: self.session_id,
                    pick_number,
                    participant_id: self.me,
                    slot_index,
                    slot_label,
                    entry_id: entry_id.to_string(),
                    picked_at: self.clock.now(),
                    auto: false,
                });
                self.set_picks(picks);
                self.adopt_turn(next.clone());
                Ok(next)
            }
            Err(StoreError::Rejected(reason)) => {
                warn!("Pick of {} rejected: {}", entry_id, reason);
                self.observe_state().await;
                Err(PickError::Rejected(reason))
            }
            Err(e) => {
                debug!("pick submission failed: {}", e);
                self.observe_state().await;
                Err(PickError::Store(e))
            }
        }
    }

    fn check_pick(&self, entry_id: &str, slot_index: usize) -> Result<(), PickError> {
        if self.local.phase != Some(SessionPhase::Draft) {
            return Err(PickError::NotDrafting);
        }
        if !self.local.is_my_turn {
            return Err(PickError::NotYourTurn);
        }
        let Some(slot) = self.template.label(slot_index) else {
            return Err(PickError::SlotOutOfRange(slot_index));
        };
        if !self.my_roster().is_open(slot_index) {
            return Err(PickError::SlotFilled(slot_index));
        }
        let Some(entry) = self.pool.iter().find(|e| e.id == entry_id) else {
            return Err(PickError::UnknownEntry(entry_id.to_string()));
        };
        if self.board.is_drafted(entry_id) {
            return Err(PickError::AlreadyDrafted(entry_id.to_string()));
        }
        if !slot.accepts(entry.position) {
            return Err(PickError::IneligiblePosition {
                position: entry.position,
                slot,
            });
        }
        Ok(())
    }

    /// Draft `entry_id` into the first open slot for its position, exact
    /// slots before FLEX.
    pub async fn draft_entry(&mut self, entry_id: &str) -> Result<TurnState, PickError> {
        let Some(position) = self.pool.iter().find(|e| e.id == entry_id).map(|e| e.position) else {
            return Err(PickError::UnknownEntry(entry_id.to_string()));
        };
        let roster = self.my_roster();
        let slot = self
            .template
            .first_open_slot_for(position, |i| roster.is_open(i))
            .ok_or(PickError::NoOpenSlot(position))?;
        self.submit_pick(entry_id, slot).await
    }

    /// Ask the store to autopick when the authoritative deadline has passed.
    ///
    /// Tried at most once per pick number; errors are ignored because the
    /// store enforces deadlines on its own as well.
    pub async fn trigger_autopick_if_due(&mut self) -> Option<TurnState> {
        let state = self.authoritative.as_ref()?;
        if state.phase() != SessionPhase::Draft || !state.turn.deadline_elapsed(self.clock.now()) {
            return None;
        }
        let key = (self.session_id, state.turn.pick_number);
        if self.last_store_autopick == Some(key) {
            return None;
        }
        self.last_store_autopick = Some(key);

        match self.store.autopick_if_due(self.session_id).await {
            Ok(Some(next)) => {
                info!("Overdue pick #{} was autopicked", key.1);
                self.adopt_turn(next.clone());
                Some(next)
            }
            Ok(None) => None,
            Err(e) => {
                debug!("autopick trigger failed: {}", e);
                None
            }
        }
    }

    /// Pick for myself when my own countdown has run out.
    ///
    /// Re-reads the store first and only proceeds if it is still my turn and
    /// the fresh deadline has elapsed. Pins are used first, then a random
    /// eligible entry.
    pub async fn self_autopick_if_idle(&mut self) -> Result<Option<TurnState>, PickError> {
        if !self.local.is_my_turn || self.tick() > 0 {
            return Ok(None);
        }
        if !self.observe_state().await.fresh {
            return Ok(None);
        }
        let Some(state) = self.authoritative.as_ref() else {
            return Ok(None);
        };
        if !state.turn.is_turn_of(self.me) || !state.turn.deadline_elapsed(self.clock.now()) {
            return Ok(None);
        }
        let key = (self.session_id, state.turn.pick_number);
        if self.last_self_autopick == Some(key) {
            return Ok(None);
        }
        self.last_self_autopick = Some(key);

        let roster = self.my_roster();
        let Some(choice) = choose_autopick(
            &roster,
            &self.template,
            &self.pool,
            &self.board,
            &self.pins,
            &mut self.rng,
        ) else {
            warn!("No eligible entry left to autopick at pick #{}", key.1);
            return Ok(None);
        };
        info!(
            "Autopicking {} for slot {} ({})",
            choice.entry_id,
            choice.slot_index,
            if choice.pinned { "pinned" } else { "random" }
        );
        self.submit_pick(&choice.entry_id, choice.slot_index).await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use flashback_core::clock::ManualClock;
    use flashback_core::data::WeeklyStats;
    use flashback_core::db::SqliteStore;
    use flashback_core::pool::{PlayerStatRecord, PlayerWeekStats, TeamStatRecord, TeamWeekStats};
    use flashback_core::participant::Participant;
    use flashback_core::settings::GameSettings;
    use flashback_core::store::StoreResult;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn start_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 8, 17, 0, 0).unwrap()
    }

    fn player(id: &str, name: &str, position: Position) -> PlayerStatRecord {
        PlayerStatRecord {
            season: 2022,
            week: 3,
            player_id: id.into(),
            player_name: name.into(),
            position,
            team: "BUF".into(),
            stats: PlayerWeekStats::default(),
        }
    }

    fn week() -> WeeklyStats {
        WeeklyStats {
            players: vec![
                player("qb1", "Allen", Position::Qb),
                player("qb2", "Burrow", Position::Qb),
                player("rb1", "Cook", Position::Rb),
                player("rb2", "Dobbins", Position::Rb),
                player("wr1", "Diggs", Position::Wr),
            ],
            teams: vec![TeamStatRecord {
                season: 2022,
                week: 3,
                team: "BUF".into(),
                stats: TeamWeekStats::default(),
            }],
            games: Vec::new(),
        }
    }

    struct Fixture {
        store: Arc<SqliteStore>,
        clock: Arc<ManualClock>,
        first: TurnScheduler,
        second: TurnScheduler,
    }

    /// Two schedulers on one store, `first` on the clock.
    async fn pair() -> Fixture {
        let clock = Arc::new(ManualClock::new(start_time()));
        let store = Arc::new(SqliteStore::open_seeded(":memory:", clock.clone(), 21).unwrap());
        store.import_weekly_stats(&week()).unwrap();
        let settings = GameSettings {
            qb_slots: 1,
            rb_slots: 1,
            wr_slots: 0,
            te_slots: 0,
            flex_slots: 1,
            k_slots: 0,
            dst_slots: 0,
            ..Default::default()
        };
        let (state, host) = store.create_session(settings, "Host").await.unwrap();
        let (_, guest) = store.join_session(&state.room_code, "Guest").await.unwrap();
        let turn = store.start_draft(state.session_id, host.id, 2022, 3).await.unwrap();

        let (a, b) = if turn.turn_holder == Some(host.id) {
            (host.id, guest.id)
        } else {
            (guest.id, host.id)
        };
        let mut first = TurnScheduler::seeded(store.clone(), clock.clone(), state.session_id, a, 1);
        let mut second = TurnScheduler::seeded(store.clone(), clock.clone(), state.session_id, b, 2);
        first.observe_state().await;
        second.observe_state().await;
        Fixture {
            store,
            clock,
            first,
            second,
        }
    }

    /// Delegates to SQLite but can refuse session reads.
    struct Unreliable {
        inner: Arc<SqliteStore>,
        reads_down: AtomicBool,
    }

    impl Unreliable {
        fn down(&self) -> StoreResult<()> {
            if self.reads_down.load(Ordering::SeqCst) {
                return Err(StoreError::NotFound("session read timed out".into()));
            }
            Ok(())
        }
    }

    #[async_trait::async_trait]
    impl DraftStore for Unreliable {
        async fn get_session_state(&self, session_id: SessionId) -> StoreResult<SessionState> {
            self.down()?;
            self.inner.get_session_state(session_id).await
        }

        async fn list_participants(&self, session_id: SessionId) -> StoreResult<Vec<Participant>> {
            self.inner.list_participants(session_id).await
        }

        async fn list_picks(&self, session_id: SessionId) -> StoreResult<Vec<Pick>> {
            self.down()?;
            self.inner.list_picks(session_id).await
        }

        async fn get_weekly_pool(&self, season: u16, week: u8) -> StoreResult<Vec<WeeklyPoolEntry>> {
            self.inner.get_weekly_pool(season, week).await
        }

        async fn submit_pick(&self, session_id: SessionId, pick: PickRequest) -> StoreResult<TurnState> {
            self.inner.submit_pick(session_id, pick).await
        }

        async fn autopick_if_due(&self, session_id: SessionId) -> StoreResult<Option<TurnState>> {
            self.inner.autopick_if_due(session_id).await
        }

        async fn heartbeat(&self, session_id: SessionId, participant_id: ParticipantId) -> StoreResult<()> {
            self.inner.heartbeat(session_id, participant_id).await
        }

        async fn mark_left(&self, session_id: SessionId, participant_id: ParticipantId) -> StoreResult<()> {
            self.inner.mark_left(session_id, participant_id).await
        }

        async fn create_session(
            &self,
            settings: GameSettings,
            host_name: &str,
        ) -> StoreResult<(SessionState, Participant)> {
            self.inner.create_session(settings, host_name).await
        }

        async fn join_session(
            &self,
            room_code: &str,
            display_name: &str,
        ) -> StoreResult<(SessionState, Participant)> {
            self.inner.join_session(room_code, display_name).await
        }

        async fn pick_random_week(&self, year_start: u16, year_end: u16) -> StoreResult<Option<(u16, u8)>> {
            self.inner.pick_random_week(year_start, year_end).await
        }

        async fn start_draft(
            &self,
            session_id: SessionId,
            host_id: ParticipantId,
            season: u16,
            week: u8,
        ) -> StoreResult<TurnState> {
            self.inner.start_draft(session_id, host_id, season, week).await
        }

        async fn set_phase(
            &self,
            session_id: SessionId,
            host_id: ParticipantId,
            phase: SessionPhase,
        ) -> StoreResult<()> {
            self.inner.set_phase(session_id, host_id, phase).await
        }
    }

    #[tokio::test]
    async fn observe_loads_pool_and_turn() {
        let f = pair().await;
        assert!(f.first.local().is_my_turn);
        assert!(!f.second.local().is_my_turn);
        assert_eq!(f.first.local().pick_number, 1);
        assert_eq!(f.first.local().remaining_secs, 30);
        assert_eq!(f.first.pool().len(), 6);
        assert_eq!(f.first.template().len(), 3);
        assert_eq!(f.first.phase(), Some(SessionPhase::Draft));
    }

    #[tokio::test]
    async fn submit_then_other_client_observes() {
        let mut f = pair().await;
        let next = f.first.submit_pick("qb1", 0).await.unwrap();
        assert_eq!(next.pick_number, 2);
        assert!(!f.first.local().is_my_turn);
        assert!(f.first.board().is_drafted("qb1"));

        let obs = f.second.observe_state().await;
        assert!(obs.turn_changed);
        assert_eq!(obs.new_picks.len(), 1);
        assert_eq!(obs.new_picks[0].entry_id, "qb1");
        assert!(f.second.local().is_my_turn);

        // Nothing new on a second look.
        assert!(f.second.observe_state().await.is_empty());
    }

    #[tokio::test]
    async fn local_checks_refuse_bad_picks() {
        let mut f = pair().await;
        assert!(matches!(f.second.submit_pick("qb1", 0).await, Err(PickError::NotYourTurn)));
        assert!(matches!(f.first.submit_pick("qb1", 7).await, Err(PickError::SlotOutOfRange(7))));
        assert!(matches!(f.first.submit_pick("nobody", 0).await, Err(PickError::UnknownEntry(_))));
        assert!(matches!(
            f.first.submit_pick("qb1", 2).await,
            Err(PickError::IneligiblePosition { position: Position::Qb, slot: SlotLabel::Flex })
        ));
        assert!(f.store.list_picks(f.first.session_id()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn local_view_catches_up_after_observe() {
        let mut f = pair().await;
        f.first.submit_pick("rb1", 1).await.unwrap();
        f.second.observe_state().await;
        f.second.submit_pick("qb1", 0).await.unwrap();
        assert!(matches!(f.second.submit_pick("qb2", 0).await, Err(PickError::NotYourTurn)));

        // first has not seen qb1 go yet.
        assert!(!f.first.board().is_drafted("qb1"));
        f.first.observe_state().await;
        assert!(f.first.board().is_drafted("qb1"));
        assert!(matches!(f.first.submit_pick("qb1", 0).await, Err(PickError::AlreadyDrafted(_))));
    }

    #[tokio::test]
    async fn store_rejection_re_observes() {
        let mut f = pair().await;
        // A client that wrongly believes it holds the turn.
        f.second.local.is_my_turn = true;
        let lost = f.second.submit_pick("qb2", 0).await;
        assert!(matches!(lost, Err(PickError::Rejected(RejectReason::NotYourTurn))));
        assert!(!f.second.local().is_my_turn);

        assert!(f.first.submit_pick("qb1", 0).await.is_ok());
        assert_eq!(f.store.list_picks(f.first.session_id()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn draft_entry_prefers_exact_slot_then_flex() {
        let mut f = pair().await;
        f.first.draft_entry("rb1").await.unwrap();
        assert_eq!(f.first.my_roster().get(1).map(String::as_str), Some("rb1"));

        f.second.observe_state().await;
        f.second.draft_entry("qb1").await.unwrap();

        f.first.observe_state().await;
        f.first.draft_entry("rb2").await.unwrap();
        assert_eq!(f.first.my_roster().get(2).map(String::as_str), Some("rb2"));

        f.second.observe_state().await;
        f.second.draft_entry("wr1").await.unwrap();
        f.first.observe_state().await;
        assert!(matches!(f.first.draft_entry("wr1").await, Err(PickError::NoOpenSlot(Position::Wr))));
        assert!(matches!(f.first.draft_entry("qb1").await, Err(PickError::AlreadyDrafted(_))));
    }

    #[tokio::test]
    async fn trigger_autopick_waits_and_fires_once_per_pick() {
        let mut f = pair().await;
        assert_eq!(f.second.trigger_autopick_if_due().await, None);

        f.clock.advance(Duration::seconds(31));
        let next = f.second.trigger_autopick_if_due().await.unwrap();
        assert_eq!(next.pick_number, 2);
        assert!(f.second.local().is_my_turn);

        // Same pick number is never retried.
        let turn = &mut f.second.authoritative.as_mut().unwrap().turn;
        turn.pick_number = 1;
        turn.turn_deadline = Some(start_time());
        assert_eq!(f.second.trigger_autopick_if_due().await, None);
        assert_eq!(f.store.list_picks(f.second.session_id()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn self_autopick_uses_pins_after_deadline() {
        let mut f = pair().await;
        assert_eq!(f.first.toggle_pin("rb2"), Some(true));
        assert_eq!(f.first.toggle_pin("ghost"), None);

        assert_eq!(f.first.self_autopick_if_idle().await.unwrap(), None);

        f.clock.advance(Duration::milliseconds(30_001));
        let next = f.first.self_autopick_if_idle().await.unwrap().unwrap();
        assert_eq!(next.pick_number, 2);
        assert_eq!(f.first.my_roster().get(1).map(String::as_str), Some("rb2"));

        // Not my turn any more.
        assert_eq!(f.first.self_autopick_if_idle().await.unwrap(), None);
    }

    #[tokio::test]
    async fn self_autopick_defers_to_fresh_state() {
        let mut f = pair().await;
        f.clock.advance(Duration::seconds(31));
        // The store backstop got there first.
        f.store.enforce_deadlines().unwrap();
        assert_eq!(f.first.self_autopick_if_idle().await.unwrap(), None);
        assert!(!f.first.local().is_my_turn);
        assert_eq!(f.store.list_picks(f.first.session_id()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn self_autopick_waits_for_a_fresh_read() {
        let f = pair().await;
        let store = Arc::new(Unreliable {
            inner: f.store.clone(),
            reads_down: AtomicBool::new(false),
        });
        let mut me = TurnScheduler::seeded(store.clone(), f.clock.clone(), f.first.session_id(), f.first.me(), 9);
        assert!(me.observe_state().await.fresh);
        assert!(me.local().is_my_turn);

        f.clock.advance(Duration::seconds(31));
        store.reads_down.store(true, Ordering::SeqCst);
        assert!(!me.observe_state().await.fresh);
        assert_eq!(me.self_autopick_if_idle().await.unwrap(), None);
        assert!(f.store.list_picks(me.session_id()).await.unwrap().is_empty());

        // Once reads recover the overdue pick goes through.
        store.reads_down.store(false, Ordering::SeqCst);
        let next = me.self_autopick_if_idle().await.unwrap().unwrap();
        assert_eq!(next.pick_number, 2);
        assert_eq!(f.store.list_picks(me.session_id()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn authoritative_deadline_wins_even_backward() {
        let mut f = pair().await;
        f.first.local.deadline = Some(start_time() + Duration::seconds(300));
        assert_eq!(f.first.tick(), 300);
        f.first.observe_state().await;
        assert_eq!(f.first.local().deadline, Some(start_time() + Duration::seconds(30)));
        f.clock.advance(Duration::milliseconds(10_500));
        assert_eq!(f.first.tick(), 20);
    }
}
