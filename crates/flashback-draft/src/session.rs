// Session orchestration: room setup, lobby, the draft loop, and results.
//
// Phases run setup -> lobby -> draft -> scoring -> results and always follow
// the store's phase. Each running phase is one cooperative loop; leaving or a
// phase change ends the loop, which drops every interval it owned.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, info, warn};

use flashback_core::clock::Clock;
use flashback_core::config::SchedulerConfig;
use flashback_core::participant::{active_participants, Participant};
use flashback_core::roster::{DraftBoard, Pick};
use flashback_core::session::{SessionPhase, SessionState, TurnState};
use flashback_core::settings::{GameMode, GameSettings, LobbyMode};
use flashback_core::store::{DraftStore, StoreError};
use flashback_core::{EntryId, ParticipantId};
use flashback_scoring::engine::score_pool;
use flashback_scoring::lineup::{optimal_lineup, Lineup};
use flashback_scoring::ranks::weekly_ranks;
use flashback_scoring::results::{self, RosterResult, Standing};
use flashback_scoring::rules::ScoringRules;

use crate::scheduler::TurnScheduler;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No data found for that year range.")]
    NoDataForRange { year_start: u16, year_end: u16 },

    #[error("no pool entries for {season} week {week}")]
    EmptyPool { season: u16, week: u8 },

    #[error("only the host can start the draft")]
    NotHost,

    #[error("the draft never started")]
    NotStarted,

    #[error(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Setup,
    Lobby,
    Draft,
    Scoring,
    Results,
}

impl Phase {
    pub fn from_store(phase: SessionPhase) -> Self {
        match phase {
            SessionPhase::Lobby => Phase::Lobby,
            SessionPhase::Draft => Phase::Draft,
            SessionPhase::Scoring => Phase::Scoring,
            SessionPhase::Done => Phase::Results,
        }
    }
}

/// Input from whoever drives this client.
#[derive(Debug, Clone, PartialEq)]
pub enum DraftCommand {
    /// Host only, from the lobby.
    StartDraft,
    Pick { entry_id: EntryId, slot_index: usize },
    /// Pick into the first open slot for the entry's position.
    DraftEntry(EntryId),
    TogglePin(EntryId),
    Leave,
}

/// Final scoring of a finished draft.
#[derive(Debug, Clone, PartialEq)]
pub struct GameResults {
    pub season: u16,
    pub week: u8,
    pub optimal: Lineup,
    pub rosters: Vec<RosterResult>,
    pub standings: Vec<Standing>,
}

/// Pushed to the consumer as the session progresses.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    PhaseChanged(Phase),
    Lobby {
        participants: Vec<Participant>,
        active: usize,
        capacity: usize,
    },
    DraftStarted {
        season: u16,
        week: u8,
    },
    TurnChanged {
        holder: Option<ParticipantId>,
        pick_number: u32,
        is_my_turn: bool,
    },
    Countdown(u64),
    PickMade(Pick),
    PickFailed(String),
    PinToggled {
        entry_id: EntryId,
        pinned: bool,
    },
    Notice(String),
    Results(Box<GameResults>),
}

/// Shared handles a session needs.
#[derive(Clone)]
pub struct SessionContext {
    pub store: Arc<dyn DraftStore>,
    pub clock: Arc<dyn Clock>,
    pub scheduler: SchedulerConfig,
}

/// What the draft loop has already reported.
#[derive(Default)]
struct Published {
    picks: usize,
    turn: Option<(Option<ParticipantId>, u32)>,
    countdown: Option<u64>,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

pub struct Session {
    ctx: SessionContext,
    state: SessionState,
    me: Participant,
    phase: Phase,
    events: mpsc::Sender<SessionEvent>,
    autopick_seed: Option<u64>,
}

impl Session {
    /// Open a new room with the caller as host.
    pub async fn create_room(
        ctx: SessionContext,
        settings: GameSettings,
        host_name: &str,
        events: mpsc::Sender<SessionEvent>,
    ) -> Result<Self, SessionError> {
        let (state, me) = ctx.store.create_session(settings, host_name).await?;
        info!("Hosting room {} as {}", state.room_code, me.display_name);
        Ok(Self::entered(ctx, state, me, events).await)
    }

    pub async fn join_room(
        ctx: SessionContext,
        room_code: &str,
        display_name: &str,
        events: mpsc::Sender<SessionEvent>,
    ) -> Result<Self, SessionError> {
        let (state, me) = ctx.store.join_session(room_code, display_name).await?;
        info!("Joined room {} as {}", state.room_code, me.display_name);
        Ok(Self::entered(ctx, state, me, events).await)
    }

    async fn entered(
        ctx: SessionContext,
        state: SessionState,
        me: Participant,
        events: mpsc::Sender<SessionEvent>,
    ) -> Self {
        let phase = Phase::from_store(state.phase());
        let session = Self {
            ctx,
            state,
            me,
            phase,
            events,
            autopick_seed: None,
        };
        session.emit(SessionEvent::PhaseChanged(phase)).await;
        session
    }

    /// Seed the autopick fallback so runs are repeatable.
    pub fn with_autopick_seed(mut self, seed: u64) -> Self {
        self.autopick_seed = Some(seed);
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn me(&self) -> &Participant {
        &self.me
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn room_code(&self) -> &str {
        &self.state.room_code
    }

    pub fn is_host(&self) -> bool {
        self.state.host_id == self.me.id
    }

    async fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event).await;
    }

    async fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            info!("Session {}: {:?} -> {:?}", self.state.session_id, self.phase, phase);
            self.phase = phase;
            self.emit(SessionEvent::PhaseChanged(phase)).await;
        }
    }

    async fn heartbeat(&self) {
        if let Err(e) = self.ctx.store.heartbeat(self.state.session_id, self.me.id).await {
            debug!("heartbeat failed: {}", e);
        }
    }

    async fn leave(&mut self) {
        if let Err(e) = self.ctx.store.mark_left(self.state.session_id, self.me.id).await {
            debug!("leave failed: {}", e);
        }
        self.set_phase(Phase::Setup).await;
    }

    /// Run every remaining phase. Returns the results, or `None` if this
    /// client left first.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<DraftCommand>,
    ) -> Result<Option<GameResults>, SessionError> {
        loop {
            match self.phase {
                Phase::Setup => return Ok(None),
                Phase::Lobby => {
                    self.run_lobby(&mut commands).await?;
                }
                Phase::Draft => {
                    self.run_draft(&mut commands).await?;
                }
                Phase::Scoring | Phase::Results => {
                    return self.compute_results().await.map(Some);
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Lobby
    // -----------------------------------------------------------------------

    /// Pick a random week with data, check its pool, and start the draft.
    /// Fails before any turn begins if there is nothing to draft.
    pub async fn start_draft(&mut self) -> Result<TurnState, SessionError> {
        if !self.is_host() {
            return Err(SessionError::NotHost);
        }
        let settings = &self.state.settings;
        let (year_start, year_end) = (settings.year_start, settings.year_end);
        let store = self.ctx.store.clone();

        let Some((season, week)) = store.pick_random_week(year_start, year_end).await? else {
            warn!("No stat data between {} and {}", year_start, year_end);
            return Err(SessionError::NoDataForRange { year_start, year_end });
        };
        if store.get_weekly_pool(season, week).await?.is_empty() {
            return Err(SessionError::EmptyPool { season, week });
        }

        let turn = store
            .start_draft(self.state.session_id, self.me.id, season, week)
            .await?;
        match store.get_session_state(self.state.session_id).await {
            Ok(state) => self.state = state,
            Err(e) => {
                debug!("state refresh after start failed: {}", e);
                self.state.season = Some(season);
                self.state.week = Some(week);
                self.state.turn = turn.clone();
            }
        }
        self.emit(SessionEvent::DraftStarted { season, week }).await;
        self.set_phase(Phase::Draft).await;
        Ok(turn)
    }

    fn should_auto_start(&self, active: usize) -> bool {
        let s = &self.state.settings;
        let wants = s.mode == GameMode::Solo || (s.lobby_mode == LobbyMode::Fixed && s.auto_start_when_full);
        self.is_host() && wants && active >= s.effective_max_players()
    }

    /// One lobby poll. `Some` once the store has moved past the lobby.
    async fn poll_lobby(&mut self) -> Result<Option<Phase>, SessionError> {
        let state = match self.ctx.store.get_session_state(self.state.session_id).await {
            Ok(s) => s,
            Err(e) => {
                debug!("lobby poll failed: {}", e);
                return Ok(None);
            }
        };
        let phase = Phase::from_store(state.phase());
        self.state = state;
        if phase != Phase::Lobby {
            self.set_phase(phase).await;
            return Ok(Some(phase));
        }

        let participants = match self.ctx.store.list_participants(self.state.session_id).await {
            Ok(p) => p,
            Err(e) => {
                debug!("participant list unavailable: {}", e);
                return Ok(None);
            }
        };
        let now = self.ctx.clock.now();
        let active = active_participants(&participants, now, self.ctx.scheduler.stale_after()).len();
        let capacity = self.state.settings.effective_max_players();
        self.emit(SessionEvent::Lobby {
            participants,
            active,
            capacity,
        })
        .await;

        if self.should_auto_start(active) {
            info!("Room {} is full, starting the draft", self.state.room_code);
            self.start_draft().await?;
            return Ok(Some(Phase::Draft));
        }
        Ok(None)
    }

    /// Wait in the lobby until the draft starts or this client leaves.
    pub async fn run_lobby(
        &mut self,
        commands: &mut mpsc::Receiver<DraftCommand>,
    ) -> Result<Phase, SessionError> {
        let cfg = self.ctx.scheduler.clone();
        let mut poll = interval(cfg.lobby_poll_interval());
        let mut heartbeat = interval(cfg.heartbeat_interval());
        // First heartbeat after one full interval; joining already counted.
        heartbeat.tick().await;
        let mut commands_open = true;

        loop {
            tokio::select! {
                _ = poll.tick() => {
                    if let Some(phase) = self.poll_lobby().await? {
                        return Ok(phase);
                    }
                }

                _ = heartbeat.tick() => self.heartbeat().await,

                cmd = commands.recv(), if commands_open => {
                    match cmd {
                        Some(DraftCommand::StartDraft) => match self.start_draft().await {
                            Ok(_) => return Ok(Phase::Draft),
                            Err(e @ (SessionError::NoDataForRange { .. } | SessionError::EmptyPool { .. })) => {
                                return Err(e);
                            }
                            Err(e) => self.emit(SessionEvent::Notice(e.to_string())).await,
                        },
                        Some(DraftCommand::Leave) => {
                            self.leave().await;
                            return Ok(Phase::Setup);
                        }
                        Some(other) => debug!("ignoring {:?} in the lobby", other),
                        None => {
                            info!("Command channel closed");
                            commands_open = false;
                        }
                    }
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Draft
    // -----------------------------------------------------------------------

    fn new_scheduler(&self) -> TurnScheduler {
        let (store, clock) = (self.ctx.store.clone(), self.ctx.clock.clone());
        match self.autopick_seed {
            Some(seed) => TurnScheduler::seeded(store, clock, self.state.session_id, self.me.id, seed),
            None => TurnScheduler::new(store, clock, self.state.session_id, self.me.id),
        }
    }

    /// Report picks, turn changes, and countdown changes not yet sent.
    async fn publish(&mut self, scheduler: &TurnScheduler, seen: &mut Published) {
        if let Some(state) = scheduler.authoritative() {
            self.state = state.clone();
        }
        let fresh: Vec<Pick> = scheduler.picks().get(seen.picks..).unwrap_or(&[]).to_vec();
        seen.picks = scheduler.picks().len();
        for pick in fresh {
            self.emit(SessionEvent::PickMade(pick)).await;
        }

        let local = scheduler.local();
        let turn = (local.turn_holder, local.pick_number);
        if seen.turn != Some(turn) {
            seen.turn = Some(turn);
            self.emit(SessionEvent::TurnChanged {
                holder: local.turn_holder,
                pick_number: local.pick_number,
                is_my_turn: local.is_my_turn,
            })
            .await;
        }
        if seen.countdown != Some(local.remaining_secs) {
            seen.countdown = Some(local.remaining_secs);
            self.emit(SessionEvent::Countdown(local.remaining_secs)).await;
        }
    }

    /// Drive the draft until it completes or this client leaves.
    pub async fn run_draft(
        &mut self,
        commands: &mut mpsc::Receiver<DraftCommand>,
    ) -> Result<Phase, SessionError> {
        let cfg = self.ctx.scheduler.clone();
        let mut scheduler = self.new_scheduler();
        let mut seen = Published::default();

        scheduler.observe_state().await;
        self.publish(&scheduler, &mut seen).await;

        let mut poll = interval(cfg.poll_interval());
        let mut tick = interval(cfg.tick_interval());
        let mut autopick_check = interval(cfg.autopick_check_interval());
        let mut heartbeat = interval(cfg.heartbeat_interval());
        // The first tick of each completes immediately; consume them so the
        // first real work happens after one full interval.
        poll.tick().await;
        tick.tick().await;
        autopick_check.tick().await;
        heartbeat.tick().await;
        let mut commands_open = true;

        loop {
            if scheduler.phase().is_some_and(|p| p.is_draft_complete()) {
                break;
            }

            tokio::select! {
                _ = poll.tick() => {
                    scheduler.observe_state().await;
                }

                _ = tick.tick() => {
                    scheduler.tick();
                    if let Err(e) = scheduler.self_autopick_if_idle().await {
                        self.emit(SessionEvent::PickFailed(e.to_string())).await;
                    }
                }

                _ = autopick_check.tick() => {
                    if !scheduler.local().is_my_turn {
                        scheduler.trigger_autopick_if_due().await;
                    }
                }

                _ = heartbeat.tick() => self.heartbeat().await,

                cmd = commands.recv(), if commands_open => {
                    match cmd {
                        Some(DraftCommand::Pick { entry_id, slot_index }) => {
                            if let Err(e) = scheduler.submit_pick(&entry_id, slot_index).await {
                                self.emit(SessionEvent::PickFailed(e.to_string())).await;
                            }
                        }
                        Some(DraftCommand::DraftEntry(entry_id)) => {
                            if let Err(e) = scheduler.draft_entry(&entry_id).await {
                                self.emit(SessionEvent::PickFailed(e.to_string())).await;
                            }
                        }
                        Some(DraftCommand::TogglePin(entry_id)) => match scheduler.toggle_pin(&entry_id) {
                            Some(pinned) => self.emit(SessionEvent::PinToggled { entry_id, pinned }).await,
                            None => self.emit(SessionEvent::Notice(format!("{entry_id} is not in this week's pool"))).await,
                        },
                        Some(DraftCommand::Leave) => {
                            self.leave().await;
                            return Ok(Phase::Setup);
                        }
                        Some(DraftCommand::StartDraft) => debug!("draft already started"),
                        None => {
                            info!("Command channel closed");
                            commands_open = false;
                        }
                    }
                }
            }

            self.publish(&scheduler, &mut seen).await;
        }

        let phase = scheduler
            .phase()
            .map(Phase::from_store)
            .unwrap_or(Phase::Scoring);
        self.set_phase(phase).await;
        Ok(phase)
    }

    // -----------------------------------------------------------------------
    // Results
    // -----------------------------------------------------------------------

    /// Score the finished draft. The host also closes the session.
    pub async fn compute_results(&mut self) -> Result<GameResults, SessionError> {
        let store = self.ctx.store.clone();
        let state = store.get_session_state(self.state.session_id).await?;
        let (Some(season), Some(week)) = (state.season, state.week) else {
            return Err(SessionError::NotStarted);
        };

        let pool = store.get_weekly_pool(season, week).await?;
        if pool.is_empty() {
            warn!("Pool for {} wk {} is empty; every pick scores 0", season, week);
        }
        let picks = store.list_picks(state.session_id).await?;
        let participants = store.list_participants(state.session_id).await?;

        let rules = ScoringRules::for_settings(&state.settings);
        let template = state.settings.roster_template();
        let scored = score_pool(&pool, &rules);
        let ranks = weekly_ranks(&scored);
        let optimal = optimal_lineup(&scored, &template);
        let board = DraftBoard::rebuild(&template, &picks);
        let rosters = results::roster_results(&participants, &board, &template, &scored, &ranks);
        let standings = results::standings(&rosters, optimal.total);

        info!(
            "Results for {} wk {}: {} rosters, optimal lineup {:.2}",
            season,
            week,
            rosters.len(),
            optimal.total
        );

        self.state = state;
        if self.is_host() && self.state.phase() != SessionPhase::Done {
            if let Err(e) = store
                .set_phase(self.state.session_id, self.me.id, SessionPhase::Done)
                .await
            {
                debug!("failed to close session: {}", e);
            }
        }

        let results = GameResults {
            season,
            week,
            optimal,
            rosters,
            standings,
        };
        self.set_phase(Phase::Results).await;
        self.emit(SessionEvent::Results(Box::new(results.clone()))).await;
        Ok(results)
    }
}
