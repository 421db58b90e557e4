// SQLite-backed reference implementation of the draft store.
//
// Every mutation runs inside one transaction while the connection mutex is
// held, so pick acceptance and turn advancement are linearizable across all
// clients sharing the store.

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rand::rngs::StdRng;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::{Rng, SeedableRng};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::data::{WeeklyStats, REGULAR_SEASON_WEEKS};
use crate::order::TurnOrder;
use crate::participant::{Participant, DEFAULT_STALE_AFTER_SECS};
use crate::pool::{assemble_pool, Matchup, PlayerStatRecord, TeamStatRecord, WeeklyPoolEntry};
use crate::position::{normalize_team, Position, SlotLabel};
use crate::roster::{DraftBoard, Pick};
use crate::session::{SessionPhase, SessionState, TurnState};
use crate::settings::GameSettings;
use crate::store::{DraftStore, PickRequest, RejectReason, StoreError, StoreResult};
use crate::{ParticipantId, SessionId};

const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const ROOM_CODE_LEN: usize = 6;

/// SQLite-backed draft store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    clock: Arc<dyn Clock>,
    rng: Mutex<StdRng>,
    /// Participants silent for longer than this are not seated at draft start.
    stale_after: Duration,
}

impl SqliteStore {
    /// Open (or create) a store at `path` and ensure all tables exist.
    /// Pass `":memory:"` for an ephemeral database.
    pub fn open(path: &str, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        Self::open_with_rng(path, clock, StdRng::from_os_rng())
    }

    /// Like [`open`](Self::open) with a deterministic RNG for draft order,
    /// room codes, and random week selection.
    pub fn open_seeded(path: &str, clock: Arc<dyn Clock>, seed: u64) -> anyhow::Result<Self> {
        Self::open_with_rng(path, clock, StdRng::seed_from_u64(seed))
    }

    fn open_with_rng(path: &str, clock: Arc<dyn Clock>, rng: StdRng) -> anyhow::Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS sessions (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                room_code     TEXT NOT NULL UNIQUE,
                phase         TEXT NOT NULL,
                settings      TEXT NOT NULL,
                host_id       INTEGER,
                season        INTEGER,
                week          INTEGER,
                turn_holder   INTEGER,
                pick_number   INTEGER NOT NULL DEFAULT 1,
                turn_deadline TEXT,
                created_at    TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS participants (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id     INTEGER NOT NULL REFERENCES sessions(id),
                seat           INTEGER NOT NULL,
                display_name   TEXT NOT NULL,
                draft_position INTEGER,
                is_active      INTEGER NOT NULL DEFAULT 1,
                last_seen_at   TEXT,
                UNIQUE(session_id, seat)
            );

            CREATE TABLE IF NOT EXISTS picks (
                session_id     INTEGER NOT NULL REFERENCES sessions(id),
                pick_number    INTEGER NOT NULL,
                participant_id INTEGER NOT NULL REFERENCES participants(id),
                slot_index     INTEGER NOT NULL,
                slot_label     TEXT NOT NULL,
                entry_id       TEXT NOT NULL,
                auto           INTEGER NOT NULL DEFAULT 0,
                picked_at      TEXT NOT NULL,
                PRIMARY KEY (session_id, pick_number),
                UNIQUE (session_id, entry_id),
                UNIQUE (session_id, participant_id, slot_index)
            );

            CREATE TABLE IF NOT EXISTS player_week_stats (
                season      INTEGER NOT NULL,
                week        INTEGER NOT NULL,
                player_id   TEXT NOT NULL,
                player_name TEXT NOT NULL,
                position    TEXT NOT NULL,
                team        TEXT NOT NULL,
                stats       TEXT NOT NULL,
                PRIMARY KEY (season, week, player_id)
            );

            CREATE TABLE IF NOT EXISTS team_week_stats (
                season INTEGER NOT NULL,
                week   INTEGER NOT NULL,
                team   TEXT NOT NULL,
                stats  TEXT NOT NULL,
                PRIMARY KEY (season, week, team)
            );

            CREATE TABLE IF NOT EXISTS team_week_matchups (
                season     INTEGER NOT NULL,
                week       INTEGER NOT NULL,
                team       TEXT NOT NULL,
                opponent   TEXT NOT NULL,
                is_home    INTEGER NOT NULL,
                team_score REAL,
                opp_score  REAL,
                PRIMARY KEY (season, week, team)
            );
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
            clock,
            rng: Mutex::new(rng),
            stale_after: Duration::seconds(DEFAULT_STALE_AFTER_SECS),
        })
    }

    /// Override the presence window used when seating the draft order.
    pub fn with_stale_after(mut self, window: Duration) -> Self {
        self.stale_after = window;
        self
    }

    fn conn(&self) -> anyhow::Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database mutex poisoned"))
    }

    fn rng(&self) -> anyhow::Result<MutexGuard<'_, StdRng>> {
        self.rng.lock().map_err(|_| anyhow!("rng mutex poisoned"))
    }

    // -----------------------------------------------------------------------
    // Stat import
    // -----------------------------------------------------------------------

    /// Upsert imported weekly stats. Returns the number of rows written.
    /// Team codes are stored normalized so defense ids resolve on pick.
    pub fn import_weekly_stats(&self, stats: &WeeklyStats) -> anyhow::Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().context("failed to begin import transaction")?;
        let mut written = 0;

        for p in &stats.players {
            let json = serde_json::to_string(&p.stats).context("failed to serialize player stats")?;
            written += tx
                .execute(
                    "INSERT OR REPLACE INTO player_week_stats
                        (season, week, player_id, player_name, position, team, stats)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        p.season,
                        p.week,
                        p.player_id,
                        p.player_name,
                        p.position.as_str(),
                        normalize_team(&p.team),
                        json
                    ],
                )
                .context("failed to insert player stat row")?;
        }

        for t in &stats.teams {
            let json = serde_json::to_string(&t.stats).context("failed to serialize team stats")?;
            written += tx
                .execute(
                    "INSERT OR REPLACE INTO team_week_stats (season, week, team, stats)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![t.season, t.week, normalize_team(&t.team), json],
                )
                .context("failed to insert team stat row")?;
        }

        for game in &stats.games {
            for m in game.matchups() {
                written += tx
                    .execute(
                        "INSERT OR REPLACE INTO team_week_matchups
                            (season, week, team, opponent, is_home, team_score, opp_score)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                        params![
                            game.season,
                            game.week,
                            normalize_team(&m.team),
                            normalize_team(&m.opponent),
                            m.is_home,
                            m.team_score,
                            m.opp_score
                        ],
                    )
                    .context("failed to insert matchup row")?;
            }
        }

        tx.commit().context("failed to commit stat import")?;
        info!(
            "Imported {} player lines, {} defense lines, {} games",
            stats.players.len(),
            stats.teams.len(),
            stats.games.len()
        );
        Ok(written)
    }

    // -----------------------------------------------------------------------
    // Deadline backstop
    // -----------------------------------------------------------------------

    /// Autopick every drafting session whose deadline has elapsed.
    /// Returns the number of picks made.
    pub fn enforce_deadlines(&self) -> anyhow::Result<usize> {
        let ids: Vec<SessionId> = {
            let conn = self.conn()?;
            let mut stmt = conn
                .prepare("SELECT id FROM sessions WHERE phase = 'draft'")
                .context("failed to prepare drafting sessions query")?;
            let rows = stmt
                .query_map([], |r| r.get(0))
                .context("failed to query drafting sessions")?;
            rows.collect::<Result<_, _>>()
                .context("failed to read drafting sessions")?
        };

        let mut made = 0;
        for id in ids {
            match self.autopick_if_due_sync(id) {
                Ok(Some(_)) => made += 1,
                Ok(None) => {}
                Err(e) => warn!("deadline enforcement failed for session {}: {}", id, e),
            }
        }
        Ok(made)
    }

    // -----------------------------------------------------------------------
    // Synchronous cores of the trait methods
    // -----------------------------------------------------------------------

    fn submit_pick_sync(&self, session_id: SessionId, req: PickRequest) -> StoreResult<TurnState> {
        let now = self.clock.now();
        let mut conn = self.conn()?;
        let tx = conn.transaction().context("failed to begin pick transaction")?;
        let state = load_session(&tx, session_id)?;
        let next = commit_pick(&tx, &state, &req, false, now)?;
        tx.commit().context("failed to commit pick")?;
        debug!(
            "session {}: pick #{} by {} -> {} in slot {}",
            session_id, state.turn.pick_number, req.participant_id, req.entry_id, req.slot_index
        );
        Ok(next)
    }

    fn autopick_if_due_sync(&self, session_id: SessionId) -> StoreResult<Option<TurnState>> {
        let now = self.clock.now();
        let mut conn = self.conn()?;
        let tx = conn.transaction().context("failed to begin autopick transaction")?;
        let state = load_session(&tx, session_id)?;

        if state.phase() != SessionPhase::Draft || !state.turn.deadline_elapsed(now) {
            return Ok(None);
        }
        let Some(holder) = state.turn.turn_holder else {
            return Ok(None);
        };
        let (Some(season), Some(week)) = (state.season, state.week) else {
            return Ok(None);
        };

        let template = state.settings.roster_template();
        let picks = load_picks(&tx, session_id)?;
        let board = DraftBoard::rebuild(&template, &picks);
        let roster = board.roster_for(holder, &template);
        let mut pool = load_pool(&tx, season, week)?;
        pool.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));

        // First open slot (template order) with any undrafted eligible entry;
        // alphabetical by name within it.
        let choice = roster.open_slots().into_iter().find_map(|slot_index| {
            let label = template.label(slot_index)?;
            pool.iter()
                .find(|e| label.accepts(e.position) && !board.is_drafted(&e.id))
                .map(|e| PickRequest {
                    participant_id: holder,
                    entry_id: e.id.clone(),
                    slot_index,
                    slot_label: label,
                })
        });
        let Some(req) = choice else {
            warn!(
                "session {}: no legal autopick for participant {} at pick #{}",
                session_id, holder, state.turn.pick_number
            );
            return Ok(None);
        };

        let next = commit_pick(&tx, &state, &req, true, now)?;
        tx.commit().context("failed to commit autopick")?;
        info!(
            "session {}: autopicked {} for participant {} at pick #{}",
            session_id, req.entry_id, holder, state.turn.pick_number
        );
        Ok(Some(next))
    }

    fn create_session_sync(
        &self,
        settings: GameSettings,
        host_name: &str,
    ) -> StoreResult<(SessionState, Participant)> {
        settings.validate()?;
        let now = self.clock.now();
        let settings_json = serde_json::to_string(&settings).context("failed to serialize settings")?;

        let mut conn = self.conn()?;
        let tx = conn.transaction().context("failed to begin create transaction")?;

        let room_code = loop {
            let code = self.new_room_code()?;
            let taken: Option<i64> = tx
                .query_row("SELECT id FROM sessions WHERE room_code = ?1", params![code], |r| r.get(0))
                .optional()
                .context("failed to check room code")?;
            if taken.is_none() {
                break code;
            }
        };

        tx.execute(
            "INSERT INTO sessions (room_code, phase, settings, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![room_code, SessionPhase::Lobby.as_str(), settings_json, ts(now)],
        )
        .context("failed to insert session")?;
        let session_id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO participants (session_id, seat, display_name, is_active, last_seen_at)
             VALUES (?1, 1, ?2, 1, ?3)",
            params![session_id, host_name, ts(now)],
        )
        .context("failed to seat host")?;
        let host_id = tx.last_insert_rowid();

        tx.execute(
            "UPDATE sessions SET host_id = ?1 WHERE id = ?2",
            params![host_id, session_id],
        )
        .context("failed to record host")?;

        let state = load_session(&tx, session_id)?;
        let host = load_participant(&tx, host_id)?;
        tx.commit().context("failed to commit new session")?;
        info!("Created room {} (session {})", state.room_code, session_id);
        Ok((state, host))
    }

    fn join_session_sync(
        &self,
        room_code: &str,
        display_name: &str,
    ) -> StoreResult<(SessionState, Participant)> {
        let now = self.clock.now();
        let mut conn = self.conn()?;
        let tx = conn.transaction().context("failed to begin join transaction")?;

        let session_id: SessionId = tx
            .query_row(
                "SELECT id FROM sessions WHERE room_code = ?1",
                params![room_code.trim().to_uppercase()],
                |r| r.get(0),
            )
            .optional()
            .context("failed to look up room")?
            .ok_or_else(|| StoreError::NotFound(format!("room {room_code}")))?;

        let state = load_session(&tx, session_id)?;
        if state.phase() != SessionPhase::Lobby {
            return Err(StoreError::Rejected(RejectReason::NotInLobby));
        }

        let seated: usize = tx
            .query_row(
                "SELECT COUNT(*) FROM participants WHERE session_id = ?1 AND is_active = 1",
                params![session_id],
                |r| r.get::<_, i64>(0),
            )
            .context("failed to count participants")? as usize;
        if seated >= state.settings.effective_max_players() {
            return Err(StoreError::Rejected(RejectReason::RoomFull));
        }

        let next_seat: u32 = tx
            .query_row(
                "SELECT COALESCE(MAX(seat), 0) + 1 FROM participants WHERE session_id = ?1",
                params![session_id],
                |r| r.get(0),
            )
            .context("failed to compute seat")?;

        tx.execute(
            "INSERT INTO participants (session_id, seat, display_name, is_active, last_seen_at)
             VALUES (?1, ?2, ?3, 1, ?4)",
            params![session_id, next_seat, display_name, ts(now)],
        )
        .context("failed to seat participant")?;
        let participant = load_participant(&tx, tx.last_insert_rowid())?;
        tx.commit().context("failed to commit join")?;
        info!("{} joined room {} in seat {}", display_name, state.room_code, next_seat);
        Ok((state, participant))
    }

    fn pick_random_week_sync(&self, year_start: u16, year_end: u16) -> StoreResult<Option<(u16, u8)>> {
        let weeks: Vec<(u16, u8)> = {
            let conn = self.conn()?;
            let mut stmt = conn
                .prepare(
                    "SELECT DISTINCT season, week FROM player_week_stats
                     WHERE season BETWEEN ?1 AND ?2 AND week BETWEEN 1 AND ?3
                     ORDER BY season, week",
                )
                .context("failed to prepare week query")?;
            let rows = stmt
                .query_map(params![year_start, year_end, REGULAR_SEASON_WEEKS], |r| {
                    Ok((r.get(0)?, r.get(1)?))
                })
                .context("failed to query weeks")?;
            rows.collect::<Result<_, _>>().context("failed to read weeks")?
        };
        let mut rng = self.rng()?;
        Ok(weeks.choose(&mut *rng).copied())
    }

    fn start_draft_sync(
        &self,
        session_id: SessionId,
        host_id: ParticipantId,
        season: u16,
        week: u8,
    ) -> StoreResult<TurnState> {
        let now = self.clock.now();
        let mut conn = self.conn()?;
        let tx = conn.transaction().context("failed to begin start transaction")?;
        let state = load_session(&tx, session_id)?;

        if state.phase() != SessionPhase::Lobby {
            return Err(StoreError::Rejected(RejectReason::NotInLobby));
        }
        if state.host_id != host_id {
            return Err(StoreError::Rejected(RejectReason::NotHost));
        }

        // The host is starting the draft, so it is present whatever its last
        // heartbeat says.
        let mut order: Vec<ParticipantId> = load_participants(&tx, session_id)?
            .into_iter()
            .filter(|p| p.id == host_id || p.is_effectively_active(now, self.stale_after))
            .map(|p| p.id)
            .collect();
        if order.is_empty() {
            return Err(StoreError::Rejected(RejectReason::NoParticipants));
        }
        order.shuffle(&mut *self.rng()?);

        for (position, id) in order.iter().enumerate() {
            tx.execute(
                "UPDATE participants SET draft_position = ?1 WHERE id = ?2",
                params![position as i64, id],
            )
            .context("failed to assign draft position")?;
        }

        let deadline = now + Duration::seconds(state.settings.pick_time_secs as i64);
        tx.execute(
            "UPDATE sessions
             SET phase = ?1, season = ?2, week = ?3, pick_number = 1, turn_holder = ?4, turn_deadline = ?5
             WHERE id = ?6",
            params![SessionPhase::Draft.as_str(), season, week, order[0], ts(deadline), session_id],
        )
        .context("failed to start draft")?;
        tx.commit().context("failed to commit draft start")?;

        info!(
            "session {}: draft started for {} wk {} with {} participants",
            session_id,
            season,
            week,
            order.len()
        );
        Ok(TurnState {
            phase: SessionPhase::Draft,
            turn_holder: Some(order[0]),
            pick_number: 1,
            turn_deadline: Some(deadline),
        })
    }

    fn set_phase_sync(
        &self,
        session_id: SessionId,
        host_id: ParticipantId,
        phase: SessionPhase,
    ) -> StoreResult<()> {
        let conn = self.conn()?;
        let state = load_session(&conn, session_id)?;
        if state.host_id != host_id {
            return Err(StoreError::Rejected(RejectReason::NotHost));
        }
        let current = state.phase();
        if phase == current {
            return Ok(());
        }
        if phase.ordinal() < current.ordinal() {
            return Err(StoreError::Rejected(RejectReason::InvalidPhaseTransition));
        }
        conn.execute(
            "UPDATE sessions SET phase = ?1, turn_holder = NULL, turn_deadline = NULL WHERE id = ?2",
            params![phase.as_str(), session_id],
        )
        .context("failed to update phase")?;
        info!("session {}: {} -> {}", session_id, current, phase);
        Ok(())
    }

    fn new_room_code(&self) -> anyhow::Result<String> {
        let mut rng = self.rng()?;
        Ok((0..ROOM_CODE_LEN)
            .map(|_| ROOM_CODE_ALPHABET[rng.random_range(0..ROOM_CODE_ALPHABET.len())] as char)
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl DraftStore for SqliteStore {
    async fn get_session_state(&self, session_id: SessionId) -> StoreResult<SessionState> {
        load_session(&*self.conn()?, session_id)
    }

    async fn list_participants(&self, session_id: SessionId) -> StoreResult<Vec<Participant>> {
        load_participants(&*self.conn()?, session_id)
    }

    async fn list_picks(&self, session_id: SessionId) -> StoreResult<Vec<Pick>> {
        load_picks(&*self.conn()?, session_id)
    }

    async fn get_weekly_pool(&self, season: u16, week: u8) -> StoreResult<Vec<WeeklyPoolEntry>> {
        load_pool(&*self.conn()?, season, week)
    }

    async fn submit_pick(&self, session_id: SessionId, pick: PickRequest) -> StoreResult<TurnState> {
        self.submit_pick_sync(session_id, pick)
    }

    async fn autopick_if_due(&self, session_id: SessionId) -> StoreResult<Option<TurnState>> {
        self.autopick_if_due_sync(session_id)
    }

    async fn heartbeat(&self, session_id: SessionId, participant_id: ParticipantId) -> StoreResult<()> {
        let now = self.clock.now();
        self.conn()?
            .execute(
                "UPDATE participants SET last_seen_at = ?1 WHERE id = ?2 AND session_id = ?3",
                params![ts(now), participant_id, session_id],
            )
            .context("failed to record heartbeat")?;
        Ok(())
    }

    async fn mark_left(&self, session_id: SessionId, participant_id: ParticipantId) -> StoreResult<()> {
        self.conn()?
            .execute(
                "UPDATE participants SET is_active = 0 WHERE id = ?1 AND session_id = ?2",
                params![participant_id, session_id],
            )
            .context("failed to mark participant as left")?;
        Ok(())
    }

    async fn create_session(
        &self,
        settings: GameSettings,
        host_name: &str,
    ) -> StoreResult<(SessionState, Participant)> {
        self.create_session_sync(settings, host_name)
    }

    async fn join_session(
        &self,
        room_code: &str,
        display_name: &str,
    ) -> StoreResult<(SessionState, Participant)> {
        self.join_session_sync(room_code, display_name)
    }

    async fn pick_random_week(&self, year_start: u16, year_end: u16) -> StoreResult<Option<(u16, u8)>> {
        self.pick_random_week_sync(year_start, year_end)
    }

    async fn start_draft(
        &self,
        session_id: SessionId,
        host_id: ParticipantId,
        season: u16,
        week: u8,
    ) -> StoreResult<TurnState> {
        self.start_draft_sync(session_id, host_id, season, week)
    }

    async fn set_phase(
        &self,
        session_id: SessionId,
        host_id: ParticipantId,
        phase: SessionPhase,
    ) -> StoreResult<()> {
        self.set_phase_sync(session_id, host_id, phase)
    }
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_ts(s: &str) -> anyhow::Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("invalid timestamp '{s}'"))?
        .with_timezone(&Utc))
}

struct SessionRow {
    id: SessionId,
    room_code: String,
    phase: String,
    settings: String,
    host_id: Option<ParticipantId>,
    season: Option<u16>,
    week: Option<u8>,
    turn_holder: Option<ParticipantId>,
    pick_number: u32,
    turn_deadline: Option<String>,
}

impl SessionRow {
    fn into_state(self) -> anyhow::Result<SessionState> {
        let phase = SessionPhase::parse(&self.phase)
            .ok_or_else(|| anyhow!("session {} has unknown phase '{}'", self.id, self.phase))?;
        let settings: GameSettings =
            serde_json::from_str(&self.settings).context("failed to parse session settings")?;
        let turn_deadline = self.turn_deadline.as_deref().map(parse_ts).transpose()?;
        Ok(SessionState {
            session_id: self.id,
            room_code: self.room_code,
            host_id: self.host_id.unwrap_or_default(),
            settings,
            season: self.season,
            week: self.week,
            turn: TurnState {
                phase,
                turn_holder: self.turn_holder,
                pick_number: self.pick_number,
                turn_deadline,
            },
        })
    }
}

fn load_session(conn: &Connection, session_id: SessionId) -> StoreResult<SessionState> {
    let row = conn
        .query_row(
            "SELECT id, room_code, phase, settings, host_id, season, week, turn_holder, pick_number, turn_deadline
             FROM sessions WHERE id = ?1",
            params![session_id],
            |r| {
                Ok(SessionRow {
                    id: r.get(0)?,
                    room_code: r.get(1)?,
                    phase: r.get(2)?,
                    settings: r.get(3)?,
                    host_id: r.get(4)?,
                    season: r.get(5)?,
                    week: r.get(6)?,
                    turn_holder: r.get(7)?,
                    pick_number: r.get(8)?,
                    turn_deadline: r.get(9)?,
                })
            },
        )
        .optional()
        .context("failed to load session")?
        .ok_or_else(|| StoreError::NotFound(format!("session {session_id}")))?;
    Ok(row.into_state()?)
}

type ParticipantRow = (ParticipantId, u32, String, Option<u32>, bool, Option<String>);

fn participant_from_row(row: ParticipantRow) -> anyhow::Result<Participant> {
    let (id, seat, display_name, draft_position, is_active, last_seen) = row;
    Ok(Participant {
        id,
        seat,
        display_name,
        draft_position,
        is_active,
        last_seen_at: last_seen.as_deref().map(parse_ts).transpose()?,
    })
}

fn load_participant(conn: &Connection, id: ParticipantId) -> StoreResult<Participant> {
    let row: ParticipantRow = conn
        .query_row(
            "SELECT id, seat, display_name, draft_position, is_active, last_seen_at
             FROM participants WHERE id = ?1",
            params![id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?, r.get(5)?)),
        )
        .optional()
        .context("failed to load participant")?
        .ok_or_else(|| StoreError::NotFound(format!("participant {id}")))?;
    Ok(participant_from_row(row)?)
}

fn load_participants(conn: &Connection, session_id: SessionId) -> StoreResult<Vec<Participant>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, seat, display_name, draft_position, is_active, last_seen_at
             FROM participants WHERE session_id = ?1 ORDER BY seat",
        )
        .context("failed to prepare participants query")?;
    let rows: Vec<ParticipantRow> = stmt
        .query_map(params![session_id], |r| {
            Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?, r.get(5)?))
        })
        .context("failed to query participants")?
        .collect::<Result<_, _>>()
        .context("failed to read participants")?;
    Ok(rows
        .into_iter()
        .map(participant_from_row)
        .collect::<anyhow::Result<_>>()?)
}

/// Participants seated in the draft, in draft order.
fn load_draft_order(conn: &Connection, session_id: SessionId) -> StoreResult<Vec<ParticipantId>> {
    let mut stmt = conn
        .prepare(
            "SELECT id FROM participants
             WHERE session_id = ?1 AND draft_position IS NOT NULL
             ORDER BY draft_position",
        )
        .context("failed to prepare draft order query")?;
    let ids = stmt
        .query_map(params![session_id], |r| r.get(0))
        .context("failed to query draft order")?
        .collect::<Result<_, _>>()
        .context("failed to read draft order")?;
    Ok(ids)
}

type PickRow = (u32, ParticipantId, i64, String, String, bool, String);

fn load_picks(conn: &Connection, session_id: SessionId) -> StoreResult<Vec<Pick>> {
    let mut stmt = conn
        .prepare(
            "SELECT pick_number, participant_id, slot_index, slot_label, entry_id, auto, picked_at
             FROM picks WHERE session_id = ?1 ORDER BY pick_number",
        )
        .context("failed to prepare picks query")?;
    let rows: Vec<PickRow> = stmt
        .query_map(params![session_id], |r| {
            Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?, r.get(5)?, r.get(6)?))
        })
        .context("failed to query picks")?
        .collect::<Result<_, _>>()
        .context("failed to read picks")?;

    let mut picks = Vec::with_capacity(rows.len());
    for (pick_number, participant_id, slot_index, label, entry_id, auto, picked_at) in rows {
        let slot_label = SlotLabel::parse(&label)
            .ok_or_else(|| anyhow!("pick #{pick_number} has unknown slot label '{label}'"))?;
        picks.push(Pick {
            session_id,
            pick_number,
            participant_id,
            slot_index: slot_index as usize,
            slot_label,
            entry_id,
            picked_at: parse_ts(&picked_at)?,
            auto,
        });
    }
    Ok(picks)
}

fn load_pool(conn: &Connection, season: u16, week: u8) -> StoreResult<Vec<WeeklyPoolEntry>> {
    let mut stmt = conn
        .prepare(
            "SELECT player_id, player_name, position, team, stats FROM player_week_stats
             WHERE season = ?1 AND week = ?2 ORDER BY player_id",
        )
        .context("failed to prepare player pool query")?;
    let raw: Vec<(String, String, String, String, String)> = stmt
        .query_map(params![season, week], |r| {
            Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?))
        })
        .context("failed to query player pool")?
        .collect::<Result<_, _>>()
        .context("failed to read player pool")?;
    let mut players = Vec::with_capacity(raw.len());
    for (player_id, player_name, pos, team, stats) in raw {
        let Some(position) = Position::parse(&pos) else {
            warn!("skipping pool row {} with unknown position '{}'", player_id, pos);
            continue;
        };
        players.push(PlayerStatRecord {
            season,
            week,
            player_id,
            player_name,
            position,
            team,
            stats: serde_json::from_str(&stats).context("failed to parse player stats")?,
        });
    }

    let mut stmt = conn
        .prepare("SELECT team, stats FROM team_week_stats WHERE season = ?1 AND week = ?2 ORDER BY team")
        .context("failed to prepare defense pool query")?;
    let raw: Vec<(String, String)> = stmt
        .query_map(params![season, week], |r| Ok((r.get(0)?, r.get(1)?)))
        .context("failed to query defense pool")?
        .collect::<Result<_, _>>()
        .context("failed to read defense pool")?;
    let mut teams = Vec::with_capacity(raw.len());
    for (team, stats) in raw {
        teams.push(TeamStatRecord {
            season,
            week,
            team,
            stats: serde_json::from_str(&stats).context("failed to parse team stats")?,
        });
    }

    let mut stmt = conn
        .prepare(
            "SELECT team, opponent, is_home, team_score, opp_score FROM team_week_matchups
             WHERE season = ?1 AND week = ?2",
        )
        .context("failed to prepare matchup query")?;
    let matchups: Vec<Matchup> = stmt
        .query_map(params![season, week], |r| {
            Ok(Matchup {
                team: r.get(0)?,
                opponent: r.get(1)?,
                is_home: r.get(2)?,
                team_score: r.get(3)?,
                opp_score: r.get(4)?,
            })
        })
        .context("failed to query matchups")?
        .collect::<Result<_, _>>()
        .context("failed to read matchups")?;

    Ok(assemble_pool(players, teams, matchups))
}

/// Position of `entry_id` in the given week's pool, if present.
fn entry_position(conn: &Connection, season: u16, week: u8, entry_id: &str) -> StoreResult<Option<Position>> {
    if let Some(team) = entry_id.strip_prefix("DST_") {
        // Rows written before import normalization may carry raw codes.
        let mut stmt = conn
            .prepare("SELECT team FROM team_week_stats WHERE season = ?1 AND week = ?2")
            .context("failed to prepare defense lookup")?;
        let teams: Vec<String> = stmt
            .query_map(params![season, week], |r| r.get(0))
            .context("failed to look up defense")?
            .collect::<Result<_, _>>()
            .context("failed to read defenses")?;
        let found = teams.iter().any(|t| normalize_team(t) == team);
        return Ok(found.then_some(Position::Dst));
    }
    let pos: Option<String> = conn
        .query_row(
            "SELECT position FROM player_week_stats WHERE season = ?1 AND week = ?2 AND player_id = ?3",
            params![season, week, entry_id],
            |r| r.get(0),
        )
        .optional()
        .context("failed to look up player")?;
    Ok(pos.as_deref().and_then(Position::parse))
}

/// Validate `req` against the current state and commit it, advancing the
/// turn. Must run inside the caller's transaction.
fn commit_pick(
    conn: &Connection,
    state: &SessionState,
    req: &PickRequest,
    auto: bool,
    now: DateTime<Utc>,
) -> StoreResult<TurnState> {
    let reject = |r| Err(StoreError::Rejected(r));

    if state.phase() != SessionPhase::Draft {
        return reject(RejectReason::NotDrafting);
    }
    if state.turn.turn_holder != Some(req.participant_id) {
        return reject(RejectReason::NotYourTurn);
    }
    let (Some(season), Some(week)) = (state.season, state.week) else {
        return reject(RejectReason::NotDrafting);
    };

    let template = state.settings.roster_template();
    let Some(label) = template.label(req.slot_index) else {
        return reject(RejectReason::SlotOutOfRange);
    };
    if label != req.slot_label {
        return reject(RejectReason::SlotMismatch);
    }

    let slot_taken: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM picks WHERE session_id = ?1 AND participant_id = ?2 AND slot_index = ?3",
            params![state.session_id, req.participant_id, req.slot_index as i64],
            |r| r.get(0),
        )
        .optional()
        .context("failed to check slot")?;
    if slot_taken.is_some() {
        return reject(RejectReason::SlotFilled);
    }

    let Some(position) = entry_position(conn, season, week, &req.entry_id)? else {
        return reject(RejectReason::UnknownEntry);
    };
    if !label.accepts(position) {
        return reject(RejectReason::IneligiblePosition);
    }

    let drafted: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM picks WHERE session_id = ?1 AND entry_id = ?2",
            params![state.session_id, req.entry_id],
            |r| r.get(0),
        )
        .optional()
        .context("failed to check drafted entries")?;
    if drafted.is_some() {
        return reject(RejectReason::AlreadyDrafted);
    }

    let pick_number = state.turn.pick_number;
    conn.execute(
        "INSERT INTO picks (session_id, pick_number, participant_id, slot_index, slot_label, entry_id, auto, picked_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            state.session_id,
            pick_number,
            req.participant_id,
            req.slot_index as i64,
            label.as_str(),
            req.entry_id,
            auto,
            ts(now),
        ],
    )
    .context("failed to insert pick")?;

    let order = load_draft_order(conn, state.session_id)?;
    let total_picks = template.len() * order.len();
    let next_pick = pick_number + 1;

    let next = if pick_number as usize >= total_picks {
        TurnState {
            phase: SessionPhase::Scoring,
            turn_holder: None,
            pick_number: next_pick,
            turn_deadline: None,
        }
    } else {
        let turn_order = TurnOrder::for_participants(order.len(), state.settings.snake_draft);
        TurnState {
            phase: SessionPhase::Draft,
            turn_holder: turn_order.holder(&order, next_pick),
            pick_number: next_pick,
            turn_deadline: Some(now + Duration::seconds(state.settings.pick_time_secs as i64)),
        }
    };

    conn.execute(
        "UPDATE sessions SET phase = ?1, turn_holder = ?2, pick_number = ?3, turn_deadline = ?4 WHERE id = ?5",
        params![
            next.phase.as_str(),
            next.turn_holder,
            next.pick_number,
            next.turn_deadline.map(ts),
            state.session_id,
        ],
    )
    .context("failed to advance turn")?;

    if next.phase == SessionPhase::Scoring {
        info!("session {}: draft complete after {} picks", state.session_id, pick_number);
    }
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::pool::{PlayerWeekStats, ScheduledGame, TeamWeekStats};
    use chrono::TimeZone;

    fn start_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 8, 17, 0, 0).unwrap()
    }

    fn player(id: &str, name: &str, pos: Position, team: &str) -> PlayerStatRecord {
        PlayerStatRecord {
            season: 2023,
            week: 5,
            player_id: id.into(),
            player_name: name.into(),
            position: pos,
            team: team.into(),
            stats: PlayerWeekStats {
                rushing_yards: 50.0,
                ..Default::default()
            },
        }
    }

    fn sample_week() -> WeeklyStats {
        WeeklyStats {
            players: vec![
                player("qb1", "Alpha QB", Position::Qb, "KC"),
                player("qb2", "Bravo QB", Position::Qb, "SF"),
                player("rb1", "Alpha RB", Position::Rb, "KC"),
                player("rb2", "Bravo RB", Position::Rb, "SF"),
                player("rb3", "Charlie RB", Position::Rb, "KC"),
                player("wr1", "Alpha WR", Position::Wr, "SF"),
                player("wr2", "Bravo WR", Position::Wr, "KC"),
            ],
            teams: vec![
                TeamStatRecord {
                    season: 2023,
                    week: 5,
                    team: "KC".into(),
                    stats: TeamWeekStats::default(),
                },
                TeamStatRecord {
                    season: 2023,
                    week: 5,
                    team: "SF".into(),
                    stats: TeamWeekStats::default(),
                },
            ],
            games: vec![ScheduledGame {
                season: 2023,
                week: 5,
                home_team: "KC".into(),
                away_team: "SF".into(),
                home_score: 24.0,
                away_score: 17.0,
            }],
        }
    }

    /// QB, RB, FLEX, DST.
    fn small_settings() -> GameSettings {
        GameSettings {
            qb_slots: 1,
            rb_slots: 1,
            wr_slots: 0,
            te_slots: 0,
            flex_slots: 1,
            k_slots: 0,
            dst_slots: 1,
            ..Default::default()
        }
    }

    struct Fixture {
        store: SqliteStore,
        clock: Arc<ManualClock>,
        session: SessionId,
        host: ParticipantId,
        guest: ParticipantId,
    }

    async fn drafting_pair() -> Fixture {
        let clock = Arc::new(ManualClock::new(start_time()));
        let store = SqliteStore::open_seeded(":memory:", clock.clone(), 7).unwrap();
        store.import_weekly_stats(&sample_week()).unwrap();
        let (state, host) = store.create_session(small_settings(), "Host").await.unwrap();
        let (_, guest) = store.join_session(&state.room_code, "Guest").await.unwrap();
        store
            .start_draft(state.session_id, host.id, 2023, 5)
            .await
            .unwrap();
        Fixture {
            store,
            clock,
            session: state.session_id,
            host: host.id,
            guest: guest.id,
        }
    }

    fn req(participant: ParticipantId, entry: &str, slot: usize, label: SlotLabel) -> PickRequest {
        PickRequest {
            participant_id: participant,
            entry_id: entry.into(),
            slot_index: slot,
            slot_label: label,
        }
    }

    async fn holder(f: &Fixture) -> ParticipantId {
        f.store
            .get_session_state(f.session)
            .await
            .unwrap()
            .turn
            .turn_holder
            .unwrap()
    }

    #[test]
    fn open_creates_tables() {
        let store = SqliteStore::open(":memory:", Arc::new(ManualClock::new(start_time()))).unwrap();
        let conn = store.conn().unwrap();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap()
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        for t in ["participants", "picks", "player_week_stats", "sessions", "team_week_matchups", "team_week_stats"] {
            assert!(tables.contains(&t.to_string()), "missing table {t}");
        }
    }

    #[tokio::test]
    async fn create_and_join_seat_participants() {
        let clock = Arc::new(ManualClock::new(start_time()));
        let store = SqliteStore::open_seeded(":memory:", clock, 1).unwrap();
        let (state, host) = store.create_session(GameSettings::default(), "Host").await.unwrap();
        assert_eq!(state.phase(), SessionPhase::Lobby);
        assert_eq!(state.room_code.len(), ROOM_CODE_LEN);
        assert_eq!(state.host_id, host.id);
        assert!(host.is_host());

        let (_, guest) = store
            .join_session(&state.room_code.to_lowercase(), "Guest")
            .await
            .unwrap();
        assert_eq!(guest.seat, 2);

        // Default capacity is two.
        let err = store.join_session(&state.room_code, "Third").await.unwrap_err();
        assert!(matches!(err, StoreError::Rejected(RejectReason::RoomFull)));

        let err = store.join_session("NOPE00", "X").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn create_rejects_invalid_settings() {
        let store = SqliteStore::open(":memory:", Arc::new(ManualClock::new(start_time()))).unwrap();
        let bad = GameSettings {
            pick_time_secs: 0,
            ..Default::default()
        };
        let err = store.create_session(bad, "Host").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidSettings(_)));
    }

    #[tokio::test]
    async fn start_draft_puts_first_pick_on_the_clock() {
        let f = drafting_pair().await;
        let state = f.store.get_session_state(f.session).await.unwrap();
        assert_eq!(state.phase(), SessionPhase::Draft);
        assert_eq!(state.turn.pick_number, 1);
        assert_eq!(state.season, Some(2023));
        assert_eq!(state.week, Some(5));
        assert_eq!(state.turn.turn_deadline, Some(start_time() + Duration::seconds(30)));
        let first = state.turn.turn_holder.unwrap();
        assert!(first == f.host || first == f.guest);

        let participants = f.store.list_participants(f.session).await.unwrap();
        let mut positions: Vec<u32> = participants.iter().filter_map(|p| p.draft_position).collect();
        positions.sort();
        assert_eq!(positions, vec![0, 1]);
    }

    #[tokio::test]
    async fn only_host_can_start() {
        let clock = Arc::new(ManualClock::new(start_time()));
        let store = SqliteStore::open_seeded(":memory:", clock, 3).unwrap();
        let (state, _host) = store.create_session(small_settings(), "Host").await.unwrap();
        let (_, guest) = store.join_session(&state.room_code, "Guest").await.unwrap();
        let err = store
            .start_draft(state.session_id, guest.id, 2023, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Rejected(RejectReason::NotHost)));
    }

    #[tokio::test]
    async fn accepted_pick_advances_turn_by_one() {
        let f = drafting_pair().await;
        let first = holder(&f).await;
        f.clock.advance(Duration::seconds(4));

        let next = f
            .store
            .submit_pick(f.session, req(first, "qb1", 0, SlotLabel::Qb))
            .await
            .unwrap();
        assert_eq!(next.pick_number, 2);
        assert_ne!(next.turn_holder, Some(first));
        assert_eq!(next.turn_deadline, Some(start_time() + Duration::seconds(34)));

        let picks = f.store.list_picks(f.session).await.unwrap();
        assert_eq!(picks.len(), 1);
        assert_eq!(picks[0].entry_id, "qb1");
        assert!(!picks[0].auto);
    }

    #[tokio::test]
    async fn pick_rejections() {
        let f = drafting_pair().await;
        let first = holder(&f).await;
        let second = if first == f.host { f.guest } else { f.host };

        let cases = [
            (req(second, "qb1", 0, SlotLabel::Qb), RejectReason::NotYourTurn),
            (req(first, "qb1", 9, SlotLabel::Qb), RejectReason::SlotOutOfRange),
            (req(first, "qb1", 1, SlotLabel::Qb), RejectReason::SlotMismatch),
            (req(first, "qb1", 2, SlotLabel::Flex), RejectReason::IneligiblePosition),
            (req(first, "nobody", 0, SlotLabel::Qb), RejectReason::UnknownEntry),
            (req(first, "DST_NYJ", 3, SlotLabel::Dst), RejectReason::UnknownEntry),
        ];
        for (request, expected) in cases {
            match f.store.submit_pick(f.session, request).await {
                Err(StoreError::Rejected(reason)) => assert_eq!(reason, expected),
                other => panic!("expected {expected:?}, got {other:?}"),
            }
        }

        f.store
            .submit_pick(f.session, req(first, "rb1", 2, SlotLabel::Flex))
            .await
            .unwrap();
        let err = f
            .store
            .submit_pick(f.session, req(second, "rb1", 1, SlotLabel::Rb))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Rejected(RejectReason::AlreadyDrafted)));

        f.store
            .submit_pick(f.session, req(second, "rb2", 1, SlotLabel::Rb))
            .await
            .unwrap();
        let err = f
            .store
            .submit_pick(f.session, req(first, "rb3", 2, SlotLabel::Flex))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Rejected(RejectReason::SlotFilled)));
    }

    #[tokio::test]
    async fn racing_submissions_commit_exactly_one() {
        let f = drafting_pair().await;
        let first = holder(&f).await;
        let a = f.store.submit_pick(f.session, req(first, "qb1", 0, SlotLabel::Qb));
        let b = f.store.submit_pick(f.session, req(first, "qb2", 0, SlotLabel::Qb));
        let (a, b) = tokio::join!(a, b);
        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
        assert_eq!(f.store.list_picks(f.session).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn autopick_waits_for_deadline_and_is_idempotent() {
        let f = drafting_pair().await;
        let first = holder(&f).await;

        f.clock.advance(Duration::seconds(30));
        assert_eq!(f.store.autopick_if_due(f.session).await.unwrap(), None);

        f.clock.advance(Duration::milliseconds(1));
        let next = f.store.autopick_if_due(f.session).await.unwrap().unwrap();
        assert_eq!(next.pick_number, 2);

        // Second call in the same instant: the new deadline has not elapsed.
        assert_eq!(f.store.autopick_if_due(f.session).await.unwrap(), None);

        let picks = f.store.list_picks(f.session).await.unwrap();
        assert_eq!(picks.len(), 1);
        assert!(picks[0].auto);
        assert_eq!(picks[0].participant_id, first);
        // First open slot is QB; "Alpha QB" sorts first.
        assert_eq!(picks[0].entry_id, "qb1");
        assert_eq!(picks[0].slot_index, 0);
    }

    #[tokio::test]
    async fn full_draft_moves_to_scoring() {
        let f = drafting_pair().await;
        let mut turns = 0;
        loop {
            let state = f.store.get_session_state(f.session).await.unwrap();
            if state.phase() != SessionPhase::Draft {
                break;
            }
            f.clock.advance(Duration::seconds(31));
            assert_eq!(f.store.enforce_deadlines().unwrap(), 1);
            turns += 1;
            assert!(turns <= 8, "draft did not finish");
        }
        assert_eq!(turns, 8);

        let state = f.store.get_session_state(f.session).await.unwrap();
        assert_eq!(state.phase(), SessionPhase::Scoring);
        assert_eq!(state.turn.turn_holder, None);

        let picks = f.store.list_picks(f.session).await.unwrap();
        let numbers: Vec<u32> = picks.iter().map(|p| p.pick_number).collect();
        assert_eq!(numbers, (1..=8).collect::<Vec<_>>());
        let distinct: std::collections::HashSet<&str> =
            picks.iter().map(|p| p.entry_id.as_str()).collect();
        assert_eq!(distinct.len(), 8);

        // Two participants alternate.
        for pair in picks.windows(2) {
            assert_ne!(pair[0].participant_id, pair[1].participant_id);
        }
    }

    #[tokio::test]
    async fn pick_random_week_respects_range() {
        let clock = Arc::new(ManualClock::new(start_time()));
        let store = SqliteStore::open_seeded(":memory:", clock, 11).unwrap();
        assert_eq!(store.pick_random_week(2010, 2025).await.unwrap(), None);

        store.import_weekly_stats(&sample_week()).unwrap();
        assert_eq!(store.pick_random_week(2010, 2025).await.unwrap(), Some((2023, 5)));
        assert_eq!(store.pick_random_week(2010, 2020).await.unwrap(), None);
    }

    #[tokio::test]
    async fn weekly_pool_includes_defenses_with_matchups() {
        let clock = Arc::new(ManualClock::new(start_time()));
        let store = SqliteStore::open(":memory:", clock).unwrap();
        store.import_weekly_stats(&sample_week()).unwrap();
        let pool = store.get_weekly_pool(2023, 5).await.unwrap();
        assert_eq!(pool.len(), 9);
        let sf = pool.iter().find(|e| e.id == "DST_SF").unwrap();
        assert_eq!(sf.name, "SF Defense");
        assert_eq!(sf.matchup.as_ref().and_then(|m| m.opp_score), Some(24.0));
        assert!(store.get_weekly_pool(2023, 6).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn raw_team_codes_still_draft_as_defenses() {
        let clock = Arc::new(ManualClock::new(start_time()));
        let store = SqliteStore::open_seeded(":memory:", clock.clone(), 3).unwrap();
        let mut week = sample_week();
        week.teams[0].team = "la".into();
        week.games[0].home_team = "la".into();
        store.import_weekly_stats(&week).unwrap();

        let pool = store.get_weekly_pool(2023, 5).await.unwrap();
        let lar = pool.iter().find(|e| e.id == "DST_LAR").unwrap();
        assert_eq!(lar.matchup.as_ref().and_then(|m| m.opp_score), Some(17.0));

        let settings = GameSettings {
            qb_slots: 0,
            rb_slots: 0,
            wr_slots: 0,
            te_slots: 0,
            flex_slots: 0,
            k_slots: 0,
            dst_slots: 2,
            mode: crate::settings::GameMode::Solo,
            max_players: 1,
            ..Default::default()
        };
        let (state, solo) = store.create_session(settings, "Solo").await.unwrap();
        store.start_draft(state.session_id, solo.id, 2023, 5).await.unwrap();

        let next = store
            .submit_pick(state.session_id, req(solo.id, "DST_LAR", 0, SlotLabel::Dst))
            .await
            .unwrap();
        assert_eq!(next.pick_number, 2);

        // The backstop finishes the draft with the other defense.
        clock.advance(Duration::seconds(31));
        assert_eq!(store.enforce_deadlines().unwrap(), 1);
        let picks = store.list_picks(state.session_id).await.unwrap();
        let entries: Vec<&str> = picks.iter().map(|p| p.entry_id.as_str()).collect();
        assert_eq!(entries, vec!["DST_LAR", "DST_SF"]);
        let state = store.get_session_state(state.session_id).await.unwrap();
        assert_eq!(state.phase(), SessionPhase::Scoring);
    }

    #[tokio::test]
    async fn stale_participants_are_not_seated() {
        let clock = Arc::new(ManualClock::new(start_time()));
        let store = SqliteStore::open_seeded(":memory:", clock.clone(), 5).unwrap();
        store.import_weekly_stats(&sample_week()).unwrap();
        let settings = GameSettings {
            max_players: 3,
            ..small_settings()
        };
        let (state, host) = store.create_session(settings, "Host").await.unwrap();
        let (_, idle) = store.join_session(&state.room_code, "Idle").await.unwrap();

        clock.advance(Duration::seconds(120));
        let (_, late) = store.join_session(&state.room_code, "Late").await.unwrap();
        store
            .start_draft(state.session_id, host.id, 2023, 5)
            .await
            .unwrap();

        let participants = store.list_participants(state.session_id).await.unwrap();
        let seat = |id| participants.iter().find(|p| p.id == id).unwrap().draft_position;
        // The host never heartbeated but is the one starting the draft.
        assert!(seat(host.id).is_some());
        assert!(seat(late.id).is_some());
        assert_eq!(seat(idle.id), None);
    }

    #[tokio::test]
    async fn phases_only_move_forward() {
        let f = drafting_pair().await;
        let err = f
            .store
            .set_phase(f.session, f.host, SessionPhase::Lobby)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Rejected(RejectReason::InvalidPhaseTransition)));
        let err = f
            .store
            .set_phase(f.session, f.guest, SessionPhase::Done)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Rejected(RejectReason::NotHost)));
        f.store
            .set_phase(f.session, f.host, SessionPhase::Done)
            .await
            .unwrap();
        let state = f.store.get_session_state(f.session).await.unwrap();
        assert_eq!(state.phase(), SessionPhase::Done);
    }

    #[tokio::test]
    async fn heartbeat_and_leave_update_presence() {
        let f = drafting_pair().await;
        f.clock.advance(Duration::seconds(45));
        f.store.heartbeat(f.session, f.guest).await.unwrap();
        f.store.mark_left(f.session, f.host).await.unwrap();

        let participants = f.store.list_participants(f.session).await.unwrap();
        let guest = participants.iter().find(|p| p.id == f.guest).unwrap();
        let host = participants.iter().find(|p| p.id == f.host).unwrap();
        assert_eq!(guest.last_seen_at, Some(start_time() + Duration::seconds(45)));
        assert!(!host.is_active);
    }
}
