// Flashback entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file, stdout is for the session transcript)
// 2. Load config
// 3. Open database
// 4. Import weekly stat CSVs when present
// 5. Spawn the deadline enforcement task
// 6. Create or join a room and run the session headless
// 7. Print standings and clean up
//
// Usage: flashback [solo | host | join <ROOM>] [NAME]

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use flashback_core::clock::{Clock, SystemClock};
use flashback_core::config::{self, Config};
use flashback_core::data;
use flashback_core::db::SqliteStore;
use flashback_core::settings::GameMode;
use flashback_draft::session::{DraftCommand, GameResults, Session, SessionContext, SessionEvent};

/// How this process enters a room.
#[derive(Debug, Clone, PartialEq)]
enum Role {
    Solo,
    Host,
    Join(String),
}

fn parse_args(args: &[String]) -> anyhow::Result<(Role, String)> {
    let mut rest = args.iter().skip(1);
    let role = match rest.next().map(String::as_str) {
        None | Some("solo") => Role::Solo,
        Some("host") => Role::Host,
        Some("join") => {
            let code = rest.next().context("usage: flashback join <ROOM> [NAME]")?;
            Role::Join(code.clone())
        }
        Some(other) => anyhow::bail!("unknown command {other:?}; expected solo, host, or join"),
    };
    let name = rest.next().cloned().unwrap_or_else(|| "Player".to_string());
    Ok((role, name))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    init_tracing()?;
    info!("Flashback starting up");

    let args: Vec<String> = std::env::args().collect();
    let (role, name) = parse_args(&args)?;

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: {} roster slots, {}s per pick, seasons {}-{}",
        config.game.roster_size(),
        config.game.pick_time_secs,
        config.game.year_start,
        config.game.year_end
    );

    // 3. Open database
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = SqliteStore::open(&config.db_path, clock.clone())
        .context("failed to open database")?
        .with_stale_after(config.scheduler.stale_after());
    let store = Arc::new(store);
    info!("Database opened at {}", config.db_path);

    // 4. Import weekly stats
    import_stats(&store, &config);

    // 5. Spawn deadline enforcement
    let enforcer = {
        let store = store.clone();
        let every = config.scheduler.autopick_check_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                match store.enforce_deadlines() {
                    Ok(0) => {}
                    Ok(n) => info!("Deadline sweep autopicked in {} session(s)", n),
                    Err(e) => warn!("Deadline sweep failed: {:#}", e),
                }
            }
        })
    };

    // 6. Create or join a room
    let ctx = SessionContext {
        store,
        clock,
        scheduler: config.scheduler.clone(),
    };
    let (event_tx, event_rx) = mpsc::channel(256);
    let (cmd_tx, cmd_rx) = mpsc::channel(16);

    let session = match &role {
        Role::Solo => {
            let mut settings = config.game.clone();
            settings.mode = GameMode::Solo;
            Session::create_room(ctx, settings, &name, event_tx).await
        }
        Role::Host => {
            let mut settings = config.game.clone();
            settings.mode = GameMode::Multiplayer;
            Session::create_room(ctx, settings, &name, event_tx).await
        }
        Role::Join(code) => Session::join_room(ctx, code, &name, event_tx).await,
    }
    .context("failed to enter a room")?;
    println!("Room {} ({:?}) as {}", session.room_code(), role, session.me().display_name);

    let printer = tokio::spawn(print_events(event_rx));
    let mut run = tokio::spawn(session.run(cmd_rx));

    let outcome = tokio::select! {
        joined = &mut run => joined,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, leaving the room");
            let _ = cmd_tx.send(DraftCommand::Leave).await;
            run.await
        }
    };

    // 7. Report and clean up
    match outcome.context("session task panicked")? {
        Ok(Some(results)) => print_standings(&results),
        Ok(None) => println!("Left the room."),
        Err(e) => {
            error!("Session failed: {}", e);
            println!("{e}");
        }
    }

    enforcer.abort();
    let _ = tokio::time::timeout(std::time::Duration::from_secs(2), printer).await;
    info!("Flashback shut down cleanly");
    Ok(())
}

/// Load the configured CSVs into the store. Missing files are not fatal: the
/// database may already hold earlier imports.
fn import_stats(store: &SqliteStore, config: &Config) {
    if !Path::new(&config.data_paths.player_stats).exists() {
        info!(
            "No player stats at {}; using stats already in the database",
            config.data_paths.player_stats
        );
        return;
    }
    match data::load_all_from_paths(&config.data_paths) {
        Ok(stats) => match store.import_weekly_stats(&stats) {
            Ok(n) => info!("Imported {} stat rows", n),
            Err(e) => error!("Stat import failed: {:#}", e),
        },
        Err(e) => warn!("Skipping stat import: {}", e),
    }
}

async fn print_events(mut rx: mpsc::Receiver<SessionEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            SessionEvent::Lobby { active, capacity, .. } => println!("Lobby: {active}/{capacity}"),
            SessionEvent::DraftStarted { season, week } => println!("Drafting {season} week {week}"),
            SessionEvent::TurnChanged {
                pick_number,
                is_my_turn: true,
                ..
            } => println!("Pick #{pick_number}: your turn"),
            SessionEvent::PickMade(pick) => println!(
                "  #{} {} -> {} ({})",
                pick.pick_number, pick.participant_id, pick.entry_id, pick.slot_label
            ),
            SessionEvent::PickFailed(msg) | SessionEvent::Notice(msg) => println!("! {msg}"),
            SessionEvent::PhaseChanged(phase) => info!("Phase: {:?}", phase),
            _ => {}
        }
    }
}

fn print_standings(results: &GameResults) {
    println!();
    println!("{} week {} results", results.season, results.week);
    for standing in &results.standings {
        println!(
            "{:>2}. {:<16} {:>7.2}  -{:<6.2} {:>5.1}% of optimal",
            standing.rank,
            standing.display_name,
            standing.total,
            standing.behind_leader,
            standing.pct_of_optimal
        );
    }
    println!("Optimal lineup: {:.2}", results.optimal.total);
    for slot in &results.optimal.slots {
        println!("  {:<5} {:<24} {:>6.2}", slot.label, slot.name, slot.points);
    }
}

/// Initialize tracing to log to a file.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("flashback.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("flashback=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("failed to set tracing subscriber")?;

    Ok(())
}
