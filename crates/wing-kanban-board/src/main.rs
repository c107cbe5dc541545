/*
[INPUT]:  CLI arguments, optional YAML configuration, OS shutdown signals
[OUTPUT]: Board commands against the configured task backend
[POS]:    Binary entry point
[UPDATE]: When changing CLI commands, startup flow, or shutdown handling
*/

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use wing_kanban_adapter::{Direction, TaskId};
use wing_kanban_board::{
    Board, BoardApp, BoardConfig, FeedState, LoadOutcome, SyncOutcome, TaskStore,
};

#[derive(Parser, Debug)]
#[command(name = "wing-kanban", version, about = "Three-column task board with realtime sync")]
struct Cli {
    #[arg(long = "config", value_name = "PATH", global = true)]
    config_path: Option<PathBuf>,
    /// Overrides `logging.level` from the configuration
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the board
    Board,
    /// Create a task in "To Do"
    Add { title: String },
    /// Shift a task one stage (forward|backward)
    Move { id: String, direction: Direction },
    Delete { id: String },
    /// Keep the board in sync and reprint it on every change
    Watch,
    #[command(subcommand)]
    Reminders(ReminderCommand),
    /// Write a starter configuration file
    InitConfig { output: PathBuf },
}

#[derive(Subcommand, Debug)]
enum ReminderCommand {
    List,
    Add {
        label: String,
        #[arg(long, default_value = "")]
        schedule: String,
    },
    Toggle { id: String },
    Remove { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    if let Command::InitConfig { output } = &args.command {
        return write_config_template(output);
    }

    let config = BoardConfig::load(args.config_path.as_deref()).context("load config")?;
    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    let _log_guard = init_tracing(&level, config.logging.file.as_deref())?;

    info!(
        config_path = ?args.config_path,
        backend = ?config.backend,
        "starting wing-kanban"
    );

    let app = BoardApp::from_config(config)?;

    match args.command {
        Command::Board => {
            let store = app.store();
            report_load(store.load().await);
            print_board(&store);
        }
        Command::Add { title } => {
            let store = app.store();
            store.load().await;
            match store.add_task(&title).await.context("failed to add task")? {
                Some(task) => println!("added {} \"{}\"", task.id, task.title),
                None => println!("title is blank; nothing added"),
            }
        }
        Command::Move { id, direction } => {
            let store = app.store();
            store.load().await;
            let id = TaskId::from(id);
            let outcome = store.move_task(&id, direction).await;
            report_sync(&id, outcome);
            print_board(&store);
        }
        Command::Delete { id } => {
            let store = app.store();
            store.load().await;
            let id = TaskId::from(id);
            let outcome = store.delete_task(&id).await;
            report_sync(&id, outcome);
        }
        Command::Watch => run_watch(&app).await?,
        Command::Reminders(command) => run_reminders(&app, command).await?,
        Command::InitConfig { .. } => {}
    }

    Ok(())
}

async fn run_watch(app: &BoardApp) -> Result<()> {
    let shutdown = CancellationToken::new();
    setup_signal_handlers(shutdown.clone());

    let store = app.store();
    let mut board_rx = store.subscribe();
    report_load(store.load().await);
    print_board(&store);

    let feed = app.start_change_feed();
    if feed.is_none() {
        warn!("realtime disabled; board will not refresh on remote changes");
    }
    let mut feed_rx = feed.as_ref().map(|feed| feed.state());
    let mut last_tasks = store.tasks();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            changed = board_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let tasks = board_rx.borrow_and_update().tasks.clone();
                if tasks != last_tasks {
                    last_tasks = tasks;
                    print_board(&store);
                }
            }
            Some(state) = next_feed_state(&mut feed_rx) => {
                match state {
                    FeedState::Degraded { retry_count } => {
                        warn!(retry_count, "realtime degraded; showing last loaded board");
                    }
                    other => info!(state = ?other, "change feed state"),
                }
            }
        }
    }
    info!("shutdown signal received");

    if let Some(feed) = feed {
        feed.unsubscribe().await;
        info!("change feed shutdown complete");
    }
    Ok(())
}

async fn next_feed_state(
    rx: &mut Option<tokio::sync::watch::Receiver<FeedState>>,
) -> Option<FeedState> {
    let receiver = rx.as_mut()?;
    if receiver.changed().await.is_err() {
        *rx = None;
        return None;
    }
    let state = receiver.borrow_and_update().clone();
    Some(state)
}

async fn run_reminders(app: &BoardApp, command: ReminderCommand) -> Result<()> {
    let mut reminders = app.reminders().await?;
    match command {
        ReminderCommand::List => {
            if reminders.list().is_empty() {
                println!("no reminders");
            }
            for reminder in reminders.list() {
                let mark = if reminder.enabled { "x" } else { " " };
                println!("[{mark}] {} {} ({})", reminder.id, reminder.label, reminder.schedule);
            }
        }
        ReminderCommand::Add { label, schedule } => {
            match reminders.add(&label, &schedule).await.context("save reminder")? {
                Some(reminder) => println!("added reminder {}", reminder.id),
                None => println!("label is blank; nothing added"),
            }
        }
        ReminderCommand::Toggle { id } => {
            match reminders.toggle(&id).await.context("save reminder")? {
                Some(enabled) => {
                    let label = if enabled { "enabled" } else { "disabled" };
                    println!("reminder {id} {label}");
                }
                None => println!("no reminder {id}"),
            }
        }
        ReminderCommand::Remove { id } => {
            if reminders.remove(&id).await.context("save reminder")? {
                println!("removed reminder {id}");
            } else {
                println!("no reminder {id}");
            }
        }
    }
    Ok(())
}

fn report_load(outcome: LoadOutcome) {
    match outcome {
        LoadOutcome::Snapshot => eprintln!("remote unavailable; showing last saved board"),
        LoadOutcome::Unchanged => eprintln!("remote unavailable and no saved board"),
        LoadOutcome::Remote | LoadOutcome::Coalesced => {}
    }
}

fn report_sync(id: &TaskId, outcome: SyncOutcome) {
    match outcome {
        SyncOutcome::Applied => println!("task {id} updated"),
        SyncOutcome::Unchanged => println!("task {id} unchanged"),
        SyncOutcome::Reconciled => eprintln!("task {id} could not be saved; board reloaded"),
    }
}

fn print_board(store: &TaskStore) {
    let board: Board = store.board();
    for column in &board.columns {
        println!("{} ({})", column.stage, column.tasks.len());
        for task in &column.tasks {
            println!("  {:>8}  {}", task.id, task.title);
        }
    }
    if store.is_syncing() {
        println!("(syncing)");
    }
}

fn write_config_template(output: &Path) -> Result<()> {
    let yaml = BoardConfig::template().to_yaml()?;
    std::fs::write(output, yaml)
        .with_context(|| format!("failed to write config to {}", output.display()))?;
    println!("Configuration written to: {}", output.display());
    Ok(())
}

fn init_tracing(log_level: &str, file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    let stderr_layer = fmt::layer().with_writer(std::io::stderr);

    let (file_layer, guard) = match file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let name = path
                .file_name()
                .context("log file path must name a file")?;
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|err| anyhow!(err))
        .context("initialize tracing subscriber")?;
    Ok(guard)
}

fn setup_signal_handlers(shutdown: CancellationToken) {
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install SIGINT handler");
            return;
        }
        info!("received SIGINT");
        shutdown_clone.cancel();
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let shutdown_clone = shutdown.clone();
        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                    info!("received SIGTERM");
                    shutdown_clone.cancel();
                }
                Err(err) => {
                    warn!(error = %err, "failed to install SIGTERM handler");
                }
            }
        });
    }
}
