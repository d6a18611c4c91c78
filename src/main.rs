//! Reflex binary entrypoint: a line-oriented terminal driver for the reaction game.

use std::{future::Future, sync::Arc};

use reflex_back::{
    config::AppConfig,
    dao::player_store::FilePlayerStore,
    error::ServiceError,
    state::{LoadedStore, PlayerRecord, PlayerStore, Session, SubmitOutcome, TrialEngine, TrialEvent},
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HELP: &str = "\
commands:
  start                 arm a new trial
  <enter> | go          react (too early fails the trial)
  select <name>         play as <name>
  add <name>            create a player
  remove <name>         delete a player
  rename <old> -> <new> rename a player
  list                  show players and best times
  abort                 abandon the running trial
  save                  write players to disk
  help                  show this text
  quit                  save and exit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let repository = Arc::new(FilePlayerStore::new(config.store_config()));
    info!(path = %repository.path().display(), "using player file");

    let LoadedStore { store, restored } =
        PlayerStore::load(repository.as_ref(), config.default_player()).await;
    if !restored {
        println!("No saved players found; starting fresh.");
    }

    let engine = TrialEngine::with_delay_range(config.delay_range());
    let mut session = Session::new(store, repository, engine);
    select_initial_player(&mut session, config.default_player());

    tokio::spawn(print_events(session.subscribe()));
    println!("{HELP}");

    run_session(
        &mut session,
        BufReader::new(tokio::io::stdin()),
        shutdown_signal(),
    )
    .await;
    Ok(())
}

/// Feed input lines to the session until `quit`, end of input, an unreadable
/// line or `shutdown`, then make the final save attempt.
async fn run_session<R, S>(session: &mut Session, input: R, shutdown: S)
where
    R: AsyncBufRead + Unpin,
    S: Future<Output = ()>,
{
    let mut lines = input.lines();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if run_command(session, Command::parse(&line)).await == Flow::Quit {
                        break;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    warn!(error = %err, "failed to read input; shutting down");
                    break;
                }
            },
            _ = &mut shutdown => break,
        }
    }

    if let Err(err) = session.shutdown().await {
        println!("Warning: players could not be saved ({err}); recent results may be lost.");
    }
}

/// Commands understood by the terminal driver.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Start,
    Input,
    Select(String),
    Add(String),
    Remove(String),
    Rename { old: String, new: String },
    List,
    Abort,
    Save,
    Help,
    Quit,
    Unknown(String),
}

impl Command {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        match (verb.to_ascii_lowercase().as_str(), rest) {
            ("" | "go", "") => Command::Input,
            ("start", "") => Command::Start,
            ("list", "") => Command::List,
            ("abort", "") => Command::Abort,
            ("save", "") => Command::Save,
            ("help" | "?", "") => Command::Help,
            ("quit" | "exit", "") => Command::Quit,
            ("select", name) if !name.is_empty() => Command::Select(name.to_owned()),
            ("add", name) if !name.is_empty() => Command::Add(name.to_owned()),
            ("remove", name) if !name.is_empty() => Command::Remove(name.to_owned()),
            ("rename", args) => match args.split_once("->") {
                Some((old, new)) if !old.trim().is_empty() => Command::Rename {
                    old: old.trim().to_owned(),
                    new: new.trim().to_owned(),
                },
                _ => Command::Unknown(line.to_owned()),
            },
            _ => Command::Unknown(line.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

async fn run_command(session: &mut Session, command: Command) -> Flow {
    let result = match command {
        Command::Start => session.start_trial().map(|_| ()),
        Command::Input => session.submit_input().map(|outcome| {
            if let SubmitOutcome::Completed(outcome) = outcome {
                info!(
                    elapsed_secs = outcome.elapsed_secs,
                    is_new_best = outcome.is_new_best,
                    "trial recorded"
                );
            }
        }),
        Command::Select(name) => session.select_player(&name).map(|player| {
            println!("Playing as {}.", describe(player));
        }),
        Command::Add(name) => session
            .add_player(&name)
            .map(|name| println!("Added {name}.")),
        Command::Remove(name) => session
            .remove_player(&name)
            .map(|removed| println!("Removed {}.", removed.name())),
        Command::Rename { old, new } => session
            .rename_player(&old, &new)
            .map(|()| println!("Renamed {old} to {new}.")),
        Command::List => {
            print_players(session);
            Ok(())
        }
        Command::Abort => {
            session.abort_trial();
            Ok(())
        }
        Command::Save => session.save().await.map(|()| println!("Players saved.")),
        Command::Help => {
            println!("{HELP}");
            Ok(())
        }
        Command::Quit => return Flow::Quit,
        Command::Unknown(line) => {
            println!("Unknown command `{line}`; type `help`.");
            Ok(())
        }
    };

    if let Err(err) = result {
        report(&err);
    }
    Flow::Continue
}

fn select_initial_player(session: &mut Session, default_player: &str) {
    let name = if session.store().contains(default_player) {
        Some(default_player.to_owned())
    } else {
        session.players().next().map(|player| player.name().to_owned())
    };

    match name {
        Some(name) => {
            if let Ok(player) = session.select_player(&name) {
                println!("Playing as {}.", describe(player));
            }
        }
        None => println!("No players yet; `add <name>` then `select <name>`."),
    }
}

/// Render engine events for the player.
async fn print_events(mut events: broadcast::Receiver<TrialEvent>) {
    loop {
        match events.recv().await {
            Ok(TrialEvent::Armed { .. }) => println!("Get ready... press Enter when you see GO!"),
            Ok(TrialEvent::Signaled) => println!(">>> GO! <<<"),
            Ok(TrialEvent::Failed) => println!("Too early! Type `start` to try again."),
            Ok(TrialEvent::Completed {
                elapsed_secs,
                is_new_best,
            }) => {
                let best = if is_new_best { "  New best!" } else { "" };
                println!("Reaction time: {}{best}", format_seconds(elapsed_secs));
            }
            Ok(TrialEvent::Reset) => println!("Trial abandoned."),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "event printer lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}

fn print_players(session: &Session) {
    let selected = session.selected_player().map(PlayerRecord::name);
    for player in session.players() {
        let marker = if Some(player.name()) == selected { '*' } else { ' ' };
        println!("{marker} {}", describe(player));
    }
}

fn describe(player: &PlayerRecord) -> String {
    match player.best_time() {
        Some(best) => format!(
            "{} (best {}, {} attempts)",
            player.name(),
            format_seconds(best),
            player.attempts()
        ),
        None => format!("{} (no completed trials)", player.name()),
    }
}

fn report(err: &ServiceError) {
    match err {
        ServiceError::Storage(source) => {
            println!("Warning: {err} ({source}); recent results may be lost.")
        }
        _ => println!("{err}"),
    }
}

/// Seconds rounded to three decimals.
fn format_seconds(secs: f64) -> String {
    format!("{secs:.3} s")
}

/// Configure tracing on stderr so stdout stays with the game.
fn init_tracing() {
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
