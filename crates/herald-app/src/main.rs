//! Herald interactive console.
//!
//! Reads one command per line from stdin and dispatches it as the console
//! operator. `as <name> <command>` runs a command as a simulated player,
//! `?<partial>` lists completions, and `quit` exits.
//!
//! The dispatcher config is read from the first CLI argument or the
//! `HERALD_CONFIG` env var; without either the defaults are used.

mod commands;
mod host;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use herald_dispatch::{CommandManager, DispatchConfig, DispatchOutcome, HostTranslator};
use herald_platform::{HostServices, MemoryHost};

use host::{ConsoleEntities, ConsoleSender};

type Manager = CommandManager<HostTranslator<ConsoleEntities>>;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args()
        .nth(1)
        .or_else(|| std::env::var("HERALD_CONFIG").ok())
    {
        Some(path) => {
            let path = PathBuf::from(path);
            log::info!("Loading config from {}", path.display());
            DispatchConfig::load(&path)?
        },
        None => DispatchConfig::default(),
    };

    let host = Arc::new(MemoryHost::echoing());
    let translator = HostTranslator::new(
        ConsoleEntities,
        HostServices::from_host(Arc::clone(&host)),
    );
    let manager = CommandManager::builder(translator).config(config).build()?;

    let help = commands::register_demo_commands(&manager, &host)?;
    manager.lock_registration();
    log::info!(
        "Registered {} commands on {} workers",
        help.get().map_or(0, Vec::len),
        manager.worker_threads(),
    );
    log::debug!("Leaf permissions: {:?}", manager.collect_leaf_permissions());

    let result = run_console(&manager, &host);
    manager.shutdown();
    log::info!("Console closed");
    result
}

fn run_console(manager: &Manager, host: &MemoryHost) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim_end_matches(['\r', '\n']);
        if matches!(line.trim(), "quit" | "exit") {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        let (sender, input) = split_sender(line);
        if let Some(partial) = input.strip_prefix('?') {
            match manager.suggest(partial, sender).wait() {
                Ok(suggestions) if suggestions.is_empty() => println!("(no suggestions)"),
                Ok(suggestions) => println!("{}", suggestions.join("  ")),
                Err(e) => log::warn!("Suggestions failed: {e}"),
            }
        } else {
            match manager.dispatch(input, sender).wait() {
                Ok(DispatchOutcome::Executed) => log::debug!("Executed '{input}'"),
                Ok(outcome) => log::debug!("'{input}': {outcome:?}"),
                // Already reported to the sender by the exception funnel.
                Err(e) => log::debug!("'{input}' failed: {e}"),
            }
        }
        // Messages were echoed on delivery.
        host.clear();
    }
    Ok(())
}

/// Split `as <name> <command>` into a simulated player and the command.
fn split_sender(line: &str) -> (ConsoleSender, &str) {
    if let Some(rest) = line.strip_prefix("as ")
        && let Some((name, input)) = rest.trim_start().split_once(' ')
        && !name.is_empty()
    {
        return (ConsoleSender::player(name), input.trim_start());
    }
    (ConsoleSender::Operator, line)
}
