#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! `fleet` — the small outer launcher (spec §6 "CLI surface"). Built with
//! `clap` derive, with two surfaces: `launch` (default; `--pipe` for a
//! bounded, scriptable drain instead of a persistent daemon) and
//! `tasks {prune|clear}` maintenance.

mod exit_error;
mod launch;
mod tasks;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use exit_error::ExitError;

#[derive(Parser)]
#[command(name = "fleet", about = "Multi-agent task orchestrator launcher")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Launch the orchestrator (default command)
    Launch {
        /// Run a bounded, scriptable drain instead of a persistent daemon
        #[arg(long)]
        pipe: bool,
        /// Project directory (default: current directory)
        path: Option<PathBuf>,
    },
    /// Task-store maintenance
    Tasks {
        #[command(subcommand)]
        action: TasksAction,
    },
}

#[derive(Subcommand)]
enum TasksAction {
    /// Delete closed tasks
    Prune {
        /// Project directory (default: current directory)
        path: Option<PathBuf>,
    },
    /// Delete every task
    Clear {
        /// Project directory (default: current directory)
        path: Option<PathBuf>,
    },
}

fn resolve_path(path: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match path {
        Some(path) => Ok(path),
        None => std::env::current_dir().map_err(anyhow::Error::from),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = dispatch(cli).await {
        match err.downcast::<ExitError>() {
            Ok(exit_error) => {
                eprintln!("error: {exit_error}");
                std::process::exit(exit_error.code);
            }
            Err(err) => {
                eprintln!("error: {err:#}");
                std::process::exit(1);
            }
        }
    }
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    match cli.command.unwrap_or(Command::Launch { pipe: false, path: None }) {
        Command::Launch { pipe: false, path } => launch::launch_daemon(&resolve_path(path)?).await,
        Command::Launch { pipe: true, path } => launch::launch_pipe(&resolve_path(path)?).await,
        Command::Tasks { action: TasksAction::Prune { path } } => {
            let pruned = tasks::prune(&resolve_path(path)?).await?;
            println!("pruned {pruned} closed task(s)");
            Ok(())
        }
        Command::Tasks { action: TasksAction::Clear { path } } => {
            let cleared = tasks::clear(&resolve_path(path)?).await?;
            println!("cleared {cleared} task(s)");
            Ok(())
        }
    }
}
