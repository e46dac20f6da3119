pub mod console;
pub mod history;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use console::run_console;
use history::{process_history_command, HistoryCommand};
use tracing::{info, level_filters::LevelFilter};

use crate::{
    tracker::{
        config::TrackerConfig,
        start_tracker,
        storage::history::{HistoryPolicy, DEFAULT_HISTORY_CAPACITY},
    },
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, TRACKER_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "worktrack", version, long_about = None)]
#[command(about = "Tracks time spent on tasks and notices when you walk away", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyArg {
    /// Keep one entry per task and count how often it was used
    Merge,
    /// Keep the most recent tasks, duplicates included
    Fifo,
}

impl From<PolicyArg> for HistoryPolicy {
    fn from(value: PolicyArg) -> Self {
        match value {
            PolicyArg::Merge => Self::Merge,
            PolicyArg::Fifo => Self::Fifo {
                capacity: DEFAULT_HISTORY_CAPACITY,
            },
        }
    }
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Start tracking in the current console")]
    Run {
        #[arg(
            long,
            help = "Application directory. By default uses $XDG_STATE_HOME or $HOME/.local/state"
        )]
        dir: Option<PathBuf>,
        #[arg(long, help = "Overrides the history policy from the config")]
        policy: Option<PolicyArg>,
        #[arg(long, help = "Mirror logs into the console")]
        log_console: bool,
        #[arg(long, help = "Log level, e.g. info or trace. Defaults to $RUST_LOG or debug")]
        log_filter: Option<LevelFilter>,
    },
    #[command(about = "List tasks used in previous sessions")]
    History {
        #[command(flatten)]
        command: HistoryCommand,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    match args.commands {
        Commands::Run {
            dir,
            policy,
            log_console,
            log_filter,
        } => {
            let dir = dir.map_or_else(create_application_default_path, Ok)?;
            enable_logging(TRACKER_PREFIX, &dir.join("logs"), log_filter, log_console)?;

            let mut config = TrackerConfig::read(&dir).await?;
            if let Some(policy) = policy {
                config.history_policy = policy.into();
            }
            info!("Starting with {config:?}");
            start_tracker(&dir, config, run_console).await
        }
        Commands::History { command } => process_history_command(command).await,
    }
}
