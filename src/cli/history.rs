use std::{fmt::Display, path::PathBuf};

use anyhow::Result;
use chrono::Local;
use clap::{Parser, ValueEnum};

use crate::{
    tracker::{
        config::TrackerConfig,
        storage::{
            history::{HistoryEntry, HistoryOrder, HistoryStore},
            HISTORY_FILE_NAME,
        },
    },
    utils::dir::create_application_default_path,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OrderArg {
    /// Most used first
    Lfu,
    /// Most recently used first
    #[default]
    Lru,
    Az,
    Za,
}

impl From<OrderArg> for HistoryOrder {
    fn from(value: OrderArg) -> Self {
        match value {
            OrderArg::Lfu => Self::Lfu,
            OrderArg::Lru => Self::Lru,
            OrderArg::Az => Self::Az,
            OrderArg::Za => Self::Za,
        }
    }
}

impl Display for OrderArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderArg::Lfu => write!(f, "lfu"),
            OrderArg::Lru => write!(f, "lru"),
            OrderArg::Az => write!(f, "az"),
            OrderArg::Za => write!(f, "za"),
        }
    }
}

#[derive(Debug, Parser)]
pub struct HistoryCommand {
    #[arg(
        long,
        help = "Application directory. By default uses $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
    #[arg(long, short, default_value_t = OrderArg::Lru, help = "Order of the listed tasks")]
    order: OrderArg,
}

/// Lists the tasks remembered from previous sessions without starting the tracker.
pub async fn process_history_command(HistoryCommand { dir, order }: HistoryCommand) -> Result<()> {
    let dir = dir.map_or_else(create_application_default_path, Ok)?;
    let config = TrackerConfig::read(&dir).await?;
    let store = HistoryStore::open(&dir.join(HISTORY_FILE_NAME), config.history_policy).await?;
    print_entries(store.list(order.into()));
    Ok(())
}

pub fn print_entries<'a>(entries: impl IntoIterator<Item = &'a HistoryEntry>) {
    let mut empty = true;
    for entry in entries {
        empty = false;
        println!("{}", format_entry(entry));
    }
    if empty {
        println!("No tasks yet");
    }
}

fn format_entry(entry: &HistoryEntry) -> String {
    let identity = &entry.identity;
    let mut line = format!(
        "{}\t{}\t{}",
        identity.task,
        entry.count,
        entry.last_usage.with_timezone(&Local).format("%x %H:%M")
    );
    for field in [&identity.task_name, &identity.account, &identity.comment] {
        if !field.is_empty() {
            line.push('\t');
            line.push_str(field);
        }
    }
    line
}
