//! Interactive front end. Commands are read line by line from stdin while events coming from the
//! tracker are printed as they arrive.

use std::io::BufRead;

use ansi_term::Colour;
use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::tracker::{
    message::TrackerEvent,
    session::{advisory::Advisory, segment::TaskIdentity, SessionError},
    TrackerChannels,
};

use super::history::{print_entries, OrderArg};

const LINE_QUEUE_SIZE: usize = 4;

#[derive(Parser, Debug)]
#[command(no_binary_name = true, disable_version_flag = true)]
struct ConsoleLine {
    #[command(subcommand)]
    command: ConsoleCommand,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum ConsoleCommand {
    #[command(about = "Start tracking a task. A running task is stopped first")]
    Start {
        #[command(flatten)]
        task: TaskArgs,
    },
    #[command(about = "Stop tracking")]
    Stop,
    #[command(about = "Book the idle period on a task")]
    Idle {
        #[command(flatten)]
        task: TaskArgs,
        #[arg(long, help = "Don't continue working on the task afterwards")]
        stop: bool,
    },
    #[command(name = "ok", about = "Confirm you are still working on the current task")]
    Dismiss,
    #[command(about = "Show what is being tracked")]
    Status,
    #[command(about = "List previously used tasks")]
    History {
        #[arg(long, short, default_value_t = OrderArg::Lru)]
        order: OrderArg,
    },
    #[command(about = "Stop tracking and quit")]
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq, clap::Args)]
struct TaskArgs {
    task: String,
    #[arg(long, default_value = "")]
    name: String,
    #[arg(long, default_value = "")]
    account: String,
    #[arg(long, default_value = "")]
    account_name: String,
    #[arg(long, num_args = 1..)]
    comment: Vec<String>,
}

impl TryFrom<TaskArgs> for TaskIdentity {
    type Error = SessionError;

    fn try_from(value: TaskArgs) -> Result<Self, Self::Error> {
        TaskIdentity::new(
            &value.task,
            &value.name,
            &value.account,
            &value.account_name,
            &value.comment.join(" "),
        )
    }
}

fn parse_line(line: &str) -> Result<ConsoleCommand, clap::Error> {
    ConsoleLine::try_parse_from(line.split_whitespace()).map(|v| v.command)
}

/// Runs until the tracker shuts down. End of input counts as an exit request.
pub async fn run_console(mut channels: TrackerChannels) -> Result<()> {
    let mut lines = spawn_line_reader();
    print!("{}", channels.status.borrow().clone());

    loop {
        tokio::select! {
            biased;
            _ = channels.shutdown.cancelled() => break,
            Some(event) = channels.events.recv() => print_event(&event),
            line = lines.recv() => match line {
                Some(line) if line.trim().is_empty() => (),
                Some(line) => match parse_line(&line) {
                    Ok(command) => execute(&channels, command).await,
                    Err(e) => {
                        let _ = e.print();
                    }
                },
                None => {
                    debug!("Console input closed");
                    report(channels.handle.exit_application().await);
                    break;
                }
            },
        }
    }

    while let Ok(event) = channels.events.try_recv() {
        print_event(&event);
    }
    Ok(())
}

async fn execute(channels: &TrackerChannels, command: ConsoleCommand) {
    let handle = &channels.handle;
    match command {
        ConsoleCommand::Start { task } => match task.try_into() {
            Ok(identity) => report(handle.start_session(identity).await),
            Err(e) => report(Err(e)),
        },
        ConsoleCommand::Stop => report(handle.stop_session().await),
        ConsoleCommand::Idle { task, stop } => match task.try_into() {
            Ok(identity) => report(handle.log_idle_session(identity, !stop).await),
            Err(e) => report(Err(e)),
        },
        ConsoleCommand::Dismiss => report(handle.dismiss_still_working().await),
        ConsoleCommand::Status => {
            let status = channels.status.borrow().clone();
            print!("{status}");
        }
        ConsoleCommand::History { order } => match handle.history(order.into()).await {
            Ok(entries) => print_entries(&entries),
            Err(e) => report(Err(e)),
        },
        ConsoleCommand::Exit => report(handle.exit_application().await),
    }
}

fn report(result: Result<(), SessionError>) {
    if let Err(e) = result {
        println!("{}", Colour::Red.paint(format!("Rejected: {e}")));
    }
}

fn print_event(event: &TrackerEvent) {
    match event {
        TrackerEvent::SegmentFinalized(segment) => println!(
            "Logged {} min on {}",
            segment.duration_minutes_rounded(),
            segment.identity().display_name()
        ),
        TrackerEvent::Advisory(Advisory::MaybeWorking) => println!(
            "{}",
            Colour::Yellow.paint("Looks like you are working. Use `start <task>` to track it")
        ),
        TrackerEvent::Advisory(Advisory::StillWorking { task }) => println!(
            "{}",
            Colour::Yellow.paint(format!("Still working on {task}? Answer with `ok`"))
        ),
        TrackerEvent::WriteFailed { task, message } | TrackerEvent::GatewayFailed { task, message } => {
            println!(
                "{}",
                Colour::Red.paint(format!("Failed to save {task}: {message}"))
            )
        }
    }
}

/// Stdin can't be cancelled, so it's read on a detached thread that dies with the process.
fn spawn_line_reader() -> mpsc::Receiver<String> {
    let (sender, receiver) = mpsc::channel(LINE_QUEUE_SIZE);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if sender.blocking_send(line).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    warn!("Failed to read console input {e:?}");
                    return;
                }
            }
        }
    });
    receiver
}
