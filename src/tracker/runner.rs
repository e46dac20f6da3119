use std::time::Duration;

use anyhow::Result;
use chrono::Timelike;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{idle_api::IdleMonitor, utils::clock::Clock};

use super::{
    gateway::GatewayQueue,
    message::{SessionCommand, TrackerEvent},
    session::{segment::WorkSegment, status::StatusView, SessionState, SessionStateMachine},
    storage::{history::HistoryStore, work_log::WorkLogSink},
};

/// Single owner of the session and its storage. Ticks, commands and shutdown are handled one at a
/// time, so a tick is always applied completely before anything else looks at the state.
pub struct SessionRunner<S: WorkLogSink> {
    machine: SessionStateMachine,
    sink: S,
    history: HistoryStore,
    gateway: GatewayQueue,
    idle: IdleMonitor,
    commands: mpsc::Receiver<SessionCommand>,
    events: mpsc::UnboundedSender<TrackerEvent>,
    status: watch::Sender<StatusView>,
    shutdown: CancellationToken,
    tick_interval: Duration,
    time_provider: Box<dyn Clock>,
    last_idle: Duration,
}

impl<S: WorkLogSink> SessionRunner<S> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        machine: SessionStateMachine,
        sink: S,
        history: HistoryStore,
        gateway: GatewayQueue,
        idle: IdleMonitor,
        commands: mpsc::Receiver<SessionCommand>,
        events: mpsc::UnboundedSender<TrackerEvent>,
        status: watch::Sender<StatusView>,
        shutdown: CancellationToken,
        tick_interval: Duration,
        time_provider: Box<dyn Clock>,
    ) -> Self {
        Self {
            machine,
            sink,
            history,
            gateway,
            idle,
            commands,
            events,
            status,
            shutdown,
            tick_interval,
            time_provider,
            last_idle: Duration::ZERO,
        }
    }

    /// Executes the tracker event loop until exit is requested, every command sender is dropped
    /// or shutdown is signalled. A running task is stopped on the way out.
    pub async fn run(mut self) -> Result<()> {
        let mut next_tick = self.time_provider.instant() + self.tick_interval;
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown requested");
                    self.exit().await;
                    break;
                }
                command = self.commands.recv() => match command {
                    Some(SessionCommand::Exit { reply }) => {
                        self.exit().await;
                        let _ = reply.send(Ok(()));
                        break;
                    }
                    Some(command) => self.handle_command(command).await,
                    None => {
                        info!("All command senders are gone");
                        self.exit().await;
                        break;
                    }
                },
                _ = self.time_provider.sleep_until(next_tick) => {
                    self.tick().await;
                    next_tick += self.tick_interval;
                    // After a suspend of the machine don't replay every missed tick.
                    let now = self.time_provider.instant();
                    if next_tick <= now {
                        next_tick = now + self.tick_interval;
                    }
                }
            }
        }
        self.shutdown.cancel();
        Ok(())
    }

    async fn tick(&mut self) {
        let idle = self.idle.sample();
        self.last_idle = idle;
        let now = self.time_provider.time();

        let outcome = self.machine.tick(idle, now);
        if let Some(segment) = outcome.segment {
            self.finalize(segment).await;
        }
        for advisory in outcome.advisories {
            info!("Raising {advisory:?}");
            self.report(TrackerEvent::Advisory(advisory));
        }

        if let SessionState::Working { identity, .. } = self.machine.state() {
            if now.second() == 59 {
                info!("Working on {}", identity.task);
            }
        }
        self.publish_status();
    }

    async fn handle_command(&mut self, command: SessionCommand) {
        debug!("Handling {command:?}");
        let now = self.time_provider.time();
        match command {
            SessionCommand::Start { identity, reply } => {
                let result = match self.machine.start(identity, now) {
                    Ok(closed) => {
                        if let Some(segment) = closed {
                            self.finalize(segment).await;
                        }
                        Ok(())
                    }
                    Err(e) => Err(e),
                };
                self.publish_status();
                let _ = reply.send(result);
            }
            SessionCommand::Stop { reply } => {
                if let Some(segment) = self.machine.stop(now) {
                    self.finalize(segment).await;
                }
                self.publish_status();
                let _ = reply.send(Ok(()));
            }
            SessionCommand::LogIdle {
                identity,
                continue_working,
                reply,
            } => {
                let result = match self.machine.log_idle(identity, continue_working, now) {
                    Ok(segment) => {
                        self.finalize(segment).await;
                        Ok(())
                    }
                    Err(e) => Err(e),
                };
                self.publish_status();
                let _ = reply.send(result);
            }
            SessionCommand::DismissStillWorking => self.machine.dismiss_still_working(),
            SessionCommand::History { order, reply } => {
                let _ = reply.send(Ok(self.history.list(order).cloned().collect()));
            }
            SessionCommand::Exit { reply } => {
                self.exit().await;
                let _ = reply.send(Ok(()));
            }
        }
    }

    async fn exit(&mut self) {
        let now = self.time_provider.time();
        if let Some(segment) = self.machine.exit(now) {
            self.finalize(segment).await;
        }
        self.publish_status();
    }

    /// Stores a finished segment. Failures are reported but never undo the transition that
    /// produced the segment.
    async fn finalize(&mut self, segment: WorkSegment) {
        let task = segment.identity().task.clone();
        info!(
            "Finalizing {task}: {} - {} ({} min)",
            segment.start(),
            segment.end(),
            segment.duration_minutes_rounded()
        );

        if let Err(e) = self.sink.append(&segment).await {
            error!("Failed to append {task} to the work log {e:?}");
            self.report(TrackerEvent::WriteFailed {
                task: task.clone(),
                message: format!("work log: {e:#}"),
            });
        }

        let now = self.time_provider.time();
        if let Err(e) = self.history.record(segment.identity().clone(), now).await {
            error!("Failed to save history for {task} {e:?}");
            self.report(TrackerEvent::WriteFailed {
                task,
                message: format!("history: {e:#}"),
            });
        }

        self.gateway.submit(&segment);
        self.report(TrackerEvent::SegmentFinalized(segment));
    }

    fn report(&self, event: TrackerEvent) {
        // Nobody listening is fine, the tracker keeps working headless.
        let _ = self.events.send(event);
    }

    fn publish_status(&self) {
        let now = self.time_provider.time();
        self.status
            .send_replace(self.machine.status(self.last_idle, now));
    }
}
