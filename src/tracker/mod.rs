use std::{future::Future, path::Path, sync::Arc};

use anyhow::Result;
use gateway::{gateway_channel, GatewayWorker, LogOnlyGateway, RemoteWorklogGateway};
use message::{SessionCommand, TrackerEvent};
use runner::SessionRunner;
use session::{
    segment::TaskIdentity, status::StatusView, SessionError, SessionStateMachine,
};
use storage::{
    history::{HistoryEntry, HistoryOrder, HistoryStore},
    work_log::{WorkLogFile, WorkLogSink},
    HISTORY_FILE_NAME, WORK_LOG_FILE_NAME,
};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    idle_api::{GenericIdleSampler, IdleMonitor, IdleSampler},
    utils::clock::{Clock, DefaultClock},
};

pub mod config;
pub mod gateway;
pub mod message;
pub mod runner;
pub mod session;
pub mod shutdown;
pub mod storage;

use config::TrackerConfig;

const COMMAND_QUEUE_SIZE: usize = 10;

/// Inbound API of the tracker. Cheap to clone; every call waits until the command is applied.
#[derive(Clone)]
pub struct TrackerHandle {
    commands: mpsc::Sender<SessionCommand>,
}

impl TrackerHandle {
    pub async fn start_session(&self, identity: TaskIdentity) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::Start { identity, reply })
            .await
    }

    pub async fn stop_session(&self) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::Stop { reply }).await
    }

    pub async fn log_idle_session(
        &self,
        identity: TaskIdentity,
        continue_working: bool,
    ) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::LogIdle {
            identity,
            continue_working,
            reply,
        })
        .await
    }

    pub async fn dismiss_still_working(&self) -> Result<(), SessionError> {
        self.commands
            .send(SessionCommand::DismissStillWorking)
            .await
            .map_err(|_| SessionError::TrackerStopped)
    }

    pub async fn history(&self, order: HistoryOrder) -> Result<Vec<HistoryEntry>, SessionError> {
        self.request(|reply| SessionCommand::History { order, reply })
            .await
    }

    pub async fn exit_application(&self) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::Exit { reply }).await
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<Result<T, SessionError>>) -> SessionCommand,
    ) -> Result<T, SessionError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| SessionError::TrackerStopped)?;
        response.await.map_err(|_| SessionError::TrackerStopped)?
    }
}

/// Everything a front end needs to drive the tracker and show what it is doing.
pub struct TrackerChannels {
    pub handle: TrackerHandle,
    pub status: watch::Receiver<StatusView>,
    pub events: mpsc::UnboundedReceiver<TrackerEvent>,
    /// Cancelled once the tracker has shut down.
    pub shutdown: CancellationToken,
}

/// Represents the starting point for the tracker. Runs until the front end asks to exit or the
/// process is interrupted.
pub async fn start_tracker<F, Fut>(dir: &Path, config: TrackerConfig, front_end: F) -> Result<()>
where
    F: FnOnce(TrackerChannels) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let sampler = GenericIdleSampler::new()?;
    let sink = WorkLogFile::open(&dir.join(WORK_LOG_FILE_NAME), config.location()).await?;
    let history = HistoryStore::open(&dir.join(HISTORY_FILE_NAME), config.history_policy).await?;
    info!("Tracking into {dir:?}");

    let shutdown_token = CancellationToken::new();
    let (runner, worker, channels) = create_tracker(
        sink,
        history,
        Box::new(sampler),
        Arc::new(LogOnlyGateway),
        &config,
        &shutdown_token,
        DefaultClock,
    );

    let gateway_task = tokio::spawn(worker.run());

    let (_, runner_result, front_end_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token.clone()),
        runner.run(),
        front_end(channels),
    );

    // The runner is gone, so the queue is closed; wait for the submissions still in flight.
    if let Err(e) = gateway_task.await {
        error!("Gateway worker failed {e:?}");
    }

    if let Err(e) = &runner_result {
        error!("Tracker got an error {e:?}");
    }
    if let Err(e) = &front_end_result {
        error!("Front end got an error {e:?}");
    }
    runner_result.and(front_end_result)
}

fn create_tracker<S: WorkLogSink>(
    sink: S,
    history: HistoryStore,
    sampler: Box<dyn IdleSampler>,
    gateway: Arc<dyn RemoteWorklogGateway>,
    config: &TrackerConfig,
    shutdown_token: &CancellationToken,
    clock: impl Clock,
) -> (SessionRunner<S>, GatewayWorker, TrackerChannels) {
    let (command_sender, command_receiver) = mpsc::channel(COMMAND_QUEUE_SIZE);
    let (event_sender, event_receiver) = mpsc::unbounded_channel();
    let (status_sender, status_receiver) = watch::channel(StatusView::default());
    let (queue, worker) = gateway_channel(gateway, config.gateway_timeout(), event_sender.clone());

    let runner = SessionRunner::new(
        SessionStateMachine::new(config.session_settings()),
        sink,
        history,
        queue,
        IdleMonitor::new(sampler),
        command_receiver,
        event_sender,
        status_sender,
        shutdown_token.clone(),
        config.tick_interval(),
        Box::new(clock),
    );
    let channels = TrackerChannels {
        handle: TrackerHandle {
            commands: command_sender,
        },
        status: status_receiver,
        events: event_receiver,
        shutdown: shutdown_token.clone(),
    };
    (runner, worker, channels)
}
