//! Hand-off of finished segments to a remote time tracking backend. Submissions are queued and
//! performed by a background [GatewayWorker], so the session never waits on the network.

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::{
    message::TrackerEvent,
    session::segment::{TaskIdentity, WorkSegment},
};

/// What the backend receives for every finished segment. The duration keeps full precision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySubmission {
    pub identity: TaskIdentity,
    pub duration: chrono::Duration,
    pub finished_at: DateTime<Utc>,
}

impl From<&WorkSegment> for GatewaySubmission {
    fn from(segment: &WorkSegment) -> Self {
        Self {
            identity: segment.identity().clone(),
            duration: segment.duration(),
            finished_at: segment.end(),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteWorklogGateway: Send + Sync + 'static {
    async fn submit(&self, submission: GatewaySubmission) -> Result<()>;
}

/// Used when no backend is configured. Only leaves a trace in the logs.
pub struct LogOnlyGateway;

#[async_trait]
impl RemoteWorklogGateway for LogOnlyGateway {
    async fn submit(&self, submission: GatewaySubmission) -> Result<()> {
        info!(
            "No remote worklog backend, skipping {} ({}s)",
            submission.identity.task,
            submission.duration.num_seconds()
        );
        Ok(())
    }
}

/// Sending side kept by the session runner.
pub struct GatewayQueue {
    sender: mpsc::UnboundedSender<GatewaySubmission>,
}

impl GatewayQueue {
    /// Queues `segment` without waiting.
    pub fn submit(&self, segment: &WorkSegment) {
        if self.sender.send(segment.into()).is_err() {
            warn!(
                "Gateway worker is gone, {} won't be submitted",
                segment.identity().task
            );
        }
    }
}

/// Performs queued submissions one at a time, in the order they were queued. Stops once every
/// [GatewayQueue] is dropped and the queue is drained.
pub struct GatewayWorker {
    receiver: mpsc::UnboundedReceiver<GatewaySubmission>,
    gateway: Arc<dyn RemoteWorklogGateway>,
    timeout: Duration,
    events: mpsc::UnboundedSender<TrackerEvent>,
}

pub fn gateway_channel(
    gateway: Arc<dyn RemoteWorklogGateway>,
    timeout: Duration,
    events: mpsc::UnboundedSender<TrackerEvent>,
) -> (GatewayQueue, GatewayWorker) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (
        GatewayQueue { sender },
        GatewayWorker {
            receiver,
            gateway,
            timeout,
            events,
        },
    )
}

impl GatewayWorker {
    pub async fn run(mut self) {
        while let Some(submission) = self.receiver.recv().await {
            let task = submission.identity.task.clone();
            let message =
                match tokio::time::timeout(self.timeout, self.gateway.submit(submission)).await {
                    Ok(Ok(())) => {
                        info!("Submitted worklog for {task}");
                        continue;
                    }
                    Ok(Err(e)) => format!("{e:#}"),
                    Err(_) => format!("no answer within {:?}", self.timeout),
                };
            error!("Failed to submit worklog for {task}: {message}");
            let _ = self
                .events
                .send(TrackerEvent::GatewayFailed { task, message });
        }
        info!("Gateway queue closed");
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    use anyhow::anyhow;
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
    use tokio::sync::mpsc;

    use crate::tracker::{
        message::TrackerEvent,
        session::segment::{TaskIdentity, WorkSegment},
    };

    use super::{gateway_channel, MockRemoteWorklogGateway};

    const TEST_START_DATE: NaiveDateTime =
        NaiveDateTime::new(NaiveDate::from_ymd_opt(2018, 7, 4).unwrap(), NaiveTime::MIN);

    fn segment(task: &str, seconds: i64) -> WorkSegment {
        let start = Utc.from_utc_datetime(&TEST_START_DATE);
        WorkSegment::new(
            TaskIdentity::from_task(task).unwrap(),
            start,
            start + chrono::Duration::milliseconds(seconds * 1000 + 250),
        )
    }

    #[tokio::test]
    async fn submissions_keep_order_and_precision() {
        let seen = Arc::new(Mutex::new(vec![]));
        let mut gateway = MockRemoteWorklogGateway::new();
        let recorder = seen.clone();
        gateway.expect_submit().times(3).returning(move |submission| {
            recorder.lock().unwrap().push(submission);
            Ok(())
        });

        let (events, mut received) = mpsc::unbounded_channel();
        let (queue, worker) = gateway_channel(Arc::new(gateway), Duration::from_secs(60), events);
        queue.submit(&segment("FOO-1", 1));
        queue.submit(&segment("FOO-2", 2));
        queue.submit(&segment("FOO-3", 3));
        drop(queue);
        worker.run().await;

        let seen = seen.lock().unwrap();
        let tasks = seen
            .iter()
            .map(|v| v.identity.task.to_string())
            .collect::<Vec<_>>();
        assert_eq!(tasks, vec!["FOO-1", "FOO-2", "FOO-3"]);
        assert_eq!(seen[0].duration, chrono::Duration::milliseconds(1250));
        assert!(received.try_recv().is_err());
    }

    #[tokio::test]
    async fn failures_are_reported_not_propagated() {
        let mut gateway = MockRemoteWorklogGateway::new();
        gateway
            .expect_submit()
            .returning(|_| Err(anyhow!("JIRA returned error code 500")));

        let (events, mut received) = mpsc::unbounded_channel();
        let (queue, worker) = gateway_channel(Arc::new(gateway), Duration::from_secs(60), events);
        queue.submit(&segment("FOO-1", 1));
        queue.submit(&segment("FOO-2", 1));
        drop(queue);
        worker.run().await;

        for task in ["FOO-1", "FOO-2"] {
            match received.try_recv() {
                Ok(TrackerEvent::GatewayFailed { task: failed, message }) => {
                    assert_eq!(&*failed, task);
                    assert!(message.contains("500"));
                }
                other => panic!("Unexpected event {other:?}"),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_backend_times_out() {
        struct HangingGateway;

        #[async_trait::async_trait]
        impl super::RemoteWorklogGateway for HangingGateway {
            async fn submit(&self, _: super::GatewaySubmission) -> anyhow::Result<()> {
                std::future::pending::<()>().await;
                Ok(())
            }
        }

        let (events, mut received) = mpsc::unbounded_channel();
        let (queue, worker) =
            gateway_channel(Arc::new(HangingGateway), Duration::from_secs(60), events);
        queue.submit(&segment("FOO-1", 1));
        drop(queue);
        worker.run().await;

        assert!(matches!(
            received.try_recv(),
            Ok(TrackerEvent::GatewayFailed { .. })
        ));
    }
}
