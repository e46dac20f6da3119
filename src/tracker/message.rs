use std::sync::Arc;

use tokio::sync::oneshot;

use super::{
    session::{
        advisory::Advisory,
        segment::{TaskIdentity, WorkSegment},
        SessionError,
    },
    storage::history::{HistoryEntry, HistoryOrder},
};

pub type Reply<T = ()> = oneshot::Sender<Result<T, SessionError>>;

/// Commands delivered to the [SessionRunner](super::runner::SessionRunner). Each carries a
/// channel the outcome is reported on.
#[derive(Debug)]
pub enum SessionCommand {
    Start {
        identity: TaskIdentity,
        reply: Reply,
    },
    Stop {
        reply: Reply,
    },
    LogIdle {
        identity: TaskIdentity,
        continue_working: bool,
        reply: Reply,
    },
    DismissStillWorking,
    History {
        order: HistoryOrder,
        reply: Reply<Vec<HistoryEntry>>,
    },
    Exit {
        reply: Reply,
    },
}

/// Notifications for the front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerEvent {
    SegmentFinalized(WorkSegment),
    Advisory(Advisory),
    /// A finished segment couldn't be written to the work log or the history.
    WriteFailed { task: Arc<str>, message: String },
    /// The remote worklog backend rejected or didn't answer a submission.
    GatewayFailed { task: Arc<str>, message: String },
}
