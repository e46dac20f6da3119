use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use super::SessionError;

/// What the user says they are working on. Travels unchanged from the command that opened a
/// period of work to the segment that closes it, and doubles as the history key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskIdentity {
    /// Task id, e.g. `FOO-1`. Never empty for identities accepted by the session.
    pub task: Arc<str>,
    /// Human readable task name. May be empty.
    pub task_name: Arc<str>,
    pub account: Arc<str>,
    pub account_name: Arc<str>,
    pub comment: Arc<str>,
}

impl TaskIdentity {
    /// Builds an identity from user input. Surrounding whitespace and line terminators are
    /// dropped; a task that ends up empty is rejected.
    pub fn new(
        task: &str,
        task_name: &str,
        account: &str,
        account_name: &str,
        comment: &str,
    ) -> Result<Self, SessionError> {
        let task = task.trim();
        if task.is_empty() {
            return Err(SessionError::EmptyTask);
        }
        Ok(Self {
            task: task.into(),
            task_name: task_name.trim().into(),
            account: account.trim().into(),
            account_name: account_name.trim().into(),
            comment: comment.trim().into(),
        })
    }

    pub fn from_task(task: &str) -> Result<Self, SessionError> {
        Self::new(task, "", "", "", "")
    }

    /// Name shown to the user. Falls back to the task id.
    pub fn display_name(&self) -> &str {
        if self.task_name.is_empty() {
            &self.task
        } else {
            &self.task_name
        }
    }
}

/// A closed interval of tracked work. Only the session creates these, one per transition that
/// ends a working period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkSegment {
    identity: TaskIdentity,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl WorkSegment {
    /// `end` earlier than `start` collapses to an empty segment.
    pub(crate) fn new(identity: TaskIdentity, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            identity,
            start,
            end: end.max(start),
        }
    }

    pub fn identity(&self) -> &TaskIdentity {
        &self.identity
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Duration rounded to the nearest whole minute, halves away from zero.
    pub fn duration_minutes_rounded(&self) -> i64 {
        (self.duration().num_milliseconds() as f64 / 60_000.).round() as i64
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

    use crate::tracker::session::SessionError;

    use super::{TaskIdentity, WorkSegment};

    const TEST_START_DATE: NaiveDateTime =
        NaiveDateTime::new(NaiveDate::from_ymd_opt(2018, 7, 4).unwrap(), NaiveTime::MIN);

    #[test]
    fn identity_rejects_blank_task() {
        assert_eq!(TaskIdentity::from_task(""), Err(SessionError::EmptyTask));
        assert_eq!(TaskIdentity::from_task("\r\n"), Err(SessionError::EmptyTask));
        let identity = TaskIdentity::new("FOO-1\r\n", "", "ACC", "", " fixing ").unwrap();
        assert_eq!(&*identity.task, "FOO-1");
        assert_eq!(&*identity.comment, "fixing");
        assert_eq!(identity.display_name(), "FOO-1");
    }

    #[test]
    fn minutes_round_to_nearest() {
        let start = Utc.from_utc_datetime(&TEST_START_DATE);
        let identity = TaskIdentity::from_task("FOO-1").unwrap();
        let minutes = |seconds| {
            WorkSegment::new(identity.clone(), start, start + Duration::seconds(seconds))
                .duration_minutes_rounded()
        };
        assert_eq!(minutes(5), 0);
        assert_eq!(minutes(29), 0);
        assert_eq!(minutes(30), 1);
        assert_eq!(minutes(89), 1);
        assert_eq!(minutes(90), 2);
    }

    #[test]
    fn segment_never_ends_before_it_starts() {
        let start = Utc.from_utc_datetime(&TEST_START_DATE);
        let segment = WorkSegment::new(
            TaskIdentity::from_task("FOO-1").unwrap(),
            start,
            start - Duration::minutes(3),
        );
        assert_eq!(segment.end(), segment.start());
        assert_eq!(segment.duration(), Duration::zero());
    }
}
