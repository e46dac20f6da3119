//! The session owns what is being tracked right now. It is a plain state machine: every method
//! takes the current moment explicitly and returns the [WorkSegment]s it closed, leaving storage
//! and notifications to [SessionRunner](crate::tracker::runner::SessionRunner).

pub mod advisory;
pub mod segment;
pub mod status;

use std::time::Duration;

use advisory::{ActivityEvaluator, Advisory, StillWorkingReminder};
use chrono::{DateTime, Local, Utc};
use segment::{TaskIdentity, WorkSegment};
use status::StatusView;
use thiserror::Error;
use tracing::{debug, info};

use crate::utils::time::{format_duration, truncate_to, LOG_TIME_FORMAT};

/// Rejections returned to whoever issued a command. The session is left untouched.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    #[error("task can't be empty")]
    EmptyTask,
    #[error("there is no idle period to log")]
    NotIdle,
    #[error("tracker is no longer running")]
    TrackerStopped,
}

/// Thresholds driving automatic transitions and advisories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Idle time after which a running task is suspended.
    pub idle_threshold: chrono::Duration,
    /// Idle time below which the user counts as active.
    pub active_threshold: Duration,
    /// Consecutive active ticks without tracking before [Advisory::MaybeWorking].
    pub maybe_working_ticks: u32,
    /// Tracked time between [Advisory::StillWorking] reminders.
    pub still_working_interval: chrono::Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            idle_threshold: chrono::Duration::minutes(10),
            active_threshold: Duration::from_secs(60),
            maybe_working_ticks: 300,
            still_working_interval: chrono::Duration::hours(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Stopped,
    Working {
        identity: TaskIdentity,
        start: DateTime<Utc>,
    },
    IdleSuspended {
        previous: TaskIdentity,
        original_start: DateTime<Utc>,
        idle_since: DateTime<Utc>,
    },
}

/// Everything a single tick produced.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub segment: Option<WorkSegment>,
    pub advisories: Vec<Advisory>,
}

pub struct SessionStateMachine {
    state: SessionState,
    settings: SessionSettings,
    activity: ActivityEvaluator,
    reminder: StillWorkingReminder,
}

impl SessionStateMachine {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            state: SessionState::Stopped,
            activity: ActivityEvaluator::new(
                settings.active_threshold,
                settings.maybe_working_ticks,
            ),
            reminder: StillWorkingReminder::new(settings.still_working_interval),
            settings,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Task currently being tracked, if any.
    pub fn current_task(&self) -> Option<&TaskIdentity> {
        match &self.state {
            SessionState::Working { identity, .. } => Some(identity),
            _ => None,
        }
    }

    /// Starts tracking `identity`. A task that is already running is closed first and its
    /// segment returned; a pending idle period is dropped.
    pub fn start(
        &mut self,
        identity: TaskIdentity,
        now: DateTime<Utc>,
    ) -> Result<Option<WorkSegment>, SessionError> {
        if identity.task.trim().is_empty() {
            return Err(SessionError::EmptyTask);
        }
        let closed = match std::mem::replace(&mut self.state, SessionState::Stopped) {
            SessionState::Working {
                identity: running,
                start,
            } => {
                info!("Switching from {} to {}", running.task, identity.task);
                Some(WorkSegment::new(running, start, now))
            }
            SessionState::IdleSuspended { previous, .. } => {
                info!("Discarding idle period of {}", previous.task);
                None
            }
            SessionState::Stopped => None,
        };
        self.begin(identity, now);
        Ok(closed)
    }

    /// Stops the running task. Does nothing while stopped; drops a pending idle period.
    pub fn stop(&mut self, now: DateTime<Utc>) -> Option<WorkSegment> {
        match std::mem::replace(&mut self.state, SessionState::Stopped) {
            SessionState::Working { identity, start } => {
                info!(
                    "Spent {} on {}",
                    format_duration(now - start),
                    identity.task
                );
                Some(WorkSegment::new(identity, start, now))
            }
            SessionState::IdleSuspended { previous, .. } => {
                info!("Discarding idle period of {}", previous.task);
                None
            }
            SessionState::Stopped => {
                debug!("Already stopped");
                None
            }
        }
    }

    /// Books the time since the user went idle on `identity`, which may differ from the task that
    /// was interrupted. With `continue_working` the same identity keeps running from `now`.
    pub fn log_idle(
        &mut self,
        identity: TaskIdentity,
        continue_working: bool,
        now: DateTime<Utc>,
    ) -> Result<WorkSegment, SessionError> {
        if identity.task.trim().is_empty() {
            return Err(SessionError::EmptyTask);
        }
        let SessionState::IdleSuspended { idle_since, .. } = self.state else {
            return Err(SessionError::NotIdle);
        };
        info!(
            "Logging idle work {} on {}",
            format_duration(now - idle_since),
            identity.task
        );
        let segment = WorkSegment::new(identity.clone(), idle_since, now);
        if continue_working {
            self.begin(identity, now);
        } else {
            self.state = SessionState::Stopped;
        }
        Ok(segment)
    }

    /// Final transition before the application goes away.
    pub fn exit(&mut self, now: DateTime<Utc>) -> Option<WorkSegment> {
        match self.state {
            SessionState::Working { .. } => self.stop(now),
            _ => {
                self.state = SessionState::Stopped;
                None
            }
        }
    }

    pub fn dismiss_still_working(&mut self) {
        self.reminder.dismiss();
    }

    /// Applies one idle sample.
    pub fn tick(&mut self, idle: Duration, now: DateTime<Utc>) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        match &self.state {
            SessionState::Working { identity, start } => {
                let idle_for = chrono::Duration::from_std(idle).unwrap_or(chrono::Duration::MAX);
                if idle_for > self.settings.idle_threshold {
                    let idle_since = truncate_to(now, self.settings.idle_threshold).max(*start);
                    info!(
                        "Idle since {idle_since}, logging {} on {}",
                        format_duration(idle_since - *start),
                        identity.task
                    );
                    let previous = identity.clone();
                    let original_start = *start;
                    outcome.segment =
                        Some(WorkSegment::new(previous.clone(), original_start, idle_since));
                    self.state = SessionState::IdleSuspended {
                        previous,
                        original_start,
                        idle_since,
                    };
                } else if self.reminder.observe(now - *start) {
                    outcome.advisories.push(Advisory::StillWorking {
                        task: identity.task.clone(),
                    });
                }
            }
            SessionState::Stopped | SessionState::IdleSuspended { .. } => {
                if self.activity.observe(idle) {
                    outcome.advisories.push(Advisory::MaybeWorking);
                }
            }
        }
        outcome
    }

    /// Display strings for the current state.
    pub fn status(&self, idle: Duration, now: DateTime<Utc>) -> StatusView {
        let idle_duration =
            format_duration(chrono::Duration::from_std(idle).unwrap_or(chrono::Duration::MAX));
        match &self.state {
            SessionState::Stopped => StatusView {
                status: "Not working".into(),
                idle_duration,
                ..Default::default()
            },
            SessionState::Working { identity, start } => StatusView {
                status: "Working...".into(),
                task: identity.display_name().into(),
                account: identity.account.to_string(),
                comment: identity.comment.to_string(),
                start_time: local_time(*start),
                duration: format_duration(now - *start),
                idle_duration,
                idle_since: String::new(),
            },
            SessionState::IdleSuspended {
                previous,
                idle_since,
                ..
            } => StatusView {
                status: format!("Idle since {}", local_time(*idle_since)),
                task: previous.display_name().into(),
                account: previous.account.to_string(),
                comment: previous.comment.to_string(),
                idle_duration,
                idle_since: local_time(*idle_since),
                ..Default::default()
            },
        }
    }

    fn begin(&mut self, identity: TaskIdentity, now: DateTime<Utc>) {
        info!("Starting to work on {}", identity.task);
        self.activity.reset();
        self.reminder.restart();
        self.state = SessionState::Working {
            identity,
            start: now,
        };
    }
}

fn local_time(moment: DateTime<Utc>) -> String {
    moment.with_timezone(&Local).format(LOG_TIME_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

    use super::{
        advisory::Advisory, segment::TaskIdentity, SessionError, SessionSettings, SessionState,
        SessionStateMachine,
    };

    const TEST_START_DATE: NaiveDateTime =
        NaiveDateTime::new(NaiveDate::from_ymd_opt(2018, 7, 4).unwrap(), NaiveTime::MIN);

    fn base() -> DateTime<Utc> {
        Utc.from_utc_datetime(&TEST_START_DATE)
    }

    fn at(seconds: i64) -> DateTime<Utc> {
        base() + chrono::Duration::seconds(seconds)
    }

    fn task(name: &str) -> TaskIdentity {
        TaskIdentity::from_task(name).unwrap()
    }

    fn assert_task_invariant(machine: &SessionStateMachine) {
        match machine.state() {
            SessionState::Stopped => assert!(machine.current_task().is_none()),
            SessionState::Working { identity, .. } => assert!(!identity.task.is_empty()),
            SessionState::IdleSuspended { previous, .. } => assert!(!previous.task.is_empty()),
        }
    }

    /// Ticks once per second from `from` to `to` (exclusive), with idle time growing from
    /// `idle_start`. Returns the segments produced on the way.
    fn run_idle(
        machine: &mut SessionStateMachine,
        from: i64,
        to: i64,
        idle_start: i64,
    ) -> Vec<super::segment::WorkSegment> {
        (from..to)
            .filter_map(|second| {
                let idle = Duration::from_secs((second - idle_start).max(0) as u64);
                let outcome = machine.tick(idle, at(second));
                assert_task_invariant(machine);
                outcome.segment
            })
            .collect()
    }

    #[test]
    fn start_then_stop_emits_one_segment() {
        let mut machine = SessionStateMachine::new(SessionSettings::default());
        assert_eq!(machine.start(task("FOO-1"), at(0)), Ok(None));
        assert_task_invariant(&machine);

        let segment = machine.stop(at(5)).expect("stop should close the task");
        assert_eq!(&*segment.identity().task, "FOO-1");
        assert_eq!(segment.start(), at(0));
        assert_eq!(segment.end(), at(5));
        assert_eq!(segment.duration_minutes_rounded(), 0);
        assert_eq!(machine.state(), &SessionState::Stopped);
    }

    #[test]
    fn stop_while_stopped_is_noop() {
        let mut machine = SessionStateMachine::new(SessionSettings::default());
        assert_eq!(machine.stop(at(0)), None);
        machine.start(task("FOO-1"), at(0)).unwrap();
        machine.stop(at(10));
        assert_eq!(machine.stop(at(20)), None);
        assert_eq!(machine.state(), &SessionState::Stopped);
    }

    #[test]
    fn empty_task_is_rejected_without_changes() {
        let mut machine = SessionStateMachine::new(SessionSettings::default());
        let mut blank = task("FOO-1");
        blank.task = "".into();
        assert_eq!(machine.start(blank.clone(), at(0)), Err(SessionError::EmptyTask));
        assert_eq!(machine.state(), &SessionState::Stopped);

        machine.start(task("FOO-1"), at(0)).unwrap();
        run_idle(&mut machine, 1, 700, 0);
        let before = machine.state().clone();
        assert_eq!(
            machine.log_idle(blank, true, at(800)),
            Err(SessionError::EmptyTask)
        );
        assert_eq!(machine.state(), &before);
    }

    #[test]
    fn whitespace_task_built_by_hand_is_rejected() {
        let mut machine = SessionStateMachine::new(SessionSettings::default());
        let mut blank = task("FOO-1");
        blank.task = " \t\r\n".into();
        assert_eq!(machine.start(blank.clone(), at(0)), Err(SessionError::EmptyTask));
        assert_eq!(machine.state(), &SessionState::Stopped);

        machine.start(task("FOO-1"), at(0)).unwrap();
        run_idle(&mut machine, 1, 700, 0);
        assert_eq!(
            machine.log_idle(blank, false, at(800)),
            Err(SessionError::EmptyTask)
        );
        assert!(matches!(machine.state(), SessionState::IdleSuspended { .. }));
        assert_task_invariant(&machine);
    }

    #[test]
    fn log_idle_requires_idle_state() {
        let mut machine = SessionStateMachine::new(SessionSettings::default());
        assert_eq!(
            machine.log_idle(task("FOO-2"), false, at(0)),
            Err(SessionError::NotIdle)
        );
        machine.start(task("FOO-1"), at(0)).unwrap();
        assert_eq!(
            machine.log_idle(task("FOO-2"), false, at(1)),
            Err(SessionError::NotIdle)
        );
        assert!(matches!(machine.state(), SessionState::Working { .. }));
    }

    #[test]
    fn idle_suspension_is_truncated_to_threshold() {
        let mut machine = SessionStateMachine::new(SessionSettings::default());
        machine.start(task("FOO-1"), at(0)).unwrap();

        // 11 minutes without any input.
        let segments = run_idle(&mut machine, 1, 11 * 60, 0);
        assert_eq!(segments.len(), 1);
        let segment = &segments[0];
        assert_eq!(segment.start(), at(0));
        assert_eq!(segment.end(), at(600));
        assert!(segment.end() >= segment.start());

        assert_eq!(
            machine.state(),
            &SessionState::IdleSuspended {
                previous: task("FOO-1"),
                original_start: at(0),
                idle_since: at(600),
            }
        );
    }

    #[test]
    fn idle_boundary_is_never_rounded_up() {
        let mut machine = SessionStateMachine::new(SessionSettings::default());
        machine.start(task("FOO-1"), at(125)).unwrap();

        // Input stops at 20:00, detection happens a little after 30:00.
        let segments = run_idle(&mut machine, 126, 3000, 1200);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].end(), at(1800));
        assert_eq!(segments[0].duration_minutes_rounded(), 28);
    }

    #[test]
    fn idle_boundary_never_precedes_start() {
        let mut machine = SessionStateMachine::new(SessionSettings::default());
        // Already idle for almost the whole threshold when the task starts.
        machine.start(task("FOO-1"), at(605)).unwrap();
        let segments = run_idle(&mut machine, 606, 700, 0);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start(), at(605));
        assert_eq!(segments[0].end(), at(605));
    }

    #[test]
    fn log_idle_and_continue() {
        let mut machine = SessionStateMachine::new(SessionSettings::default());
        machine.start(task("FOO-1"), at(0)).unwrap();
        let mut segments = run_idle(&mut machine, 1, 11 * 60, 0);

        segments.push(machine.log_idle(task("FOO-2"), true, at(900)).unwrap());
        assert_eq!(segments.len(), 2);
        assert_eq!(&*segments[0].identity().task, "FOO-1");
        assert_eq!(&*segments[1].identity().task, "FOO-2");
        assert_eq!(segments[1].start(), at(600));
        assert_eq!(segments[1].end(), at(900));

        assert_eq!(
            machine.state(),
            &SessionState::Working {
                identity: task("FOO-2"),
                start: at(900),
            }
        );
    }

    #[test]
    fn log_idle_and_stop() {
        let mut machine = SessionStateMachine::new(SessionSettings::default());
        machine.start(task("FOO-1"), at(0)).unwrap();
        run_idle(&mut machine, 1, 11 * 60, 0);

        let segment = machine.log_idle(task("FOO-1"), false, at(700)).unwrap();
        assert_eq!(segment.duration(), chrono::Duration::seconds(100));
        assert_eq!(machine.state(), &SessionState::Stopped);
        assert_eq!(machine.stop(at(800)), None);
    }

    #[test]
    fn exit_stops_running_task() {
        let mut machine = SessionStateMachine::new(SessionSettings::default());
        machine.start(task("FOO-1"), at(0)).unwrap();
        let segment = machine.exit(at(120)).unwrap();
        assert_eq!(segment.duration_minutes_rounded(), 2);
        assert_eq!(machine.state(), &SessionState::Stopped);

        machine.start(task("FOO-1"), at(200)).unwrap();
        run_idle(&mut machine, 201, 1000, 200);
        assert_eq!(machine.exit(at(1000)), None);
    }

    #[test]
    fn starting_another_task_closes_current_one() {
        let mut machine = SessionStateMachine::new(SessionSettings::default());
        machine.start(task("FOO-1"), at(0)).unwrap();
        let closed = machine.start(task("FOO-2"), at(60)).unwrap().unwrap();
        assert_eq!(&*closed.identity().task, "FOO-1");
        assert_eq!(closed.end(), at(60));
        assert_eq!(machine.current_task(), Some(&task("FOO-2")));
    }

    #[test]
    fn maybe_working_only_while_not_tracking() {
        let mut machine = SessionStateMachine::new(SessionSettings::default());
        let advisories = (0..600)
            .flat_map(|second| machine.tick(Duration::from_secs(1), at(second)).advisories)
            .collect::<Vec<_>>();
        assert_eq!(advisories, vec![Advisory::MaybeWorking, Advisory::MaybeWorking]);

        machine.start(task("FOO-1"), at(600)).unwrap();
        let advisories = (601..1200)
            .flat_map(|second| machine.tick(Duration::from_secs(1), at(second)).advisories)
            .collect::<Vec<_>>();
        assert!(advisories.is_empty());
    }

    #[test]
    fn still_working_every_hour_after_dismissal() {
        let mut machine = SessionStateMachine::new(SessionSettings::default());
        machine.start(task("FOO-1"), at(0)).unwrap();
        let mut fired = vec![];
        for second in 1..=3 * 3600 {
            let outcome = machine.tick(Duration::from_secs(1), at(second));
            if !outcome.advisories.is_empty() {
                fired.push(second);
                machine.dismiss_still_working();
            }
            assert!(outcome.segment.is_none());
        }
        assert_eq!(fired, vec![3600, 7200, 10800]);
    }
}
