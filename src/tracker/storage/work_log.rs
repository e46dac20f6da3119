use std::{fmt::Display, future::Future, path::Path, sync::Arc};

use anyhow::Result;
use chrono::{Local, TimeZone};
use tokio::{
    fs::File,
    io::{AsyncWrite, AsyncWriteExt},
};
use tracing::debug;

use crate::{
    tracker::session::segment::WorkSegment,
    utils::time::{LOG_DATE_FORMAT, LOG_TIME_FORMAT},
};

/// Terminates every record. Report tooling reading the log depends on it.
const RECORD_TERMINATOR: char = '\r';

/// Durable destination for finished segments.
pub trait WorkLogSink {
    /// Appends one record. The record must be on disk once the future resolves.
    fn append(&mut self, segment: &WorkSegment) -> impl Future<Output = Result<()>>;
}

/// Append-only, semicolon separated log with one record per segment:
/// `task;startDate;startTime;endDate;endTime;minutes`, optionally prefixed with a location field.
pub struct WorkLogFile<F> {
    file: F,
    location: Option<Arc<str>>,
}

impl WorkLogFile<File> {
    /// Opens the log for appending, creating it when missing. Existing records are never touched.
    pub async fn open(path: &Path, location: Option<Arc<str>>) -> Result<Self> {
        let file = File::options()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        Ok(Self::new(file, location))
    }
}

impl<F: AsyncWrite + Unpin> WorkLogFile<F> {
    pub fn new(file: F, location: Option<Arc<str>>) -> Self {
        Self { file, location }
    }
}

impl<F: AsyncWrite + Unpin> WorkLogSink for WorkLogFile<F> {
    async fn append(&mut self, segment: &WorkSegment) -> Result<()> {
        let record = format_record(segment, &Local, self.location.as_deref());
        self.file.write_all(record.as_bytes()).await?;
        self.file.flush().await?;
        debug!("Wrote {} bytes", record.len());
        Ok(())
    }
}

/// Renders a single log record in the time zone `tz`.
pub fn format_record<Tz: TimeZone>(
    segment: &WorkSegment,
    tz: &Tz,
    location: Option<&str>,
) -> String
where
    Tz::Offset: Display,
{
    let start = segment.start().with_timezone(tz);
    let end = segment.end().with_timezone(tz);
    let mut record = String::new();
    if let Some(location) = location {
        record.push_str(location);
        record.push(';');
    }
    record.push_str(&format!(
        "{};{};{};{};{};{}{RECORD_TERMINATOR}",
        segment.identity().task,
        start.format(LOG_DATE_FORMAT),
        start.format(LOG_TIME_FORMAT),
        end.format(LOG_DATE_FORMAT),
        end.format(LOG_TIME_FORMAT),
        segment.duration_minutes_rounded(),
    ));
    record
}
