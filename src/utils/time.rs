use chrono::{DateTime, Duration, DurationRound, Utc};

/// Format used for dates in the work log.
pub const LOG_DATE_FORMAT: &str = "%Y-%m-%d";

/// Format used for times in the work log and in the status view.
pub const LOG_TIME_FORMAT: &str = "%H:%M:%S";

/// Rounds `moment` down to a multiple of `step` counted from the Unix epoch. Never rounds up.
/// Steps that can't be used for rounding leave the moment as is.
pub fn truncate_to(moment: DateTime<Utc>, step: Duration) -> DateTime<Utc> {
    moment.duration_trunc(step).unwrap_or(moment)
}

/// Short human readable duration, e.g. `1h2m3s`.
pub fn format_duration(v: Duration) -> String {
    if v.num_hours() > 0 {
        format!(
            "{}h{}m{}s",
            v.num_hours(),
            v.num_minutes() % 60,
            v.num_seconds() % 60
        )
    } else if v.num_minutes() > 0 {
        format!("{}m{}s", v.num_minutes() % 60, v.num_seconds() % 60)
    } else {
        format!("{}s", v.num_seconds() % 60)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

    use super::{format_duration, truncate_to};

    const TEST_START_DATE: NaiveDateTime =
        NaiveDateTime::new(NaiveDate::from_ymd_opt(2018, 7, 4).unwrap(), NaiveTime::MIN);

    #[test]
    fn truncation_rounds_down_to_step() {
        let base = Utc.from_utc_datetime(&TEST_START_DATE);
        let step = Duration::minutes(10);

        for offset in [0, 1, 59, 599] {
            assert_eq!(truncate_to(base + Duration::seconds(offset), step), base);
        }
        assert_eq!(
            truncate_to(base + Duration::seconds(600), step),
            base + Duration::minutes(10)
        );
        assert_eq!(
            truncate_to(base + Duration::seconds(1199), step),
            base + Duration::minutes(10)
        );
    }

    #[test]
    fn truncation_never_moves_forward() {
        let base = Utc.from_utc_datetime(&TEST_START_DATE) + Duration::milliseconds(123);
        let step = Duration::minutes(10);
        for seconds in (0..3600).step_by(37) {
            let moment = base + Duration::seconds(seconds);
            let truncated = truncate_to(moment, step);
            assert!(truncated <= moment);
            assert!(moment - truncated < step);
        }
    }

    #[test]
    fn durations_are_short() {
        assert_eq!(format_duration(Duration::seconds(5)), "5s");
        assert_eq!(format_duration(Duration::seconds(65)), "1m5s");
        assert_eq!(format_duration(Duration::seconds(3723)), "1h2m3s");
    }
}
