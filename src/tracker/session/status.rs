use std::fmt::Display;

/// Display strings for the front end. Rebuilt after every tick and command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusView {
    pub status: String,
    pub task: String,
    pub account: String,
    pub comment: String,
    pub start_time: String,
    pub duration: String,
    pub idle_duration: String,
    pub idle_since: String,
}

impl Display for StatusView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.status)?;
        let rows = [
            ("Current task", &self.task),
            ("Current account", &self.account),
            ("Current comment", &self.comment),
            ("Start time", &self.start_time),
            ("Duration", &self.duration),
            ("Idle duration", &self.idle_duration),
            ("Idle since", &self.idle_since),
        ];
        for (label, value) in rows.into_iter().filter(|(_, v)| !v.is_empty()) {
            writeln!(f, "  {label:<16}{value}")?;
        }
        Ok(())
    }
}
