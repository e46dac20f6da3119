use std::{io::ErrorKind, path::Path, sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{session::SessionSettings, storage::history::HistoryPolicy};

pub const CONFIG_FILE_NAME: &str = "config.json";

/// Settings read from `config.json` in the application directory. Every field is optional in the
/// file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub idle_threshold_secs: u64,
    pub active_threshold_secs: u64,
    pub maybe_working_ticks: u32,
    pub still_working_interval_secs: u64,
    pub tick_interval_ms: u64,
    pub history_policy: HistoryPolicy,
    /// Extra leading field written into every work log record.
    pub location: Option<String>,
    pub gateway_timeout_secs: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            idle_threshold_secs: 10 * 60,
            active_threshold_secs: 60,
            maybe_working_ticks: 300,
            still_working_interval_secs: 60 * 60,
            tick_interval_ms: 1000,
            history_policy: HistoryPolicy::default(),
            location: None,
            gateway_timeout_secs: 60,
        }
    }
}

impl TrackerConfig {
    /// Reads the configuration from `dir`. A missing file means defaults.
    pub async fn read(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                let config: Self = serde_json::from_str(&content)
                    .with_context(|| format!("Config file {path:?} is invalid"))?;
                config
                    .validate()
                    .with_context(|| format!("Config file {path:?} is invalid"))?;
                Ok(config)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No config at {path:?}, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Rejects thresholds that can't be represented as a time delta.
    fn validate(&self) -> Result<()> {
        for (name, secs) in [
            ("idle_threshold_secs", self.idle_threshold_secs),
            ("still_working_interval_secs", self.still_working_interval_secs),
        ] {
            if checked_seconds(secs).is_none() {
                return Err(anyhow!("{name} = {secs} is out of range"));
            }
        }
        Ok(())
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            idle_threshold: saturating_seconds(self.idle_threshold_secs),
            active_threshold: Duration::from_secs(self.active_threshold_secs),
            maybe_working_ticks: self.maybe_working_ticks,
            still_working_interval: saturating_seconds(self.still_working_interval_secs),
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout_secs)
    }

    pub fn location(&self) -> Option<Arc<str>> {
        self.location.as_deref().map(Arc::from)
    }
}

fn checked_seconds(secs: u64) -> Option<chrono::Duration> {
    i64::try_from(secs.max(1))
        .ok()
        .and_then(chrono::Duration::try_seconds)
}

fn saturating_seconds(secs: u64) -> chrono::Duration {
    checked_seconds(secs).unwrap_or(chrono::Duration::MAX)
}
