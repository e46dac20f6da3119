use std::{cmp::Ordering, io::SeekFrom, path::Path};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
};
use tracing::debug;

use crate::tracker::session::segment::TaskIdentity;

pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

/// How a repeated task identity is reconciled with the stored history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum HistoryPolicy {
    /// Repeats bump the usage counter of the existing entry. The history grows without bound.
    Merge,
    /// Repeats are moved to the end and only the latest `capacity` entries are kept.
    Fifo { capacity: usize },
}

impl Default for HistoryPolicy {
    fn default() -> Self {
        Self::Merge
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HistoryOrder {
    /// Most used first.
    Lfu,
    /// Most recently used first.
    #[default]
    Lru,
    /// Task ascending.
    Az,
    /// Task descending.
    Za,
}

impl HistoryOrder {
    fn compare(self, a: &HistoryEntry, b: &HistoryEntry) -> Ordering {
        let primary = match self {
            HistoryOrder::Lfu => b.count.cmp(&a.count),
            HistoryOrder::Lru => Ordering::Equal,
            HistoryOrder::Az => a.identity.task.cmp(&b.identity.task),
            HistoryOrder::Za => b.identity.task.cmp(&a.identity.task),
        };
        primary.then_with(|| b.last_usage.cmp(&a.last_usage))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub identity: TaskIdentity,
    pub count: u32,
    pub last_usage: DateTime<Utc>,
}

/// In-memory history. Entries are kept in insertion order, which is what bounded eviction relies
/// on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistorySnapshot {
    policy: HistoryPolicy,
    entries: Vec<HistoryEntry>,
}

impl HistorySnapshot {
    pub fn new(policy: HistoryPolicy) -> Self {
        Self {
            policy,
            entries: vec![],
        }
    }

    pub fn policy(&self) -> HistoryPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Records one use of `identity` at `at`.
    pub fn insert(&mut self, identity: TaskIdentity, at: DateTime<Utc>) {
        self.absorb(HistoryEntry {
            identity,
            count: 1,
            last_usage: at,
        });
    }

    fn absorb(&mut self, entry: HistoryEntry) {
        match self.policy {
            HistoryPolicy::Merge => {
                match self
                    .entries
                    .iter_mut()
                    .find(|v| v.identity == entry.identity)
                {
                    Some(existing) => {
                        existing.count = existing.count.saturating_add(entry.count);
                        existing.last_usage = existing.last_usage.max(entry.last_usage);
                    }
                    None => self.entries.push(entry),
                }
            }
            HistoryPolicy::Fifo { capacity } => {
                self.entries.retain(|v| v.identity != entry.identity);
                self.entries.push(HistoryEntry { count: 1, ..entry });
                let excess = self.entries.len().saturating_sub(capacity.max(1));
                self.entries.drain(..excess);
            }
        }
    }

    /// Entries sorted by `order`, ties going to the most recently used. The iterator can be
    /// cloned to walk the same ordering again.
    pub fn list(&self, order: HistoryOrder) -> impl Iterator<Item = &HistoryEntry> + Clone + '_ {
        let mut sorted = self.entries.iter().collect::<Vec<_>>();
        sorted.sort_by(|a, b| order.compare(a, b));
        sorted.into_iter()
    }
}

/// Shape of the history file: `{"WorkLogHistory": [...]}`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryFileEntity {
    #[serde(rename = "WorkLogHistory", default)]
    entries: Vec<HistoryEntryEntity>,
}

#[derive(Debug, Serialize, Deserialize)]
struct HistoryEntryEntity {
    task: String,
    #[serde(rename = "taskname", default)]
    task_name: String,
    #[serde(default)]
    account: String,
    #[serde(rename = "accountName", default)]
    account_name: String,
    #[serde(default)]
    comment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    count: Option<u32>,
    #[serde(default)]
    time: DateTime<Utc>,
}

impl HistoryEntryEntity {
    fn from_entry(entry: &HistoryEntry, policy: HistoryPolicy) -> Self {
        let identity = &entry.identity;
        Self {
            task: identity.task.to_string(),
            task_name: identity.task_name.to_string(),
            account: identity.account.to_string(),
            account_name: identity.account_name.to_string(),
            comment: identity.comment.to_string(),
            count: matches!(policy, HistoryPolicy::Merge).then_some(entry.count),
            time: entry.last_usage,
        }
    }
}

impl From<HistoryEntryEntity> for HistoryEntry {
    fn from(entity: HistoryEntryEntity) -> Self {
        HistoryEntry {
            identity: TaskIdentity {
                task: entity.task.into(),
                task_name: entity.task_name.into(),
                account: entity.account.into(),
                account_name: entity.account_name.into(),
                comment: entity.comment.into(),
            },
            count: entity.count.unwrap_or(1).max(1),
            last_usage: entity.time,
        }
    }
}

fn parse_snapshot(content: &str, policy: HistoryPolicy) -> Result<HistorySnapshot> {
    let mut snapshot = HistorySnapshot::new(policy);
    if content.trim().is_empty() {
        return Ok(snapshot);
    }
    let file: HistoryFileEntity = serde_json::from_str(content)?;
    for entity in file.entries {
        snapshot.absorb(entity.into());
    }
    Ok(snapshot)
}

fn render_snapshot(snapshot: &HistorySnapshot) -> Result<Vec<u8>> {
    let file = HistoryFileEntity {
        entries: snapshot
            .entries
            .iter()
            .map(|v| HistoryEntryEntity::from_entry(v, snapshot.policy))
            .collect(),
    };
    Ok(serde_json::to_vec_pretty(&file)?)
}

/// History backed by a JSON file. The file is opened once and rewritten as a whole after every
/// change.
pub struct HistoryStore {
    file: File,
    snapshot: HistorySnapshot,
}

impl HistoryStore {
    /// Opens the history file, creating an empty one when missing. Entries written under another
    /// policy are reconciled with `policy` on load.
    pub async fn open(path: &Path, policy: HistoryPolicy) -> Result<Self> {
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .await?;
        Self::load(file, path, policy).await
    }

    /// Opens an existing history without write access, so every save fails.
    #[cfg(test)]
    pub(crate) async fn open_read_only(path: &Path, policy: HistoryPolicy) -> Result<Self> {
        let file = File::open(path).await?;
        Self::load(file, path, policy).await
    }

    async fn load(mut file: File, path: &Path, policy: HistoryPolicy) -> Result<Self> {
        let mut content = String::new();
        file.read_to_string(&mut content).await?;
        let snapshot = parse_snapshot(&content, policy)
            .with_context(|| format!("History file {path:?} is corrupted"))?;
        debug!("Loaded {} history entries from {path:?}", snapshot.len());
        Ok(Self { file, snapshot })
    }

    pub fn snapshot(&self) -> &HistorySnapshot {
        &self.snapshot
    }

    pub fn list(&self, order: HistoryOrder) -> impl Iterator<Item = &HistoryEntry> + Clone + '_ {
        self.snapshot.list(order)
    }

    /// Records one use of `identity` and persists the whole history.
    pub async fn record(&mut self, identity: TaskIdentity, at: DateTime<Utc>) -> Result<()> {
        self.snapshot.insert(identity, at);
        self.save().await
    }

    async fn save(&mut self) -> Result<()> {
        let buffer = render_snapshot(&self.snapshot)?;
        self.file.set_len(0).await?;
        self.file.seek(SeekFrom::Start(0)).await?;
        self.file.write_all(&buffer).await?;
        self.file.flush().await?;
        debug!("Saved {} history entries", self.snapshot.len());
        Ok(())
    }
}
