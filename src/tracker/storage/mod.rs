//! Durable state of the tracker:
//!  - [work_log] is the append-only record of finished segments. Its layout is consumed by
//!    external report tooling and must not change.
//!  - [history] keeps previously used task identities for quick re-selection.

pub mod history;
pub mod work_log;

pub const WORK_LOG_FILE_NAME: &str = "work.log";
pub const HISTORY_FILE_NAME: &str = "history.json";
