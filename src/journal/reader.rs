// Snapshot of the most recent log entries

use crate::error::{Result, TunnelError};
use crate::journal::{open_unit_journal, JournalSource, LogEntry};
use crate::systemd::UNIT_NAME;
use std::sync::Arc;

/// Returns the tail of the tunnel unit's log, oldest first
#[derive(Clone)]
pub struct LogSnapshotReader {
    source: Arc<dyn JournalSource>,
}

impl LogSnapshotReader {
    pub fn new(source: Arc<dyn JournalSource>) -> Self {
        Self { source }
    }

    /// Read up to `count` of the newest entries in chronological order.
    ///
    /// `count` bounds the number of journal steps, so entries without message
    /// text still use up a step and the result can be shorter than `count`.
    pub async fn recent_logs(&self, count: usize) -> Result<Vec<LogEntry>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let source = Arc::clone(&self.source);
        tokio::task::spawn_blocking(move || collect_recent(source.as_ref(), count))
            .await
            .map_err(|e| TunnelError::log_access("join journal reader", std::io::Error::other(e)))?
    }
}

fn collect_recent(source: &dyn JournalSource, count: usize) -> Result<Vec<LogEntry>> {
    let mut journal = open_unit_journal(source, UNIT_NAME)?;
    let mut entries = Vec::with_capacity(count.min(1024));

    for _ in 0..count {
        match journal.previous() {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                tracing::debug!("Stopping backward walk early: {}", e);
                break;
            }
        }

        let raw = match journal.entry() {
            Ok(raw) => raw,
            Err(e) => {
                tracing::trace!("Skipping undecodable journal entry: {}", e);
                continue;
            }
        };

        if let Some(entry) = LogEntry::from_raw(raw) {
            entries.push(entry);
        }
    }

    entries.reverse();
    tracing::debug!("Read {} recent entries for {}", entries.len(), UNIT_NAME);
    Ok(entries)
}
