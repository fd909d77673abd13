// Journal access for the tunnel unit

pub mod journalctl;
pub mod reader;
#[cfg(feature = "sd-journal")]
pub mod sdjournal;
pub mod streamer;

#[cfg(test)]
pub(crate) mod memory;

pub use journalctl::JournalctlSource;
pub use reader::LogSnapshotReader;
#[cfg(feature = "sd-journal")]
pub use sdjournal::SdJournalSource;
pub use streamer::{LogStreamer, StreamOptions};

use crate::config::{Config, JournalBackend};
use crate::error::{Result, TunnelError};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::sync::Arc;
use std::time::Duration;

/// Journal field carrying the unit that produced an entry
pub const UNIT_FIELD: &str = "_SYSTEMD_UNIT";

/// One open, positioned view over the journal
///
/// Handles are synchronous and owned by exactly one call; they are released on drop.
pub trait Journal {
    /// Only surface entries whose `field` equals `value`
    fn add_match(&mut self, field: &str, value: &str) -> io::Result<()>;

    /// Position after the most recent entry
    fn seek_tail(&mut self) -> io::Result<()>;

    /// Step one entry back; `false` when there is nothing older
    fn previous(&mut self) -> io::Result<bool>;

    /// Step one entry forward; `false` when there is nothing newer yet
    fn next(&mut self) -> io::Result<bool>;

    /// Decode the entry the handle currently rests on
    fn entry(&mut self) -> io::Result<RawEntry>;

    /// Block for up to `timeout` waiting for the journal to change
    fn wait(&mut self, timeout: Duration) -> io::Result<()>;
}

/// Opens independent journal handles
pub trait JournalSource: Send + Sync {
    fn open(&self) -> io::Result<Box<dyn Journal>>;
}

/// Fields read from a journal entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEntry {
    /// Wall-clock time the entry was received, in microseconds since the epoch
    pub realtime_usec: u64,
    pub message: String,
    pub priority: String,
}

/// A log line of the tunnel unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub priority: String,
}

impl LogEntry {
    /// Convert a raw journal entry, discarding ones without message text
    pub fn from_raw(raw: RawEntry) -> Option<Self> {
        if raw.message.is_empty() {
            return None;
        }
        Some(Self {
            timestamp: timestamp_from_usec(raw.realtime_usec),
            message: raw.message,
            priority: raw.priority,
        })
    }

    /// Syslog keyword for the numeric priority
    pub fn priority_label(&self) -> &'static str {
        match self.priority.as_str() {
            "0" => "emerg",
            "1" => "alert",
            "2" => "crit",
            "3" => "err",
            "4" => "warning",
            "5" => "notice",
            "6" => "info",
            "7" => "debug",
            _ => "unknown",
        }
    }
}

/// Microsecond realtime clock value to a nanosecond-precision timestamp
pub fn timestamp_from_usec(usec: u64) -> DateTime<Utc> {
    let secs = (usec / 1_000_000) as i64;
    let nanos = ((usec % 1_000_000) * 1000) as u32;
    DateTime::from_timestamp(secs, nanos).unwrap_or_default()
}

/// Render an entry as `[YYYY-MM-DD HH:MM:SS] message\n` in local time
pub fn format_stream_line(raw: &RawEntry) -> Option<String> {
    if raw.message.is_empty() {
        return None;
    }
    let local: DateTime<Local> = timestamp_from_usec(raw.realtime_usec).into();
    Some(format!(
        "[{}] {}\n",
        local.format("%Y-%m-%d %H:%M:%S"),
        raw.message
    ))
}

/// Open a handle filtered to `unit` and positioned at the tail
pub(crate) fn open_unit_journal(
    source: &dyn JournalSource,
    unit: &str,
) -> Result<Box<dyn Journal>> {
    let mut journal = source
        .open()
        .map_err(|e| TunnelError::log_access("open journal", e))?;
    journal
        .add_match(UNIT_FIELD, unit)
        .map_err(|e| TunnelError::log_access("add journal match", e))?;
    journal
        .seek_tail()
        .map_err(|e| TunnelError::log_access("seek to tail", e))?;
    Ok(journal)
}

/// Build the journal source selected in the application config
pub fn source_from_config(config: &Config) -> Result<Arc<dyn JournalSource>> {
    match config.journal_backend {
        JournalBackend::Journalctl => Ok(Arc::new(JournalctlSource::new(
            config.journalctl_path.clone(),
        ))),
        #[cfg(feature = "sd-journal")]
        JournalBackend::SdJournal => Ok(Arc::new(SdJournalSource)),
        #[cfg(not(feature = "sd-journal"))]
        JournalBackend::SdJournal => Err(TunnelError::Config(
            "journal backend 'sd-journal' requires building with --features sd-journal"
                .to_string(),
        )),
    }
}
