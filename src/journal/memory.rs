// In-memory journal used by the reader and streamer tests

use crate::journal::{Journal, JournalSource, RawEntry, UNIT_FIELD};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Journal operation that can be told to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FailPoint {
    Open,
    Match,
    Seek,
    Next,
}

#[derive(Debug, Clone)]
struct Record {
    unit: String,
    realtime_usec: u64,
    message: String,
    priority: String,
    corrupt: bool,
}

#[derive(Debug, Default)]
struct State {
    records: Vec<Record>,
    failures: Vec<FailPoint>,
    opened: usize,
    open_handles: usize,
}

/// Shared append-only journal; every `open` hands out an independent handle
#[derive(Debug, Clone, Default)]
pub(crate) struct MemoryJournal {
    state: Arc<Mutex<State>>,
}

impl MemoryJournal {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub(crate) fn push(&self, unit: &str, realtime_usec: u64, message: &str) {
        self.push_with_priority(unit, realtime_usec, message, "6");
    }

    pub(crate) fn push_with_priority(
        &self,
        unit: &str,
        realtime_usec: u64,
        message: &str,
        priority: &str,
    ) {
        self.lock().records.push(Record {
            unit: unit.to_string(),
            realtime_usec,
            message: message.to_string(),
            priority: priority.to_string(),
            corrupt: false,
        });
    }

    /// Append an entry whose fields cannot be decoded
    pub(crate) fn push_corrupt(&self, unit: &str, realtime_usec: u64) {
        self.lock().records.push(Record {
            unit: unit.to_string(),
            realtime_usec,
            message: "unreadable".to_string(),
            priority: String::new(),
            corrupt: true,
        });
    }

    pub(crate) fn fail_on(&self, point: FailPoint) {
        self.lock().failures.push(point);
    }

    /// Handles opened so far
    pub(crate) fn opened(&self) -> usize {
        self.lock().opened
    }

    /// Handles currently open (not yet dropped)
    pub(crate) fn open_handles(&self) -> usize {
        self.lock().open_handles
    }
}

impl JournalSource for MemoryJournal {
    fn open(&self) -> io::Result<Box<dyn Journal>> {
        let mut state = self.lock();
        if state.failures.contains(&FailPoint::Open) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "open refused"));
        }
        state.opened += 1;
        state.open_handles += 1;
        Ok(Box::new(MemoryHandle {
            state: Arc::clone(&self.state),
            filter: None,
            cursor: Cursor::Between(0),
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    /// Between entries, before record index `n`
    Between(usize),
    /// On record index `n`
    At(usize),
}

struct MemoryHandle {
    state: Arc<Mutex<State>>,
    filter: Option<String>,
    cursor: Cursor,
}

impl MemoryHandle {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    fn check(&self, point: FailPoint) -> io::Result<()> {
        if self.lock().failures.contains(&point) {
            return Err(io::Error::other(format!("{:?} failed", point)));
        }
        Ok(())
    }

    fn matches(&self, record: &Record) -> bool {
        self.filter.as_deref().map_or(true, |unit| record.unit == unit)
    }
}

impl Journal for MemoryHandle {
    fn add_match(&mut self, field: &str, value: &str) -> io::Result<()> {
        self.check(FailPoint::Match)?;
        if field != UNIT_FIELD {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unsupported match field {}", field),
            ));
        }
        self.filter = Some(value.to_string());
        Ok(())
    }

    fn seek_tail(&mut self) -> io::Result<()> {
        self.check(FailPoint::Seek)?;
        let len = self.lock().records.len();
        self.cursor = Cursor::Between(len);
        Ok(())
    }

    fn previous(&mut self) -> io::Result<bool> {
        let upper = match self.cursor {
            Cursor::Between(n) | Cursor::At(n) => n,
        };
        let found = {
            let state = self.lock();
            state.records[..upper.min(state.records.len())]
                .iter()
                .rposition(|r| self.matches(r))
        };
        Ok(match found {
            Some(index) => {
                self.cursor = Cursor::At(index);
                true
            }
            None => false,
        })
    }

    fn next(&mut self) -> io::Result<bool> {
        self.check(FailPoint::Next)?;
        let lower = match self.cursor {
            Cursor::Between(n) => n,
            Cursor::At(n) => n + 1,
        };
        let found = {
            let state = self.lock();
            state
                .records
                .iter()
                .enumerate()
                .skip(lower)
                .find(|(_, r)| self.matches(r))
                .map(|(index, _)| index)
        };
        Ok(match found {
            Some(index) => {
                self.cursor = Cursor::At(index);
                true
            }
            None => false,
        })
    }

    fn entry(&mut self) -> io::Result<RawEntry> {
        let Cursor::At(index) = self.cursor else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "handle is not on an entry",
            ));
        };
        let state = self.lock();
        let record = &state.records[index];
        if record.corrupt {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "bad message object"));
        }
        Ok(RawEntry {
            realtime_usec: record.realtime_usec,
            message: record.message.clone(),
            priority: record.priority.clone(),
        })
    }

    fn wait(&mut self, timeout: Duration) -> io::Result<()> {
        std::thread::sleep(timeout);
        Ok(())
    }
}

impl Drop for MemoryHandle {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.open_handles -= 1;
        }
    }
}
