// Journal handle backed by the journalctl binary

use crate::journal::{Journal, JournalSource, RawEntry};
use serde_json::{Map, Value};
use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

/// Entries requested the first time a handle looks back from the tail
const INITIAL_WINDOW: usize = 128;

/// Consumed entries kept in memory before the buffer is compacted
const COMPACT_AFTER: usize = 4096;

/// Opens handles that query the journal through `journalctl -o json`
#[derive(Debug, Clone)]
pub struct JournalctlSource {
    program: PathBuf,
}

impl JournalctlSource {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for JournalctlSource {
    fn default() -> Self {
        Self::new("journalctl")
    }
}

impl JournalSource for JournalctlSource {
    fn open(&self) -> io::Result<Box<dyn Journal>> {
        Ok(Box::new(JournalctlJournal {
            program: self.program.clone(),
            matches: Vec::new(),
            records: Vec::new(),
            position: Position::Between(0),
            window: 0,
            at_head: false,
        }))
    }
}

/// One line of `journalctl -o json` output
#[derive(Debug, Clone)]
pub(crate) struct Record {
    pub(crate) cursor: String,
    pub(crate) entry: std::result::Result<RawEntry, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Between(usize),
    At(usize),
}

/// Cursor emulation over a window of consecutive entries.
///
/// `records` always holds a contiguous run of matching entries. Stepping back
/// past its start fetches a wider tail window and splices in what precedes the
/// first known cursor; stepping forward past its end asks for entries after
/// the last known cursor.
struct JournalctlJournal {
    program: PathBuf,
    matches: Vec<String>,
    records: Vec<Record>,
    position: Position,
    window: usize,
    at_head: bool,
}

impl JournalctlJournal {
    fn query(&self, extra: &[String]) -> io::Result<Vec<Record>> {
        let output = Command::new(&self.program)
            .args(&self.matches)
            .args(["--output=json", "--all", "--no-pager", "--quiet"])
            .args(extra)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(io::Error::other(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                stderr.trim()
            )));
        }

        Ok(parse_output(&String::from_utf8_lossy(&output.stdout)))
    }

    fn tail(&self, lines: usize) -> io::Result<Vec<Record>> {
        self.query(&[format!("--lines={}", lines)])
    }

    /// Pull in entries older than the first buffered one; `false` at the head
    fn extend_backwards(&mut self) -> io::Result<bool> {
        if self.at_head {
            return Ok(false);
        }
        let Some(first) = self.records.first().map(|r| r.cursor.clone()) else {
            return Ok(false);
        };

        loop {
            self.window = (self.window.max(INITIAL_WINDOW)) * 2;
            let fetched = self.tail(self.window)?;
            let complete = fetched.len() < self.window;

            if let Some(older) = entries_before(fetched, &first) {
                if complete {
                    self.at_head = true;
                }
                if !older.is_empty() {
                    let added = older.len();
                    self.records.splice(0..0, older);
                    self.position = match self.position {
                        Position::Between(n) => Position::Between(n + added),
                        Position::At(n) => Position::At(n + added),
                    };
                    return Ok(true);
                }
                if complete {
                    return Ok(false);
                }
                // Newer entries filled the window right up to the first buffered one
                continue;
            }

            if complete {
                // The first buffered entry has been rotated out of the journal
                self.at_head = true;
                return Ok(false);
            }
        }
    }

    /// Append entries written after the last buffered one; `false` if none
    fn extend_forwards(&mut self) -> io::Result<bool> {
        let fetched = match self.records.last() {
            Some(last) => self.query(&[format!("--after-cursor={}", last.cursor)])?,
            None => self.query(&[])?,
        };
        if fetched.is_empty() {
            return Ok(false);
        }
        self.records.extend(fetched);
        Ok(true)
    }

    fn compact(&mut self, index: usize) {
        if index < COMPACT_AFTER {
            return;
        }
        self.records.drain(..index);
        self.position = Position::At(0);
        self.at_head = false;
        self.window = 0;
    }
}

impl Journal for JournalctlJournal {
    fn add_match(&mut self, field: &str, value: &str) -> io::Result<()> {
        if field.is_empty() || field.contains('=') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid journal field '{}'", field),
            ));
        }
        self.matches.push(format!("{}={}", field, value));
        Ok(())
    }

    fn seek_tail(&mut self) -> io::Result<()> {
        self.records = self.tail(INITIAL_WINDOW)?;
        self.window = INITIAL_WINDOW;
        self.at_head = self.records.len() < INITIAL_WINDOW;
        self.position = Position::Between(self.records.len());
        Ok(())
    }

    fn previous(&mut self) -> io::Result<bool> {
        let upper = match self.position {
            Position::Between(n) | Position::At(n) => n,
        };
        if upper == 0 && !self.extend_backwards()? {
            return Ok(false);
        }
        let upper = match self.position {
            Position::Between(n) | Position::At(n) => n,
        };
        self.position = Position::At(upper - 1);
        Ok(true)
    }

    fn next(&mut self) -> io::Result<bool> {
        let lower = match self.position {
            Position::Between(n) => n,
            Position::At(n) => n + 1,
        };
        if lower >= self.records.len() && !self.extend_forwards()? {
            return Ok(false);
        }
        self.position = Position::At(lower);
        self.compact(lower);
        Ok(true)
    }

    fn entry(&mut self) -> io::Result<RawEntry> {
        let Position::At(index) = self.position else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "handle is not on an entry",
            ));
        };
        match &self.records[index].entry {
            Ok(raw) => Ok(raw.clone()),
            Err(e) => Err(io::Error::new(io::ErrorKind::InvalidData, e.clone())),
        }
    }

    fn wait(&mut self, timeout: Duration) -> io::Result<()> {
        std::thread::sleep(timeout);
        Ok(())
    }
}

/// Entries of a tail window that precede `cursor`, or `None` if the window
/// does not reach back that far
pub(crate) fn entries_before(mut fetched: Vec<Record>, cursor: &str) -> Option<Vec<Record>> {
    let index = fetched.iter().position(|r| r.cursor == cursor)?;
    fetched.truncate(index);
    Some(fetched)
}

pub(crate) fn parse_output(output: &str) -> Vec<Record> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match parse_record(line) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::debug!("Ignoring journalctl output line: {}", e);
                None
            }
        })
        .collect()
}

/// Parse one JSON object; fails only when the entry cannot be positioned
pub(crate) fn parse_record(line: &str) -> std::result::Result<Record, String> {
    let fields: Map<String, Value> =
        serde_json::from_str(line).map_err(|e| format!("malformed JSON: {}", e))?;

    let cursor = match fields.get("__CURSOR") {
        Some(Value::String(cursor)) => cursor.clone(),
        _ => return Err("entry has no __CURSOR".to_string()),
    };

    Ok(Record {
        cursor,
        entry: decode_entry(&fields),
    })
}

fn decode_entry(fields: &Map<String, Value>) -> std::result::Result<RawEntry, String> {
    let realtime_usec = match fields.get("__REALTIME_TIMESTAMP") {
        Some(Value::String(value)) => value
            .parse::<u64>()
            .map_err(|e| format!("bad __REALTIME_TIMESTAMP '{}': {}", value, e))?,
        _ => return Err("entry has no __REALTIME_TIMESTAMP".to_string()),
    };

    Ok(RawEntry {
        realtime_usec,
        message: field_text(fields, "MESSAGE")?,
        priority: field_text(fields, "PRIORITY")?,
    })
}

/// journalctl emits binary-safe fields as byte arrays and oversized ones as null
fn field_text(fields: &Map<String, Value>, name: &str) -> std::result::Result<String, String> {
    match fields.get(name) {
        None => Ok(String::new()),
        Some(Value::String(text)) => Ok(text.clone()),
        Some(Value::Array(items)) => {
            let bytes = items
                .iter()
                .map(|item| item.as_u64().and_then(|b| u8::try_from(b).ok()))
                .collect::<Option<Vec<u8>>>()
                .ok_or_else(|| format!("{} is not a byte array", name))?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
        Some(other) => Err(format!("{} has unsupported value {}", name, other)),
    }
}
