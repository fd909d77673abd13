// Continuous follow of the tunnel unit's log

use crate::config::Config;
use crate::error::{Result, TunnelError};
use crate::journal::{format_stream_line, open_unit_journal, Journal, JournalSource};
use crate::systemd::UNIT_NAME;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Entries stepped back from the tail before streaming starts
pub const DEFAULT_BACKFILL: usize = 100;

/// Longest a single sink write may take
pub const DEFAULT_WRITE_DEADLINE: Duration = Duration::from_secs(10);

/// Idle wait for new entries while following
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Formatted lines buffered between the journal task and the sink
const LINE_BUFFER: usize = 64;

/// Tunables of a streaming session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOptions {
    pub backfill: usize,
    pub write_deadline: Duration,
    pub poll_interval: Duration,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            backfill: DEFAULT_BACKFILL,
            write_deadline: DEFAULT_WRITE_DEADLINE,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl From<&Config> for StreamOptions {
    fn from(config: &Config) -> Self {
        Self {
            backfill: config.backfill_entries,
            write_deadline: Duration::from_secs(config.write_deadline_secs),
            poll_interval: Duration::from_millis(config.follow_poll_millis),
        }
    }
}

/// Streams the tunnel unit's log lines into a sink
///
/// Every session opens its own journal handle on a blocking thread, so any
/// number of sessions can run side by side.
#[derive(Clone)]
pub struct LogStreamer {
    source: Arc<dyn JournalSource>,
    options: StreamOptions,
}

impl LogStreamer {
    pub fn new(source: Arc<dyn JournalSource>) -> Self {
        Self::with_options(source, StreamOptions::default())
    }

    pub fn with_options(source: Arc<dyn JournalSource>, options: StreamOptions) -> Self {
        Self { source, options }
    }

    pub fn options(&self) -> &StreamOptions {
        &self.options
    }

    /// Replay the backfill window, then keep writing new lines to `sink`.
    ///
    /// With `follow` unset the call returns once the journal has nothing newer.
    /// With `follow` set it only returns when `cancel` fires (success) or on
    /// error. A failed or overdue write ends the stream with `LogWriteFailed`.
    /// The journal handle is released before this returns.
    pub async fn stream_logs<W>(
        &self,
        cancel: CancellationToken,
        sink: &mut W,
        follow: bool,
    ) -> Result<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let stop = cancel.child_token();
        // Dropping this future mid-stream also stops the journal task
        let _stop_on_drop = stop.clone().drop_guard();

        let (tx, mut rx) = mpsc::channel::<String>(LINE_BUFFER);
        let source = Arc::clone(&self.source);
        let options = self.options.clone();
        let reader_stop = stop.clone();
        let reader = tokio::task::spawn_blocking(move || {
            follow_journal(source.as_ref(), &options, follow, &reader_stop, &tx)
        });

        tracing::debug!("Streaming logs for {} (follow: {})", UNIT_NAME, follow);

        let written = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break Ok(()),
                line = rx.recv() => match line {
                    Some(line) => {
                        if let Err(e) = write_line(sink, line.as_bytes(), self.options.write_deadline).await {
                            tracing::debug!("Log sink write failed: {}", e);
                            break Err(TunnelError::LogWriteFailed(e));
                        }
                    }
                    None => break Ok(()),
                },
            }
        };

        stop.cancel();
        drop(rx);

        let read = reader
            .await
            .map_err(|e| TunnelError::log_access("join journal reader", io::Error::other(e)))?;

        written?;
        read?;

        if cancel.is_cancelled() {
            tracing::debug!("Log stream for {} cancelled", UNIT_NAME);
        } else {
            tracing::debug!("Log stream for {} finished", UNIT_NAME);
        }
        Ok(())
    }
}

async fn write_line<W>(sink: &mut W, line: &[u8], deadline: Duration) -> io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let write = async {
        sink.write_all(line).await?;
        sink.flush().await
    };
    match tokio::time::timeout(deadline, write).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("write exceeded {:?} deadline", deadline),
        )),
    }
}

/// Blocking half of a session: walks the journal and hands lines to the writer
fn follow_journal(
    source: &dyn JournalSource,
    options: &StreamOptions,
    follow: bool,
    stop: &CancellationToken,
    tx: &mpsc::Sender<String>,
) -> Result<()> {
    let mut journal = open_unit_journal(source, UNIT_NAME)?;

    let stepped_back = step_back(journal.as_mut(), options.backfill);
    // The handle rests on the oldest backfill entry; emit it before stepping forward
    let mut replay_current = stepped_back > 0;

    loop {
        if stop.is_cancelled() {
            return Ok(());
        }

        let advanced = if replay_current {
            replay_current = false;
            true
        } else {
            journal
                .next()
                .map_err(|e| TunnelError::log_access("read next entry", e))?
        };

        if !advanced {
            if !follow {
                return Ok(());
            }
            if let Err(e) = journal.wait(options.poll_interval) {
                tracing::warn!("Journal wait failed: {}", e);
                std::thread::sleep(options.poll_interval);
            }
            continue;
        }

        let raw = match journal.entry() {
            Ok(raw) => raw,
            Err(e) => {
                tracing::trace!("Skipping undecodable journal entry: {}", e);
                continue;
            }
        };

        let Some(line) = format_stream_line(&raw) else {
            continue;
        };

        if tx.blocking_send(line).is_err() {
            // Writer side is gone: cancelled or the sink failed
            return Ok(());
        }
    }
}

/// Step back up to `window` entries, stopping quietly at the head of the journal
fn step_back(journal: &mut dyn Journal, window: usize) -> usize {
    let mut stepped = 0;
    while stepped < window {
        match journal.previous() {
            Ok(true) => stepped += 1,
            Ok(false) => break,
            Err(e) => {
                tracing::debug!("Backfill stopped after {} entries: {}", stepped, e);
                break;
            }
        }
    }
    stepped
}
