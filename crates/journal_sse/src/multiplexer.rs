use std::time::Duration;

use journal_events::{parse_entry_line, BufferedLine, Cursor, LineBuffer, Priority};
use tokio::{
    io::AsyncWrite,
    time::{self, Instant},
};
use tracing::{debug, warn};

use crate::{
    emitter::EventEmitter,
    process::{Pipe, ProcessExit, ProcessHandle},
    BridgeError, BridgeSettings,
};

const READ_CHUNK: usize = 8 * 1024;
const HEARTBEAT_MESSAGE: &str = "[HEARTBEAT]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainMode {
    /// Bounded history read; ends when the reader exits.
    Replay,
    /// Live tail; heartbeats keep the connection visibly alive.
    Follow,
}

impl DrainMode {
    pub fn playback(self) -> bool {
        matches!(self, DrainMode::Replay)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainSummary {
    pub last_cursor: Option<Cursor>,
    pub entries: usize,
    pub exit: ProcessExit,
}

struct DrainState {
    stdout: LineBuffer,
    stderr: LineBuffer,
    last_cursor: Option<Cursor>,
    entries: usize,
}

impl DrainState {
    fn new(max_line_bytes: usize) -> Self {
        Self {
            stdout: LineBuffer::new(max_line_bytes),
            stderr: LineBuffer::new(max_line_bytes),
            last_cursor: None,
            entries: 0,
        }
    }

    fn buffer(&mut self, pipe: Pipe) -> &mut LineBuffer {
        match pipe {
            Pipe::Stdout => &mut self.stdout,
            Pipe::Stderr => &mut self.stderr,
        }
    }
}

/// Pumps one reader process into the event stream.
///
/// Reads are bounded by the poll interval so heartbeats and exit checks happen even when the
/// reader is silent. The heartbeat clock survives across drains, so a follow respawn does not
/// reset it.
#[derive(Debug)]
pub struct StreamMultiplexer {
    poll: Duration,
    idle: Duration,
    heartbeat: Duration,
    max_line_bytes: usize,
    last_heartbeat: Option<Instant>,
}

impl StreamMultiplexer {
    pub fn new(settings: &BridgeSettings, heartbeat: Duration) -> Self {
        Self {
            poll: settings.poll(),
            idle: settings.idle(),
            heartbeat,
            max_line_bytes: settings.line_limit(),
            last_heartbeat: None,
        }
    }

    /// Forwards everything the reader writes until it has exited and both pipes are closed.
    ///
    /// The handle is always terminated before returning, including on error.
    pub async fn drain<W>(
        &mut self,
        emitter: &mut EventEmitter<W>,
        handle: &mut ProcessHandle,
        mode: DrainMode,
    ) -> Result<DrainSummary, BridgeError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let mut state = DrainState::new(self.max_line_bytes);
        let mut result = self.pump(emitter, handle, mode, &mut state).await;
        if result.is_ok() {
            result = flush_partials(emitter, mode, &mut state).await;
        }
        let exit = handle.terminate().await;
        result?;
        let exit = exit.map_err(BridgeError::Wait)?;

        debug!(?mode, entries = state.entries, code = ?exit.code, "drain finished");
        Ok(DrainSummary {
            last_cursor: state.last_cursor,
            entries: state.entries,
            exit,
        })
    }

    async fn pump<W>(
        &mut self,
        emitter: &mut EventEmitter<W>,
        handle: &mut ProcessHandle,
        mode: DrainMode,
        state: &mut DrainState,
    ) -> Result<(), BridgeError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let mut out_buf = vec![0u8; READ_CHUNK];
        let mut err_buf = vec![0u8; READ_CHUNK];

        loop {
            let exited = handle.has_exited().map_err(BridgeError::Wait)?;
            if exited && !handle.any_open() {
                return Ok(());
            }

            if !handle.any_open() {
                if mode == DrainMode::Follow {
                    self.heartbeat_if_due(emitter).await?;
                }
                time::sleep(self.idle).await;
                continue;
            }

            let ready = handle.read_ready(&mut out_buf, &mut err_buf);
            match time::timeout(self.poll, ready).await {
                Err(_) => match mode {
                    DrainMode::Follow => self.heartbeat_if_due(emitter).await?,
                    DrainMode::Replay if exited => {
                        drain_available(handle, state, &mut out_buf).await;
                    }
                    DrainMode::Replay => {}
                },
                Ok((pipe, read)) => {
                    let buf = match pipe {
                        Pipe::Stdout => &out_buf,
                        Pipe::Stderr => &err_buf,
                    };
                    match read {
                        Ok(0) => handle.close(pipe),
                        Ok(n) => state.buffer(pipe).push(&buf[..n]),
                        Err(err) => {
                            warn!(?pipe, %err, "journalctl pipe read failed");
                            handle.close(pipe);
                        }
                    }
                }
            }

            dispatch_ready(emitter, mode, state).await?;
        }
    }

    async fn heartbeat_if_due<W>(
        &mut self,
        emitter: &mut EventEmitter<W>,
    ) -> Result<(), BridgeError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let now = Instant::now();
        let due = self
            .last_heartbeat
            .map_or(true, |last| now.duration_since(last) >= self.heartbeat);
        if due {
            emitter
                .internal(HEARTBEAT_MESSAGE, Priority::Debug, false)
                .await?;
            self.last_heartbeat = Some(now);
        }
        Ok(())
    }
}

/// Empties both pipes of whatever is immediately readable, then closes them.
///
/// Only used once the reader has exited: anything it wrote is already in the pipe, and a
/// descendant still holding a pipe open must not keep the replay alive.
async fn drain_available(handle: &mut ProcessHandle, state: &mut DrainState, buf: &mut [u8]) {
    for pipe in [Pipe::Stderr, Pipe::Stdout] {
        while handle.is_open(pipe) {
            match handle.read_now(pipe, buf).await {
                Ok(Some(n)) if n > 0 => state.buffer(pipe).push(&buf[..n]),
                Ok(_) => handle.close(pipe),
                Err(err) => {
                    warn!(?pipe, %err, "journalctl pipe read failed");
                    handle.close(pipe);
                }
            }
        }
    }
}

async fn dispatch_ready<W>(
    emitter: &mut EventEmitter<W>,
    mode: DrainMode,
    state: &mut DrainState,
) -> Result<(), BridgeError>
where
    W: AsyncWrite + Unpin + Send,
{
    while let Some(line) = state.stderr.next_line() {
        dispatch_stderr(emitter, mode, line).await?;
    }
    while let Some(line) = state.stdout.next_line() {
        dispatch_stdout(emitter, mode, state, line).await?;
    }
    Ok(())
}

async fn flush_partials<W>(
    emitter: &mut EventEmitter<W>,
    mode: DrainMode,
    state: &mut DrainState,
) -> Result<(), BridgeError>
where
    W: AsyncWrite + Unpin + Send,
{
    if let Some(line) = state.stderr.finish() {
        dispatch_stderr(emitter, mode, line).await?;
    }
    if let Some(line) = state.stdout.finish() {
        dispatch_stdout(emitter, mode, state, line).await?;
    }
    dispatch_ready(emitter, mode, state).await
}

async fn dispatch_stderr<W>(
    emitter: &mut EventEmitter<W>,
    mode: DrainMode,
    line: BufferedLine,
) -> Result<(), BridgeError>
where
    W: AsyncWrite + Unpin + Send,
{
    let text = match line {
        BufferedLine::Line { text, .. } => text,
        too_long => return report_too_long(emitter, mode, too_long).await,
    };
    let text = text.trim();
    if text.is_empty() {
        return Ok(());
    }
    emitter
        .internal(
            format!("[journalctl stderr] {text}"),
            Priority::Warning,
            mode.playback(),
        )
        .await
}

async fn dispatch_stdout<W>(
    emitter: &mut EventEmitter<W>,
    mode: DrainMode,
    state: &mut DrainState,
    line: BufferedLine,
) -> Result<(), BridgeError>
where
    W: AsyncWrite + Unpin + Send,
{
    let text = match line {
        BufferedLine::Line { text, .. } => text,
        too_long => return report_too_long(emitter, mode, too_long).await,
    };
    match parse_entry_line(&text) {
        Ok(None) => Ok(()),
        Ok(Some(record)) => {
            if let Some(cursor) = emitter.journal(record, mode.playback()).await? {
                state.last_cursor = Some(cursor);
            }
            state.entries += 1;
            Ok(())
        }
        Err(err) => {
            debug!(%err, "unparsable journalctl output line");
            emitter
                .internal(
                    format!("[journalctl non-json] {}", text.trim()),
                    Priority::Warning,
                    mode.playback(),
                )
                .await
        }
    }
}

async fn report_too_long<W>(
    emitter: &mut EventEmitter<W>,
    mode: DrainMode,
    line: BufferedLine,
) -> Result<(), BridgeError>
where
    W: AsyncWrite + Unpin + Send,
{
    let BufferedLine::LineTooLong {
        observed_bytes,
        max_line_bytes,
        ..
    } = line
    else {
        return Ok(());
    };
    emitter
        .internal(
            format!(
                "[journalctl line too long] observed_bytes={observed_bytes} max_line_bytes={max_line_bytes}"
            ),
            Priority::Warning,
            mode.playback(),
        )
        .await
}
