use std::{
    fmt, io,
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
    time::Duration,
};

use async_trait::async_trait;
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::{Child, Command},
    time,
};
use tracing::debug;

use crate::{multiplexer::DrainMode, SpawnError};

pub type PipeReader = Box<dyn AsyncRead + Send + Unpin>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pipe {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    pub code: Option<i32>,
}

impl From<ExitStatus> for ProcessExit {
    fn from(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

/// Liveness and teardown of a spawned reader, separate from its pipes.
#[async_trait]
pub trait ChildProcess: Send {
    /// Non-blocking exit check.
    fn try_exit(&mut self) -> io::Result<Option<ProcessExit>>;

    /// Kills the process if it is still running and reaps it.
    async fn terminate(&mut self) -> io::Result<ProcessExit>;
}

struct SpawnedChild(Child);

#[async_trait]
impl ChildProcess for SpawnedChild {
    fn try_exit(&mut self) -> io::Result<Option<ProcessExit>> {
        Ok(self.0.try_wait()?.map(ProcessExit::from))
    }

    async fn terminate(&mut self) -> io::Result<ProcessExit> {
        if let Some(status) = self.0.try_wait()? {
            return Ok(status.into());
        }
        if let Err(err) = self.0.start_kill() {
            if err.kind() != io::ErrorKind::InvalidInput {
                return Err(err);
            }
        }
        Ok(self.0.wait().await?.into())
    }
}

/// A running (or recently exited) reader with its two output pipes.
///
/// Pipe open flags are tracked independently of process liveness: a pipe is closed once it
/// reports EOF or fails, or when the handle is terminated.
pub struct ProcessHandle {
    stdout: Option<PipeReader>,
    stderr: Option<PipeReader>,
    child: Box<dyn ChildProcess>,
    exit: Option<ProcessExit>,
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("stdout_open", &self.stdout.is_some())
            .field("stderr_open", &self.stderr.is_some())
            .field("exit", &self.exit)
            .finish()
    }
}

impl ProcessHandle {
    pub fn new(stdout: PipeReader, stderr: PipeReader, child: Box<dyn ChildProcess>) -> Self {
        Self {
            stdout: Some(stdout),
            stderr: Some(stderr),
            child,
            exit: None,
        }
    }

    pub fn has_exited(&mut self) -> io::Result<bool> {
        if self.exit.is_none() {
            self.exit = self.child.try_exit()?;
        }
        Ok(self.exit.is_some())
    }

    pub fn is_open(&self, pipe: Pipe) -> bool {
        match pipe {
            Pipe::Stdout => self.stdout.is_some(),
            Pipe::Stderr => self.stderr.is_some(),
        }
    }

    pub fn any_open(&self) -> bool {
        self.stdout.is_some() || self.stderr.is_some()
    }

    pub fn close(&mut self, pipe: Pipe) {
        match pipe {
            Pipe::Stdout => self.stdout = None,
            Pipe::Stderr => self.stderr = None,
        }
    }

    /// Waits until either open pipe yields data or EOF. Pending forever when both are closed.
    pub async fn read_ready(
        &mut self,
        out_buf: &mut [u8],
        err_buf: &mut [u8],
    ) -> (Pipe, io::Result<usize>) {
        let stdout = self.stdout.as_mut();
        let stderr = self.stderr.as_mut();
        tokio::select! {
            read = read_open(stdout, out_buf) => (Pipe::Stdout, read),
            read = read_open(stderr, err_buf) => (Pipe::Stderr, read),
        }
    }

    /// Reads whatever is immediately available on one pipe; `Ok(None)` when nothing is.
    pub async fn read_now(&mut self, pipe: Pipe, buf: &mut [u8]) -> io::Result<Option<usize>> {
        let reader = match pipe {
            Pipe::Stdout => self.stdout.as_mut(),
            Pipe::Stderr => self.stderr.as_mut(),
        };
        let Some(reader) = reader else {
            return Ok(Some(0));
        };
        match time::timeout(Duration::ZERO, reader.read(buf)).await {
            Ok(read) => read.map(Some),
            Err(_) => Ok(None),
        }
    }

    /// Closes both pipes, kills the process if needed and reaps it. Safe to call repeatedly.
    pub async fn terminate(&mut self) -> io::Result<ProcessExit> {
        self.stdout = None;
        self.stderr = None;
        if let Some(exit) = self.exit {
            return Ok(exit);
        }
        let exit = self.child.terminate().await?;
        self.exit = Some(exit);
        Ok(exit)
    }
}

async fn read_open(pipe: Option<&mut PipeReader>, buf: &mut [u8]) -> io::Result<usize> {
    match pipe {
        Some(reader) => reader.read(buf).await,
        None => std::future::pending().await,
    }
}

/// Starts reader processes for a connection.
#[async_trait]
pub trait Supervisor: Send + Sync {
    fn binary(&self) -> &Path;

    /// Starts a reader for `mode`. A reader already gone after the grace period is a
    /// [`SpawnError`], except a replay that wrote entries before exiting.
    async fn spawn(&self, argv: &[String], mode: DrainMode) -> Result<ProcessHandle, SpawnError>;
}

/// Spawns the real `journalctl` with stdin closed and both output streams piped.
#[derive(Debug, Clone)]
pub struct JournalctlSupervisor {
    binary: PathBuf,
    grace: Duration,
}

impl JournalctlSupervisor {
    pub fn new(binary: impl Into<PathBuf>, grace: Duration) -> Self {
        Self {
            binary: binary.into(),
            grace,
        }
    }
}

#[async_trait]
impl Supervisor for JournalctlSupervisor {
    fn binary(&self) -> &Path {
        &self.binary
    }

    async fn spawn(&self, argv: &[String], mode: DrainMode) -> Result<ProcessHandle, SpawnError> {
        let mut command = Command::new(&self.binary);
        command
            .args(argv)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(binary = ?self.binary, ?argv, ?mode, "spawning journalctl");
        let mut child = spawn_with_retry(&mut command, &self.binary)?;
        let mut stdout = child.stdout.take().ok_or(SpawnError::MissingStdout)?;
        let mut stderr = child.stderr.take().ok_or(SpawnError::MissingStderr)?;

        time::sleep(self.grace).await;
        let status = child.try_wait().map_err(|source| SpawnError::Spawn {
            binary: self.binary.clone(),
            source,
        })?;

        let Some(status) = status else {
            return Ok(ProcessHandle::new(
                Box::new(stdout),
                Box::new(stderr),
                Box::new(SpawnedChild(child)),
            ));
        };

        let out = read_available(&mut stdout, self.grace).await;
        let err = read_available(&mut stderr, self.grace).await;
        if let Some(failure) = exited_during_grace(mode, status.code(), &out, &err) {
            debug!(code = ?status.code(), %failure, "journalctl exited during grace period");
            return Err(failure);
        }

        let mut handle = ProcessHandle::new(
            Box::new(io::Cursor::new(out).chain(stdout)),
            Box::new(io::Cursor::new(err).chain(stderr)),
            Box::new(SpawnedChild(child)),
        );
        handle.exit = Some(status.into());
        Ok(handle)
    }
}

/// Classifies a reader that exited before the grace period ran out.
///
/// A follow reader must still be running, so any exit is a failed start. A replay reader may
/// finish a short backlog that quickly, but only if it produced entries. A silent exit is a
/// failure even with status 0.
pub(crate) fn exited_during_grace(
    mode: DrainMode,
    code: Option<i32>,
    stdout: &[u8],
    stderr: &[u8],
) -> Option<SpawnError> {
    if mode == DrainMode::Replay && !stdout.is_empty() {
        return None;
    }
    let diagnostic = String::from_utf8_lossy(stderr).trim().to_string();
    Some(SpawnError::ExitedImmediately {
        code,
        diagnostic: if diagnostic.is_empty() {
            "process exited immediately".to_string()
        } else {
            diagnostic
        },
    })
}

async fn read_available<R: AsyncRead + Unpin>(reader: &mut R, limit: Duration) -> Vec<u8> {
    let mut buf = Vec::new();
    // A lingering grandchild can hold the pipe open; keep what arrived before the limit.
    let _ = time::timeout(limit, reader.read_to_end(&mut buf)).await;
    buf
}

fn spawn_with_retry(command: &mut Command, binary: &Path) -> Result<Child, SpawnError> {
    let mut backoff = Duration::from_millis(2);
    let mut attempt = 0;
    loop {
        match command.spawn() {
            Ok(child) => return Ok(child),
            Err(source) => {
                // ETXTBSY: the binary was written moments ago and is still open for writing.
                let is_busy = source.raw_os_error() == Some(26);
                if is_busy && attempt < 4 {
                    attempt += 1;
                    std::thread::sleep(backoff);
                    backoff = std::cmp::min(backoff * 2, Duration::from_millis(50));
                    continue;
                }
                return Err(SpawnError::Spawn {
                    binary: binary.to_path_buf(),
                    source,
                });
            }
        }
    }
}
