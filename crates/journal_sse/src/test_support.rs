use std::{
    collections::VecDeque,
    io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use journal_events::{decode_frames, SseFrame};
use tokio::io::{AsyncReadExt, DuplexStream};

use crate::{
    emitter::EventEmitter,
    multiplexer::DrainMode,
    process::{
        exited_during_grace, ChildProcess, PipeReader, ProcessExit, ProcessHandle, Supervisor,
    },
    SpawnError,
};

struct FakeChild {
    exit: Option<ProcessExit>,
    // Write halves that keep the fake pipes open until teardown.
    holds: Vec<DuplexStream>,
}

#[async_trait]
impl ChildProcess for FakeChild {
    fn try_exit(&mut self) -> io::Result<Option<ProcessExit>> {
        Ok(self.exit)
    }

    async fn terminate(&mut self) -> io::Result<ProcessExit> {
        self.holds.clear();
        let exit = *self.exit.get_or_insert(ProcessExit { code: None });
        Ok(exit)
    }
}

fn finite_pipe(bytes: &str) -> PipeReader {
    Box::new(io::Cursor::new(bytes.as_bytes().to_vec()))
}

fn open_pipe(bytes: &str, holds: &mut Vec<DuplexStream>) -> PipeReader {
    let (writer, reader) = tokio::io::duplex(64);
    holds.push(writer);
    Box::new(io::Cursor::new(bytes.as_bytes().to_vec()).chain(reader))
}

/// A reader that wrote everything and exited with `code`.
pub(crate) fn exited_process(stdout: &str, stderr: &str, code: i32) -> ProcessHandle {
    let child = FakeChild {
        exit: Some(ProcessExit { code: Some(code) }),
        holds: Vec::new(),
    };
    ProcessHandle::new(finite_pipe(stdout), finite_pipe(stderr), Box::new(child))
}

/// A reader that wrote its output and stays alive with both pipes open.
pub(crate) fn running_process(stdout: &str, stderr: &str) -> ProcessHandle {
    let mut holds = Vec::new();
    let out = open_pipe(stdout, &mut holds);
    let err = open_pipe(stderr, &mut holds);
    let child = FakeChild { exit: None, holds };
    ProcessHandle::new(out, err, Box::new(child))
}

/// A reader that exited while something else still holds its pipes open.
pub(crate) fn lingering_process(stdout: &str, code: i32) -> ProcessHandle {
    let mut holds = Vec::new();
    let out = open_pipe(stdout, &mut holds);
    let err = open_pipe("", &mut holds);
    let child = FakeChild {
        exit: Some(ProcessExit { code: Some(code) }),
        holds,
    };
    ProcessHandle::new(out, err, Box::new(child))
}

#[derive(Debug, Clone)]
pub(crate) enum Step {
    Fail(String),
    /// Exits after the grace period, so the output is always drained.
    Exit {
        stdout: String,
        stderr: String,
        code: i32,
    },
    /// Exits before the grace period ends and goes through the supervisor's early-exit rule.
    Early {
        stdout: String,
        stderr: String,
        code: i32,
    },
}

impl Step {
    pub(crate) fn exit(stdout: &str, code: i32) -> Self {
        Step::Exit {
            stdout: stdout.to_string(),
            stderr: String::new(),
            code,
        }
    }

    pub(crate) fn early(stdout: &str, code: i32) -> Self {
        Step::Early {
            stdout: stdout.to_string(),
            stderr: String::new(),
            code,
        }
    }
}

/// Hands out scripted processes in order, then idle running ones once the script is used up.
pub(crate) struct ScriptedSupervisor {
    binary: PathBuf,
    steps: Mutex<VecDeque<Step>>,
    calls: Arc<Mutex<Vec<Vec<String>>>>,
}

impl ScriptedSupervisor {
    pub(crate) fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            binary: PathBuf::from("/usr/bin/journalctl"),
            steps: Mutex::new(steps.into_iter().collect()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn calls(&self) -> Arc<Mutex<Vec<Vec<String>>>> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Supervisor for ScriptedSupervisor {
    fn binary(&self) -> &Path {
        &self.binary
    }

    async fn spawn(&self, argv: &[String], mode: DrainMode) -> Result<ProcessHandle, SpawnError> {
        self.calls.lock().expect("calls lock").push(argv.to_vec());
        let step = self.steps.lock().expect("steps lock").pop_front();
        match step {
            Some(Step::Fail(diagnostic)) => Err(SpawnError::ExitedImmediately {
                code: Some(1),
                diagnostic,
            }),
            Some(Step::Exit {
                stdout,
                stderr,
                code,
            }) => Ok(exited_process(&stdout, &stderr, code)),
            Some(Step::Early {
                stdout,
                stderr,
                code,
            }) => match exited_during_grace(
                mode,
                Some(code),
                stdout.as_bytes(),
                stderr.as_bytes(),
            ) {
                Some(failure) => Err(failure),
                None => Ok(exited_process(&stdout, &stderr, code)),
            },
            None => Ok(running_process("", "")),
        }
    }
}

/// Consumer end of an in-memory connection.
pub(crate) struct FrameReader {
    inner: DuplexStream,
    pending: String,
}

impl FrameReader {
    pub(crate) async fn next(&mut self) -> SseFrame {
        loop {
            if let Some(end) = self.pending.find("\n\n") {
                let chunk: String = self.pending.drain(..end + 2).collect();
                return decode_frames(&chunk)
                    .into_iter()
                    .next()
                    .expect("complete frame");
            }
            let mut buf = [0u8; 4096];
            let n = self.inner.read(&mut buf).await.expect("read stream");
            assert!(n > 0, "stream ended");
            self.pending
                .push_str(std::str::from_utf8(&buf[..n]).expect("utf8 stream"));
        }
    }

    /// Reads frames until one carries `message`, returning everything read on the way.
    pub(crate) async fn until_message(&mut self, message: &str) -> Vec<SseFrame> {
        let mut seen = Vec::new();
        loop {
            let frame = self.next().await;
            let done = frame
                .payload()
                .map(|event| event.message == message)
                .unwrap_or(false);
            seen.push(frame);
            if done {
                return seen;
            }
        }
    }
}

pub(crate) fn connection() -> (EventEmitter<DuplexStream>, FrameReader) {
    let (writer, reader) = tokio::io::duplex(1 << 16);
    let emitter = EventEmitter::new(
        writer,
        journal_events::InternalOrigin::new("journal-sse"),
        Some("wsprrypi.service".to_string()),
    );
    let reader = FrameReader {
        inner: reader,
        pending: String::new(),
    };
    (emitter, reader)
}
