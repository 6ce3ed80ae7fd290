use std::convert::Infallible;

use journal_events::{Cursor, EventName, Priority};
use tokio::{io::AsyncWrite, time};
use tracing::{debug, error, info, warn};

use crate::{
    controls::StreamConfig,
    emitter::EventEmitter,
    filter::{display_command, filter_args, ReaderRequest},
    multiplexer::{DrainMode, StreamMultiplexer},
    process::Supervisor,
    BridgeError, BridgeSettings,
};

/// Everything a connection needs to know, fixed before the first event is written.
#[derive(Debug, Clone)]
pub struct StreamContext {
    pub config: StreamConfig,
    pub settings: BridgeSettings,
}

impl StreamContext {
    pub fn new(config: StreamConfig, settings: BridgeSettings) -> Self {
        Self { config, settings }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Replay,
    Follow,
}

/// Drives one connection: banner, optional bounded replay, then an endless follow loop.
pub struct PlaybackController<S, W> {
    supervisor: S,
    emitter: EventEmitter<W>,
    context: StreamContext,
    filters: Vec<String>,
    multiplexer: StreamMultiplexer,
    phase: Phase,
}

impl<S, W> PlaybackController<S, W>
where
    S: Supervisor,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(supervisor: S, emitter: EventEmitter<W>, context: StreamContext) -> Self {
        let filters = filter_args(&context.config);
        let multiplexer = StreamMultiplexer::new(&context.settings, context.config.heartbeat());
        Self {
            supervisor,
            emitter,
            context,
            filters,
            multiplexer,
            phase: Phase::Idle,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Streams until the transport fails or a fault occurs; the follow phase never ends on its
    /// own. Faults are reported to the consumer as a final internal error event.
    pub async fn run(&mut self) -> Result<Infallible, BridgeError> {
        let result = self.stream().await;
        if let Err(err) = &result {
            if err.is_fault() {
                error!(%err, phase = ?self.phase, "connection fault");
                let playback = self.phase == Phase::Replay;
                let _ = self
                    .emitter
                    .internal(format!("[bridge fault] {err}"), Priority::Error, playback)
                    .await;
            } else {
                debug!(%err, "connection ended");
            }
        }
        result
    }

    async fn stream(&mut self) -> Result<Infallible, BridgeError> {
        let summary = self.context.config.summary();
        info!(%summary, "connection started");
        self.emitter
            .internal(format!("SSE connected. {summary}"), Priority::Info, false)
            .await?;

        let mut carry = self.context.config.resume_cursor().cloned();
        if self.context.config.replay_enabled() {
            carry = self.replay(carry).await?;
        }
        self.follow(carry).await
    }

    async fn replay(&mut self, start: Option<Cursor>) -> Result<Option<Cursor>, BridgeError> {
        self.phase = Phase::Replay;
        let request = ReaderRequest::Replay {
            backlog: self.context.config.backlog(),
            after: start.clone(),
        };
        let argv = request.argv(&self.filters);
        let command = display_command(self.supervisor.binary(), &argv);
        info!(%command, "replay starting");

        self.emitter.boundary(EventName::PlaybackStart).await?;
        self.debug_notice("journalctl replay starting", true).await?;
        self.debug_notice(format!("journalctl replay cmd: {command}"), true)
            .await?;

        let carry = match self.supervisor.spawn(&argv, DrainMode::Replay).await {
            Ok(mut handle) => {
                let summary = self
                    .multiplexer
                    .drain(&mut self.emitter, &mut handle, DrainMode::Replay)
                    .await?;
                self.debug_notice("journalctl replay complete", true).await?;
                summary.last_cursor.or(start)
            }
            Err(err) => {
                warn!(%err, "journalctl replay failed");
                self.emitter
                    .internal(
                        format!("journalctl replay failed: {}", err.diagnostic()),
                        Priority::Error,
                        false,
                    )
                    .await?;
                start
            }
        };

        self.emitter.boundary(EventName::PlaybackEnd).await?;
        Ok(carry)
    }

    async fn follow(&mut self, mut carry: Option<Cursor>) -> Result<Infallible, BridgeError> {
        self.phase = Phase::Follow;
        info!("follow loop entering");
        self.debug_notice("journalctl follow loop entering", false)
            .await?;

        loop {
            let argv = ReaderRequest::Follow {
                after: carry.clone(),
            }
            .argv(&self.filters);
            let command = display_command(self.supervisor.binary(), &argv);
            self.debug_notice("journalctl follow starting", false).await?;
            self.debug_notice(format!("journalctl follow cmd: {command}"), false)
                .await?;

            match self.supervisor.spawn(&argv, DrainMode::Follow).await {
                Ok(mut handle) => {
                    let summary = self
                        .multiplexer
                        .drain(&mut self.emitter, &mut handle, DrainMode::Follow)
                        .await?;
                    if summary.last_cursor.is_some() {
                        carry = summary.last_cursor;
                    }
                    if !self.context.config.playback_enabled() {
                        carry = None;
                    }
                    warn!(
                        code = ?summary.exit.code,
                        entries = summary.entries,
                        "journalctl follow exited; restarting"
                    );
                    self.emitter
                        .internal("journalctl follow restarted", Priority::Warning, false)
                        .await?;
                }
                Err(err) => {
                    warn!(%err, "journalctl follow failed");
                    self.emitter
                        .internal(
                            format!("journalctl follow failed: {}", err.diagnostic()),
                            Priority::Error,
                            false,
                        )
                        .await?;
                    time::sleep(self.context.settings.restart()).await;
                }
            }
        }
    }

    async fn debug_notice(
        &mut self,
        message: impl Into<String>,
        playback: bool,
    ) -> Result<(), BridgeError> {
        self.emitter
            .internal(message, Priority::Debug, playback)
            .await
    }
}
