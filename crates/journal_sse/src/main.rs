use std::{any::Any, env, path::PathBuf, process::ExitCode};

use clap::Parser;
use journal_events::Priority;
use journal_sse::{
    local_origin, serve_connection, BridgeError, BridgeSettings, EventEmitter, RawControls,
    SettingsError, StreamConfig,
};
use tokio::io::AsyncWriteExt;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const CGI_HEADERS: &str = concat!(
    "Content-Type: text/event-stream; charset=utf-8\r\n",
    "Cache-Control: no-cache, no-transform\r\n",
    "X-Accel-Buffering: no\r\n",
    "\r\n",
);

#[derive(Debug, Parser)]
#[command(name = "journal-sse", version)]
#[command(about = "Stream systemd journal entries as Server-Sent Events")]
struct Cli {
    /// Consumer controls as a URL query string (playback, backlog, heartbeat, priority_min,
    /// priority_max, unit).
    #[arg(long, env = "QUERY_STRING", default_value = "")]
    query: String,

    /// Resume token echoed back by the consumer.
    #[arg(long, env = "HTTP_LAST_EVENT_ID")]
    last_event_id: Option<String>,

    /// TOML settings file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// journalctl binary to run instead of the one found on PATH.
    #[arg(long)]
    journalctl: Option<PathBuf>,

    /// Unit to follow when the consumer does not name one.
    #[arg(long)]
    default_unit: Option<String>,

    /// Write CGI response headers before the stream. Implied when GATEWAY_INTERFACE is set.
    #[arg(long)]
    cgi_headers: bool,
}

impl Cli {
    fn settings(&self) -> Result<BridgeSettings, SettingsError> {
        let mut settings = match &self.config {
            Some(path) => BridgeSettings::load(path)?,
            None => BridgeSettings::default(),
        };
        if let Some(binary) = &self.journalctl {
            settings = settings.journalctl(binary);
        }
        if let Some(unit) = &self.default_unit {
            settings = settings.default_unit(unit);
        }
        Ok(settings)
    }

    fn wants_cgi_headers(&self) -> bool {
        self.cgi_headers || env::var_os("GATEWAY_INTERFACE").is_some()
    }
}

fn init_tracing() {
    let filter = match journal_sse::default_rust_log_value() {
        Some(default) => EnvFilter::new(default),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let settings = match cli.settings() {
        Ok(settings) => settings,
        Err(err) => {
            error!(%err, "invalid settings");
            return ExitCode::from(2);
        }
    };
    let controls = RawControls::from_query(&cli.query).with_last_event_id(cli.last_event_id.clone());

    let mut stdout = tokio::io::stdout();
    if cli.wants_cgi_headers() {
        let written = async {
            stdout.write_all(CGI_HEADERS.as_bytes()).await?;
            stdout.flush().await
        };
        if let Err(err) = written.await {
            info!(%err, "consumer gone before headers were written");
            return ExitCode::SUCCESS;
        }
    }

    let tag = settings.tag().to_string();
    let unit = StreamConfig::from_controls(&controls, settings.unit())
        .internal_unit()
        .map(str::to_string);
    let connection =
        tokio::spawn(async move { serve_connection(&settings, &controls, stdout).await });

    match connection.await {
        Ok(Ok(never)) => match never {},
        Ok(Err(err)) => exit_code(&err),
        Err(join_err) => {
            let reason = if join_err.is_panic() {
                panic_message(join_err.into_panic())
            } else {
                join_err.to_string()
            };
            error!(%reason, "connection task aborted");
            let mut emitter = EventEmitter::new(tokio::io::stdout(), local_origin(&tag), unit);
            let _ = emitter
                .internal(
                    format!("[bridge fault] connection task aborted: {reason}"),
                    Priority::Error,
                    false,
                )
                .await;
            ExitCode::FAILURE
        }
    }
}

fn exit_code(err: &BridgeError) -> ExitCode {
    if err.is_fault() {
        ExitCode::FAILURE
    } else {
        info!(%err, "stream ended");
        ExitCode::SUCCESS
    }
}

fn panic_message(payload: Box<dyn Any + Send + 'static>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => payload
            .downcast_ref::<&str>()
            .map(|message| message.to_string())
            .unwrap_or_else(|| "unknown panic".to_string()),
    }
}
