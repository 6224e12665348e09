//! Tracing setup for the server and the CLI commands.
//!
//! Every event goes to stdout and is appended to the configured log file as plain text:
//! `2026-01-31 09:15:02.481  INFO legal_chatbot::services::chat_service: step: routing decided used_rag=true`

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::{
    fmt::format::{FmtSpan, Writer},
    fmt::time::FormatTime,
    fmt::writer::MakeWriterExt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

/// Used when `RUST_LOG` is unset: request traces stay visible, pool chatter does not.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=info,sqlx=warn,hyper=warn";

struct LocalMillis;

impl FormatTime for LocalMillis {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{} ", chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

/// Opens `path` for appending, creating missing parent directories.
pub(crate) fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Installs the global subscriber. Fails if one is already set. Call after `.env` is loaded
/// so `RUST_LOG` from the file applies.
pub fn init_tracing(log_file_path: &str) -> anyhow::Result<()> {
    let file = Arc::new(open_log_file(Path::new(log_file_path))?);

    let layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout.and(file))
        .event_format(
            tracing_subscriber::fmt::format()
                .with_timer(LocalMillis)
                .with_target(true),
        )
        .with_span_events(FmtSpan::NONE)
        .with_ansi(false);

    Registry::default()
        .with(env_filter())
        .with(layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))
}
