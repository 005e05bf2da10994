//! Process-wide logging setup.
//!
//! Events from both `log` and `tracing` end up in one `tracing-subscriber`
//! registry, filtered by `RUST_LOG` (default `info`).

use std::str::FromStr;
use std::sync::OnceLock;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static LOGGING_INITIALIZED: OnceLock<()> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

/// Installs the global subscriber and the `log` bridge. Later calls are
/// no-ops, as is a call made after another subscriber was installed.
///
/// Output goes to stderr so a worker process can keep stdout for its
/// result message.
pub fn init_logging(format: LogFormat) {
    LOGGING_INITIALIZED.get_or_init(|| {
        if let Err(e) = tracing_log::LogTracer::init() {
            eprintln!("log bridge not installed: {}", e);
        }

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let registry = tracing_subscriber::registry().with(filter);

        let result = match format {
            LogFormat::Text => registry
                .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
                .try_init(),
            LogFormat::Json => registry
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_current_span(true),
                )
                .try_init(),
        };

        if let Err(e) = result {
            eprintln!("tracing subscriber not installed: {}", e);
        }
    });
}
