//! Subscriber setup. Logs go to stderr so stdout stays free for traces and
//! reports.

use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

pub const ENV_LOG: &str = "ISYNTH_LOG";
const DEFAULT_DIRECTIVE: &str = "info";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Filter from `ISYNTH_LOG`, then `RUST_LOG`, then `info`.
#[must_use]
pub fn env_filter() -> EnvFilter {
    filter_from(std::env::var(ENV_LOG).ok(), std::env::var(EnvFilter::DEFAULT_ENV).ok())
}

fn filter_from(own: Option<String>, rust_log: Option<String>) -> EnvFilter {
    own.into_iter()
        .chain(rust_log)
        .filter(|directives| !directives.trim().is_empty())
        .find_map(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Install the global subscriber. A second call is a no-op.
pub fn init(format: LogFormat) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_target(false);
    let installed = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
