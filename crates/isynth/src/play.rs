use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use isynth_backend::{InputSink, RecordingSink, SinkError, ThreadPacer};
use isynth_core::{
    ActionScript, ReplaySummary, Replayer, TraceSink, load_script_file, resolve_origins,
};
use isynth_layout::KeyResolver;
use serde::Serialize;

use crate::cli::GlobalArgs;
use crate::config::{ConfigOverrides, SinkKind, SynthConfig};
use crate::error::{Result, SynthError};
use crate::session::{load_locator, load_resolver, session_name};

#[derive(Debug, Clone, Default, Args)]
pub struct PlayArgs {
    /// Action script (JSON).
    #[arg(value_name = "SCRIPT")]
    pub script: PathBuf,

    /// Where replayed calls go.
    #[arg(long, value_enum)]
    pub sink: Option<SinkKind>,

    /// Trace destination for the trace sink; `.gz` is compressed.
    #[arg(long, value_name = "PATH")]
    pub trace_out: Option<PathBuf>,

    /// Interval between interpolated motion events.
    #[arg(long, value_name = "MS")]
    pub step_ms: Option<u64>,

    /// Bound on waiting for the sink to become ready.
    #[arg(long, value_name = "MS")]
    pub ready_timeout_ms: Option<u64>,

    /// JSON map of element id to bounding rect, for element origins.
    #[arg(long, value_name = "PATH")]
    pub elements: Option<PathBuf>,
}

impl PlayArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            step_ms: self.step_ms,
            ready_timeout_ms: self.ready_timeout_ms,
            sink: self.sink,
            trace_out: self.trace_out.clone(),
            elements: self.elements.clone(),
            ..ConfigOverrides::default()
        }
    }
}

/// One-line report printed after a run.
#[derive(Debug, Serialize)]
struct PlayReport<'a> {
    status: &'static str,
    session: &'a str,
    layout: &'a str,
    sink: &'static str,
    groups: usize,
    sub_actions: usize,
    skipped_while_loading: usize,
    skipped_while_replaying: usize,
    sink_calls: usize,
    slept_ms: u128,
}

pub fn run_play(args: PlayArgs, global: &GlobalArgs) -> Result<()> {
    let config = global.resolve_config(args.overrides())?;
    let (mut script, report) = load_script_file(&args.script)?;
    if let Some(path) = &config.elements {
        let locator = load_locator(path)?;
        resolve_origins(&mut script, &locator);
    }
    let (resolver, choice) = load_resolver(&config)?;
    let session = session_name(&args.script);

    tracing::info!(
        session = %session,
        groups = script.groups.len(),
        declared_ms = whole_millis(script.declared_duration()),
        sink = config.sink.as_str(),
        "replay starting"
    );

    let summary = match config.sink {
        SinkKind::Null => {
            let (summary, sink) = play_into(RecordingSink::new(), resolver, &config, &script);
            tracing::debug!(recorded = sink.events().len(), "null sink discarded calls");
            summary?
        }
        SinkKind::Trace => {
            let sink = match &config.trace_out {
                Some(path) => TraceSink::create(path, &session, Some(&choice.name)),
                None => {
                    let stdout: Box<dyn Write> = Box::new(io::stdout());
                    TraceSink::from_writer(stdout, &session, Some(&choice.name))
                }
            }
            .map_err(SinkError::from)?;
            let (summary, sink) = play_into(sink, resolver, &config, &script);
            // Flush what was emitted even when the run aborted.
            sink.finish().map_err(SinkError::from)?;
            summary?
        }
    };

    let line = serde_json::to_string(&PlayReport {
        status: "ok",
        session: &session,
        layout: &choice.name,
        sink: config.sink.as_str(),
        groups: summary.groups,
        sub_actions: summary.sub_actions,
        skipped_while_loading: report.skipped.len(),
        skipped_while_replaying: summary.skipped,
        sink_calls: summary.sink_calls,
        slept_ms: summary.slept.as_millis(),
    })?;
    if trace_on_stdout(&config) {
        eprintln!("{line}");
    } else {
        println!("{line}");
    }
    Ok(())
}

fn trace_on_stdout(config: &SynthConfig) -> bool {
    config.sink == SinkKind::Trace && config.trace_out.is_none()
}

fn play_into<S: InputSink>(
    sink: S,
    resolver: KeyResolver,
    config: &SynthConfig,
    script: &ActionScript,
) -> (Result<ReplaySummary>, S) {
    let mut replayer =
        Replayer::new(sink, resolver, ThreadPacer).with_config(config.replay_config());
    let summary = replayer.play(script).map_err(SynthError::from);
    (summary, replayer.into_sink())
}

fn whole_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_millis_saturates() {
        assert_eq!(whole_millis(Duration::from_millis(1500)), 1500);
        assert_eq!(whole_millis(Duration::MAX), u64::MAX);
    }
}
