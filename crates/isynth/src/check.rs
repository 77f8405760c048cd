use std::path::PathBuf;

use clap::Args;
use isynth_core::{ParseReport, load_script_file};
use serde::Serialize;

use crate::error::{Result, SynthError, exit};

#[derive(Debug, Clone, Default, Args)]
pub struct CheckArgs {
    /// Action script (JSON).
    #[arg(value_name = "SCRIPT")]
    pub script: PathBuf,

    /// Fail when anything was skipped.
    #[arg(long)]
    pub strict: bool,
}

#[derive(Debug, Serialize)]
struct CheckReport<'a> {
    status: &'static str,
    groups: usize,
    sub_actions: usize,
    declared_duration_ms: u128,
    #[serde(flatten)]
    report: &'a ParseReport,
}

pub fn run_check(args: CheckArgs) -> Result<()> {
    let (script, report) = load_script_file(&args.script)?;
    let clean = report.is_clean();
    let line = serde_json::to_string(&CheckReport {
        status: if clean { "ok" } else { "skipped" },
        groups: script.groups.len(),
        sub_actions: script.sub_action_count(),
        declared_duration_ms: script.declared_duration().as_millis(),
        report: &report,
    })?;
    println!("{line}");

    if args.strict && !clean {
        return Err(SynthError::exit(
            exit::SCRIPT,
            format!(
                "{} item(s) skipped in {}",
                report.skipped.len(),
                args.script.display()
            ),
        ));
    }
    Ok(())
}
