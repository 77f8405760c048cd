use std::io::{self, Write};

use clap::Args;
use isynth_backend::KeyState;
use serde::Serialize;

use crate::cli::GlobalArgs;
use crate::config::ConfigOverrides;
use crate::error::Result;
use crate::session::load_resolver;

#[derive(Debug, Clone, Default, Args)]
pub struct ResolveArgs {
    /// Characters to resolve; every character of every argument is looked up.
    #[arg(value_name = "CHARS", required = true)]
    pub text: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ResolvedLine<'a> {
    #[serde(rename = "char")]
    ch: char,
    layout: &'a str,
    keycode: u32,
    modifiers: &'a [u32],
}

pub fn run_resolve(args: ResolveArgs, global: &GlobalArgs) -> Result<()> {
    let config = global.resolve_config(ConfigOverrides::default())?;
    let (mut resolver, choice) = load_resolver(&config)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for ch in args.text.iter().flat_map(|text| text.chars()) {
        let plan = resolver.resolve(ch, KeyState::Pressed)?;
        let line = serde_json::to_string(&ResolvedLine {
            ch,
            layout: &choice.name,
            keycode: plan.keycode,
            modifiers: &plan.modifiers,
        })?;
        writeln!(out, "{line}")?;
    }
    out.flush()?;
    Ok(())
}
