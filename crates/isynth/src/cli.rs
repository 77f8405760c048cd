use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use isynth_layout::KeymapBackend;

use crate::check::{CheckArgs, run_check};
use crate::config::{ConfigFile, ConfigOverrides, SynthConfig};
use crate::error::Result;
use crate::logging::{self, LogFormat};
use crate::play::{PlayArgs, run_play};
use crate::resolve::{ResolveArgs, run_resolve};

#[derive(Debug, Parser)]
#[command(
    name = "inputsynth",
    about = "Replay W3C-style input action scripts as low-level keyboard and pointer events",
    version
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options accepted by every command.
#[derive(Debug, Clone, Default, Args)]
pub struct GlobalArgs {
    /// Config file of `key=value` lines.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Keyboard layout name; skips layout detection.
    #[arg(long, global = true, value_name = "NAME")]
    pub layout: Option<String>,

    /// Keymap compiler: auto, builtin or xkb.
    #[arg(long, global = true, value_name = "BACKEND")]
    pub backend: Option<KeymapBackend>,

    /// Bound on the active-layout query, in milliseconds.
    #[arg(long, global = true, value_name = "MS")]
    pub query_timeout_ms: Option<u64>,

    /// Log output format on stderr.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl GlobalArgs {
    /// Resolve the run configuration, layering `overrides` on top of ours.
    pub fn resolve_config(&self, overrides: ConfigOverrides) -> Result<SynthConfig> {
        let file = self.config.as_deref().map(ConfigFile::load).transpose()?;
        let overrides = ConfigOverrides {
            layout: self.layout.clone(),
            backend: self.backend,
            query_timeout_ms: self.query_timeout_ms,
            ..overrides
        };
        SynthConfig::resolve(overrides, file.as_ref())
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Replay an action script.
    Play(PlayArgs),

    /// Print how each character would be typed on the layout.
    Resolve(ResolveArgs),

    /// Parse a script and report what would be skipped.
    Check(CheckArgs),
}

pub fn run_from_env() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.global.log_format);
    run(cli)
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Play(args) => run_play(args, &cli.global),
        Commands::Resolve(args) => run_resolve(args, &cli.global),
        Commands::Check(args) => run_check(args),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;

    use clap::Parser;

    use crate::check::CheckArgs;
    use crate::config::SinkKind;
    use crate::error::{SynthError, exit};
    use crate::play::PlayArgs;
    use crate::resolve::ResolveArgs;

    use super::{Cli, Commands, GlobalArgs, run};

    fn us_builtin() -> GlobalArgs {
        GlobalArgs {
            layout: Some("us".into()),
            backend: Some(isynth_layout::KeymapBackend::Builtin),
            ..GlobalArgs::default()
        }
    }

    fn script_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "inputsynth",
            "play",
            "script.json",
            "--sink",
            "null",
            "--layout",
            "de",
            "--step-ms",
            "20",
        ])
        .unwrap();
        assert_eq!(cli.global.layout.as_deref(), Some("de"));
        match cli.command {
            Commands::Play(args) => {
                assert_eq!(args.script, PathBuf::from("script.json"));
                assert_eq!(args.sink, Some(SinkKind::Null));
                assert_eq!(args.step_ms, Some(20));
            }
            other => panic!("expected play, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_sink() {
        let parsed = Cli::try_parse_from(["inputsynth", "play", "s.json", "--sink", "uinput"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn check_command_dispatches_successfully() {
        let file = script_file(r#"{"actions": []}"#);
        let result = run(Cli {
            global: GlobalArgs::default(),
            command: Commands::Check(CheckArgs {
                script: file.path().to_path_buf(),
                strict: false,
            }),
        });
        assert!(result.is_ok());
    }

    #[test]
    fn check_strict_fails_on_skipped_items() {
        let file = script_file(r#"{"actions": [{"type": "gamepad", "actions": []}]}"#);
        let result = run(Cli {
            global: GlobalArgs::default(),
            command: Commands::Check(CheckArgs {
                script: file.path().to_path_buf(),
                strict: true,
            }),
        });
        let error = result.expect_err("strict check should fail");
        assert_eq!(error.exit_code(), exit::SCRIPT);
    }

    #[test]
    fn play_command_reports_malformed_script() {
        let file = script_file("[]");
        let result = run(Cli {
            global: us_builtin(),
            command: Commands::Play(PlayArgs {
                script: file.path().to_path_buf(),
                sink: Some(SinkKind::Null),
                ..PlayArgs::default()
            }),
        });
        match result.expect_err("malformed script should fail") {
            SynthError::Script(_) => {}
            other => panic!("expected Script error, got {other}"),
        }
    }

    #[test]
    fn play_command_replays_into_null_sink() {
        let file = script_file(
            r#"{"actions": [{"type": "key", "id": "kbd", "actions": [
                {"type": "keyDown", "value": "a"},
                {"type": "keyUp", "value": "a"}
            ]}]}"#,
        );
        let result = run(Cli {
            global: us_builtin(),
            command: Commands::Play(PlayArgs {
                script: file.path().to_path_buf(),
                sink: Some(SinkKind::Null),
                ..PlayArgs::default()
            }),
        });
        assert!(result.is_ok(), "{result:?}");
    }

    #[test]
    fn resolve_command_reports_unresolvable_char() {
        let result = run(Cli {
            global: us_builtin(),
            command: Commands::Resolve(ResolveArgs {
                text: vec!["\u{e000}".into()],
            }),
        });
        assert_eq!(
            result.expect_err("private use char").exit_code(),
            exit::UNRESOLVABLE
        );
    }

    #[test]
    fn missing_config_file_fails() {
        let file = script_file(r#"{"actions": []}"#);
        let result = run(Cli {
            global: GlobalArgs {
                config: Some(PathBuf::from("/nonexistent/inputsynth.conf")),
                ..us_builtin()
            },
            command: Commands::Play(PlayArgs {
                script: file.path().to_path_buf(),
                sink: Some(SinkKind::Null),
                ..PlayArgs::default()
            }),
        });
        match result.expect_err("missing config should fail") {
            SynthError::MissingPath { path } => {
                assert_eq!(path, PathBuf::from("/nonexistent/inputsynth.conf"));
            }
            other => panic!("expected MissingPath, got {other}"),
        }
    }
}
