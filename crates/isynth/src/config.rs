//! Run configuration: CLI flag > config file > environment > default.
//!
//! Config files hold `key=value` lines. Blank lines and `#` comments are
//! skipped, values may be wrapped in double quotes. Recognised keys:
//! `layout`, `step_ms`, `ready_timeout_ms`, `query_timeout_ms`, `sink`,
//! `trace_out`, `backend`, `elements`. Unknown keys are logged and ignored.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use isynth_core::replay::{DEFAULT_READY_TIMEOUT, DEFAULT_STEP_DURATION};
use isynth_core::ReplayConfig;
use isynth_layout::KeymapBackend;
use isynth_layout::source::DEFAULT_QUERY_TIMEOUT;

use crate::error::{Result, SynthError};

pub const ENV_LAYOUT: &str = "ISYNTH_LAYOUT";
pub const ENV_STEP_MS: &str = "ISYNTH_STEP_MS";

const KNOWN_KEYS: [&str; 8] = [
    "layout",
    "step_ms",
    "ready_timeout_ms",
    "query_timeout_ms",
    "sink",
    "trace_out",
    "backend",
    "elements",
];

/// Where replayed calls go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum SinkKind {
    /// JSONL trace on stdout or `--trace-out`.
    #[default]
    Trace,
    /// Record in memory and discard.
    Null,
}

impl SinkKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Null => "null",
        }
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SinkKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "null" => Ok(Self::Null),
            other => Err(format!("unknown sink '{other}'")),
        }
    }
}

/// Parsed config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    pub path: Option<PathBuf>,
    pub values: BTreeMap<String, String>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SynthError::MissingPath {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let values = parse_config_content(&content);
        for key in values.keys() {
            if !KNOWN_KEYS.contains(&key.as_str()) {
                tracing::warn!(path = %path.display(), key = %key, "unknown config key ignored");
            }
        }
        Ok(Self {
            path: Some(path.to_path_buf()),
            values,
        })
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn get_u64(&self, key: &str) -> Result<Option<u64>> {
        self.get(key)
            .map(|raw| {
                raw.trim().parse::<u64>().map_err(|_| self.invalid(key, raw))
            })
            .transpose()
    }

    fn get_parsed<T: FromStr>(&self, key: &str) -> Result<Option<T>> {
        self.get(key)
            .map(|raw| raw.parse::<T>().map_err(|_| self.invalid(key, raw)))
            .transpose()
    }

    fn invalid(&self, key: &str, raw: &str) -> SynthError {
        SynthError::Config {
            path: self.path.clone().unwrap_or_default(),
            line: self.line_of(key),
            message: format!("invalid value for '{key}': '{raw}'"),
        }
    }

    fn line_of(&self, key: &str) -> usize {
        let Some(path) = &self.path else {
            return 0;
        };
        std::fs::read_to_string(path)
            .ok()
            .and_then(|content| {
                content.lines().enumerate().find_map(|(index, line)| {
                    let (candidate, _) = line.trim().split_once('=')?;
                    (candidate.trim() == key).then_some(index + 1)
                })
            })
            .unwrap_or(0)
    }
}

#[must_use]
pub fn parse_config_content(content: &str) -> BTreeMap<String, String> {
    let mut values = BTreeMap::new();

    for raw_line in content.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value_raw)) = line.split_once('=') else {
            continue;
        };

        let key = key.trim().to_string();
        let mut value = value_raw.trim();
        if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
            value = &value[1..value.len() - 1];
        }

        values.insert(key, value.to_string());
    }

    values
}

/// Values given on the command line. `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub layout: Option<String>,
    pub step_ms: Option<u64>,
    pub ready_timeout_ms: Option<u64>,
    pub query_timeout_ms: Option<u64>,
    pub sink: Option<SinkKind>,
    pub trace_out: Option<PathBuf>,
    pub backend: Option<KeymapBackend>,
    pub elements: Option<PathBuf>,
}

/// Fully resolved run configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthConfig {
    /// Explicit layout name. `None` lets the layout source decide.
    pub layout: Option<String>,
    pub step: Duration,
    pub ready_timeout: Duration,
    pub query_timeout: Duration,
    pub sink: SinkKind,
    /// Trace destination. `None` writes to stdout.
    pub trace_out: Option<PathBuf>,
    pub backend: KeymapBackend,
    /// JSON map of element id to bounding rect.
    pub elements: Option<PathBuf>,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            layout: None,
            step: DEFAULT_STEP_DURATION,
            ready_timeout: DEFAULT_READY_TIMEOUT,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            sink: SinkKind::default(),
            trace_out: None,
            backend: KeymapBackend::default(),
            elements: None,
        }
    }
}

impl SynthConfig {
    /// Resolve against the process environment.
    pub fn resolve(overrides: ConfigOverrides, file: Option<&ConfigFile>) -> Result<Self> {
        Self::resolve_with(overrides, file, &|key| std::env::var(key).ok())
    }

    /// Resolve with `get_env` standing in for the process environment.
    pub fn resolve_with<F>(
        overrides: ConfigOverrides,
        file: Option<&ConfigFile>,
        get_env: &F,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let empty = ConfigFile::default();
        let file = file.unwrap_or(&empty);
        let defaults = Self::default();

        let env_layout = get_env(ENV_LAYOUT).filter(|value| !value.trim().is_empty());
        let env_step = match get_env(ENV_STEP_MS) {
            Some(raw) => Some(raw.trim().parse::<u64>().map_err(|_| {
                SynthError::invalid(format!("{ENV_STEP_MS} must be an integer, got '{raw}'"))
            })?),
            None => None,
        };

        let layout = overrides
            .layout
            .or_else(|| file.get("layout").map(str::to_string))
            .or(env_layout);
        let step_ms = overrides
            .step_ms
            .or(file.get_u64("step_ms")?)
            .or(env_step);
        let ready_timeout_ms = overrides
            .ready_timeout_ms
            .or(file.get_u64("ready_timeout_ms")?);
        let query_timeout_ms = overrides
            .query_timeout_ms
            .or(file.get_u64("query_timeout_ms")?);
        let sink = match overrides.sink {
            Some(sink) => sink,
            None => file.get_parsed("sink")?.unwrap_or(defaults.sink),
        };
        let backend = match overrides.backend {
            Some(backend) => backend,
            None => file.get_parsed("backend")?.unwrap_or(defaults.backend),
        };
        let trace_out = overrides
            .trace_out
            .or_else(|| file.get("trace_out").map(PathBuf::from));
        let elements = overrides
            .elements
            .or_else(|| file.get("elements").map(PathBuf::from));

        Ok(Self {
            layout,
            step: step_ms.map_or(defaults.step, Duration::from_millis),
            ready_timeout: ready_timeout_ms.map_or(defaults.ready_timeout, Duration::from_millis),
            query_timeout: query_timeout_ms.map_or(defaults.query_timeout, Duration::from_millis),
            sink,
            trace_out,
            backend,
            elements,
        })
    }

    #[must_use]
    pub fn replay_config(&self) -> ReplayConfig {
        ReplayConfig {
            step_duration: self.step,
            ready_timeout: self.ready_timeout,
        }
    }
}
