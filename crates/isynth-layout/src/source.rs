//! Where the layout name comes from.
//!
//! Priority:
//! 1. An explicit name (`--layout`, config `layout=`).
//! 2. Inside a nested compositor session (`KWIN_XKB_DEFAULT_KEYMAP` set), the
//!    value of `XKB_DEFAULT_LAYOUT`, even when empty.
//! 3. The desktop's active layout, asked through a [`LayoutQuery`].
//!
//! # Failure Modes
//! - Any query failure (tool missing, timeout, bad reply, index out of range)
//!   is logged and falls back to [`DEFAULT_LAYOUT`].
//! - An empty final name is fatal ([`LayoutError::EmptyLayoutName`]).

use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::LazyLock;
use std::time::Duration;

use regex_lite::Regex;
use wait_timeout::ChildExt;

use crate::error::LayoutError;

/// Layout used when the active layout cannot be determined.
pub const DEFAULT_LAYOUT: &str = "us";

/// Environment variable marking a nested compositor session.
pub const NESTED_SESSION_ENV: &str = "KWIN_XKB_DEFAULT_KEYMAP";

/// Environment variable carrying the nested session's layout.
pub const NESTED_LAYOUT_ENV: &str = "XKB_DEFAULT_LAYOUT";

/// Default bound on each active-layout query call.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(2);

/// Inputs to layout name selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayoutRequest {
    /// Name given on the command line or in the config file.
    pub explicit: Option<String>,
    /// Layout forced by a nested compositor session.
    pub nested_session: Option<String>,
}

impl LayoutRequest {
    /// Read the nested-session override from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with(&|key| std::env::var(key).ok())
    }

    /// Read the nested-session override through `get_env`.
    #[must_use]
    pub fn from_env_with<F>(get_env: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let nested_session = get_env(NESTED_SESSION_ENV)
            .map(|_| get_env(NESTED_LAYOUT_ENV).unwrap_or_default());
        Self {
            explicit: None,
            nested_session,
        }
    }

    /// Set the explicit layout name.
    #[must_use]
    pub fn with_explicit(mut self, name: Option<String>) -> Self {
        self.explicit = name;
        self
    }
}

/// Which rule picked the layout name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutSource {
    Explicit,
    NestedSession,
    ActiveLayout,
    Fallback,
}

impl LayoutSource {
    /// Stable label for logs and reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Explicit => "explicit",
            Self::NestedSession => "nested_session",
            Self::ActiveLayout => "active_layout",
            Self::Fallback => "fallback",
        }
    }
}

/// Selected layout name and the rule that selected it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutChoice {
    pub name: String,
    pub source: LayoutSource,
}

/// Failures of the active-layout query. Never fatal.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("'{0}' not found in PATH")]
    ToolMissing(&'static str),

    #[error("failed to run layout query: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("layout query timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("layout query exited with status {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },

    #[error("unparsable layout query reply: {reply}")]
    Unparsable { reply: String },

    #[error("active layout index {index} out of range ({len} layouts)")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Source of the desktop's active layout.
pub trait LayoutQuery {
    /// Index of the active layout in [`layout_short_names`](Self::layout_short_names).
    fn active_layout_index(&self) -> Result<usize, QueryError>;

    /// Short names (`"us"`, `"de"`) of the configured layouts, in order.
    fn layout_short_names(&self) -> Result<Vec<String>, QueryError>;
}

/// Short name of the active layout.
pub fn query_active_layout<Q: LayoutQuery + ?Sized>(query: &Q) -> Result<String, QueryError> {
    let index = query.active_layout_index()?;
    let names = query.layout_short_names()?;
    let len = names.len();
    names
        .into_iter()
        .nth(index)
        .ok_or(QueryError::IndexOutOfRange { index, len })
}

/// Pick the layout name for `request`.
///
/// `query` is only consulted when neither override applies.
pub fn resolve_layout_name<Q: LayoutQuery + ?Sized>(
    request: &LayoutRequest,
    query: &Q,
) -> Result<LayoutChoice, LayoutError> {
    let choice = if let Some(name) = &request.explicit {
        LayoutChoice {
            name: name.clone(),
            source: LayoutSource::Explicit,
        }
    } else if let Some(name) = &request.nested_session {
        tracing::debug!(layout = %name, "using nested session layout");
        LayoutChoice {
            name: name.clone(),
            source: LayoutSource::NestedSession,
        }
    } else {
        match query_active_layout(query) {
            Ok(name) => LayoutChoice {
                name,
                source: LayoutSource::ActiveLayout,
            },
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    fallback = DEFAULT_LAYOUT,
                    "active layout query failed"
                );
                LayoutChoice {
                    name: DEFAULT_LAYOUT.to_string(),
                    source: LayoutSource::Fallback,
                }
            }
        }
    };

    if choice.name.trim().is_empty() {
        return Err(LayoutError::EmptyLayoutName);
    }
    tracing::info!(
        layout = %choice.name,
        source = choice.source.as_str(),
        "keyboard layout selected"
    );
    Ok(choice)
}

// ---------------------------------------------------------------------------
// gdbus-backed query
// ---------------------------------------------------------------------------

const GDBUS: &str = "gdbus";
const KEYBOARD_SERVICE: &str = "org.kde.keyboard";
const KEYBOARD_PATH: &str = "/Layouts";
const KEYBOARD_INTERFACE: &str = "org.kde.KeyboardLayouts";

/// Asks the desktop's keyboard service over the session bus via `gdbus`.
#[derive(Debug, Clone)]
pub struct GdbusLayoutQuery {
    timeout: Duration,
}

impl Default for GdbusLayoutQuery {
    fn default() -> Self {
        Self::new(DEFAULT_QUERY_TIMEOUT)
    }
}

impl GdbusLayoutQuery {
    /// Query with `timeout` per call.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn call(&self, method: &str) -> Result<String, QueryError> {
        let gdbus = which::which(GDBUS).map_err(|_| QueryError::ToolMissing(GDBUS))?;
        let mut child = Command::new(gdbus)
            .args(["call", "--session", "--dest", KEYBOARD_SERVICE])
            .args(["--object-path", KEYBOARD_PATH, "--method"])
            .arg(format!("{KEYBOARD_INTERFACE}.{method}"))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let Some(status) = child.wait_timeout(self.timeout)? else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(QueryError::Timeout {
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            });
        };

        let mut stdout = String::new();
        if let Some(mut pipe) = child.stdout.take() {
            pipe.read_to_string(&mut stdout)?;
        }
        if !status.success() {
            let mut stderr = String::new();
            if let Some(mut pipe) = child.stderr.take() {
                pipe.read_to_string(&mut stderr)?;
            }
            return Err(QueryError::Failed {
                code: status.code(),
                stderr: stderr.trim().to_string(),
            });
        }
        tracing::trace!(method, reply = %stdout.trim(), "layout query reply");
        Ok(stdout)
    }
}

impl LayoutQuery for GdbusLayoutQuery {
    fn active_layout_index(&self) -> Result<usize, QueryError> {
        parse_layout_index(&self.call("getLayout")?)
    }

    fn layout_short_names(&self) -> Result<Vec<String>, QueryError> {
        parse_layout_names(&self.call("getLayoutsList")?)
    }
}

static INDEX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\(\s*(?:uint32\s+)?(\d+)\s*,?\s*\)$").expect("layout index regex")
});

// GVariant prints a string with double quotes when it contains a single quote.
static NAMES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"\(\s*(?:'([^']*)'|"([^"]*)")\s*,\s*(?:'[^']*'|"[^"]*")\s*,\s*(?:'[^']*'|"[^"]*")\s*\)"#,
    )
    .expect("layout names regex")
});

/// Parse a `getLayout` reply such as `(uint32 1,)`.
pub fn parse_layout_index(reply: &str) -> Result<usize, QueryError> {
    let reply = reply.trim();
    INDEX_RE
        .captures(reply)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .ok_or_else(|| QueryError::Unparsable {
            reply: reply.to_string(),
        })
}

/// Parse a `getLayoutsList` reply such as
/// `([('us', '', 'English (US)'), ('de', '', 'German')],)` into short names.
pub fn parse_layout_names(reply: &str) -> Result<Vec<String>, QueryError> {
    let reply = reply.trim();
    if !reply.starts_with("([") {
        return Err(QueryError::Unparsable {
            reply: reply.to_string(),
        });
    }
    Ok(NAMES_RE
        .captures_iter(reply)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().to_string())
        .collect())
}
