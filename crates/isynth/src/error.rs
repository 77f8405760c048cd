use std::path::PathBuf;

use isynth_backend::SinkError;
use isynth_core::{ReplayError, ScriptError};
use isynth_layout::{LayoutError, ResolveError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SynthError>;

/// Process exit codes.
pub mod exit {
    pub const OK: i32 = 0;
    pub const FAILURE: i32 = 1;
    pub const SCRIPT: i32 = 2;
    pub const LAYOUT: i32 = 3;
    pub const UNRESOLVABLE: i32 = 4;
    pub const SINK: i32 = 5;
}

#[derive(Debug, Error)]
pub enum SynthError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error("keyboard layout error: {0}")]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("replay aborted: {0}")]
    Replay(#[from] ReplayError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("invalid config {path}:{line}: {message}")]
    Config {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("required path does not exist: {path}")]
    MissingPath { path: PathBuf },

    #[error("{message}")]
    Exit { code: i32, message: String },
}

impl SynthError {
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Exit { code, .. } => *code,
            Self::Script(_) => exit::SCRIPT,
            Self::Layout(_) => exit::LAYOUT,
            Self::Resolve(_) => exit::UNRESOLVABLE,
            Self::Replay(ReplayError::Resolve { .. }) => exit::UNRESOLVABLE,
            Self::Replay(_) | Self::Sink(_) => exit::SINK,
            _ => exit::FAILURE,
        }
    }

    #[must_use]
    pub fn exit(code: i32, message: impl Into<String>) -> Self {
        Self::Exit {
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}
