#![forbid(unsafe_code)]

//! The `inputsynth` command line: config resolution, logging setup and the
//! `play`, `resolve` and `check` commands.

pub mod check;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod play;
pub mod resolve;
pub mod session;

pub use cli::run_from_env;
pub use error::{Result, SynthError};
