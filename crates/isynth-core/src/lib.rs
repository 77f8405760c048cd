#![forbid(unsafe_code)]

//! inputsynth core: action scripts in, sink calls out.
//!
//! # Key Components
//!
//! - [`ActionScript`] - typed script of key, pointer and wheel groups
//! - [`load_script`] - tolerant JSON loader reporting what it skipped
//! - [`ElementLocator`] - turns element-relative moves into viewport moves
//! - [`Replayer`] - sequential engine driving an [`isynth_backend::InputSink`]
//! - [`TraceSink`] - JSONL sink for dry runs
//!
//! # Role in inputsynth
//! This crate sits between the script and the transport. It consults the key
//! resolver from `isynth-layout` for key groups and paces itself through an
//! [`isynth_backend::Pacer`], so the whole pipeline runs against a recording
//! sink and a virtual clock in tests.

pub mod action;
pub mod locate;
pub mod replay;
pub mod script;
pub mod trace;

pub use action::{
    ActionGroup, ActionScript, ElementRef, KeySubAction, Origin, PointerKind, PointerSubAction,
    WheelSubAction,
};
pub use locate::{ElementLocator, Rect, StaticLocator, resolve_origins};
pub use replay::{ReplayConfig, ReplayError, ReplayState, ReplaySummary, Replayer, replay};
pub use script::{ParseReport, ScriptError, SkipReason, Skipped, load_script, load_script_file};
pub use trace::{SCHEMA_VERSION, TraceFile, TraceReader, TraceRecord, TraceSink};
