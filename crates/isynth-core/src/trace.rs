//! JSONL trace sink and reader.
//!
//! [`TraceSink`] is an [`InputSink`] that writes every call it receives as one
//! JSON line instead of injecting it. It backs dry runs and lets replays be
//! compared offline. Files ending in `.gz` are gzip-compressed.
//!
//! # Format
//!
//! The first line is a `trace_header`, the last a `trace_summary`. Every line
//! in between is a `sink_call` record: `{event, seq, ts_ns, call, ...args}`.

use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use isynth_backend::{Axis, Button, InputSink, KeyState, SinkError, SinkEvent};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Current schema version for input trace files.
pub const SCHEMA_VERSION: &str = "input-trace-v1";

/// A single line of an input trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum TraceRecord {
    /// Header record (first line).
    #[serde(rename = "trace_header")]
    Header {
        schema_version: String,
        session_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        layout: Option<String>,
    },

    /// One call received by the sink.
    #[serde(rename = "sink_call")]
    Call {
        seq: u64,
        ts_ns: u64,
        #[serde(flatten)]
        call: SinkEvent,
    },

    /// Summary record (last line).
    #[serde(rename = "trace_summary")]
    Summary {
        total_events: u64,
        total_syncs: u64,
        total_duration_ns: u64,
    },
}

// ---------------------------------------------------------------------------
// TraceSink
// ---------------------------------------------------------------------------

/// Sink writing each call as a JSONL record.
pub struct TraceSink<W: Write> {
    writer: BufWriter<W>,
    started: Instant,
    seq: u64,
    input_events: u64,
    syncs: u64,
    last_ts_ns: u64,
}

impl<W: Write> std::fmt::Debug for TraceSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceSink")
            .field("seq", &self.seq)
            .field("input_events", &self.input_events)
            .field("syncs", &self.syncs)
            .finish_non_exhaustive()
    }
}

impl TraceSink<Box<dyn Write>> {
    /// Create a trace file, gzip-compressed when the name ends in `.gz`.
    pub fn create(
        path: impl AsRef<Path>,
        session_name: &str,
        layout: Option<&str>,
    ) -> io::Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::create(path)?;
        let writer: Box<dyn Write> = if path.extension().is_some_and(|ext| ext == "gz") {
            Box::new(GzEncoder::new(file, Compression::fast()))
        } else {
            Box::new(file)
        };
        tracing::debug!(path = %path.display(), "trace sink opened");
        Self::from_writer(writer, session_name, layout)
    }
}

impl<W: Write> TraceSink<W> {
    /// Wrap any writer and emit the header line.
    pub fn from_writer(writer: W, session_name: &str, layout: Option<&str>) -> io::Result<Self> {
        let mut sink = Self {
            writer: BufWriter::new(writer),
            started: Instant::now(),
            seq: 0,
            input_events: 0,
            syncs: 0,
            last_ts_ns: 0,
        };
        sink.write_line(&TraceRecord::Header {
            schema_version: SCHEMA_VERSION.to_string(),
            session_name: session_name.to_string(),
            layout: layout.map(str::to_string),
        })?;
        Ok(sink)
    }

    /// Number of input calls written so far.
    #[inline]
    pub fn event_count(&self) -> u64 {
        self.input_events
    }

    /// Write the summary, flush, and hand back the writer.
    pub fn finish(mut self) -> io::Result<W> {
        let summary = TraceRecord::Summary {
            total_events: self.input_events,
            total_syncs: self.syncs,
            total_duration_ns: self.last_ts_ns,
        };
        self.write_line(&summary)?;
        self.writer.flush()?;
        self.writer
            .into_inner()
            .map_err(|e| io::Error::other(e.to_string()))
    }

    fn write_line(&mut self, record: &TraceRecord) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, record).map_err(io::Error::other)?;
        self.writer.write_all(b"\n")
    }

    fn record(&mut self, call: SinkEvent) -> Result<(), SinkError> {
        let ts_ns = u64::try_from(self.started.elapsed().as_nanos()).unwrap_or(u64::MAX);
        match call {
            SinkEvent::Sync => self.syncs += 1,
            ref other if other.is_input() => self.input_events += 1,
            _ => {}
        }
        let record = TraceRecord::Call {
            seq: self.seq,
            ts_ns,
            call,
        };
        self.write_line(&record)?;
        self.seq += 1;
        self.last_ts_ns = ts_ns;
        Ok(())
    }
}

impl<W: Write> InputSink for TraceSink<W> {
    type Error = SinkError;

    fn wait_ready(&mut self, _timeout: Duration) -> Result<(), Self::Error> {
        Ok(())
    }

    fn key(&mut self, keycode: u32, state: KeyState) -> Result<(), Self::Error> {
        self.record(SinkEvent::Key { keycode, state })
    }

    fn pointer_button(&mut self, button: Button, state: KeyState) -> Result<(), Self::Error> {
        self.record(SinkEvent::PointerButton { button, state })
    }

    fn pointer_move_absolute(&mut self, x: i32, y: i32) -> Result<(), Self::Error> {
        self.record(SinkEvent::PointerMove { x, y })
    }

    fn touch_down(&mut self, id: u32, x: i32, y: i32) -> Result<(), Self::Error> {
        self.record(SinkEvent::TouchDown { id, x, y })
    }

    fn touch_motion(&mut self, id: u32, x: i32, y: i32) -> Result<(), Self::Error> {
        self.record(SinkEvent::TouchMotion { id, x, y })
    }

    fn touch_up(&mut self, id: u32) -> Result<(), Self::Error> {
        self.record(SinkEvent::TouchUp { id })
    }

    fn touch_cancel(&mut self) -> Result<(), Self::Error> {
        self.record(SinkEvent::TouchCancel)
    }

    fn touch_frame(&mut self) -> Result<(), Self::Error> {
        self.record(SinkEvent::TouchFrame)
    }

    fn scroll_axis(&mut self, axis: Axis, delta: i32) -> Result<(), Self::Error> {
        self.record(SinkEvent::Scroll { axis, delta })
    }

    fn sync(&mut self) -> Result<(), Self::Error> {
        self.record(SinkEvent::Sync)?;
        self.writer.flush().map_err(SinkError::from)
    }
}

// ---------------------------------------------------------------------------
// Reading traces back
// ---------------------------------------------------------------------------

/// Reads input trace files (gzip or plain).
pub struct TraceReader;

impl TraceReader {
    /// Open a trace file and parse all records.
    pub fn open(path: impl AsRef<Path>) -> io::Result<TraceFile> {
        let data = std::fs::read(path.as_ref())?;
        Self::from_bytes(&data)
    }

    /// Parse trace records from raw bytes, detecting gzip by magic bytes.
    pub fn from_bytes(data: &[u8]) -> io::Result<TraceFile> {
        let text = if data.starts_with(&[0x1f, 0x8b]) {
            let mut buf = Vec::new();
            GzDecoder::new(data).read_to_end(&mut buf)?;
            buf
        } else {
            data.to_vec()
        };

        let mut records = Vec::new();
        for line in BufReader::new(text.as_slice()).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line).map_err(io::Error::other)?);
        }
        Ok(TraceFile { records })
    }
}

/// A parsed input trace.
#[derive(Debug, Clone)]
pub struct TraceFile {
    records: Vec<TraceRecord>,
}

impl TraceFile {
    #[inline]
    pub fn records(&self) -> &[TraceRecord] {
        &self.records
    }

    #[must_use]
    pub fn header(&self) -> Option<&TraceRecord> {
        self.records
            .first()
            .filter(|r| matches!(r, TraceRecord::Header { .. }))
    }

    #[must_use]
    pub fn summary(&self) -> Option<&TraceRecord> {
        self.records
            .last()
            .filter(|r| matches!(r, TraceRecord::Summary { .. }))
    }

    /// Every recorded call in order, `sync` and `touch_frame` included.
    pub fn calls(&self) -> Vec<&SinkEvent> {
        self.records
            .iter()
            .filter_map(|r| match r {
                TraceRecord::Call { call, .. } => Some(call),
                _ => None,
            })
            .collect()
    }

    /// Recorded input events only.
    pub fn input_events(&self) -> Vec<SinkEvent> {
        self.calls()
            .into_iter()
            .filter(|call| call.is_input())
            .cloned()
            .collect()
    }

    /// Input event count from the summary.
    #[must_use]
    pub fn total_events(&self) -> Option<u64> {
        match self.summary()? {
            TraceRecord::Summary { total_events, .. } => Some(*total_events),
            _ => None,
        }
    }
}
