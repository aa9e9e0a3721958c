//! Action trace recording.
//!
//! Each public page operation appends one event: what ran, against which
//! target, when it started relative to the session, how long it took and how
//! it ended. On failure the evidence service finalizes the recorder and
//! writes the events as a zip archive next to the screenshot.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use zip::write::SimpleFileOptions;

/// One recorded operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Operation name, e.g. `click`, `wait_for`, `expect_url_contains`
    pub action: String,
    /// Selector or value the operation targeted
    pub target: String,
    /// Milliseconds from recorder start to operation start
    pub offset_ms: u64,
    /// Operation duration in milliseconds
    pub duration_ms: u64,
    /// Error message when the operation failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
struct TraceFile<'a> {
    version: u32,
    started_at: &'a str,
    events: &'a [TraceEvent],
}

#[derive(Debug)]
struct TraceState {
    started: Instant,
    started_at: String,
    events: Vec<TraceEvent>,
    finished: bool,
}

/// Shared trace buffer for one page. Cloning shares the buffer.
#[derive(Debug, Clone)]
pub struct TraceRecorder {
    state: Arc<Mutex<TraceState>>,
}

impl TraceRecorder {
    /// Starts a new recording.
    #[must_use]
    pub fn start() -> Self {
        Self {
            state: Arc::new(Mutex::new(TraceState {
                started: Instant::now(),
                started_at: chrono::Local::now().to_rfc3339(),
                events: Vec::new(),
                finished: false,
            })),
        }
    }

    /// Records an operation that began at `began` and just ended.
    ///
    /// Ignored once the recorder is finished.
    pub fn record(&self, action: &str, target: &str, began: Instant, error: Option<String>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.finished {
            return;
        }
        let offset = began.saturating_duration_since(state.started);
        state.events.push(TraceEvent {
            action: action.to_string(),
            target: target.to_string(),
            offset_ms: millis(offset),
            duration_ms: millis(began.elapsed()),
            error,
        });
    }

    /// Snapshot of the events recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<TraceEvent> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .events
            .clone()
    }

    /// True once the trace was exported.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .finished
    }

    /// Finalizes the recording and writes it to `path` as a zip archive
    /// containing `trace.json`.
    ///
    /// A recorder can be exported once; later calls fail.
    pub fn export(&self, path: &Path) -> std::io::Result<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.finished {
            return Err(std::io::Error::other("trace already exported"));
        }
        state.finished = true;

        let json = serde_json::to_vec_pretty(&TraceFile {
            version: 1,
            started_at: &state.started_at,
            events: &state.events,
        })?;

        let file = std::fs::File::create(path)?;
        let mut archive = zip::ZipWriter::new(file);
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        archive
            .start_file("trace.json", options)
            .map_err(std::io::Error::other)?;
        archive.write_all(&json)?;
        archive.finish().map_err(std::io::Error::other)?;
        Ok(())
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
