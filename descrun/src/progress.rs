use std::sync::Mutex;

use serde::Serialize;

/// Progress notification emitted while fetching or executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Bytes of a byte-source resource received so far.
    Fetch { loaded: u64, total: u64 },
    /// Execution steps finished so far and wall time since `run` started.
    Exec {
        completed: usize,
        total: usize,
        elapsed_ms: u64,
    },
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// Default sink: execution progress goes to the log, fetch progress to trace.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn emit(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Fetch { loaded, total } => {
                crate::trace!("fetch {}/{} bytes", loaded, total);
            }
            ProgressEvent::Exec {
                completed,
                total,
                elapsed_ms,
            } => {
                crate::log!(
                    "Processed {}/{} kernels in {} ms",
                    completed,
                    total,
                    elapsed_ms
                );
            }
        }
    }
}

/// Sink that keeps every event, for callers that inspect progress afterwards.
#[derive(Debug, Default)]
pub struct RecordedProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordedProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn exec_events(&self) -> Vec<ProgressEvent> {
        self.events()
            .into_iter()
            .filter(|event| matches!(event, ProgressEvent::Exec { .. }))
            .collect()
    }
}

impl ProgressSink for RecordedProgress {
    fn emit(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
