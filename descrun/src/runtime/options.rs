use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::decoder::DecoderRegistry;
use crate::progress::{LogProgress, ProgressSink};
use crate::timer::{Clock, SystemClock};

/// How often the execution loop reports progress and hands time back to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YieldPolicy {
    /// Minimum wall time between two progress notifications.
    pub interval: Duration,
    /// Pause taken after each notification.
    pub pause: Duration,
}

impl YieldPolicy {
    pub fn new(interval: Duration, pause: Duration) -> Self {
        Self { interval, pause }
    }

    /// Only the final progress notification is emitted.
    pub fn never() -> Self {
        Self {
            interval: Duration::MAX,
            pause: Duration::ZERO,
        }
    }
}

impl Default for YieldPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1000),
            pause: Duration::from_millis(10),
        }
    }
}

#[derive(Clone)]
pub struct RuntimeOptions {
    pub(crate) yield_policy: YieldPolicy,
    pub(crate) progress: Arc<dyn ProgressSink>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) decoders: DecoderRegistry,
    pub(crate) trace_enabled: bool,
}

impl RuntimeOptions {
    pub fn new() -> Self {
        Self {
            yield_policy: YieldPolicy::default(),
            progress: Arc::new(LogProgress),
            clock: Arc::new(SystemClock::new()),
            decoders: DecoderRegistry::with_defaults(),
            trace_enabled: false,
        }
    }

    pub fn with_yield_policy(mut self, policy: YieldPolicy) -> Self {
        self.yield_policy = policy;
        self
    }

    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = sink;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_decoders(mut self, decoders: DecoderRegistry) -> Self {
        self.decoders = decoders;
        self
    }

    /// Log every executed step, independent of `DESCRUN_TRACE`.
    pub fn with_trace(mut self) -> Self {
        self.trace_enabled = true;
        self
    }

    pub fn yield_policy(&self) -> YieldPolicy {
        self.yield_policy
    }
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RuntimeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeOptions")
            .field("yield_policy", &self.yield_policy)
            .field("decoders", &self.decoders)
            .field("trace_enabled", &self.trace_enabled)
            .finish_non_exhaustive()
    }
}
