use std::sync::Arc;
use std::time::{Duration, Instant};

use normalize::NormalizeError;

use crate::coordinator::ResultSource;
use crate::error::AnalysisError;

/// Observer for coordinator stages.
///
/// Injected per coordinator with
/// [`Coordinator::with_metrics`](crate::Coordinator::with_metrics); there is
/// no process-wide recorder.
pub trait AnalysisMetrics: Send + Sync {
    fn record_normalize(&self, latency: Duration, result: Result<(), NormalizeError>);
    /// Cache, storage and fresh-analysis resolution. `source` is `None` when
    /// no result could be produced, e.g. every rule failed.
    fn record_lookup(&self, latency: Duration, source: Option<ResultSource>);
    fn record_rules(&self, latency: Duration, attempted: usize, failed: usize);
    fn record_outcome(&self, latency: Duration, result: Result<ResultSource, AnalysisError>);
}

/// Times one stage and reports it to the recorder, if any.
pub(crate) struct MetricsSpan {
    recorder: Arc<dyn AnalysisMetrics>,
    start: Instant,
}

impl MetricsSpan {
    pub(crate) fn start(recorder: &Option<Arc<dyn AnalysisMetrics>>) -> Option<Self> {
        recorder.as_ref().map(|recorder| Self {
            recorder: Arc::clone(recorder),
            start: Instant::now(),
        })
    }

    pub(crate) fn record_normalize(self, result: Result<(), NormalizeError>) {
        self.recorder.record_normalize(self.start.elapsed(), result);
    }

    pub(crate) fn record_lookup(self, source: Option<ResultSource>) {
        self.recorder.record_lookup(self.start.elapsed(), source);
    }

    pub(crate) fn record_rules(self, attempted: usize, failed: usize) {
        self.recorder
            .record_rules(self.start.elapsed(), attempted, failed);
    }

    pub(crate) fn record_outcome(self, result: Result<ResultSource, AnalysisError>) {
        self.recorder.record_outcome(self.start.elapsed(), result);
    }
}
