//! Fan-in of per-backend format reports.
//!
//! Every backend scrape task contributes exactly one report through its own
//! [`FormatSink`] handle; the channel is sized so producers never block. The
//! collection is complete once every sink handle has been dropped, which is
//! how a failed producer still lets the drain terminate.

use tokio::sync::mpsc;
use tracing::debug;

use super::format::ExpositionFormat;

/// Outcome of one backend scrape attempt, as far as negotiation cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatReport {
    /// The backend responded; its `Content-Type` classified to this format.
    Classified(ExpositionFormat),
    /// The backend did not produce a usable response (timeout, transport
    /// error, non-success status).
    Absent,
}

impl FormatReport {
    /// The format, when this report can contribute to the merged output.
    pub fn servable_format(&self) -> Option<ExpositionFormat> {
        match self {
            Self::Classified(format) if format.is_servable() => Some(*format),
            _ => None,
        }
    }
}

/// Producer handle; one clone per backend scrape task.
#[derive(Clone)]
pub struct FormatSink {
    tx: mpsc::Sender<FormatReport>,
}

impl FormatSink {
    pub async fn report(&self, report: FormatReport) {
        if self.tx.send(report).await.is_err() {
            debug!("format collector dropped before report was delivered");
        }
    }
}

/// Consumer side: a bounded, close-on-completion aggregation of reports.
pub struct FormatCollector {
    rx: mpsc::Receiver<FormatReport>,
}

impl FormatCollector {
    /// Creates a collector expecting up to `expected` reports, returning the
    /// producer handle to clone into each scrape task. Capacity matches the
    /// expected count so `report` never has to wait on the consumer.
    pub fn channel(expected: usize) -> (FormatSink, Self) {
        let (tx, rx) = mpsc::channel(expected.max(1));
        (FormatSink { tx }, Self { rx })
    }

    /// Receives every report, returning only once all producer handles are
    /// gone. This is the aggregation barrier: negotiation never runs on a
    /// partial set.
    pub async fn drain(mut self) -> Vec<FormatReport> {
        let mut reports = Vec::new();
        while let Some(report) = self.rx.recv().await {
            reports.push(report);
        }
        reports
    }
}
