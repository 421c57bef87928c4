//! High traffic alerting -- windowed hit count against a rate threshold.
//!
//! [`AlertDetector`] counts records in fixed windows. At the end of each
//! window it compares the count with `threshold × window_secs` and emits an
//! alert only on a state change:
//!
//! ```text
//!            hits >= threshold
//!   Normal ─────────────────────▶ Alerting   (High alert)
//!          ◀─────────────────────
//!            hits <  threshold               (Recovered alert)
//! ```
//!
//! The window counter is reset after every evaluation.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio_util::sync::CancellationToken;

use httplog_core::error::HttplogError;
use httplog_core::metrics as m;
use httplog_core::pipeline::{Clock, ReportSink, StdoutSink, Subscriber, SystemClock};
use httplog_core::record::LogRecord;
use httplog_core::task::{TaskController, TaskResult};

use crate::format::{AlertFormatter, TerminalFormatter};

/// Direction of a threshold crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    /// Window count reached the threshold
    High,
    /// Window count fell back below the threshold
    Recovered,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Recovered => "recovered",
        }
    }
}

/// One emitted alert.
#[derive(Debug, Clone, PartialEq)]
pub struct TrafficAlert {
    pub kind: AlertKind,
    /// Hits counted in the window that triggered the alert
    pub hits: u64,
    /// Window length
    pub window: Duration,
    /// Evaluation time
    pub at: DateTime<Local>,
}

impl TrafficAlert {
    /// Average hits per second over the window.
    #[allow(clippy::cast_precision_loss)]
    pub fn average_rate(&self) -> f64 {
        let secs = self.window.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.hits as f64 / secs
    }
}

#[derive(Debug, Default)]
struct AlertState {
    window_hits: u64,
    threshold_passed: bool,
}

struct AlertInner {
    window: Duration,
    threshold: u64,
    state: Mutex<AlertState>,
    formatter: Arc<dyn AlertFormatter>,
    sink: Arc<dyn ReportSink>,
    clock: Arc<dyn Clock>,
}

/// Edge-triggered high traffic detector.
pub struct AlertDetector {
    inner: Arc<AlertInner>,
    controller: TaskController,
}

impl AlertDetector {
    /// Detector with the production collaborators. `threshold` is in hits
    /// per second; 0 raises the alert on the first, empty, window.
    pub fn new(threshold: u64, window: Duration) -> Self {
        AlertDetectorBuilder::new(threshold, window).build()
    }

    pub fn builder(threshold: u64, window: Duration) -> AlertDetectorBuilder {
        AlertDetectorBuilder::new(threshold, window)
    }

    /// Start the evaluation task. No-op when already running.
    pub fn start(&self) -> bool {
        let inner = Arc::clone(&self.inner);
        self.controller.start(move |cancel| inner.run(cancel))
    }

    /// Stop the evaluation task and wait for it to exit.
    pub async fn stop(&self) -> TaskResult {
        self.controller.stop().await
    }

    pub fn is_running(&self) -> bool {
        self.controller.is_running()
    }

    /// Hits a window must reach to raise the alert.
    pub fn threshold(&self) -> u64 {
        self.inner.threshold
    }

    pub fn window(&self) -> Duration {
        self.inner.window
    }

    /// Hits counted in the current window so far.
    pub fn window_hits(&self) -> Result<u64, HttplogError> {
        Ok(self.inner.lock()?.window_hits)
    }

    /// Whether the high traffic alert is active.
    pub fn is_alerting(&self) -> Result<bool, HttplogError> {
        Ok(self.inner.lock()?.threshold_passed)
    }

    /// Close the current window: emit an alert on a state change and reset
    /// the counter.
    pub fn evaluate(&self) -> Result<Option<TrafficAlert>, HttplogError> {
        self.inner.evaluate()
    }
}

impl Subscriber for AlertDetector {
    fn name(&self) -> &str {
        self.controller.name()
    }

    fn update(&self, _record: &LogRecord) -> Result<(), HttplogError> {
        let mut state = self.inner.lock()?;
        state.window_hits = state.window_hits.saturating_add(1);
        Ok(())
    }
}

impl AlertInner {
    async fn run(self: Arc<Self>, cancel: CancellationToken) -> TaskResult {
        tracing::info!(
            threshold = self.threshold,
            window_secs = self.window.as_secs(),
            "alert detector started"
        );
        loop {
            self.evaluate()?;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.window) => {}
            }
        }
        tracing::info!("alert detector stopped");
        Ok(())
    }

    fn evaluate(&self) -> Result<Option<TrafficAlert>, HttplogError> {
        let alert = {
            let mut state = self.lock()?;
            let hits = state.window_hits;
            let kind = if hits >= self.threshold && !state.threshold_passed {
                state.threshold_passed = true;
                Some(AlertKind::High)
            } else if hits < self.threshold && state.threshold_passed {
                state.threshold_passed = false;
                Some(AlertKind::Recovered)
            } else {
                None
            };
            state.window_hits = 0;

            #[allow(clippy::cast_precision_loss)]
            metrics::gauge!(m::ALERT_WINDOW_HITS).set(hits as f64);
            metrics::gauge!(m::ALERT_ACTIVE).set(if state.threshold_passed { 1.0 } else { 0.0 });
            tracing::debug!(hits, threshold = self.threshold, "alert window closed");

            kind.map(|kind| TrafficAlert {
                kind,
                hits,
                window: self.window,
                at: self.clock.now(),
            })
        };

        if let Some(alert) = &alert {
            self.sink.emit(&self.formatter.format_alert(alert))?;
            metrics::counter!(m::ALERTS_TOTAL, m::LABEL_KIND => alert.kind.as_str()).increment(1);
            tracing::info!(kind = alert.kind.as_str(), hits = alert.hits, "traffic alert");
        }
        Ok(alert)
    }

    fn lock(&self) -> Result<MutexGuard<'_, AlertState>, HttplogError> {
        self.state
            .lock()
            .map_err(|_| HttplogError::LockPoisoned("alerts".to_owned()))
    }
}

/// Builder for [`AlertDetector`], defaulting every collaborator to its
/// production implementation.
pub struct AlertDetectorBuilder {
    threshold_per_sec: u64,
    window: Duration,
    formatter: Arc<dyn AlertFormatter>,
    sink: Arc<dyn ReportSink>,
    clock: Arc<dyn Clock>,
}

impl AlertDetectorBuilder {
    pub fn new(threshold_per_sec: u64, window: Duration) -> Self {
        Self {
            threshold_per_sec,
            window,
            formatter: Arc::new(TerminalFormatter::default()),
            sink: Arc::new(StdoutSink),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn formatter(mut self, formatter: Arc<dyn AlertFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> AlertDetector {
        AlertDetector {
            inner: Arc::new(AlertInner {
                window: self.window,
                threshold: self.threshold_per_sec.saturating_mul(self.window.as_secs()),
                state: Mutex::new(AlertState::default()),
                formatter: self.formatter,
                sink: self.sink,
                clock: self.clock,
            }),
            controller: TaskController::new("alerts"),
        }
    }
}
