//! Traffic statistics -- cumulative per-user/host/section hit counts with a
//! periodic top-5 report.
//!
//! [`StatsAggregator`] is a [`Subscriber`]: the tailer calls `update` for
//! every record. Its own task wakes every interval, copies a
//! [`StatsSnapshot`] out under the lock, and writes the rendered report to
//! the sink once the lock is released. Counters are never reset.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio_util::sync::CancellationToken;

use httplog_core::error::HttplogError;
use httplog_core::metrics as m;
use httplog_core::pipeline::{Clock, ReportSink, StdoutSink, Subscriber, SystemClock};
use httplog_core::record::LogRecord;
use httplog_core::task::{TaskController, TaskResult};

use crate::format::{StatsFormatter, TerminalFormatter};

/// Number of entries on each board.
pub const TOP_N: usize = 5;

/// Hit counter that remembers key insertion order.
///
/// Ranking sorts by hits, then by insertion order, both descending: among
/// equal counts the most recently inserted key ranks first.
#[derive(Debug, Default)]
pub struct CounterTable {
    entries: HashMap<String, CounterEntry>,
    next_order: u64,
}

#[derive(Debug)]
struct CounterEntry {
    hits: u64,
    order: u64,
}

impl CounterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one hit to `key`, inserting it with zero hits first if absent.
    pub fn increment(&mut self, key: &str) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.hits = entry.hits.saturating_add(1);
            return;
        }
        self.entries.insert(
            key.to_owned(),
            CounterEntry {
                hits: 1,
                order: self.next_order,
            },
        );
        self.next_order += 1;
    }

    pub fn get(&self, key: &str) -> u64 {
        self.entries.get(key).map_or(0, |e| e.hits)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The `n` busiest keys.
    pub fn top(&self, n: usize) -> Vec<(String, u64)> {
        let mut ranked: Vec<_> = self.entries.iter().collect();
        ranked.sort_unstable_by(|(_, a), (_, b)| {
            b.hits.cmp(&a.hits).then_with(|| b.order.cmp(&a.order))
        });
        ranked
            .into_iter()
            .take(n)
            .map(|(key, entry)| (key.clone(), entry.hits))
            .collect()
    }
}

/// Point-in-time view of the statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    /// Top users by hits
    pub users: Vec<(String, u64)>,
    /// Top hosts by hits
    pub hosts: Vec<(String, u64)>,
    /// Top sections by hits
    pub sections: Vec<(String, u64)>,
    /// Response bytes since start
    pub bytes_transferred: u64,
    /// Records since start
    pub record_count: u64,
    /// Average records per second since start (0 when no time elapsed)
    pub record_rate: f64,
}

impl StatsSnapshot {
    /// Users, hosts and sections boards, in display order.
    pub fn rankings(&self) -> [&[(String, u64)]; 3] {
        [&self.users, &self.hosts, &self.sections]
    }
}

#[derive(Debug, Default)]
struct StatsState {
    users: CounterTable,
    hosts: CounterTable,
    sections: CounterTable,
    record_count: u64,
    bytes_transferred: u64,
}

struct StatsInner {
    interval: Duration,
    started_at: DateTime<Local>,
    state: Mutex<StatsState>,
    formatter: Arc<dyn StatsFormatter>,
    sink: Arc<dyn ReportSink>,
    clock: Arc<dyn Clock>,
}

/// Periodic traffic statistics reporter.
pub struct StatsAggregator {
    inner: Arc<StatsInner>,
    controller: TaskController,
}

impl StatsAggregator {
    /// Aggregator with the production collaborators: colored terminal
    /// formatter, stdout, system clock.
    pub fn new(interval: Duration) -> Self {
        StatsAggregatorBuilder::new(interval).build()
    }

    pub fn builder(interval: Duration) -> StatsAggregatorBuilder {
        StatsAggregatorBuilder::new(interval)
    }

    /// Start the reporting task. No-op when already running.
    pub fn start(&self) -> bool {
        let inner = Arc::clone(&self.inner);
        self.controller.start(move |cancel| inner.run(cancel))
    }

    /// Stop the reporting task and wait for it to exit.
    pub async fn stop(&self) -> TaskResult {
        self.controller.stop().await
    }

    pub fn is_running(&self) -> bool {
        self.controller.is_running()
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    /// Current statistics. Does not touch the counters.
    pub fn snapshot(&self) -> Result<StatsSnapshot, HttplogError> {
        self.inner.snapshot()
    }

    /// Write one report if any record has been seen.
    ///
    /// Returns whether a report was written.
    pub fn report(&self) -> Result<bool, HttplogError> {
        self.inner.report()
    }
}

impl Subscriber for StatsAggregator {
    fn name(&self) -> &str {
        self.controller.name()
    }

    fn update(&self, record: &LogRecord) -> Result<(), HttplogError> {
        let mut state = self.inner.lock()?;
        state.record_count = state.record_count.saturating_add(1);
        state.bytes_transferred = state.bytes_transferred.saturating_add(record.size);
        state.users.increment(&record.authuser);
        state.hosts.increment(&record.host);
        state.sections.increment(&record.section);
        Ok(())
    }
}

impl StatsInner {
    async fn run(self: Arc<Self>, cancel: CancellationToken) -> TaskResult {
        tracing::info!(interval_secs = self.interval.as_secs(), "stats reporter started");
        loop {
            self.report()?;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        tracing::info!("stats reporter stopped");
        Ok(())
    }

    fn report(&self) -> Result<bool, HttplogError> {
        let snapshot = self.snapshot()?;
        if snapshot.record_count == 0 {
            tracing::debug!("no records yet, skipping stats report");
            return Ok(false);
        }

        let text = self.formatter.format_stats(&snapshot);
        self.sink.emit(&text)?;

        metrics::counter!(m::STATS_REPORTS_TOTAL).increment(1);
        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!(m::STATS_BYTES_TRANSFERRED).set(snapshot.bytes_transferred as f64);
        tracing::debug!(
            records = snapshot.record_count,
            bytes = snapshot.bytes_transferred,
            "stats report written"
        );
        Ok(true)
    }

    fn snapshot(&self) -> Result<StatsSnapshot, HttplogError> {
        let state = self.lock()?;
        let elapsed = self.clock.now() - self.started_at;
        let record_rate = rate(state.record_count, elapsed.num_milliseconds());

        Ok(StatsSnapshot {
            users: state.users.top(TOP_N),
            hosts: state.hosts.top(TOP_N),
            sections: state.sections.top(TOP_N),
            bytes_transferred: state.bytes_transferred,
            record_count: state.record_count,
            record_rate,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, StatsState>, HttplogError> {
        self.state
            .lock()
            .map_err(|_| HttplogError::LockPoisoned("stats".to_owned()))
    }
}

#[allow(clippy::cast_precision_loss)]
fn rate(count: u64, elapsed_ms: i64) -> f64 {
    if elapsed_ms <= 0 {
        return 0.0;
    }
    count as f64 / (elapsed_ms as f64 / 1000.0)
}

/// Builder for [`StatsAggregator`], defaulting every collaborator to its
/// production implementation.
pub struct StatsAggregatorBuilder {
    interval: Duration,
    formatter: Arc<dyn StatsFormatter>,
    sink: Arc<dyn ReportSink>,
    clock: Arc<dyn Clock>,
}

impl StatsAggregatorBuilder {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            formatter: Arc::new(TerminalFormatter::default()),
            sink: Arc::new(StdoutSink),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn formatter(mut self, formatter: Arc<dyn StatsFormatter>) -> Self {
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

    /// Build the aggregator. The start time is read from the clock here.
    pub fn build(self) -> StatsAggregator {
        let started_at = self.clock.now();
        StatsAggregator {
            inner: Arc::new(StatsInner {
                interval: self.interval,
                started_at,
                state: Mutex::new(StatsState::default()),
                formatter: self.formatter,
                sink: self.sink,
                clock: self.clock,
            }),
            controller: TaskController::new("stats"),
        }
    }
}
