//! File tailer -- follows a growing access log like `tail -f`.
//!
//! On start the stream is positioned at its end, so content written before
//! the tailer started is never replayed. Each complete line is parsed and
//! the record is handed synchronously to every subscriber, in registration
//! order. When no complete line is available the task sleeps for the poll
//! interval, or returns right away if cancelled.
//!
//! # Failure policy
//! - Lines that do not parse are dropped (counted and logged at debug).
//! - A line growing past [`MAX_LINE_BYTES`] without a newline is dropped
//!   (counted as a parse error, logged at warn) and the rest of it, up to
//!   the next newline, is skipped. The pending buffer never holds more
//!   than `MAX_LINE_BYTES + 1` bytes.
//! - A subscriber error or an I/O error ends the run loop; the error is
//!   returned by [`FileTailer::stop`].

use std::io::SeekFrom;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt, BufReader};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use httplog_core::config::DEFAULT_POLL_INTERVAL_MS;
use httplog_core::error::HttplogError;
use httplog_core::metrics as m;
use httplog_core::pipeline::{LogParser, Subscriber};
use httplog_core::task::{TaskController, TaskResult};

use crate::parser::ClfParser;

/// Longest accepted line, newline excluded.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

struct TailerInner<R> {
    reader: Mutex<BufReader<R>>,
    parser: Arc<dyn LogParser>,
    subscribers: Vec<Arc<dyn Subscriber>>,
    poll_interval: Duration,
    following: AtomicBool,
}

/// Background reader feeding parsed records to subscribers.
pub struct FileTailer<R> {
    inner: Arc<TailerInner<R>>,
    controller: TaskController,
}

impl<R> FileTailer<R>
where
    R: AsyncRead + AsyncSeek + Unpin + Send + 'static,
{
    pub fn builder(reader: R) -> FileTailerBuilder<R> {
        FileTailerBuilder::new(reader)
    }

    /// Start following the stream. No-op when already running.
    pub fn start(&self) -> bool {
        let inner = Arc::clone(&self.inner);
        self.controller.start(move |cancel| inner.run(cancel))
    }

    /// Stop following and wait for the task to exit.
    ///
    /// Returns the error that ended the run loop early, if any.
    pub async fn stop(&self) -> TaskResult {
        self.controller.stop().await
    }

    /// Stop, then release the underlying stream.
    pub async fn close(self) -> TaskResult {
        let result = self.stop().await;
        drop(self.inner);
        tracing::info!("log stream closed");
        result
    }

    pub fn is_running(&self) -> bool {
        self.controller.is_running()
    }

    /// Whether the task has reached the end of the stream and is waiting
    /// for new lines.
    pub fn is_following(&self) -> bool {
        self.inner.following.load(Ordering::Acquire)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }
}

impl<R> TailerInner<R>
where
    R: AsyncRead + AsyncSeek + Unpin + Send + 'static,
{
    async fn run(self: Arc<Self>, cancel: CancellationToken) -> TaskResult {
        let result = self.follow(&cancel).await;
        self.following.store(false, Ordering::Release);
        if let Err(e) = &result {
            tracing::error!(error = %e, "tailer stopped on error");
        }
        result
    }

    async fn follow(&self, cancel: &CancellationToken) -> TaskResult {
        let mut reader = self.reader.lock().await;
        let offset = reader.seek(SeekFrom::End(0)).await?;
        self.following.store(true, Ordering::Release);
        tracing::info!(
            offset,
            subscribers = self.subscribers.len(),
            format = self.parser.format_name(),
            "tailer following log"
        );

        let mut line = Vec::new();
        let mut skipping = false;
        while !cancel.is_cancelled() {
            let budget = (MAX_LINE_BYTES + 1 - line.len()) as u64;
            (&mut *reader)
                .take(budget)
                .read_until(b'\n', &mut line)
                .await?;

            if line.last() == Some(&b'\n') {
                if skipping {
                    skipping = false;
                } else {
                    self.dispatch(&line)?;
                }
                line.clear();
                continue;
            }

            if line.len() > MAX_LINE_BYTES {
                if !skipping {
                    metrics::counter!(m::PARSE_ERRORS_TOTAL).increment(1);
                    tracing::warn!(limit = MAX_LINE_BYTES, "dropping oversized line");
                    skipping = true;
                }
                line.clear();
                continue;
            }

            // EOF, possibly in the middle of a line: keep the partial bytes
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        tracing::info!("tailer stopped");
        Ok(())
    }

    fn dispatch(&self, raw: &[u8]) -> Result<(), HttplogError> {
        metrics::counter!(m::LINES_READ_TOTAL).increment(1);
        let line = String::from_utf8_lossy(raw);

        let record = match self.parser.parse(&line) {
            Ok(record) => record,
            Err(e) => {
                metrics::counter!(m::PARSE_ERRORS_TOTAL).increment(1);
                tracing::debug!(error = %e, line = line.trim_end(), "dropping unparsable line");
                return Ok(());
            }
        };

        metrics::counter!(m::RECORDS_TOTAL).increment(1);
        for subscriber in &self.subscribers {
            subscriber.update(&record).inspect_err(|e| {
                tracing::error!(subscriber = subscriber.name(), error = %e, "subscriber update failed");
            })?;
        }
        Ok(())
    }
}

/// Builder for [`FileTailer`].
pub struct FileTailerBuilder<R> {
    reader: R,
    parser: Arc<dyn LogParser>,
    subscribers: Vec<Arc<dyn Subscriber>>,
    poll_interval: Duration,
}

impl<R> FileTailerBuilder<R>
where
    R: AsyncRead + AsyncSeek + Unpin + Send + 'static,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            parser: Arc::new(ClfParser::new()),
            subscribers: Vec::new(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }

    /// Register a subscriber. Records are delivered in registration order.
    pub fn subscriber(mut self, subscriber: Arc<dyn Subscriber>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    pub fn parser(mut self, parser: Arc<dyn LogParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn build(self) -> FileTailer<R> {
        FileTailer {
            inner: Arc::new(TailerInner {
                reader: Mutex::new(BufReader::new(self.reader)),
                parser: self.parser,
                subscribers: self.subscribers,
                poll_interval: self.poll_interval,
                following: AtomicBool::new(false),
            }),
            controller: TaskController::new("tailer"),
        }
    }
}
