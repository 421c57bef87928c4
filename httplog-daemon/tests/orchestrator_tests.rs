//! Monitor lifecycle tests: open -> start -> traffic -> shutdown.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use httplog_core::config::HttplogConfig;
use httplog_core::pipeline::MemorySink;
use httplog::orchestrator::Monitor;

const LINE: &str =
    "10.0.0.1 - bob [09/May/2018:16:00:39 +0000] \"GET /api/widgets HTTP/1.1\" 200 1024\n";

/// One-second timers, one hit per second raises the alert.
fn fast_config(log_file: &str) -> HttplogConfig {
    let mut config = HttplogConfig::default();
    config.monitor.log_file = log_file.to_owned();
    config.monitor.threshold = 1;
    config.monitor.stats_interval_secs = 1;
    config.monitor.alert_window_secs = 1;
    config.monitor.poll_interval_ms = 10;
    config.monitor.color = false;
    config
}

fn append(path: &std::path::Path, data: &str) {
    let mut file = std::fs::OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(data.as_bytes()).unwrap();
    file.flush().unwrap();
}

async fn eventually(what: &str, cond: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while !cond() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn open_missing_file_fails_with_path() {
    let config = fast_config("/nonexistent/access.log");
    let err = Monitor::open(config).await.err().expect("open should fail");
    let message = err.to_string();
    assert!(
        message.starts_with("file \"/nonexistent/access.log\" cannot be opened ("),
        "unexpected message: {message}"
    );
}

#[tokio::test]
async fn open_rejects_invalid_config() {
    let mut config = fast_config("/tmp/access.log");
    config.monitor.alert_window_secs = 0;
    let err = Monitor::open(config).await.err().expect("open should fail");
    assert!(err.to_string().contains("monitor.alert_window_secs"));
}

#[tokio::test]
async fn traffic_reaches_both_reports() {
    let file = tempfile::NamedTempFile::new().unwrap();
    append(file.path(), "old line written before startup\n");

    let sink = MemorySink::new();
    let mut monitor = Monitor::open_with_sink(
        fast_config(&file.path().display().to_string()),
        Arc::new(sink.clone()),
    )
    .await
    .unwrap();

    monitor.start();
    assert!(monitor.is_running());
    eventually("the tailer to follow the file", || monitor.is_following()).await;

    append(file.path(), &LINE.repeat(5));
    eventually("a stats report and an alert", || {
        let out = sink.contents();
        out.contains("STATS") && out.contains("High traffic generated an alert")
    })
    .await;
    eventually("every record to be counted", || {
        monitor.stats().snapshot().unwrap().record_count == 5
    })
    .await;

    let snapshot = monitor.stats().snapshot().unwrap();
    assert_eq!(snapshot.sections, vec![("/api".to_owned(), 5)]);

    monitor.shutdown().await.unwrap();
    assert!(!monitor.is_running());
}

#[tokio::test]
async fn start_twice_is_harmless() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let mut monitor = Monitor::open_with_sink(
        fast_config(&file.path().display().to_string()),
        Arc::new(MemorySink::new()),
    )
    .await
    .unwrap();

    monitor.start();
    monitor.start();
    assert!(monitor.is_running());

    monitor.shutdown().await.unwrap();
    assert!(!monitor.is_running());
}

#[tokio::test]
async fn shutdown_is_idempotent() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let mut monitor = Monitor::open_with_sink(
        fast_config(&file.path().display().to_string()),
        Arc::new(MemorySink::new()),
    )
    .await
    .unwrap();

    // never started: nothing to stop
    monitor.shutdown().await.unwrap();

    monitor.start();
    monitor.shutdown().await.unwrap();
    monitor.shutdown().await.unwrap();
    assert!(!monitor.is_following());
}

#[tokio::test]
async fn shutdown_returns_promptly_with_long_timers() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let mut config = fast_config(&file.path().display().to_string());
    config.monitor.stats_interval_secs = 3600;
    config.monitor.alert_window_secs = 3600;

    let mut monitor = Monitor::open_with_sink(config, Arc::new(MemorySink::new()))
        .await
        .unwrap();
    monitor.start();
    eventually("the tailer to follow the file", || monitor.is_following()).await;

    let before = std::time::Instant::now();
    monitor.shutdown().await.unwrap();
    assert!(before.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn records_reaching_stopped_aggregators_do_not_fail_shutdown() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let mut config = fast_config(&file.path().display().to_string());
    config.monitor.stats_interval_secs = 3600;
    config.monitor.alert_window_secs = 3600;

    let sink = MemorySink::new();
    let mut monitor = Monitor::open_with_sink(config, Arc::new(sink.clone()))
        .await
        .unwrap();
    monitor.start();
    eventually("the tailer to follow the file", || monitor.is_following()).await;

    monitor.stats().stop().await.unwrap();
    monitor.alerts().stop().await.unwrap();

    append(file.path(), &LINE.repeat(4));
    eventually("the tailer to deliver every record", || {
        monitor.stats().snapshot().unwrap().record_count == 4
    })
    .await;
    assert_eq!(monitor.alerts().window_hits().unwrap(), 4);
    assert!(monitor.is_following());
    assert!(sink.reports().is_empty());

    monitor.shutdown().await.unwrap();
    assert!(sink.reports().is_empty());
}
