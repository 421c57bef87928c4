//! Test fixtures shared by the unit tests of this crate.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone};

use httplog_core::pipeline::Clock;
use httplog_core::record::LogRecord;

/// Clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Local>>>,
}

impl ManualClock {
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::from_std(by).unwrap();
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        let start = Local.with_ymd_and_hms(2018, 5, 9, 16, 0, 0).unwrap();
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock().unwrap()
    }
}

pub fn record(user: &str, host: &str, resource: &str, size: u64) -> LogRecord {
    LogRecord {
        host: host.to_owned(),
        ident: "-".to_owned(),
        authuser: user.to_owned(),
        timestamp: "09/May/2018:16:00:39 +0000".to_owned(),
        method: "GET".to_owned(),
        resource: Some(resource.to_owned()),
        protocol: "1.1".to_owned(),
        status: 200,
        size,
        section: crate::parser::section_of(Some(resource)).unwrap(),
    }
}
