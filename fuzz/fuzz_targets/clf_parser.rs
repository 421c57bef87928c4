#![no_main]

use httplog_core::pipeline::LogParser;
use httplog_monitor::parser::ClfParser;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let line = String::from_utf8_lossy(data);
    if let Ok(record) = ClfParser::new().parse(&line) {
        assert!(record.section.starts_with('/'));
        assert!(record.section.len() > 1);
    }
});
