//! httplog daemon library.
//!
//! Exposes the binary's building blocks for integration testing.
//! In production, `httplog` is used as a binary (main.rs).

pub mod cli;
pub mod logging;
pub mod metrics_server;
pub mod orchestrator;
