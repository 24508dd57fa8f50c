//! Mock implementations for testing.
//!
//! This module provides `MockFs`, `MockRunner` and pre-built broker scenarios
//! for testing the collector without a running RabbitMQ node, `rabbitmqctl`
//! or `pmap`.

mod filesystem;
mod runner;
mod scenarios;

pub use filesystem::MockFs;
pub use runner::{MockResponse, MockRunner};
pub use scenarios::{TYPICAL_BROKER_PID, multi_vhost_config};
