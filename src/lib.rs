//! rabbitmq-info - RabbitMQ metrics collector library.
//!
//! Provides:
//! - `collector`: command runner, output parsers, aggregation and the poll driver
//! - `config`: plugin configuration and collectd-style option handling
//! - `logging`: severity-tagged logging collaborator
//! - `sink`: metric delivery targets (collectd PUTVAL, JSON lines, in-memory)
//! - `plugin`: configure/read entry points driven by the daemon loop

pub mod collector;
pub mod config;
pub mod logging;
pub mod plugin;
pub mod sink;

pub use plugin::PLUGIN_NAME;
