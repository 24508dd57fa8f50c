//! RabbitMQ metrics collector.
//!
//! This module runs the broker's administrative tools, parses their output
//! and aggregates it into a flat [`MetricSnapshot`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Collector                           │
//! │  ┌──────────────────────┐   ┌────────────────────────────┐  │
//! │  │  per vhost           │   │  memory map                │  │
//! │  │  rabbitmqctl         │   │  PID file -> pmap -d <pid> │  │
//! │  │  parse_list_queues   │   │  parse_pmap_summary        │  │
//! │  └──────────┬───────────┘   └──────────────┬─────────────┘  │
//! │             └──────────────┬───────────────┘                │
//! │                     ┌──────▼──────┐                         │
//! │                     │  aggregate  │ -> MetricSnapshot       │
//! │                     └─────────────┘                         │
//! └─────────────────────────────────────────────────────────────┘
//!          │                                     │
//!   ┌──────▼────────┐                     ┌──────▼──────┐
//!   │ CommandRunner │ (trait)             │ FileSystem  │ (trait)
//!   └──────┬────────┘                     └──────┬──────┘
//!    ProcessRunner / MockRunner            RealFs / MockFs
//! ```
//!
//! # Usage
//!
//! ## Production
//!
//! ```ignore
//! use std::sync::Arc;
//! use rabbitmq_info::collector::{Collector, ProcessRunner, RealFs};
//! use rabbitmq_info::config::Config;
//! use rabbitmq_info::logging::TracingLogger;
//!
//! let mut collector = Collector::new(RealFs::new(), ProcessRunner::new(), Arc::new(TracingLogger));
//! let snapshot = collector.poll(&Config::default()).unwrap();
//! ```
//!
//! ## Testing (with mocks)
//!
//! ```
//! use std::sync::Arc;
//! use rabbitmq_info::collector::{Collector, MockFs, MockRunner};
//! use rabbitmq_info::config::Config;
//! use rabbitmq_info::logging::RecordingLogger;
//!
//! let logger = Arc::new(RecordingLogger::new());
//! let mut collector = Collector::new(MockFs::typical_broker(), MockRunner::typical_broker(), logger);
//! let snapshot = collector.poll(&Config::default()).unwrap();
//! assert_eq!(snapshot.get("ctl./.messages"), Some(120));
//! ```

pub mod aggregator;
#[allow(clippy::module_inception)]
mod collector;
pub mod mock;
pub mod parser;
mod runner;
pub mod traits;

pub use aggregator::{MetricSnapshot, QueueTotals, aggregate};
pub use collector::{CollectError, Collector, CollectorTiming};
pub use mock::{MockFs, MockRunner};
pub use parser::{MemoryMapSample, ParseError, QueueRecord};
pub use runner::ProcessRunner;
pub use traits::{CommandOutput, CommandRunner, FileSystem, RealFs, RunError};
