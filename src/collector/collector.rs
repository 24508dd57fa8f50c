//! Poll driver combining command runs, parsing and aggregation.
//!
//! One call to [`Collector::poll`] is one poll cycle: `rabbitmqctl` once per
//! configured vhost, then the PID file and `pmap`. Any failure aborts the
//! cycle, so a snapshot is either complete or absent.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::collector::aggregator::{KEY_SEPARATOR, MetricSnapshot, QueueTotals, aggregate};
use crate::collector::parser::{
    self, MemoryMapSample, ParseError, QueueRecord, parse_list_queues, parse_pmap_summary,
};
use crate::collector::traits::{CommandRunner, FileSystem, RunError};
use crate::config::Config;
use crate::logging::{Logger, Severity};

/// Columns requested from `rabbitmqctl list_queues`, in parse order.
const LIST_QUEUES_COLUMNS: [&str; 5] = ["name", "durable", "messages", "memory", "consumers"];

/// Error type for a failed poll cycle.
#[derive(Debug)]
pub enum CollectError {
    /// Tool could not be launched.
    Launch {
        tool: String,
        vhost: Option<String>,
        message: String,
    },
    /// Tool did not finish in time.
    Timeout {
        tool: String,
        vhost: Option<String>,
        timeout: Duration,
    },
    /// Tool output did not contain what we need.
    Parse { tool: String, source: ParseError },
    /// PID file missing, unreadable, or without a valid pid.
    Io { path: PathBuf, message: String },
}

impl CollectError {
    fn from_run(tool: &str, vhost: Option<&str>, err: RunError) -> Self {
        let tool = tool.to_string();
        let vhost = vhost.map(str::to_string);
        match err {
            RunError::Timeout(timeout) => CollectError::Timeout {
                tool,
                vhost,
                timeout,
            },
            RunError::Launch(e) | RunError::Io(e) => CollectError::Launch {
                tool,
                vhost,
                message: e.to_string(),
            },
        }
    }
}

impl std::fmt::Display for CollectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectError::Launch {
                tool,
                vhost: Some(vhost),
                message,
            } => write!(f, "Failed to run {} for vhost {}: {}", tool, vhost, message),
            CollectError::Launch { tool, message, .. } => {
                write!(f, "Failed to run {}: {}", tool, message)
            }
            CollectError::Timeout {
                tool,
                vhost: Some(vhost),
                timeout,
            } => write!(
                f,
                "{} timed out after {:.1}s for vhost {}",
                tool,
                timeout.as_secs_f64(),
                vhost
            ),
            CollectError::Timeout { tool, timeout, .. } => {
                write!(f, "{} timed out after {:.1}s", tool, timeout.as_secs_f64())
            }
            CollectError::Parse { tool, source } => {
                write!(f, "{} returned something strange: {}", tool, source.message)
            }
            CollectError::Io { path, message } => {
                write!(f, "Unable to read {}: {}", path.display(), message)
            }
        }
    }
}

impl std::error::Error for CollectError {}

/// Timing information for each collector phase.
///
/// Used for debugging and performance monitoring.
#[derive(Debug, Clone, Default)]
pub struct CollectorTiming {
    /// Total poll time, including failed polls.
    pub total: Duration,
    /// Time spent on each `rabbitmqctl` invocation, in config order.
    pub vhosts: Vec<(String, Duration)>,
    /// Time to read the PID file and run `pmap`.
    pub pmap: Duration,
}

/// Collects one snapshot per call from `rabbitmqctl` and `pmap`.
pub struct Collector<F: FileSystem, R: CommandRunner> {
    fs: F,
    runner: R,
    logger: Arc<dyn Logger>,
    /// Timing information from the last poll call.
    last_timing: Option<CollectorTiming>,
}

impl<F: FileSystem, R: CommandRunner> Collector<F, R> {
    /// Creates a new collector.
    ///
    /// # Arguments
    /// * `fs` - Filesystem implementation used for the PID file
    /// * `runner` - Command runner (real or mock)
    /// * `logger` - Destination for error, warning and verbose messages
    pub fn new(fs: F, runner: R, logger: Arc<dyn Logger>) -> Self {
        Self {
            fs,
            runner,
            logger,
            last_timing: None,
        }
    }

    /// Returns timing information from the last poll call.
    pub fn last_timing(&self) -> Option<&CollectorTiming> {
        self.last_timing.as_ref()
    }

    /// Runs one poll cycle.
    ///
    /// Failures are logged at error level and returned; nothing is partially
    /// collected.
    pub fn poll(&mut self, config: &Config) -> Result<MetricSnapshot, CollectError> {
        let start = Instant::now();
        let mut timing = CollectorTiming::default();

        let result = self.poll_inner(config, &mut timing);

        timing.total = start.elapsed();
        debug!(
            "poll finished in {:?} ({} vhosts, pmap {:?})",
            timing.total,
            timing.vhosts.len(),
            timing.pmap
        );
        self.last_timing = Some(timing);

        if let Err(e) = &result {
            self.logger.log(Severity::Error, &e.to_string());
        }
        result
    }

    fn poll_inner(
        &self,
        config: &Config,
        timing: &mut CollectorTiming,
    ) -> Result<MetricSnapshot, CollectError> {
        let mut records: BTreeMap<String, Vec<QueueRecord>> = BTreeMap::new();

        for vhost in &config.vhosts {
            if records.contains_key(vhost) {
                continue;
            }
            let t = Instant::now();
            let queues = self.query_vhost(config, vhost)?;
            timing.vhosts.push((vhost.clone(), t.elapsed()));

            if config.verbose {
                let totals = QueueTotals::from_records(&queues);
                self.logger.log(
                    Severity::Info,
                    &format!(
                        "[{}] Messages: {}, Memory: {}, Consumers: {}",
                        vhost, totals.messages, totals.memory, totals.consumers
                    ),
                );
            }
            records.insert(vhost.clone(), queues);
        }

        let t = Instant::now();
        let sample = self.query_memory_map(config)?;
        timing.pmap = t.elapsed();

        if config.verbose {
            self.logger.log(
                Severity::Info,
                &format!(
                    "[pmap] Mapped: {}, Used: {}, Shared: {}",
                    sample.mapped, sample.used, sample.shared
                ),
            );
        }

        Ok(aggregate(&config.vhosts, &records, &sample))
    }

    /// Runs `rabbitmqctl list_queues` for one vhost.
    fn query_vhost(&self, config: &Config, vhost: &str) -> Result<Vec<QueueRecord>, CollectError> {
        let mut args = vec!["-q", "-p", vhost, "list_queues"];
        args.extend(LIST_QUEUES_COLUMNS);

        let output = self
            .runner
            .run(&config.rabbitmqctl_bin, &args, config.command_timeout)
            .map_err(|e| CollectError::from_run(&config.rabbitmqctl_bin, Some(vhost), e))?;

        let queues = parse_list_queues(&output.lines);
        debug!(
            "[{}] {} queues parsed from {} lines",
            vhost,
            queues.len(),
            output.lines.len()
        );

        for queue in queues
            .iter()
            .filter(|q| q.durable && q.name.contains(KEY_SEPARATOR))
        {
            self.logger.log(
                Severity::Warning,
                &format!(
                    "[{}] Queue name {} contains '{}', its metric keys are ambiguous",
                    vhost, queue.name, KEY_SEPARATOR
                ),
            );
        }

        Ok(queues)
    }

    /// Reads the broker PID and runs `pmap -d` against it.
    fn query_memory_map(&self, config: &Config) -> Result<MemoryMapSample, CollectError> {
        let io_error = |message: String| CollectError::Io {
            path: config.pid_file.clone(),
            message,
        };

        let content = self
            .fs
            .read_to_string(&config.pid_file)
            .map_err(|e| io_error(e.to_string()))?;
        let pid = parser::parse_pid_file(&content).map_err(|e| io_error(e.message))?;
        let pid = pid.to_string();

        let output = self
            .runner
            .run(&config.pmap_bin, &["-d", pid.as_str()], config.command_timeout)
            .map_err(|e| CollectError::from_run(&config.pmap_bin, None, e))?;

        parse_pmap_summary(&output.lines).map_err(|source| CollectError::Parse {
            tool: config.pmap_bin.clone(),
            source,
        })
    }
}
