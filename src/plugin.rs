//! Plugin entry points: configure once, then read on every interval.
//!
//! `Plugin` owns the configuration and the collector. The host loop calls
//! [`Plugin::configure`] before polling starts and [`Plugin::read`] on each
//! tick; `read` never panics and leaves the plugin usable for the next tick.

use std::io;
use std::sync::Arc;

use crate::collector::{CollectError, Collector, CommandRunner, FileSystem};
use crate::config::{Config, ConfigNode};
use crate::logging::{Logger, Severity};
use crate::sink::MetricSink;

/// Plugin name passed to the sink with every sample.
pub const PLUGIN_NAME: &str = "rabbitmq_info";

/// Error type for a failed read.
#[derive(Debug)]
pub enum ReadError {
    /// Poll cycle failed, nothing was emitted.
    Collect(CollectError),
    /// Sink rejected a sample.
    Sink(io::Error),
}

impl std::fmt::Display for ReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadError::Collect(e) => write!(f, "collection failed: {}", e),
            ReadError::Sink(e) => write!(f, "dispatch failed: {}", e),
        }
    }
}

impl std::error::Error for ReadError {}

impl From<CollectError> for ReadError {
    fn from(e: CollectError) -> Self {
        ReadError::Collect(e)
    }
}

impl From<io::Error> for ReadError {
    fn from(e: io::Error) -> Self {
        ReadError::Sink(e)
    }
}

/// RabbitMQ metrics plugin.
pub struct Plugin<F: FileSystem, R: CommandRunner> {
    config: Config,
    collector: Collector<F, R>,
    logger: Arc<dyn Logger>,
}

impl<F: FileSystem, R: CommandRunner> Plugin<F, R> {
    /// Creates a plugin with the default configuration.
    ///
    /// # Arguments
    /// * `fs` - Filesystem implementation used for the PID file
    /// * `runner` - Command runner (real or mock)
    /// * `logger` - Destination for plugin messages
    pub fn new(fs: F, runner: R, logger: Arc<dyn Logger>) -> Self {
        Self {
            config: Config::default(),
            collector: Collector::new(fs, runner, logger.clone()),
            logger,
        }
    }

    /// Replaces the whole configuration.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Applies configuration nodes on top of the current configuration.
    pub fn configure(&mut self, nodes: &[ConfigNode]) {
        self.config.apply(nodes, self.logger.as_ref());
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn collector(&self) -> &Collector<F, R> {
        &self.collector
    }

    /// Polls once and dispatches every metric to `sink`.
    ///
    /// Returns the number of samples emitted. When the poll fails nothing is
    /// emitted.
    pub fn read(&mut self, sink: &mut dyn MetricSink) -> Result<usize, ReadError> {
        let verbose = self.config.verbose;
        if verbose {
            self.logger.log(Severity::Info, "read_callback");
        }

        let snapshot = match self.collector.poll(&self.config) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.logger
                    .log(Severity::Error, "No information received - very bad.");
                return Err(e.into());
            }
        };

        if verbose {
            self.logger
                .log(Severity::Info, "About to trigger the dispatch..");
        }

        for (key, value) in snapshot.iter() {
            if verbose {
                self.logger
                    .log(Severity::Info, &format!("Dispatching {} : {}", key, value));
            }
            if let Err(e) = sink.emit(PLUGIN_NAME, key, value) {
                self.logger.log(
                    Severity::Error,
                    &format!("Failed to dispatch {}: {}", key, e),
                );
                return Err(e.into());
            }
        }
        sink.flush()?;

        Ok(snapshot.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::{MockResponse, multi_vhost_config};
    use crate::collector::{MockFs, MockRunner};
    use crate::config::DEFAULT_RABBITMQCTL_BIN;
    use crate::logging::RecordingLogger;
    use crate::sink::MemorySink;

    struct FailingSink;

    impl MetricSink for FailingSink {
        fn emit(&mut self, _plugin: &str, _key: &str, _value: u64) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    fn plugin(runner: MockRunner) -> (Plugin<MockFs, MockRunner>, Arc<RecordingLogger>) {
        let logger = Arc::new(RecordingLogger::new());
        let plugin = Plugin::new(MockFs::typical_broker(), runner, logger.clone());
        (plugin, logger)
    }

    #[test]
    fn test_read_dispatches_every_key() {
        let (mut plugin, _) = plugin(MockRunner::typical_broker());
        let mut sink = MemorySink::new();

        let count = plugin.read(&mut sink).unwrap();

        assert_eq!(count, 12);
        assert_eq!(sink.samples.len(), 12);
        assert!(sink.samples.iter().all(|s| s.plugin == PLUGIN_NAME));
        assert_eq!(sink.value("ctl./.consumers"), Some(4));
        assert_eq!(sink.value("pmap.shared"), Some(1044));
        assert_eq!(sink.flushes, 1);
    }

    #[test]
    fn test_failed_poll_emits_nothing() {
        let mut runner = MockRunner::multi_vhost_broker();
        runner.fail_list_queues(DEFAULT_RABBITMQCTL_BIN, "staging", MockResponse::LaunchFailure);
        let (plugin, logger) = plugin(runner);
        let mut plugin = plugin.with_config(multi_vhost_config());
        let mut sink = MemorySink::new();

        let err = plugin.read(&mut sink).unwrap_err();

        assert!(matches!(err, ReadError::Collect(CollectError::Launch { .. })));
        assert!(sink.samples.is_empty());
        assert_eq!(sink.flushes, 0);
        let errors = logger.messages(Severity::Error);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[1], "No information received - very bad.");
    }

    #[test]
    fn test_plugin_recovers_on_next_read() {
        let (mut plugin, _) = plugin(MockRunner::typical_broker());
        plugin.configure(&[ConfigNode::new("PmapBin", ["/missing/pmap"])]);
        let mut sink = MemorySink::new();
        assert!(plugin.read(&mut sink).is_err());

        plugin.configure(&[ConfigNode::new("PmapBin", ["/usr/bin/pmap"])]);
        assert_eq!(plugin.read(&mut sink).unwrap(), 12);
    }

    #[test]
    fn test_configure_applies_nodes() {
        let (mut plugin, logger) = plugin(MockRunner::multi_vhost_broker());
        plugin.configure(&[
            ConfigNode::new("Vhost", ["/", "prod", "staging"]),
            ConfigNode::new("Bogus", ["x"]),
        ]);

        assert_eq!(plugin.config().vhosts, vec!["/", "prod", "staging"]);
        assert_eq!(logger.messages(Severity::Warning).len(), 1);

        let mut sink = MemorySink::new();
        plugin.read(&mut sink).unwrap();
        assert_eq!(sink.value("ctl.prod.messages"), Some(308));
    }

    #[test]
    fn test_verbose_read_logs_dispatch() {
        let (mut plugin, logger) = plugin(MockRunner::typical_broker());
        plugin.configure(&[ConfigNode::new("Verbose", ["true"])]);
        let mut sink = MemorySink::new();

        plugin.read(&mut sink).unwrap();

        let info = logger.messages(Severity::Info);
        assert_eq!(info[0], "read_callback");
        assert!(info.contains(&"About to trigger the dispatch..".to_string()));
        assert!(info.contains(&"Dispatching pmap.mapped : 2811596".to_string()));
        assert_eq!(info.iter().filter(|m| m.starts_with("Dispatching")).count(), 12);
    }

    #[test]
    fn test_sink_failure_is_reported() {
        let (mut plugin, logger) = plugin(MockRunner::typical_broker());

        let err = plugin.read(&mut FailingSink).unwrap_err();

        assert!(matches!(err, ReadError::Sink(_)));
        assert_eq!(logger.messages(Severity::Error).len(), 1);
        assert!(plugin.collector().last_timing().is_some());
    }
}
