//! Metric delivery targets.
//!
//! A sink receives one `emit` call per metric key of a snapshot. Values are
//! always gauges.
//!
//! - [`PutvalSink`] writes the collectd exec-plugin plain-text protocol, so
//!   the daemon can run under collectd's `exec` plugin.
//! - [`JsonSink`] writes one JSON object per line.
//! - [`MemorySink`] keeps samples in memory for tests.

use std::io::{self, Write};
use std::time::Duration;

use serde::Serialize;

/// Receiver of metric samples.
pub trait MetricSink {
    /// Delivers one gauge sample.
    fn emit(&mut self, plugin: &str, key: &str, value: u64) -> io::Result<()>;

    /// Called once after all samples of a poll cycle were emitted.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Writes `PUTVAL` lines for collectd's exec plugin.
///
/// ```text
/// PUTVAL "node1/rabbitmq_info/gauge-ctl./.messages" interval=10.000 1700000000:120
/// ```
pub struct PutvalSink<W: Write> {
    writer: W,
    hostname: String,
    interval: Duration,
}

impl<W: Write> PutvalSink<W> {
    /// Creates a new sink.
    ///
    /// # Arguments
    /// * `writer` - Output, usually stdout
    /// * `hostname` - Host part of the value identifier
    /// * `interval` - Poll interval announced to collectd
    pub fn new(writer: W, hostname: impl Into<String>, interval: Duration) -> Self {
        Self {
            writer,
            hostname: hostname.into(),
            interval,
        }
    }

    /// Consumes the sink, returning the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> MetricSink for PutvalSink<W> {
    fn emit(&mut self, plugin: &str, key: &str, value: u64) -> io::Result<()> {
        writeln!(
            self.writer,
            "PUTVAL \"{}/{}/gauge-{}\" interval={:.3} {}:{}",
            self.hostname,
            plugin,
            key,
            self.interval.as_secs_f64(),
            chrono::Utc::now().timestamp(),
            value
        )
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

#[derive(Serialize)]
struct JsonSample<'a> {
    time: i64,
    plugin: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    key: &'a str,
    value: u64,
}

/// Writes one JSON object per sample.
pub struct JsonSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Consumes the sink, returning the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> MetricSink for JsonSink<W> {
    fn emit(&mut self, plugin: &str, key: &str, value: u64) -> io::Result<()> {
        let sample = JsonSample {
            time: chrono::Utc::now().timestamp(),
            plugin,
            kind: "gauge",
            key,
            value,
        };
        serde_json::to_writer(&mut self.writer, &sample)?;
        self.writer.write_all(b"\n")
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// One sample captured by [`MemorySink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub plugin: String,
    pub key: String,
    pub value: u64,
}

/// Keeps emitted samples in memory. Used by tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub samples: Vec<Sample>,
    /// Number of `flush` calls.
    pub flushes: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value emitted for `key`, if any.
    pub fn value(&self, key: &str) -> Option<u64> {
        self.samples.iter().find(|s| s.key == key).map(|s| s.value)
    }
}

impl MetricSink for MemorySink {
    fn emit(&mut self, plugin: &str, key: &str, value: u64) -> io::Result<()> {
        self.samples.push(Sample {
            plugin: plugin.to_string(),
            key: key.to_string(),
            value,
        });
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flushes += 1;
        Ok(())
    }
}
