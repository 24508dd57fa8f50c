//! rabbitmq-info - RabbitMQ metrics collector daemon.
//!
//! Polls `rabbitmqctl` and `pmap` on a fixed interval and writes gauge
//! samples to stdout, either as collectd exec-plugin `PUTVAL` lines or as
//! JSON lines. Logs go to stderr.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use rabbitmq_info::collector::{ProcessRunner, RealFs};
use rabbitmq_info::config::{ConfigNode, MAX_SECONDS, load_config_file, parse_seconds};
use rabbitmq_info::logging::{Logger, TracingLogger};
use rabbitmq_info::plugin::Plugin;
use rabbitmq_info::sink::{JsonSink, MetricSink, PutvalSink};

/// Output format for samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// collectd exec plugin `PUTVAL` lines.
    Putval,
    /// One JSON object per sample.
    Json,
}

/// RabbitMQ metrics collector daemon.
#[derive(Parser)]
#[command(name = "rabbitmq-info", about = "RabbitMQ metrics collector", version)]
struct Args {
    /// Config file with `Key value...` lines (RmqcBin, PmapBin, PidFile, Verbose, Vhost, Timeout).
    /// Command-line options override it.
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Path to rabbitmqctl.
    #[arg(long, value_name = "PATH")]
    rmqc_bin: Option<String>,

    /// Path to pmap.
    #[arg(long, value_name = "PATH")]
    pmap_bin: Option<String>,

    /// Path to the RabbitMQ PID file.
    #[arg(long, value_name = "PATH")]
    pid_file: Option<String>,

    /// Virtual host to query. Repeat for several; replaces the default "/".
    #[arg(long = "vhost", value_name = "NAME")]
    vhosts: Vec<String>,

    /// Log per-vhost and memory totals and every dispatched sample.
    #[arg(long)]
    verbose_metrics: bool,

    /// Timeout for each rabbitmqctl/pmap invocation, in seconds.
    #[arg(long, value_name = "SECS", value_parser = parse_interval)]
    timeout: Option<Duration>,

    /// Collection interval in seconds.
    #[arg(short, long, env = "COLLECTD_INTERVAL", default_value = "10", value_parser = parse_interval)]
    interval: Duration,

    /// Host name used in PUTVAL identifiers.
    #[arg(long, env = "COLLECTD_HOSTNAME", default_value = "localhost")]
    hostname: String,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Putval)]
    format: OutputFormat,

    /// Poll once and exit; exit status reflects success.
    #[arg(long)]
    once: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    /// Converts command-line overrides into config nodes.
    fn config_nodes(&self) -> Vec<ConfigNode> {
        let mut nodes = Vec::new();
        if let Some(ref path) = self.rmqc_bin {
            nodes.push(ConfigNode::new("RmqcBin", [path.as_str()]));
        }
        if let Some(ref path) = self.pmap_bin {
            nodes.push(ConfigNode::new("PmapBin", [path.as_str()]));
        }
        if let Some(ref path) = self.pid_file {
            nodes.push(ConfigNode::new("PidFile", [path.as_str()]));
        }
        if !self.vhosts.is_empty() {
            nodes.push(ConfigNode::new("Vhost", self.vhosts.iter().map(String::as_str)));
        }
        if self.verbose_metrics {
            nodes.push(ConfigNode::new("Verbose", ["true"]));
        }
        if let Some(timeout) = self.timeout {
            nodes.push(ConfigNode::new(
                "Timeout",
                [timeout.as_secs_f64().to_string()],
            ));
        }
        nodes
    }
}

/// Parses a positive number of seconds, fractions allowed (collectd passes "10.000").
fn parse_interval(s: &str) -> Result<Duration, String> {
    parse_seconds(s).ok_or_else(|| {
        format!(
            "expected seconds greater than 0 and at most {}, got '{}'",
            MAX_SECONDS.as_secs(),
            s
        )
    })
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Default level is INFO. Use -q for quiet mode (errors only).
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = format!("rabbitmq_info={}", level).parse() {
        filter = filter.add_directive(directive);
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn make_sink(args: &Args, out: io::Stdout) -> Box<dyn MetricSink> {
    match args.format {
        OutputFormat::Putval => Box::new(PutvalSink::new(out, &args.hostname, args.interval)),
        OutputFormat::Json => Box::new(JsonSink::new(out)),
    }
}

fn main() {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    info!("rabbitmq-info {} starting", env!("CARGO_PKG_VERSION"));

    let logger: Arc<dyn Logger> = Arc::new(TracingLogger);
    let fs = RealFs::new();
    let mut plugin = Plugin::new(fs, ProcessRunner::new(), logger);

    if let Some(ref path) = args.config {
        match load_config_file(&fs, path) {
            Ok(nodes) => plugin.configure(&nodes),
            Err(e) => {
                error!("Failed to load config {}: {}", path.display(), e);
                std::process::exit(2);
            }
        }
    }
    plugin.configure(&args.config_nodes());

    let config = plugin.config();
    info!(
        "Config: interval={:?}, rabbitmqctl={}, pmap={}, pid_file={}, vhosts={:?}, timeout={:?}",
        args.interval,
        config.rabbitmqctl_bin,
        config.pmap_bin,
        config.pid_file.display(),
        config.vhosts,
        config.command_timeout
    );

    let mut sink = make_sink(&args, io::stdout());

    if args.once {
        let ok = plugin.read(sink.as_mut()).is_ok();
        let _ = io::stdout().flush();
        std::process::exit(if ok { 0 } else { 1 });
    }

    // Setup graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    info!("Starting collection loop");

    let mut polls: u64 = 0;
    let mut failures: u64 = 0;

    while running.load(Ordering::SeqCst) {
        polls += 1;
        match plugin.read(sink.as_mut()) {
            Ok(count) => debug!("Poll #{}: dispatched {} samples", polls, count),
            Err(e) => {
                failures += 1;
                debug!("Poll #{} failed: {}", polls, e);
            }
        }

        if let Some(timing) = plugin.collector().last_timing() {
            debug!(
                "Timing: total={:?}, pmap={:?}, vhosts={:?}",
                timing.total, timing.pmap, timing.vhosts
            );
        }

        // Sleep with periodic checks for shutdown signal
        let sleep_interval = Duration::from_millis(100);
        let mut remaining = args.interval;
        while remaining > Duration::ZERO && running.load(Ordering::SeqCst) {
            let sleep_time = remaining.min(sleep_interval);
            std::thread::sleep(sleep_time);
            remaining = remaining.saturating_sub(sleep_time);
        }
    }

    info!(
        "Shutdown complete after {} polls ({} failed)",
        polls, failures
    );
}
