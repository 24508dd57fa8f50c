//! Plugin configuration.
//!
//! `Config` holds the recognised options with their defaults. Options arrive
//! as collectd-style [`ConfigNode`]s (a key plus one or more values), either
//! from the host framework or from a config file read by
//! [`parse_config_file`]. Unknown keys and bad values are reported as
//! warnings and never abort configuration.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::collector::traits::FileSystem;
use crate::logging::{Logger, Severity};

/// Default path to `rabbitmqctl`.
pub const DEFAULT_RABBITMQCTL_BIN: &str = "/usr/sbin/rabbitmqctl";
/// Default path to `pmap`.
pub const DEFAULT_PMAP_BIN: &str = "/usr/bin/pmap";
/// Default broker PID file.
pub const DEFAULT_PID_FILE: &str = "/var/run/rabbitmq/pid";
/// Default virtual host.
pub const DEFAULT_VHOST: &str = "/";
/// Default bound on each external command.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
/// Largest accepted `Timeout` or poll interval (one day).
pub const MAX_SECONDS: Duration = Duration::from_secs(24 * 60 * 60);

/// Options for one poll cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// `RmqcBin`
    pub rabbitmqctl_bin: String,
    /// `PmapBin`
    pub pmap_bin: String,
    /// `PidFile`
    pub pid_file: PathBuf,
    /// `Verbose`: log per-host and memory-map totals every cycle.
    pub verbose: bool,
    /// `Vhost`: never empty.
    pub vhosts: Vec<String>,
    /// `Timeout`: upper bound for each `rabbitmqctl`/`pmap` invocation.
    pub command_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rabbitmqctl_bin: DEFAULT_RABBITMQCTL_BIN.to_string(),
            pmap_bin: DEFAULT_PMAP_BIN.to_string(),
            pid_file: PathBuf::from(DEFAULT_PID_FILE),
            verbose: false,
            vhosts: vec![DEFAULT_VHOST.to_string()],
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

/// A single configuration option: key followed by its values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigNode {
    pub key: String,
    pub values: Vec<String>,
}

impl ConfigNode {
    pub fn new<K, I, V>(key: K, values: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Self {
            key: key.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    fn first_value(&self) -> Result<&str, String> {
        self.values
            .first()
            .map(String::as_str)
            .ok_or_else(|| format!("Config key {} has no value", self.key))
    }
}

impl Config {
    /// Applies configuration nodes in order. Later nodes override earlier ones.
    ///
    /// Problems are logged as warnings through `logger` and the affected
    /// option keeps its previous value.
    pub fn apply(&mut self, nodes: &[ConfigNode], logger: &dyn Logger) {
        for node in nodes {
            if let Err(message) = self.apply_node(node) {
                logger.log(Severity::Warning, &message);
            }
        }
    }

    fn apply_node(&mut self, node: &ConfigNode) -> Result<(), String> {
        match node.key.as_str() {
            "RmqcBin" => self.rabbitmqctl_bin = node.first_value()?.to_string(),
            "PmapBin" => self.pmap_bin = node.first_value()?.to_string(),
            "PidFile" => self.pid_file = PathBuf::from(node.first_value()?),
            "Verbose" => {
                let value = node.first_value()?;
                self.verbose = parse_bool(value)
                    .ok_or_else(|| format!("Invalid boolean for Verbose: {}", value))?;
            }
            "Vhost" => {
                if node.values.is_empty() {
                    return Err("Vhost needs at least one virtual host, keeping previous list"
                        .to_string());
                }
                self.vhosts = node.values.clone();
            }
            "Timeout" => {
                let value = node.first_value()?;
                self.command_timeout = parse_seconds(value)
                    .ok_or_else(|| format!("Invalid Timeout: {}", value))?;
            }
            "PidofBin" => {
                return Err("Config key PidofBin is no longer used, PidFile is read instead"
                    .to_string());
            }
            other => return Err(format!("Unknown config key: {}", other)),
        }
        Ok(())
    }
}

/// Parses a boolean-ish option value.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Parses a positive number of seconds, fractions allowed, up to [`MAX_SECONDS`].
pub fn parse_seconds(value: &str) -> Option<Duration> {
    let secs: f64 = value.trim().parse().ok()?;
    if secs.is_nan() || secs <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(secs)
        .ok()
        .filter(|d| !d.is_zero() && *d <= MAX_SECONDS)
}

/// Error type for config file loading.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file could not be read.
    Io(io::Error),
    /// Line could not be tokenized.
    Syntax { line: usize, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "I/O error: {}", e),
            ConfigError::Syntax { line, message } => {
                write!(f, "syntax error on line {}: {}", line, message)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self {
        ConfigError::Io(e)
    }
}

/// Parses a config file into nodes.
///
/// Format: one `Key value [value...]` per line. Values may be double-quoted
/// (with `\"` and `\\` escapes). `#` starts a comment outside quotes.
///
/// ```text
/// RmqcBin "/usr/sbin/rabbitmqctl"
/// Vhost "/" "prod"
/// Verbose true
/// ```
pub fn parse_config_file(content: &str) -> Result<Vec<ConfigNode>, ConfigError> {
    let mut nodes = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        let tokens = tokenize_line(line).map_err(|message| ConfigError::Syntax {
            line: idx + 1,
            message,
        })?;
        let mut tokens = tokens.into_iter();
        if let Some(key) = tokens.next() {
            nodes.push(ConfigNode::new(key, tokens));
        }
    }

    Ok(nodes)
}

/// Reads and parses a config file.
pub fn load_config_file(fs: &dyn FileSystem, path: &Path) -> Result<Vec<ConfigNode>, ConfigError> {
    let content = fs.read_to_string(path)?;
    parse_config_file(&content)
}

fn tokenize_line(line: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        match chars.peek() {
            None | Some('#') => break,
            Some('"') => {
                chars.next();
                let mut token = String::new();
                loop {
                    match chars.next() {
                        None => return Err("unterminated quoted value".to_string()),
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(c @ ('"' | '\\')) => token.push(c),
                            Some(c) => {
                                token.push('\\');
                                token.push(c);
                            }
                            None => return Err("unterminated quoted value".to_string()),
                        },
                        Some(c) => token.push(c),
                    }
                }
                tokens.push(token);
            }
            Some(_) => {
                let mut token = String::new();
                while let Some(c) = chars.next_if(|c| !c.is_whitespace() && *c != '#') {
                    token.push(c);
                }
                tokens.push(token);
            }
        }
    }

    Ok(tokens)
}
