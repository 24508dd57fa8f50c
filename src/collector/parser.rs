//! Parsers for `rabbitmqctl list_queues` and `pmap -d` output.
//!
//! These are pure functions over captured output lines. They are designed to
//! be easily testable with string inputs.

use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

/// Three numeric groups of the `pmap -d` summary line.
static PMAP_SUMMARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^0-9]+([0-9]+)[^0-9]+([0-9]+)[^0-9]+([0-9]+)")
        .expect("pmap summary pattern is valid")
});

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

/// One queue as reported by `list_queues name durable messages memory consumers`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueRecord {
    pub name: String,
    /// True only when the tool printed the literal `true`.
    pub durable: bool,
    /// Messages ready plus unacknowledged.
    pub messages: u64,
    /// Bytes of memory used by the queue process.
    pub memory: u64,
    pub consumers: u64,
}

/// Parses a single `list_queues` line.
///
/// Returns `None` for lines with fewer than five whitespace-separated fields
/// or with non-integer messages/memory/consumers columns. Header and banner
/// lines printed by some `rabbitmqctl` versions fall into this category.
pub fn parse_queue_line(line: &str) -> Option<QueueRecord> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 5 {
        return None;
    }

    Some(QueueRecord {
        messages: fields[2].parse().ok()?,
        memory: fields[3].parse().ok()?,
        consumers: fields[4].parse().ok()?,
        durable: fields[1] == "true",
        name: fields[0].to_string(),
    })
}

/// Parses the full `list_queues` output for one virtual host.
///
/// Malformed lines are skipped.
pub fn parse_list_queues<S: AsRef<str>>(lines: &[S]) -> Vec<QueueRecord> {
    let records: Vec<QueueRecord> = lines
        .iter()
        .filter_map(|line| parse_queue_line(line.as_ref()))
        .collect();

    let skipped = lines.len() - records.len();
    if skipped > 0 {
        trace!("list_queues: skipped {} unparsable lines", skipped);
    }

    records
}

/// Memory totals from the `pmap -d` summary line, in kilobytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryMapSample {
    pub mapped: u64,
    /// Writeable/private memory.
    pub used: u64,
    pub shared: u64,
}

/// Parses `pmap -d` output.
///
/// The summary is the last non-blank line and must start with `mapped`, e.g.
/// `mapped: 933712K    writeable/private: 4304K    shared: 768K`.
pub fn parse_pmap_summary<S: AsRef<str>>(lines: &[S]) -> Result<MemoryMapSample, ParseError> {
    let line = lines
        .iter()
        .map(|line| line.as_ref().trim())
        .rfind(|line| !line.is_empty())
        .ok_or_else(|| ParseError::new("empty pmap output"))?;

    if !line.starts_with("mapped") {
        return Err(ParseError::new(format!(
            "last line is not a summary: {:?}",
            line
        )));
    }

    let caps = PMAP_SUMMARY
        .captures(line)
        .ok_or_else(|| ParseError::new(format!("malformed summary line: {:?}", line)))?;

    let field = |idx: usize, name: &str| -> Result<u64, ParseError> {
        caps[idx]
            .parse()
            .map_err(|_| ParseError::new(format!("invalid {} value {:?}", name, &caps[idx])))
    };

    Ok(MemoryMapSample {
        mapped: field(1, "mapped")?,
        used: field(2, "used")?,
        shared: field(3, "shared")?,
    })
}

/// Parses the content of a PID file.
pub fn parse_pid_file(content: &str) -> Result<u32, ParseError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(ParseError::new("pid file is empty"));
    }
    content
        .parse()
        .map_err(|_| ParseError::new(format!("invalid pid {:?}", content)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_queue_line_basic() {
        let record = parse_queue_line("orders\ttrue\t12\t34560\t2").unwrap();

        assert_eq!(record.name, "orders");
        assert!(record.durable);
        assert_eq!(record.messages, 12);
        assert_eq!(record.memory, 34560);
        assert_eq!(record.consumers, 2);
    }

    #[test]
    fn test_parse_queue_line_too_few_fields() {
        assert_eq!(parse_queue_line("orders true 12 34560"), None);
        assert_eq!(parse_queue_line(""), None);
    }

    #[test]
    fn test_parse_queue_line_non_numeric() {
        assert_eq!(parse_queue_line("orders true twelve 34560 2"), None);
        assert_eq!(parse_queue_line("orders true 12 34560 -1"), None);
        assert_eq!(parse_queue_line("name durable messages memory consumers"), None);
    }

    #[test]
    fn test_parse_queue_line_durable_literal() {
        let durable = |text: &str| parse_queue_line(text).unwrap().durable;

        assert!(durable("q true 1 2 3"));
        assert!(!durable("q false 1 2 3"));
        assert!(!durable("q TRUE 1 2 3"));
        assert!(!durable("q True 1 2 3"));
        assert!(!durable("q yes 1 2 3"));
    }

    #[test]
    fn test_parse_queue_line_extra_fields_ignored() {
        let record = parse_queue_line("q true 1 2 3 extra").unwrap();
        assert_eq!(record.consumers, 3);
    }

    #[test]
    fn test_parse_list_queues_skips_noise() {
        let content = "\
Timeout: 60.0 seconds ...
Listing queues for vhost / ...
name\tdurable\tmessages\tmemory\tconsumers
orders\ttrue\t12\t34560\t2
tmp.reply\tfalse\t0\t9000\t1
broken line
";
        let lines: Vec<&str> = content.lines().collect();
        let records = parse_list_queues(&lines);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "orders");
        assert_eq!(records[1].name, "tmp.reply");
        assert!(!records[1].durable);
    }

    #[test]
    fn test_parse_pmap_summary() {
        let lines = [
            "4242:   /usr/lib/erlang/erts-13.2/bin/beam.smp",
            "Address           Kbytes Mode  Offset           Device    Mapping",
            "mapped: 12345K writable-private: 6789K shared: 42K",
        ];
        let sample = parse_pmap_summary(&lines).unwrap();

        assert_eq!(
            sample,
            MemoryMapSample {
                mapped: 12345,
                used: 6789,
                shared: 42
            }
        );
    }

    #[test]
    fn test_parse_pmap_summary_trailing_blank_lines() {
        let lines = ["mapped: 933712K    writeable/private: 4304K    shared: 768K", "", "  "];
        let sample = parse_pmap_summary(&lines).unwrap();
        assert_eq!(sample.mapped, 933712);
        assert_eq!(sample.used, 4304);
        assert_eq!(sample.shared, 768);
    }

    #[test]
    fn test_parse_pmap_summary_last_line_not_mapped() {
        let lines = [
            "mapped: 12345K writable-private: 6789K shared: 42K",
            "pmap: cannot read process",
        ];
        assert!(parse_pmap_summary(&lines).is_err());
    }

    #[test]
    fn test_parse_pmap_summary_errors() {
        let empty: [&str; 0] = [];
        assert!(parse_pmap_summary(&empty).is_err());
        assert!(parse_pmap_summary(&["mapped: unknown"]).is_err());
        assert!(parse_pmap_summary(&["mapped: 1K used: 2K"]).is_err());
        assert!(parse_pmap_summary(&["mapped: 99999999999999999999999K used: 1K shared: 1K"]).is_err());
    }

    #[test]
    fn test_parse_pid_file() {
        assert_eq!(parse_pid_file("4242\n"), Ok(4242));
        assert_eq!(parse_pid_file("  17  "), Ok(17));
        assert!(parse_pid_file("").is_err());
        assert!(parse_pid_file(" \n").is_err());
        assert!(parse_pid_file("rabbit").is_err());
    }
}
