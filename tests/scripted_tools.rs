//! End-to-end polls against shell scripts standing in for `rabbitmqctl` and `pmap`.
#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use rabbitmq_info::collector::{CollectError, ProcessRunner, RealFs};
use rabbitmq_info::config::ConfigNode;
use rabbitmq_info::logging::{RecordingLogger, Severity};
use rabbitmq_info::plugin::{Plugin, ReadError};
use rabbitmq_info::sink::MemorySink;

const FAKE_RABBITMQCTL: &str = r#"#!/bin/sh
# args: -q -p <vhost> list_queues name durable messages memory consumers
case "$3" in
  /)
    printf 'orders\ttrue\t5\t1000\t1\n'
    printf 'scratch\tfalse\t2\t500\t0\n'
    ;;
  prod)
    printf 'Listing queues for vhost prod ...\n'
    printf 'billing\ttrue\t9\t4000\t3\n'
    ;;
  slow)
    sleep 5
    ;;
  *)
    echo "Error: vhost $3 does not exist" >&2
    exit 2
    ;;
esac
"#;

const FAKE_PMAP: &str = r#"#!/bin/sh
# args: -d <pid>
echo "$2:   beam.smp"
echo "Address           Kbytes Mode  Offset           Device    Mapping"
echo "mapped: 12345K    writeable/private: 6789K    shared: 42K"
"#;

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Scripts are written once, before any test spawns a process, so no
/// child can inherit a write handle to them (ETXTBSY on exec).
struct Tools {
    _dir: tempfile::TempDir,
    rabbitmqctl: PathBuf,
    pmap: PathBuf,
    pid_file: PathBuf,
}

static TOOLS: LazyLock<Tools> = LazyLock::new(|| {
    let dir = tempfile::tempdir().unwrap();
    let rabbitmqctl = write_script(dir.path(), "rabbitmqctl", FAKE_RABBITMQCTL);
    let pmap = write_script(dir.path(), "pmap", FAKE_PMAP);
    let pid_file = dir.path().join("rabbitmq.pid");
    fs::write(&pid_file, "31337\n").unwrap();
    Tools {
        _dir: dir,
        rabbitmqctl,
        pmap,
        pid_file,
    }
});

fn config_nodes(vhosts: &[&str]) -> Vec<ConfigNode> {
    let tools = &*TOOLS;
    vec![
        ConfigNode::new("RmqcBin", [tools.rabbitmqctl.to_str().unwrap()]),
        ConfigNode::new("PmapBin", [tools.pmap.to_str().unwrap()]),
        ConfigNode::new("PidFile", [tools.pid_file.to_str().unwrap()]),
        ConfigNode::new("Vhost", vhosts.iter().copied()),
        ConfigNode::new("Timeout", ["2"]),
    ]
}

fn plugin(nodes: &[ConfigNode]) -> (Plugin<RealFs, ProcessRunner>, Arc<RecordingLogger>) {
    let logger = Arc::new(RecordingLogger::new());
    let mut plugin = Plugin::new(RealFs::new(), ProcessRunner::new(), logger.clone());
    plugin.configure(nodes);
    (plugin, logger)
}

#[test]
fn test_full_poll_with_scripts() {
    let (mut plugin, logger) = plugin(&config_nodes(&["/", "prod"]));
    assert_eq!(plugin.config().command_timeout, Duration::from_secs(2));
    let mut sink = MemorySink::new();

    let count = plugin.read(&mut sink).unwrap();

    // 2 vhosts, 2 durable queues, pmap
    assert_eq!(count, 6 + 6 + 3);
    assert_eq!(sink.value("ctl./.messages"), Some(7));
    assert_eq!(sink.value("ctl./.memory"), Some(1500));
    assert_eq!(sink.value("ctl./.orders.consumers"), Some(1));
    assert_eq!(sink.value("ctl./.scratch.messages"), None);
    assert_eq!(sink.value("ctl.prod.billing.memory"), Some(4000));
    assert_eq!(sink.value("pmap.mapped"), Some(12345));
    assert_eq!(sink.value("pmap.used"), Some(6789));
    assert_eq!(sink.value("pmap.shared"), Some(42));
    assert!(logger.messages(Severity::Error).is_empty());
}

#[test]
fn test_unknown_vhost_yields_zero_aggregates() {
    // rabbitmqctl exits non-zero with an error message; that output holds no
    // queue lines, so the vhost reports zeros instead of failing the poll.
    let (mut plugin, _) = plugin(&config_nodes(&["missing"]));
    let mut sink = MemorySink::new();

    plugin.read(&mut sink).unwrap();

    assert_eq!(sink.value("ctl.missing.messages"), Some(0));
    assert_eq!(sink.value("ctl.missing.consumers"), Some(0));
}

#[test]
fn test_hanging_tool_times_out_without_emitting() {
    let (mut plugin, logger) = plugin(&config_nodes(&["/", "slow"]));
    plugin.configure(&[ConfigNode::new("Timeout", ["0.3"])]);
    let mut sink = MemorySink::new();

    let err = plugin.read(&mut sink).unwrap_err();

    assert!(matches!(
        err,
        ReadError::Collect(CollectError::Timeout { vhost: Some(ref v), .. }) if v == "slow"
    ));
    assert!(sink.samples.is_empty());
    assert_eq!(logger.messages(Severity::Error).len(), 2);
}

#[test]
fn test_missing_tool_fails_whole_poll() {
    let (mut plugin, _) = plugin(&config_nodes(&["/", "prod"]));
    plugin.configure(&[ConfigNode::new("PmapBin", ["/nonexistent/pmap"])]);
    let mut sink = MemorySink::new();

    let err = plugin.read(&mut sink).unwrap_err();

    assert!(matches!(err, ReadError::Collect(CollectError::Launch { .. })));
    assert!(sink.samples.is_empty());
}
