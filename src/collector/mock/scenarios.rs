//! Pre-built broker scenarios for testing.
//!
//! These use the default tool paths and PID file from [`Config`], so a
//! default configuration polls them successfully.

use super::filesystem::MockFs;
use super::runner::MockRunner;
use crate::config::{Config, DEFAULT_PID_FILE, DEFAULT_PMAP_BIN, DEFAULT_RABBITMQCTL_BIN};

/// PID written to the PID file by the scenarios.
pub const TYPICAL_BROKER_PID: u32 = 4242;

/// `pmap -d` output of a small RabbitMQ node.
const TYPICAL_PMAP_OUTPUT: &str = "\
4242:   /usr/lib/erlang/erts-13.2/bin/beam.smp -W w -MBas ageffcbf -MHas ageffcbf
Address           Kbytes Mode  Offset           Device    Mapping
0000555f3c9d1000    3036 r-x-- 0000000000000000 008:00001 beam.smp
0000555f3ccc8000      88 r---- 00000000002f7000 008:00001 beam.smp
00007f1a2c000000  262144 rw--- 0000000000000000 000:00000   [ anon ]
00007ffd3a1b2000     132 rw--- 0000000000000000 000:00000   [ stack ]
mapped: 2811596K    writeable/private: 1290012K    shared: 1044K
";

/// `list_queues` output for the default vhost.
///
/// Includes a header line that must be skipped, a non-durable reply queue,
/// and an idle durable queue.
const TYPICAL_LIST_QUEUES_OUTPUT: &str = "\
name\tdurable\tmessages\tmemory\tconsumers
orders\ttrue\t120\t55672\t3
amq.gen-JzTY20BRgKO\tfalse\t0\t13920\t1
audit\ttrue\t0\t10432\t0
";

impl MockFs {
    /// Creates a filesystem holding the broker PID file.
    pub fn typical_broker() -> Self {
        let mut fs = Self::new();
        fs.add_file(DEFAULT_PID_FILE, format!("{}\n", TYPICAL_BROKER_PID));
        fs
    }
}

impl MockRunner {
    /// Creates a runner answering for a node with only the default vhost.
    ///
    /// Totals for `/`: 120 messages, 80024 bytes, 4 consumers.
    pub fn typical_broker() -> Self {
        let mut runner = Self::new();
        runner.add_list_queues(DEFAULT_RABBITMQCTL_BIN, "/", TYPICAL_LIST_QUEUES_OUTPUT);
        runner.add_pmap(DEFAULT_PMAP_BIN, TYPICAL_BROKER_PID, TYPICAL_PMAP_OUTPUT);
        runner
    }

    /// Creates a runner answering for `/`, a busy `prod` vhost and an empty
    /// `staging` vhost.
    pub fn multi_vhost_broker() -> Self {
        let mut runner = Self::typical_broker();
        runner.add_list_queues(
            DEFAULT_RABBITMQCTL_BIN,
            "prod",
            "\
payments\ttrue\t7\t20000\t2
payments.retry\ttrue\t1\t9000\t1
notifications\tfalse\t300\t120000\t5
",
        );
        runner.add_list_queues(DEFAULT_RABBITMQCTL_BIN, "staging", "");
        runner
    }
}

/// Configuration matching [`MockRunner::multi_vhost_broker`].
pub fn multi_vhost_config() -> Config {
    Config {
        vhosts: vec!["/".to_string(), "prod".to_string(), "staging".to_string()],
        ..Config::default()
    }
}
