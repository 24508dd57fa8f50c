//! Scripted command runner for testing.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::collector::traits::{CommandOutput, CommandRunner, RunError};

/// Canned result for one command line.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Command runs and prints this output.
    Output(CommandOutput),
    /// Executable cannot be launched.
    LaunchFailure,
    /// Command hangs past its deadline.
    Timeout,
}

/// Command runner that answers from a table of canned responses.
///
/// Commands are matched on the exact program and argument list. Unknown
/// commands behave like a missing executable. Clones share the call log.
#[derive(Debug, Clone, Default)]
pub struct MockRunner {
    responses: HashMap<Vec<String>, MockResponse>,
    calls: Arc<Mutex<Vec<Vec<String>>>>,
}

impl MockRunner {
    /// Creates a runner that knows no commands.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a response for `program args...`.
    pub fn add_response(&mut self, program: &str, args: &[&str], response: MockResponse) {
        self.responses.insert(command_line(program, args), response);
    }

    /// Registers a successful command printing `output`.
    pub fn add_output(&mut self, program: &str, args: &[&str], output: &str) {
        self.add_response(
            program,
            args,
            MockResponse::Output(CommandOutput::from_text(output)),
        );
    }

    /// Registers `rabbitmqctl -q -p <vhost> list_queues ...` output.
    pub fn add_list_queues(&mut self, rabbitmqctl: &str, vhost: &str, output: &str) {
        self.add_output(rabbitmqctl, &list_queues_args(vhost), output);
    }

    /// Registers a `list_queues` invocation that fails with `response`.
    pub fn fail_list_queues(&mut self, rabbitmqctl: &str, vhost: &str, response: MockResponse) {
        self.add_response(rabbitmqctl, &list_queues_args(vhost), response);
    }

    /// Registers `pmap -d <pid>` output.
    pub fn add_pmap(&mut self, pmap: &str, pid: u32, output: &str) {
        self.add_output(pmap, &["-d", pid.to_string().as_str()], output);
    }

    /// Registers a `pmap -d <pid>` invocation that fails with `response`.
    pub fn fail_pmap(&mut self, pmap: &str, pid: u32, response: MockResponse) {
        self.add_response(pmap, &["-d", pid.to_string().as_str()], response);
    }

    /// Returns every command line run so far, program first.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl CommandRunner for MockRunner {
    fn run(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<CommandOutput, RunError> {
        let line = command_line(program, args);
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(line.clone());

        match self.responses.get(&line) {
            Some(MockResponse::Output(output)) => Ok(output.clone()),
            Some(MockResponse::Timeout) => Err(RunError::Timeout(timeout)),
            Some(MockResponse::LaunchFailure) | None => Err(RunError::Launch(io::Error::new(
                io::ErrorKind::NotFound,
                format!("mock command not found: {}", program),
            ))),
        }
    }
}

fn list_queues_args(vhost: &str) -> [&str; 9] {
    [
        "-q",
        "-p",
        vhost,
        "list_queues",
        "name",
        "durable",
        "messages",
        "memory",
        "consumers",
    ]
}

fn command_line(program: &str, args: &[&str]) -> Vec<String> {
    std::iter::once(program)
        .chain(args.iter().copied())
        .map(str::to_string)
        .collect()
}
