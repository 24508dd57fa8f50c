//! Real command runner backed by `std::process`.
//!
//! stdout and stderr share one pipe so the captured lines keep the order the
//! tool wrote them in. The pipe is drained on a helper thread while the
//! calling thread waits for the child with a deadline.
//!
//! On Unix each child leads its own process group. When the deadline passes
//! the whole group is killed, so helpers a tool forked (`rabbitmqctl` is a
//! shell wrapper around `erl`) cannot outlive it or keep the pipe open.

use std::io::{self, Read};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::collector::traits::{CommandOutput, CommandRunner, RunError};
use crate::config::MAX_SECONDS;

/// Interval between child status checks.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Kills `child` together with its process group and reaps it.
fn kill_child(child: &mut Child) {
    kill_process_group(child.id());
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(unix)]
fn kill_process_group(leader: u32) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Ok(pgid) = i32::try_from(leader) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        debug!("killpg({}) failed: {}", pgid, e);
    }
}

#[cfg(not(unix))]
fn kill_process_group(_leader: u32) {}

/// Runs commands as child processes with a bounded wait.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Creates a new `ProcessRunner` instance.
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for ProcessRunner {
    fn run(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<CommandOutput, RunError> {
        let (mut reader, writer) = io::pipe().map_err(RunError::Io)?;
        let stderr_writer = writer.try_clone().map_err(RunError::Io)?;

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(writer)
            .stderr(stderr_writer);
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }
        let spawned = command.spawn();
        // Release our copies of the write end, otherwise the reader never sees EOF.
        drop(command);
        let mut child = spawned.map_err(RunError::Launch)?;

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = Vec::new();
            let result = reader.read_to_end(&mut buf).map(|_| buf);
            let _ = tx.send(result);
        });

        let started = Instant::now();
        let deadline = started
            .checked_add(timeout)
            .or_else(|| started.checked_add(MAX_SECONDS))
            .unwrap_or(started);
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(e) => {
                    kill_child(&mut child);
                    return Err(RunError::Io(e));
                }
            }
            if Instant::now() >= deadline {
                warn!("{} did not exit within {:?}, killing it", program, timeout);
                kill_child(&mut child);
                return Err(RunError::Timeout(timeout));
            }
            thread::sleep(WAIT_POLL_INTERVAL);
        };

        // A grandchild may still hold the pipe open after the child exits.
        let remaining = deadline
            .saturating_duration_since(Instant::now())
            .max(WAIT_POLL_INTERVAL);
        let bytes = match rx.recv_timeout(remaining) {
            Ok(result) => result.map_err(RunError::Io)?,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                warn!(
                    "{} exited but its output pipe is still open after {:?}, killing its process group",
                    program, timeout
                );
                kill_process_group(child.id());
                return Err(RunError::Timeout(timeout));
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                return Err(RunError::Io(io::Error::other("output reader exited")));
            }
        };

        if !status.success() {
            debug!("{} exited with {}", program, status);
        }

        let text = String::from_utf8_lossy(&bytes);
        Ok(CommandOutput {
            lines: text.lines().map(str::to_string).collect(),
            status: status.code(),
        })
    }
}
