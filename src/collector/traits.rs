//! Abstractions for filesystem and process access to enable testing and mocking.
//!
//! The `FileSystem` trait covers the PID file read, the `CommandRunner` trait
//! covers invocations of `rabbitmqctl` and `pmap`. Both have real
//! implementations and in-memory mocks (see [`crate::collector::mock`]).

use std::io;
use std::path::Path;
use std::time::Duration;

/// Abstraction for filesystem operations.
pub trait FileSystem: Send + Sync {
    /// Reads the entire contents of a file as a string.
    ///
    /// # Arguments
    /// * `path` - Path to the file to read
    ///
    /// # Returns
    /// The file contents as a string, or an I/O error if the file cannot be read.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;
}

/// Real filesystem implementation that delegates to `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    /// Creates a new `RealFs` instance.
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }
}

/// Captured result of an external command that was launched successfully.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Merged stdout and stderr, split into lines.
    pub lines: Vec<String>,
    /// Exit code, `None` if the process was terminated by a signal.
    pub status: Option<i32>,
}

impl CommandOutput {
    /// Builds an output from raw text with a zero exit status.
    pub fn from_text(text: &str) -> Self {
        Self {
            lines: text.lines().map(str::to_string).collect(),
            status: Some(0),
        }
    }
}

/// Error type for command execution.
///
/// A non-zero exit status is not an error: callers inspect the output.
#[derive(Debug)]
pub enum RunError {
    /// Executable could not be spawned (missing binary, permission denied).
    Launch(io::Error),
    /// Command did not finish within the allowed time and was killed.
    Timeout(Duration),
    /// Output could not be captured.
    Io(io::Error),
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunError::Launch(e) => write!(f, "launch failed: {}", e),
            RunError::Timeout(t) => write!(f, "timed out after {:.1}s", t.as_secs_f64()),
            RunError::Io(e) => write!(f, "output capture failed: {}", e),
        }
    }
}

impl std::error::Error for RunError {}

/// Abstraction for running external commands.
pub trait CommandRunner: Send + Sync {
    /// Runs `program` with `args` and captures its merged output.
    ///
    /// # Arguments
    /// * `program` - Path to the executable (no shell interpretation)
    /// * `args` - Arguments passed verbatim
    /// * `timeout` - Upper bound on the wait for the process and its output
    fn run(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<CommandOutput, RunError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_real_fs_read_to_string() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "4242").unwrap();

        let fs = RealFs::new();
        let content = fs.read_to_string(file.path()).unwrap();
        assert_eq!(content.trim(), "4242");
    }

    #[test]
    fn test_real_fs_missing_file() {
        let fs = RealFs::new();
        let err = fs
            .read_to_string(Path::new("/nonexistent/path/12345/pid"))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_command_output_from_text() {
        let output = CommandOutput::from_text("a b\nc d\n");
        assert_eq!(output.lines, vec!["a b", "c d"]);
        assert_eq!(output.status, Some(0));
    }

    #[test]
    fn test_run_error_display() {
        let err = RunError::Timeout(Duration::from_millis(1500));
        assert_eq!(err.to_string(), "timed out after 1.5s");
    }
}
