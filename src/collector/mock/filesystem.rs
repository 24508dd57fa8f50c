//! In-memory mock filesystem for testing the PID file read.

use crate::collector::traits::FileSystem;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

/// In-memory filesystem for testing.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    /// Map from path to file contents.
    files: HashMap<PathBuf, String>,
}

impl MockFs {
    /// Creates a new empty mock filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file with the given content, replacing any existing one.
    pub fn add_file(&mut self, path: impl AsRef<Path>, content: impl Into<String>) {
        self.files
            .insert(path.as_ref().to_path_buf(), content.into());
    }

    /// Removes a file. Subsequent reads fail with `NotFound`.
    pub fn remove_file(&mut self, path: impl AsRef<Path>) {
        self.files.remove(path.as_ref());
    }
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("mock file not found: {}", path.display()),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_read_file() {
        let mut fs = MockFs::new();
        fs.add_file("/var/run/rabbitmq/pid", "4242\n");

        let content = fs
            .read_to_string(Path::new("/var/run/rabbitmq/pid"))
            .unwrap();
        assert_eq!(content, "4242\n");
    }

    #[test]
    fn test_remove_file() {
        let mut fs = MockFs::new();
        fs.add_file("/pid", "1");
        fs.remove_file("/pid");

        let err = fs.read_to_string(Path::new("/pid")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
