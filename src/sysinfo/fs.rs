//! Filesystem abstraction for `/proc` access, enabling tests to run
//! without a real Linux `/proc` tree.

use std::collections::HashMap;
use std::io;
use std::path::Path;

/// Abstraction over reading text files, so [`super::provider::Provider`]
/// can be driven from literal strings in tests.
pub trait FileSystem: Send + Sync {
    fn read_to_string(&self, path: &Path) -> io::Result<String>;
}

/// Reads through `std::fs`. Use this in production.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }
}

/// In-memory filesystem for tests: maps path strings to canned contents.
#[derive(Debug, Default, Clone)]
pub struct MockFs {
    files: HashMap<String, String>,
}

impl MockFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<String>, contents: impl Into<String>) -> Self {
        self.files.insert(path.into(), contents.into());
        self
    }
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files
            .get(&path.to_string_lossy().to_string())
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_fs_returns_registered_contents() {
        let fs = MockFs::new().with_file("/proc/meminfo", "MemTotal: 100 kB\n");
        let content = fs.read_to_string(Path::new("/proc/meminfo")).unwrap();
        assert_eq!(content, "MemTotal: 100 kB\n");
    }

    #[test]
    fn mock_fs_missing_file_is_not_found() {
        let fs = MockFs::new();
        assert!(fs.read_to_string(Path::new("/proc/meminfo")).is_err());
    }
}
