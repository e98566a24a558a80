//! Core Data Types
//!
//! Entry metadata and open-mode descriptors shared by every backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::config::FsConfig;

/// Kind of a directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    File,
    Directory,
    Other,
}

/// Metadata for a single entry, as returned by `ls`/`info`.
///
/// `name` is always the full path within the filesystem with the
/// protocol stripped. Directories report size 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub file_type: FileType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtime: Option<DateTime<Utc>>,
}

impl FileInfo {
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            file_type: FileType::File,
            mtime: None,
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: 0,
            file_type: FileType::Directory,
            mtime: None,
        }
    }

    pub fn with_mtime(mut self, mtime: DateTime<Utc>) -> Self {
        self.mtime = Some(mtime);
        self
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Directory
    }

    #[inline]
    pub fn is_file(&self) -> bool {
        self.file_type == FileType::File
    }
}

/// How a handle is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
    Append,
}

impl OpenMode {
    #[inline]
    pub fn is_write(&self) -> bool {
        matches!(self, Self::Write | Self::Append)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "rb",
            Self::Write => "wb",
            Self::Append => "ab",
        }
    }
}

/// Options for opening a file handle
#[derive(Debug, Clone, Copy)]
pub struct OpenOptions {
    pub mode: OpenMode,
    /// Read-ahead / upload buffer size; `None` uses the backend default
    pub block_size: Option<usize>,
    /// When false, writes land at a temporary location until `commit()`
    pub autocommit: bool,
}

impl OpenOptions {
    pub fn with_mode(mode: OpenMode) -> Self {
        Self {
            mode,
            block_size: None,
            autocommit: true,
        }
    }

    pub fn read() -> Self {
        Self::with_mode(OpenMode::Read)
    }

    pub fn write() -> Self {
        Self::with_mode(OpenMode::Write)
    }

    pub fn append() -> Self {
        Self::with_mode(OpenMode::Append)
    }

    pub fn block_size(mut self, block_size: usize) -> Self {
        self.block_size = Some(block_size);
        self
    }

    pub fn autocommit(mut self, autocommit: bool) -> Self {
        self.autocommit = autocommit;
        self
    }

    /// Effective buffer size for this open
    #[inline]
    pub fn effective_block_size(&self) -> usize {
        self.block_size
            .unwrap_or_else(|| FsConfig::default().block_size)
    }
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self::read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_mode() {
        assert!(!OpenMode::Read.is_write());
        assert!(OpenMode::Write.is_write());
        assert!(OpenMode::Append.is_write());
        assert_eq!(OpenMode::Write.as_str(), "wb");
    }

    #[test]
    fn test_open_options_builder() {
        let opts = OpenOptions::write().block_size(1024).autocommit(false);
        assert_eq!(opts.mode, OpenMode::Write);
        assert_eq!(opts.effective_block_size(), 1024);
        assert!(!opts.autocommit);
    }

    #[test]
    fn test_file_info_serialization() {
        let info = FileInfo::file("/data/a.csv", 42);
        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"type\":\"file\""));
        assert!(!json.contains("mtime"));
    }

    #[test]
    fn test_directory_size_zero() {
        let info = FileInfo::directory("/data");
        assert!(info.is_dir());
        assert_eq!(info.size, 0);
    }
}
