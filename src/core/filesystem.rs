//! Filesystem Abstraction
//!
//! The object-safe traits every backend implements. `FileSystem` is the
//! directory-level surface (list, stat, open, mutate); `FsFile` is the
//! byte-level handle it hands out. Default methods give each backend
//! `exists`/`cat`/`pipe`/`find`/`glob` for free on top of `ls`, `info`
//! and `open_with`.

use async_trait::async_trait;
use std::fmt;
use std::io::SeekFrom;

use crate::core::paths::{contains_wildcard, glob_root, glob_to_regex};
use crate::models::errors::{FsError, FsResult};
use crate::models::types::{FileInfo, OpenMode, OpenOptions};
use crate::utils::constants::READ_CHUNK_SIZE;

/// Async byte-oriented file handle.
///
/// Handles are single-owner and mode-bound: a read handle rejects
/// writes and vice versa. `close` finalizes uploads; afterwards every
/// operation fails with `FILE_CLOSED`. `commit`/`discard` only matter
/// for handles opened with `autocommit = false`.
#[async_trait]
pub trait FsFile: Send {
    /// Read up to `len` bytes from the current position.
    ///
    /// An empty return means end of file.
    async fn read(&mut self, len: usize) -> FsResult<Vec<u8>>;

    /// Read from the current position to end of file
    async fn read_to_end(&mut self) -> FsResult<Vec<u8>> {
        let mut out = Vec::new();
        loop {
            let chunk = self.read(READ_CHUNK_SIZE).await?;
            if chunk.is_empty() {
                return Ok(out);
            }
            out.extend_from_slice(&chunk);
        }
    }

    /// Append `data` to the write buffer, returning the bytes accepted
    async fn write(&mut self, data: &[u8]) -> FsResult<usize>;

    /// Move the read position
    async fn seek(&mut self, pos: SeekFrom) -> FsResult<u64>;

    /// Current position
    fn tell(&self) -> u64;

    /// Total object size, when known
    fn size(&self) -> Option<u64>;

    /// Push buffered writes to the backend without finalizing
    async fn flush(&mut self) -> FsResult<()>;

    /// Finalize the handle; idempotent
    async fn close(&mut self) -> FsResult<()>;

    /// Publish an uncommitted write to its target location
    async fn commit(&mut self) -> FsResult<()> {
        Ok(())
    }

    /// Drop an uncommitted write
    async fn discard(&mut self) -> FsResult<()> {
        Ok(())
    }
}

/// Async filesystem backend.
///
/// Paths are backend-native (protocol already stripped). Listings are
/// sorted by name and never contain `.`/`..` entries.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Primary protocol this backend serves
    fn protocol(&self) -> &'static str;

    /// Deterministic instance identifier; keys the instance cache
    fn token(&self) -> String;

    /// Reduce a URL to the backend-native path
    fn strip_protocol(&self, urlpath: &str) -> String {
        match urlpath.split_once("://") {
            Some((_, rest)) => rest.to_string(),
            None => urlpath.to_string(),
        }
    }

    /// List a directory (or a single file) with metadata
    async fn ls(&self, path: &str) -> FsResult<Vec<FileInfo>>;

    /// Metadata for a single path
    async fn info(&self, path: &str) -> FsResult<FileInfo>;

    /// Open a handle with full options
    async fn open_with(&self, path: &str, options: OpenOptions) -> FsResult<Box<dyn FsFile>>;

    /// Open a handle with default options for `mode`
    async fn open(&self, path: &str, mode: OpenMode) -> FsResult<Box<dyn FsFile>> {
        self.open_with(path, OpenOptions::with_mode(mode)).await
    }

    /// Remove a file
    async fn rm(&self, path: &str) -> FsResult<()>;

    /// Create a directory (including parents where the backend allows)
    async fn mkdir(&self, path: &str) -> FsResult<()>;

    /// Remove an empty directory
    async fn rmdir(&self, path: &str) -> FsResult<()>;

    /// Rename/move within the backend
    async fn mv(&self, from: &str, to: &str) -> FsResult<()>;

    /// Whether the path exists
    async fn exists(&self, path: &str) -> FsResult<bool> {
        match self.info(path).await {
            Ok(_) => Ok(true),
            Err(e) if e.code.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Size in bytes of a file
    async fn size(&self, path: &str) -> FsResult<u64> {
        Ok(self.info(path).await?.size)
    }

    /// Read a whole file into memory
    async fn cat(&self, path: &str) -> FsResult<Vec<u8>> {
        let mut handle = self.open(path, OpenMode::Read).await?;
        let data = handle.read_to_end().await?;
        handle.close().await?;
        Ok(data)
    }

    /// Write a whole file from a byte slice
    async fn pipe(&self, path: &str, data: &[u8]) -> FsResult<()> {
        let mut handle = self.open(path, OpenMode::Write).await?;
        handle.write(data).await?;
        handle.close().await
    }

    /// Recursively list all files below `path` (files only, sorted)
    async fn find(&self, path: &str) -> FsResult<Vec<FileInfo>> {
        let root = self.info(path).await?;
        if root.is_file() {
            return Ok(vec![root]);
        }
        let mut out = Vec::new();
        let mut pending = vec![root.name];
        while let Some(dir) = pending.pop() {
            for entry in self.ls(&dir).await? {
                if entry.is_dir() {
                    pending.push(entry.name);
                } else {
                    out.push(entry);
                }
            }
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    /// Expand a glob pattern to sorted matching paths.
    ///
    /// `*` matches within one path segment, `**` across segments, `?` a
    /// single character. A pattern without wildcards resolves to itself
    /// when it exists, or nothing.
    async fn glob(&self, pattern: &str) -> FsResult<Vec<String>> {
        if !contains_wildcard(pattern) {
            return if self.exists(pattern).await? {
                Ok(vec![pattern.to_string()])
            } else {
                Ok(Vec::new())
            };
        }
        let root = glob_root(pattern);
        let regex = glob_to_regex(pattern)?;
        let files = match self.find(&root).await {
            Ok(files) => files,
            Err(e) if e.code.is_not_found() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut out: Vec<String> = files
            .into_iter()
            .filter(|f| regex.is_match(&f.name))
            .map(|f| f.name)
            .collect();
        out.sort();
        Ok(out)
    }

    /// Drop cached listings for `path`, or everything when `None`
    fn invalidate_cache(&self, _path: Option<&str>) {}
}

impl fmt::Debug for dyn FileSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSystem")
            .field("protocol", &self.protocol())
            .finish()
    }
}

impl fmt::Debug for dyn FsFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FsFile").finish()
    }
}

/// Shared guard helpers for handle implementations
pub(crate) fn ensure_open(closed: bool, path: &str) -> FsResult<()> {
    if closed {
        Err(FsError::file_closed(path))
    } else {
        Ok(())
    }
}

pub(crate) fn ensure_readable(mode: OpenMode, path: &str) -> FsResult<()> {
    if mode.is_write() {
        Err(FsError::mode_mismatch(format!(
            "'{}' is open for writing, not reading",
            path
        )))
    } else {
        Ok(())
    }
}

pub(crate) fn ensure_writable(mode: OpenMode, path: &str) -> FsResult<()> {
    if !mode.is_write() {
        Err(FsError::mode_mismatch(format!(
            "'{}' is open for reading, not writing",
            path
        )))
    } else {
        Ok(())
    }
}
