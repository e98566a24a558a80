//! In-Memory Filesystem
//!
//! Per-instance key/value store behind the `FileSystem` trait.
//! Directories are implicit: they exist exactly when some key lives
//! under them. Handy for tests and as the reference behavior for the
//! trait contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::io::SeekFrom;
use std::sync::Arc;

use crate::core::filesystem::{ensure_open, ensure_readable, ensure_writable, FileSystem, FsFile};
use crate::models::errors::{ErrorCode, FsError, FsResult};
use crate::models::types::{FileInfo, OpenMode, OpenOptions};
use crate::telemetry::STATS;

#[derive(Clone)]
struct MemoryEntry {
    data: Arc<Vec<u8>>,
    mtime: DateTime<Utc>,
}

/// Filesystem keeping whole objects in process memory
pub struct MemoryFileSystem {
    store: Arc<DashMap<String, MemoryEntry>>,
}

impl Default for MemoryFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self {
            store: Arc::new(DashMap::new()),
        }
    }

    /// Normalize to an absolute path without a trailing slash
    fn normalize(path: &str) -> String {
        let trimmed = path.trim_end_matches('/');
        if trimmed.is_empty() {
            return "/".to_string();
        }
        if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{}", trimmed)
        }
    }

    fn child_prefix(dir: &str) -> String {
        if dir == "/" {
            "/".to_string()
        } else {
            format!("{}/", dir)
        }
    }
}

#[async_trait]
impl FileSystem for MemoryFileSystem {
    fn protocol(&self) -> &'static str {
        "memory"
    }

    fn token(&self) -> String {
        "memory://".to_string()
    }

    fn strip_protocol(&self, urlpath: &str) -> String {
        let rest = match urlpath.split_once("://") {
            Some((_, rest)) => rest,
            None => urlpath,
        };
        Self::normalize(rest)
    }

    async fn ls(&self, path: &str) -> FsResult<Vec<FileInfo>> {
        let path = Self::normalize(path);
        if let Some(entry) = self.store.get(&path) {
            return Ok(vec![FileInfo::file(path.clone(), entry.data.len() as u64)
                .with_mtime(entry.mtime)]);
        }

        let prefix = Self::child_prefix(&path);
        let mut files = Vec::new();
        let mut dirs = BTreeSet::new();
        for item in self.store.iter() {
            if let Some(rest) = item.key().strip_prefix(&prefix) {
                match rest.split_once('/') {
                    Some((child, _)) => {
                        dirs.insert(format!("{}{}", prefix, child));
                    }
                    None => {
                        files.push(
                            FileInfo::file(item.key().clone(), item.value().data.len() as u64)
                                .with_mtime(item.value().mtime),
                        );
                    }
                }
            }
        }
        if files.is_empty() && dirs.is_empty() && path != "/" {
            return Err(FsError::not_found(path));
        }
        let mut out: Vec<FileInfo> = dirs.into_iter().map(FileInfo::directory).collect();
        out.extend(files);
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn info(&self, path: &str) -> FsResult<FileInfo> {
        let path = Self::normalize(path);
        if let Some(entry) = self.store.get(&path) {
            return Ok(FileInfo::file(path.clone(), entry.data.len() as u64)
                .with_mtime(entry.mtime));
        }
        if path == "/" {
            return Ok(FileInfo::directory("/"));
        }
        let prefix = Self::child_prefix(&path);
        if self.store.iter().any(|e| e.key().starts_with(&prefix)) {
            return Ok(FileInfo::directory(path));
        }
        Err(FsError::not_found(path))
    }

    async fn open_with(&self, path: &str, options: OpenOptions) -> FsResult<Box<dyn FsFile>> {
        let path = Self::normalize(path);
        match options.mode {
            OpenMode::Read => {
                let entry = self
                    .store
                    .get(&path)
                    .ok_or_else(|| FsError::not_found(path.as_str()))?;
                Ok(Box::new(MemoryFile::reader(path.clone(), entry.data.clone())))
            }
            OpenMode::Write => Ok(Box::new(MemoryFile::writer(
                self.store.clone(),
                path,
                Vec::new(),
                options.autocommit,
            ))),
            OpenMode::Append => {
                let initial = self
                    .store
                    .get(&path)
                    .map(|e| e.data.as_ref().clone())
                    .unwrap_or_default();
                Ok(Box::new(MemoryFile::writer(
                    self.store.clone(),
                    path,
                    initial,
                    options.autocommit,
                )))
            }
        }
    }

    async fn rm(&self, path: &str) -> FsResult<()> {
        let path = Self::normalize(path);
        self.store
            .remove(&path)
            .map(|_| ())
            .ok_or_else(|| FsError::not_found(path))
    }

    async fn mkdir(&self, _path: &str) -> FsResult<()> {
        // Directories are implicit
        Ok(())
    }

    async fn rmdir(&self, path: &str) -> FsResult<()> {
        let path = Self::normalize(path);
        let prefix = Self::child_prefix(&path);
        if self.store.iter().any(|e| e.key().starts_with(&prefix)) {
            return Err(FsError::new(
                ErrorCode::PathNotEmpty,
                format!("Directory '{}' is not empty", path),
            ));
        }
        Ok(())
    }

    async fn mv(&self, from: &str, to: &str) -> FsResult<()> {
        let from = Self::normalize(from);
        let to = Self::normalize(to);
        let (_, entry) = self
            .store
            .remove(&from)
            .ok_or_else(|| FsError::not_found(from.as_str()))?;
        self.store.insert(to, entry);
        Ok(())
    }
}

/// Handle over one in-memory object
struct MemoryFile {
    store: Option<Arc<DashMap<String, MemoryEntry>>>,
    path: String,
    mode: OpenMode,
    data: Arc<Vec<u8>>,
    pos: u64,
    buf: Vec<u8>,
    autocommit: bool,
    published: bool,
    closed: bool,
}

impl MemoryFile {
    fn reader(path: String, data: Arc<Vec<u8>>) -> Self {
        Self {
            store: None,
            path,
            mode: OpenMode::Read,
            data,
            pos: 0,
            buf: Vec::new(),
            autocommit: true,
            published: false,
            closed: false,
        }
    }

    fn writer(
        store: Arc<DashMap<String, MemoryEntry>>,
        path: String,
        initial: Vec<u8>,
        autocommit: bool,
    ) -> Self {
        Self {
            store: Some(store),
            path,
            mode: OpenMode::Write,
            data: Arc::new(Vec::new()),
            pos: initial.len() as u64,
            buf: initial,
            autocommit,
            published: false,
            closed: false,
        }
    }

    fn publish(&mut self) {
        if self.published {
            return;
        }
        if let Some(store) = &self.store {
            store.insert(
                self.path.clone(),
                MemoryEntry {
                    data: Arc::new(std::mem::take(&mut self.buf)),
                    mtime: Utc::now(),
                },
            );
        }
        self.published = true;
    }
}

#[async_trait]
impl FsFile for MemoryFile {
    async fn read(&mut self, len: usize) -> FsResult<Vec<u8>> {
        ensure_open(self.closed, &self.path)?;
        ensure_readable(self.mode, &self.path)?;
        let start = (self.pos as usize).min(self.data.len());
        let end = (start + len).min(self.data.len());
        self.pos = end as u64;
        STATS.record_read((end - start) as u64);
        Ok(self.data[start..end].to_vec())
    }

    async fn write(&mut self, data: &[u8]) -> FsResult<usize> {
        ensure_open(self.closed, &self.path)?;
        ensure_writable(self.mode, &self.path)?;
        self.buf.extend_from_slice(data);
        self.pos += data.len() as u64;
        STATS.record_write(data.len() as u64);
        Ok(data.len())
    }

    async fn seek(&mut self, pos: SeekFrom) -> FsResult<u64> {
        ensure_open(self.closed, &self.path)?;
        ensure_readable(self.mode, &self.path)?;
        let target = match pos {
            SeekFrom::Start(p) => p as i128,
            SeekFrom::Current(d) => self.pos as i128 + d as i128,
            SeekFrom::End(d) => self.data.len() as i128 + d as i128,
        };
        if target < 0 {
            return Err(FsError::new(
                ErrorCode::FileInvalidSeek,
                format!("Seek before start of '{}'", self.path),
            ));
        }
        self.pos = target as u64;
        Ok(self.pos)
    }

    fn tell(&self) -> u64 {
        self.pos
    }

    fn size(&self) -> Option<u64> {
        match self.mode {
            OpenMode::Read => Some(self.data.len() as u64),
            _ => None,
        }
    }

    async fn flush(&mut self) -> FsResult<()> {
        ensure_open(self.closed, &self.path)?;
        Ok(())
    }

    async fn close(&mut self) -> FsResult<()> {
        if self.closed {
            return Ok(());
        }
        if self.mode.is_write() && self.autocommit {
            self.publish();
        }
        self.closed = true;
        Ok(())
    }

    async fn commit(&mut self) -> FsResult<()> {
        if self.mode.is_write() && !self.autocommit {
            self.publish();
        }
        Ok(())
    }

    async fn discard(&mut self) -> FsResult<()> {
        self.published = true; // never publish
        self.buf.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pipe_cat_roundtrip() {
        let fs = MemoryFileSystem::new();
        fs.pipe("/data/a.txt", b"hello").await.unwrap();
        assert_eq!(fs.cat("/data/a.txt").await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_ls_shows_implicit_dirs_sorted() {
        let fs = MemoryFileSystem::new();
        fs.pipe("/data/b.txt", b"b").await.unwrap();
        fs.pipe("/data/a.txt", b"a").await.unwrap();
        fs.pipe("/data/sub/deep.txt", b"d").await.unwrap();

        let entries = fs.ls("/data").await.unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["/data/a.txt", "/data/b.txt", "/data/sub"]);
        assert!(entries[2].is_dir());
    }

    #[tokio::test]
    async fn test_ls_missing_dir_errors() {
        let fs = MemoryFileSystem::new();
        let err = fs.ls("/absent").await.unwrap_err();
        assert!(err.code.is_not_found());
    }

    #[tokio::test]
    async fn test_info_file_and_dir() {
        let fs = MemoryFileSystem::new();
        fs.pipe("/data/sub/x.bin", b"123").await.unwrap();
        let file = fs.info("/data/sub/x.bin").await.unwrap();
        assert!(file.is_file());
        assert_eq!(file.size, 3);
        assert!(file.mtime.is_some());
        let dir = fs.info("/data/sub").await.unwrap();
        assert!(dir.is_dir());
    }

    #[tokio::test]
    async fn test_append_extends() {
        let fs = MemoryFileSystem::new();
        fs.pipe("/log", b"one").await.unwrap();
        let mut handle = fs.open("/log", OpenMode::Append).await.unwrap();
        handle.write(b"+two").await.unwrap();
        handle.close().await.unwrap();
        assert_eq!(fs.cat("/log").await.unwrap(), b"one+two");
    }

    #[tokio::test]
    async fn test_mv_and_rm() {
        let fs = MemoryFileSystem::new();
        fs.pipe("/a", b"x").await.unwrap();
        fs.mv("/a", "/b").await.unwrap();
        assert!(!fs.exists("/a").await.unwrap());
        assert_eq!(fs.cat("/b").await.unwrap(), b"x");
        fs.rm("/b").await.unwrap();
        assert!(!fs.exists("/b").await.unwrap());
    }

    #[tokio::test]
    async fn test_rmdir_nonempty_rejected() {
        let fs = MemoryFileSystem::new();
        fs.pipe("/d/a", b"x").await.unwrap();
        let err = fs.rmdir("/d").await.unwrap_err();
        assert_eq!(err.code_str(), "PATH_NOT_EMPTY");
    }

    #[tokio::test]
    async fn test_transactional_write() {
        let fs = MemoryFileSystem::new();
        let mut handle = fs
            .open_with("/tx", OpenOptions::write().autocommit(false))
            .await
            .unwrap();
        handle.write(b"staged").await.unwrap();
        handle.close().await.unwrap();
        assert!(!fs.exists("/tx").await.unwrap(), "not visible before commit");
        handle.commit().await.unwrap();
        assert_eq!(fs.cat("/tx").await.unwrap(), b"staged");
    }

    #[tokio::test]
    async fn test_glob_via_trait_default() {
        let fs = MemoryFileSystem::new();
        fs.pipe("/data/2015-01-01.csv", b"1").await.unwrap();
        fs.pipe("/data/2015-02-01.csv", b"2").await.unwrap();
        fs.pipe("/data/readme.txt", b"3").await.unwrap();
        fs.pipe("/data/sub/2015-03-01.csv", b"4").await.unwrap();

        let hits = fs.glob("/data/*.csv").await.unwrap();
        assert_eq!(hits, vec!["/data/2015-01-01.csv", "/data/2015-02-01.csv"]);

        let deep = fs.glob("/data/**.csv").await.unwrap();
        assert_eq!(deep.len(), 3);
    }

    #[tokio::test]
    async fn test_read_seek() {
        let fs = MemoryFileSystem::new();
        fs.pipe("/s", b"0123456789").await.unwrap();
        let mut handle = fs.open("/s", OpenMode::Read).await.unwrap();
        handle.seek(SeekFrom::End(-2)).await.unwrap();
        assert_eq!(handle.read(10).await.unwrap(), b"89");
        handle.seek(SeekFrom::Start(3)).await.unwrap();
        assert_eq!(handle.read(2).await.unwrap(), b"34");
    }
}
