//! Local Disk Filesystem
//!
//! `FileSystem` over `tokio::fs`. Parent directories are created on
//! write. Uncommitted writes go to a sibling `.part` file that
//! `commit()` renames into place, so partially written output never
//! shadows the target.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::SeekFrom;
use std::path::Path;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use uuid::Uuid;

use crate::core::filesystem::{ensure_open, ensure_readable, ensure_writable, FileSystem, FsFile};
use crate::models::errors::{ErrorCode, FsError, FsResult};
use crate::models::types::{FileInfo, FileType, OpenMode, OpenOptions};
use crate::telemetry::STATS;

/// Filesystem over the local disk
pub struct LocalFileSystem;

impl Default for LocalFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalFileSystem {
    pub fn new() -> Self {
        Self
    }

    async fn entry_info(path: &str) -> FsResult<FileInfo> {
        let meta = fs::metadata(path).await?;
        let file_type = if meta.is_dir() {
            FileType::Directory
        } else if meta.is_file() {
            FileType::File
        } else {
            FileType::Other
        };
        let size = if meta.is_dir() { 0 } else { meta.len() };
        let mut info = FileInfo {
            name: path.to_string(),
            size,
            file_type,
            mtime: None,
        };
        if let Ok(modified) = meta.modified() {
            info.mtime = Some(DateTime::<Utc>::from(modified));
        }
        Ok(info)
    }

    async fn ensure_parent(path: &str) -> FsResult<()> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }

    fn part_path(path: &str) -> String {
        let p = Path::new(path);
        let file_name = p
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "out".to_string());
        let parent = p
            .parent()
            .map(|d| d.to_string_lossy().to_string())
            .unwrap_or_default();
        let hidden = format!(".{}.{}.part", file_name, Uuid::new_v4());
        if parent.is_empty() {
            hidden
        } else {
            format!("{}/{}", parent.trim_end_matches('/'), hidden)
        }
    }
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    fn protocol(&self) -> &'static str {
        "file"
    }

    fn token(&self) -> String {
        "file://local".to_string()
    }

    fn strip_protocol(&self, urlpath: &str) -> String {
        urlpath
            .strip_prefix("file://")
            .unwrap_or(urlpath)
            .to_string()
    }

    async fn ls(&self, path: &str) -> FsResult<Vec<FileInfo>> {
        let root = Self::entry_info(path).await?;
        if !root.is_dir() {
            return Ok(vec![root]);
        }
        let mut out = Vec::new();
        let mut dir = fs::read_dir(path).await?;
        while let Some(entry) = dir.next_entry().await? {
            let full = format!(
                "{}/{}",
                path.trim_end_matches('/'),
                entry.file_name().to_string_lossy()
            );
            out.push(Self::entry_info(&full).await?);
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn info(&self, path: &str) -> FsResult<FileInfo> {
        Self::entry_info(path).await
    }

    async fn open_with(&self, path: &str, options: OpenOptions) -> FsResult<Box<dyn FsFile>> {
        match options.mode {
            OpenMode::Read => {
                let meta = fs::metadata(path).await?;
                if meta.is_dir() {
                    return Err(FsError::path_invalid(format!(
                        "'{}' is a directory, not a file",
                        path
                    )));
                }
                let file = fs::File::open(path).await?;
                Ok(Box::new(LocalFile::reader(path, file, meta.len())))
            }
            OpenMode::Write => {
                Self::ensure_parent(path).await?;
                if options.autocommit {
                    let file = fs::File::create(path).await?;
                    Ok(Box::new(LocalFile::writer(path, file, None)))
                } else {
                    let part = Self::part_path(path);
                    let file = fs::File::create(&part).await?;
                    Ok(Box::new(LocalFile::writer(&part, file, Some(path.to_string()))))
                }
            }
            OpenMode::Append => {
                Self::ensure_parent(path).await?;
                let file = fs::OpenOptions::new()
                    .append(true)
                    .create(true)
                    .open(path)
                    .await?;
                Ok(Box::new(LocalFile::writer(path, file, None)))
            }
        }
    }

    async fn rm(&self, path: &str) -> FsResult<()> {
        fs::remove_file(path).await.map_err(FsError::from)
    }

    async fn mkdir(&self, path: &str) -> FsResult<()> {
        fs::create_dir_all(path).await.map_err(FsError::from)
    }

    async fn rmdir(&self, path: &str) -> FsResult<()> {
        fs::remove_dir(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FsError::not_found(path)
            } else {
                FsError::new(
                    ErrorCode::PathNotEmpty,
                    format!("Cannot remove '{}': {}", path, e),
                )
            }
        })
    }

    async fn mv(&self, from: &str, to: &str) -> FsResult<()> {
        Self::ensure_parent(to).await?;
        fs::rename(from, to).await.map_err(FsError::from)
    }
}

/// Handle over one disk file
struct LocalFile {
    file: Option<fs::File>,
    path: String,
    /// Final location for a transactional write
    target: Option<String>,
    mode: OpenMode,
    pos: u64,
    size: Option<u64>,
    closed: bool,
}

impl LocalFile {
    fn reader(path: &str, file: fs::File, size: u64) -> Self {
        Self {
            file: Some(file),
            path: path.to_string(),
            target: None,
            mode: OpenMode::Read,
            pos: 0,
            size: Some(size),
            closed: false,
        }
    }

    fn writer(path: &str, file: fs::File, target: Option<String>) -> Self {
        Self {
            file: Some(file),
            path: path.to_string(),
            target,
            mode: OpenMode::Write,
            pos: 0,
            size: None,
            closed: false,
        }
    }

    fn handle(&mut self) -> FsResult<&mut fs::File> {
        let path = self.path.clone();
        self.file.as_mut().ok_or_else(|| FsError::file_closed(path))
    }
}

#[async_trait]
impl FsFile for LocalFile {
    async fn read(&mut self, len: usize) -> FsResult<Vec<u8>> {
        ensure_open(self.closed, &self.path)?;
        ensure_readable(self.mode, &self.path)?;
        let mut buf = vec![0u8; len];
        let n = self.handle()?.read(&mut buf).await?;
        buf.truncate(n);
        self.pos += n as u64;
        STATS.record_read(n as u64);
        Ok(buf)
    }

    async fn write(&mut self, data: &[u8]) -> FsResult<usize> {
        ensure_open(self.closed, &self.path)?;
        ensure_writable(self.mode, &self.path)?;
        self.handle()?.write_all(data).await?;
        self.pos += data.len() as u64;
        STATS.record_write(data.len() as u64);
        Ok(data.len())
    }

    async fn seek(&mut self, pos: SeekFrom) -> FsResult<u64> {
        ensure_open(self.closed, &self.path)?;
        ensure_readable(self.mode, &self.path)?;
        let new_pos = self.handle()?.seek(pos).await?;
        self.pos = new_pos;
        Ok(new_pos)
    }

    fn tell(&self) -> u64 {
        self.pos
    }

    fn size(&self) -> Option<u64> {
        self.size
    }

    async fn flush(&mut self) -> FsResult<()> {
        ensure_open(self.closed, &self.path)?;
        if self.mode.is_write() {
            self.handle()?.flush().await?;
        }
        Ok(())
    }

    async fn close(&mut self) -> FsResult<()> {
        if self.closed {
            return Ok(());
        }
        if let Some(mut file) = self.file.take() {
            if self.mode.is_write() {
                file.flush().await?;
            }
        }
        self.closed = true;
        Ok(())
    }

    async fn commit(&mut self) -> FsResult<()> {
        self.close().await?;
        if let Some(target) = self.target.take() {
            fs::rename(&self.path, &target).await?;
        }
        Ok(())
    }

    async fn discard(&mut self) -> FsResult<()> {
        self.close().await?;
        if self.target.take().is_some() {
            fs::remove_file(&self.path).await?;
        }
        Ok(())
    }
}
