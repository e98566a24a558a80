//! Buffered Remote File
//!
//! Shared read-ahead / write-buffer machinery for backends that expose
//! byte ranges rather than real file handles (FTP, HTTP). A backend
//! implements `RangeSource`; `BufferedFile` turns it into a full
//! `FsFile`:
//!
//! - reads are served from one cached block of `block_size`, refetched
//!   on miss; seeks within the block are free
//! - writes accumulate in a buffer flushed as upload chunks when it
//!   exceeds `block_size`, with a final chunk on close

use async_trait::async_trait;
use std::io::SeekFrom;

use crate::core::filesystem::{ensure_open, ensure_readable, ensure_writable, FsFile};
use crate::models::errors::{ErrorCode, FsError, FsResult};
use crate::models::types::OpenMode;
use crate::telemetry::STATS;

/// Byte-range access to one remote object
#[async_trait]
pub trait RangeSource: Send {
    /// Object size when known up front
    fn size(&self) -> Option<u64>;

    /// Fetch bytes in `[start, end)`; short objects return what exists
    async fn fetch_range(&mut self, start: u64, end: u64) -> FsResult<Vec<u8>>;

    /// Upload one chunk at `offset`; `is_final` marks the last chunk
    async fn upload_chunk(&mut self, data: &[u8], offset: u64, is_final: bool) -> FsResult<()>;

    /// Publish an uncommitted upload to its target
    async fn commit(&mut self) -> FsResult<()> {
        Ok(())
    }

    /// Drop an uncommitted upload
    async fn discard(&mut self) -> FsResult<()> {
        Ok(())
    }
}

/// `FsFile` over a `RangeSource` with block caching and write buffering
pub struct BufferedFile<S: RangeSource> {
    source: S,
    path: String,
    mode: OpenMode,
    block_size: usize,
    pos: u64,
    size: Option<u64>,
    cache_start: u64,
    cache: Vec<u8>,
    cache_valid: bool,
    write_buf: Vec<u8>,
    upload_offset: u64,
    closed: bool,
}

impl<S: RangeSource> BufferedFile<S> {
    pub fn new(source: S, path: impl Into<String>, mode: OpenMode, block_size: usize) -> Self {
        let size = source.size();
        Self {
            source,
            path: path.into(),
            mode,
            block_size: block_size.max(1),
            pos: 0,
            size,
            cache_start: 0,
            cache: Vec::new(),
            cache_valid: false,
            write_buf: Vec::new(),
            upload_offset: 0,
            closed: false,
        }
    }

    /// Whether the cached block covers the current position
    fn cache_covers(&self, pos: u64) -> bool {
        self.cache_valid
            && pos >= self.cache_start
            && pos < self.cache_start + self.cache.len() as u64
    }

    async fn fill_cache(&mut self, start: u64, want: usize) -> FsResult<()> {
        let span = want.max(self.block_size) as u64;
        let mut end = start + span;
        if let Some(size) = self.size {
            end = end.min(size);
        }
        let requested = end.saturating_sub(start);
        let data = self.source.fetch_range(start, end).await?;
        // A short fetch is the backend telling us where the object ends.
        if (data.len() as u64) < requested && self.size.is_none() {
            self.size = Some(start + data.len() as u64);
        }
        self.cache_start = start;
        self.cache = data;
        self.cache_valid = true;
        Ok(())
    }

    async fn flush_chunk(&mut self, is_final: bool) -> FsResult<()> {
        if self.write_buf.is_empty() && !is_final {
            return Ok(());
        }
        let chunk = std::mem::take(&mut self.write_buf);
        self.source
            .upload_chunk(&chunk, self.upload_offset, is_final)
            .await?;
        self.upload_offset += chunk.len() as u64;
        Ok(())
    }
}

#[async_trait]
impl<S: RangeSource + 'static> FsFile for BufferedFile<S> {
    async fn read(&mut self, len: usize) -> FsResult<Vec<u8>> {
        ensure_open(self.closed, &self.path)?;
        ensure_readable(self.mode, &self.path)?;
        if len == 0 {
            return Ok(Vec::new());
        }
        if let Some(size) = self.size {
            if self.pos >= size {
                return Ok(Vec::new());
            }
        }
        if !self.cache_covers(self.pos) {
            self.fill_cache(self.pos, len).await?;
        }
        let offset = (self.pos - self.cache_start) as usize;
        let available = self.cache.len().saturating_sub(offset);
        if available == 0 {
            // Fetch landed exactly at EOF
            return Ok(Vec::new());
        }
        let take = available.min(len);
        let out = self.cache[offset..offset + take].to_vec();
        self.pos += take as u64;
        STATS.record_read(take as u64);
        Ok(out)
    }

    async fn write(&mut self, data: &[u8]) -> FsResult<usize> {
        ensure_open(self.closed, &self.path)?;
        ensure_writable(self.mode, &self.path)?;
        self.write_buf.extend_from_slice(data);
        self.pos += data.len() as u64;
        STATS.record_write(data.len() as u64);
        if self.write_buf.len() >= self.block_size {
            self.flush_chunk(false).await?;
        }
        Ok(data.len())
    }

    async fn seek(&mut self, pos: SeekFrom) -> FsResult<u64> {
        ensure_open(self.closed, &self.path)?;
        ensure_readable(self.mode, &self.path)?;
        let target = match pos {
            SeekFrom::Start(p) => p as i128,
            SeekFrom::Current(d) => self.pos as i128 + d as i128,
            SeekFrom::End(d) => {
                let size = self.size.ok_or_else(|| {
                    FsError::new(
                        ErrorCode::FileInvalidSeek,
                        format!("Size of '{}' is unknown; cannot seek from end", self.path),
                    )
                })?;
                size as i128 + d as i128
            }
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
        self.size
    }

    async fn flush(&mut self) -> FsResult<()> {
        ensure_open(self.closed, &self.path)?;
        if self.mode.is_write() {
            self.flush_chunk(false).await?;
        }
        Ok(())
    }

    async fn close(&mut self) -> FsResult<()> {
        if self.closed {
            return Ok(());
        }
        if self.mode.is_write() {
            // Always send the final chunk, even when empty, so zero-byte
            // files are created.
            self.flush_chunk(true).await?;
        }
        self.closed = true;
        Ok(())
    }

    async fn commit(&mut self) -> FsResult<()> {
        self.source.commit().await
    }

    async fn discard(&mut self) -> FsResult<()> {
        self.source.discard().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// In-memory source recording fetch/upload calls
    struct FakeSource {
        data: Vec<u8>,
        uploads: Vec<(Vec<u8>, u64, bool)>,
        fetches: u64,
    }

    impl FakeSource {
        fn new(data: Vec<u8>) -> Self {
            Self {
                data,
                uploads: Vec::new(),
                fetches: 0,
            }
        }
    }

    #[async_trait]
    impl RangeSource for FakeSource {
        fn size(&self) -> Option<u64> {
            Some(self.data.len() as u64)
        }

        async fn fetch_range(&mut self, start: u64, end: u64) -> FsResult<Vec<u8>> {
            self.fetches += 1;
            let start = (start as usize).min(self.data.len());
            let end = (end as usize).min(self.data.len());
            Ok(self.data[start..end].to_vec())
        }

        async fn upload_chunk(&mut self, data: &[u8], offset: u64, is_final: bool) -> FsResult<()> {
            self.uploads.push((data.to_vec(), offset, is_final));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_read_serves_from_block_cache() {
        let source = FakeSource::new(b"0123456789".to_vec());
        let mut file = BufferedFile::new(source, "/x", OpenMode::Read, 4);
        assert_eq!(file.read(2).await.unwrap(), b"01");
        assert_eq!(file.read(2).await.unwrap(), b"23");
        // Both reads came from one fetched block
        assert_eq!(file.source.fetches, 1);
        assert_eq!(file.read(4).await.unwrap(), b"4567");
    }

    #[tokio::test]
    async fn test_read_past_eof_is_empty() {
        let source = FakeSource::new(b"abc".to_vec());
        let mut file = BufferedFile::new(source, "/x", OpenMode::Read, 16);
        assert_eq!(file.read(100).await.unwrap(), b"abc");
        assert!(file.read(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_seek_and_tell() {
        let source = FakeSource::new(b"0123456789".to_vec());
        let mut file = BufferedFile::new(source, "/x", OpenMode::Read, 4);
        file.seek(SeekFrom::Start(6)).await.unwrap();
        assert_eq!(file.tell(), 6);
        assert_eq!(file.read(2).await.unwrap(), b"67");
        file.seek(SeekFrom::End(-1)).await.unwrap();
        assert_eq!(file.read(4).await.unwrap(), b"9");
        let err = file.seek(SeekFrom::Current(-100)).await.unwrap_err();
        assert_eq!(err.code_str(), "FILE_INVALID_SEEK");
    }

    #[tokio::test]
    async fn test_write_buffers_until_block_size() {
        let source = FakeSource::new(Vec::new());
        let mut file = BufferedFile::new(source, "/x", OpenMode::Write, 4);
        file.write(b"ab").await.unwrap();
        assert!(file.source.uploads.is_empty());
        file.write(b"cdef").await.unwrap();
        assert_eq!(file.source.uploads.len(), 1);
        assert_eq!(file.source.uploads[0].0, b"abcdef");
        file.close().await.unwrap();
        let last = file.source.uploads.last().unwrap();
        assert!(last.2, "final chunk sent on close");
        assert_eq!(last.1, 6, "final chunk offset follows earlier uploads");
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_guards() {
        let source = FakeSource::new(Vec::new());
        let mut file = BufferedFile::new(source, "/x", OpenMode::Write, 4);
        file.close().await.unwrap();
        file.close().await.unwrap();
        assert_eq!(file.source.uploads.len(), 1, "single final chunk");
        let err = file.write(b"zz").await.unwrap_err();
        assert_eq!(err.code_str(), "FILE_CLOSED");
    }

    #[tokio::test]
    async fn test_mode_guards() {
        let source = FakeSource::new(b"abc".to_vec());
        let mut file = BufferedFile::new(source, "/x", OpenMode::Read, 4);
        assert!(file.write(b"no").await.is_err());
        let source = FakeSource::new(Vec::new());
        let mut file = BufferedFile::new(source, "/x", OpenMode::Write, 4);
        assert!(file.read(1).await.is_err());
    }
}
