//! Transparent Compression Layer
//!
//! Wraps any `FsFile` so callers read and write plaintext while the
//! backend stores gzip/zlib. Read handles materialize and decode the
//! object on first access, which buys free seeking; write handles feed
//! an in-memory encoder flushed to the backend on close.

use async_trait::async_trait;
use std::io::{Read, SeekFrom, Write};

use crate::core::filesystem::{ensure_open, ensure_readable, ensure_writable, FsFile};
use crate::models::errors::{ErrorCode, FsError, FsResult};
use crate::models::types::OpenMode;

/// Supported compression codecs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gzip,
    Zlib,
}

impl Compression {
    /// Look up a codec by name
    pub fn from_name(name: &str) -> FsResult<Self> {
        match name {
            "gzip" => Ok(Self::Gzip),
            "zlib" => Ok(Self::Zlib),
            other => Err(FsError::compression_unknown(other)),
        }
    }

    /// Infer a codec from the file extension, if any
    pub fn infer(path: &str) -> Option<Self> {
        if path.ends_with(".gz") {
            Some(Self::Gzip)
        } else if path.ends_with(".zz") {
            Some(Self::Zlib)
        } else {
            None
        }
    }

    /// Resolve a caller-supplied compression spec against a path.
    ///
    /// `Some("infer")` inspects the extension and quietly yields no
    /// compression for unknown extensions; any other name must be a
    /// known codec.
    pub fn resolve(spec: Option<&str>, path: &str) -> FsResult<Option<Self>> {
        match spec {
            None => Ok(None),
            Some("infer") => Ok(Self::infer(path)),
            Some(name) => Ok(Some(Self::from_name(name)?)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Zlib => "zlib",
        }
    }

    fn decode(&self, raw: &[u8]) -> FsResult<Vec<u8>> {
        let mut out = Vec::new();
        let result = match self {
            Self::Gzip => flate2::read::MultiGzDecoder::new(raw).read_to_end(&mut out),
            Self::Zlib => flate2::read::ZlibDecoder::new(raw).read_to_end(&mut out),
        };
        result.map_err(|e| FsError::compression_failed(format!("{} decode: {}", self.as_str(), e)))?;
        Ok(out)
    }

    fn encoder(&self) -> Encoder {
        match self {
            Self::Gzip => Encoder::Gzip(flate2::write::GzEncoder::new(
                Vec::new(),
                flate2::Compression::default(),
            )),
            Self::Zlib => Encoder::Zlib(flate2::write::ZlibEncoder::new(
                Vec::new(),
                flate2::Compression::default(),
            )),
        }
    }
}

enum Encoder {
    Gzip(flate2::write::GzEncoder<Vec<u8>>),
    Zlib(flate2::write::ZlibEncoder<Vec<u8>>),
}

impl Encoder {
    fn write(&mut self, data: &[u8]) -> std::io::Result<()> {
        match self {
            Self::Gzip(e) => e.write_all(data),
            Self::Zlib(e) => e.write_all(data),
        }
    }

    fn finish(self) -> std::io::Result<Vec<u8>> {
        match self {
            Self::Gzip(e) => e.finish(),
            Self::Zlib(e) => e.finish(),
        }
    }
}

/// `FsFile` adapter applying a codec over an inner handle
pub struct CompressedFile {
    inner: Box<dyn FsFile>,
    codec: Compression,
    path: String,
    mode: OpenMode,
    decoded: Option<Vec<u8>>,
    pos: u64,
    written: u64,
    encoder: Option<Encoder>,
    closed: bool,
}

impl CompressedFile {
    pub fn new(
        inner: Box<dyn FsFile>,
        codec: Compression,
        path: impl Into<String>,
        mode: OpenMode,
    ) -> Self {
        let encoder = mode.is_write().then(|| codec.encoder());
        Self {
            inner,
            codec,
            path: path.into(),
            mode,
            decoded: None,
            pos: 0,
            written: 0,
            encoder,
            closed: false,
        }
    }

    async fn materialize(&mut self) -> FsResult<()> {
        if self.decoded.is_none() {
            let raw = self.inner.read_to_end().await?;
            self.decoded = Some(self.codec.decode(&raw)?);
        }
        Ok(())
    }
}

#[async_trait]
impl FsFile for CompressedFile {
    async fn read(&mut self, len: usize) -> FsResult<Vec<u8>> {
        ensure_open(self.closed, &self.path)?;
        ensure_readable(self.mode, &self.path)?;
        self.materialize().await?;
        let data = match self.decoded.as_ref() {
            Some(data) => data,
            None => return Ok(Vec::new()),
        };
        let start = (self.pos as usize).min(data.len());
        let end = (start + len).min(data.len());
        self.pos = end as u64;
        Ok(data[start..end].to_vec())
    }

    async fn write(&mut self, data: &[u8]) -> FsResult<usize> {
        ensure_open(self.closed, &self.path)?;
        ensure_writable(self.mode, &self.path)?;
        let encoder = match self.encoder.as_mut() {
            Some(encoder) => encoder,
            None => return Err(FsError::mode_mismatch(self.path.clone())),
        };
        encoder.write(data).map_err(|e| {
            FsError::compression_failed(format!("{} encode: {}", self.codec.as_str(), e))
        })?;
        self.written += data.len() as u64;
        Ok(data.len())
    }

    async fn seek(&mut self, pos: SeekFrom) -> FsResult<u64> {
        ensure_open(self.closed, &self.path)?;
        ensure_readable(self.mode, &self.path)?;
        let target = match pos {
            SeekFrom::Start(p) => p as i128,
            SeekFrom::Current(d) => self.pos as i128 + d as i128,
            SeekFrom::End(d) => {
                self.materialize().await?;
                let len = self.decoded.as_ref().map(|d| d.len()).unwrap_or(0);
                len as i128 + d as i128
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
        if self.mode.is_write() {
            self.written
        } else {
            self.pos
        }
    }

    fn size(&self) -> Option<u64> {
        // Decoded size is only known once materialized
        self.decoded.as_ref().map(|d| d.len() as u64)
    }

    async fn flush(&mut self) -> FsResult<()> {
        ensure_open(self.closed, &self.path)?;
        Ok(())
    }

    async fn close(&mut self) -> FsResult<()> {
        if self.closed {
            return Ok(());
        }
        if let Some(encoder) = self.encoder.take() {
            let compressed = encoder.finish().map_err(|e| {
                FsError::compression_failed(format!("{} finish: {}", self.codec.as_str(), e))
            })?;
            self.inner.write(&compressed).await?;
        }
        self.inner.close().await?;
        self.closed = true;
        Ok(())
    }

    async fn commit(&mut self) -> FsResult<()> {
        self.inner.commit().await
    }

    async fn discard(&mut self) -> FsResult<()> {
        self.inner.discard().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_by_extension() {
        assert_eq!(Compression::infer("/data/a.csv.gz"), Some(Compression::Gzip));
        assert_eq!(Compression::infer("/data/a.zz"), Some(Compression::Zlib));
        assert_eq!(Compression::infer("/data/a.csv"), None);
    }

    #[test]
    fn test_resolve_infer_unknown_extension_is_none() {
        assert_eq!(Compression::resolve(Some("infer"), "/a.csv").unwrap(), None);
    }

    #[test]
    fn test_resolve_unknown_name_errors() {
        let err = Compression::resolve(Some("snappy"), "/a.csv").unwrap_err();
        assert_eq!(err.code_str(), "CMP_UNKNOWN");
    }

    #[test]
    fn test_gzip_codec_symmetry() {
        let codec = Compression::Gzip;
        let mut encoder = codec.encoder();
        encoder.write(b"hello compression").unwrap();
        let compressed = encoder.finish().unwrap();
        assert_ne!(compressed, b"hello compression");
        let plain = codec.decode(&compressed).unwrap();
        assert_eq!(plain, b"hello compression");
    }

    #[test]
    fn test_decode_garbage_fails() {
        let err = Compression::Gzip.decode(b"definitely not gzip").unwrap_err();
        assert_eq!(err.code_str(), "CMP_FAILED");
    }
}
