//! Lazy File References
//!
//! `OpenFile` bundles a backend, a path, a mode, and an optional codec
//! without touching the network. The underlying handle is only created
//! by `open()`, so these are cheap to build in bulk, pass around, and
//! open where the data is actually consumed.

use std::fmt;
use std::sync::Arc;

use crate::core::compression::{CompressedFile, Compression};
use crate::core::filesystem::{FileSystem, FsFile};
use crate::core::paths::NameFunction;
use crate::core::urls::{resolve, resolve_many, split_protocol};
use crate::models::config::StorageOptions;
use crate::models::errors::FsResult;
use crate::models::types::{OpenMode, OpenOptions};
use crate::providers::get_filesystem;
use crate::telemetry::STATS;

/// A file reference that opens lazily
#[derive(Clone)]
pub struct OpenFile {
    fs: Arc<dyn FileSystem>,
    pub path: String,
    pub mode: OpenMode,
    pub compression: Option<Compression>,
    block_size: Option<usize>,
}

impl OpenFile {
    pub fn new(fs: Arc<dyn FileSystem>, path: impl Into<String>, mode: OpenMode) -> Self {
        Self {
            fs,
            path: path.into(),
            mode,
            compression: None,
            block_size: None,
        }
    }

    pub fn with_compression(mut self, compression: Option<Compression>) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = Some(block_size);
        self
    }

    /// Backend this reference points into
    pub fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    /// Create the real handle, layering compression when configured
    pub async fn open(&self) -> FsResult<Box<dyn FsFile>> {
        STATS.record_open(self.fs.protocol());
        let mut options = OpenOptions::with_mode(self.mode);
        options.block_size = self.block_size;
        let inner = self.fs.open_with(&self.path, options).await?;
        Ok(match self.compression {
            Some(codec) => Box::new(CompressedFile::new(
                inner,
                codec,
                self.path.clone(),
                self.mode,
            )),
            None => inner,
        })
    }
}

impl fmt::Debug for OpenFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<OpenFile '{}'>", self.path)
    }
}

impl fmt::Display for OpenFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<OpenFile '{}'>", self.path)
    }
}

/// Given a urlpath (possibly a glob or write template), return one
/// `OpenFile` per expanded path, all sharing a backend instance.
pub async fn open_files(
    urlpath: &str,
    mode: OpenMode,
    compression: Option<&str>,
    num: usize,
    name_function: Option<&NameFunction>,
    storage_options: &StorageOptions,
) -> FsResult<Vec<OpenFile>> {
    let resolved = resolve(urlpath, mode, num, name_function, storage_options).await?;
    to_open_files(resolved.fs, resolved.paths, mode, compression)
}

/// List-of-urlpaths variant; all entries must share one protocol.
pub async fn open_files_many(
    urlpaths: &[String],
    mode: OpenMode,
    compression: Option<&str>,
    num: usize,
    name_function: Option<&NameFunction>,
    storage_options: &StorageOptions,
) -> FsResult<Vec<OpenFile>> {
    let resolved = resolve_many(urlpaths, mode, num, name_function, storage_options).await?;
    to_open_files(resolved.fs, resolved.paths, mode, compression)
}

/// Reference one file verbatim - no glob or template expansion.
///
/// The single-file companion to `open_files`: a write to `out.csv`
/// means the file `out.csv`, not a partition directory.
pub async fn open_url(
    urlpath: &str,
    mode: OpenMode,
    compression: Option<&str>,
    storage_options: &StorageOptions,
) -> FsResult<OpenFile> {
    let (protocol, _) = split_protocol(urlpath);
    let inferred = StorageOptions::from_url(urlpath)?;
    let options = StorageOptions::merge(&inferred, storage_options)?;
    let fs = get_filesystem(protocol.unwrap_or(""), &options).await?;
    let path = fs.strip_protocol(urlpath);
    let codec = Compression::resolve(compression, &path)?;
    Ok(OpenFile::new(fs, path, mode).with_compression(codec))
}

fn to_open_files(
    fs: Arc<dyn FileSystem>,
    paths: Vec<String>,
    mode: OpenMode,
    compression: Option<&str>,
) -> FsResult<Vec<OpenFile>> {
    paths
        .into_iter()
        .map(|path| {
            let codec = Compression::resolve(compression, &path)?;
            Ok(OpenFile::new(fs.clone(), path, mode).with_compression(codec))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::memory::MemoryFileSystem;

    #[tokio::test]
    async fn test_open_file_is_lazy_and_reusable() {
        let fs: Arc<dyn FileSystem> = Arc::new(MemoryFileSystem::new());
        fs.pipe("/data/a.txt", b"payload").await.unwrap();

        let of = OpenFile::new(fs, "/data/a.txt", OpenMode::Read);
        assert_eq!(format!("{}", of), "<OpenFile '/data/a.txt'>");

        // Two opens from the same reference are independent handles
        for _ in 0..2 {
            let mut handle = of.open().await.unwrap();
            assert_eq!(handle.read_to_end().await.unwrap(), b"payload");
            handle.close().await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_compression_roundtrip_through_open_file() {
        let fs: Arc<dyn FileSystem> = Arc::new(MemoryFileSystem::new());

        let writer = OpenFile::new(fs.clone(), "/data/a.txt.gz", OpenMode::Write)
            .with_compression(Compression::resolve(Some("infer"), "/data/a.txt.gz").unwrap());
        let mut handle = writer.open().await.unwrap();
        handle.write(b"compressed body").await.unwrap();
        handle.close().await.unwrap();

        // Raw object on the backend is gzip, not plaintext
        let raw = fs.cat("/data/a.txt.gz").await.unwrap();
        assert_ne!(raw, b"compressed body");

        let reader = OpenFile::new(fs, "/data/a.txt.gz", OpenMode::Read)
            .with_compression(Some(Compression::Gzip));
        let mut handle = reader.open().await.unwrap();
        assert_eq!(handle.read_to_end().await.unwrap(), b"compressed body");
        handle.close().await.unwrap();
    }
}
