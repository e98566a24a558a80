//! anyfs - Async Filesystem Abstraction Layer
//!
//! One URL-driven API over heterogeneous storage backends:
//! - `file://` local disk, `memory://` in-process, `http(s)://`
//!   read-only range reads, `ftp://` with a from-scratch async client
//! - lazy `OpenFile` references with transparent gzip/zlib compression
//! - glob expansion for reads, `*` templating for partitioned writes
//! - buffered remote IO with read-ahead blocks and chunked uploads
//! - transactional writes: stage to a temporary location, `commit()`
//!   renames into place

pub mod core;
pub mod models;
pub mod providers;
pub mod telemetry;
pub mod utils;

pub use crate::core::buffer::{BufferedFile, RangeSource};
pub use crate::core::compression::{CompressedFile, Compression};
pub use crate::core::filesystem::{FileSystem, FsFile};
pub use crate::core::open_file::{open_files, open_files_many, open_url, OpenFile};
pub use crate::core::paths::{build_name_function, expand_write_paths, glob_to_regex, NameFunction};
pub use crate::core::urls::{resolve, resolve_many, split_protocol, ResolvedPaths};
pub use models::config::{FsConfig, StorageOptions};
pub use models::errors::{ErrorCode, FsError, FsResult};
pub use models::types::{FileInfo, FileType, OpenMode, OpenOptions};
pub use providers::{
    clear_instance_cache, get_filesystem, FtpFileSystem, HttpFileSystem, LocalFileSystem,
    MemoryFileSystem,
};
pub use telemetry::{StatsCollector, TransferStats, STATS};
pub use utils::cache::{CacheStats, ListingCache};
