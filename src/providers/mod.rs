//! Providers Module - Storage Backends
//!
//! One module per protocol, plus the registry that maps protocol names
//! to backend instances. Instances are cached by connection identity so
//! repeated URL resolutions share connections and listing caches.

pub mod ftp;
pub mod http;
pub mod local;
pub mod memory;

pub use ftp::FtpFileSystem;
pub use http::HttpFileSystem;
pub use local::LocalFileSystem;
pub use memory::MemoryFileSystem;

use dashmap::DashMap;
use lazy_static::lazy_static;
use std::sync::Arc;
use tracing::debug;

use crate::core::filesystem::FileSystem;
use crate::models::config::StorageOptions;
use crate::models::errors::{FsError, FsResult};
use crate::utils::constants::DEFAULT_FTP_PORT;

lazy_static! {
    /// Backend instances keyed by connection identity
    static ref INSTANCES: DashMap<String, Arc<dyn FileSystem>> = DashMap::new();
}

/// Canonical protocol name, or an error for unknown schemes
fn canonical_protocol(protocol: &str) -> FsResult<&'static str> {
    match protocol {
        "" | "file" | "local" => Ok("file"),
        "memory" => Ok("memory"),
        "http" => Ok("http"),
        "https" => Ok("https"),
        "ftp" => Ok("ftp"),
        other => Err(FsError::unknown_protocol(other)),
    }
}

/// Deterministic cache key for (protocol, connection parameters)
fn instance_key(protocol: &str, options: &StorageOptions) -> String {
    format!(
        "{}://{}@{}:{}",
        protocol,
        options.username.as_deref().unwrap_or("anonymous"),
        options.host.as_deref().unwrap_or(""),
        options.port.unwrap_or(DEFAULT_FTP_PORT),
    )
}

/// Look up or construct the backend for a protocol.
///
/// Remote backends connect eagerly; the resulting instance (with its
/// connection and listing cache) is shared by every caller resolving
/// the same endpoint.
pub async fn get_filesystem(
    protocol: &str,
    options: &StorageOptions,
) -> FsResult<Arc<dyn FileSystem>> {
    let canonical = canonical_protocol(protocol)?;
    let key = instance_key(canonical, options);
    if let Some(hit) = INSTANCES.get(&key) {
        debug!("✅ filesystem instance HIT: {}", key);
        return Ok(hit.clone());
    }

    let fs: Arc<dyn FileSystem> = match canonical {
        "file" => Arc::new(LocalFileSystem::new()),
        "memory" => Arc::new(MemoryFileSystem::new()),
        "http" => Arc::new(HttpFileSystem::new("http")?),
        "https" => Arc::new(HttpFileSystem::new("https")?),
        "ftp" => FtpFileSystem::connect(options).await?,
        other => return Err(FsError::unknown_protocol(other)),
    };
    INSTANCES.insert(key, fs.clone());
    Ok(fs)
}

/// Drop all cached backend instances (used by tests)
pub fn clear_instance_cache() {
    INSTANCES.clear();
}
