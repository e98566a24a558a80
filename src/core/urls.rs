//! URL Resolution Module
//!
//! Turns URL strings (single, lists, glob patterns, write templates)
//! into a backend instance plus concrete paths. This is the front door
//! used by `open_files` and the CLI.

use std::sync::Arc;

use crate::core::filesystem::FileSystem;
use crate::core::paths::{contains_wildcard, expand_write_list, expand_write_paths, NameFunction};
use crate::models::config::StorageOptions;
use crate::models::errors::{ErrorCode, FsError, FsResult};
use crate::models::types::OpenMode;
use crate::providers::get_filesystem;

/// Split a urlpath on the first `://`.
///
/// No separator means no protocol (a local path).
pub fn split_protocol(urlpath: &str) -> (Option<&str>, &str) {
    match urlpath.split_once("://") {
        Some((protocol, path)) => (Some(protocol), path),
        None => (None, urlpath),
    }
}

/// Outcome of URL resolution: a shared backend, its deterministic
/// instance token, and the expanded backend-native paths.
#[derive(Debug)]
pub struct ResolvedPaths {
    pub fs: Arc<dyn FileSystem>,
    pub token: String,
    pub paths: Vec<String>,
}

/// Resolve a single urlpath.
///
/// Write mode expands `*` templates to `num` paths through the name
/// function; read mode expands globs; a plain path passes through.
pub async fn resolve(
    urlpath: &str,
    mode: OpenMode,
    num: usize,
    name_function: Option<&NameFunction>,
    storage_options: &StorageOptions,
) -> FsResult<ResolvedPaths> {
    let (protocol, _) = split_protocol(urlpath);
    let protocol = protocol.unwrap_or("");
    let inferred = StorageOptions::from_url(urlpath)?;
    let options = StorageOptions::merge(&inferred, storage_options)?;
    let fs = get_filesystem(protocol, &options).await?;

    let path = fs.strip_protocol(urlpath);
    let paths = if mode.is_write() {
        expand_write_paths(&path, name_function, num)?
    } else if contains_wildcard(&path) {
        fs.glob(&path).await?
    } else {
        vec![path]
    };

    Ok(ResolvedPaths {
        token: fs.token(),
        fs,
        paths,
    })
}

/// Resolve a list of urlpaths sharing one protocol.
pub async fn resolve_many(
    urlpaths: &[String],
    mode: OpenMode,
    num: usize,
    name_function: Option<&NameFunction>,
    storage_options: &StorageOptions,
) -> FsResult<ResolvedPaths> {
    let first = urlpaths
        .first()
        .ok_or_else(|| FsError::new(ErrorCode::UrlEmptyList, "empty urlpath sequence"))?;

    let (protocol, _) = split_protocol(first);
    for other in &urlpaths[1..] {
        if split_protocol(other).0 != protocol {
            return Err(FsError::protocol_mismatch(
                "When specifying a list of paths, all paths must share the same protocol",
            ));
        }
    }
    let protocol = protocol.unwrap_or("");
    let inferred = StorageOptions::from_url(first)?;
    let options = StorageOptions::merge(&inferred, storage_options)?;
    let fs = get_filesystem(protocol, &options).await?;

    let stripped: Vec<String> = urlpaths.iter().map(|u| fs.strip_protocol(u)).collect();
    let paths = if mode.is_write() {
        expand_write_list(&stripped, name_function, num)?
    } else {
        let mut out = Vec::new();
        for path in &stripped {
            if contains_wildcard(path) {
                out.extend(fs.glob(path).await?);
            } else {
                out.push(path.clone());
            }
        }
        out
    };

    Ok(ResolvedPaths {
        token: fs.token(),
        fs,
        paths,
    })
}
