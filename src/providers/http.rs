//! HTTP(S) Filesystem - Read-Only Backend
//!
//! Treats a URL as a file: `info` via HEAD, reads via `Range` requests
//! through the shared buffered-file machinery. Servers that ignore
//! ranges degrade to a full-body fetch sliced locally. There is no
//! directory protocol, so `ls` is unsupported and every mutating
//! operation reports the backend as read-only.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_LENGTH, LAST_MODIFIED, RANGE, USER_AGENT};
use std::time::Duration;
use tracing::debug;

use crate::core::buffer::{BufferedFile, RangeSource};
use crate::core::filesystem::{FileSystem, FsFile};
use crate::models::config::FsConfig;
use crate::models::errors::{ErrorCode, FsError, FsResult};
use crate::models::types::{FileInfo, OpenMode, OpenOptions};
use crate::utils::constants::USER_AGENT as USER_AGENT_CONST;

/// Read-only filesystem over HTTP(S) URLs
pub struct HttpFileSystem {
    client: reqwest::Client,
    scheme: &'static str,
}

impl HttpFileSystem {
    pub fn new(scheme: &'static str) -> FsResult<Self> {
        let config = FsConfig::default();
        Ok(Self {
            client: Self::build_client(config.timeout)?,
            scheme,
        })
    }

    /// HTTP client with custom headers
    fn build_client(timeout: Duration) -> FsResult<reqwest::Client> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_CONST));
        reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| {
                FsError::with_source(ErrorCode::HttpRequestFailed, "Failed to build HTTP client", e)
            })
    }
}

#[async_trait]
impl FileSystem for HttpFileSystem {
    fn protocol(&self) -> &'static str {
        self.scheme
    }

    fn token(&self) -> String {
        format!("{}://", self.scheme)
    }

    /// The whole URL is the path for this backend
    fn strip_protocol(&self, urlpath: &str) -> String {
        urlpath.to_string()
    }

    async fn ls(&self, _path: &str) -> FsResult<Vec<FileInfo>> {
        Err(FsError::not_supported(
            "HTTP has no directory listing protocol",
        ))
    }

    async fn info(&self, path: &str) -> FsResult<FileInfo> {
        let response = self.client.head(path).send().await?;
        let status = response.status();
        if status.as_u16() == 404 {
            return Err(FsError::not_found(path));
        }
        if !status.is_success() {
            return Err(FsError::http_status(status.as_u16(), path));
        }
        let size = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);
        let mut info = FileInfo::file(path, size);
        if let Some(modified) = response
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
        {
            info = info.with_mtime(modified.with_timezone(&Utc));
        }
        Ok(info)
    }

    async fn open_with(&self, path: &str, options: OpenOptions) -> FsResult<Box<dyn FsFile>> {
        if options.mode.is_write() {
            return Err(FsError::read_only(self.scheme));
        }
        // Some servers reject HEAD; open anyway and let ranged reads
        // discover the size.
        let size = match self.info(path).await {
            Ok(info) if info.size > 0 => Some(info.size),
            Ok(_) => None,
            Err(e) if e.code == ErrorCode::HttpStatus => None,
            Err(e) => return Err(e),
        };
        let source = HttpSource {
            client: self.client.clone(),
            url: path.to_string(),
            size,
        };
        Ok(Box::new(BufferedFile::new(
            source,
            path,
            OpenMode::Read,
            options.effective_block_size(),
        )))
    }

    async fn rm(&self, _path: &str) -> FsResult<()> {
        Err(FsError::read_only(self.scheme))
    }

    async fn mkdir(&self, _path: &str) -> FsResult<()> {
        Err(FsError::read_only(self.scheme))
    }

    async fn rmdir(&self, _path: &str) -> FsResult<()> {
        Err(FsError::read_only(self.scheme))
    }

    async fn mv(&self, _from: &str, _to: &str) -> FsResult<()> {
        Err(FsError::read_only(self.scheme))
    }
}

/// Byte-range reader over one URL
struct HttpSource {
    client: reqwest::Client,
    url: String,
    size: Option<u64>,
}

#[async_trait]
impl RangeSource for HttpSource {
    fn size(&self) -> Option<u64> {
        self.size
    }

    async fn fetch_range(&mut self, start: u64, end: u64) -> FsResult<Vec<u8>> {
        let range = format!("bytes={}-{}", start, end.saturating_sub(1));
        debug!("🌐 GET {} [{}]", self.url, range);
        let response = self
            .client
            .get(&self.url)
            .header(RANGE, range)
            .send()
            .await?;
        match response.status().as_u16() {
            206 => Ok(response.bytes().await?.to_vec()),
            200 => {
                // Server ignored the range; slice the full body locally
                let body = response.bytes().await?;
                let lo = (start as usize).min(body.len());
                let hi = (end as usize).min(body.len());
                Ok(body[lo..hi].to_vec())
            }
            416 => Ok(Vec::new()),
            404 => Err(FsError::not_found(self.url.clone())),
            status => Err(FsError::http_status(status, &self.url)),
        }
    }

    async fn upload_chunk(&mut self, _data: &[u8], _offset: u64, _is_final: bool) -> FsResult<()> {
        Err(FsError::read_only("http"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_rejected() {
        let fs = HttpFileSystem::new("http").unwrap();
        let err = fs
            .open_with("http://example.com/a", OpenOptions::write())
            .await
            .unwrap_err();
        assert_eq!(err.code_str(), "FS_READ_ONLY");
    }

    #[tokio::test]
    async fn test_ls_unsupported() {
        let fs = HttpFileSystem::new("http").unwrap();
        let err = fs.ls("http://example.com/").await.unwrap_err();
        assert_eq!(err.code_str(), "FS_NOT_SUPPORTED");
    }

    #[test]
    fn test_full_url_is_the_path() {
        let fs = HttpFileSystem::new("https").unwrap();
        assert_eq!(
            fs.strip_protocol("https://example.com/data.csv"),
            "https://example.com/data.csv"
        );
        assert_eq!(fs.token(), "https://");
    }
}
