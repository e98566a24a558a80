//! FTP Filesystem
//!
//! A from-scratch async FTP client plus the `FileSystem` backend on top
//! of it:
//! - control connection with multiline reply parsing, exponential
//!   backoff + jitter on connect, and timeouts on every exchange
//! - passive-mode data connections (PASV)
//! - ranged downloads via REST + RETR, aborting the transfer once the
//!   requested byte count has arrived
//! - uploads via STOR/APPE, resumable with REST
//! - MLSD directory listings served through a TTL cache, invalidated
//!   per parent directory on any mutation
//!
//! Writes with `autocommit = false` land under a temporary name in
//! `tempdir` and are renamed to the target on `commit()`.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use lazy_static::lazy_static;
use rand::Rng;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::core::buffer::{BufferedFile, RangeSource};
use crate::core::filesystem::{FileSystem, FsFile};
use crate::models::config::{FsConfig, StorageOptions};
use crate::models::errors::{ErrorCode, FsError, FsResult};
use crate::models::types::{FileInfo, FileType, OpenMode, OpenOptions};
use crate::utils::cache::ListingCache;
use crate::utils::constants::{
    BASE_RETRY_MS, DEFAULT_FTP_PORT, DEFAULT_FTP_TEMPDIR, MAX_CONNECT_RETRIES, MAX_RETRY_MS,
    READ_CHUNK_SIZE, RETRY_JITTER_PERCENT,
};

lazy_static! {
    /// PASV reply payload: (h1,h2,h3,h4,p1,p2)
    static ref PASV_RE: Regex =
        Regex::new(r"(\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3})").unwrap();
}

/// One parsed control-channel reply
#[derive(Debug, Clone)]
struct Reply {
    code: u16,
    text: String,
}

/// Async FTP control connection
pub(crate) struct FtpClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    timeout: Duration,
}

impl FtpClient {
    /// Connect with exponential backoff + jitter
    pub(crate) async fn connect(host: &str, port: u16, timeout_dur: Duration) -> FsResult<Self> {
        let mut last_error = None;
        for attempt in 0..MAX_CONNECT_RETRIES {
            if attempt > 0 {
                let base = BASE_RETRY_MS * 2u64.pow(attempt - 1);
                let capped = base.min(MAX_RETRY_MS);
                let jitter_range = (capped * RETRY_JITTER_PERCENT) / 100;
                let jitter: i64 = rand::thread_rng()
                    .gen_range(-(jitter_range as i64)..=(jitter_range as i64));
                let delay = (capped as i64 + jitter).max(100) as u64;
                debug!(
                    "⏳ FTP reconnect {}/{} after {}ms",
                    attempt + 1,
                    MAX_CONNECT_RETRIES,
                    delay
                );
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            match Self::try_connect(host, port, timeout_dur).await {
                Ok(client) => return Ok(client),
                Err(e) => {
                    warn!("⚠️ FTP connect to {}:{} failed: {}", host, port, e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error
            .unwrap_or_else(|| FsError::ftp_connection_failed(format!("{}:{}", host, port))))
    }

    async fn try_connect(host: &str, port: u16, timeout_dur: Duration) -> FsResult<Self> {
        let stream = timeout(timeout_dur, TcpStream::connect((host, port)))
            .await
            .map_err(|_| FsError::ftp_timeout(format!("Connecting to {}:{}", host, port)))?
            .map_err(|e| {
                FsError::with_source(
                    ErrorCode::FtpConnectionFailed,
                    format!("{}:{}", host, port),
                    e,
                )
            })?;
        let (read_half, write_half) = stream.into_split();
        let mut client = Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            timeout: timeout_dur,
        };
        let greeting = client.read_reply().await?;
        if greeting.code != 220 {
            return Err(FsError::ftp_protocol("<greeting>", greeting.code, &greeting.text));
        }
        Ok(client)
    }

    /// USER/PASS/ACCT handshake, then binary mode
    pub(crate) async fn login(
        &mut self,
        username: &str,
        password: &str,
        account: Option<&str>,
    ) -> FsResult<()> {
        let mut reply = self.command(&format!("USER {}", username)).await?;
        if reply.code == 331 {
            reply = self.command(&format!("PASS {}", password)).await?;
        }
        if reply.code == 332 {
            reply = self
                .command(&format!("ACCT {}", account.unwrap_or("")))
                .await?;
        }
        if reply.code != 230 {
            return Err(FsError::ftp_auth_failed(format!(
                "Login rejected with {} {}",
                reply.code, reply.text
            )));
        }
        self.expect("TYPE I", &[200]).await?;
        Ok(())
    }

    async fn read_line(&mut self) -> FsResult<String> {
        let mut line = String::new();
        let n = timeout(self.timeout, self.reader.read_line(&mut line))
            .await
            .map_err(|_| FsError::ftp_timeout("Waiting for server reply"))?
            .map_err(FsError::from)?;
        if n == 0 {
            return Err(FsError::ftp_connection_failed("Server closed the connection"));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Read one reply, collapsing `ddd-` multiline responses
    async fn read_reply(&mut self) -> FsResult<Reply> {
        let first = self.read_line().await?;
        if first.len() < 4 {
            return Err(FsError::ftp_protocol("<reply>", 0, &first));
        }
        let code: u16 = first[..3]
            .parse()
            .map_err(|_| FsError::ftp_protocol("<reply>", 0, &first))?;
        let mut text = first[4..].to_string();
        if first.as_bytes()[3] == b'-' {
            let terminator = format!("{} ", &first[..3]);
            loop {
                let line = self.read_line().await?;
                let done = line.starts_with(&terminator);
                text.push('\n');
                text.push_str(&line);
                if done {
                    break;
                }
            }
        }
        Ok(Reply { code, text })
    }

    async fn send_line(&mut self, cmd: &str) -> FsResult<()> {
        // Log the verb only; PASS arguments must not reach the logs
        debug!("📡 FTP → {}", cmd.split_whitespace().next().unwrap_or(cmd));
        self.writer
            .write_all(format!("{}\r\n", cmd).as_bytes())
            .await
            .map_err(FsError::from)?;
        self.writer.flush().await.map_err(FsError::from)
    }

    async fn command(&mut self, cmd: &str) -> FsResult<Reply> {
        self.send_line(cmd).await?;
        self.read_reply().await
    }

    async fn expect(&mut self, cmd: &str, accept: &[u16]) -> FsResult<Reply> {
        let reply = self.command(cmd).await?;
        if accept.contains(&reply.code) {
            Ok(reply)
        } else {
            Err(FsError::ftp_protocol(cmd, reply.code, &reply.text))
        }
    }

    /// Request a passive data endpoint
    async fn passive(&mut self) -> FsResult<(String, u16)> {
        let reply = self.expect("PASV", &[227]).await?;
        parse_pasv(&reply.text)
    }

    /// Open the data connection for `cmd` (RETR/STOR/MLSD/...)
    async fn open_data(&mut self, cmd: &str) -> FsResult<TcpStream> {
        let (host, port) = self.passive().await?;
        let data = timeout(self.timeout, TcpStream::connect((host.as_str(), port)))
            .await
            .map_err(|_| FsError::ftp_timeout(format!("Data connection for {}", cmd)))?
            .map_err(|e| {
                FsError::with_source(
                    ErrorCode::FtpConnectionFailed,
                    format!("Data connection {}:{}", host, port),
                    e,
                )
            })?;
        let reply = self.command(cmd).await?;
        if !matches!(reply.code, 125 | 150) {
            return Err(FsError::ftp_protocol(cmd, reply.code, &reply.text));
        }
        Ok(data)
    }

    /// Drain replies after dropping a data connection mid-transfer
    async fn abort(&mut self) -> FsResult<()> {
        self.send_line("ABOR").await?;
        for _ in 0..3 {
            let reply = self.read_reply().await?;
            if matches!(reply.code, 225 | 226) {
                return Ok(());
            }
            // 426 "transfer aborted" precedes the ABOR acknowledgement
        }
        Ok(())
    }

    /// Fetch bytes in `[start, end)` of `path`.
    ///
    /// The transfer is cut with ABOR once enough bytes arrived, so a
    /// small read from a large file does not stream the whole object.
    pub(crate) async fn retr_range(&mut self, path: &str, start: u64, end: u64) -> FsResult<Vec<u8>> {
        if end <= start {
            return Ok(Vec::new());
        }
        if start > 0 {
            self.expect(&format!("REST {}", start), &[350]).await?;
        }
        let mut data = self.open_data(&format!("RETR {}", path)).await?;
        let want = (end - start) as usize;
        let mut out = Vec::new();
        let mut buf = vec![0u8; READ_CHUNK_SIZE];
        let mut reached_eof = false;
        while out.len() < want {
            let n = timeout(self.timeout, data.read(&mut buf))
                .await
                .map_err(|_| FsError::ftp_timeout(format!("RETR {}", path)))?
                .map_err(FsError::from)?;
            if n == 0 {
                reached_eof = true;
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        drop(data);
        if reached_eof {
            let reply = self.read_reply().await?;
            if !matches!(reply.code, 226 | 250) {
                return Err(FsError::ftp_transfer_failed(format!(
                    "RETR {} finished with {} {}",
                    path, reply.code, reply.text
                )));
            }
        } else {
            out.truncate(want);
            self.abort().await?;
        }
        Ok(out)
    }

    /// Upload one chunk with STOR (resumable via REST) or APPE
    pub(crate) async fn store(
        &mut self,
        verb: &str,
        path: &str,
        data: &[u8],
        offset: u64,
    ) -> FsResult<()> {
        if verb == "STOR" && offset > 0 {
            self.expect(&format!("REST {}", offset), &[350]).await?;
        }
        let mut conn = self.open_data(&format!("{} {}", verb, path)).await?;
        conn.write_all(data).await.map_err(FsError::from)?;
        conn.shutdown().await.map_err(FsError::from)?;
        drop(conn);
        let reply = self.read_reply().await?;
        if !matches!(reply.code, 226 | 250) {
            return Err(FsError::ftp_transfer_failed(format!(
                "{} {} finished with {} {}",
                verb, path, reply.code, reply.text
            )));
        }
        Ok(())
    }

    /// Machine-readable directory listing
    pub(crate) async fn mlsd(&mut self, path: &str) -> FsResult<Vec<FileInfo>> {
        let mut data = self.open_data(&format!("MLSD {}", path)).await?;
        let mut raw = Vec::new();
        timeout(self.timeout, data.read_to_end(&mut raw))
            .await
            .map_err(|_| FsError::ftp_timeout(format!("MLSD {}", path)))?
            .map_err(FsError::from)?;
        drop(data);
        let reply = self.read_reply().await?;
        if !matches!(reply.code, 226 | 250) {
            return Err(FsError::ftp_transfer_failed(format!(
                "MLSD {} finished with {} {}",
                path, reply.code, reply.text
            )));
        }
        let text = String::from_utf8_lossy(&raw);
        let mut out: Vec<FileInfo> = text
            .lines()
            .filter_map(|line| parse_mlsd_line(line, path))
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    pub(crate) async fn delete(&mut self, path: &str) -> FsResult<()> {
        self.expect(&format!("DELE {}", path), &[250]).await.map(|_| ())
    }

    pub(crate) async fn mkd(&mut self, path: &str) -> FsResult<()> {
        self.expect(&format!("MKD {}", path), &[257]).await.map(|_| ())
    }

    pub(crate) async fn rmd(&mut self, path: &str) -> FsResult<()> {
        self.expect(&format!("RMD {}", path), &[250]).await.map(|_| ())
    }

    pub(crate) async fn rename(&mut self, from: &str, to: &str) -> FsResult<()> {
        self.expect(&format!("RNFR {}", from), &[350]).await?;
        self.expect(&format!("RNTO {}", to), &[250]).await.map(|_| ())
    }
}

/// Parse a 227 reply payload into (host, port)
fn parse_pasv(text: &str) -> FsResult<(String, u16)> {
    let caps = PASV_RE
        .captures(text)
        .ok_or_else(|| FsError::ftp_protocol("PASV", 227, text))?;
    let mut parts = [0u16; 6];
    for (i, part) in parts.iter_mut().enumerate() {
        *part = caps[i + 1]
            .parse()
            .map_err(|_| FsError::ftp_protocol("PASV", 227, text))?;
        if *part > 255 {
            return Err(FsError::ftp_protocol("PASV", 227, text));
        }
    }
    let host = format!("{}.{}.{}.{}", parts[0], parts[1], parts[2], parts[3]);
    let port = parts[4] * 256 + parts[5];
    Ok((host, port))
}

/// Parse one MLSD fact line (`type=file;size=23;modify=...; name`)
fn parse_mlsd_line(line: &str, parent: &str) -> Option<FileInfo> {
    let line = line.trim_end_matches('\r');
    let (facts, name) = line.split_once(' ')?;
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    let mut file_type = FileType::Other;
    let mut size = 0u64;
    let mut mtime = None;
    for fact in facts.split(';').filter(|f| !f.is_empty()) {
        if let Some((key, value)) = fact.split_once('=') {
            match key.to_ascii_lowercase().as_str() {
                "type" => match value.to_ascii_lowercase().as_str() {
                    "file" => file_type = FileType::File,
                    "dir" => file_type = FileType::Directory,
                    "cdir" | "pdir" => return None,
                    _ => file_type = FileType::Other,
                },
                "size" | "sizd" => size = value.parse().unwrap_or(0),
                "modify" => {
                    let stamp = value.split('.').next().unwrap_or(value);
                    mtime = NaiveDateTime::parse_from_str(stamp, "%Y%m%d%H%M%S")
                        .ok()
                        .map(|n| n.and_utc());
                }
                _ => {}
            }
        }
    }
    let full = if parent == "/" || parent.is_empty() {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent.trim_end_matches('/'), name)
    };
    Some(FileInfo {
        name: full,
        size: if file_type == FileType::Directory { 0 } else { size },
        file_type,
        mtime,
    })
}

/// Directory holding `path`
fn parent_dir(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some(("", _)) | None => "/".to_string(),
        Some((parent, _)) => parent.to_string(),
    }
}

/// Filesystem over one FTP server
pub struct FtpFileSystem {
    client: Arc<Mutex<FtpClient>>,
    host: String,
    port: u16,
    username: String,
    tempdir: String,
    dircache: ListingCache,
}

impl FtpFileSystem {
    /// Connect and authenticate; anonymous when no credentials given
    pub async fn connect(options: &StorageOptions) -> FsResult<Arc<Self>> {
        let host = options
            .host
            .clone()
            .ok_or_else(|| FsError::config_invalid("FTP requires a host"))?;
        let port = options.port.unwrap_or(DEFAULT_FTP_PORT);
        let config = FsConfig::default();

        let mut client = FtpClient::connect(&host, port, config.timeout).await?;
        let username = options
            .username
            .clone()
            .unwrap_or_else(|| "anonymous".to_string());
        let password = options
            .password
            .clone()
            .unwrap_or_else(|| "anonymous@".to_string());
        client
            .login(&username, &password, options.account.as_deref())
            .await?;
        info!("🔌 Connected to ftp://{}@{}:{}", username, host, port);

        let tempdir = options
            .extra
            .get("tempdir")
            .cloned()
            .unwrap_or_else(|| DEFAULT_FTP_TEMPDIR.to_string());

        Ok(Arc::new(Self {
            client: Arc::new(Mutex::new(client)),
            host,
            port,
            username,
            tempdir,
            dircache: ListingCache::with_ttl(config.cache_ttl_secs),
        }))
    }

    fn normalize(path: &str) -> String {
        let trimmed = path.trim_end_matches('/');
        if trimmed.is_empty() {
            "/".to_string()
        } else {
            trimmed.to_string()
        }
    }

    async fn listing(&self, path: &str) -> FsResult<Arc<Vec<FileInfo>>> {
        let path = Self::normalize(path);
        if let Some(hit) = self.dircache.get(&path) {
            return Ok(hit);
        }
        let entries = {
            let mut client = self.client.lock().await;
            client.mlsd(&path).await?
        };
        Ok(self.dircache.set(&path, entries))
    }
}

#[async_trait]
impl FileSystem for FtpFileSystem {
    fn protocol(&self) -> &'static str {
        "ftp"
    }

    fn token(&self) -> String {
        format!("ftp://{}@{}:{}", self.username, self.host, self.port)
    }

    fn strip_protocol(&self, urlpath: &str) -> String {
        if urlpath.contains("://") {
            match Url::parse(urlpath) {
                Ok(url) if !url.path().is_empty() => url.path().to_string(),
                _ => "/".to_string(),
            }
        } else {
            urlpath.to_string()
        }
    }

    async fn ls(&self, path: &str) -> FsResult<Vec<FileInfo>> {
        Ok((*self.listing(path).await?).clone())
    }

    async fn info(&self, path: &str) -> FsResult<FileInfo> {
        let path = Self::normalize(path);
        if path == "/" {
            return Ok(FileInfo::directory("/"));
        }
        let entries = self.listing(&parent_dir(&path)).await?;
        entries
            .iter()
            .find(|e| e.name == path)
            .cloned()
            .ok_or_else(|| FsError::not_found(path))
    }

    async fn open_with(&self, path: &str, options: OpenOptions) -> FsResult<Box<dyn FsFile>> {
        let path = Self::normalize(path);
        let (io_path, target, size) = match options.mode {
            OpenMode::Read => {
                let info = self.info(&path).await?;
                (path.clone(), None, Some(info.size))
            }
            OpenMode::Write if !options.autocommit => {
                let temp = format!("{}/{}", self.tempdir.trim_end_matches('/'), Uuid::new_v4());
                (temp, Some(path.clone()), None)
            }
            _ => (path.clone(), None, None),
        };
        let source = FtpSource {
            client: self.client.clone(),
            cache: self.dircache.clone(),
            path: io_path.clone(),
            target,
            size,
            append: options.mode == OpenMode::Append,
        };
        Ok(Box::new(BufferedFile::new(
            source,
            io_path,
            options.mode,
            options.effective_block_size(),
        )))
    }

    async fn rm(&self, path: &str) -> FsResult<()> {
        let path = Self::normalize(path);
        {
            let mut client = self.client.lock().await;
            client.delete(&path).await?;
        }
        self.dircache.invalidate(&parent_dir(&path));
        Ok(())
    }

    async fn mkdir(&self, path: &str) -> FsResult<()> {
        let path = Self::normalize(path);
        {
            let mut client = self.client.lock().await;
            client.mkd(&path).await?;
        }
        self.dircache.invalidate(&parent_dir(&path));
        Ok(())
    }

    async fn rmdir(&self, path: &str) -> FsResult<()> {
        let path = Self::normalize(path);
        {
            let mut client = self.client.lock().await;
            client.rmd(&path).await?;
        }
        self.dircache.invalidate(&path);
        self.dircache.invalidate(&parent_dir(&path));
        Ok(())
    }

    async fn mv(&self, from: &str, to: &str) -> FsResult<()> {
        let from = Self::normalize(from);
        let to = Self::normalize(to);
        {
            let mut client = self.client.lock().await;
            client.rename(&from, &to).await?;
        }
        self.dircache.invalidate(&parent_dir(&from));
        self.dircache.invalidate(&parent_dir(&to));
        Ok(())
    }

    fn invalidate_cache(&self, path: Option<&str>) {
        match path {
            Some(path) => self.dircache.invalidate(&Self::normalize(path)),
            None => self.dircache.invalidate_all(),
        }
    }
}

/// Byte-range access to one remote FTP object
struct FtpSource {
    client: Arc<Mutex<FtpClient>>,
    cache: ListingCache,
    path: String,
    /// Final location for a transactional write
    target: Option<String>,
    size: Option<u64>,
    append: bool,
}

#[async_trait]
impl RangeSource for FtpSource {
    fn size(&self) -> Option<u64> {
        self.size
    }

    async fn fetch_range(&mut self, start: u64, end: u64) -> FsResult<Vec<u8>> {
        let mut client = self.client.lock().await;
        client.retr_range(&self.path, start, end).await
    }

    async fn upload_chunk(&mut self, data: &[u8], offset: u64, is_final: bool) -> FsResult<()> {
        let verb = if self.append { "APPE" } else { "STOR" };
        {
            let mut client = self.client.lock().await;
            client.store(verb, &self.path, data, offset).await?;
        }
        if is_final {
            self.cache.invalidate(&parent_dir(&self.path));
            if let Some(target) = &self.target {
                self.cache.invalidate(&parent_dir(target));
            }
        }
        Ok(())
    }

    async fn commit(&mut self) -> FsResult<()> {
        if let Some(target) = self.target.take() {
            {
                let mut client = self.client.lock().await;
                client.rename(&self.path, &target).await?;
            }
            self.cache.invalidate(&parent_dir(&self.path));
            self.cache.invalidate(&parent_dir(&target));
        }
        Ok(())
    }

    async fn discard(&mut self) -> FsResult<()> {
        if self.target.take().is_some() {
            {
                let mut client = self.client.lock().await;
                client.delete(&self.path).await?;
            }
            self.cache.invalidate(&parent_dir(&self.path));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pasv() {
        let (host, port) =
            parse_pasv("Entering Passive Mode (192,168,1,20,19,136).").unwrap();
        assert_eq!(host, "192.168.1.20");
        assert_eq!(port, 19 * 256 + 136);
    }

    #[test]
    fn test_parse_pasv_garbage() {
        let err = parse_pasv("Entering Passive Mode").unwrap_err();
        assert_eq!(err.code_str(), "FTP_PROTOCOL");
    }

    #[test]
    fn test_parse_mlsd_file() {
        let info = parse_mlsd_line(
            "type=file;size=1048576;modify=20240301101500.000; data.bin",
            "/pub",
        )
        .unwrap();
        assert_eq!(info.name, "/pub/data.bin");
        assert_eq!(info.size, 1048576);
        assert!(info.is_file());
        assert!(info.mtime.is_some());
    }

    #[test]
    fn test_parse_mlsd_dir_and_specials() {
        let dir = parse_mlsd_line("type=dir;sizd=4096;modify=20240101000000; sub", "/").unwrap();
        assert_eq!(dir.name, "/sub");
        assert!(dir.is_dir());
        assert_eq!(dir.size, 0);

        assert!(parse_mlsd_line("type=cdir;modify=20240101000000; .", "/").is_none());
        assert!(parse_mlsd_line("type=pdir;modify=20240101000000; ..", "/").is_none());
    }

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir("/pub/data/a.csv"), "/pub/data");
        assert_eq!(parent_dir("/a.csv"), "/");
        assert_eq!(parent_dir("/pub/"), "/");
        assert_eq!(parent_dir("a.csv"), "/");
    }
}
