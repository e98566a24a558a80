//! Centralized Error Handling Module
//!
//! Every failure carries a unique error code so that production logs can
//! be grepped and monitored by category.
//!
//! Error codes follow pattern: CATEGORY_SPECIFIC_ERROR
//! - URL_xxx: URL parsing and resolution errors
//! - PATH_xxx: path lookup and expansion errors
//! - FS_xxx: filesystem/registry errors
//! - FILE_xxx: open-handle errors
//! - FTP_xxx: FTP protocol errors
//! - HTTP_xxx: HTTP backend errors
//! - CMP_xxx: compression errors
//! - CFG_xxx: configuration errors

use std::fmt;

/// Crate-wide error type
#[derive(Debug)]
pub struct FsError {
    /// Unique error code for logging/monitoring
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Optional underlying error
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl FsError {
    /// Create a new FsError
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create FsError with source error
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Get error code as string (for logging)
    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for FsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Unique error codes for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // ============================================
    // URL Errors
    // ============================================
    /// URL could not be parsed
    UrlInvalid,
    /// A list of URLs mixed more than one protocol
    UrlProtocolMismatch,
    /// Empty URL list passed to resolution
    UrlEmptyList,

    // ============================================
    // Path Errors
    // ============================================
    /// Path does not exist
    PathNotFound,
    /// Path already exists
    PathExists,
    /// Directory is not empty
    PathNotEmpty,
    /// Path or write template is malformed
    PathInvalid,
    /// Glob pattern is malformed
    GlobInvalid,

    // ============================================
    // Filesystem / Registry Errors
    // ============================================
    /// No backend registered for the protocol
    FsUnknownProtocol,
    /// Backend does not support the operation
    FsNotSupported,
    /// Backend is read-only
    FsReadOnly,

    // ============================================
    // File Handle Errors
    // ============================================
    /// Operation on a closed handle
    FileClosed,
    /// Read on a write handle or vice versa
    FileModeMismatch,
    /// Seek target cannot be computed
    FileInvalidSeek,

    // ============================================
    // FTP Errors
    // ============================================
    /// Control connection could not be established
    FtpConnectionFailed,
    /// Command or transfer timed out
    FtpTimeout,
    /// USER/PASS/ACCT rejected
    FtpAuthFailed,
    /// Unexpected reply code
    FtpProtocol,
    /// Data transfer failed or was rejected
    FtpTransferFailed,

    // ============================================
    // HTTP Errors
    // ============================================
    /// Non-success HTTP status
    HttpStatus,
    /// Connection or request failure
    HttpRequestFailed,
    /// Request timed out
    HttpTimeout,

    // ============================================
    // Compression Errors
    // ============================================
    /// Compression name not recognized
    CompressionUnknown,
    /// Encode/decode failure
    CompressionFailed,

    // ============================================
    // Configuration Errors
    // ============================================
    /// Invalid configuration value
    ConfigInvalidValue,
    /// Storage options inferred from URL collide with explicit options
    ConfigOptionCollision,

    // ============================================
    // Generic Errors
    // ============================================
    /// IO error
    Io,
    /// Unknown error
    Unknown,
}

impl ErrorCode {
    /// Get string representation of error code
    pub fn as_str(&self) -> &'static str {
        match self {
            // URL Errors
            Self::UrlInvalid => "URL_INVALID",
            Self::UrlProtocolMismatch => "URL_PROTOCOL_MISMATCH",
            Self::UrlEmptyList => "URL_EMPTY_LIST",

            // Path Errors
            Self::PathNotFound => "PATH_NOT_FOUND",
            Self::PathExists => "PATH_EXISTS",
            Self::PathNotEmpty => "PATH_NOT_EMPTY",
            Self::PathInvalid => "PATH_INVALID",
            Self::GlobInvalid => "GLOB_INVALID",

            // Filesystem / Registry Errors
            Self::FsUnknownProtocol => "FS_UNKNOWN_PROTOCOL",
            Self::FsNotSupported => "FS_NOT_SUPPORTED",
            Self::FsReadOnly => "FS_READ_ONLY",

            // File Handle Errors
            Self::FileClosed => "FILE_CLOSED",
            Self::FileModeMismatch => "FILE_MODE_MISMATCH",
            Self::FileInvalidSeek => "FILE_INVALID_SEEK",

            // FTP Errors
            Self::FtpConnectionFailed => "FTP_CONNECTION_FAILED",
            Self::FtpTimeout => "FTP_TIMEOUT",
            Self::FtpAuthFailed => "FTP_AUTH_FAILED",
            Self::FtpProtocol => "FTP_PROTOCOL",
            Self::FtpTransferFailed => "FTP_TRANSFER_FAILED",

            // HTTP Errors
            Self::HttpStatus => "HTTP_STATUS",
            Self::HttpRequestFailed => "HTTP_REQUEST_FAILED",
            Self::HttpTimeout => "HTTP_TIMEOUT",

            // Compression Errors
            Self::CompressionUnknown => "CMP_UNKNOWN",
            Self::CompressionFailed => "CMP_FAILED",

            // Configuration Errors
            Self::ConfigInvalidValue => "CFG_INVALID_VALUE",
            Self::ConfigOptionCollision => "CFG_OPTION_COLLISION",

            // Generic
            Self::Io => "IO_ERROR",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::FtpConnectionFailed
                | Self::FtpTimeout
                | Self::HttpRequestFailed
                | Self::HttpTimeout
        )
    }

    /// Check if error means "no such path"
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::PathNotFound)
    }
}

// ============================================
// Convenience constructors
// ============================================

impl FsError {
    /// URL could not be parsed
    pub fn url_invalid(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::UrlInvalid, msg)
    }

    /// Mixed protocols in a URL list
    pub fn protocol_mismatch(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::UrlProtocolMismatch, msg)
    }

    /// Path does not exist
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::new(ErrorCode::PathNotFound, path)
    }

    /// Malformed path or write template
    pub fn path_invalid(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::PathInvalid, msg)
    }

    /// Malformed glob pattern
    pub fn glob_invalid(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::GlobInvalid, msg)
    }

    /// No backend registered for the protocol
    pub fn unknown_protocol(protocol: &str) -> Self {
        Self::new(
            ErrorCode::FsUnknownProtocol,
            format!("No filesystem registered for protocol '{}'", protocol),
        )
    }

    /// Backend does not support the operation
    pub fn not_supported(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::FsNotSupported, msg)
    }

    /// Backend is read-only
    pub fn read_only(protocol: &str) -> Self {
        Self::new(
            ErrorCode::FsReadOnly,
            format!("'{}' filesystem is read-only", protocol),
        )
    }

    /// Operation on a closed handle
    pub fn file_closed(path: impl Into<String>) -> Self {
        Self::new(ErrorCode::FileClosed, path)
    }

    /// Read on a write handle or vice versa
    pub fn mode_mismatch(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::FileModeMismatch, msg)
    }

    /// FTP control connection failure
    pub fn ftp_connection_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::FtpConnectionFailed, msg)
    }

    /// FTP command/transfer timeout
    pub fn ftp_timeout(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::FtpTimeout, msg)
    }

    /// FTP authentication rejected
    pub fn ftp_auth_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::FtpAuthFailed, msg)
    }

    /// Unexpected FTP reply
    pub fn ftp_protocol(cmd: &str, code: u16, text: &str) -> Self {
        Self::new(
            ErrorCode::FtpProtocol,
            format!("'{}' failed with {} {}", cmd, code, text),
        )
    }

    /// FTP data transfer failure
    pub fn ftp_transfer_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::FtpTransferFailed, msg)
    }

    /// Non-success HTTP status
    pub fn http_status(status: u16, url: &str) -> Self {
        Self::new(
            ErrorCode::HttpStatus,
            format!("HTTP {} for {}", status, url),
        )
    }

    /// Unknown compression name
    pub fn compression_unknown(name: &str) -> Self {
        Self::new(
            ErrorCode::CompressionUnknown,
            format!("Compression type '{}' not supported", name),
        )
    }

    /// Encode/decode failure
    pub fn compression_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::CompressionFailed, msg)
    }

    /// Invalid configuration value
    pub fn config_invalid(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigInvalidValue, msg)
    }

    /// Storage option collision
    pub fn option_collision(key: &str, inferred: &str, explicit: &str) -> Self {
        Self::new(
            ErrorCode::ConfigOptionCollision,
            format!(
                "Collision for storage option '{}': url gives '{}', options give '{}'",
                key, inferred, explicit
            ),
        )
    }
}

// ============================================
// Result type alias
// ============================================

/// Crate-wide Result type
pub type FsResult<T> = Result<T, FsError>;

// ============================================
// Conversion from common error types
// ============================================

impl From<std::io::Error> for FsError {
    fn from(err: std::io::Error) -> Self {
        let code = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorCode::PathNotFound,
            std::io::ErrorKind::AlreadyExists => ErrorCode::PathExists,
            std::io::ErrorKind::TimedOut => ErrorCode::FtpTimeout,
            _ => ErrorCode::Io,
        };
        Self::with_source(code, err.to_string(), err)
    }
}

impl From<reqwest::Error> for FsError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::new(ErrorCode::HttpTimeout, "Request timeout")
        } else if err.is_connect() {
            Self::new(ErrorCode::HttpRequestFailed, "Connection failed")
        } else {
            Self::with_source(ErrorCode::HttpRequestFailed, err.to_string(), err)
        }
    }
}

impl From<serde_json::Error> for FsError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(ErrorCode::Unknown, "JSON error", err)
    }
}

impl From<url::ParseError> for FsError {
    fn from(err: url::ParseError) -> Self {
        Self::with_source(ErrorCode::UrlInvalid, err.to_string(), err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = FsError::ftp_timeout("Control connection timed out");
        assert_eq!(err.code, ErrorCode::FtpTimeout);
        assert_eq!(err.code_str(), "FTP_TIMEOUT");
    }

    #[test]
    fn test_retryable() {
        assert!(ErrorCode::FtpTimeout.is_retryable());
        assert!(ErrorCode::HttpRequestFailed.is_retryable());
        assert!(!ErrorCode::PathNotFound.is_retryable());
        assert!(!ErrorCode::FsReadOnly.is_retryable());
    }

    #[test]
    fn test_not_found_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: FsError = io.into();
        assert!(err.code.is_not_found());
    }

    #[test]
    fn test_display_includes_code() {
        let err = FsError::unknown_protocol("s3");
        let rendered = err.to_string();
        assert!(rendered.contains("FS_UNKNOWN_PROTOCOL"));
        assert!(rendered.contains("s3"));
    }
}
